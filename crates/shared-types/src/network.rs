// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Blockchain network identifiers
//!
//! Networks form an open set: the service caches state for whatever networks
//! the configured indexer serves, so identifiers are validated strings rather
//! than a closed enum. Parsing normalizes to lowercase so `Terra-2` and
//! `terra-2` address the same cache keys.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::keys::KeyParseError;

/// Identifier for a blockchain network
///
/// Guaranteed non-empty and limited to lowercase alphanumerics plus `-`, `_`,
/// and `.`, which keeps network ids safe to embed in store keys and lock
/// resource names (both use `:` as a separator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema)]
#[schema(value_type = String, example = "ethereum")]
pub struct NetworkId(Box<str>);

impl NetworkId {
    /// Parse and normalize a network identifier
    pub fn new(s: impl AsRef<str>) -> Result<Self, KeyParseError> {
        let normalized = s.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(KeyParseError::EmptyNetwork);
        }
        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(KeyParseError::InvalidNetworkChar {
                network: normalized,
                invalid: c,
            });
        }
        Ok(Self(normalized.into_boxed_str()))
    }

    /// The normalized identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for NetworkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NetworkId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
