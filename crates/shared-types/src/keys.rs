// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Token and collection keys
//!
//! A [`TokenKey`] uniquely identifies one NFT across all supported networks
//! and has a canonical `network:address:token_id` string form that round-trips
//! through [`FromStr`] and [`fmt::Display`]. Collection indexes persist these
//! canonical strings, so every segment is validated to exclude the `:`
//! separator at construction time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::network::NetworkId;

/// Error type for key parsing and validation
#[derive(Debug, thiserror::Error)]
pub enum KeyParseError {
    /// Network identifier was empty
    #[error("network identifier cannot be empty")]
    EmptyNetwork,

    /// Network identifier contained a forbidden character
    #[error("network identifier {network:?} contains invalid character {invalid:?}")]
    InvalidNetworkChar {
        /// The offending identifier
        network: String,
        /// The first invalid character found
        invalid: char,
    },

    /// A key segment (address or token id) was empty
    #[error("{segment} cannot be empty")]
    EmptySegment {
        /// Which segment was empty
        segment: &'static str,
    },

    /// A key segment contained a forbidden character
    #[error("{segment} {value:?} contains invalid character {invalid:?}")]
    InvalidSegmentChar {
        /// Which segment was invalid
        segment: &'static str,
        /// The offending value
        value: String,
        /// The first invalid character found
        invalid: char,
    },

    /// A canonical key string did not have the expected shape
    #[error("malformed token key {value:?}, expected network:address:token_id")]
    MalformedTokenKey {
        /// The string that failed to parse
        value: String,
    },
}

/// Validate an opaque key segment (contract address or token id)
///
/// Segments are chain-format-agnostic, so validation is minimal: non-empty,
/// no whitespace, and none of the characters the store uses as separators.
fn validate_segment(segment: &'static str, value: &str) -> Result<(), KeyParseError> {
    if value.is_empty() {
        return Err(KeyParseError::EmptySegment { segment });
    }
    if let Some(c) = value.chars().find(|c| c.is_whitespace() || *c == ':') {
        return Err(KeyParseError::InvalidSegmentChar {
            segment,
            value: value.to_string(),
            invalid: c,
        });
    }
    Ok(())
}

/// Unique identifier for one NFT
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct TokenKey {
    /// Network the token lives on
    pub network: NetworkId,
    /// Contract (collection) address
    #[schema(example = "terra1abc000000000000000000000000000000000000")]
    pub address: String,
    /// Token identifier within the contract
    #[schema(example = "42")]
    pub token_id: String,
}

impl TokenKey {
    /// Create a validated token key
    pub fn new(
        network: NetworkId,
        address: impl Into<String>,
        token_id: impl Into<String>,
    ) -> Result<Self, KeyParseError> {
        let address = address.into();
        let token_id = token_id.into();
        validate_segment("contract address", &address)?;
        validate_segment("token id", &token_id)?;
        Ok(Self {
            network,
            address,
            token_id,
        })
    }

    /// The collection this token belongs to
    pub fn collection(&self) -> CollectionKey {
        CollectionKey {
            network: self.network.clone(),
            address: Some(self.address.clone()),
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.network, self.address, self.token_id)
    }
}

impl FromStr for TokenKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(network), Some(address), Some(token_id), None) => {
                Self::new(NetworkId::new(network)?, address, token_id)
            }
            _ => Err(KeyParseError::MalformedTokenKey {
                value: s.to_string(),
            }),
        }
    }
}

/// Identifier for a collection, or for all collections on a network
///
/// `address: None` addresses every collection known on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct CollectionKey {
    /// Network the collection lives on
    pub network: NetworkId,
    /// Contract address; `None` means all collections on the network
    pub address: Option<String>,
}

impl CollectionKey {
    /// Key for one specific collection
    pub fn collection(
        network: NetworkId,
        address: impl Into<String>,
    ) -> Result<Self, KeyParseError> {
        let address = address.into();
        validate_segment("contract address", &address)?;
        Ok(Self {
            network,
            address: Some(address),
        })
    }

    /// Key addressing every collection on a network
    pub fn network_wide(network: NetworkId) -> Self {
        Self {
            network,
            address: None,
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(address) => write!(f, "{}:{}", self.network, address),
            None => write!(f, "{}:*", self.network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(name: &str) -> NetworkId {
        NetworkId::new(name).expect("valid network id")
    }

    #[test]
    fn token_key_canonical_round_trip() {
        let key = TokenKey::new(network("terra-2"), "terra1abc", "42").expect("valid key");
        let canonical = key.to_string();
        assert_eq!(canonical, "terra-2:terra1abc:42");
        let parsed: TokenKey = canonical.parse().expect("round trip");
        assert_eq!(parsed, key);
    }

    #[test]
    fn token_key_rejects_separator_in_segments() {
        assert!(TokenKey::new(network("eth"), "0xabc:def", "1").is_err());
        assert!(TokenKey::new(network("eth"), "0xabc", "1:2").is_err());
        assert!(TokenKey::new(network("eth"), "", "1").is_err());
        assert!(TokenKey::new(network("eth"), "0xabc", "").is_err());
    }

    #[test]
    fn token_key_parse_rejects_malformed() {
        assert!("eth:only-two".parse::<TokenKey>().is_err());
        assert!("eth:a:b:c".parse::<TokenKey>().is_err());
        assert!(":a:b".parse::<TokenKey>().is_err());
    }

    #[test]
    fn collection_of_token() {
        let key = TokenKey::new(network("polygon"), "0xfeed", "7").expect("valid key");
        let collection = key.collection();
        assert_eq!(collection.network, network("polygon"));
        assert_eq!(collection.address.as_deref(), Some("0xfeed"));
    }

    #[test]
    fn network_wide_collection_display() {
        let all = CollectionKey::network_wide(network("eth"));
        assert_eq!(all.to_string(), "eth:*");
        let one = CollectionKey::collection(network("eth"), "0xabc").expect("valid");
        assert_eq!(one.to_string(), "eth:0xabc");
    }

    #[test]
    fn serde_shapes() {
        let key = TokenKey::new(network("eth"), "0xabc", "9").expect("valid key");
        let json = serde_json::to_value(&key).expect("serialize");
        assert_eq!(json["network"], "eth");
        assert_eq!(json["address"], "0xabc");
        assert_eq!(json["token_id"], "9");
    }
}
