// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health check types for upstream data sources

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_HEALTH_CHECK_TIMEOUT_SECONDS: u64 = 5;

/// Health status of an upstream data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HealthStatus {
    /// Source is healthy and operational
    Up,
    /// Source is degraded but still functional
    Degraded { reason: String },
    /// Source is down and not functional
    Down { reason: String },
}

impl HealthStatus {
    /// Whether the source can still serve fetches
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Up | HealthStatus::Degraded { .. })
    }

    /// Whether the source is completely down
    pub fn is_down(&self) -> bool {
        matches!(self, HealthStatus::Down { .. })
    }
}

/// Health probe result with timing information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// The observed status
    pub status: HealthStatus,
    /// How long the probe took
    pub response_time: Duration,
    /// When the probe ran
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Record a successful probe
    pub fn healthy(response_time: Duration) -> Self {
        Self {
            status: HealthStatus::Up,
            response_time,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed probe
    pub fn unhealthy(response_time: Duration, reason: String) -> Self {
        Self {
            status: HealthStatus::Down { reason },
            response_time,
            timestamp: Utc::now(),
        }
    }
}

/// Default deadline for health probes
pub fn default_health_check_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HEALTH_CHECK_TIMEOUT_SECONDS)
}
