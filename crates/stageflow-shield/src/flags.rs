//! Rollout switches for the request boundary.
//!
//! Decisions are pure functions of the configuration loaded at startup.

use crate::config::FeatureFlagSettings;
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of a flag lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagDecision {
    pub use_new_middleware: bool,
}

impl FeatureFlagDecision {
    const ON: Self = Self {
        use_new_middleware: true,
    };
    const OFF: Self = Self {
        use_new_middleware: false,
    };
}

/// Read-only flag set.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    enabled: bool,
    rollout_percentage: u32,
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
    endpoints: Vec<(String, bool)>,
}

impl FeatureFlags {
    pub fn new(settings: &FeatureFlagSettings) -> Self {
        Self {
            enabled: settings.enabled,
            rollout_percentage: settings.rollout_percentage.min(100),
            whitelist: settings.user_whitelist.iter().cloned().collect(),
            blacklist: settings.user_blacklist.iter().cloned().collect(),
            endpoints: settings
                .endpoints
                .iter()
                .map(|(name, on)| (name.to_ascii_lowercase(), *on))
                .collect(),
        }
    }

    /// Every endpoint on the new path.
    pub fn all_on() -> Self {
        Self {
            enabled: true,
            rollout_percentage: 100,
            ..Self::default()
        }
    }

    fn endpoint_override(&self, endpoint: &str) -> Option<bool> {
        self.endpoints
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(endpoint))
            .map(|(_, on)| *on)
    }

    /// Decision for an endpoint without user context.
    ///
    /// Partial rollouts need a user to bucket, so they resolve to off here.
    pub fn decide(&self, endpoint: &str) -> FeatureFlagDecision {
        self.decide_for_user(endpoint, None)
    }

    /// Decision for an endpoint and, when known, the calling user.
    pub fn decide_for_user(&self, endpoint: &str, user_id: Option<&str>) -> FeatureFlagDecision {
        if !self.enabled {
            return FeatureFlagDecision::OFF;
        }
        if let Some(on) = self.endpoint_override(endpoint) {
            return FeatureFlagDecision {
                use_new_middleware: on,
            };
        }
        if let Some(user) = user_id {
            if self.blacklist.contains(user) {
                return FeatureFlagDecision::OFF;
            }
            if self.whitelist.contains(user) {
                return FeatureFlagDecision::ON;
            }
        }

        match self.rollout_percentage {
            100 => FeatureFlagDecision::ON,
            0 => FeatureFlagDecision::OFF,
            pct => match user_id {
                Some(user) => FeatureFlagDecision {
                    use_new_middleware: bucket(endpoint, user) < pct,
                },
                None => FeatureFlagDecision::OFF,
            },
        }
    }
}

/// Stable bucket in `0..100` for an endpoint/user pair (FNV-1a).
fn bucket(endpoint: &str, user_id: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = endpoint
        .bytes()
        .chain(std::iter::once(b':'))
        .chain(user_id.bytes())
        .fold(OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(PRIME));
    hash % 100
}
