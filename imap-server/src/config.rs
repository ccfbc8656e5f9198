//! Server-wide configuration, loaded once at startup.
//!
//! Mirrors the teacher's own `imap-codec` split between wire limits and
//! runtime knobs, widened with the rate-limit/timeout settings the
//! middleware pipeline needs (§4.7).

use std::time::Duration;

use serde::Deserialize;

use imap_types::capability::{Capability, CapabilitySet};

fn default_max_literal_size() -> usize {
    25 * 1024 * 1024
}

fn default_max_message_size() -> usize {
    50 * 1024 * 1024
}

fn default_max_commands_per_second() -> f64 {
    100.0
}

fn default_burst_size() -> u32 {
    10
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest `{N}` literal the decoder will accept before rejecting it
    /// with `SendLiteralReject` (§4.1).
    #[serde(default = "default_max_literal_size")]
    pub max_literal_size: usize,

    /// Largest total message size `APPEND` will accept across all of a
    /// `MULTIAPPEND` batch's literals.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Token-bucket refill rate for the rate-limit middleware.
    #[serde(default = "default_max_commands_per_second")]
    pub max_commands_per_second: f64,

    /// Token-bucket burst capacity.
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Deadline the timeout middleware imposes on a single handler
    /// invocation.
    #[serde(default = "default_command_timeout", with = "humantime_duration")]
    pub command_timeout: Duration,

    /// Capabilities advertised before any extension has registered.
    #[serde(skip)]
    pub initial_capabilities: CapabilitySet,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut initial_capabilities = CapabilitySet::new();
        for name in ["IMAP4rev2", "LITERAL+", "ENABLE", "ID", "UNSELECT", "SASL-IR"] {
            initial_capabilities.insert(Capability::new(name));
        }

        Self {
            max_literal_size: default_max_literal_size(),
            max_message_size: default_max_message_size(),
            max_commands_per_second: default_max_commands_per_second(),
            burst_size: default_burst_size(),
            command_timeout: default_command_timeout(),
            initial_capabilities,
        }
    }
}

/// `serde` only knows how to deserialize `Duration` as a struct of
/// seconds/nanos; configuration files want to write `"30s"`. Kept local
/// rather than pulling in `humantime-serde` since the pack carries no
/// precedent for that crate.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let (digits, suffix) = raw
            .find(|c: char| !c.is_ascii_digit())
            .map(|i| raw.split_at(i))
            .unwrap_or((raw.as_str(), "s"));
        let value: u64 = digits.parse().map_err(serde::de::Error::custom)?;
        let secs = match suffix {
            "s" | "" => value,
            "m" => value * 60,
            "h" => value * 3600,
            other => return Err(serde::de::Error::custom(format!("unknown duration suffix {other:?}"))),
        };
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_advertises_core_capabilities() {
        let config = ServerConfig::default();
        assert!(config.initial_capabilities.contains("IMAP4rev2"));
        assert!(config.initial_capabilities.contains("literal+"));
        assert_eq!(config.burst_size, 10);
    }

    #[test]
    fn humantime_suffix_is_parsed() {
        use serde::de::value::{Error as ValueError, StrDeserializer};
        use serde::de::IntoDeserializer;

        let de: StrDeserializer<ValueError> = "45s".into_deserializer();
        let parsed = super::humantime_duration::deserialize(de).unwrap();
        assert_eq!(parsed, Duration::from_secs(45));
    }
}
