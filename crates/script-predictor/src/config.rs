//! Predictor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PredictorError;

/// Default number of execution contexts a predictor may hold.
pub const DEFAULT_POOL_CAPACITY: usize = 10;

/// Approximate timeout the host applies to predictors. The host does not
/// document it, so this is only used as a soft warning threshold.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(15);

/// Configuration for a [`ScriptPredictor`](crate::ScriptPredictor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Maximum number of execution contexts alive (and in use) at once
    pub pool_capacity: usize,
    /// Invocations slower than this produce a latency warning
    #[serde(with = "duration_ms")]
    pub slow_threshold: Duration,
    /// Create and exercise one context when the predictor is built
    pub warm_up: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            warm_up: true,
        }
    }
}

impl PredictorConfig {
    /// Check that the configuration can be used to build a predictor.
    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.pool_capacity == 0 {
            return Err(PredictorError::InvalidConfig(
                "pool_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Helper for serializing Duration as milliseconds
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PredictorConfig::default();

        assert_eq!(config.pool_capacity, 10);
        assert_eq!(config.slow_threshold, Duration::from_millis(15));
        assert!(config.warm_up);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_format() {
        let config = PredictorConfig {
            pool_capacity: 4,
            slow_threshold: Duration::from_millis(250),
            warm_up: false,
        };

        let json = serde_json::to_string(&config).unwrap();

        // Threshold should be serialized as milliseconds
        assert!(json.contains("\"slow_threshold\":250"));

        let deserialized: PredictorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PredictorConfig = serde_json::from_str(r#"{"pool_capacity": 2}"#).unwrap();

        assert_eq!(config.pool_capacity, 2);
        assert_eq!(config.slow_threshold, DEFAULT_SLOW_THRESHOLD);
        assert!(config.warm_up);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PredictorConfig {
            pool_capacity: 0,
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, PredictorError::InvalidConfig(_)));
    }
}
