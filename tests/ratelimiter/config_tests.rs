// tests/ratelimiter/config_tests.rs

#[cfg(test)]
mod tests {
    use crate::fixtures::test_clock::TestClock;
    use gcra_rate_limiter::{EmptyKeyPolicy, RateLimiter, RateLimiterConfig, RateLimiterError};
    use std::time::Duration;

    // Config validation tests
    #[test]
    fn config_rejects_zero_rate() {
        let config = RateLimiterConfig::new(0.0, 1);
        let result = config.validate();
        assert!(matches!(result.unwrap_err(), RateLimiterError::InvalidRate));
    }

    #[test]
    fn config_rejects_negative_rate() {
        let config = RateLimiterConfig::new(-1.0, 1);
        let result = config.validate();
        assert!(matches!(result.unwrap_err(), RateLimiterError::InvalidRate));
    }

    #[test]
    fn config_rejects_zero_burst() {
        let config = RateLimiterConfig::new(1.0, 0);
        let result = config.validate();
        assert!(matches!(result.unwrap_err(), RateLimiterError::InvalidBurst));
    }

    #[test]
    fn config_rejects_zero_idle_threshold() {
        let config = RateLimiterConfig::new(1.0, 1).idle_eviction_after(Duration::ZERO);
        assert_eq!(config.validate(), Err(RateLimiterError::InvalidIdleThreshold));
    }

    #[test]
    fn config_rejects_zero_max_keys() {
        let config = RateLimiterConfig::new(1.0, 1).max_keys(0);
        assert_eq!(config.validate(), Err(RateLimiterError::InvalidMaxKeys));
    }

    #[test]
    fn config_accepts_valid_parameters() {
        let config = RateLimiterConfig::new(10.0, 5)
            .idle_eviction_after(Duration::from_secs(60))
            .max_keys(10_000);
        assert!(config.validate().is_ok());
    }

    // Test config builder pattern
    #[test]
    fn config_builder_pattern_works() {
        let config = RateLimiterConfig::new(0.0, 0)
            .rate(10.0)
            .burst(5)
            .empty_key_policy(EmptyKeyPolicy::Anonymous);

        assert!(config.validate().is_ok());
        assert_eq!(config.key_policy(), EmptyKeyPolicy::Anonymous);
        assert_eq!(config.idle_threshold(), None);
        assert_eq!(config.key_limit(), None);

        let clock = TestClock::new(0.0);
        let limiter = RateLimiter::<String, _>::with_config(config, clock).unwrap();
        assert_eq!(limiter.rate(), 10.0);
        assert_eq!(limiter.burst(), 5);
    }

    #[test]
    fn derived_values_follow_rate_and_burst() {
        let config = RateLimiterConfig::new(1.0, 5);
        assert_eq!(config.emission_interval(), Duration::from_secs(1));
        assert_eq!(config.delay_tolerance(), Duration::from_secs(5));
    }

    // Constructor tests with config
    #[test]
    fn constructor_with_invalid_config_fails() {
        let clock = TestClock::new(0.0);

        let config = RateLimiterConfig::new(0.0, 1);
        let result = RateLimiter::<String, _>::with_config(config, clock.clone());
        assert!(matches!(result.unwrap_err(), RateLimiterError::InvalidRate));

        let config = RateLimiterConfig::new(10.0, 0);
        let result = RateLimiter::<String, _>::with_config(config, clock);
        assert!(matches!(result.unwrap_err(), RateLimiterError::InvalidBurst));
    }

    #[test]
    fn constructor_with_valid_config_succeeds() {
        let clock = TestClock::new(0.0);
        let config = RateLimiterConfig::new(10.0, 5);
        let result = RateLimiter::<String, _>::with_config(config, clock);
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn default_clock_constructor() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(100.0, 3)).unwrap();
        assert!(limiter.allow(42u64).admitted);
    }

    #[test]
    fn configuration_errors_are_flagged() {
        for error in [
            RateLimiterError::InvalidRate,
            RateLimiterError::InvalidBurst,
            RateLimiterError::InvalidIdleThreshold,
            RateLimiterError::InvalidMaxKeys,
        ] {
            assert!(error.is_configuration());
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: RateLimiterConfig =
            serde_json::from_str(r#"{ "rate_per_second": 2.0, "burst": 10 }"#).unwrap();

        assert_eq!(config, RateLimiterConfig::new(2.0, 10));
        assert_eq!(config.key_policy(), EmptyKeyPolicy::Reject);
    }

    #[test]
    fn config_deserializes_all_fields() {
        let json = r#"{
            "rate_per_second": 5.0,
            "burst": 20,
            "idle_eviction_after": { "secs": 300, "nanos": 0 },
            "max_keys": 1000,
            "empty_key_policy": "anonymous"
        }"#;
        let config: RateLimiterConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.rate_per_second(), 5.0);
        assert_eq!(config.burst_capacity(), 20);
        assert_eq!(config.idle_threshold(), Some(Duration::from_secs(300)));
        assert_eq!(config.key_limit(), Some(1000));
        assert_eq!(config.key_policy(), EmptyKeyPolicy::Anonymous);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialized_config_is_still_validated() {
        let config: RateLimiterConfig =
            serde_json::from_str(r#"{ "rate_per_second": 1.0, "burst": 0 }"#).unwrap();
        let result = RateLimiter::<String, _>::with_config(config, TestClock::new(0.0));
        assert!(matches!(result.unwrap_err(), RateLimiterError::InvalidBurst));
    }
}
