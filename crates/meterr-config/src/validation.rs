// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::MeterrConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &MeterrConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.collector.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ConfigError::validation(format!(
            "collector.endpoint must use http or https, got `{}`",
            url.scheme()
        ))),
        Err(e) => errors.push(ConfigError::validation(format!(
            "collector.endpoint `{}` is not a valid URL: {e}",
            config.collector.endpoint
        ))),
    }

    if config.collector.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "collector.timeout_secs must be at least 1",
        ));
    }

    if config.queue.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("queue.database_path must not be empty"));
    }

    let delivery = &config.delivery;
    if delivery.batch_size == 0 {
        errors.push(ConfigError::validation("delivery.batch_size must be at least 1"));
    }
    if delivery.flush_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "delivery.flush_interval_secs must be at least 1",
        ));
    }
    if delivery.backoff_base_ms == 0 {
        errors.push(ConfigError::validation(
            "delivery.backoff_base_ms must be greater than 0",
        ));
    }
    if delivery.backoff_base_ms > delivery.backoff_cap_ms {
        errors.push(ConfigError::validation(format!(
            "delivery.backoff_base_ms ({}) must not exceed delivery.backoff_cap_ms ({})",
            delivery.backoff_base_ms, delivery.backoff_cap_ms
        )));
    }

    for (model, price) in &config.pricing {
        for (field, value) in [
            ("input_per_1k", price.input_per_1k),
            ("output_per_1k", price.output_per_1k),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(ConfigError::validation(format!(
                    "pricing.{model}.{field} must be a non-negative number, got {value}"
                )));
            }
        }
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PricingOverride;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&MeterrConfig::default()).is_ok());
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut config = MeterrConfig::default();
        config.collector.endpoint = "ftp://collector.example.com".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("http or https"));
    }

    #[test]
    fn rejects_unparseable_endpoint() {
        let mut config = MeterrConfig::default();
        config.collector.endpoint = "not a url".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn collects_all_delivery_errors() {
        let mut config = MeterrConfig::default();
        config.delivery.batch_size = 0;
        config.delivery.flush_interval_secs = 0;
        config.delivery.backoff_base_ms = 10_000;
        config.delivery.backoff_cap_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "got: {errors:?}");
    }

    #[test]
    fn rejects_negative_price_override() {
        let mut config = MeterrConfig::default();
        config.pricing.insert(
            "my-model".into(),
            PricingOverride {
                input_per_1k: -1.0,
                output_per_1k: 0.5,
            },
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("pricing.my-model.input_per_1k"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = MeterrConfig::default();
        config.logging.level = "loud".into();
        assert!(validate_config(&config).is_err());
    }
}
