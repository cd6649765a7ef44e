use url::Url;

use crate::error::ValidationError;
use crate::models::{MAX_INTERVAL_SECONDS, NewTarget};

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> Result<(), ValidationError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(ValidationError::InvalidUrl(format!(
                    "invalid scheme '{scheme}', must be http or https"
                )));
            }

            if url.host_str().is_none() {
                return Err(ValidationError::InvalidUrl("URL must have a valid host".to_string()));
            }

            Ok(())
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                Err(ValidationError::InvalidUrl(
                    "URL must include scheme (http:// or https://)".to_string(),
                ))
            } else {
                Err(ValidationError::InvalidUrl(e.to_string()))
            }
        }
    }
}

/// Validate target name
pub fn validate_target_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    Ok(())
}

/// Validate probe interval. Fractional seconds are fine; NaN is not.
pub fn validate_interval(interval_seconds: f64) -> Result<(), ValidationError> {
    if interval_seconds.is_nan() || interval_seconds <= 0.0 {
        return Err(ValidationError::NonPositiveInterval);
    }

    if interval_seconds > MAX_INTERVAL_SECONDS {
        return Err(ValidationError::IntervalTooLong { max_seconds: MAX_INTERVAL_SECONDS as u64 });
    }

    Ok(())
}

/// Validate everything an add or edit submits
pub fn validate_new_target(target: &NewTarget) -> Result<(), ValidationError> {
    validate_target_name(&target.name)?;
    validate_http_endpoint(&target.url)?;
    validate_interval(target.interval_seconds)
}
