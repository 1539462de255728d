//! Configuration and settings validation functions

use super::ValidationError;

/// Shortest accepted scan period (15 minutes)
pub const MIN_SCAN_INTERVAL_MS: i64 = 15 * 60 * 1000;

/// Upper bound on upload attempts per file
pub const MAX_UPLOAD_ATTEMPTS: u32 = 10;

/// Validate the periodic scan interval
///
/// # Arguments
/// * `interval_ms` - Scan period in milliseconds (must be at least 15 minutes)
pub fn validate_scan_interval(interval_ms: i64) -> Result<(), ValidationError> {
	if interval_ms < MIN_SCAN_INTERVAL_MS {
		return Err(ValidationError::ConfigError(format!(
			"scan interval must be at least {} ms, got {}",
			MIN_SCAN_INTERVAL_MS, interval_ms
		)));
	}
	Ok(())
}

/// Validate the per-file attempt bound
pub fn validate_max_attempts(attempts: u32) -> Result<(), ValidationError> {
	if attempts == 0 {
		return Err(ValidationError::ConfigError("max_attempts must be at least 1".to_string()));
	}
	if attempts > MAX_UPLOAD_ATTEMPTS {
		return Err(ValidationError::ConfigError(format!(
			"max_attempts too high: {} (max {})",
			attempts, MAX_UPLOAD_ATTEMPTS
		)));
	}
	Ok(())
}

/// Validate backoff bounds (base must not exceed the cap)
pub fn validate_backoff(base_ms: u64, max_ms: u64) -> Result<(), ValidationError> {
	if base_ms > max_ms {
		return Err(ValidationError::ConfigError(format!(
			"backoff base {} ms exceeds cap {} ms",
			base_ms, max_ms
		)));
	}
	Ok(())
}

/// Validate timeout in seconds
pub fn validate_timeout_secs(timeout_secs: u64) -> Result<(), ValidationError> {
	if timeout_secs == 0 {
		return Err(ValidationError::ConfigError("Timeout must be greater than 0".to_string()));
	}
	if timeout_secs > 3600 {
		return Err(ValidationError::ConfigError(format!(
			"Timeout too large: {} seconds (max 3600)",
			timeout_secs
		)));
	}
	Ok(())
}

/// Validate the remote endpoint base URL
pub fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
	if endpoint.trim().is_empty() {
		return Err(ValidationError::ConfigError("remote endpoint is empty".to_string()));
	}
	if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
		return Err(ValidationError::ConfigError(format!(
			"remote endpoint must be an http(s) URL, got {}",
			endpoint
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_scan_interval() {
		assert!(validate_scan_interval(MIN_SCAN_INTERVAL_MS).is_ok());
		assert!(validate_scan_interval(60 * 60 * 1000).is_ok());

		let result = validate_scan_interval(60_000);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("at least"));
	}

	#[test]
	fn test_validate_max_attempts() {
		assert!(validate_max_attempts(1).is_ok());
		assert!(validate_max_attempts(3).is_ok());
		assert!(validate_max_attempts(0).is_err());
		assert!(validate_max_attempts(11).is_err());
	}

	#[test]
	fn test_validate_backoff() {
		assert!(validate_backoff(1000, 30_000).is_ok());
		assert!(validate_backoff(1000, 1000).is_ok());
		assert!(validate_backoff(5000, 1000).is_err());
	}

	#[test]
	fn test_validate_timeout() {
		assert!(validate_timeout_secs(30).is_ok());
		assert!(validate_timeout_secs(0).is_err());
		assert!(validate_timeout_secs(3601).is_err());
	}

	#[test]
	fn test_validate_endpoint() {
		assert!(validate_endpoint("http://localhost:800").is_ok());
		assert!(validate_endpoint("https://backup.example.com").is_ok());
		assert!(validate_endpoint("").is_err());
		assert!(validate_endpoint("ftp://example.com").is_err());
	}
}

// vim: ts=4
