//! Multipart HTTP upload to the backup server

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::{Transfer, TransferOutcome};
use crate::config::RemoteConfig;
use crate::error::BackupError;
use crate::logging::*;
use crate::types::{CandidateFile, DeviceIdentity};

/// JSON body returned by the upload endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
	pub success: bool,
	#[serde(default)]
	pub message: Option<String>,
}

/// Map an HTTP status (and the decoded `success` flag for 2xx) to an outcome
///
/// 2xx with `success: true` is the only success. 408, 429 and 5xx are
/// transient, as is a 2xx whose body does not confirm the upload. Every other
/// status is a definitive rejection.
pub fn classify_status(status: StatusCode, confirmed: Option<bool>) -> TransferOutcome {
	if status.is_success() {
		return match confirmed {
			Some(true) => TransferOutcome::Success,
			Some(false) => TransferOutcome::recoverable(format!(
				"HTTP {}: server reported failure",
				status.as_u16()
			)),
			None => TransferOutcome::recoverable(format!(
				"HTTP {}: unreadable response",
				status.as_u16()
			)),
		};
	}

	if status == StatusCode::REQUEST_TIMEOUT
		|| status == StatusCode::TOO_MANY_REQUESTS
		|| status.is_server_error()
	{
		TransferOutcome::recoverable(format!("HTTP {}", status))
	} else {
		TransferOutcome::terminal(format!("HTTP {}", status))
	}
}

fn classify_request_error(e: &reqwest::Error) -> TransferOutcome {
	if e.is_builder() {
		TransferOutcome::terminal(format!("invalid request: {}", e))
	} else if e.is_timeout() {
		TransferOutcome::recoverable(format!("timeout: {}", e))
	} else if e.is_connect() {
		TransferOutcome::recoverable(format!("connection failed: {}", e))
	} else {
		TransferOutcome::recoverable(e.to_string())
	}
}

/// [`Transfer`] over HTTP multipart POST
pub struct HttpTransfer {
	client: Client,
	url: String,
	api_key: Option<String>,
}

impl HttpTransfer {
	pub fn new(config: &RemoteConfig) -> Result<Self, BackupError> {
		let client = Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
			.user_agent(config.user_agent.clone())
			.build()
			.map_err(|e| BackupError::Transport { message: e.to_string() })?;

		Ok(HttpTransfer { client, url: config.upload_url(), api_key: config.api_key.clone() })
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	async fn build_form(
		&self,
		file: &CandidateFile,
		identity: &DeviceIdentity,
	) -> Result<Form, std::io::Error> {
		let handle = tokio::fs::File::open(&file.path).await?;
		let length = handle.metadata().await?.len();
		let part = Part::stream_with_length(Body::from(handle), length).file_name(file.name());
		let category = file.category.map(|c| c.key()).unwrap_or("other");

		Ok(Form::new()
			.part("file", part)
			.text("device_id", identity.as_str().to_string())
			.text("category", category.to_string()))
	}
}

#[async_trait]
impl Transfer for HttpTransfer {
	async fn transfer(&self, file: &CandidateFile, identity: &DeviceIdentity) -> TransferOutcome {
		let form = match self.build_form(file, identity).await {
			Ok(f) => f,
			Err(e) => return TransferOutcome::recoverable(format!("cannot read file: {}", e)),
		};

		let mut request =
			self.client.post(&self.url).header("device_id", identity.as_str()).multipart(form);
		if let Some(key) = &self.api_key {
			request = request.header("X-API-Key", key);
		}

		let response = match request.send().await {
			Ok(r) => r,
			Err(e) => return classify_request_error(&e),
		};

		let status = response.status();
		let confirmed = if status.is_success() {
			match response.json::<UploadResponse>().await {
				Ok(body) => {
					if !body.success {
						debug!(
							"Server refused {}: {}",
							file.name(),
							body.message.as_deref().unwrap_or("no message")
						);
					}
					Some(body.success)
				}
				Err(e) => {
					debug!("Cannot decode upload response for {}: {}", file.name(), e);
					None
				}
			}
		} else {
			None
		};

		classify_status(status, confirmed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_confirmed_2xx_is_success() {
		assert_eq!(classify_status(StatusCode::OK, Some(true)), TransferOutcome::Success);
		assert_eq!(classify_status(StatusCode::CREATED, Some(true)), TransferOutcome::Success);
	}

	#[test]
	fn test_unconfirmed_2xx_is_recoverable() {
		let refused = classify_status(StatusCode::OK, Some(false));
		assert!(matches!(refused, TransferOutcome::Recoverable { .. }));
		let garbled = classify_status(StatusCode::OK, None);
		assert!(matches!(garbled, TransferOutcome::Recoverable { .. }));
	}

	#[test]
	fn test_transient_statuses_are_recoverable() {
		for status in [
			StatusCode::REQUEST_TIMEOUT,
			StatusCode::TOO_MANY_REQUESTS,
			StatusCode::INTERNAL_SERVER_ERROR,
			StatusCode::BAD_GATEWAY,
			StatusCode::SERVICE_UNAVAILABLE,
		] {
			assert!(
				matches!(classify_status(status, None), TransferOutcome::Recoverable { .. }),
				"{} should be recoverable",
				status
			);
		}
	}

	#[test]
	fn test_client_errors_are_terminal() {
		for status in [
			StatusCode::BAD_REQUEST,
			StatusCode::UNAUTHORIZED,
			StatusCode::FORBIDDEN,
			StatusCode::PAYLOAD_TOO_LARGE,
		] {
			assert!(
				matches!(classify_status(status, None), TransferOutcome::Terminal { .. }),
				"{} should be terminal",
				status
			);
		}
	}

	#[test]
	fn test_upload_url_joins_endpoint_and_path() {
		let config = RemoteConfig {
			endpoint: "http://backup.local:5000/".to_string(),
			..RemoteConfig::default()
		};
		let transfer = HttpTransfer::new(&config).unwrap();
		assert_eq!(transfer.url(), "http://backup.local:5000/api/upload");
	}
}

// vim: ts=4
