// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Inline delivery.

use std::sync::Arc;

use async_trait::async_trait;
use flare_common_http::{retry, RetryConfig};
use flare_core::{AccessToken, Payload};
use tracing::debug;

use super::base::BaseTransport;
use super::{Transport, TransportConfig};
use crate::error::{ClientError, Result};
use crate::logger::SharedLogger;

/// Delivers each payload in the caller's task, retrying temporary failures
/// with backoff, and returns the final outcome.
pub struct SyncTransport {
	base: Arc<BaseTransport>,
}

impl SyncTransport {
	pub(super) fn new(
		config: TransportConfig,
		logger: SharedLogger,
		http_client: Option<reqwest::Client>,
	) -> std::result::Result<Self, ClientError> {
		Ok(Self {
			base: Arc::new(BaseTransport::new(config, logger, http_client)?),
		})
	}

	fn retry_config(config: &TransportConfig) -> RetryConfig {
		RetryConfig {
			base_delay: config.retry_base_delay,
			..RetryConfig::with_retries(config.retry_attempts)
		}
	}
}

#[async_trait]
impl Transport for SyncTransport {
	async fn send(&self, payload: Payload) -> Result<()> {
		let config = self.base.snapshot();
		let Some(reservation) = self.base.acquire(&config) else {
			debug!(
				items_per_minute = config.items_per_minute,
				"rate limit reached, skipping item"
			);
			return Ok(());
		};

		let retry_config = Self::retry_config(&config);
		let result = retry(&retry_config, || self.base.post(&config, &payload)).await;
		if let Err(e) = &result {
			debug!(error = %e, "delivery failed");
			self.base.release(reservation);
			self.base.dump_payload(&config, &payload);
		}
		result
	}

	async fn wait(&self) {}

	async fn close(&self) -> Result<()> {
		Ok(())
	}

	fn config(&self) -> TransportConfig {
		TransportConfig::clone(&self.base.snapshot())
	}

	fn set_token(&self, token: AccessToken) {
		self.base.update(|config| config.token = token);
	}

	fn set_endpoint(&self, endpoint: String) {
		self.base.update(|config| config.endpoint = endpoint);
	}

	fn set_logger(&self, logger: SharedLogger) {
		self.base.set_logger(logger);
	}

	fn set_retry_attempts(&self, retry_attempts: u32) {
		self.base.update(|config| config.retry_attempts = retry_attempts);
	}

	fn set_items_per_minute(&self, items_per_minute: u32) {
		self.base.update(|config| config.items_per_minute = items_per_minute);
	}

	fn set_print_payload_on_error(&self, enabled: bool) {
		self.base.update(|config| config.print_payload_on_error = enabled);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TransportError;
	use crate::logger::testing::RecordingLogger;
	use crate::transport::testing::{endpoint, payload};
	use crate::transport::TransportBuilder;
	use std::time::{Duration, Instant};
	use wiremock::matchers::method;
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn transport(server_endpoint: String, logger: Arc<RecordingLogger>) -> SyncTransport {
		TransportBuilder::new("token", server_endpoint)
			.retry_base_delay(Duration::from_millis(1))
			.logger(logger)
			.build_sync()
			.unwrap()
	}

	async fn server_with(template: ResponseTemplate) -> MockServer {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(template)
			.mount(&server)
			.await;
		server
	}

	async fn server_with_status(status: u16) -> MockServer {
		server_with(ResponseTemplate::new(status)).await
	}

	async fn request_count(server: &MockServer) -> usize {
		server.received_requests().await.unwrap().len()
	}

	#[tokio::test]
	async fn delivers_on_200() {
		let server = server_with_status(200).await;
		let logger = Arc::new(RecordingLogger::default());
		let transport = transport(endpoint(&server), logger.clone());

		transport.send(payload(1)).await.unwrap();

		assert_eq!(request_count(&server).await, 1);
		assert!(logger.lines().is_empty());
	}

	#[tokio::test]
	async fn permanent_failure_returns_status_without_retry() {
		let server = server_with_status(500).await;
		let logger = Arc::new(RecordingLogger::default());
		let transport = transport(endpoint(&server), logger.clone());

		let err = transport.send(payload(1)).await.unwrap_err();

		assert!(matches!(err, TransportError::UnexpectedStatus { status: 500 }));
		assert_eq!(request_count(&server).await, 1);
		assert!(logger.contains("undelivered payload"));
	}

	#[tokio::test]
	async fn rate_limited_by_server_is_retried_within_budget() {
		let server = server_with_status(429).await;
		let logger = Arc::new(RecordingLogger::default());
		let transport = transport(endpoint(&server), logger.clone());
		transport.set_retry_attempts(2);

		let err = transport.send(payload(1)).await.unwrap_err();

		assert!(matches!(err, TransportError::RateLimited { .. }));
		assert_eq!(request_count(&server).await, 3);
	}

	#[tokio::test]
	async fn connection_refused_is_a_network_error() {
		let logger = Arc::new(RecordingLogger::default());
		let transport = transport("http://127.0.0.1:1/api/1/item/".to_string(), logger.clone());
		transport.set_retry_attempts(1);

		let err = transport.send(payload(1)).await.unwrap_err();

		assert!(matches!(err, TransportError::Network(_)));
		assert!(logger.contains("POST failed"));
	}

	#[tokio::test]
	async fn client_rate_limit_skips_excess_items() {
		let server = server_with_status(200).await;
		let transport = transport(endpoint(&server), Arc::new(RecordingLogger::default()));
		transport.set_items_per_minute(2);

		for n in 0..3 {
			transport.send(payload(n)).await.unwrap();
		}

		assert_eq!(request_count(&server).await, 2);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn client_rate_limit_holds_under_concurrent_sends() {
		let server = server_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200))).await;
		let transport = Arc::new(transport(endpoint(&server), Arc::new(RecordingLogger::default())));
		transport.set_items_per_minute(1);

		let handles: Vec<_> = (0..5)
			.map(|n| {
				let transport = Arc::clone(&transport);
				tokio::spawn(async move { transport.send(payload(n)).await })
			})
			.collect();
		for handle in handles {
			handle.await.unwrap().unwrap();
		}

		assert_eq!(request_count(&server).await, 1);
	}

	#[tokio::test]
	async fn failed_delivery_frees_its_rate_limit_slot() {
		let server = server_with_status(500).await;
		let transport = transport(endpoint(&server), Arc::new(RecordingLogger::default()));
		transport.set_items_per_minute(1);

		assert!(transport.send(payload(1)).await.is_err());
		assert!(transport.send(payload(2)).await.is_err());

		assert_eq!(request_count(&server).await, 2);
	}

	#[tokio::test]
	async fn retry_waits_at_least_retry_after() {
		let server = server_with(ResponseTemplate::new(429).insert_header("retry-after", "1")).await;
		let transport = transport(endpoint(&server), Arc::new(RecordingLogger::default()));
		transport.set_retry_attempts(1);
		let started = Instant::now();

		let err = transport.send(payload(1)).await.unwrap_err();

		assert!(matches!(
			err,
			TransportError::RateLimited {
				retry_after_secs: Some(1)
			}
		));
		assert_eq!(request_count(&server).await, 2);
		assert!(started.elapsed() >= Duration::from_secs(1));
	}

	#[tokio::test]
	async fn print_payload_can_be_disabled() {
		let server = server_with_status(400).await;
		let logger = Arc::new(RecordingLogger::default());
		let transport = transport(endpoint(&server), logger.clone());
		transport.set_print_payload_on_error(false);

		let _ = transport.send(payload(1)).await;

		assert!(!logger.contains("undelivered payload"));
		assert!(logger.contains("received response: 400"));
	}

	#[tokio::test]
	async fn setters_update_config() {
		let transport = TransportBuilder::new("a", "http://localhost/").build_sync().unwrap();
		transport.set_token(AccessToken::new("b"));
		transport.set_endpoint("http://example.invalid/".to_string());

		let config = transport.config();
		assert_eq!(config.token.expose(), "b");
		assert_eq!(config.endpoint, "http://example.invalid/");
		transport.wait().await;
		transport.close().await.unwrap();
	}
}
