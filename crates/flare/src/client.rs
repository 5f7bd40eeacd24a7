// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reporting client: turns errors and messages into payloads and hands them
//! to a transport.

use std::any::Any;
use std::error::Error;
use std::future::Future;
use std::panic::{self, UnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use flare_core::{AccessToken, Level, Payload, PLACEHOLDER_TITLE};
use http::request::Parts;
use parking_lot::RwLock;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chain::build_chain;
use crate::env::EnvConfig;
use crate::error::{ClientError, ConfigError, Result};
use crate::inspect::ErrorInspector;
use crate::logger::{default_logger, SharedLogger};
use crate::payload::{attach_chain, attach_message, base_data, envelope, CheckIgnore, ReportConfig};
use crate::request::{request_details, DEFAULT_SCRUB_FIELDS, DEFAULT_SCRUB_HEADERS};
use crate::transport::{Transport, TransportBuilder, TransportConfig, DEFAULT_BUFFER, DEFAULT_ENDPOINT};

/// Environment used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Which built-in transport a client delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
	/// Background queue of the given capacity.
	Async { buffer: usize },
	/// Inline delivery in the reporting task.
	Sync,
}

impl Default for TransportKind {
	fn default() -> Self {
		TransportKind::Async {
			buffer: DEFAULT_BUFFER,
		}
	}
}

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
	token: AccessToken,
	environment: Option<String>,
	endpoint: Option<String>,
	code_version: Option<String>,
	server_host: Option<String>,
	server_root: Option<String>,
	platform: Option<String>,
	custom: Payload,
	fingerprint: bool,
	scrub_headers: Option<Regex>,
	scrub_fields: Option<Regex>,
	check_ignore: Option<CheckIgnore>,
	inspector: ErrorInspector,
	transport_kind: TransportKind,
	transport_config: TransportConfig,
	logger: SharedLogger,
	http_client: Option<reqwest::Client>,
	cancellation: Option<CancellationToken>,
	transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
	pub fn new() -> Self {
		Self {
			token: AccessToken::default(),
			environment: None,
			endpoint: None,
			code_version: None,
			server_host: None,
			server_root: None,
			platform: None,
			custom: Payload::new(),
			fingerprint: false,
			scrub_headers: None,
			scrub_fields: None,
			check_ignore: None,
			inspector: ErrorInspector::default(),
			transport_kind: TransportKind::default(),
			transport_config: TransportConfig::default(),
			logger: default_logger(),
			http_client: None,
			cancellation: None,
			transport: None,
		}
	}

	/// Start from `FLARE_*` environment variables.
	pub fn from_env() -> std::result::Result<Self, ConfigError> {
		Ok(Self::new().with_env(EnvConfig::load()?))
	}

	/// Apply every setting present in `env`.
	pub fn with_env(mut self, env: EnvConfig) -> Self {
		if let Some(token) = env.token {
			self.token = token;
		}
		self.endpoint = env.endpoint.or(self.endpoint);
		self.environment = env.environment.or(self.environment);
		self.code_version = env.code_version.or(self.code_version);
		self.server_root = env.server_root.or(self.server_root);
		self
	}

	/// Project access token. An empty token turns delivery into a no-op.
	pub fn access_token(mut self, token: impl Into<AccessToken>) -> Self {
		self.token = token.into();
		self
	}

	/// Example: `production`, `staging`, `development`
	pub fn environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	/// Example: `1.2.3` or a git commit SHA
	pub fn code_version(mut self, version: impl Into<String>) -> Self {
		self.code_version = Some(version.into());
		self
	}

	/// Defaults to the machine hostname.
	pub fn server_host(mut self, host: impl Into<String>) -> Self {
		self.server_host = Some(host.into());
		self
	}

	pub fn server_root(mut self, root: impl Into<String>) -> Self {
		self.server_root = Some(root.into());
		self
	}

	/// Defaults to the target operating system.
	pub fn platform(mut self, platform: impl Into<String>) -> Self {
		self.platform = Some(platform.into());
		self
	}

	/// Custom data sent with every report.
	pub fn custom(mut self, custom: Payload) -> Self {
		self.custom = custom;
		self
	}

	/// Send the stack-derived fingerprint so the collector groups by it.
	pub fn fingerprint(mut self, enabled: bool) -> Self {
		self.fingerprint = enabled;
		self
	}

	pub fn scrub_headers(mut self, pattern: Regex) -> Self {
		self.scrub_headers = Some(pattern);
		self
	}

	pub fn scrub_fields(mut self, pattern: Regex) -> Self {
		self.scrub_fields = Some(pattern);
		self
	}

	/// Predicate consulted with the text of a caught panic; `true` skips the report.
	pub fn check_ignore<F>(mut self, check: F) -> Self
	where
		F: Fn(&str) -> bool + Send + Sync + 'static,
	{
		self.check_ignore = Some(Arc::new(check));
		self
	}

	pub fn inspector(mut self, inspector: ErrorInspector) -> Self {
		self.inspector = inspector;
		self
	}

	/// Deliver from a background queue of `buffer` items. This is the default.
	pub fn async_transport(mut self, buffer: usize) -> Self {
		self.transport_kind = TransportKind::Async { buffer };
		self
	}

	/// Deliver inline, returning each delivery's outcome.
	pub fn sync_transport(mut self) -> Self {
		self.transport_kind = TransportKind::Sync;
		self
	}

	/// Deliver through a caller-supplied transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn retry_attempts(mut self, retry_attempts: u32) -> Self {
		self.transport_config.retry_attempts = retry_attempts;
		self
	}

	pub fn items_per_minute(mut self, items_per_minute: u32) -> Self {
		self.transport_config.items_per_minute = items_per_minute;
		self
	}

	pub fn print_payload_on_error(mut self, enabled: bool) -> Self {
		self.transport_config.print_payload_on_error = enabled;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.transport_config.request_timeout = timeout;
		self
	}

	pub fn retry_base_delay(mut self, delay: Duration) -> Self {
		self.transport_config.retry_base_delay = delay;
		self
	}

	pub fn logger(mut self, logger: SharedLogger) -> Self {
		self.logger = logger;
		self
	}

	pub fn http_client(mut self, client: reqwest::Client) -> Self {
		self.http_client = Some(client);
		self
	}

	pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);
		self
	}

	/// Builds the client. The async transport needs a running Tokio runtime.
	pub fn build(self) -> std::result::Result<Client, ClientError> {
		let scrub_headers = match self.scrub_headers {
			Some(pattern) => pattern,
			None => Regex::new(DEFAULT_SCRUB_HEADERS)?,
		};
		let scrub_fields = match self.scrub_fields {
			Some(pattern) => pattern,
			None => Regex::new(DEFAULT_SCRUB_FIELDS)?,
		};

		let endpoint = self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
		let report = ReportConfig {
			token: self.token.clone(),
			environment: self
				.environment
				.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
			endpoint: endpoint.clone(),
			platform: self
				.platform
				.unwrap_or_else(|| std::env::consts::OS.to_string()),
			code_version: self.code_version.unwrap_or_default(),
			server_host: self.server_host.unwrap_or_else(default_host),
			server_root: self.server_root.unwrap_or_default(),
			custom: self.custom,
			fingerprint: self.fingerprint,
			scrub_headers,
			scrub_fields,
			check_ignore: self
				.check_ignore
				.unwrap_or_else(|| Arc::new(never_ignore) as CheckIgnore),
			inspector: self.inspector,
		};

		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => {
				let config = TransportConfig {
					token: self.token,
					endpoint,
					..self.transport_config
				};
				let mut builder = TransportBuilder::from_config(config).logger(self.logger);
				if let Some(client) = self.http_client {
					builder = builder.http_client(client);
				}
				if let Some(token) = self.cancellation {
					builder = builder.cancellation_token(token);
				}
				match self.transport_kind {
					TransportKind::Async { buffer } => Arc::new(builder.buffer(buffer).build_async()?),
					TransportKind::Sync => Arc::new(builder.build_sync()?),
				}
			}
		};

		info!(
			environment = %report.environment,
			endpoint = %report.endpoint,
			"flare client initialized"
		);

		Ok(Client {
			inner: Arc::new(ClientInner {
				report: RwLock::new(Arc::new(report)),
				transport,
			}),
		})
	}
}

impl Default for ClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn never_ignore(_: &str) -> bool {
	false
}

fn default_host() -> String {
	hostname::get()
		.ok()
		.and_then(|name| name.into_string().ok())
		.unwrap_or_default()
}

struct ClientInner {
	report: RwLock<Arc<ReportConfig>>,
	transport: Arc<dyn Transport>,
}

/// Reporting handle. Cheap to clone; clones share configuration and transport.
///
/// Every reporting method builds its payload before returning, so the
/// returned future owns everything it needs and can be spawned.
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

/// Pending delivery of one report.
pub type Delivery = std::pin::Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

impl Client {
	pub fn builder() -> ClientBuilder {
		ClientBuilder::new()
	}

	fn snapshot(&self) -> Arc<ReportConfig> {
		Arc::clone(&self.inner.report.read())
	}

	fn update(&self, apply: impl FnOnce(&mut ReportConfig)) {
		let mut guard = self.inner.report.write();
		let mut next = ReportConfig::clone(&guard);
		apply(&mut next);
		*guard = Arc::new(next);
	}

	fn deliver(&self, payload: Payload) -> Delivery {
		let transport = Arc::clone(&self.inner.transport);
		Box::pin(async move { transport.send(payload).await })
	}

	// -- Error reporting

	/// Report an error and its causes.
	#[inline(never)]
	pub fn error(&self, level: Level, err: &(dyn Error + 'static)) -> Delivery {
		self.error_payload(level, err, 1, None, None)
	}

	/// Report an error with extra custom data for this report only.
	#[inline(never)]
	pub fn error_with_extras(&self, level: Level, err: &(dyn Error + 'static), extras: Payload) -> Delivery {
		self.error_payload(level, err, 1, Some(extras), None)
	}

	/// Report an error, dropping `skip` frames above the caller from captured stacks.
	#[inline(never)]
	pub fn error_with_stack_skip(&self, level: Level, err: &(dyn Error + 'static), skip: usize) -> Delivery {
		self.error_payload(level, err, skip.saturating_add(1), None, None)
	}

	#[inline(never)]
	pub fn error_with_stack_skip_with_extras(
		&self,
		level: Level,
		err: &(dyn Error + 'static),
		skip: usize,
		extras: Payload,
	) -> Delivery {
		self.error_payload(level, err, skip.saturating_add(1), Some(extras), None)
	}

	/// Report an error that occurred while serving `request`.
	#[inline(never)]
	pub fn request_error(&self, level: Level, request: &Parts, err: &(dyn Error + 'static)) -> Delivery {
		self.error_payload(level, err, 1, None, Some(request))
	}

	#[inline(never)]
	pub fn request_error_with_extras(
		&self,
		level: Level,
		request: &Parts,
		err: &(dyn Error + 'static),
		extras: Payload,
	) -> Delivery {
		self.error_payload(level, err, 1, Some(extras), Some(request))
	}

	#[inline(never)]
	fn error_payload(
		&self,
		level: Level,
		err: &(dyn Error + 'static),
		skip: usize,
		extras: Option<Payload>,
		request: Option<&Parts>,
	) -> Delivery {
		let report = self.snapshot();

		let title = err.to_string();
		let title = if title.is_empty() { PLACEHOLDER_TITLE } else { &title };
		let mut data = base_data(&report, level, title, extras);

		let chain = build_chain(err, skip.saturating_add(1), &report.inspector);
		attach_chain(&mut data, &chain, report.fingerprint);
		if let Some(request) = request {
			data.insert(
				"request".into(),
				request_details(request, &report.scrub_headers, &report.scrub_fields),
			);
		}

		debug!(level = %level, causes = chain.len(), "reporting error");
		self.deliver(envelope(&report.token, data))
	}

	// -- Message reporting

	pub fn message(&self, level: Level, message: &str) -> Delivery {
		self.message_payload(level, message, None, None)
	}

	pub fn message_with_extras(&self, level: Level, message: &str, extras: Payload) -> Delivery {
		self.message_payload(level, message, Some(extras), None)
	}

	pub fn request_message(&self, level: Level, request: &Parts, message: &str) -> Delivery {
		self.message_payload(level, message, None, Some(request))
	}

	pub fn request_message_with_extras(
		&self,
		level: Level,
		request: &Parts,
		message: &str,
		extras: Payload,
	) -> Delivery {
		self.message_payload(level, message, Some(extras), Some(request))
	}

	fn message_payload(
		&self,
		level: Level,
		message: &str,
		extras: Option<Payload>,
		request: Option<&Parts>,
	) -> Delivery {
		let report = self.snapshot();
		let mut data = base_data(&report, level, message, extras);
		attach_message(&mut data, message);
		if let Some(request) = request {
			data.insert(
				"request".into(),
				request_details(request, &report.scrub_headers, &report.scrub_fields),
			);
		}
		self.deliver(envelope(&report.token, data))
	}

	// -- Panics

	/// Run `f`, reporting a panic at critical level unless the check-ignore
	/// predicate accepts its text. The panic payload is handed back.
	pub async fn wrap<F, R>(&self, f: F) -> std::thread::Result<R>
	where
		F: FnOnce() -> R + UnwindSafe,
	{
		match panic::catch_unwind(f) {
			Ok(value) => Ok(value),
			Err(payload) => {
				if let Some(delivery) = self.panic_report(payload.as_ref()) {
					// Delivery failures are already on the diagnostic sink.
					let _ = delivery.await;
				}
				Err(payload)
			}
		}
	}

	/// Like [`wrap`](Self::wrap), then waits for the transport to drain.
	pub async fn wrap_and_wait<F, R>(&self, f: F) -> std::thread::Result<R>
	where
		F: FnOnce() -> R + UnwindSafe,
	{
		let result = self.wrap(f).await;
		if result.is_err() {
			self.wait().await;
		}
		result
	}

	#[inline(never)]
	fn panic_report(&self, payload: &(dyn Any + Send)) -> Option<Delivery> {
		let check_ignore = Arc::clone(&self.snapshot().check_ignore);

		if let Some(err) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
			if check_ignore(&err.to_string()) {
				return None;
			}
			let err: &(dyn Error + 'static) = &**err;
			return Some(self.error_payload(Level::Critical, err, 2, None, None));
		}

		let text = panic_message(payload);
		if check_ignore(&text) {
			return None;
		}
		Some(self.message(Level::Critical, &text))
	}

	// -- Lifecycle

	/// Wait until every accepted report has been delivered or dropped.
	pub async fn wait(&self) {
		self.inner.transport.wait().await;
	}

	/// Stop accepting reports and drain the transport.
	pub async fn close(&self) -> Result<()> {
		self.inner.transport.close().await
	}

	// -- Configuration

	pub fn set_token(&self, token: impl Into<AccessToken>) {
		let token = token.into();
		self.inner.transport.set_token(token.clone());
		self.update(|report| report.token = token);
	}

	pub fn set_endpoint(&self, endpoint: impl Into<String>) {
		let endpoint = endpoint.into();
		self.inner.transport.set_endpoint(endpoint.clone());
		self.update(|report| report.endpoint = endpoint);
	}

	pub fn set_environment(&self, environment: impl Into<String>) {
		let environment = environment.into();
		self.update(|report| report.environment = environment);
	}

	pub fn set_code_version(&self, version: impl Into<String>) {
		let version = version.into();
		self.update(|report| report.code_version = version);
	}

	pub fn set_server_host(&self, host: impl Into<String>) {
		let host = host.into();
		self.update(|report| report.server_host = host);
	}

	pub fn set_server_root(&self, root: impl Into<String>) {
		let root = root.into();
		self.update(|report| report.server_root = root);
	}

	pub fn set_platform(&self, platform: impl Into<String>) {
		let platform = platform.into();
		self.update(|report| report.platform = platform);
	}

	pub fn set_custom(&self, custom: Payload) {
		self.update(|report| report.custom = custom);
	}

	pub fn set_fingerprint(&self, enabled: bool) {
		self.update(|report| report.fingerprint = enabled);
	}

	pub fn set_scrub_headers(&self, pattern: Regex) {
		self.update(|report| report.scrub_headers = pattern);
	}

	pub fn set_scrub_fields(&self, pattern: Regex) {
		self.update(|report| report.scrub_fields = pattern);
	}

	pub fn set_check_ignore<F>(&self, check: F)
	where
		F: Fn(&str) -> bool + Send + Sync + 'static,
	{
		let check: CheckIgnore = Arc::new(check);
		self.update(|report| report.check_ignore = check);
	}

	pub fn set_inspector(&self, inspector: ErrorInspector) {
		self.update(|report| report.inspector = inspector);
	}

	pub fn set_logger(&self, logger: SharedLogger) {
		self.inner.transport.set_logger(logger);
	}

	pub fn set_retry_attempts(&self, retry_attempts: u32) {
		self.inner.transport.set_retry_attempts(retry_attempts);
	}

	pub fn set_items_per_minute(&self, items_per_minute: u32) {
		self.inner.transport.set_items_per_minute(items_per_minute);
	}

	pub fn set_print_payload_on_error(&self, enabled: bool) {
		self.inner.transport.set_print_payload_on_error(enabled);
	}

	pub fn token(&self) -> AccessToken {
		self.snapshot().token.clone()
	}

	pub fn environment(&self) -> String {
		self.snapshot().environment.clone()
	}

	pub fn endpoint(&self) -> String {
		self.snapshot().endpoint.clone()
	}

	pub fn code_version(&self) -> String {
		self.snapshot().code_version.clone()
	}

	pub fn server_host(&self) -> String {
		self.snapshot().server_host.clone()
	}

	pub fn server_root(&self) -> String {
		self.snapshot().server_root.clone()
	}

	pub fn platform(&self) -> String {
		self.snapshot().platform.clone()
	}

	pub fn custom(&self) -> Payload {
		self.snapshot().custom.clone()
	}

	pub fn fingerprint(&self) -> bool {
		self.snapshot().fingerprint
	}

	pub fn scrub_headers(&self) -> Regex {
		self.snapshot().scrub_headers.clone()
	}

	pub fn scrub_fields(&self) -> Regex {
		self.snapshot().scrub_fields.clone()
	}

	pub fn retry_attempts(&self) -> u32 {
		self.inner.transport.config().retry_attempts
	}

	pub fn items_per_minute(&self) -> u32 {
		self.inner.transport.config().items_per_minute
	}
}

/// Text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
