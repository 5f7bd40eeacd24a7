// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assembles report payloads.

use std::sync::Arc;

use chrono::Utc;
use flare_core::{AccessToken, Level, Payload, TraceChain};
use regex::Regex;
use serde_json::{json, Value};

use crate::inspect::ErrorInspector;

pub const NOTIFIER_NAME: &str = "flare-rust";
pub const NOTIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LANGUAGE: &str = "rust";

/// Predicate deciding whether a caught panic should be ignored.
pub type CheckIgnore = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Everything the payload builder reads, captured as one snapshot.
#[derive(Clone)]
pub(crate) struct ReportConfig {
	pub token: AccessToken,
	pub environment: String,
	pub endpoint: String,
	pub platform: String,
	pub code_version: String,
	pub server_host: String,
	pub server_root: String,
	pub custom: Payload,
	pub fingerprint: bool,
	pub scrub_headers: Regex,
	pub scrub_fields: Regex,
	pub check_ignore: CheckIgnore,
	pub inspector: ErrorInspector,
}

/// `data` section shared by every report kind.
pub(crate) fn base_data(
	config: &ReportConfig,
	level: Level,
	title: &str,
	extras: Option<Payload>,
) -> Payload {
	let mut data = Payload::new();
	data.insert("environment".into(), json!(config.environment));
	data.insert("title".into(), json!(title));
	data.insert("level".into(), json!(level));
	data.insert("timestamp".into(), json!(Utc::now().timestamp()));
	data.insert("platform".into(), json!(config.platform));
	data.insert("language".into(), json!(LANGUAGE));
	data.insert("code_version".into(), json!(config.code_version));
	data.insert(
		"server".into(),
		json!({ "host": config.server_host, "root": config.server_root }),
	);
	data.insert(
		"notifier".into(),
		json!({ "name": NOTIFIER_NAME, "version": NOTIFIER_VERSION }),
	);

	if let Some(custom) = merge_custom(&config.custom, extras) {
		data.insert("custom".into(), Value::Object(custom));
	}

	data
}

/// Custom data for one report: extras override configured keys.
fn merge_custom(custom: &Payload, extras: Option<Payload>) -> Option<Payload> {
	match extras {
		None if custom.is_empty() => None,
		None => Some(custom.clone()),
		Some(extras) => {
			let mut merged = custom.clone();
			merged.extend(extras);
			Some(merged)
		}
	}
}

/// Attach a trace chain as the body, plus its fingerprint when enabled.
pub(crate) fn attach_chain(data: &mut Payload, chain: &TraceChain, fingerprint: bool) {
	data.insert("body".into(), json!(chain));
	if fingerprint {
		data.insert("fingerprint".into(), json!(chain.fingerprint()));
	}
}

pub(crate) fn attach_message(data: &mut Payload, message: &str) {
	data.insert("body".into(), json!({ "message": { "body": message } }));
}

/// Wrap `data` into the top-level item.
pub(crate) fn envelope(token: &AccessToken, data: Payload) -> Payload {
	let mut root = Payload::new();
	root.insert("access_token".into(), json!(token.expose()));
	root.insert("data".into(), Value::Object(data));
	root
}
