// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request details attached to request-scoped reports.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use http::request::Parts;
use regex::Regex;
use serde_json::{json, Value};
use url::form_urlencoded;

/// Replacement for scrubbed values.
pub const FILTERED: &str = "[FILTERED]";

/// Default pattern for header names whose values are scrubbed.
pub const DEFAULT_SCRUB_HEADERS: &str = "(?i)authorization";

/// Default pattern for query parameter names whose values are scrubbed.
pub const DEFAULT_SCRUB_FIELDS: &str = "(?i)password|secret|token";

type Params = BTreeMap<String, Vec<String>>;

/// Describe a request as `{url, method, headers, query_string, GET, user_ip?}`.
///
/// Headers whose name matches `scrub_headers` and query parameters whose name
/// matches `scrub_fields` have their values replaced with [`FILTERED`]. The
/// client address is taken from a [`SocketAddr`] request extension when
/// present.
pub fn request_details(parts: &Parts, scrub_headers: &Regex, scrub_fields: &Regex) -> Value {
	let query = parts.uri.query().unwrap_or_default();
	let params = scrub(
		group(form_urlencoded::parse(query.as_bytes()).into_owned()),
		scrub_fields,
	);

	let headers = scrub(
		group(parts.headers.iter().map(|(name, value)| {
			(
				name.as_str().to_string(),
				String::from_utf8_lossy(value.as_bytes()).into_owned(),
			)
		})),
		scrub_headers,
	);

	let mut details = json!({
		"url": parts.uri.to_string(),
		"method": parts.method.as_str(),
		"headers": flatten(&headers),
		"query_string": encode(&params),
		"GET": flatten(&params),
	});

	if let Some(addr) = parts.extensions.get::<SocketAddr>() {
		details["user_ip"] = Value::String(addr.ip().to_string());
	}

	details
}

fn group(pairs: impl Iterator<Item = (String, String)>) -> Params {
	let mut params = Params::new();
	for (key, value) in pairs {
		params.entry(key).or_default().push(value);
	}
	params
}

fn scrub(mut params: Params, pattern: &Regex) -> Params {
	for (key, values) in params.iter_mut() {
		if pattern.is_match(key) {
			*values = vec![FILTERED.to_string()];
		}
	}
	params
}

/// Single values become strings, repeated ones stay arrays.
fn flatten(params: &Params) -> Value {
	let map = params
		.iter()
		.map(|(key, values)| {
			let value = match values.as_slice() {
				[single] => Value::String(single.clone()),
				many => json!(many),
			};
			(key.clone(), value)
		})
		.collect();
	Value::Object(map)
}

fn encode(params: &Params) -> String {
	let mut serializer = form_urlencoded::Serializer::new(String::new());
	for (key, values) in params {
		for value in values {
			serializer.append_pair(key, value);
		}
	}
	serializer.finish()
}
