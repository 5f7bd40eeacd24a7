// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project access token with redacted formatting.

use std::fmt;

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

/// Access token embedded in every payload.
///
/// `Debug` and `Display` never print the value, so the token is safe to put in
/// tracing fields. Call [`AccessToken::expose`] where the raw value is needed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}

	/// An empty token turns every send into a no-op.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<&str> for AccessToken {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for AccessToken {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl fmt::Debug for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("AccessToken").field(&REDACTED).finish()
	}
}

impl fmt::Display for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}
