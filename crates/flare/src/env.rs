// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration from environment variables.
//!
//! The access token follows the `VAR` / `VAR_FILE` convention used by Docker
//! and Kubernetes secrets: when `FLARE_ACCESS_TOKEN_FILE` is set the token is
//! read from that file, otherwise `FLARE_ACCESS_TOKEN` is used directly.

use std::path::PathBuf;
use std::{env, fs};

use flare_core::AccessToken;

use crate::error::ConfigError;

/// Prefix of every variable read by [`EnvConfig::load`].
pub const ENV_PREFIX: &str = "FLARE";

/// Settings found in the environment. Unset variables are `None`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
	pub token: Option<AccessToken>,
	pub endpoint: Option<String>,
	pub environment: Option<String>,
	pub code_version: Option<String>,
	pub server_root: Option<String>,
}

impl EnvConfig {
	/// Read `FLARE_ACCESS_TOKEN`, `FLARE_ENDPOINT`, `FLARE_ENVIRONMENT`,
	/// `FLARE_CODE_VERSION` and `FLARE_SERVER_ROOT`.
	pub fn load() -> Result<Self, ConfigError> {
		Self::load_with_prefix(ENV_PREFIX)
	}

	pub fn load_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
		Ok(Self {
			token: load_token_env(&format!("{prefix}_ACCESS_TOKEN"))?,
			endpoint: non_empty_var(&format!("{prefix}_ENDPOINT")),
			environment: non_empty_var(&format!("{prefix}_ENVIRONMENT")),
			code_version: non_empty_var(&format!("{prefix}_CODE_VERSION")),
			server_root: non_empty_var(&format!("{prefix}_SERVER_ROOT")),
		})
	}
}

/// Load a token using the `VAR` / `VAR_FILE` convention.
///
/// `{var}_FILE` wins over `{var}`. A single trailing newline is stripped from
/// file content.
pub fn load_token_env(var: &str) -> Result<Option<AccessToken>, ConfigError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(ConfigError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
			path: path.clone(),
			source: e,
		})?;

		let token = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(Some(AccessToken::new(token)));
	}

	Ok(env::var(var).ok().map(AccessToken::new))
}

fn non_empty_var(var: &str) -> Option<String> {
	env::var(var).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn token_unset_is_none() {
		let var = "FLARE_TEST_UNSET_TOKEN";
		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));

		assert!(load_token_env(var).unwrap().is_none());
	}

	#[test]
	fn token_from_direct_var() {
		let var = "FLARE_TEST_DIRECT_TOKEN";
		env::set_var(var, "abc123");
		env::remove_var(format!("{var}_FILE"));

		let token = load_token_env(var).unwrap().unwrap();
		assert_eq!(token.expose(), "abc123");

		env::remove_var(var);
	}

	#[test]
	fn token_file_takes_precedence() {
		let var = "FLARE_TEST_FILE_TOKEN";
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();

		env::set_var(var, "from-env");
		env::set_var(format!("{var}_FILE"), file.path().to_str().unwrap());

		let token = load_token_env(var).unwrap().unwrap();
		assert_eq!(token.expose(), "from-file");

		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn empty_token_file_path_is_an_error() {
		let var = "FLARE_TEST_EMPTY_PATH_TOKEN";
		env::set_var(format!("{var}_FILE"), "");

		let err = load_token_env(var).unwrap_err();
		assert!(matches!(err, ConfigError::EmptyPath { .. }));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn missing_token_file_is_an_error() {
		let var = "FLARE_TEST_MISSING_FILE_TOKEN";
		env::set_var(format!("{var}_FILE"), "/nonexistent/flare/token");

		let err = load_token_env(var).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn load_with_prefix_reads_all_settings() {
		let prefix = "FLARE_TEST_PREFIXED";
		env::set_var(format!("{prefix}_ACCESS_TOKEN"), "tok");
		env::set_var(format!("{prefix}_ENDPOINT"), "http://collector.local/item/");
		env::set_var(format!("{prefix}_ENVIRONMENT"), "staging");
		env::set_var(format!("{prefix}_CODE_VERSION"), "abc123");
		env::set_var(format!("{prefix}_SERVER_ROOT"), "");

		let config = EnvConfig::load_with_prefix(prefix).unwrap();

		assert_eq!(config.token.unwrap().expose(), "tok");
		assert_eq!(config.endpoint.as_deref(), Some("http://collector.local/item/"));
		assert_eq!(config.environment.as_deref(), Some("staging"));
		assert_eq!(config.code_version.as_deref(), Some("abc123"));
		assert!(config.server_root.is_none());

		for suffix in ["ACCESS_TOKEN", "ENDPOINT", "ENVIRONMENT", "CODE_VERSION", "SERVER_ROOT"] {
			env::remove_var(format!("{prefix}_{suffix}"));
		}
	}
}
