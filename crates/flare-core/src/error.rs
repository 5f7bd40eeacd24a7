// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for core parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid level: {0}")]
	InvalidLevel(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
