// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds the trace chain of an error and its causes.

use std::error::Error;

use flare_core::{error_class, ChainEntry, Stack, TraceChain};
use tracing::warn;

use crate::inspect::ErrorInspector;
use crate::stack::capture_stack;

/// Longest cause chain walked before truncating.
pub const MAX_CHAIN_LENGTH: usize = 32;

/// Walk `err` and its causes, head first, pairing each with a stack.
///
/// An error's own stack is used when it has one. Otherwise the entry gets an
/// empty stack if its parent carried a stack (the parent already locates the
/// failure), or a freshly captured one if not. `skip` is the number of frames
/// above the caller to drop from captured stacks.
#[inline(never)]
pub fn build_chain(err: &(dyn Error + 'static), skip: usize, inspector: &ErrorInspector) -> TraceChain {
	let mut chain = TraceChain::new();
	let mut current = Some(err);
	let mut parent_has_stack = false;

	while let Some(error) = current {
		if chain.len() >= MAX_CHAIN_LENGTH {
			warn!(max = MAX_CHAIN_LENGTH, "error chain truncated");
			break;
		}

		let own_stack = inspector.stack(error);
		let has_stack = own_stack.is_some();
		let frames = match own_stack {
			Some(stack) => stack,
			None if parent_has_stack => Stack::empty(),
			None => capture_stack(skip.saturating_add(1)),
		};

		let message = error.to_string();
		let class = error_class(inspector.class_name(error).as_deref(), &message);
		chain.push(ChainEntry::new(class, message, frames));

		parent_has_stack = has_stack;
		current = inspector.cause(error);
	}

	chain
}
