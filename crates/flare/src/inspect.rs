// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pluggable strategies for walking error causes and finding their stacks.
//!
//! Each strategy is a plain function value so applications can teach the
//! walker about their own error types without implementing a trait on them.

use std::any::type_name;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use flare_core::Stack;

use crate::stack::capture_stack;

/// Returns the next error in a cause chain, if any.
pub type Unwrapper =
	Arc<dyn for<'a> Fn(&'a (dyn Error + 'static)) -> Option<&'a (dyn Error + 'static)> + Send + Sync>;

/// Returns the stack an error carries, if any.
pub type StackTracer = Arc<dyn Fn(&(dyn Error + 'static)) -> Option<Stack> + Send + Sync>;

/// Returns a type name for an error, if known.
pub type Classifier = Arc<dyn Fn(&(dyn Error + 'static)) -> Option<String> + Send + Sync>;

/// An error paired with the stack captured where it was wrapped.
///
/// Displays as the wrapped error and exposes the wrapped error's cause, so it
/// is transparent to the chain walker apart from contributing a stack and a
/// class name.
pub struct TracedError {
	inner: Box<dyn Error + Send + Sync + 'static>,
	type_name: &'static str,
	stack: Stack,
}

impl TracedError {
	/// Wrap `err`, capturing the caller's stack.
	#[inline(never)]
	pub fn new<E>(err: E) -> Self
	where
		E: Error + Send + Sync + 'static,
	{
		Self::with_stack(err, capture_stack(1))
	}

	/// Wrap `err` with an explicitly supplied stack.
	pub fn with_stack<E>(err: E, stack: Stack) -> Self
	where
		E: Error + Send + Sync + 'static,
	{
		Self {
			inner: Box::new(err),
			type_name: type_name::<E>(),
			stack,
		}
	}

	pub fn stack(&self) -> &Stack {
		&self.stack
	}

	/// Type name of the wrapped error.
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
		self.inner.as_ref()
	}
}

impl fmt::Debug for TracedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TracedError")
			.field("inner", &self.inner)
			.field("type_name", &self.type_name)
			.field("frames", &self.stack.len())
			.finish()
	}
}

impl fmt::Display for TracedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.inner, f)
	}
}

impl Error for TracedError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.inner.source()
	}
}

/// Extension for attaching a stack to the error of a `Result`.
pub trait TraceExt<T> {
	fn traced(self) -> Result<T, TracedError>;
}

impl<T, E> TraceExt<T> for Result<T, E>
where
	E: Error + Send + Sync + 'static,
{
	#[inline(never)]
	fn traced(self) -> Result<T, TracedError> {
		match self {
			Ok(value) => Ok(value),
			Err(err) => Err(TracedError::with_stack(err, capture_stack(1))),
		}
	}
}

fn source_of<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a (dyn Error + 'static)> {
	err.source()
}

fn traced_stack(err: &(dyn Error + 'static)) -> Option<Stack> {
	err.downcast_ref::<TracedError>().map(|traced| traced.stack.clone())
}

fn traced_class(err: &(dyn Error + 'static)) -> Option<String> {
	err.downcast_ref::<TracedError>()
		.map(|traced| traced.type_name.to_string())
}

/// Strategies the chain walker uses to inspect errors.
#[derive(Clone)]
pub struct ErrorInspector {
	unwrapper: Unwrapper,
	stack_tracer: StackTracer,
	classifiers: Vec<Classifier>,
}

impl Default for ErrorInspector {
	fn default() -> Self {
		Self {
			unwrapper: Arc::new(source_of),
			stack_tracer: Arc::new(traced_stack),
			classifiers: vec![Arc::new(traced_class)],
		}
	}
}

impl fmt::Debug for ErrorInspector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ErrorInspector")
			.field("classifiers", &self.classifiers.len())
			.finish_non_exhaustive()
	}
}

impl ErrorInspector {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the cause strategy.
	pub fn with_unwrapper<F>(mut self, unwrapper: F) -> Self
	where
		F: for<'a> Fn(&'a (dyn Error + 'static)) -> Option<&'a (dyn Error + 'static)>
			+ Send
			+ Sync
			+ 'static,
	{
		self.unwrapper = Arc::new(unwrapper);
		self
	}

	/// Replace the stack strategy.
	pub fn with_stack_tracer<F>(mut self, tracer: F) -> Self
	where
		F: Fn(&(dyn Error + 'static)) -> Option<Stack> + Send + Sync + 'static,
	{
		self.stack_tracer = Arc::new(tracer);
		self
	}

	/// Add a class strategy, consulted before the existing ones.
	pub fn with_classifier<F>(mut self, classifier: F) -> Self
	where
		F: Fn(&(dyn Error + 'static)) -> Option<String> + Send + Sync + 'static,
	{
		self.classifiers.insert(0, Arc::new(classifier));
		self
	}

	/// Report errors of type `E` under their type name instead of a checksum.
	pub fn with_named_type<E>(self) -> Self
	where
		E: Error + 'static,
	{
		self.with_classifier(|err| err.downcast_ref::<E>().map(|_| type_name::<E>().to_string()))
	}

	pub fn cause<'a>(&self, err: &'a (dyn Error + 'static)) -> Option<&'a (dyn Error + 'static)> {
		(self.unwrapper)(err)
	}

	pub fn stack(&self, err: &(dyn Error + 'static)) -> Option<Stack> {
		(self.stack_tracer)(err)
	}

	pub fn class_name(&self, err: &(dyn Error + 'static)) -> Option<String> {
		self.classifiers.iter().find_map(|classify| classify(err))
	}
}
