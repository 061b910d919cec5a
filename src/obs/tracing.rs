// crates.io
use tracing::{Instrument as _, Span, field, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Span handle used by manager operations.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"oauth2_lifecycle.flow",
			flow = kind.as_str(),
			stage,
			tenant = field::Empty,
			user = field::Empty,
		);

		Self { span }
	}

	/// Attaches the (tenant, user) pair once it is known.
	pub fn record_key(&self, tenant: &str, user: &str) {
		self.span.record("tenant", tenant);
		self.span.record("user", user);
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
