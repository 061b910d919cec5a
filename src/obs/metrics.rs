// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_lifecycle_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records `Success` or `Failure` depending on `result` and hands it back.
pub fn record_result<T, E>(kind: FlowKind, result: Result<T, E>) -> Result<T, E> {
	record_flow_outcome(
		kind,
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
	);

	result
}
