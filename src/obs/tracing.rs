// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by onramp flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("onramp_broker.flow", flow = kind.as_str(), stage);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Logs the error inside the span: rejections at `warn`, everything else at `error`.
	///
	/// Provider bodies and statuses are logged here so callers can surface
	/// [`Error::user_message`] without leaking them.
	pub fn record_error(&self, error: &Error) {
		#[cfg(feature = "tracing")]
		{
			let _entered = self.span.enter();

			if error.is_rejection() {
				tracing::warn!(flow = self.kind.as_str(), reason = %error, "onramp request rejected");
			} else {
				tracing::error!(
					flow = self.kind.as_str(),
					retryable = error.is_retryable(),
					error = %error,
					source = ?StdError::source(error).map(ToString::to_string),
					"onramp flow failed"
				);
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (self.kind, error);
		}
	}

	/// Logs the error inside the span at `debug`, for nested flows whose caller reports the
	/// failure at its own level.
	pub fn record_inner_error(&self, error: &Error) {
		#[cfg(feature = "tracing")]
		{
			let _entered = self.span.enter();

			tracing::debug!(
				flow = self.kind.as_str(),
				retryable = error.is_retryable(),
				error = %error,
				"nested onramp flow failed"
			);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = error;
		}
	}

	/// Logs a short progress event inside the span.
	pub fn record_stage(&self, stage: &'static str) {
		#[cfg(feature = "tracing")]
		{
			let _entered = self.span.enter();

			tracing::debug!(flow = self.kind.as_str(), stage, "onramp flow progressed");
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::request::ValidationError;

	#[test]
	fn record_error_accepts_every_error_class() {
		let span = FlowSpan::new(FlowKind::Session, "record_error");

		span.record_error(&ValidationError::UnsupportedAsset.into());
		span.record_error(&Error::Remote { status: 500, body: "boom".into(), retry_after: None });
		span.record_inner_error(&Error::Remote { status: 503, body: "busy".into(), retry_after: None });
		span.record_stage("after_errors");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::TokenExchange, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
