//! Crate-level error types shared across validation, limiting, signing, and transport.

// self
use crate::{_prelude::*, limit::RetryDirective, request::ValidationError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message surfaced to end users when the failure must not leak provider internals.
pub const GENERIC_USER_MESSAGE: &str = "Unable to start an onramp session. Please try again.";

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Request parameters failed structural validation; user-correctable, never retried.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Client exceeded its hourly request budget.
	#[error("{}", .0.reason)]
	RateLimited(RetryDirective),
	/// Amount would exceed the client's remaining daily spend budget.
	#[error("{}", .0.reason)]
	SpendLimited(RetryDirective),
	/// Local configuration problem; operator-fixable.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Secret material could not be turned into a signed assertion.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Provider answered with a non-success HTTP status.
	#[error("Provider returned HTTP {status}: {body}.")]
	Remote {
		/// HTTP status code returned by the provider.
		status: u16,
		/// Raw response body, kept for operator logs.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Provider answered successfully but the payload was not usable.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Limiter storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::limit::StoreError,
	),
}
impl Error {
	/// Returns the message that is safe to show to the end user.
	///
	/// Validation and limit errors carry their own short explanation; every other failure
	/// collapses into [`GENERIC_USER_MESSAGE`].
	pub fn user_message(&self) -> String {
		match self {
			Self::Validation(e) => e.to_string(),
			Self::RateLimited(directive) | Self::SpendLimited(directive) =>
				directive.reason.clone(),
			_ => GENERIC_USER_MESSAGE.into(),
		}
	}

	/// Returns `true` when the caller may retry the request later with backoff.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::Remote { .. } | Self::Protocol(_) | Self::Transport(_) | Self::Storage(_)
		)
	}

	/// Returns `true` for failures caused by the caller's input or budget.
	pub fn is_rejection(&self) -> bool {
		matches!(self, Self::Validation(_) | Self::RateLimited(_) | Self::SpendLimited(_))
	}
}

/// Configuration and validation failures raised before any network call.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// API key identifier is not configured.
	#[error("Onramp API key identifier is not configured.")]
	MissingApiKeyId,
	/// API secret is not configured.
	#[error("Onramp API secret is not configured.")]
	MissingApiSecret,
	/// Application identifier required by the legacy URL flow is not configured.
	#[error("Onramp application identifier is not configured.")]
	MissingAppId,
	/// A limit was zero, negative, or not finite.
	#[error("The {name} limit must be a positive finite number, got {value}.")]
	InvalidLimit {
		/// Limit name.
		name: &'static str,
		/// Rejected value, rendered for diagnostics.
		value: String,
	},
	/// Endpoint URL cannot be used for HTTP requests.
	#[error("The {endpoint} URL must use http or https: {url}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures turning configured secret material into a signed assertion.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// Secret is not valid base64.
	#[error("API secret is not valid base64.")]
	SecretDecode {
		/// Underlying decoding failure.
		#[source]
		source: base64::DecodeError,
	},
	/// Secret decoded to the wrong number of bytes.
	#[error("API secret must decode to 64 bytes, got {len}.")]
	SecretLength {
		/// Decoded length.
		len: usize,
	},
	/// Header or claims could not be serialized.
	#[error("Assertion claims could not be serialized.")]
	Encode(#[from] serde_json::Error),
}

/// Successful provider responses that do not carry a usable session token.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Response body was not the expected JSON document.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Response parsed but the token field was absent or empty.
	#[error("Token endpoint response is missing the session token.")]
	MissingToken {
		/// HTTP status code of the response.
		status: u16,
	},
}

/// Transport-level failures (network, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("Token endpoint did not respond within the configured timeout.")]
	Timeout,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::limit::StoreError;

	#[test]
	fn store_error_converts_into_error_with_source() {
		let store_error = StoreError::Backend { message: "limiter unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("limiter unreachable"));

		let source = StdError::source(&error)
			.expect("Error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn provider_failures_collapse_into_generic_user_message() {
		let remote = Error::Remote {
			status: 502,
			body: "{\"message\":\"upstream exploded\"}".into(),
			retry_after: None,
		};

		assert_eq!(remote.user_message(), GENERIC_USER_MESSAGE);
		assert!(remote.is_retryable());
		assert!(remote.to_string().contains("upstream exploded"));

		let signing: Error = SigningError::SecretLength { len: 12 }.into();

		assert_eq!(signing.user_message(), GENERIC_USER_MESSAGE);
		assert!(!signing.is_retryable());
	}

	#[test]
	fn rejections_keep_their_own_message() {
		let directive = RetryDirective::new(OffsetDateTime::UNIX_EPOCH, Duration::minutes(5))
			.with_reason("Rate limit exceeded. Try again in 5 minutes.");
		let error = Error::RateLimited(directive);

		assert!(error.is_rejection());
		assert!(!error.is_retryable());
		assert_eq!(error.user_message(), "Rate limit exceeded. Try again in 5 minutes.");
		assert_eq!(error.to_string(), "Rate limit exceeded. Try again in 5 minutes.");
	}
}
