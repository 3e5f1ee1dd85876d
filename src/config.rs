//! Service configuration and its validating builder.
//!
//! Loading values from files or the environment is left to the host application; it hands the
//! resulting strings to [`OnrampConfigBuilder`], which rejects unusable limits and endpoints
//! before any request is served.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{ApiKeyId, ApiSecret},
	error::ConfigError,
	limit::LimitPolicy,
};

/// Provider endpoint that exchanges signed assertions for session tokens.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.developer.coinbase.com/onramp/v1/token";
/// Hosted purchase page users are redirected to.
pub const DEFAULT_PAY_URL: &str = "https://pay.coinbase.com/buy";
/// Upper bound for the token exchange round trip.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
/// Default hourly request budget per client.
pub const DEFAULT_MAX_REQUESTS_PER_HOUR: u32 = 10;
/// Default trailing-24-hour spend budget per client, in USD.
pub const DEFAULT_MAX_AMOUNT_PER_DAY: f64 = 1_000.;
/// Default per-transaction ceiling, in USD.
pub const DEFAULT_MAX_AMOUNT_PER_TX: f64 = 500.;

/// Validated configuration consumed by [`crate::service::OnrampService`].
#[derive(Clone, Debug)]
pub struct OnrampConfig {
	/// Provider API key identifier; required for session-token flows.
	pub api_key_id: Option<ApiKeyId>,
	/// Provider API secret material; required for session-token flows.
	pub api_secret: Option<ApiSecret>,
	/// Onramp application identifier; required for the legacy URL flow.
	pub app_id: Option<String>,
	/// Per-client request and spend budgets.
	pub limits: LimitPolicy,
	/// Per-transaction ceiling, in USD.
	pub max_amount_per_tx: f64,
	/// Token exchange endpoint.
	pub token_endpoint: Url,
	/// Base URL of the hosted purchase page.
	pub pay_url: Url,
	/// Timeout applied to the token exchange request.
	pub request_timeout: StdDuration,
}
impl OnrampConfig {
	/// Returns a builder seeded with production endpoints and default limits.
	pub fn builder() -> OnrampConfigBuilder {
		OnrampConfigBuilder::default()
	}
}

/// Builder for [`OnrampConfig`] values.
#[derive(Debug)]
pub struct OnrampConfigBuilder {
	api_key_id: Option<ApiKeyId>,
	api_secret: Option<ApiSecret>,
	app_id: Option<String>,
	max_requests_per_hour: u32,
	max_amount_per_day: f64,
	max_amount_per_tx: f64,
	token_endpoint: Option<Url>,
	pay_url: Option<Url>,
	request_timeout: StdDuration,
}
impl OnrampConfigBuilder {
	/// Sets the provider API key identifier.
	pub fn api_key_id(mut self, id: ApiKeyId) -> Self {
		self.api_key_id = Some(id);

		self
	}

	/// Sets the provider API secret material.
	pub fn api_secret(mut self, secret: ApiSecret) -> Self {
		self.api_secret = Some(secret);

		self
	}

	/// Sets the onramp application identifier used by legacy URLs.
	pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
		self.app_id = Some(app_id.into()).filter(|value: &String| !value.is_empty());

		self
	}

	/// Overrides the hourly request budget per client.
	pub fn max_requests_per_hour(mut self, max: u32) -> Self {
		self.max_requests_per_hour = max;

		self
	}

	/// Overrides the trailing-24-hour spend budget per client.
	pub fn max_amount_per_day(mut self, max: f64) -> Self {
		self.max_amount_per_day = max;

		self
	}

	/// Overrides the per-transaction ceiling.
	pub fn max_amount_per_tx(mut self, max: f64) -> Self {
		self.max_amount_per_tx = max;

		self
	}

	/// Overrides the token exchange endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the hosted purchase page URL.
	pub fn pay_url(mut self, url: Url) -> Self {
		self.pay_url = Some(url);

		self
	}

	/// Overrides the token exchange timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<OnrampConfig, ConfigError> {
		if self.max_requests_per_hour == 0 {
			return Err(ConfigError::InvalidLimit {
				name: "max_requests_per_hour",
				value: self.max_requests_per_hour.to_string(),
			});
		}

		validate_amount("max_amount_per_day", self.max_amount_per_day)?;
		validate_amount("max_amount_per_tx", self.max_amount_per_tx)?;

		if self.request_timeout.is_zero() {
			return Err(ConfigError::NonPositiveTimeout);
		}

		let token_endpoint = match self.token_endpoint {
			Some(url) => url,
			None => parse_default(DEFAULT_TOKEN_ENDPOINT)?,
		};
		let pay_url = match self.pay_url {
			Some(url) => url,
			None => parse_default(DEFAULT_PAY_URL)?,
		};

		validate_endpoint("token", &token_endpoint)?;
		validate_endpoint("pay", &pay_url)?;

		Ok(OnrampConfig {
			api_key_id: self.api_key_id,
			api_secret: self.api_secret,
			app_id: self.app_id,
			limits: LimitPolicy::new(self.max_requests_per_hour, self.max_amount_per_day),
			max_amount_per_tx: self.max_amount_per_tx,
			token_endpoint,
			pay_url,
			request_timeout: self.request_timeout,
		})
	}
}
impl Default for OnrampConfigBuilder {
	fn default() -> Self {
		Self {
			api_key_id: None,
			api_secret: None,
			app_id: None,
			max_requests_per_hour: DEFAULT_MAX_REQUESTS_PER_HOUR,
			max_amount_per_day: DEFAULT_MAX_AMOUNT_PER_DAY,
			max_amount_per_tx: DEFAULT_MAX_AMOUNT_PER_TX,
			token_endpoint: None,
			pay_url: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

fn validate_amount(name: &'static str, value: f64) -> Result<(), ConfigError> {
	if value.is_finite() && value > 0. {
		Ok(())
	} else {
		Err(ConfigError::InvalidLimit { name, value: value.to_string() })
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if matches!(url.scheme(), "https" | "http") && url.has_host() {
		Ok(())
	} else {
		Err(ConfigError::InvalidEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn parse_default(raw: &'static str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|_| ConfigError::InvalidEndpoint { endpoint: "default", url: raw.into() })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_point_at_production_endpoints() {
		let config = OnrampConfig::builder().build().expect("Default config should build.");

		assert_eq!(config.token_endpoint.as_str(), DEFAULT_TOKEN_ENDPOINT);
		assert_eq!(config.pay_url.as_str(), DEFAULT_PAY_URL);
		assert_eq!(config.request_timeout, StdDuration::from_secs(30));
		assert_eq!(config.limits.max_requests_per_hour, DEFAULT_MAX_REQUESTS_PER_HOUR);
		assert!(config.api_key_id.is_none());
		assert!(config.app_id.is_none());
	}

	#[test]
	fn rejects_unusable_limits() {
		let err = OnrampConfig::builder()
			.max_requests_per_hour(0)
			.build()
			.expect_err("Zero hourly budget must be rejected.");

		assert!(matches!(err, ConfigError::InvalidLimit { name: "max_requests_per_hour", .. }));

		let err = OnrampConfig::builder()
			.max_amount_per_day(f64::NAN)
			.build()
			.expect_err("NaN daily budget must be rejected.");

		assert!(matches!(err, ConfigError::InvalidLimit { name: "max_amount_per_day", .. }));

		let err = OnrampConfig::builder()
			.max_amount_per_tx(-5.)
			.build()
			.expect_err("Negative per-transaction ceiling must be rejected.");

		assert!(matches!(err, ConfigError::InvalidLimit { name: "max_amount_per_tx", .. }));
	}

	#[test]
	fn rejects_non_http_endpoints_and_zero_timeout() {
		let err = OnrampConfig::builder()
			.token_endpoint(Url::parse("ftp://example.com/token").expect("URL should parse."))
			.build()
			.expect_err("Non-HTTP endpoint must be rejected.");

		assert!(matches!(err, ConfigError::InvalidEndpoint { endpoint: "token", .. }));

		let err = OnrampConfig::builder()
			.request_timeout(StdDuration::ZERO)
			.build()
			.expect_err("Zero timeout must be rejected.");

		assert!(matches!(err, ConfigError::NonPositiveTimeout));
	}

	#[test]
	fn empty_app_id_counts_as_missing() {
		let config = OnrampConfig::builder().app_id("").build().expect("Config should build.");

		assert!(config.app_id.is_none());
	}
}
