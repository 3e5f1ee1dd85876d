//! Fiat-to-crypto onramp mediation: validate purchase requests, enforce sliding-window rate and
//! spend budgets per client, sign short-lived provider credentials, and hand back the redirect
//! URL that completes the purchase.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod limit;
pub mod obs;
pub mod redirect;
pub mod request;
pub mod service;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	use ed25519_dalek::SigningKey;
	// self
	use crate::{
		auth::{ApiKeyId, ApiSecret},
		config::OnrampConfig,
		http::ReqwestHttpClient,
		service::OnrampService,
	};

	/// Service type alias used by reqwest-backed integration tests.
	pub type ReqwestTestService = OnrampService<ReqwestHttpClient>;

	/// Seed used for the deterministic test signing key.
	pub const TEST_KEY_SEED: [u8; 32] = [7; 32];
	/// API key identifier used across test fixtures.
	pub const TEST_API_KEY_ID: &str = "organizations/test-org/apiKeys/test-key";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Returns the signing key matching [`test_api_secret`].
	pub fn test_signing_key() -> SigningKey {
		SigningKey::from_bytes(&TEST_KEY_SEED)
	}

	/// Encodes the seed and public half of the test key the way the provider issues secrets.
	pub fn test_api_secret() -> ApiSecret {
		let key = test_signing_key();
		let mut material = Vec::with_capacity(64);

		material.extend_from_slice(&TEST_KEY_SEED);
		material.extend_from_slice(key.verifying_key().as_bytes());

		ApiSecret::new(STANDARD.encode(material))
	}

	/// Builds a fully-credentialed configuration pointing at the given token endpoint.
	pub fn test_config(token_endpoint: &str) -> OnrampConfig {
		OnrampConfig::builder()
			.api_key_id(
				ApiKeyId::new(TEST_API_KEY_ID).expect("Test API key identifier should be valid."),
			)
			.api_secret(test_api_secret())
			.app_id("test-app-id")
			.token_endpoint(
				Url::parse(token_endpoint).expect("Test token endpoint should parse successfully."),
			)
			.build()
			.expect("Test configuration should build successfully.")
	}

	/// Constructs an [`OnrampService`] backed by the in-memory limiter and the insecure reqwest
	/// transport used across integration tests.
	pub fn build_reqwest_test_service(config: OnrampConfig) -> ReqwestTestService {
		OnrampService::with_http_client(config, test_reqwest_http_client())
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, tokio as _};
