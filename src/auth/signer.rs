//! Short-lived Ed25519 assertions that authenticate calls to the provider API.
//!
//! The provider issues API keys as an identifier plus 64 bytes of base64 key material: a 32-byte
//! Ed25519 seed followed by the matching public key. [`CredentialSigner`] turns that pair into a
//! compact JWS (`EdDSA`) that authorizes exactly one `METHOD host/path` for two minutes and
//! carries a fresh 128-bit nonce in its header so captured assertions cannot be replayed.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ed25519_dalek::{Signer as _, SigningKey};
// self
use crate::{
	_prelude::*,
	auth::{ApiKeyId, ApiSecret},
	config::OnrampConfig,
	error::{ConfigError, SigningError},
};

/// Lifetime of every assertion, measured from its not-before instant.
pub const ASSERTION_TTL: Duration = Duration::seconds(120);
/// Fixed `iss` claim expected by the provider.
pub const ASSERTION_ISSUER: &str = "cdp";
/// Fixed `aud` claim expected by the provider.
pub const ASSERTION_AUDIENCE: &str = "cdp_service";

const SECRET_LEN: usize = 64;
const SEED_LEN: usize = 32;

/// JOSE header of a [`SignedAssertion`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
	/// Signature algorithm, always `EdDSA`.
	pub alg: String,
	/// API key identifier the verifier uses to select the public key.
	pub kid: String,
	/// Single-use random nonce (32 lowercase hex characters).
	pub nonce: String,
	/// Token type, always `JWT`.
	pub typ: String,
}

/// Claims carried by a [`SignedAssertion`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// API key identifier.
	pub sub: String,
	/// Issuer constant.
	pub iss: String,
	/// Audience constant.
	pub aud: Vec<String>,
	/// Not-before instant in Unix seconds.
	pub nbf: i64,
	/// Expiry instant in Unix seconds.
	pub exp: i64,
	/// The single `METHOD host/path` the assertion authorizes.
	pub uris: Vec<String>,
}

/// Compact signed assertion ready to be sent as a bearer credential.
#[derive(Clone)]
pub struct SignedAssertion {
	token: String,
	header: AssertionHeader,
	claims: AssertionClaims,
}
impl SignedAssertion {
	/// Returns the compact `header.claims.signature` form. Callers must avoid logging it.
	pub fn expose(&self) -> &str {
		&self.token
	}

	/// Header the assertion was signed with.
	pub fn header(&self) -> &AssertionHeader {
		&self.header
	}

	/// Claims the assertion was signed with.
	pub fn claims(&self) -> &AssertionClaims {
		&self.claims
	}

	/// Instant after which the provider rejects the assertion.
	pub fn expires_at(&self) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(self.claims.exp)
			.unwrap_or(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Debug for SignedAssertion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedAssertion")
			.field("header", &self.header)
			.field("claims", &self.claims)
			.field("token", &"<redacted>")
			.finish()
	}
}

/// Signs provider assertions with the configured API key.
pub struct CredentialSigner {
	key_id: ApiKeyId,
	signing_key: SigningKey,
}
impl CredentialSigner {
	/// Decodes the secret material and prepares a signer for `key_id`.
	pub fn new(key_id: ApiKeyId, secret: &ApiSecret) -> Result<Self, SigningError> {
		let material = STANDARD
			.decode(secret.expose().trim())
			.map_err(|source| SigningError::SecretDecode { source })?;

		if material.len() != SECRET_LEN {
			return Err(SigningError::SecretLength { len: material.len() });
		}

		let mut seed = [0_u8; SEED_LEN];

		// The trailing public half is redundant; the key is rebuilt from the seed.
		seed.copy_from_slice(&material[..SEED_LEN]);

		Ok(Self { key_id, signing_key: SigningKey::from_bytes(&seed) })
	}

	/// Builds a signer from configuration, failing when credentials are absent.
	pub fn from_config(config: &OnrampConfig) -> Result<Self> {
		let key_id = config.api_key_id.clone().ok_or(ConfigError::MissingApiKeyId)?;
		let secret = config.api_secret.as_ref().ok_or(ConfigError::MissingApiSecret)?;

		Ok(Self::new(key_id, secret)?)
	}

	/// API key identifier used as the assertion subject.
	pub fn key_id(&self) -> &ApiKeyId {
		&self.key_id
	}

	/// Signs an assertion authorizing `method` against `endpoint`, valid from now.
	pub fn sign(&self, method: &str, endpoint: &Url) -> Result<SignedAssertion, SigningError> {
		self.sign_at(method, endpoint, OffsetDateTime::now_utc())
	}

	/// Signs an assertion whose validity window starts at `now`.
	pub fn sign_at(
		&self,
		method: &str,
		endpoint: &Url,
		now: OffsetDateTime,
	) -> Result<SignedAssertion, SigningError> {
		let nbf = now.unix_timestamp();
		let header = AssertionHeader {
			alg: "EdDSA".into(),
			kid: self.key_id.to_string(),
			nonce: format!("{:032x}", rand::random::<u128>()),
			typ: "JWT".into(),
		};
		let claims = AssertionClaims {
			sub: self.key_id.to_string(),
			iss: ASSERTION_ISSUER.into(),
			aud: vec![ASSERTION_AUDIENCE.into()],
			nbf,
			exp: nbf + ASSERTION_TTL.whole_seconds(),
			uris: vec![authorized_uri(method, endpoint)],
		};
		let signing_input = format!(
			"{}.{}",
			URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
			URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?),
		);
		let signature = self.signing_key.sign(signing_input.as_bytes());
		let token = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()));

		Ok(SignedAssertion { token, header, claims })
	}
}
impl Debug for CredentialSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialSigner")
			.field("key_id", &self.key_id)
			.field("signing_key", &"<redacted>")
			.finish()
	}
}

/// Renders the `METHOD host[:port]/path` string the provider matches against the request.
pub fn authorized_uri(method: &str, endpoint: &Url) -> String {
	let host = endpoint.host_str().unwrap_or_default();

	match endpoint.port() {
		Some(port) => format!("{method} {host}:{port}{}", endpoint.path()),
		None => format!("{method} {host}{}", endpoint.path()),
	}
}
