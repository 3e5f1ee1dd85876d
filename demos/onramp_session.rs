//! Starts an onramp session against a mocked token endpoint and prints the redirect URL, then
//! shows the hourly budget rejecting a burst from the same client.

// std
use std::net::{IpAddr, Ipv4Addr};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use color_eyre::Result;
use ed25519_dalek::SigningKey;
use httpmock::prelude::*;
use url::Url;
// self
use onramp_broker::{
	auth::{ApiKeyId, ApiSecret, ClientId},
	config::OnrampConfig,
	request::OnrampRequest,
	service::ReqwestOnrampService,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/onramp/v1/token").header_exists("authorization");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"demo-session-token\",\"channel_id\":\"\"}");
		})
		.await;
	let seed = [42_u8; 32];
	let key = SigningKey::from_bytes(&seed);
	let secret = STANDARD.encode([seed.as_slice(), key.verifying_key().as_bytes()].concat());
	let config = OnrampConfig::builder()
		.api_key_id(ApiKeyId::new("organizations/demo/apiKeys/demo-key")?)
		.api_secret(ApiSecret::new(secret))
		.app_id("demo-app")
		.max_requests_per_hour(2)
		.token_endpoint(Url::parse(&server.url("/onramp/v1/token"))?)
		.build()?;
	let service = ReqwestOnrampService::new(config)?;
	let client = ClientId::from(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 42)));
	let request = OnrampRequest::new("0x52908400098527886E0F7030069857D2E4169EE7", 25.)
		.with_asset("ETH")
		.with_network("base");
	let session = service.start_session(&client, &request).await?;

	println!("Session {} redirects to {}.", session.session_id, session.url);

	let legacy = service.start_legacy_session(&client, &request).await?;

	println!("Legacy redirect: {}.", legacy.url);

	match service.start_session(&client, &request).await {
		Ok(_) => println!("Unexpected third admission."),
		Err(e) => println!("Third request rejected: {}", e.user_message()),
	}

	token_mock.assert_async().await;

	Ok(())
}
