//! Redirect URL assembly for the hosted purchase page.

// crates.io
use serde_json::json;
// self
use crate::{_prelude::*, auth::SessionToken, request::ValidatedRequest};

/// Builds the session-token redirect: `sessionToken`, `defaultAsset`, `defaultNetwork`,
/// `presetFiatAmount`, appended to `base` in that order.
pub fn session_url(base: &Url, token: &SessionToken, purchase: &ValidatedRequest) -> Url {
	let mut url = base.clone();

	url.query_pairs_mut()
		.append_pair("sessionToken", token.expose())
		.append_pair("defaultAsset", purchase.asset.as_str())
		.append_pair("defaultNetwork", purchase.network.as_str())
		.append_pair("presetFiatAmount", &purchase.amount_usd.to_string());

	url
}

/// Builds the app-id redirect used when no session token is exchanged.
///
/// `addresses` is the JSON object `{"<network>":["<address>"]}` and `assets` the JSON array
/// `["<asset>"]`, both form-encoded.
pub fn legacy_url(base: &Url, app_id: &str, purchase: &ValidatedRequest) -> Url {
	let addresses = json!({ purchase.network.as_str(): [purchase.wallet_address.as_str()] });
	let assets = json!([purchase.asset]);
	let mut url = base.clone();

	url.query_pairs_mut()
		.append_pair("appId", app_id)
		.append_pair("addresses", &addresses.to_string())
		.append_pair("assets", &assets.to_string())
		.append_pair("defaultAsset", purchase.asset.as_str())
		.append_pair("defaultNetwork", purchase.network.as_str())
		.append_pair("presetFiatAmount", &purchase.amount_usd.to_string());

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		config::DEFAULT_PAY_URL,
		request::{Asset, Network},
	};

	const ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

	fn purchase() -> ValidatedRequest {
		ValidatedRequest {
			wallet_address: ADDRESS.into(),
			amount_usd: 25.5,
			asset: Asset::Eth,
			network: Network::Polygon,
		}
	}

	fn pairs(url: &Url) -> Vec<(String, String)> {
		url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
	}

	#[test]
	fn session_url_carries_token_and_defaults() {
		let base = Url::parse(DEFAULT_PAY_URL).expect("Default pay URL should parse.");
		let token = SessionToken::new("tok/with+reserved=chars");
		let url = session_url(&base, &token, &purchase());

		assert_eq!(url.host_str(), Some("pay.coinbase.com"));
		assert_eq!(url.path(), "/buy");
		assert_eq!(
			pairs(&url),
			vec![
				("sessionToken".into(), "tok/with+reserved=chars".into()),
				("defaultAsset".into(), "ETH".into()),
				("defaultNetwork".into(), "polygon".into()),
				("presetFiatAmount".into(), "25.5".into()),
			]
		);
		assert!(
			url.as_str().contains("sessionToken=tok%2Fwith%2Breserved%3Dchars"),
			"Reserved characters must be percent-encoded: {url}."
		);
	}

	#[test]
	fn legacy_url_encodes_json_parameters() {
		let base = Url::parse(DEFAULT_PAY_URL).expect("Default pay URL should parse.");
		let url = legacy_url(&base, "app-123", &purchase());
		let pairs = pairs(&url);

		assert_eq!(pairs[0], ("appId".into(), "app-123".into()));
		assert_eq!(pairs[1], ("addresses".into(), format!("{{\"polygon\":[\"{ADDRESS}\"]}}")));
		assert_eq!(pairs[2], ("assets".into(), "[\"ETH\"]".into()));
		assert_eq!(pairs[3], ("defaultAsset".into(), "ETH".into()));
		assert_eq!(pairs[4], ("defaultNetwork".into(), "polygon".into()));
		assert_eq!(pairs[5], ("presetFiatAmount".into(), "25.5".into()));
	}

	#[test]
	fn whole_dollar_amounts_render_without_fraction() {
		let base = Url::parse(DEFAULT_PAY_URL).expect("Default pay URL should parse.");
		let mut purchase = purchase();

		purchase.amount_usd = 100.;

		let url = session_url(&base, &SessionToken::new("t"), &purchase);

		assert!(url.as_str().ends_with("presetFiatAmount=100"), "Unexpected URL {url}.");
	}
}
