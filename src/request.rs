//! Purchase request parameters and their structural validation.

// self
use crate::_prelude::*;

const WALLET_ADDRESS_LEN: usize = 42;
const MIN_AMOUNT_USD: f64 = 1.;

/// Crypto assets users may purchase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
	#[default]
	/// USD Coin; the default asset for session tokens.
	#[serde(rename = "USDC")]
	Usdc,
	/// Ether.
	#[serde(rename = "ETH")]
	Eth,
	/// Tether.
	#[serde(rename = "USDT")]
	Usdt,
}
impl Asset {
	/// Every supported asset, in display order.
	pub const ALL: [Asset; 3] = [Asset::Usdc, Asset::Eth, Asset::Usdt];

	/// Returns the ticker used by the provider.
	pub const fn as_str(self) -> &'static str {
		match self {
			Asset::Usdc => "USDC",
			Asset::Eth => "ETH",
			Asset::Usdt => "USDT",
		}
	}
}
impl Display for Asset {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Asset {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|asset| asset.as_str() == s)
			.ok_or(ValidationError::UnsupportedAsset)
	}
}

/// Blockchains the purchased asset may be delivered on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
	#[default]
	/// Base L2; the default network.
	Base,
	/// Ethereum mainnet.
	Ethereum,
	/// Polygon PoS.
	Polygon,
}
impl Network {
	/// Every supported network, in display order.
	pub const ALL: [Network; 3] = [Network::Base, Network::Ethereum, Network::Polygon];

	/// Returns the network label used by the provider.
	pub const fn as_str(self) -> &'static str {
		match self {
			Network::Base => "base",
			Network::Ethereum => "ethereum",
			Network::Polygon => "polygon",
		}
	}
}
impl Display for Network {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Network {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|network| network.as_str() == s)
			.ok_or(ValidationError::UnsupportedNetwork)
	}
}

/// Reasons a purchase request is rejected before any budget is consulted.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ValidationError {
	/// Address is empty, lacks the `0x` prefix, or is not 42 characters long.
	#[error("Invalid wallet address format")]
	InvalidWalletAddress,
	/// Amount is below one dollar (or not a number).
	#[error("Amount must be at least $1")]
	AmountTooLow,
	/// Amount exceeds the per-transaction ceiling.
	#[error("Amount cannot exceed ${max} per transaction")]
	AmountTooHigh {
		/// Configured per-transaction ceiling.
		max: f64,
	},
	/// Asset is not one of [`Asset::ALL`].
	#[error("Invalid asset. Must be one of: USDC, ETH, USDT")]
	UnsupportedAsset,
	/// Network is not one of [`Network::ALL`].
	#[error("Invalid network. Must be one of: base, ethereum, polygon")]
	UnsupportedNetwork,
}

/// Raw purchase request as received from the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnrampRequest {
	/// Destination wallet address.
	pub wallet_address: String,
	/// Fiat amount in USD.
	pub amount_usd: f64,
	/// Requested asset ticker.
	#[serde(default = "default_asset")]
	pub asset: String,
	/// Requested network label.
	#[serde(default = "default_network")]
	pub network: String,
}
impl OnrampRequest {
	/// Creates a request for the default asset and network.
	pub fn new(wallet_address: impl Into<String>, amount_usd: f64) -> Self {
		Self {
			wallet_address: wallet_address.into(),
			amount_usd,
			asset: default_asset(),
			network: default_network(),
		}
	}

	/// Overrides the requested asset.
	pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
		self.asset = asset.into();

		self
	}

	/// Overrides the requested network.
	pub fn with_network(mut self, network: impl Into<String>) -> Self {
		self.network = network.into();

		self
	}

	/// Validates the request against the per-transaction ceiling.
	pub fn validate(&self, max_amount_per_tx: f64) -> Result<ValidatedRequest, ValidationError> {
		validate(
			&self.wallet_address,
			self.amount_usd,
			&self.asset,
			&self.network,
			max_amount_per_tx,
		)
	}
}

/// Purchase parameters that passed [`validate`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidatedRequest {
	/// Destination wallet address.
	pub wallet_address: String,
	/// Fiat amount in USD.
	pub amount_usd: f64,
	/// Asset to purchase.
	pub asset: Asset,
	/// Network to deliver on.
	pub network: Network,
}

/// Checks a purchase request; the first failing rule wins.
///
/// Rules, in order: address shape, minimum amount, per-transaction ceiling, asset, network.
/// The address check is structural only; checksums are not verified.
pub fn validate(
	wallet_address: &str,
	amount_usd: f64,
	asset: &str,
	network: &str,
	max_amount_per_tx: f64,
) -> Result<ValidatedRequest, ValidationError> {
	if !wallet_address.starts_with("0x") || wallet_address.chars().count() != WALLET_ADDRESS_LEN {
		return Err(ValidationError::InvalidWalletAddress);
	}
	if amount_usd.is_nan() || amount_usd < MIN_AMOUNT_USD {
		return Err(ValidationError::AmountTooLow);
	}
	if amount_usd > max_amount_per_tx {
		return Err(ValidationError::AmountTooHigh { max: max_amount_per_tx });
	}

	let asset = asset.parse::<Asset>()?;
	let network = network.parse::<Network>()?;

	Ok(ValidatedRequest { wallet_address: wallet_address.to_owned(), amount_usd, asset, network })
}

fn default_asset() -> String {
	Asset::default().as_str().into()
}

fn default_network() -> String {
	Network::default().as_str().into()
}
