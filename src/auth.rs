//! Identifiers, redacted secrets, and the provider credential signer.

pub mod id;
pub mod secret;
pub mod signer;

pub use id::*;
pub use secret::*;
pub use signer::*;
