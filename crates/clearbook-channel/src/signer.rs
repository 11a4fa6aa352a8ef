//! Signing seam for the channel protocol.
//!
//! The service signs two things: the auth challenge during the
//! clearinghouse handshake, and each channel state update. Both go through
//! [`StateSigner`] so the wallet implementation stays swappable (hardware
//! signer, remote KMS, test stub).

use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use clearbook_types::{Error, Result};

/// Signs protocol payloads on behalf of the broker identity.
pub trait StateSigner: Send + Sync {
    /// The broker's address, 0x-prefixed hex.
    fn address(&self) -> String;

    /// EIP-191 personal-sign over the payload; returns 0x-prefixed hex.
    fn sign(&self, payload: &[u8]) -> Result<String>;
}

/// In-process wallet signer over a hex-encoded private key.
pub struct WalletSigner {
    inner: PrivateKeySigner,
}

impl WalletSigner {
    /// Build from a hex private key, with or without the 0x prefix.
    ///
    /// # Errors
    /// Returns `Configuration` if the key does not parse.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let inner: PrivateKeySigner = hex_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid broker private key: {e}")))?;
        Ok(Self { inner })
    }
}

impl StateSigner for WalletSigner {
    fn address(&self) -> String {
        format!("{:#x}", self.inner.address())
    }

    fn sign(&self, payload: &[u8]) -> Result<String> {
        let signature = self
            .inner
            .sign_message_sync(payload)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

/// Test stub: fixed address, canned signature.
#[cfg(any(test, feature = "test-stubs"))]
pub struct StubSigner;

#[cfg(any(test, feature = "test-stubs"))]
impl StateSigner for StubSigner {
    fn address(&self) -> String {
        "0x00000000000000000000000000000000000000aa".to_string()
    }

    fn sign(&self, _payload: &[u8]) -> Result<String> {
        Ok("0xstub".to_string())
    }
}
