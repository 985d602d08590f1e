//! Token identity
//!
//! Solana mint addresses are base58 strings that decode to a 32-byte key.
//! Anything else is rejected before any analysis work starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Minimum length of a base58-encoded 32-byte key
const MIN_ADDRESS_LEN: usize = 32;
/// Maximum length of a base58-encoded 32-byte key
const MAX_ADDRESS_LEN: usize = 44;
/// Decoded key length
const KEY_BYTES: usize = 32;

/// A validated token mint address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Parse and validate a token address
    pub fn parse(raw: &str) -> Result<Self> {
        let address = raw.trim();

        if address.len() < MIN_ADDRESS_LEN || address.len() > MAX_ADDRESS_LEN {
            return Err(Error::InvalidIdentifier(format!(
                "address '{}' has length {}, expected {}-{}",
                address,
                address.len(),
                MIN_ADDRESS_LEN,
                MAX_ADDRESS_LEN
            )));
        }

        let bytes = bs58::decode(address)
            .into_vec()
            .map_err(|e| Error::InvalidIdentifier(format!("address '{}' is not base58: {}", address, e)))?;

        if bytes.len() != KEY_BYTES {
            return Err(Error::InvalidIdentifier(format!(
                "address '{}' decodes to {} bytes, expected {}",
                address,
                bytes.len(),
                KEY_BYTES
            )));
        }

        Ok(Self(address.to_string()))
    }

    /// The address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TokenId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const WSOL: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn test_valid_address() {
        let id = TokenId::parse(WSOL).unwrap();
        assert_eq!(id.as_str(), WSOL);
        assert_eq!(id.short(), "So111111");
    }

    #[test]
    fn test_trims_whitespace() {
        let id = TokenId::parse(&format!("  {}\n", WSOL)).unwrap();
        assert_eq!(id.as_str(), WSOL);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = TokenId::parse("abc").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_rejects_non_base58() {
        // '0', 'O', 'I' and 'l' are not in the base58 alphabet
        let err = TokenId::parse("0OIl111111111111111111111111111111111111111").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_rejects_evm_address() {
        let err = TokenId::parse("0x6B175474E89094C44Da98b954EedeAC495271d0F").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_serde_validates() {
        let ok: TokenId = serde_json::from_str(&format!("\"{}\"", WSOL)).unwrap();
        assert_eq!(ok.as_str(), WSOL);
        assert!(serde_json::from_str::<TokenId>("\"nope\"").is_err());
    }
}
