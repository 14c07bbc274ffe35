//! Shielded address wire format: `"zdoge:" + 64-char zero-padded hex`.

use std::fmt;
use std::str::FromStr;

use zdoge_crypto::{field_from_bytes, field_to_bytes, Fr};

use crate::error::WalletError;

const PREFIX: &str = "zdoge:";

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShieldedAddress(Fr);

impl ShieldedAddress {
    pub fn from_field(field: Fr) -> Self {
        Self(field)
    }

    pub fn as_field(&self) -> Fr {
        self.0
    }

    pub fn encode(&self) -> String {
        format!("{PREFIX}{}", hex::encode(field_to_bytes(&self.0)))
    }

    pub fn decode(s: &str) -> Result<Self, WalletError> {
        let hex_part = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| WalletError::AddressEncoding(format!("missing '{PREFIX}' prefix")))?;
        if hex_part.len() != 64 {
            return Err(WalletError::AddressEncoding(format!(
                "expected 64 hex chars, found {}",
                hex_part.len()
            )));
        }
        let bytes = hex::decode(hex_part)
            .map_err(|e| WalletError::AddressEncoding(format!("invalid hex: {e}")))?;
        Ok(Self(field_from_bytes(&bytes)))
    }
}

impl fmt::Debug for ShieldedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShieldedAddress").field(&self.encode()).finish()
    }
}

impl fmt::Display for ShieldedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ShieldedAddress {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
