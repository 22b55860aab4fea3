//! Identity types shared by accounts, transactions and the data store

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 20;

/// Fixed-width account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

/// The treasury collects the non-tip part of every fee. It is also the
/// account of the native token.
pub const TREASURY: Address = Address::ZERO;

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Last 20 bytes of the SHA-256 of a public key.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Address(out)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s).map(Address)
    }
}

fn parse_fixed(s: &str) -> Result<[u8; ADDRESS_LEN], String> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| format!("invalid hex {:?}: {}", s, e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected {} bytes, got {}", ADDRESS_LEN, b.len()))
}

// Hex strings for JSON/TOML, raw bytes for bincode.
macro_rules! fixed_bytes_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    parse_fixed(&s).map($ty).map_err(D::Error::custom)
                } else {
                    <[u8; ADDRESS_LEN]>::deserialize(deserializer).map($ty)
                }
            }
        }
    };
}

fixed_bytes_serde!(Address);
fixed_bytes_serde!(ObjectId);

/// Id of a data or model record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(pub [u8; ADDRESS_LEN]);

impl ObjectId {
    /// Derives a record id from the id of the transaction creating it.
    pub fn from_tx_id(tx_id: &[u8; 32]) -> Self {
        let digest = Sha256::digest(tx_id);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        ObjectId(out)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn symbol_address(symbol: &str) -> Address {
    let bytes = symbol.as_bytes();
    let mut out = [0u8; ADDRESS_LEN];
    out[ADDRESS_LEN - bytes.len()..].copy_from_slice(bytes);
    Address(out)
}

fn valid_symbol_body(body: &str) -> bool {
    (2..=10).contains(&body.len())
        && body.starts_with(|c: char| c.is_ascii_uppercase())
        && body.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Token identifier. The empty symbol is the native token.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenSymbol(String);

impl TokenSymbol {
    pub fn native() -> Self {
        TokenSymbol(String::new())
    }

    pub fn new(symbol: &str) -> Result<Self, String> {
        if symbol.is_empty() || valid_symbol_body(symbol) {
            Ok(TokenSymbol(symbol.to_string()))
        } else {
            Err(format!("invalid token symbol {:?}", symbol))
        }
    }

    pub fn is_native(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the account issuing this token.
    pub fn address(&self) -> Address {
        symbol_address(&self.0)
    }

    /// Inverse of `address`, for token accounts.
    pub fn from_address(address: &Address) -> Option<Self> {
        let start = address.0.iter().position(|b| *b != 0).unwrap_or(ADDRESS_LEN);
        let body = std::str::from_utf8(&address.0[start..]).ok()?;
        TokenSymbol::new(body).ok()
    }
}

impl TryFrom<String> for TokenSymbol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenSymbol::new(&value)
    }
}

impl From<TokenSymbol> for String {
    fn from(value: TokenSymbol) -> Self {
        value.0
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "NativeToken")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Stake account identifier, `#` followed by the symbol body.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StakeSymbol(String);

impl StakeSymbol {
    pub fn new(symbol: &str) -> Result<Self, String> {
        match symbol.strip_prefix('#') {
            Some(body) if valid_symbol_body(body) => Ok(StakeSymbol(symbol.to_string())),
            _ => Err(format!("invalid stake symbol {:?}", symbol)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn address(&self) -> Address {
        symbol_address(&self.0)
    }
}

impl TryFrom<String> for StakeSymbol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StakeSymbol::new(&value)
    }
}

impl From<StakeSymbol> for String {
    fn from(value: StakeSymbol) -> Self {
        value.0
    }
}

impl fmt::Display for StakeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for StakeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Decimal-string serde for big integers in config and genesis files.
pub mod decimal {
    use num_bigint::BigUint;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| D::Error::custom(format!("invalid decimal {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_validation() {
        assert!(TokenSymbol::new("").unwrap().is_native());
        assert!(TokenSymbol::new("USD").is_ok());
        assert!(TokenSymbol::new("A1B2").is_ok());
        assert!(TokenSymbol::new("usd").is_err());
        assert!(TokenSymbol::new("1AB").is_err());
        assert!(TokenSymbol::new("X").is_err());
        assert!(TokenSymbol::new("ABCDEFGHIJK").is_err());

        assert!(StakeSymbol::new("#POOL").is_ok());
        assert!(StakeSymbol::new("POOL").is_err());
        assert!(StakeSymbol::new("#p").is_err());
    }

    #[test]
    fn test_symbol_addresses() {
        assert_eq!(TokenSymbol::native().address(), TREASURY);

        let usd = TokenSymbol::new("USD").unwrap().address();
        assert_eq!(&usd.0[17..], b"USD");
        assert!(usd.0[..17].iter().all(|b| *b == 0));

        let pool = StakeSymbol::new("#USD").unwrap().address();
        assert_ne!(pool, usd);

        assert_eq!(TokenSymbol::from_address(&usd), TokenSymbol::new("USD").ok());
        assert_eq!(TokenSymbol::from_address(&TREASURY), Some(TokenSymbol::native()));
        assert_eq!(TokenSymbol::from_address(&pool), None);
    }

    #[test]
    fn test_address_text_round_trip() {
        let addr = Address::from_public_key(b"some key");
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.parse::<Address>().unwrap(), addr);

        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", text));
        assert!("0x1234".parse::<Address>().is_err());
    }
}
