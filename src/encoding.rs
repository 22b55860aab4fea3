use num_bigint::BigUint;
use std::io::{self, Write};

use crate::types::{Address, TokenSymbol};

/// Trait for objects that have a canonical binary representation for Hashing/Signing.
/// careful: This must be deterministic across platforms/versions.
pub trait CanonicalSerialize {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writes into a Vec cannot fail.
        let _ = self.canonical_serialize(&mut buf);
        buf
    }
}

// --- Primitives ---

impl CanonicalSerialize for u8 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[*self])
    }
}

impl CanonicalSerialize for u16 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_le_bytes())
    }
}

impl CanonicalSerialize for u32 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_le_bytes())
    }
}

impl CanonicalSerialize for u64 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_le_bytes())
    }
}

impl<T: CanonicalSerialize> CanonicalSerialize for Vec<T> {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let len = self.len() as u32;
        writer.write_all(&len.to_le_bytes())?;
        for item in self {
            item.canonical_serialize(writer)?;
        }
        Ok(())
    }
}

impl<T: CanonicalSerialize> CanonicalSerialize for Option<T> {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            None => writer.write_all(&[0u8]),
            Some(value) => {
                writer.write_all(&[1u8])?;
                value.canonical_serialize(writer)
            }
        }
    }
}

// --- Ledger types ---

impl CanonicalSerialize for Address {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

impl CanonicalSerialize for TokenSymbol {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = self.as_str().as_bytes();
        writer.write_all(&[bytes.len() as u8])?;
        writer.write_all(bytes)
    }
}

/// Big-endian magnitude with a u32 length prefix. Zero encodes as an empty
/// magnitude.
impl CanonicalSerialize for BigUint {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = if self.bits() == 0 {
            Vec::new()
        } else {
            self.to_bytes_be()
        };
        let len = u32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "integer too large"))?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&bytes)
    }
}
