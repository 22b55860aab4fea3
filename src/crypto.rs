use ed25519_dalek::{Signature as EdSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::types::Address;

pub const SIGNATURE_LEN: usize = 96;

/// Set of identities recovered from a signature list.
pub type Signers = BTreeSet<Address>;

/// Signature bundled with the signer's public key so the identity can be
/// recovered from the message alone.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(D::Error::custom)?
        } else {
            <Vec<u8>>::deserialize(deserializer)?
        };
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("invalid signature length"))?;
        Ok(Signature(arr))
    }
}

pub struct KeyPair {
    pub signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new Ed25519 keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        KeyPair {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        KeyPair {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.signing_key.verifying_key().to_bytes());
        out[32..].copy_from_slice(&sig.to_bytes());
        Signature(out)
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Verifies the signature and returns the signer's address.
pub fn recover(message: &[u8], signature: &Signature) -> Result<Address, String> {
    let mut pk = [0u8; 32];
    pk.copy_from_slice(&signature.0[..32]);
    let mut sig = [0u8; 64];
    sig.copy_from_slice(&signature.0[32..]);

    let verifying_key = VerifyingKey::from_bytes(&pk).map_err(|e| e.to_string())?;
    verifying_key
        .verify(message, &EdSignature::from_bytes(&sig))
        .map_err(|e| e.to_string())?;
    Ok(Address::from_public_key(&pk))
}

pub fn recover_all(message: &[u8], signatures: &[Signature]) -> Result<Signers, String> {
    signatures.iter().map(|sig| recover(message, sig)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover() {
        let kp = KeyPair::from_seed(&[7u8; 32]);
        let sig = kp.sign(b"hello");
        assert_eq!(recover(b"hello", &sig).unwrap(), kp.address());
        assert!(recover(b"world", &sig).is_err());
    }

    #[test]
    fn test_recover_all_dedups() {
        let a = KeyPair::from_seed(&[1u8; 32]);
        let b = KeyPair::generate();
        let sigs = vec![a.sign(b"m"), b.sign(b"m"), a.sign(b"m")];
        let signers = recover_all(b"m", &sigs).unwrap();
        assert_eq!(signers.len(), 2);
        assert!(signers.contains(&a.address()));
        assert!(signers.contains(&b.address()));
    }

    #[test]
    fn test_signature_serde() {
        let kp = KeyPair::from_seed(&[3u8; 32]);
        let sig = kp.sign(b"payload");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(serde_json::from_str::<Signature>(&json).unwrap(), sig);
        let bin = bincode::serialize(&sig).unwrap();
        assert_eq!(bincode::deserialize::<Signature>(&bin).unwrap(), sig);
    }
}
