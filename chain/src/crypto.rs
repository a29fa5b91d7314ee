//! SECP256k1 keys, SHA-256 digests, and message signing.
//!
//! Grounded on `original_source/blockchain/crypto/keys.py` and
//! `signatures.py`: private keys are 32-byte scalars, public keys are the
//! uncompressed curve point with the `0x04` prefix stripped (64 bytes,
//! x||y), and addresses are the last 20 bytes of `SHA256(public_key)`.

use std::fmt;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// A 0x-prefixed, 40-hex-character account address.
pub type Address = String;

#[derive(Debug)]
pub enum CryptoError {
    InvalidPrivateKeyLength,
    InvalidPublicKeyLength,
    InvalidPrivateKey,
    InvalidPublicKey,
    InvalidSignatureLength,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidPrivateKeyLength => write!(f, "private key must be 32 bytes"),
            CryptoError::InvalidPublicKeyLength => write!(f, "public key must be 64 bytes"),
            CryptoError::InvalidPrivateKey => write!(f, "private key is not a valid scalar"),
            CryptoError::InvalidPublicKey => write!(f, "public key is not a valid curve point"),
            CryptoError::InvalidSignatureLength => write!(f, "signature must be 64 bytes"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// A SECP256k1 key pair with hex accessors matching the wire format used
/// throughout transaction and block signing.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(private_key_hex).map_err(|_| CryptoError::InvalidPrivateKey)?;
        if bytes.len() != 32 {
            bytes.zeroize();
            return Err(CryptoError::InvalidPrivateKeyLength);
        }
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        bytes.zeroize();
        Ok(KeyPair { signing_key })
    }

    pub fn get_private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn get_public_key_hex(&self) -> String {
        hex::encode(public_key_bytes(self.signing_key.verifying_key()))
    }

    pub fn get_address(&self) -> Address {
        address_from_public_key(&self.get_public_key_hex())
            .expect("key pair always derives a valid address")
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        // SigningKey zeroizes its own scalar on drop (k256 enables this by
        // default); nothing additional to scrub here.
    }
}

fn public_key_bytes(verifying_key: &VerifyingKey) -> [u8; 64] {
    let encoded = verifying_key.to_encoded_point(false);
    let full = encoded.as_bytes();
    // full = 0x04 || x (32) || y (32)
    let mut out = [0u8; 64];
    out.copy_from_slice(&full[1..65]);
    out
}

/// Generate a fresh random key pair.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::random(&mut OsRng);
    KeyPair { signing_key }
}

/// Generate `n` validator key pairs with a deterministic default power,
/// mirroring `generate_validator_keys` from the source — used by test and
/// demo fixtures that need a ready-made validator set.
pub struct ValidatorKey {
    pub name: String,
    pub address: Address,
    pub public_key: String,
    pub private_key: String,
    pub power: u64,
}

pub fn generate_validator_keys(num_validators: usize) -> Vec<ValidatorKey> {
    (0..num_validators)
        .map(|i| {
            let kp = generate_keypair();
            ValidatorKey {
                name: format!("validator-{i}"),
                address: kp.get_address(),
                public_key: kp.get_public_key_hex(),
                private_key: kp.get_private_key_hex(),
                power: 10,
            }
        })
        .collect()
}

/// SHA-256 of UTF-8 bytes, hex-encoded.
pub fn hash_string(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// SHA-256 of raw bytes, hex-encoded.
pub fn hash_data(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `"0x" + hex(last 20 bytes of SHA256(public_key_bytes))`.
pub fn address_from_public_key(public_key_hex: &str) -> Result<Address, CryptoError> {
    let bytes = hex::decode(public_key_hex).map_err(|_| CryptoError::InvalidPublicKeyLength)?;
    if bytes.len() != 64 {
        return Err(CryptoError::InvalidPublicKeyLength);
    }
    let digest = Sha256::digest(&bytes);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

/// Sign `message` (SHA-256 of its UTF-8 bytes) with `private_key_hex`,
/// returning a fixed-width 64-byte r||s signature, hex-encoded.
pub fn sign_message(message: &str, private_key_hex: &str) -> Result<String, CryptoError> {
    let keypair = KeyPair::from_private_key_hex(private_key_hex)?;
    let digest = Sha256::digest(message.as_bytes());
    let signature: EcdsaSignature = keypair
        .signing_key
        .sign_prehash(&digest)
        .map_err(|_| CryptoError::InvalidPrivateKey)?;
    Ok(hex::encode(signature.to_bytes()))
}

/// Verify `signature_hex` over `message` against `public_key_hex`. Never
/// panics or propagates an error: any decoding or cryptographic failure
/// yields `false`, matching the source's try/except-wrapped behavior.
pub fn verify_signature(message: &str, signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(pub_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    if pub_bytes.len() != 64 {
        return false;
    }
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&pub_bytes);
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&sec1) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = EcdsaSignature::from_slice(&sig_bytes) else {
        return false;
    };
    let digest = Sha256::digest(message.as_bytes());
    verifying_key.verify_prehash(&digest, &signature).is_ok()
}
