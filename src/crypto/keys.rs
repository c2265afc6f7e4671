//! secp256k1 key pairs, signatures and address derivation.

use alloy::consensus::transaction::to_eip155_value;
use alloy::hex;
use alloy::primitives::{keccak256, Address, Signature as ParitySignature, B256, U256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Uncompressed SEC1 public key marker.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Public half of a key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// 65-byte SEC1 encoding, `0x04 || X || Y`.
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// The 20-byte account address of this key.
    pub fn address(&self) -> Address {
        derive_address(self)
    }
}

/// A secp256k1 private scalar together with its public point.
///
/// The scalar is wiped when the value is dropped.
#[derive(Clone)]
pub struct KeyPair {
    secret: SigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Build a key pair from a 32-byte big-endian scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> BlockchainResult<Self> {
        let secret = SigningKey::from_slice(bytes)
            .map_err(|_| BlockchainError::InvalidSignature("invalid secret scalar".to_string()))?;
        Ok(Self::from_signing_key(secret))
    }

    /// Parse a hex-encoded private key, with or without `0x` prefix.
    pub fn from_hex(private_key_hex: &str) -> BlockchainResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(private_key_hex.trim())
                .map_err(|e| BlockchainError::InvalidSignature(format!("invalid private key hex: {}", e)))?,
        );
        if bytes.len() != 32 {
            return Err(BlockchainError::InvalidSignature(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Self::from_secret_bytes(&bytes)
    }

    fn from_signing_key(secret: SigningKey) -> Self {
        let public = PublicKey(secret.verifying_key().clone());
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn address(&self) -> Address {
        self.public.address()
    }

    /// The raw scalar. Callers must not persist it unencrypted.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Hex encoding of the scalar without `0x`.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.secret_bytes()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// An ECDSA signature in Ethereum's `(v, r, s)` form.
///
/// `v` is 27/28 for chain-agnostic signatures and `recid + 35 + 2 * chain_id`
/// once replay protection is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl Signature {
    /// Rebind the recovery id to `chain_id` (EIP-155).
    pub fn with_chain_id(self, chain_id: u64) -> BlockchainResult<Self> {
        let parity = self.recovery_id(chain_id)? as u64;
        let v = eip155_base(chain_id)
            .and_then(|base| base.checked_add(parity))
            .ok_or_else(|| BlockchainError::InvalidSignature(format!("chain id {} too large", chain_id)))?;
        Ok(Self { v, ..self })
    }

    /// Whether `v` carries a chain id.
    pub fn is_protected(&self) -> bool {
        self.v != 27 && self.v != 28
    }

    /// Extract the 0/1 recovery id, undoing the chain-id adjustment.
    pub fn recovery_id(&self, chain_id: u64) -> BlockchainResult<u8> {
        let parity = if self.is_protected() {
            eip155_base(chain_id).and_then(|base| self.v.checked_sub(base))
        } else {
            Some(self.v - 27)
        };
        match parity {
            Some(p @ (0 | 1)) => Ok(p as u8),
            _ => Err(BlockchainError::InvalidSignature(format!(
                "recovery id out of range: v = {} for chain {}",
                self.v, chain_id
            ))),
        }
    }
}

impl Signature {
    /// Convert to the `y_parity` form used by envelopes.
    ///
    /// `chain_id` undoes a protected `v`; unprotected signatures ignore it.
    pub fn to_primitive(&self, chain_id: Option<u64>) -> BlockchainResult<ParitySignature> {
        let parity = match chain_id {
            Some(chain_id) => self.recovery_id(chain_id)?,
            None if self.is_protected() => {
                return Err(BlockchainError::InvalidSignature(format!(
                    "v = {} is bound to a chain id",
                    self.v
                )))
            }
            None => self.recovery_id(0)?,
        };
        Ok(ParitySignature::new(self.r, self.s, parity == 1))
    }

    /// Rebuild `v` from a parity signature, EIP-155 style when `chain_id` is set.
    pub fn from_primitive(signature: &ParitySignature, chain_id: Option<u64>) -> BlockchainResult<Self> {
        let v = u64::try_from(to_eip155_value(signature.v(), chain_id))
            .map_err(|_| BlockchainError::InvalidSignature("v does not fit in 64 bits".to_string()))?;
        Ok(Self {
            v,
            r: signature.r(),
            s: signature.s(),
        })
    }
}

fn eip155_base(chain_id: u64) -> Option<u64> {
    chain_id.checked_mul(2)?.checked_add(35)
}

/// Generate a fresh key pair from the OS randomness source.
pub fn generate_key_pair() -> BlockchainResult<KeyPair> {
    loop {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut bytes[..])
            .map_err(|e| BlockchainError::Entropy(e.to_string()))?;
        // Zero or >= curve order: draw again.
        if let Ok(secret) = SigningKey::from_slice(&bytes[..]) {
            return Ok(KeyPair::from_signing_key(secret));
        }
    }
}

/// Keccak-256 of the 64 coordinate bytes, low-order 20 bytes kept.
pub fn derive_address(public: &PublicKey) -> Address {
    let encoded = public.to_uncompressed();
    debug_assert_eq!(encoded[0], UNCOMPRESSED_TAG);
    let digest = keccak256(&encoded[1..]);
    Address::from_slice(&digest[12..])
}

/// Deterministic (RFC 6979) signature over a 32-byte digest.
pub fn sign_hash(key: &KeyPair, digest: &B256) -> BlockchainResult<Signature> {
    let (signature, recovery_id) = key
        .secret
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| BlockchainError::InvalidSignature(format!("signing failed: {}", e)))?;
    let bytes = signature.to_bytes();
    Ok(Signature {
        v: 27 + recovery_id.to_byte() as u64,
        r: U256::from_be_slice(&bytes[..32]),
        s: U256::from_be_slice(&bytes[32..]),
    })
}

/// Recover the signer's address from a signature over `digest`.
///
/// `chain_id` is used to undo the EIP-155 adjustment of `v`; unprotected
/// signatures (`v` = 27/28) ignore it.
pub fn recover_signer(signature: &Signature, digest: &B256, chain_id: u64) -> BlockchainResult<Address> {
    let recovery_id = RecoveryId::from_byte(signature.recovery_id(chain_id)?)
        .ok_or_else(|| BlockchainError::InvalidSignature("bad recovery id".to_string()))?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r.to_be_bytes::<32>());
    rs[32..].copy_from_slice(&signature.s.to_be_bytes::<32>());
    let ecdsa = EcdsaSignature::from_slice(&rs)
        .map_err(|_| BlockchainError::InvalidSignature("r or s out of range".to_string()))?;

    let verifying_key = VerifyingKey::recover_from_prehash(digest.as_slice(), &ecdsa, recovery_id)
        .map_err(|_| BlockchainError::InvalidSignature("signature does not recover to a curve point".to_string()))?;

    Ok(derive_address(&PublicKey(verifying_key)))
}
