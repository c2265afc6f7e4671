//! Password-protected key files (Web3 Secret Storage, version 3).
//!
//! Layout of the JSON document:
//! ```text
//! {
//!   "address": "<40 hex>",
//!   "crypto": {
//!     "cipher": "aes-128-ctr",
//!     "ciphertext": "<hex>",
//!     "cipherparams": { "iv": "<32 hex>" },
//!     "kdf": "scrypt",
//!     "kdfparams": { "dklen": 32, "n": N, "p": P, "r": 8, "salt": "<64 hex>" },
//!     "mac": "<64 hex>"              // keccak256(dk[16..32] || ciphertext)
//!   },
//!   "id": "<uuid v4>",
//!   "version": 3
//! }
//! ```
//! Unknown fields are ignored on read.

use aes::Aes128;
use alloy::hex;
use alloy::primitives::{keccak256, Address};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::crypto::keys::KeyPair;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const KEYFILE_VERSION: u32 = 3;
const KDF_SCRYPT: &str = "scrypt";
const CIPHER_AES_128_CTR: &str = "aes-128-ctr";
const SCRYPT_R: u32 = 8;
const DK_LEN: usize = 32;
const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Largest accepted `log2(n)`. With r = 8 that is 1 GiB of scrypt memory.
pub const MAX_SCRYPT_LOG_N: u8 = 20;
/// Largest accepted parallelism.
pub const MAX_SCRYPT_P: u32 = 16;
/// Ceiling on `128 * r * n * p`, the total bytes scrypt mixes per derivation.
const MAX_SCRYPT_WORK: u64 = 4 << 30;

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost, a power of two.
    pub n: u32,
    /// Parallelism.
    pub p: u32,
}

impl ScryptParams {
    /// N = 2^18, P = 1. Roughly 256 MiB and a second of CPU per derivation.
    pub const fn standard() -> Self {
        Self { n: 1 << 18, p: 1 }
    }

    /// N = 2^12, P = 6. For constrained devices and tests.
    pub const fn light() -> Self {
        Self { n: 1 << 12, p: 6 }
    }

    /// `log2(n)`, or `None` when `n` is not a power of two above 1.
    pub fn log_n(&self) -> Option<u8> {
        if self.n > 1 && self.n.is_power_of_two() {
            Some(self.n.trailing_zeros() as u8)
        } else {
            None
        }
    }
}

/// Check a cost read from a key file or config before it reaches scrypt.
///
/// Key files are untrusted input; an unbounded `n` makes scrypt allocate
/// until the process aborts.
fn checked_log_n(n: u32, r: u32, p: u32, target: &str) -> BlockchainResult<u8> {
    let log_n = ScryptParams { n, p }
        .log_n()
        .ok_or_else(|| BlockchainError::keystore(target, format!("scrypt n = {} is not a power of two", n)))?;
    if log_n > MAX_SCRYPT_LOG_N {
        return Err(BlockchainError::keystore(
            target,
            format!("scrypt n = 2^{} exceeds the 2^{} ceiling", log_n, MAX_SCRYPT_LOG_N),
        ));
    }
    if r != SCRYPT_R {
        return Err(BlockchainError::keystore(target, format!("unsupported scrypt r = {}", r)));
    }
    if p == 0 || p > MAX_SCRYPT_P {
        return Err(BlockchainError::keystore(
            target,
            format!("scrypt p = {} outside 1..={}", p, MAX_SCRYPT_P),
        ));
    }
    let work = 128 * u64::from(r) * u64::from(n) * u64::from(p);
    if work > MAX_SCRYPT_WORK {
        return Err(BlockchainError::keystore(target, format!("scrypt cost of {} bytes is too high", work)));
    }
    Ok(log_n)
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub dklen: u32,
    pub n: u32,
    pub p: u32,
    pub r: u32,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

/// An encrypted private key as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKeyFile {
    /// Lowercase hex address without `0x`.
    pub address: String,
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
    pub id: Uuid,
    pub version: u32,
}

impl EncryptedKeyFile {
    /// Parse a key file, ignoring unknown fields.
    pub fn from_json(bytes: &[u8]) -> BlockchainResult<Self> {
        let file: Self = serde_json::from_slice(bytes)
            .map_err(|e| BlockchainError::keystore("key file", format!("not a key file: {}", e)))?;
        if file.version != KEYFILE_VERSION {
            return Err(BlockchainError::keystore(
                file.address.clone(),
                format!("unsupported key file version {}", file.version),
            ));
        }
        Ok(file)
    }

    pub fn to_json(&self) -> BlockchainResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| BlockchainError::keystore(self.address.clone(), e))
    }

    /// The address recorded in the file.
    pub fn address(&self) -> BlockchainResult<Address> {
        self.address
            .parse::<Address>()
            .or_else(|_| format!("0x{}", self.address).parse::<Address>())
            .map_err(|e| BlockchainError::keystore(self.address.clone(), format!("bad address field: {}", e)))
    }

    /// KDF cost recorded in the file.
    pub fn scrypt_params(&self) -> ScryptParams {
        ScryptParams {
            n: self.crypto.kdfparams.n,
            p: self.crypto.kdfparams.p,
        }
    }
}

fn random_bytes<const N: usize>() -> BlockchainResult<[u8; N]> {
    let mut out = [0u8; N];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| BlockchainError::Entropy(e.to_string()))?;
    Ok(out)
}

fn derive_key(password: &str, salt: &[u8], log_n: u8, r: u32, p: u32, target: &str) -> BlockchainResult<Zeroizing<[u8; DK_LEN]>> {
    let params = scrypt::Params::new(log_n, r, p, DK_LEN)
        .map_err(|e| BlockchainError::keystore(target, format!("invalid scrypt parameters: {}", e)))?;
    let mut dk = Zeroizing::new([0u8; DK_LEN]);
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut dk[..])
        .map_err(|e| BlockchainError::keystore(target, format!("scrypt failed: {}", e)))?;
    Ok(dk)
}

fn apply_cipher(key: &[u8], iv: &[u8], buf: &mut [u8], target: &str) -> BlockchainResult<()> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|_| BlockchainError::keystore(target, "bad cipher key or iv length"))?;
    cipher.apply_keystream(buf);
    Ok(())
}

fn mac(dk: &[u8; DK_LEN], ciphertext: &[u8]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(16 + ciphertext.len());
    preimage.extend_from_slice(&dk[16..32]);
    preimage.extend_from_slice(ciphertext);
    keccak256(&preimage).0
}

/// Encrypt `key` under `password`.
///
/// # Arguments
/// * `key` - Key pair whose scalar is stored
/// * `password` - Passphrase fed to scrypt
/// * `params` - scrypt cost (N, P); r is fixed at 8
pub fn encrypt_key(key: &KeyPair, password: &str, params: ScryptParams) -> BlockchainResult<EncryptedKeyFile> {
    let address = hex::encode(key.address());
    let log_n = checked_log_n(params.n, SCRYPT_R, params.p, &address)?;

    let salt: [u8; SALT_LEN] = random_bytes()?;
    let iv: [u8; IV_LEN] = random_bytes()?;
    let dk = derive_key(password, &salt, log_n, SCRYPT_R, params.p, &address)?;

    let mut ciphertext = key.secret_bytes().to_vec();
    apply_cipher(&dk[..16], &iv, &mut ciphertext, &address)?;
    let mac = mac(&dk, &ciphertext);

    Ok(EncryptedKeyFile {
        address,
        crypto: CryptoSection {
            cipher: CIPHER_AES_128_CTR.to_string(),
            ciphertext: hex::encode(&ciphertext),
            cipherparams: CipherParams { iv: hex::encode(iv) },
            kdf: KDF_SCRYPT.to_string(),
            kdfparams: KdfParams {
                dklen: DK_LEN as u32,
                n: params.n,
                p: params.p,
                r: SCRYPT_R,
                salt: hex::encode(salt),
            },
            mac: hex::encode(mac),
        },
        id: Uuid::new_v4(),
        version: KEYFILE_VERSION,
    })
}

/// Decrypt a key file.
///
/// Fails with `AuthenticationFailure` when the MAC does not verify, when a
/// hex field of the crypto section is damaged, or when the decrypted scalar
/// does not produce the recorded address. The KDF runs in every one of those
/// cases, so a wrong password and a damaged file cost the same.
pub fn decrypt_key(file: &EncryptedKeyFile, password: &str) -> BlockchainResult<KeyPair> {
    let target = file.address.as_str();
    let crypto = &file.crypto;
    if crypto.kdf != KDF_SCRYPT {
        return Err(BlockchainError::keystore(target, format!("unsupported kdf '{}'", crypto.kdf)));
    }
    if crypto.cipher != CIPHER_AES_128_CTR {
        return Err(BlockchainError::keystore(target, format!("unsupported cipher '{}'", crypto.cipher)));
    }
    if crypto.kdfparams.dklen as usize != DK_LEN {
        return Err(BlockchainError::keystore(target, format!("unsupported dklen {}", crypto.kdfparams.dklen)));
    }
    let params = &crypto.kdfparams;
    let log_n = checked_log_n(params.n, params.r, params.p, target)?;

    let salt = hex::decode(&params.salt);
    let iv = hex::decode(&crypto.cipherparams.iv).ok().filter(|iv| iv.len() == IV_LEN);
    let ciphertext = hex::decode(&crypto.ciphertext);
    let expected_mac = hex::decode(&crypto.mac);

    let dk = derive_key(password, salt.as_deref().unwrap_or(&[]), log_n, params.r, params.p, target)?;
    let computed_mac = mac(&dk, ciphertext.as_deref().unwrap_or(&[]));
    let mac_ok = match &expected_mac {
        Ok(expected) => bool::from(computed_mac[..].ct_eq(&expected[..])),
        Err(_) => false,
    };

    let auth_failure = || BlockchainError::AuthenticationFailure {
        target: target.to_string(),
    };
    let (Ok(_), Some(iv), Ok(ciphertext), true) = (salt, iv, ciphertext, mac_ok) else {
        return Err(auth_failure());
    };

    let mut plaintext = Zeroizing::new(ciphertext);
    apply_cipher(&dk[..16], &iv, &mut plaintext, target)?;
    let key = KeyPair::from_secret_bytes(&plaintext).map_err(|_| auth_failure())?;

    if file.address()? != key.address() {
        return Err(auth_failure());
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_key_pair;

    // Fast parameters; the format is the same at every cost.
    const TEST_PARAMS: ScryptParams = ScryptParams { n: 1 << 10, p: 1 };

    #[test]
    fn test_round_trip() {
        let key = generate_key_pair().unwrap();
        let file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();

        assert_eq!(file.version, 3);
        assert_eq!(file.address, hex::encode(key.address()));
        assert_eq!(file.scrypt_params(), TEST_PARAMS);

        let decrypted = decrypt_key(&file, "p@ss").unwrap();
        assert_eq!(*decrypted.secret_bytes(), *key.secret_bytes());
    }

    #[test]
    fn test_wrong_password() {
        let key = generate_key_pair().unwrap();
        let file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();

        let err = decrypt_key(&file, "wrong").unwrap_err();
        assert!(matches!(err, BlockchainError::AuthenticationFailure { .. }));
    }

    #[test]
    fn test_corrupted_ciphertext_is_auth_failure() {
        let key = generate_key_pair().unwrap();
        let mut file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();
        let mut bytes = hex::decode(&file.crypto.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        file.crypto.ciphertext = hex::encode(bytes);

        let err = decrypt_key(&file, "p@ss").unwrap_err();
        assert!(matches!(err, BlockchainError::AuthenticationFailure { .. }));
    }

    #[test]
    fn test_json_round_trip_ignores_unknown_fields() {
        let key = generate_key_pair().unwrap();
        let file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();

        let mut value: serde_json::Value = serde_json::from_slice(&file.to_json().unwrap()).unwrap();
        value["x-wallet-label"] = serde_json::json!("savings");
        value["crypto"]["x-extra"] = serde_json::json!(1);

        let parsed = EncryptedKeyFile::from_json(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(parsed.address().unwrap(), key.address());
        assert_eq!(decrypt_key(&parsed, "p@ss").unwrap().address(), key.address());
    }

    #[test]
    fn test_rejects_bad_cost() {
        let key = generate_key_pair().unwrap();
        let err = encrypt_key(&key, "p@ss", ScryptParams { n: 1000, p: 1 }).unwrap_err();
        assert!(matches!(err, BlockchainError::Keystore { .. }));
    }

    #[test]
    fn test_damaged_hex_is_auth_failure() {
        let key = generate_key_pair().unwrap();
        let file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();

        let damage = |s: &mut String| s.replace_range(0..1, "z");
        let mut salt = file.clone();
        damage(&mut salt.crypto.kdfparams.salt);
        let mut iv = file.clone();
        damage(&mut iv.crypto.cipherparams.iv);
        let mut ciphertext = file.clone();
        damage(&mut ciphertext.crypto.ciphertext);
        let mut mac = file.clone();
        damage(&mut mac.crypto.mac);

        for damaged in [salt, iv, ciphertext, mac] {
            let err = decrypt_key(&damaged, "p@ss").unwrap_err();
            assert!(matches!(err, BlockchainError::AuthenticationFailure { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_oversized_cost_rejected_before_kdf() {
        let key = generate_key_pair().unwrap();
        let file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();

        let mut huge_n = file.clone();
        huge_n.crypto.kdfparams.n = 1 << 31;
        let mut huge_p = file.clone();
        huge_p.crypto.kdfparams.p = 1 << 20;
        let mut other_r = file.clone();
        other_r.crypto.kdfparams.r = 1 << 20;

        for costly in [huge_n, huge_p, other_r] {
            let err = decrypt_key(&costly, "p@ss").unwrap_err();
            assert!(matches!(err, BlockchainError::Keystore { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_cost_ceiling() {
        assert!(checked_log_n(1 << 20, SCRYPT_R, 1, "t").is_ok());
        assert!(checked_log_n(1 << 21, SCRYPT_R, 1, "t").is_err());
        assert!(checked_log_n(1 << 12, SCRYPT_R, 16, "t").is_ok());
        assert!(checked_log_n(1 << 12, SCRYPT_R, 0, "t").is_err());
        // 1 GiB per lane times 16 lanes.
        assert!(checked_log_n(1 << 20, SCRYPT_R, 16, "t").is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(ScryptParams::standard().log_n(), Some(18));
        assert_eq!(ScryptParams::light().log_n(), Some(12));
        assert_eq!(ScryptParams { n: 0, p: 1 }.log_n(), None);
    }

    #[test]
    fn test_rejects_other_versions() {
        let key = generate_key_pair().unwrap();
        let mut file = encrypt_key(&key, "p@ss", TEST_PARAMS).unwrap();
        file.version = 1;
        let err = EncryptedKeyFile::from_json(&serde_json::to_vec(&file).unwrap()).unwrap_err();
        assert!(matches!(err, BlockchainError::Keystore { .. }));
    }
}
