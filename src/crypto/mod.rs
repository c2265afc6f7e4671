//! Cryptographic primitives.
//!
//! # Data Flow
//! ```text
//! OS entropy
//!     → keys.rs (secp256k1 key pair, signing, recovery, address hashing)
//!     → keyfile.rs (scrypt + AES-128-CTR encryption at rest, Keccak MAC)
//!     → keystore manager (one file per account)
//! ```
//!
//! # Security Constraints
//! - Secret scalars are wiped on drop
//! - Keys and passwords never reach logs or `Debug` output
//! - MAC comparison is constant time

pub mod keyfile;
pub mod keys;

pub use keyfile::{decrypt_key, encrypt_key, EncryptedKeyFile, ScryptParams};
pub use keys::{derive_address, generate_key_pair, recover_signer, sign_hash, KeyPair, PublicKey, Signature};
