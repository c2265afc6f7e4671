//! Encrypted, file-backed key storage.
//!
//! # Data Flow
//! ```text
//! keystore directory (one JSON file per account)
//!     → manager.rs scan (parse + address check, corrupt files skipped)
//!     → in-memory index (address → Account)
//!     → unlock: file → scrypt/AES decrypt → KeyPair (wiped on drop)
//! ```
//!
//! # Design Decisions
//! - No process-wide singleton: each manager owns an explicit directory
//! - Files are written to a temporary name and renamed into place
//! - File names embed creation time and address:
//!   `UTC--2024-04-24T16-20-38.368197000Z--<40 hex address>`

pub mod manager;

pub use manager::{Account, KeystoreManager};
