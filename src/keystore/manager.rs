//! Keystore manager: key files on disk plus an in-memory account index.

use alloy::hex;
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::crypto::keyfile::{decrypt_key, encrypt_key, EncryptedKeyFile, ScryptParams};
use crate::crypto::keys::{generate_key_pair, KeyPair};
use crate::observability::metrics;

/// A managed account: its address and the file that backs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Account {
    pub address: Address,
    pub path: PathBuf,
}

/// Directory of encrypted key files with an address index.
#[derive(Debug)]
pub struct KeystoreManager {
    dir: PathBuf,
    params: ScryptParams,
    index: DashMap<Address, Account>,
}

impl KeystoreManager {
    /// Open `dir` (created if missing) and load every readable key file.
    pub fn open(dir: impl Into<PathBuf>, params: ScryptParams) -> BlockchainResult<Self> {
        let manager = Self::open_lazy(dir, params);
        manager.refresh()?;
        Ok(manager)
    }

    /// Open `dir` without scanning it. Call [`refresh`](Self::refresh) to load.
    pub fn open_lazy(dir: impl Into<PathBuf>, params: ScryptParams) -> Self {
        Self {
            dir: dir.into(),
            params,
            index: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rescan the directory and reconcile the index with it.
    ///
    /// Files that vanished are dropped, new ones are added, unreadable ones
    /// are skipped with a warning. Returns the number of indexed accounts.
    pub fn refresh(&self) -> BlockchainResult<usize> {
        fs::create_dir_all(&self.dir).map_err(|e| BlockchainError::keystore(self.dir.display().to_string(), e))?;
        let entries = fs::read_dir(&self.dir).map_err(|e| BlockchainError::keystore(self.dir.display().to_string(), e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && !is_hidden(path))
            .collect();
        paths.sort();

        let mut found: HashMap<Address, Account> = HashMap::new();
        for path in paths {
            match load_account(&path) {
                Ok(account) => {
                    if let Some(existing) = found.get(&account.address) {
                        tracing::warn!(
                            address = %account.address,
                            kept = %existing.path.display(),
                            skipped = %path.display(),
                            "Duplicate key file for address"
                        );
                        continue;
                    }
                    found.insert(account.address, account);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable key file");
                    metrics::record_keystore_op("skip");
                }
            }
        }

        self.index.retain(|address, _| found.contains_key(address));
        for (address, account) in found {
            self.index.insert(address, account);
        }

        let count = self.index.len();
        metrics::record_keystore_accounts(count);
        tracing::info!(dir = %self.dir.display(), accounts = count, "Keystore loaded");
        Ok(count)
    }

    /// All indexed accounts, ordered by address.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.index.iter().map(|entry| entry.value().clone()).collect();
        accounts.sort();
        accounts
    }

    pub fn find(&self, address: &Address) -> Option<Account> {
        self.index.get(address).map(|entry| entry.value().clone())
    }

    /// Generate a key, encrypt it under `password` and store it.
    pub fn new_account(&self, password: &str) -> BlockchainResult<Account> {
        let key = generate_key_pair()?;
        let account = self.store(&key, password)?;
        metrics::record_keystore_op("create");
        tracing::info!(address = %account.address, path = %account.path.display(), "Account created");
        Ok(account)
    }

    /// Import a key file from another keystore.
    ///
    /// The file is decrypted with `old_password` and stored re-encrypted
    /// under `new_password` with this manager's scrypt cost.
    pub fn import(&self, key_json: &[u8], old_password: &str, new_password: &str) -> BlockchainResult<Account> {
        let file = EncryptedKeyFile::from_json(key_json)?;
        let key = decrypt_key(&file, old_password)?;
        let account = self.store(&key, new_password)?;
        metrics::record_keystore_op("import");
        tracing::info!(address = %account.address, path = %account.path.display(), "Account imported");
        Ok(account)
    }

    /// Raw bytes of the account's key file.
    pub fn export(&self, account: &Account) -> BlockchainResult<Vec<u8>> {
        let account = self.resolve(account)?;
        fs::read(&account.path).map_err(|e| self.missing_file(&account, e))
    }

    /// Decrypt the account's key.
    ///
    /// The returned key wipes its scalar when dropped. Prefer
    /// [`with_unlocked`](Self::with_unlocked), which bounds its lifetime to
    /// a closure.
    pub fn unlock(&self, account: &Account, password: &str) -> BlockchainResult<KeyPair> {
        let account = self.resolve(account)?;
        let bytes = fs::read(&account.path).map_err(|e| self.missing_file(&account, e))?;
        let file = EncryptedKeyFile::from_json(&bytes)?;
        let key = decrypt_key(&file, password)?;
        metrics::record_keystore_op("unlock");
        tracing::debug!(address = %account.address, "Account unlocked");
        Ok(key)
    }

    /// Run `f` with the decrypted key. The key is dropped (and wiped) when
    /// `f` returns, whether or not it succeeded.
    pub fn with_unlocked<R, F>(&self, account: &Account, password: &str, f: F) -> BlockchainResult<R>
    where
        F: FnOnce(&KeyPair) -> BlockchainResult<R>,
    {
        let key = self.unlock(account, password)?;
        f(&key)
    }

    /// Remove the account's file after checking the password.
    pub fn delete(&self, account: &Account, password: &str) -> BlockchainResult<()> {
        let account = self.resolve(account)?;
        drop(self.unlock(&account, password)?);

        fs::remove_file(&account.path).map_err(|e| BlockchainError::keystore(account.path.display().to_string(), e))?;
        self.index.remove(&account.address);
        metrics::record_keystore_op("delete");
        metrics::record_keystore_accounts(self.index.len());
        tracing::info!(address = %account.address, "Account deleted");
        Ok(())
    }

    /// Look up the indexed entry so callers cannot point us at arbitrary paths.
    fn resolve(&self, account: &Account) -> BlockchainResult<Account> {
        self.find(&account.address)
            .ok_or_else(|| BlockchainError::keystore(account.address.to_string(), "unknown account"))
    }

    fn missing_file(&self, account: &Account, err: std::io::Error) -> BlockchainError {
        if err.kind() == std::io::ErrorKind::NotFound {
            self.index.remove(&account.address);
            metrics::record_keystore_accounts(self.index.len());
            tracing::warn!(address = %account.address, path = %account.path.display(), "Key file removed externally");
        }
        BlockchainError::keystore(account.path.display().to_string(), err)
    }

    /// Encrypt and write `key`, then index it.
    ///
    /// The address is claimed through the index entry before the file is
    /// written, so two stores of one key leave exactly one file.
    fn store(&self, key: &KeyPair, password: &str) -> BlockchainResult<Account> {
        let address = key.address();
        let json = encrypt_key(key, password, self.params)?.to_json()?;
        let account = Account {
            address,
            path: self.dir.join(key_file_name(Utc::now(), &address)),
        };

        match self.index.entry(address) {
            Entry::Occupied(_) => {
                return Err(BlockchainError::keystore(address.to_string(), "account already exists"));
            }
            Entry::Vacant(slot) => {
                write_atomic(&self.dir, &account.path, &json)?;
                slot.insert(account.clone());
            }
        }

        metrics::record_keystore_accounts(self.index.len());
        Ok(account)
    }
}

/// `UTC--<ISO8601 with dashes>--<hex address>`
pub(crate) fn key_file_name(created: DateTime<Utc>, address: &Address) -> String {
    format!(
        "UTC--{}--{}",
        created.format("%Y-%m-%dT%H-%M-%S%.9fZ"),
        hex::encode(address)
    )
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.') || name.ends_with('~'))
        .unwrap_or(true)
}

fn load_account(path: &Path) -> BlockchainResult<Account> {
    let bytes = fs::read(path).map_err(|e| BlockchainError::keystore(path.display().to_string(), e))?;
    let file = EncryptedKeyFile::from_json(&bytes)?;
    Ok(Account {
        address: file.address()?,
        path: path.to_path_buf(),
    })
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> BlockchainResult<()> {
    let target = path.display().to_string();
    fs::create_dir_all(dir).map_err(|e| BlockchainError::keystore(dir.display().to_string(), e))?;
    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));

    let result = (|| -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut f = options.open(&tmp)?;
        f.write_all(contents)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(BlockchainError::keystore(target, e));
    }
    Ok(())
}
