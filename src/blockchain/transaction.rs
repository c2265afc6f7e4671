//! Transaction building, signing, broadcast and receipt polling.
//!
//! # Responsibilities
//! - Validate and assemble legacy value transfers
//! - Sign with EIP-155 replay protection
//! - Broadcast and report node rejections verbatim
//! - Poll for the receipt within a deadline
//!
//! # Design Decisions
//! - The nonce comes from the node's pending view and is not reserved
//!   locally; concurrent senders on one account can collide
//! - A rejected broadcast is never resubmitted; only receipt polling loops

use alloy::consensus::SignableTransaction;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::ChainClient;
use crate::blockchain::model::{Receipt, SignedTransaction, Transaction};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::crypto::keys::{sign_hash, KeyPair};
use crate::observability::metrics;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Assemble an unsigned transaction.
///
/// Zero-value transfers are legal; a zero gas limit is not.
pub fn build_transaction(
    nonce: u64,
    to: Option<Address>,
    value: U256,
    gas_limit: u64,
    gas_price: u128,
    data: Bytes,
) -> BlockchainResult<Transaction> {
    if gas_limit == 0 {
        return Err(BlockchainError::InvalidTransaction(
            "gas limit must be greater than zero".to_string(),
        ));
    }
    Ok(Transaction {
        chain_id: None,
        nonce,
        gas_price,
        gas_limit,
        to: to.map_or(TxKind::Create, TxKind::Call),
        value,
        input: data,
    })
}

/// Sign `tx` for `chain_id`. The signature only verifies on that chain.
pub fn sign_transaction(
    mut tx: Transaction,
    key: &KeyPair,
    chain_id: u64,
) -> BlockchainResult<SignedTransaction> {
    tx.set_chain_id(chain_id);
    let signature = sign_hash(key, &tx.signature_hash())?.with_chain_id(chain_id)?;
    Ok(tx.into_signed(signature.to_primitive(Some(chain_id))?).into())
}

/// Submit a signed transaction and return the hash the node reports.
pub async fn broadcast(client: &ChainClient, signed: &SignedTransaction) -> BlockchainResult<B256> {
    let raw = signed.raw();
    match client.send_raw_transaction(&raw).await {
        Ok(hash) => {
            metrics::record_broadcast("accepted");
            if hash != signed.hash() {
                tracing::warn!(local = %signed.hash(), node = %hash, "Node reported a different transaction hash");
            }
            tracing::info!(tx_hash = %hash, nonce = signed.nonce(), "Transaction broadcast");
            Ok(hash)
        }
        Err(e) => {
            let outcome = if matches!(e, BlockchainError::RejectedByNode { .. }) {
                "rejected"
            } else {
                "error"
            };
            metrics::record_broadcast(outcome);
            tracing::warn!(tx_hash = %signed.hash(), error = %e, "Broadcast failed");
            Err(e)
        }
    }
}

/// Poll for the receipt of `hash` every `poll_interval` until `deadline` elapses.
///
/// Pending transactions and retryable transport failures keep the loop
/// going. Any other error ends it immediately. A zero `poll_interval` is
/// rejected with `InvalidTransaction` before the first poll.
pub async fn await_receipt(
    client: &ChainClient,
    hash: B256,
    poll_interval: Duration,
    deadline: Duration,
) -> BlockchainResult<Receipt> {
    if poll_interval.is_zero() {
        return Err(BlockchainError::InvalidTransaction(
            "receipt poll interval must be greater than zero".to_string(),
        ));
    }
    let started = Instant::now();
    let result = timeout(deadline, async {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match client.transaction_receipt(hash).await {
                Ok(receipt) => return Ok(receipt),
                Err(BlockchainError::NotFound { .. }) => {
                    tracing::debug!(tx_hash = %hash, "Transaction pending");
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(tx_hash = %hash, error = %e, "Receipt poll failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    })
    .await;

    match result {
        Ok(receipt) => {
            if let Ok(r) = &receipt {
                tracing::info!(
                    tx_hash = %hash,
                    block_number = r.block_number,
                    success = r.succeeded(),
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Receipt received"
                );
            }
            receipt
        }
        Err(_) => Err(BlockchainError::Timeout {
            operation: "await_receipt",
            target: hash.to_string(),
            elapsed: deadline,
        }),
    }
}

/// Knobs for [`TxBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    /// Base gas limit; 16 gas per payload byte is added on top.
    pub gas_limit: u64,
    /// Refuse to sign above this price. Zero disables the cap.
    pub max_gas_price_gwei: u64,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            gas_limit: 21_000,
            max_gas_price_gwei: 500,
            receipt_poll_interval: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

/// Transaction builder for value transfers.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    client: ChainClient,
    settings: TransferSettings,
}

impl TxBuilder {
    pub fn new(client: ChainClient, settings: TransferSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    /// Fetch nonce, gas price and chain id, and assemble the transfer.
    ///
    /// Returns the unsigned transaction and the chain id to sign it for.
    pub async fn prepare(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> BlockchainResult<(Transaction, u64)> {
        let nonce = self.client.pending_nonce(from).await?;
        let gas_price = self.client.suggested_gas_price().await?;
        self.check_gas_price(gas_price)?;
        let chain_id = self.client.chain_id().await?.0;

        let gas_limit = self
            .settings
            .gas_limit
            .saturating_add((data.len() as u64).saturating_mul(16));
        let tx = build_transaction(nonce, Some(to), value, gas_limit, gas_price, data)?;

        tracing::debug!(
            from = %from,
            to = %to,
            nonce,
            gas_price,
            gas_limit,
            chain_id,
            "Transfer prepared"
        );
        Ok((tx, chain_id))
    }

    /// Build, sign and broadcast a transfer from `key`'s account.
    pub async fn transfer(
        &self,
        key: &KeyPair,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> BlockchainResult<SignedTransaction> {
        let (tx, chain_id) = self.prepare(key.address(), to, value, data).await?;
        let signed = sign_transaction(tx, key, chain_id)?;
        broadcast(&self.client, &signed).await?;
        Ok(signed)
    }

    /// Wait for the receipt using the configured interval and deadline.
    pub async fn wait_for_receipt(&self, hash: B256) -> BlockchainResult<Receipt> {
        await_receipt(
            &self.client,
            hash,
            self.settings.receipt_poll_interval,
            self.settings.receipt_timeout,
        )
        .await
    }

    fn check_gas_price(&self, gas_price: u128) -> BlockchainResult<()> {
        let max_gwei = self.settings.max_gas_price_gwei;
        let current_gwei = gas_price / WEI_PER_GWEI;
        if max_gwei > 0 && current_gwei > max_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: u64::try_from(current_gwei).unwrap_or(u64::MAX),
                max_gwei,
            });
        }
        Ok(())
    }
}
