//! Chain data model: headers, blocks, transactions and receipts.

use alloy::consensus::{Signed, Transaction as _, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::{Encodable2718, Typed2718};
use alloy::primitives::{Address, Bytes, B256, B64, U256};

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::crypto::keys::{recover_signer, Signature};

/// Block header as announced by the node.
///
/// The number does not identify a canonical header: after a reorganization
/// a different hash can show up at a number already seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    pub difficulty: U256,
    pub nonce: B64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub miner: Address,
    pub base_fee_per_gas: Option<u64>,
}

/// A header with its ordered transaction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    /// Execution order.
    pub transactions: Vec<SignedTransaction>,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> B256 {
        self.header.hash
    }

    /// Find a transaction by hash.
    pub fn transaction(&self, hash: &B256) -> Option<&SignedTransaction> {
        self.transactions.iter().find(|tx| tx.hash() == *hash)
    }
}

/// An unsigned legacy value transfer.
///
/// `chain_id` is filled in at signing time and selects the EIP-155 signing
/// payload; `to: TxKind::Create` is a contract creation.
pub type Transaction = TxLegacy;

/// Where a transaction landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
    pub block_hash: B256,
    pub block_number: u64,
    pub index: u64,
}

/// A signed transaction, either built locally or reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// EIP-2718 envelope; any type the node reports.
    pub envelope: TxEnvelope,
    /// Sender as reported by the node, if any.
    pub from: Option<Address>,
    /// `None` while pending.
    pub inclusion: Option<Inclusion>,
}

impl From<Signed<TxLegacy>> for SignedTransaction {
    fn from(signed: Signed<TxLegacy>) -> Self {
        Self {
            envelope: TxEnvelope::from(signed),
            from: None,
            inclusion: None,
        }
    }
}

impl SignedTransaction {
    pub fn hash(&self) -> B256 {
        *self.envelope.tx_hash()
    }

    pub fn nonce(&self) -> u64 {
        self.envelope.nonce()
    }

    pub fn to(&self) -> Option<Address> {
        self.envelope.to()
    }

    pub fn value(&self) -> U256 {
        self.envelope.value()
    }

    /// Chain id the signature is bound to, when known.
    pub fn chain_id(&self) -> Option<u64> {
        self.envelope.chain_id()
    }

    /// EIP-2718 envelope type; 0 for legacy.
    pub fn tx_type(&self) -> u8 {
        self.envelope.ty()
    }

    pub fn is_pending(&self) -> bool {
        self.inclusion.is_none()
    }

    /// The signature in `(v, r, s)` form. Legacy `v` carries the chain id.
    pub fn signature(&self) -> BlockchainResult<Signature> {
        let chain_id = if self.envelope.is_legacy() { self.chain_id() } else { None };
        Signature::from_primitive(self.envelope.signature(), chain_id)
    }

    /// EIP-2718 encoding for `eth_sendRawTransaction`.
    pub fn raw(&self) -> Bytes {
        self.envelope.encoded_2718().into()
    }

    /// Recover the sender from the signature.
    ///
    /// A signature bound to a chain id must be bound to `chain_id`.
    pub fn sender(&self, chain_id: u64) -> BlockchainResult<Address> {
        if let Some(bound) = self.chain_id() {
            if bound != chain_id {
                return Err(BlockchainError::InvalidSignature(format!(
                    "signed for chain {}, expected {}",
                    bound, chain_id
                )));
            }
        }
        let signature = Signature::from_primitive(self.envelope.signature(), None)?;
        recover_signer(&signature, &self.envelope.signature_hash(), chain_id)
    }
}

/// Execution outcome recorded in a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
    /// Pre-Byzantium receipts carry a state root instead of a status.
    Unknown,
}

/// A log entry emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: Option<u64>,
}

/// Post-execution result of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub status: ReceiptStatus,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub logs: Vec<LogEntry>,
    pub contract_address: Option<Address>,
    pub effective_gas_price: Option<u128>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}
