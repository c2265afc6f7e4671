//! JSON-RPC responses decoded through alloy's rpc types and mapped into the
//! data model.
//!
//! Quantities arrive as `0x`-prefixed hex strings. Unknown fields are
//! ignored so newer node versions keep parsing.

use alloy::primitives::{B256, U128, U256, U64};
use alloy::rpc::types::{self as rpc, BlockTransactions};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::blockchain::model::{
    Block, Header, Inclusion, LogEntry, Receipt, ReceiptStatus, SignedTransaction,
};
use crate::blockchain::types::{BlockchainError, BlockchainResult};

impl From<rpc::Header> for Header {
    fn from(h: rpc::Header) -> Self {
        Self {
            number: h.inner.number,
            hash: h.hash,
            parent_hash: h.inner.parent_hash,
            timestamp: h.inner.timestamp,
            difficulty: h.inner.difficulty,
            nonce: h.inner.nonce,
            gas_limit: h.inner.gas_limit,
            gas_used: h.inner.gas_used,
            miner: h.inner.beneficiary,
            base_fee_per_gas: h.inner.base_fee_per_gas,
        }
    }
}

impl From<rpc::Transaction> for SignedTransaction {
    fn from(tx: rpc::Transaction) -> Self {
        let inclusion = match (tx.block_hash, tx.block_number) {
            (Some(block_hash), Some(block_number)) => Some(Inclusion {
                block_hash,
                block_number,
                index: tx.transaction_index.unwrap_or_default(),
            }),
            _ => None,
        };
        let (envelope, from) = tx.inner.into_parts();
        Self {
            envelope,
            from: Some(from),
            inclusion,
        }
    }
}

impl From<rpc::TransactionReceipt> for Receipt {
    fn from(r: rpc::TransactionReceipt) -> Self {
        let status = match r.inner.as_receipt().and_then(|receipt| receipt.status.as_eip658()) {
            Some(true) => ReceiptStatus::Success,
            Some(false) => ReceiptStatus::Failure,
            None => ReceiptStatus::Unknown,
        };
        Self {
            transaction_hash: r.transaction_hash,
            block_hash: r.block_hash,
            block_number: r.block_number,
            status,
            gas_used: r.gas_used,
            cumulative_gas_used: r.inner.cumulative_gas_used(),
            logs: r
                .inner
                .logs()
                .iter()
                .map(|log| LogEntry {
                    address: log.address(),
                    topics: log.topics().to_vec(),
                    data: log.data().data.clone(),
                    log_index: log.log_index,
                })
                .collect(),
            contract_address: r.contract_address,
            effective_gas_price: Some(r.effective_gas_price).filter(|p| *p > 0),
        }
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<T> {
    T::deserialize(value).map_err(|e| BlockchainError::malformed(operation, target, e))
}

pub(crate) fn header(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<Header> {
    decode::<rpc::Header>(operation, target, value).map(Header::from)
}

/// A block with full transaction objects. Hash-only bodies are refused.
pub(crate) fn block(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<Block> {
    let block = decode::<rpc::Block>(operation, target, value)?;
    let transactions = match block.transactions {
        BlockTransactions::Full(txs) => txs.into_iter().map(SignedTransaction::from).collect(),
        BlockTransactions::Hashes(_) => {
            return Err(BlockchainError::malformed(operation, target, "expected full transactions, got hashes"))
        }
        BlockTransactions::Uncle => {
            return Err(BlockchainError::malformed(operation, target, "missing transactions"))
        }
    };
    Ok(Block {
        header: block.header.into(),
        transactions,
    })
}

pub(crate) fn transaction(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<SignedTransaction> {
    decode::<rpc::Transaction>(operation, target, value).map(SignedTransaction::from)
}

pub(crate) fn receipt(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<Receipt> {
    decode::<rpc::TransactionReceipt>(operation, target, value).map(Receipt::from)
}

pub(crate) fn quantity(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<u64> {
    decode::<U64>(operation, target, value).map(|q| q.to())
}

pub(crate) fn quantity_u128(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<u128> {
    decode::<U128>(operation, target, value).map(|q| q.to())
}

pub(crate) fn quantity_u256(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<U256> {
    decode::<U256>(operation, target, value)
}

pub(crate) fn hash(operation: &'static str, target: &str, value: &Value) -> BlockchainResult<B256> {
    decode::<B256>(operation, target, value)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! JSON shaped like real node responses.

    use serde_json::{json, Value};

    pub fn header_json(number: u64, hash_byte: u8) -> Value {
        json!({
            "number": format!("0x{:x}", number),
            "hash": format!("0x{}", hex_repeat(hash_byte, 32)),
            "parentHash": format!("0x{}", hex_repeat(hash_byte.wrapping_sub(1), 32)),
            "timestamp": "0x5b06a6e9",
            "difficulty": "0xb6de4fe9a1969",
            "nonce": "0x6c8e0a9b3c9bc5b0",
            "gasLimit": "0x7a121d",
            "gasUsed": "0x79cb6b",
            "miner": "0xea674fdde714fd979de3edf0f56aa9716b898ec8",
            "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            "stateRoot": "0x0bf4bd32d5b0b5bd4fcd6ba6d1f1e8a4d0e84c2c4cc3e9e8b8b2c3cd0de5ec0a",
            "transactionsRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
            "receiptsRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
            "logsBloom": empty_bloom(),
            "mixHash": "0x3f9c4e1e8f4a8d1f0e5a7a2c5b8b4d7f0c6e9a1b2d3c4e5f60718293a4b5c6d7",
            "extraData": "0x65746865726d696e652d6177732d6575312d32"
        })
    }

    pub fn transaction_json(nonce: u64, block: Option<(u64, u8)>) -> Value {
        let mut tx = json!({
            "hash": format!("0x{:064x}", nonce + 1),
            "nonce": format!("0x{:x}", nonce),
            "gas": "0x19a28",
            "gasPrice": "0x17bfac7c00",
            "value": "0x2386f26fc10000",
            "to": "0x55fe59d8ad77035154ddd0ad0388d09dd4047a8e",
            "input": "0x",
            "from": "0x0fd081e3bb178dc45c0cb23202069dda57064258",
            "v": "0x25",
            "r": "0x28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276",
            "s": "0x67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83",
            "type": "0x0",
            "blockHash": null,
            "blockNumber": null,
            "transactionIndex": null
        });
        if let Some((number, hash_byte)) = block {
            tx["blockHash"] = json!(format!("0x{}", hex_repeat(hash_byte, 32)));
            tx["blockNumber"] = json!(format!("0x{:x}", number));
            tx["transactionIndex"] = json!(format!("0x{:x}", nonce));
        }
        tx
    }

    pub fn block_json(number: u64, hash_byte: u8, tx_count: u64) -> Value {
        let mut block = header_json(number, hash_byte);
        block["uncles"] = json!([]);
        block["transactions"] = Value::Array(
            (0..tx_count)
                .map(|i| transaction_json(110_644 + i, Some((number, hash_byte))))
                .collect(),
        );
        block
    }

    pub fn receipt_json(status: &str) -> Value {
        json!({
            "type": "0x0",
            "transactionHash": format!("0x{:064x}", 1),
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", hex_repeat(0x9e, 32)),
            "blockNumber": "0x568b40",
            "from": "0x0fd081e3bb178dc45c0cb23202069dda57064258",
            "to": "0x55fe59d8ad77035154ddd0ad0388d09dd4047a8e",
            "status": status,
            "gasUsed": "0x5208",
            "cumulativeGasUsed": "0x1a4a8",
            "effectiveGasPrice": "0x17bfac7c00",
            "contractAddress": null,
            "logsBloom": empty_bloom(),
            "logs": [{
                "address": "0x55fe59d8ad77035154ddd0ad0388d09dd4047a8e",
                "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
                "data": "0x01",
                "blockHash": format!("0x{}", hex_repeat(0x9e, 32)),
                "blockNumber": "0x568b40",
                "transactionHash": format!("0x{:064x}", 1),
                "transactionIndex": "0x0",
                "logIndex": "0x0",
                "removed": false
            }]
        })
    }

    pub fn empty_bloom() -> String {
        format!("0x{}", "0".repeat(512))
    }

    fn hex_repeat(byte: u8, len: usize) -> String {
        format!("{:02x}", byte).repeat(len)
    }
}
