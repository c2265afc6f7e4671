//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chain_wallet::crypto::ScryptParams;
use chain_wallet::transport::MockTransport;
use chain_wallet::{ChainClient, KeystoreManager};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Cheap KDF cost so tests stay fast.
pub const TEST_SCRYPT: ScryptParams = ScryptParams { n: 1 << 10, p: 1 };

/// Keystore in a fresh temporary directory. Keep the `TempDir` alive.
pub fn temp_keystore() -> (TempDir, KeystoreManager) {
    let dir = TempDir::new().unwrap();
    let keystore = KeystoreManager::open(dir.path(), TEST_SCRYPT).unwrap();
    (dir, keystore)
}

/// Query client over a scripted transport; the mock stays usable for scripting.
pub fn mock_client() -> (MockTransport, ChainClient) {
    let mock = MockTransport::new();
    let client = ChainClient::new(Arc::new(mock.clone()));
    (mock, client)
}

pub fn hash_hex(byte: u8) -> String {
    format!("0x{}", format!("{:02x}", byte).repeat(32))
}

pub fn empty_bloom() -> String {
    format!("0x{}", "0".repeat(512))
}

pub fn header_json(number: u64, hash_byte: u8) -> Value {
    json!({
        "number": format!("0x{:x}", number),
        "hash": hash_hex(hash_byte),
        "parentHash": hash_hex(hash_byte.wrapping_sub(1)),
        "timestamp": "0x5b06a6e9",
        "difficulty": "0x0",
        "nonce": "0x0000000000000000",
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x5208",
        "miner": "0x0000000000000000000000000000000000000000",
        "sha3Uncles": hash_hex(0x1d),
        "stateRoot": hash_hex(0x0b),
        "transactionsRoot": hash_hex(0x56),
        "receiptsRoot": hash_hex(0x56),
        "logsBloom": empty_bloom(),
        "mixHash": hash_hex(0x00),
        "extraData": "0x"
    })
}

pub fn transaction_json(index: u64, block: Option<(u64, u8)>) -> Value {
    let (block_hash, block_number, tx_index) = match block {
        Some((number, byte)) => (
            json!(hash_hex(byte)),
            json!(format!("0x{:x}", number)),
            json!(format!("0x{:x}", index)),
        ),
        None => (Value::Null, Value::Null, Value::Null),
    };
    json!({
        "hash": format!("0x{:064x}", index + 1),
        "nonce": format!("0x{:x}", index),
        "gas": "0x5208",
        "gasPrice": "0x4a817c800",
        "value": "0x0",
        "to": "0x3535353535353535353535353535353535353535",
        "input": "0x",
        "v": "0x25",
        "r": "0x1",
        "s": "0x1",
        "type": "0x0",
        "from": "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f",
        "blockHash": block_hash,
        "blockNumber": block_number,
        "transactionIndex": tx_index
    })
}

pub fn block_json(number: u64, hash_byte: u8, tx_count: u64) -> Value {
    let mut block = header_json(number, hash_byte);
    block["transactions"] = Value::Array(
        (0..tx_count)
            .map(|i| transaction_json(i, Some((number, hash_byte))))
            .collect(),
    );
    block
}

pub fn receipt_json(tx_hash: &str, status: &str) -> Value {
    json!({
        "type": "0x0",
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "from": "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f",
        "to": "0x3535353535353535353535353535353535353535",
        "contractAddress": null,
        "logsBloom": empty_bloom(),
        "blockHash": hash_hex(0x42),
        "blockNumber": "0x10",
        "status": status,
        "gasUsed": "0x5208",
        "cumulativeGasUsed": "0x5208",
        "logs": []
    })
}
