//! Query client, subscription and transfer pipeline over a scripted node.

use std::time::{Duration, Instant};

use alloy::primitives::{Address, Bytes, B256, U256};
use chain_wallet::blockchain::{
    await_receipt, broadcast, sign_transaction, HeaderSubscription, SubscriptionEvent,
    SubscriptionOptions, TransferSettings, TxBuilder,
};
use chain_wallet::BlockchainError;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_block_query_counts_agree() {
    let (mock, client) = common::mock_client();
    mock.push_response("eth_getBlockByNumber", common::block_json(5_671_744, 0x9e, 144));
    mock.push_response("eth_getBlockTransactionCountByHash", json!("0x90"));
    mock.push_response(
        "eth_getTransactionByBlockHashAndIndex",
        common::transaction_json(0, Some((5_671_744, 0x9e))),
    );

    let block = client.block_by_number(5_671_744).await.unwrap();
    let count = client.transaction_count(block.hash()).await.unwrap();
    assert_eq!(block.transactions.len() as u64, count);

    let first = client.transaction_in_block(block.hash(), 0).await.unwrap();
    assert_eq!(Some(&first), block.transactions.first());
    assert_eq!(block.transaction(&first.hash()), Some(&first));
}

#[tokio::test]
async fn test_headers_then_bodies() {
    let (mock, client) = common::mock_client();
    let feed = mock.expect_subscription();
    mock.push_response("eth_getBlockByHash", common::block_json(12, 0x0c, 3));

    let mut subscription =
        HeaderSubscription::spawn(client.transport(), SubscriptionOptions::default());
    feed.push(common::header_json(12, 0x0c));

    let header = match tokio::time::timeout(Duration::from_secs(2), subscription.next()).await {
        Ok(Some(SubscriptionEvent::Header(header))) => header,
        other => panic!("expected header, got {:?}", other),
    };
    let block = client.block_by_hash(header.hash).await.unwrap();
    assert_eq!(block.header, header);
    assert_eq!(block.transactions.len(), 3);
    assert_eq!(mock.calls().last().unwrap().1, json!([B256::repeat_byte(0x0c), true]));
}

#[tokio::test]
async fn test_transfer_from_keystore_account() {
    let (_dir, keystore) = common::temp_keystore();
    let account = keystore.new_account("hunter2").unwrap();
    let to: Address = "0x3535353535353535353535353535353535353535".parse().unwrap();

    let (mock, client) = common::mock_client();
    mock.push_response("eth_getTransactionCount", json!("0x2a"));
    mock.push_response("eth_gasPrice", json!("0x3b9aca00"));
    mock.push_response("eth_chainId", json!("0xaa36a7"));
    let builder = TxBuilder::new(client, TransferSettings::default());

    let (tx, chain_id) = builder
        .prepare(account.address, to, U256::from(1_000u64), Bytes::new())
        .await
        .unwrap();
    assert_eq!(chain_id, 11_155_111);
    assert_eq!(tx.nonce, 42);

    let signed = keystore
        .with_unlocked(&account, "hunter2", |key| sign_transaction(tx, key, chain_id))
        .unwrap();
    assert_eq!(signed.sender(chain_id).unwrap(), account.address);

    let hash_hex = signed.hash().to_string();
    mock.push_response("eth_sendRawTransaction", json!(hash_hex));
    mock.push_response("eth_getTransactionReceipt", Value::Null);
    mock.push_response("eth_getTransactionReceipt", common::receipt_json(&hash_hex, "0x1"));

    let hash = broadcast(builder.client(), &signed).await.unwrap();
    assert_eq!(hash, signed.hash());

    let receipt = await_receipt(
        builder.client(),
        hash,
        Duration::from_millis(5),
        Duration::from_secs(2),
    )
    .await
    .unwrap();
    assert!(receipt.succeeded());
    assert_eq!(receipt.transaction_hash, hash);
}

#[test]
fn test_wrong_password_never_signs() {
    let (_dir, keystore) = common::temp_keystore();
    let account = keystore.new_account("right").unwrap();

    let result = keystore.with_unlocked(&account, "wrong", |_| -> Result<(), BlockchainError> {
        panic!("closure must not run without the key")
    });
    assert!(matches!(result, Err(BlockchainError::AuthenticationFailure { .. })));
}

#[tokio::test]
async fn test_receipt_timeout_not_before_deadline() {
    let (mock, client) = common::mock_client();
    mock.set_fallback("eth_getTransactionReceipt", Ok(Value::Null));
    let deadline = Duration::from_millis(150);

    let started = Instant::now();
    let err = await_receipt(&client, B256::repeat_byte(1), Duration::from_millis(10), deadline)
        .await
        .unwrap_err();

    assert!(started.elapsed() >= deadline);
    assert!(matches!(err, BlockchainError::Timeout { .. }));
    assert!(err.to_string().contains(&B256::repeat_byte(1).to_string()));
}
