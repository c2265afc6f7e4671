//! Chain query client with timeout and error handling.
//!
//! # Responsibilities
//! - Query chain state (headers, blocks, transactions, receipts)
//! - Fetch the inputs of a transfer (pending nonce, gas price, chain id)
//! - Submit signed transactions
//! - Convert elapsed deadlines into `Timeout`
//!
//! # Design Decisions
//! - Stateless: one method = one round trip, safe to call concurrently
//! - No retries here; callers opt in via `resilience::retries`
//! - `null` results become `NotFound`, shape mismatches `MalformedResponse`

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::blockchain::model::{Block, Header, Receipt, SignedTransaction};
use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId};
use crate::blockchain::wire;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::transport::RpcTransport;

/// Deadline applied to each call unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request/response façade over an [`RpcTransport`].
#[derive(Clone)]
pub struct ChainClient {
    transport: Arc<dyn RpcTransport>,
    request_timeout: Duration,
}

impl ChainClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replace the per-call deadline.
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The underlying transport, e.g. to open a header subscription.
    pub fn transport(&self) -> Arc<dyn RpcTransport> {
        Arc::clone(&self.transport)
    }

    /// Header of the most recent block.
    pub async fn latest_header(&self) -> BlockchainResult<Header> {
        const OP: &str = "eth_getBlockByNumber";
        let value = self
            .call_some(OP, json!(["latest", false]), "block", "latest")
            .await?;
        wire::header(OP, "latest", &value)
    }

    pub async fn header_by_number(&self, number: u64) -> BlockchainResult<Header> {
        const OP: &str = "eth_getBlockByNumber";
        let target = block_target(number);
        let value = self
            .call_some(OP, json!([quantity(number), false]), "block", &target)
            .await?;
        wire::header(OP, &target, &value)
    }

    /// Full block with its transactions in execution order.
    pub async fn block_by_number(&self, number: u64) -> BlockchainResult<Block> {
        const OP: &str = "eth_getBlockByNumber";
        let target = block_target(number);
        let value = self
            .call_some(OP, json!([quantity(number), true]), "block", &target)
            .await?;
        wire::block(OP, &target, &value)
    }

    pub async fn block_by_hash(&self, hash: B256) -> BlockchainResult<Block> {
        const OP: &str = "eth_getBlockByHash";
        let target = hash.to_string();
        let value = self.call_some(OP, json!([hash, true]), "block", &target).await?;
        wire::block(OP, &target, &value)
    }

    /// Number of transactions in the block with `block_hash`.
    pub async fn transaction_count(&self, block_hash: B256) -> BlockchainResult<u64> {
        const OP: &str = "eth_getBlockTransactionCountByHash";
        let target = block_hash.to_string();
        let value = self.call_some(OP, json!([block_hash]), "block", &target).await?;
        wire::quantity(OP, &target, &value)
    }

    pub async fn transaction_in_block(
        &self,
        block_hash: B256,
        index: u64,
    ) -> BlockchainResult<SignedTransaction> {
        const OP: &str = "eth_getTransactionByBlockHashAndIndex";
        let target = format!("{} index {}", block_hash, index);
        let value = self
            .call_some(OP, json!([block_hash, quantity(index)]), "transaction", &target)
            .await?;
        wire::transaction(OP, &target, &value)
    }

    /// Look a transaction up by hash. The flag is true while it is pending.
    pub async fn transaction_by_hash(
        &self,
        hash: B256,
    ) -> BlockchainResult<(SignedTransaction, bool)> {
        const OP: &str = "eth_getTransactionByHash";
        let target = hash.to_string();
        let value = self.call_some(OP, json!([hash]), "transaction", &target).await?;
        let tx = wire::transaction(OP, &target, &value)?;
        let pending = tx.is_pending();
        Ok((tx, pending))
    }

    /// Receipt of an included transaction; `NotFound` while unconfirmed.
    pub async fn transaction_receipt(&self, hash: B256) -> BlockchainResult<Receipt> {
        const OP: &str = "eth_getTransactionReceipt";
        let target = hash.to_string();
        let value = self.call_some(OP, json!([hash]), "receipt", &target).await?;
        wire::receipt(OP, &target, &value)
    }

    /// Next nonce for `address` according to the node's pending view.
    ///
    /// Advisory only: two senders using the same account can both read the
    /// same value. Callers needing strict allocation must serialize
    /// submissions per account themselves.
    pub async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        const OP: &str = "eth_getTransactionCount";
        let target = address.to_string();
        let value = self.call(OP, json!([address, "pending"]), &target).await?;
        wire::quantity(OP, &target, &value)
    }

    /// Gas price suggested by the node, in wei.
    pub async fn suggested_gas_price(&self) -> BlockchainResult<u128> {
        const OP: &str = "eth_gasPrice";
        let value = self.call(OP, json!([]), "node").await?;
        wire::quantity_u128(OP, "node", &value)
    }

    pub async fn chain_id(&self) -> BlockchainResult<ChainId> {
        const OP: &str = "eth_chainId";
        let value = self.call(OP, json!([]), "node").await?;
        wire::quantity(OP, "node", &value).map(ChainId)
    }

    /// Network id as reported by `net_version` (a decimal string).
    pub async fn network_id(&self) -> BlockchainResult<u64> {
        const OP: &str = "net_version";
        let value = self.call(OP, json!([]), "node").await?;
        value
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| BlockchainError::malformed(OP, "node", format!("not a network id: {}", value)))
    }

    pub async fn block_number(&self) -> BlockchainResult<u64> {
        const OP: &str = "eth_blockNumber";
        let value = self.call(OP, json!([]), "node").await?;
        wire::quantity(OP, "node", &value)
    }

    /// Balance of `address` at the latest block, in wei.
    pub async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        const OP: &str = "eth_getBalance";
        let target = address.to_string();
        let value = self.call(OP, json!([address, "latest"]), &target).await?;
        wire::quantity_u256(OP, &target, &value)
    }

    /// Submit an RLP-encoded signed transaction and return its hash.
    pub async fn send_raw_transaction(&self, raw: &Bytes) -> BlockchainResult<B256> {
        const OP: &str = "eth_sendRawTransaction";
        let target = keccak256(raw).to_string();
        let value = self.call(OP, json!([raw]), &target).await?;
        wire::hash(OP, &target, &value)
    }

    /// Fail with `ChainMismatch` unless the node reports `expected`.
    pub async fn verify_chain_id(&self, expected: u64) -> BlockchainResult<ChainId> {
        let actual = self.chain_id().await?;
        if actual.0 != expected {
            return Err(BlockchainError::ChainMismatch {
                expected,
                actual: actual.0,
            });
        }
        Ok(actual)
    }

    /// Check if the node is reachable and answering.
    ///
    /// Returns true if we can query the block number.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.block_number().await.is_ok();
        metrics::record_backend_health("rpc", healthy);
        healthy
    }

    async fn call(
        &self,
        method: &'static str,
        params: Value,
        target: &str,
    ) -> BlockchainResult<Value> {
        let started = Instant::now();
        tracing::debug!(method, target, "RPC call");

        let result = with_deadline(method, target, self.request_timeout, async {
            self.transport
                .request(method, params)
                .await
                .map_err(|e| BlockchainError::from_transport(method, target, e))
        })
        .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(BlockchainError::Timeout { .. }) => "timeout",
            Err(BlockchainError::RejectedByNode { .. }) => "rejected",
            Err(_) => "error",
        };
        metrics::record_rpc(method, outcome, started);
        if let Err(e) = &result {
            tracing::debug!(method, target, error = %e, "RPC call failed");
        }
        result
    }

    /// Like `call`, but a `null` result means the entity does not exist.
    async fn call_some(
        &self,
        method: &'static str,
        params: Value,
        entity: &'static str,
        target: &str,
    ) -> BlockchainResult<Value> {
        match self.call(method, params, target).await? {
            Value::Null => Err(BlockchainError::NotFound {
                entity,
                target: target.to_string(),
            }),
            value => Ok(value),
        }
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn quantity(n: u64) -> String {
    format!("0x{:x}", n)
}

fn block_target(number: u64) -> String {
    format!("block {}", number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::wire::fixtures::*;
    use crate::transport::{HeaderStream, MockTransport, TransportError, TransportResult};
    use futures_util::future::BoxFuture;

    fn client(mock: &MockTransport) -> ChainClient {
        ChainClient::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_block_transaction_count_matches_body() {
        let mock = MockTransport::new();
        mock.push_response("eth_getBlockByNumber", block_json(5_671_744, 0x9e, 144));
        mock.push_response("eth_getBlockTransactionCountByHash", json!("0x90"));
        let client = client(&mock);

        let block = client.block_by_number(5_671_744).await.unwrap();
        let count = client.transaction_count(block.hash()).await.unwrap();

        assert_eq!(block.transactions.len() as u64, count);
        assert_eq!(count, 144);
        assert_eq!(
            mock.calls()[0].1,
            json!(["0x568b40", true]),
            "block number is sent as a hex quantity"
        );
    }

    #[tokio::test]
    async fn test_header_queries() {
        let mock = MockTransport::new();
        mock.push_response("eth_getBlockByNumber", header_json(10, 0x0a));
        mock.push_response("eth_getBlockByNumber", header_json(5, 0x05));
        let client = client(&mock);

        assert_eq!(client.latest_header().await.unwrap().number, 10);
        assert_eq!(client.header_by_number(5).await.unwrap().number, 5);

        let calls = mock.calls();
        assert_eq!(calls[0].1, json!(["latest", false]));
        assert_eq!(calls[1].1, json!(["0x5", false]));
    }

    #[tokio::test]
    async fn test_transaction_lookups() {
        let mock = MockTransport::new();
        mock.push_response("eth_getTransactionByHash", transaction_json(3, None));
        mock.push_response("eth_getTransactionByHash", transaction_json(4, Some((9, 0x09))));
        mock.push_response("eth_getTransactionByBlockHashAndIndex", transaction_json(4, Some((9, 0x09))));
        let client = client(&mock);

        let (_, pending) = client.transaction_by_hash(B256::with_last_byte(4)).await.unwrap();
        assert!(pending);
        let (tx, pending) = client.transaction_by_hash(B256::with_last_byte(5)).await.unwrap();
        assert!(!pending);
        assert_eq!(tx.inclusion.unwrap().block_number, 9);

        let tx = client
            .transaction_in_block(B256::repeat_byte(0x09), 4)
            .await
            .unwrap();
        assert_eq!(tx.nonce(), 4);
        assert_eq!(mock.calls()[2].1[1], json!("0x4"));
    }

    #[tokio::test]
    async fn test_missing_receipt_is_not_found() {
        let mock = MockTransport::new();
        mock.push_response("eth_getTransactionReceipt", Value::Null);
        mock.push_response("eth_getTransactionReceipt", receipt_json("0x1"));
        let client = client(&mock);

        let err = client.transaction_receipt(B256::ZERO).await.unwrap_err();
        assert!(matches!(err, BlockchainError::NotFound { entity: "receipt", .. }));
        assert!(!err.is_retryable());

        assert!(client.transaction_receipt(B256::ZERO).await.unwrap().succeeded());
    }

    #[tokio::test]
    async fn test_transfer_inputs() {
        let mock = MockTransport::new();
        mock.push_response("eth_getTransactionCount", json!("0x1b"));
        mock.push_response("eth_gasPrice", json!("0x4a817c800"));
        mock.push_response("eth_chainId", json!("0x1"));
        mock.push_response("net_version", json!("1"));
        mock.push_response("eth_getBalance", json!("0xde0b6b3a7640000"));
        let client = client(&mock);

        let address = Address::repeat_byte(0x11);
        assert_eq!(client.pending_nonce(address).await.unwrap(), 27);
        assert_eq!(client.suggested_gas_price().await.unwrap(), 20_000_000_000);
        assert_eq!(client.chain_id().await.unwrap(), ChainId(1));
        assert_eq!(client.network_id().await.unwrap(), 1);
        assert_eq!(
            client.balance(address).await.unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(mock.calls()[0].1[1], json!("pending"));
    }

    #[tokio::test]
    async fn test_errors_carry_context() {
        let mock = MockTransport::new();
        mock.push_error("eth_blockNumber", TransportError::Connection("refused".into()));
        mock.push_response("eth_blockNumber", json!({"unexpected": true}));
        mock.push_error(
            "eth_sendRawTransaction",
            TransportError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".into(),
            },
        );
        let client = client(&mock);

        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, BlockchainError::Transport { operation: "eth_blockNumber", .. }));

        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, BlockchainError::MalformedResponse { .. }));

        let err = client
            .send_raw_transaction(&Bytes::from_static(&[0xc0]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));

        // No automatic retry.
        assert_eq!(mock.call_count("eth_blockNumber"), 2);
        assert_eq!(mock.call_count("eth_sendRawTransaction"), 1);
    }

    #[tokio::test]
    async fn test_verify_chain_id() {
        let mock = MockTransport::new();
        mock.set_fallback("eth_chainId", Ok(json!("0xaa36a7")));
        let client = client(&mock);

        assert_eq!(client.verify_chain_id(11_155_111).await.unwrap(), ChainId(11_155_111));
        let err = client.verify_chain_id(1).await.unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::ChainMismatch { expected: 1, actual: 11_155_111 }
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let mock = MockTransport::new();
        mock.push_response("eth_blockNumber", json!("0x10"));
        let client = client(&mock);
        assert!(client.is_healthy().await);
        assert!(!client.is_healthy().await);
    }

    struct StalledTransport;

    impl RpcTransport for StalledTransport {
        fn request(&self, _method: &'static str, _params: Value) -> BoxFuture<'_, TransportResult<Value>> {
            Box::pin(futures_util::future::pending())
        }

        fn subscribe_new_heads(&self) -> BoxFuture<'_, TransportResult<HeaderStream>> {
            Box::pin(futures_util::future::pending())
        }
    }

    #[tokio::test]
    async fn test_deadline_becomes_timeout() {
        let client =
            ChainClient::new(Arc::new(StalledTransport)).with_timeout(Duration::from_millis(30));
        let started = Instant::now();
        let err = client.chain_id().await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(matches!(err, BlockchainError::Timeout { operation: "eth_chainId", .. }));
    }
}
