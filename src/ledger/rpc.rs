//! EVM JSON-RPC Read Client
//!
//! Reads the chain head, `ScoreSubmitted` logs and transaction receipts from
//! an Ethereum-style node over HTTP. Writes need a wallet signature and are
//! not implemented here; a receipt read is how a caller reconciles a write
//! whose outcome is unknown.
//!
//! Log layout for `ScoreSubmitted(uint256 indexed gameId, address indexed player,
//! bytes32 finalBoardHash, uint32 finalScore)`:
//!
//! ```text
//! topics[0]  event signature hash
//! topics[1]  gameId            (uint256, left-padded)
//! topics[2]  player            (address, left-padded)
//! data[0..32]   finalBoardHash (bytes32)
//! data[32..64]  finalScore     (uint32, left-padded)
//! ```
//!
//! `GameCreated(uint256 indexed gameId, address indexed player, bytes32 boardHash)`
//! shares the topic layout and carries the board hash as its only data word.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::core::hash::{decode_word, Commitment, Hash32};
use crate::ledger::{
    Address, BlockNumber, LedgerError, LedgerEvent, LedgerReader, ScoreRecord, SessionId,
    TxHash, TxReceipt,
};

/// `keccak256("ScoreSubmitted(uint256,address,bytes32,uint32)")`
pub const SCORE_SUBMITTED_TOPIC: &str =
    "0xd453b544bccb2a6f47c4fff5830beef742b9578850e0f6ff52282438e2236fff";

/// `keccak256("GameCreated(uint256,address,bytes32)")`
pub const GAME_CREATED_TOPIC: &str =
    "0x3f0164df801ab6ce891e61b3f88fac307c68643f4ff603cc204d883c2d903b69";

/// Raw log object as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    /// Emitting contract. Always present in receipts and `eth_getLogs` results.
    #[serde(default)]
    pub address: Option<String>,
    /// Indexed topics, hex words.
    pub topics: Vec<String>,
    /// Non-indexed payload, hex.
    pub data: String,
    /// Inclusion block, hex quantity. Absent for pending logs.
    #[serde(default)]
    pub block_number: Option<String>,
    /// Position in the block, hex quantity.
    #[serde(default)]
    pub log_index: Option<String>,
}

/// Transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    /// `0x1` success, `0x0` reverted.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC ledger reader bound to one contract.
pub struct JsonRpcLedger {
    http_client: reqwest::Client,
    url: String,
    contract: Address,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// Reader for `contract` through the node at `url`.
    pub fn new(url: impl Into<String>, contract: Address) -> Self {
        Self::with_client(reqwest::Client::new(), url, contract)
    }

    /// Reader using a preconfigured HTTP client.
    pub fn with_client(http_client: reqwest::Client, url: impl Into<String>, contract: Address) -> Self {
        Self {
            http_client,
            url: url.into(),
            contract,
            next_id: AtomicU64::new(1),
        }
    }

    /// Node endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Contract whose logs are read.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Finalized receipt of `tx_hash`, decoded into ledger events.
    ///
    /// `None` while the transaction is unknown or pending. A reverted
    /// transaction is `Rejected`.
    pub async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, LedgerError> {
        let receipt: Option<RpcReceipt> = self
            .call_nullable("eth_getTransactionReceipt", json!([tx_hash.to_hex()]))
            .await?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };
        let Some(block) = receipt.block_number.as_deref() else {
            return Ok(None);
        };

        if receipt.status.as_deref() == Some("0x0") {
            return Err(LedgerError::Rejected(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(Some(TxReceipt {
            tx_hash: parse_word(&receipt.transaction_hash).map(Commitment::new)?,
            block_number: parse_quantity(block)?,
            logs: decode_receipt_logs(&self.contract, &receipt.logs)?,
        }))
    }

    /// Perform one JSON-RPC call whose result must be present.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        self.call_nullable(method, params)
            .await?
            .ok_or_else(|| LedgerError::Decode(format!("{} response has no result", method)))
    }

    /// Perform one JSON-RPC call; a `null` result is `None`.
    async fn call_nullable<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("rpc {} #{}", method, id);

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("{} returned HTTP {}", method, status)));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("{} response: {}", method, e)))?;

        if let Some(error) = parsed.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(parsed.result)
    }
}

#[async_trait]
impl LedgerReader for JsonRpcLedger {
    async fn block_number(&self) -> Result<BlockNumber, LedgerError> {
        let head: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&head)
    }

    async fn score_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<ScoreRecord>, LedgerError> {
        let logs: Vec<RpcLog> = self
            .call("eth_getLogs", json!([score_filter(&self.contract, from, to)]))
            .await
            .map_err(|e| match e {
                LedgerError::Transport(reason) | LedgerError::Decode(reason) => {
                    LedgerError::RangeUnavailable { from, to, reason }
                }
                other => other,
            })?;

        let mut records = Vec::with_capacity(logs.len());
        let mut order = Vec::with_capacity(logs.len());
        for log in &logs {
            let log_index = match &log.log_index {
                Some(index) => parse_quantity(index)?,
                None => 0,
            };
            let record = decode_score_log(log)?;
            order.push((record.block_number, log_index));
            records.push(record);
        }

        // Nodes return logs in order already; keep that guarantee explicit.
        let mut indexed: Vec<_> = order.into_iter().zip(records).collect();
        indexed.sort_by_key(|(key, _)| *key);
        Ok(indexed.into_iter().map(|(_, record)| record).collect())
    }
}

/// `eth_getLogs` filter for `ScoreSubmitted` in `from..=to`.
pub fn score_filter(contract: &Address, from: BlockNumber, to: BlockNumber) -> Value {
    json!({
        "address": contract.to_hex(),
        "fromBlock": format_quantity(from),
        "toBlock": format_quantity(to),
        "topics": [SCORE_SUBMITTED_TOPIC],
    })
}

/// Decode one `ScoreSubmitted` log.
pub fn decode_score_log(log: &RpcLog) -> Result<ScoreRecord, LedgerError> {
    let (session_id, player) = decode_indexed(log, SCORE_SUBMITTED_TOPIC)?;
    let [hash_word, score_word] = decode_data::<2>(log)?;

    let final_score = u32::try_from(word_to_u64(&score_word)?)
        .map_err(|_| LedgerError::Decode("score exceeds uint32".to_string()))?;

    let block_number = log
        .block_number
        .as_deref()
        .ok_or_else(|| LedgerError::Decode("pending log has no block number".to_string()))
        .and_then(parse_quantity)?;

    Ok(ScoreRecord {
        session_id,
        player,
        final_commitment: Commitment::new(hash_word),
        final_score,
        block_number,
    })
}

/// Decode one `GameCreated` log.
pub fn decode_game_created_log(log: &RpcLog) -> Result<LedgerEvent, LedgerError> {
    let (session_id, player) = decode_indexed(log, GAME_CREATED_TOPIC)?;
    let [hash_word] = decode_data::<1>(log)?;

    Ok(LedgerEvent::GameCreated {
        session_id,
        player,
        board_commitment: Commitment::new(hash_word),
    })
}

/// Decode the `GameCreated` and `ScoreSubmitted` logs `contract` emitted in a
/// receipt, in emission order. Logs from other contracts or with other
/// topics are skipped.
pub fn decode_receipt_logs(contract: &Address, logs: &[RpcLog]) -> Result<Vec<LedgerEvent>, LedgerError> {
    let mut events = Vec::new();
    for log in logs {
        let from_contract = match log.address.as_deref() {
            Some(address) => address.parse::<Address>().ok() == Some(*contract),
            None => true,
        };
        let Some(topic) = log.topics.first().filter(|_| from_contract) else {
            continue;
        };

        if topic.eq_ignore_ascii_case(GAME_CREATED_TOPIC) {
            events.push(decode_game_created_log(log)?);
        } else if topic.eq_ignore_ascii_case(SCORE_SUBMITTED_TOPIC) {
            events.push(LedgerEvent::ScoreSubmitted(decode_score_log(log)?));
        }
    }
    Ok(events)
}

/// Check the event topic and decode `(gameId, player)` from topics 1 and 2.
fn decode_indexed(log: &RpcLog, topic: &str) -> Result<(SessionId, Address), LedgerError> {
    if log.topics.len() < 3 {
        return Err(LedgerError::Decode(format!(
            "expected 3 topics, got {}",
            log.topics.len()
        )));
    }
    if !log.topics[0].eq_ignore_ascii_case(topic) {
        return Err(LedgerError::Decode(format!("unexpected topic {}", log.topics[0])));
    }

    let session_id = word_to_u64(&parse_word(&log.topics[1])?)?;
    let player = word_to_address(&parse_word(&log.topics[2])?)?;
    Ok((session_id, player))
}

/// Split log data into exactly `N` 32-byte words.
fn decode_data<const N: usize>(log: &RpcLog) -> Result<[Hash32; N], LedgerError> {
    let raw = log.data.strip_prefix("0x").unwrap_or(&log.data);
    let data = hex::decode(raw).map_err(|e| LedgerError::Decode(format!("log data: {}", e)))?;
    if data.len() != N * 32 {
        return Err(LedgerError::Decode(format!(
            "expected {} data bytes, got {}",
            N * 32,
            data.len()
        )));
    }

    let mut words = [[0u8; 32]; N];
    for (word, chunk) in words.iter_mut().zip(data.chunks_exact(32)) {
        word.copy_from_slice(chunk);
    }
    Ok(words)
}

/// Parse a `0x` hex quantity.
pub fn parse_quantity(s: &str) -> Result<u64, LedgerError> {
    let raw = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Decode(format!("quantity without 0x: {}", s)))?;
    u64::from_str_radix(raw, 16).map_err(|e| LedgerError::Decode(format!("quantity {}: {}", s, e)))
}

/// Format a `0x` hex quantity.
pub fn format_quantity(n: u64) -> String {
    format!("0x{:x}", n)
}

fn parse_word(s: &str) -> Result<Hash32, LedgerError> {
    decode_word(s).map_err(|e| LedgerError::Decode(e.to_string()))
}

fn word_to_u64(word: &Hash32) -> Result<u64, LedgerError> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(LedgerError::Decode("integer word exceeds 64 bits".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

fn word_to_address(word: &Hash32) -> Result<Address, LedgerError> {
    if word[..12].iter().any(|&b| b != 0) {
        return Err(LedgerError::Decode("address word has non-zero padding".to_string()));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(Address::new(bytes))
}

// =============================================================================
// TESTS
// =============================================================================
