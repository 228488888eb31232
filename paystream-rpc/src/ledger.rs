//! [`LedgerReader`] over a JSON-RPC node.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256, U64};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::LedgerReader;
use paystream_core::types::{Amount, Announcement, BlockRange, EthAddress, TxHash};

use crate::client::{
    address_param, decode_quantity, decode_u64, encode_bytes, encode_quantity, is_range_limit,
    JsonRpcClient,
};
use crate::config::RpcConfig;
use crate::contracts::abi::{IERC20, IERC5564Announcer};
use crate::contracts::{from_alloy, to_alloy, u256_to_amount, u256_to_u64};

/// A log object as returned by `eth_getLogs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<U64>,
    transaction_hash: Option<B256>,
    log_index: Option<U64>,
    #[serde(default)]
    removed: bool,
}

/// Reads announcements and balances from a JSON-RPC node.
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<JsonRpcClient>,
}

impl RpcLedger {
    /// Wraps an existing client.
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }

    /// Connects to the endpoint in `config`.
    pub fn connect(config: &RpcConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(JsonRpcClient::new(config)?)))
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<JsonRpcClient> {
        &self.client
    }
}

/// Turns one `Announcement` log into the core type.
///
/// Only the ABI layout is checked here. Key material is validated per entry
/// by the matcher.
fn decode_log(log: RpcLog) -> Result<Announcement> {
    let event =
        IERC5564Announcer::Announcement::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            .map_err(|e| PaystreamError::AbiError(e.to_string()))?;

    let block_number = log
        .block_number
        .ok_or_else(|| PaystreamError::InvalidAnnouncement("log has no block number".into()))?;
    let transaction_hash = log
        .transaction_hash
        .ok_or_else(|| PaystreamError::InvalidAnnouncement("log has no transaction hash".into()))?;

    Ok(Announcement {
        // A scheme id beyond u64 is as unsupported as any other unknown scheme.
        scheme_id: u256_to_u64(event.schemeId).unwrap_or(u64::MAX),
        stealth_address: from_alloy(event.stealthAddress),
        caller: from_alloy(event.caller),
        ephemeral_pub_key: event.ephemeralPubKey.to_vec(),
        metadata: event.metadata.to_vec(),
        block_number: block_number.to::<u64>(),
        transaction_hash: TxHash::from_array(transaction_hash.0),
        log_index: log.log_index.map(|i| i.to::<u64>()).unwrap_or_default(),
    })
}

fn scheme_topic(scheme_id: u64) -> String {
    encode_bytes(&U256::from(scheme_id).to_be_bytes::<32>())
}

#[async_trait]
impl LedgerReader for RpcLedger {
    async fn block_number(&self) -> Result<u64> {
        let head: String = self
            .client
            .call_as("eth_blockNumber", serde_json::json!([]))
            .await?;
        decode_u64(&head)
    }

    #[instrument(skip(self))]
    async fn announcements(
        &self,
        announcer: EthAddress,
        range: BlockRange,
        scheme_id: Option<u64>,
    ) -> Result<Vec<Announcement>> {
        let mut topics = vec![serde_json::json!(encode_bytes(
            IERC5564Announcer::Announcement::SIGNATURE_HASH.as_slice()
        ))];
        if let Some(scheme_id) = scheme_id {
            topics.push(serde_json::json!(scheme_topic(scheme_id)));
        }

        let filter = serde_json::json!([{
            "address": address_param(&announcer),
            "fromBlock": encode_quantity(range.from),
            "toBlock": encode_quantity(range.to),
            "topics": topics,
        }]);

        let logs: Vec<RpcLog> = match self.client.call_as("eth_getLogs", filter).await {
            Ok(logs) => logs,
            Err(PaystreamError::RpcError { code, message }) if is_range_limit(code, &message) => {
                debug!(code, %message, "log range refused");
                return Err(PaystreamError::RangeTooLarge {
                    from_block: range.from,
                    to_block: range.to,
                });
            }
            Err(e) => return Err(e),
        };

        let total = logs.len();
        let mut announcements = Vec::with_capacity(total);
        for log in logs {
            if log.removed {
                continue;
            }
            if from_alloy(log.address) != announcer {
                warn!(emitter = %from_alloy(log.address), "log from unexpected contract, skipping");
                continue;
            }
            match decode_log(log) {
                Ok(announcement) => announcements.push(announcement),
                Err(e) => warn!(error = %e, "undecodable announcement log, skipping"),
            }
        }

        debug!(logs = total, decoded = announcements.len(), "fetched announcements");
        Ok(announcements)
    }

    async fn native_balance(&self, address: EthAddress) -> Result<Amount> {
        let balance: String = self
            .client
            .call_as(
                "eth_getBalance",
                serde_json::json!([address_param(&address), "latest"]),
            )
            .await?;
        decode_quantity(&balance)
    }

    async fn token_balance(&self, token: EthAddress, owner: EthAddress) -> Result<Amount> {
        let call = IERC20::balanceOfCall {
            owner: to_alloy(&owner),
        };
        let data = self.client.eth_call(token, &call.abi_encode()).await?;
        let ret = IERC20::balanceOfCall::abi_decode_returns(&data, true)
            .map_err(|e| PaystreamError::AbiError(e.to_string()))?;
        u256_to_amount(ret._0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_for(address: Address) -> B256 {
        address.into_word()
    }

    fn sample_log(metadata: &[u8]) -> RpcLog {
        let event = IERC5564Announcer::Announcement {
            schemeId: U256::from(1),
            stealthAddress: Address::repeat_byte(0xaa),
            caller: Address::repeat_byte(0xbb),
            ephemeralPubKey: Bytes::from(vec![0x02; 33]),
            metadata: Bytes::copy_from_slice(metadata),
        };
        RpcLog {
            address: Address::repeat_byte(0x55),
            topics: vec![
                IERC5564Announcer::Announcement::SIGNATURE_HASH,
                B256::from(U256::from(1).to_be_bytes::<32>()),
                topic_for(Address::repeat_byte(0xaa)),
                topic_for(Address::repeat_byte(0xbb)),
            ],
            data: Bytes::from(event.encode_data()),
            block_number: Some(U64::from(42)),
            transaction_hash: Some(B256::repeat_byte(0x01)),
            log_index: Some(U64::from(3)),
            removed: false,
        }
    }

    #[test]
    fn test_decode_log() {
        let announcement = decode_log(sample_log(&[0x7f])).unwrap();
        assert_eq!(announcement.scheme_id, 1);
        assert_eq!(announcement.stealth_address, EthAddress::from_array([0xaa; 20]));
        assert_eq!(announcement.caller, EthAddress::from_array([0xbb; 20]));
        assert_eq!(announcement.ephemeral_pub_key, vec![0x02; 33]);
        assert_eq!(announcement.metadata, vec![0x7f]);
        assert_eq!(announcement.block_number, 42);
        assert_eq!(announcement.log_index, 3);
        assert_eq!(announcement.transaction_hash, TxHash::from_array([0x01; 32]));
    }

    #[test]
    fn test_decode_log_rejects_wrong_topic() {
        let mut log = sample_log(&[0x7f]);
        log.topics[0] = B256::repeat_byte(0xee);
        assert!(matches!(decode_log(log), Err(PaystreamError::AbiError(_))));

        let mut pending = sample_log(&[0x7f]);
        pending.block_number = None;
        assert!(matches!(
            decode_log(pending),
            Err(PaystreamError::InvalidAnnouncement(_))
        ));
    }

    #[test]
    fn test_scheme_topic_is_left_padded() {
        let topic = scheme_topic(1);
        assert_eq!(topic.len(), 2 + 64);
        assert!(topic.ends_with("01"));
        assert!(topic[2..64].chars().all(|c| c == '0'));
    }

    #[test]
    fn test_rpc_log_deserializes_node_json() {
        let json = serde_json::json!({
            "address": "0x55649e01b5df198d18d95b5cc5051630cfd45564",
            "topics": [encode_bytes(IERC5564Announcer::Announcement::SIGNATURE_HASH.as_slice())],
            "data": "0x",
            "blockNumber": "0x1b4",
            "transactionHash": encode_bytes(&[0x11; 32]),
            "transactionIndex": "0x0",
            "blockHash": encode_bytes(&[0x22; 32]),
            "logIndex": "0x1",
            "removed": false
        });
        let log: RpcLog = serde_json::from_value(json).unwrap();
        assert_eq!(log.block_number.unwrap().to::<u64>(), 436);
        assert_eq!(log.log_index.unwrap().to::<u64>(), 1);
        assert!(!log.removed);
    }
}
