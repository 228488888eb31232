//! [`TransactionSubmitter`] that signs legacy EIP-155 transactions locally
//! with the recovered one-time key and broadcasts them over JSON-RPC.

use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use paystream_core::constants::{ERC20_TRANSFER_GAS, NATIVE_TRANSFER_GAS};
use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::TransactionSubmitter;
use paystream_core::types::{
    Asset, EthAddress, FeeQuote, SecretScalar, TransactionHandle, TransferRequest, TxHash,
};
use paystream_crypto::derive_eth_address;

use crate::client::{address_param, decode_quantity, decode_u64, encode_bytes, JsonRpcClient};
use crate::config::RpcConfig;
use crate::contracts::{erc20_transfer_data, to_alloy};

/// Broadcasts sweep transactions through a JSON-RPC node.
pub struct RpcSubmitter {
    client: Arc<JsonRpcClient>,
    chain_id: u64,
}

impl RpcSubmitter {
    /// Creates a submitter signing for `chain_id`.
    pub fn new(client: Arc<JsonRpcClient>, chain_id: u64) -> Self {
        Self { client, chain_id }
    }

    /// Connects to the endpoint and chain in `config`.
    pub fn connect(config: &RpcConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(JsonRpcClient::new(config)?),
            config.chain_id,
        ))
    }

    /// Chain id used for EIP-155 replay protection.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Target contract, value, and calldata for a transfer.
    fn call_parts(request: &TransferRequest) -> (TxKind, U256, Bytes) {
        match request.asset {
            Asset::Native => (
                TxKind::Call(to_alloy(&request.to)),
                U256::from(request.amount),
                Bytes::new(),
            ),
            Asset::Token(token) => (
                TxKind::Call(to_alloy(&token)),
                U256::ZERO,
                Bytes::from(erc20_transfer_data(&request.to, request.amount)),
            ),
        }
    }

    async fn gas_price(&self) -> Result<u128> {
        let price: String = self
            .client
            .call_as("eth_gasPrice", serde_json::json!([]))
            .await?;
        decode_quantity(&price)
    }

    async fn token_gas(&self, request: &TransferRequest, token: EthAddress) -> u64 {
        let tx = serde_json::json!([{
            "from": address_param(&request.from),
            "to": address_param(&token),
            "data": encode_bytes(&erc20_transfer_data(&request.to, request.amount)),
        }]);
        let estimate: Result<u64> = async {
            let gas: String = self.client.call_as("eth_estimateGas", tx).await?;
            decode_u64(&gas)
        }
        .await;

        match estimate {
            // Headroom for state changes between estimate and inclusion.
            Ok(gas) => gas.saturating_mul(6) / 5,
            Err(e) => {
                warn!(error = %e, fallback = ERC20_TRANSFER_GAS, "gas estimate failed");
                ERC20_TRANSFER_GAS
            }
        }
    }

    async fn pending_nonce(&self, request: &TransferRequest) -> Result<u64> {
        let nonce: String = self
            .client
            .call_as(
                "eth_getTransactionCount",
                serde_json::json!([address_param(&request.from), "pending"]),
            )
            .await?;
        decode_u64(&nonce)
    }
}

#[async_trait]
impl TransactionSubmitter for RpcSubmitter {
    #[instrument(skip(self))]
    async fn estimate_fee(&self, request: &TransferRequest) -> Result<FeeQuote> {
        let gas_price = self.gas_price().await?;
        let gas_limit = match request.asset {
            Asset::Native => NATIVE_TRANSFER_GAS,
            Asset::Token(token) => self.token_gas(request, token).await,
        };
        debug!(gas_limit, gas_price, "fee quoted");
        Ok(FeeQuote::new(gas_limit, gas_price))
    }

    #[instrument(skip(self, key), fields(from = %request.from, to = %request.to))]
    async fn submit(
        &self,
        key: &SecretScalar,
        request: &TransferRequest,
        fee: FeeQuote,
    ) -> Result<TransactionHandle> {
        if derive_eth_address(&key.public_point()) != request.from {
            return Err(PaystreamError::InvalidKeyMaterial(
                "key does not control the source address".into(),
            ));
        }

        let signer = PrivateKeySigner::from_slice(&key.to_bytes()[..])
            .map_err(|e| PaystreamError::InvalidKeyMaterial(e.to_string()))?;

        let nonce = self.pending_nonce(request).await?;
        let (to, value, input) = Self::call_parts(request);
        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: fee.gas_price,
            gas_limit: fee.gas_limit.into(),
            to,
            value,
            input,
        };

        let signature = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| PaystreamError::InternalError(format!("signing failed: {}", e)))?;
        let signed = tx.into_signed(signature);
        let tx_hash = TxHash::from_array(signed.hash().0);
        let raw = TxEnvelope::Legacy(signed).encoded_2718();

        let reported: String = self
            .client
            .call_as(
                "eth_sendRawTransaction",
                serde_json::json!([encode_bytes(&raw)]),
            )
            .await?;
        if TxHash::from_hex(&reported).ok() != Some(tx_hash) {
            warn!(%tx_hash, %reported, "node reported a different transaction hash");
        }

        info!(%tx_hash, nonce, asset = %request.asset, "sweep broadcast");
        Ok(TransactionHandle {
            tx_hash,
            from: request.from,
            to: request.to,
            asset: request.asset,
            amount: request.amount,
            fee,
        })
    }
}
