//! `LedgerClient` for an EVM chain hosting the file-tracker contract.
//!
//! Registration builds an EIP-1559 call to `storeFileHash`, signs it
//! locally, and submits it with `eth_sendRawTransaction`. Confirmation polls
//! `eth_getTransactionReceipt`. Queries are `eth_call`s against `latest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use filemark_contracts::{
    Confirmation, FileMetadata, Fingerprint, SigningCredential, TrackerError, TrackerResult,
    TxHandle,
};
use filemark_core::LedgerClient;

use crate::abi;
use crate::rpc::{parse_data, parse_quantity, parse_quantity_u64, to_data, to_quantity, JsonRpcTransport};
use crate::signer::{Eip1559Transaction, LocalSigner, ADDRESS_LEN};

/// Headroom added on top of the node's gas estimate, in percent.
const GAS_MARGIN_PERCENT: u64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

/// JSON-RPC client for the file-tracker contract.
#[derive(Debug)]
pub struct EvmLedgerClient {
    transport: JsonRpcTransport,
    contract: [u8; ADDRESS_LEN],
    chain_id: Option<u64>,
    poll_interval: Duration,
}

impl EvmLedgerClient {
    /// Create a client for the contract at `contract`.
    ///
    /// With `chain_id = None` the id is fetched with `eth_chainId` before
    /// every submission.
    pub fn new(
        transport: JsonRpcTransport,
        contract: [u8; ADDRESS_LEN],
        chain_id: Option<u64>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            contract,
            chain_id,
            poll_interval,
        }
    }

    fn contract_hex(&self) -> String {
        to_data(&self.contract)
    }

    async fn chain_id(&self) -> TrackerResult<u64> {
        match self.chain_id {
            Some(id) => Ok(id),
            None => {
                let raw: String = self.transport.call("eth_chainId", json!([])).await?;
                parse_quantity_u64(&raw)
            }
        }
    }

    async fn quantity(&self, method: &str, params: serde_json::Value) -> TrackerResult<u128> {
        let raw: String = self.transport.call(method, params).await?;
        parse_quantity(&raw)
    }

    /// `(max_priority_fee_per_gas, max_fee_per_gas)`.
    ///
    /// Nodes without `eth_maxPriorityFeePerGas` fall back to the gas price
    /// as the tip.
    async fn fees(&self) -> TrackerResult<(u128, u128)> {
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let priority = match self.quantity("eth_maxPriorityFeePerGas", json!([])).await {
            Ok(tip) => tip,
            Err(TrackerError::Protocol { reason }) => {
                debug!(%reason, "eth_maxPriorityFeePerGas unavailable, using gas price");
                gas_price
            }
            Err(err) => return Err(err),
        };
        let max_fee = gas_price.saturating_mul(2).max(priority);
        Ok((priority, max_fee))
    }

    /// `eth_call` the contract, treating a revert as "nothing stored".
    async fn read_contract(&self, calldata: Vec<u8>) -> TrackerResult<Option<Vec<u8>>> {
        let params = json!([{ "to": self.contract_hex(), "data": to_data(&calldata) }, "latest"]);
        match self.transport.call::<String>("eth_call", params).await {
            Ok(raw) => Ok(Some(parse_data(&raw)?)),
            Err(TrackerError::TransactionReverted { reason, .. }) => {
                debug!(%reason, "eth_call reverted, treating fingerprint as unregistered");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl LedgerClient for EvmLedgerClient {
    async fn register_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        file_name: &str,
        file_size: u64,
        credential: &SigningCredential,
    ) -> TrackerResult<TxHandle> {
        if file_name.is_empty() {
            return Err(TrackerError::InvalidInput {
                reason: "file name must not be empty".to_string(),
            });
        }
        let signer = LocalSigner::from_credential(credential)?;
        let from = signer.address_hex();
        let data = abi::encode_store_file_hash(fingerprint, file_name, file_size);

        let chain_id = self.chain_id().await?;
        let nonce = self.quantity("eth_getTransactionCount", json!([from, "pending"])).await?;
        let nonce = u64::try_from(nonce).map_err(|_| TrackerError::Protocol {
            reason: format!("nonce {nonce} does not fit in 64 bits"),
        })?;
        let (max_priority_fee_per_gas, max_fee_per_gas) = self.fees().await?;

        let estimate = self
            .quantity(
                "eth_estimateGas",
                json!([{ "from": from, "to": self.contract_hex(), "data": to_data(&data) }]),
            )
            .await?;
        let estimate = u64::try_from(estimate).map_err(|_| TrackerError::Protocol {
            reason: format!("gas estimate {estimate} does not fit in 64 bits"),
        })?;
        let gas_limit = estimate.saturating_add(estimate.saturating_mul(GAS_MARGIN_PERCENT) / 100);

        let tx = Eip1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to: self.contract,
            value: 0,
            data,
        };
        debug!(
            fingerprint = %fingerprint,
            from = %from,
            chain_id,
            nonce,
            gas_limit,
            max_fee = %to_quantity(max_fee_per_gas),
            "submitting storeFileHash"
        );

        let signed = signer.sign(&tx)?;
        let tx_hash: String = self
            .transport
            .call("eth_sendRawTransaction", json!([signed.raw_hex()]))
            .await?;

        if !tx_hash.eq_ignore_ascii_case(&signed.hash_hex()) {
            debug!(
                node_hash = %tx_hash,
                local_hash = %signed.hash_hex(),
                "node reported a different transaction hash"
            );
        }
        info!(fingerprint = %fingerprint, tx_hash = %tx_hash, "registration submitted");
        Ok(TxHandle(tx_hash))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> TrackerResult<Confirmation> {
        loop {
            let receipt: Option<Receipt> = self
                .transport
                .call("eth_getTransactionReceipt", json!([tx.0]))
                .await?;

            let Some(receipt) = receipt else {
                debug!(tx_hash = %tx, "receipt not yet available");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };
            let Some(block) = receipt.block_number.as_deref() else {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };
            let block_number = parse_quantity_u64(block)?;
            let status = receipt.status.as_deref().map(parse_quantity).transpose()?;

            return match status {
                Some(1) => {
                    info!(tx_hash = %tx, block = block_number, "registration confirmed");
                    Ok(Confirmation {
                        tx: tx.clone(),
                        block_number,
                    })
                }
                Some(status) => Err(TrackerError::TransactionReverted {
                    tx_hash: Some(tx.0.clone()),
                    reason: format!("receipt status {status:#x} in block {block_number}"),
                }),
                None => Err(TrackerError::Protocol {
                    reason: format!("receipt for {tx} has no status field"),
                }),
            };
        }
    }

    async fn query_metadata(&self, fingerprint: &Fingerprint) -> TrackerResult<FileMetadata> {
        match self
            .read_contract(abi::encode_get_file_metadata(fingerprint))
            .await?
        {
            Some(data) => abi::decode_file_metadata(&data),
            None => Ok(FileMetadata::default()),
        }
    }

    async fn query_history(&self, fingerprint: &Fingerprint) -> TrackerResult<Vec<u64>> {
        match self
            .read_contract(abi::encode_get_file_hash_timestamps(fingerprint))
            .await?
        {
            Some(data) => abi::decode_timestamps(&data),
            None => Ok(Vec::new()),
        }
    }
}
