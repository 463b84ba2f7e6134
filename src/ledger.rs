use crate::abi::{self, ViewCall, balanceOfCall, decimalsCall, symbolCall};
use crate::error::ReadError;
use crate::rpc::ContractCaller;
use alloy_primitives::{Address, U256};
use std::sync::OnceLock;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{error, info};

const METADATA_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
}

/// Reads token state through an injected [`ContractCaller`].
///
/// Metadata is fetched once and cached for the life of the reader.
pub struct LedgerReader<C> {
    caller: C,
    metadata: OnceLock<TokenMetadata>,
}

impl<C: ContractCaller> LedgerReader<C> {
    pub fn new(caller: C) -> Self {
        Self {
            caller,
            metadata: OnceLock::new(),
        }
    }

    pub fn metadata(&self) -> Option<&TokenMetadata> {
        self.metadata.get()
    }

    async fn read<T: ViewCall>(&self, contract: Address, call: T) -> Result<T::Return, ReadError> {
        let payload = abi::encode_call(&call);
        let result = self.caller.call(contract, payload).await?;
        Ok(abi::decode_returns::<T>(&result)?)
    }

    fn retry_strategy() -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(METADATA_RETRIES)
    }

    async fn read_with_retry<T: ViewCall>(
        &self,
        contract: Address,
        make_call: impl Fn() -> T,
    ) -> Result<T::Return, ReadError> {
        RetryIf::spawn(
            Self::retry_strategy(),
            || self.read(contract, make_call()),
            |e: &ReadError| e.is_transient(),
        )
        .await
    }

    /// Fetches `symbol()` and `decimals()` of `token`, caching the result.
    ///
    /// Network failures are retried a few times; codec failures are not.
    pub async fn fetch_metadata(&self, token: Address) -> Result<TokenMetadata, ReadError> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata.clone());
        }

        let symbol = self
            .read_with_retry(token, || symbolCall {})
            .await
            .inspect_err(|e| error!("symbol() of {:?} failed: {}", token, e))?;
        let decimals = self
            .read_with_retry(token, || decimalsCall {})
            .await
            .inspect_err(|e| error!("decimals() of {:?} failed: {}", token, e))?;

        info!(
            "Token {:?}: symbol {}, decimals {}",
            token, symbol, decimals
        );
        let metadata = self
            .metadata
            .get_or_init(|| TokenMetadata { symbol, decimals });
        Ok(metadata.clone())
    }

    /// Single-attempt `balanceOf(account)` read.
    pub async fn fetch_balance(&self, token: Address, account: Address) -> Result<U256, ReadError> {
        self.read(token, balanceOfCall { owner: account }).await
    }
}
