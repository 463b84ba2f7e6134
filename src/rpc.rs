use crate::error::{ConfigError, NetworkError};
use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Read-only contract call capability: one `eth_call` against the latest state.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call(&self, contract: Address, payload: Bytes) -> Result<Bytes, NetworkError>;
}

#[async_trait]
impl<T: ContractCaller + ?Sized> ContractCaller for Arc<T> {
    async fn call(&self, contract: Address, payload: Bytes) -> Result<Bytes, NetworkError> {
        (**self).call(contract, payload).await
    }
}

#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<DynProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    request_timeout: Duration,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String], request_timeout: Duration) -> Result<Self, ConfigError> {
        if rpc_urls.is_empty() {
            return Err(ConfigError::NoNodeUrl);
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| ConfigError::InvalidNodeUrl(url.clone()))?;
            let provider = ProviderBuilder::new().connect_http(parsed_url).erased();
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            request_timeout,
        })
    }

    /// Builds the client and makes sure the first endpoint answers.
    pub async fn connect(
        rpc_urls: &[String],
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Self::new(rpc_urls, request_timeout)?;
        let url = client.get_current_url().to_string();

        let chain_id = match timeout(request_timeout, client.get_provider().get_chain_id()).await {
            Ok(Ok(chain_id)) => chain_id,
            Ok(Err(e)) => {
                return Err(ConfigError::NodeUnreachable {
                    url,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ConfigError::NodeUnreachable {
                    url,
                    reason: NetworkError::Timeout(request_timeout).to_string(),
                });
            }
        };

        info!("Connected to {} (chain id {})", url, chain_id);
        Ok(client)
    }

    fn get_provider(&self) -> &DynProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn handle_error(&self, error_str: &str) {
        warn!(
            "RPC error on {}: {}, rotating provider",
            self.get_current_url(),
            error_str
        );
        self.rotate_provider();
    }

    fn handle_timeout(&self) -> NetworkError {
        warn!(
            "Request timeout after {:?} on {}, rotating provider",
            self.request_timeout,
            self.get_current_url()
        );
        self.rotate_provider();
        NetworkError::Timeout(self.request_timeout)
    }
}

#[async_trait]
impl ContractCaller for RpcClient {
    async fn call(&self, contract: Address, payload: Bytes) -> Result<Bytes, NetworkError> {
        let tx = TransactionRequest::default()
            .with_to(contract)
            .with_input(payload);

        match timeout(self.request_timeout, self.get_provider().call(tx)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                let error_str = e.to_string();
                self.handle_error(&error_str);
                Err(NetworkError::Transport(error_str))
            }
            Err(_) => Err(self.handle_timeout()),
        }
    }
}
