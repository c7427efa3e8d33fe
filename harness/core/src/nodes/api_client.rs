use std::net::SocketAddr;

use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::error;

use crate::chain::BlockId;

/// RPC paths the harness relies on; the node collaborator owns the shapes.
pub mod paths {
    pub const CHAIN_INFO: &str = "/chain/info";
    pub const NETWORK_INFO: &str = "/network/info";
    pub const NETWORK_PEER: &str = "/network/peer";
}

/// Best-tip summary returned by the node.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ChainInfo {
    pub tip: BlockId,
    pub height: u64,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct NetworkInfo {
    pub peer_count: usize,
}

#[derive(Serialize)]
struct ConnectPeerRequest<'a> {
    address: &'a str,
}

/// Thin async client for a node's RPC endpoint.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        let base_url = Url::parse(&format!("http://{addr}"))
            .expect("socket address always forms a valid base URL");
        Self {
            base_url,
            client: Client::new(),
        }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the node's best tip and height.
    pub async fn chain_info(&self) -> reqwest::Result<ChainInfo> {
        self.get_json(paths::CHAIN_INFO).await
    }

    /// Identifier of the node's current best chain tip.
    pub async fn best_tip(&self) -> reqwest::Result<BlockId> {
        self.chain_info().await.map(|info| info.tip)
    }

    pub async fn network_info(&self) -> reqwest::Result<NetworkInfo> {
        self.get_json(paths::NETWORK_INFO).await
    }

    /// Ask the node to dial the given peer address.
    pub async fn connect_peer(&self, address: &str) -> reqwest::Result<()> {
        let request = ConnectPeerRequest { address };
        self.post_json_unit(paths::NETWORK_PEER, &request).await
    }

    async fn get_json<T>(&self, path: &str) -> reqwest::Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_response(path)
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn get_response(&self, path: &str) -> reqwest::Result<Response> {
        self.client.get(self.join_base(path)).send().await
    }

    async fn post_json_unit<T>(&self, path: &str, body: &T) -> reqwest::Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.client
            .post(self.join_base(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn join_base(&self, path: &str) -> Url {
        let trimmed = path.trim_start_matches('/');
        match self.base_url.join(trimmed) {
            Ok(url) => url,
            Err(err) => {
                error!(
                    error = %err,
                    base = %self.base_url,
                    path,
                    "failed to join url; falling back to base url"
                );
                self.base_url.clone()
            }
        }
    }
}
