//! Profile pointer resolution from a ledger gateway.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use async_trait::async_trait;
use pinsync_primitives::Cid;

use crate::{PinError, ProfileSource};

/// Configuration for [`HttpProfileSource`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL of the ledger gateway.
    pub gateway_url: String,
    /// This node's identity as registered on the ledger.
    pub node_id: String,
    /// Timeout per resolution call.
    pub call_timeout: Duration,
}

/// Gateway response for a profile lookup.
///
/// The pointer is either a plain CID string or the hex encoding of one, as
/// published on chain. `null` (or a 404) means no profile is published.
#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile: Option<String>,
}

/// Profile resolver backed by a ledger gateway's HTTP API.
///
/// Queries `GET {gateway}/miners/{node_id}/profile`. Verifying that the
/// local daemon identity matches the registered one is the operator's
/// responsibility, not this client's.
#[derive(Debug)]
pub struct HttpProfileSource {
    client: Client,
    config: LedgerConfig,
}

impl HttpProfileSource {
    /// Create a resolver for the configured gateway.
    pub fn new(config: LedgerConfig) -> Result<Self, PinError> {
        let client = Client::builder()
            .build()
            .map_err(|e| PinError::Permanent(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/miners/{}/profile",
            self.config.gateway_url.trim_end_matches('/'),
            self.config.node_id
        )
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn resolve_profile(&self) -> Result<Option<Cid>, PinError> {
        let response = self
            .client
            .get(self.url())
            .timeout(self.config.call_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(node_id = %self.config.node_id, "no profile registered");
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                PinError::Transient(format!("gateway error ({status}): {body}"))
            } else {
                PinError::Permanent(format!("gateway rejected ({status}): {body}"))
            });
        }

        let parsed: ProfileResponse = response.json().await?;
        match parsed.profile {
            None => Ok(None),
            Some(pointer) => {
                let cid = Cid::from_ledger_hex(&pointer)
                    .map_err(|e| PinError::Permanent(format!("bad profile pointer: {e}")))?;
                trace!(%cid, "resolved profile pointer");
                Ok(Some(cid))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CID: &str = "QmbWqxBEKC3P8tqsKc98xmWNzrzDtRLMiMPL8wBuTGsMnR";

    async fn source(server: &MockServer) -> HttpProfileSource {
        HttpProfileSource::new(LedgerConfig {
            gateway_url: server.uri(),
            node_id: "12D3KooWNode".into(),
            call_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_plain_pointer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/miners/12D3KooWNode/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"profile": CID})),
            )
            .mount(&server)
            .await;

        let cid = source(&server).await.resolve_profile().await.unwrap();
        assert_eq!(cid, Some(Cid::new(CID).unwrap()));
    }

    #[tokio::test]
    async fn resolves_hex_pointer() {
        let server = MockServer::start().await;
        let pointer = format!("0x{}", hex::encode(CID));
        Mock::given(method("GET"))
            .and(path("/miners/12D3KooWNode/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"profile": pointer})),
            )
            .mount(&server)
            .await;

        let cid = source(&server).await.resolve_profile().await.unwrap();
        assert_eq!(cid, Some(Cid::new(CID).unwrap()));
    }

    #[tokio::test]
    async fn null_pointer_means_unpublished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/miners/12D3KooWNode/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"profile": null})),
            )
            .mount(&server)
            .await;

        assert_eq!(source(&server).await.resolve_profile().await.unwrap(), None);
    }

    #[tokio::test]
    async fn not_found_means_unpublished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/miners/12D3KooWNode/profile"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_eq!(source(&server).await.resolve_profile().await.unwrap(), None);
    }

    #[tokio::test]
    async fn gateway_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/miners/12D3KooWNode/profile"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source(&server).await.resolve_profile().await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }
}
