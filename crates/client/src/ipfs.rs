//! HTTP client for the storage daemon's Kubo-compatible RPC API.

use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use async_trait::async_trait;
use pinsync_primitives::Cid;

use crate::{PinError, StorageNode};

/// Default daemon RPC endpoint.
const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

/// Configuration for [`IpfsApiClient`].
#[derive(Debug, Clone)]
pub struct IpfsApiConfig {
    /// Base URL of the daemon RPC API.
    pub api_url: String,
    /// Timeout applied to pin, unpin, cat and pin/ls calls.
    pub call_timeout: Duration,
    /// Timeout for garbage collection, which can run long.
    pub gc_timeout: Duration,
    /// Cap on fetched content size.
    pub max_fetch_bytes: usize,
}

impl Default for IpfsApiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            call_timeout: Duration::from_secs(60),
            gc_timeout: Duration::from_secs(300),
            max_fetch_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Error body returned by the daemon RPC.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "Message", default)]
    message: String,
}

/// Response of `pin/ls`.
#[derive(Debug, Deserialize)]
struct PinLsResponse {
    #[serde(rename = "Keys", default)]
    keys: std::collections::BTreeMap<String, serde_json::Value>,
}

/// Storage daemon client over the Kubo RPC API.
///
/// All endpoints are POST, matching the daemon's API conventions. The
/// daemon's "already pinned" and "not pinned" rejections are folded into
/// success since the desired end state already holds.
#[derive(Debug)]
pub struct IpfsApiClient {
    client: Client,
    config: IpfsApiConfig,
}

impl IpfsApiClient {
    /// Create a client for the configured daemon endpoint.
    pub fn new(config: IpfsApiConfig) -> Result<Self, PinError> {
        let client = Client::builder()
            .build()
            .map_err(|e| PinError::Permanent(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v0/{endpoint}", self.config.api_url.trim_end_matches('/'))
    }

    async fn post(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, PinError> {
        let response = self
            .client
            .post(self.url(endpoint))
            .query(query)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response)
    }

    /// Turn a non-success response into a [`PinError`], extracting the
    /// daemon's message when the body is its JSON error shape.
    async fn response_error(response: Response) -> PinError {
        let status = response.status();
        let message = match response.text().await {
            Ok(body) => match serde_json::from_str::<ApiError>(&body) {
                Ok(err) if !err.message.is_empty() => err.message,
                _ => body,
            },
            Err(e) => e.to_string(),
        };
        classify(status, message)
    }
}

/// Map an HTTP error status to the retry taxonomy.
fn classify(status: StatusCode, message: String) -> PinError {
    if status.is_server_error() {
        // Kubo reports most operational errors as 500; the message decides
        // whether it was a daemon-side rejection, but retrying is safe.
        PinError::Transient(format!("daemon error ({status}): {message}"))
    } else {
        PinError::Permanent(format!("daemon rejected ({status}): {message}"))
    }
}

/// Whether a pin failure message means the CID is already pinned.
fn is_already_pinned(message: &str) -> bool {
    message.to_lowercase().contains("already pinned")
}

/// Whether an unpin failure message means the CID was never pinned.
fn is_not_pinned(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not pinned") || lower.contains("no pin for")
}

#[async_trait]
impl StorageNode for IpfsApiClient {
    async fn pin(&self, cid: &Cid) -> Result<(), PinError> {
        let response = self
            .post(
                "pin/add",
                &[("arg", cid.as_str()), ("recursive", "true")],
                self.config.call_timeout,
            )
            .await?;

        if response.status().is_success() {
            trace!(%cid, "pinned");
            return Ok(());
        }

        let err = Self::response_error(response).await;
        if let PinError::Permanent(msg) | PinError::Transient(msg) = &err {
            if is_already_pinned(msg) {
                trace!(%cid, "already pinned");
                return Ok(());
            }
        }
        Err(err)
    }

    async fn unpin(&self, cid: &Cid) -> Result<(), PinError> {
        let response = self
            .post(
                "pin/rm",
                &[("arg", cid.as_str()), ("recursive", "true")],
                self.config.call_timeout,
            )
            .await?;

        if response.status().is_success() {
            trace!(%cid, "unpinned");
            return Ok(());
        }

        let err = Self::response_error(response).await;
        if let PinError::Permanent(msg) | PinError::Transient(msg) = &err {
            if is_not_pinned(msg) {
                trace!(%cid, "was not pinned");
                return Ok(());
            }
        }
        Err(err)
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>, PinError> {
        let response = self
            .post("cat", &[("arg", cid.as_str())], self.config.call_timeout)
            .await?;

        if !response.status().is_success() {
            return Err(Self::response_error(response).await);
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > self.config.max_fetch_bytes {
                return Err(PinError::Permanent(format!(
                    "content for {cid} exceeds {} bytes",
                    self.config.max_fetch_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn list_pins(&self) -> Result<BTreeSet<Cid>, PinError> {
        let response = self
            .post("pin/ls", &[("type", "recursive")], self.config.call_timeout)
            .await?;

        if !response.status().is_success() {
            return Err(Self::response_error(response).await);
        }

        let parsed: PinLsResponse = response.json().await?;
        let mut pins = BTreeSet::new();
        for key in parsed.keys.into_keys() {
            match Cid::new(key) {
                Ok(cid) => {
                    pins.insert(cid);
                }
                Err(e) => debug!(%e, "daemon listed an unusable pin key"),
            }
        }
        Ok(pins)
    }

    async fn collect_garbage(&self) -> Result<(), PinError> {
        let response = self
            .post("repo/gc", &[], self.config.gc_timeout)
            .await?;

        if !response.status().is_success() {
            return Err(Self::response_error(response).await);
        }

        // The endpoint streams newline-delimited progress objects; drain
        // them so the daemon finishes the pass.
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let _ = chunk?;
        }
        debug!("garbage collection finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CID: &str = "QmbWqxBEKC3P8tqsKc98xmWNzrzDtRLMiMPL8wBuTGsMnR";

    async fn client(server: &MockServer) -> IpfsApiClient {
        IpfsApiClient::new(IpfsApiConfig {
            api_url: server.uri(),
            call_timeout: Duration::from_secs(5),
            gc_timeout: Duration::from_secs(5),
            max_fetch_bytes: 64,
        })
        .unwrap()
    }

    fn cid() -> Cid {
        Cid::new(CID).unwrap()
    }

    #[tokio::test]
    async fn pin_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/add"))
            .and(query_param("arg", CID))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"Pins": [CID]})),
            )
            .mount(&server)
            .await;

        client(&server).await.pin(&cid()).await.unwrap();
    }

    #[tokio::test]
    async fn pin_already_pinned_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/add"))
            .respond_with(ResponseTemplate::new(500).set_body_json(
                serde_json::json!({"Message": "pin: already pinned recursively", "Code": 0}),
            ))
            .mount(&server)
            .await;

        client(&server).await.pin(&cid()).await.unwrap();
    }

    #[tokio::test]
    async fn pin_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/add"))
            .respond_with(ResponseTemplate::new(500).set_body_json(
                serde_json::json!({"Message": "merkledag: not found", "Code": 0}),
            ))
            .mount(&server)
            .await;

        let err = client(&server).await.pin(&cid()).await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn pin_bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/add"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                serde_json::json!({"Message": "invalid path", "Code": 0}),
            ))
            .mount(&server)
            .await;

        let err = client(&server).await.pin(&cid()).await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn unpin_not_pinned_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/rm"))
            .respond_with(ResponseTemplate::new(500).set_body_json(
                serde_json::json!({"Message": "not pinned or pinned indirectly", "Code": 0}),
            ))
            .mount(&server)
            .await;

        client(&server).await.unpin(&cid()).await.unwrap();
    }

    #[tokio::test]
    async fn fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/cat"))
            .and(query_param("arg", CID))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"[\"entry\"]".to_vec()))
            .mount(&server)
            .await;

        let body = client(&server).await.fetch(&cid()).await.unwrap();
        assert_eq!(body, b"[\"entry\"]");
    }

    #[tokio::test]
    async fn fetch_enforces_size_cap() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/cat"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 128]))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch(&cid()).await.unwrap_err();
        assert!(matches!(err, PinError::Permanent(_)));
    }

    #[tokio::test]
    async fn list_pins_parses_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/ls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Keys": {CID: {"Type": "recursive"}}
            })))
            .mount(&server)
            .await;

        let pins = client(&server).await.list_pins().await.unwrap();
        assert_eq!(pins.len(), 1);
        assert!(pins.contains(&cid()));
    }

    #[tokio::test]
    async fn list_pins_empty_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/ls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let pins = client(&server).await.list_pins().await.unwrap();
        assert!(pins.is_empty());
    }

    #[tokio::test]
    async fn gc_drains_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/repo/gc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"{\"Key\":{\"/\":\"a\"}}\n{\"Key\":{\"/\":\"b\"}}\n".to_vec()),
            )
            .mount(&server)
            .await;

        client(&server).await.collect_garbage().await.unwrap();
    }

    #[test]
    fn message_folding_helpers() {
        assert!(is_already_pinned("pin: Already Pinned recursively"));
        assert!(!is_already_pinned("merkledag: not found"));
        assert!(is_not_pinned("not pinned or pinned indirectly"));
        assert!(is_not_pinned("no pin for QmFoo"));
        assert!(!is_not_pinned("context deadline exceeded"));
    }
}
