// HTTP client for talking to other members
// Every call carries its own timeout so forwarding and joining can wait for different lengths of time

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlcluster_common::{ClusterError, ClusterResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct PeerClient {
    client: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> ClusterResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClusterError::Config(format!("peer HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// POST `body` to `http://{addr}{path}` and return the response body of a 2xx answer.
    pub async fn post_raw(
        &self,
        addr: &str,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        timeout: Duration,
    ) -> ClusterResult<Vec<u8>> {
        let url = format!("http://{}{}", addr, path);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| send_error(&url, e))?;

        if !status.is_success() {
            return Err(ClusterError::Remote {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }

    pub async fn post_json<Req, Resp>(
        &self,
        addr: &str,
        path: &str,
        request: &Req,
        timeout: Duration,
    ) -> ClusterResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)?;
        let bytes = self
            .post_raw(addr, path, body, "application/json", timeout)
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// `Network` only when the peer never got the request; failures after
/// sending are `Timeout` or `Unavailable` because it may have acted on it.
fn send_error(url: &str, err: reqwest::Error) -> ClusterError {
    if err.is_connect() {
        ClusterError::Network(format!("{}: {}", url, err))
    } else if err.is_timeout() {
        ClusterError::Timeout(format!("{}: {}", url, err))
    } else {
        ClusterError::Unavailable(format!("{}: {}", url, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_peer_is_network_error() {
        let client = PeerClient::new().unwrap();
        let err = client
            .post_raw(
                "127.0.0.1:1",
                "/sql",
                b"SELECT 1".to_vec(),
                "text/plain",
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Network(_)), "{err}");
        assert!(err.is_transient(), "{err}");
    }
}
