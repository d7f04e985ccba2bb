//! XML-RPC over SCGI, the transport rTorrent listens on.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::xmlrpc::{self, XmlRpcError, XmlRpcValue};
use super::DownloadClientError;

/// Wrap an XML-RPC body in an SCGI netstring request.
pub fn frame_request(body: &str) -> Vec<u8> {
    let headers = format!(
        "CONTENT_LENGTH\0{}\0SCGI\01\0REQUEST_METHOD\0POST\0REQUEST_URI\0/RPC2\0",
        body.len()
    );
    let mut request = format!("{}:{},", headers.len(), headers).into_bytes();
    request.extend_from_slice(body.as_bytes());
    request
}

/// Strip the CGI-style headers from an SCGI response.
pub fn response_body(raw: &[u8]) -> Result<&str, DownloadClientError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DownloadClientError::Protocol(format!("non UTF-8 SCGI response: {}", e)))?;

    let body = text
        .split_once("\r\n\r\n")
        .or_else(|| text.split_once("\n\n"))
        .map(|(_, body)| body)
        .unwrap_or(text);

    if body.trim().is_empty() {
        return Err(DownloadClientError::Protocol(
            "empty SCGI response".to_string(),
        ));
    }
    Ok(body)
}

/// One connection per call, as rTorrent closes the socket after replying.
#[derive(Debug, Clone)]
pub struct ScgiTransport {
    address: String,
    timeout: Duration,
}

impl ScgiTransport {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        let host = host
            .trim_start_matches("scgi://")
            .trim_end_matches('/');
        Self {
            address: format!("{}:{}", host, port),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Call a method and return its decoded result.
    pub async fn call(
        &self,
        method: &str,
        params: &[XmlRpcValue],
    ) -> Result<XmlRpcValue, DownloadClientError> {
        debug!(address = %self.address, method = method, "SCGI call");
        let request = frame_request(&xmlrpc::encode_call(method, params));

        let raw = tokio::time::timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| DownloadClientError::Timeout)??;

        xmlrpc::decode_response(response_body(&raw)?).map_err(|e| match e {
            XmlRpcError::Fault { .. } => DownloadClientError::Backend(e.to_string()),
            XmlRpcError::Malformed(_) => DownloadClientError::Protocol(e.to_string()),
        })
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, DownloadClientError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;
        stream
            .write_all(request)
            .await
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;

        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;
        Ok(raw)
    }
}
