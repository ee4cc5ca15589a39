//! Network fetcher backed by a blocking HTTP client.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use super::{check_accessor, ByteStream, ResourceFetcher, TextStream};
use crate::config::HTTP_CONNECT_TIMEOUT_SECS;
use crate::dump::Compression;
use crate::error::{DumpError, Result};
use crate::parse::decompress;

/// User agent string identifying this tool.
const USER_AGENT: &str = concat!("kbdump/", env!("CARGO_PKG_VERSION"));

/// Create a configured HTTP client.
///
/// # Returns
/// A `reqwest::blocking::Client` with a connect timeout, no overall request
/// timeout, and the kbdump user agent.
pub fn create_client() -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(None::<Duration>)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Fetches resources over HTTP(S).
///
/// The declared compression of a URL is read from its suffix (`.gz`, `.bz2`).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default client.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: create_client()?,
        })
    }

    /// Create a fetcher using an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Send a GET request and return the response if the resource is there.
    fn get(&self, url: &str) -> Result<Response> {
        tracing::debug!(url, "Opening remote resource");
        let response = self.client.get(url).send().map_err(|e| send_error(url, e))?;
        check_status(url, response)
    }

    /// Open a typed stream.
    ///
    /// When the URL suffix already contradicts the accessor, only a HEAD
    /// request is sent to tell a missing resource from a wrong accessor, so
    /// the body is never requested.
    fn open_typed(&self, url: &str, requested: Compression) -> Result<TextStream> {
        let declared = Compression::from_locator(url);
        if declared != requested {
            self.probe(url)?;
            check_accessor(url, declared, requested)?;
        }
        let response = self.get(url)?;
        Ok(decompress(response, requested))
    }
}

/// Classify a request that produced no response.
///
/// A request that could not be built (such as a malformed URL) is a client
/// error; connection failures, DNS errors and timeouts are transient.
fn send_error(url: &str, error: reqwest::Error) -> DumpError {
    if error.is_builder() {
        DumpError::Http(error)
    } else {
        tracing::warn!(url, error = %error, "Connection error");
        DumpError::unavailable(url, error.to_string())
    }
}

/// Classify a response status.
///
/// 404 and 410 mean the resource is not there. Server errors and throttling
/// are transient. Other client errors are reported as they are.
fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(DumpError::not_found(url, format!("HTTP {status}")));
    }
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        tracing::warn!(url, status = %status, "Server error");
        return Err(DumpError::unavailable(url, format!("HTTP {status}")));
    }
    Ok(response.error_for_status()?)
}

impl ResourceFetcher for HttpFetcher {
    fn open_text(&self, locator: &str) -> Result<TextStream> {
        self.open_typed(locator, Compression::None)
    }

    fn open_gzip(&self, locator: &str) -> Result<TextStream> {
        self.open_typed(locator, Compression::Gzip)
    }

    fn open_bz2(&self, locator: &str) -> Result<TextStream> {
        self.open_typed(locator, Compression::Bzip2)
    }

    fn open_raw(&self, locator: &str) -> Result<ByteStream> {
        Ok(Box::new(self.get(locator)?))
    }

    fn probe(&self, locator: &str) -> Result<()> {
        tracing::debug!(url = locator, "Probing remote resource");
        let response = self
            .client
            .head(locator)
            .send()
            .map_err(|e| send_error(locator, e))?;
        check_status(locator, response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let client = create_client();
        assert!(client.is_ok());
    }

    #[test]
    fn test_unreachable_host_is_unavailable() {
        let fetcher = HttpFetcher::new().unwrap();
        // Port 9 (discard) on localhost refuses connections on test machines.
        let err = fetcher.probe("http://127.0.0.1:9/dump.json.gz").unwrap_err();
        assert!(matches!(err, DumpError::Unavailable { .. }));
        assert!(err.is_transient());

        let err = fetcher
            .open_gzip("http://127.0.0.1:9/dump.json.gz")
            .err()
            .unwrap();
        assert!(matches!(err, DumpError::Unavailable { .. }));
    }
}
