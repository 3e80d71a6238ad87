use crate::error::{ErrorKind, Result};
use crate::{Download, ListPage, Upstream};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("pokemirror/", env!("CARGO_PKG_VERSION"));

/// HTTP implementation of [`Upstream`].
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    base_url: Url,
    user_agent: String,
}

impl HttpUpstream {
    /// Construct a client for the API rooted at `base_url`.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30).min(timeout))
            .timeout(timeout)
            .build()
            .or_raise(|| ErrorKind::Config("HTTP client could not be built".to_string()))?;
        Ok(Self {
            client,
            base_url,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Override the default user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    async fn call(&self, url: &str, accept: &str) -> Result<Response> {
        tracing::trace!(%url, "upstream request");
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn list_page(&self, resource_type: &str, limit: u32, offset: u64) -> Result<ListPage> {
        let url = self.list_url(resource_type, limit, offset);
        let response = self.call(&url, "application/json").await?;
        let bytes = response.bytes().await.map_err(|err| convert_reqwest_error(err, &url))?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidResponse(url))
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.call(url, "application/json").await?;
        let bytes = response.bytes().await.map_err(|err| convert_reqwest_error(err, url))?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidResponse(url.to_owned()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Download> {
        let response = self.call(url, "*/*").await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await.map_err(|err| convert_reqwest_error(err, url))?;
        Ok(Download {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> ErrorKind {
    if let Some(status) = error.status() {
        return ErrorKind::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        };
    }
    let reason = if error.is_timeout() {
        "timed out".to_owned()
    } else {
        error.to_string()
    };
    ErrorKind::Network {
        url: url.to_owned(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base: &str) -> HttpUpstream {
        HttpUpstream::new(Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_list_url() {
        let upstream = upstream("https://pokeapi.co/api/v2");
        assert_eq!(upstream.list_url("type", 20, 0), "https://pokeapi.co/api/v2/type?limit=20&offset=0");
    }

    #[test]
    fn test_list_url_trims_slashes() {
        let upstream = upstream("https://pokeapi.co/api/v2/");
        assert_eq!(
            upstream.list_url("/pokemon-species/", 200, 400),
            "https://pokeapi.co/api/v2/pokemon-species?limit=200&offset=400"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let upstream = upstream("http://127.0.0.1:9/api/v2");
        let err = upstream.fetch_json("http://127.0.0.1:9/api/v2/type/1/").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network { .. }));
        assert!(err.is_retryable());
    }
}
