//! reqwest client with browser-like headers and a hard timeout.
//!
//! No retries: a failed request fails its strategy and the fetcher moves on.

use crate::config::HttpSettings;
use crate::error::{FetchError, StrategyError};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// HTTP client shared by the static-page and API strategies.
#[derive(Clone)]
pub struct PageClient {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl PageClient {
    /// Build a client that sends `User-Agent`, `Accept` and `Accept-Language` on every request.
    ///
    /// A value that cannot be sent as a header is an error, never silently dropped.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, header_value("Accept", &settings.accept)?);
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header_value("Accept-Language", &settings.accept_language)?,
        );
        headers.insert(
            header::USER_AGENT,
            header_value("User-Agent", &settings.user_agent)?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            timeout_ms: settings.timeout_ms,
        })
    }

    /// GET `url`. Non-2xx statuses are errors; so is a timeout.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, StrategyError> {
        self.get_with_accept(url, None).await
    }

    /// GET `url`, overriding the default `Accept` header.
    pub async fn get_with_accept(
        &self,
        url: &str,
        accept: Option<&str>,
    ) -> Result<HttpResponse, StrategyError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        Ok(HttpResponse {
            final_url,
            status: status.as_u16(),
            body,
        })
    }

    fn classify(&self, err: reqwest::Error) -> StrategyError {
        if err.is_timeout() {
            StrategyError::Timeout(self.timeout_ms)
        } else {
            StrategyError::Request(err)
        }
    }
}

/// Parse a configured header value.
pub fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}
