//! Strategy A: plain GET of the report page.

use super::http_client::PageClient;
use super::FetchStrategy;
use crate::error::StrategyError;
use crate::extract::populated_rows;
use crate::types::RawContent;
use async_trait::async_trait;
use tracing::debug;

/// Fetches the report page without executing any script.
pub struct StaticPage {
    client: PageClient,
    url: String,
    require_rows: bool,
}

impl StaticPage {
    /// With `require_rows`, a page whose table has no body rows yet (the
    /// live site fills it from script) counts as a failed fetch.
    pub fn new(client: PageClient, url: &str, require_rows: bool) -> Self {
        Self {
            client,
            url: url.to_string(),
            require_rows,
        }
    }
}

#[async_trait]
impl FetchStrategy for StaticPage {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<RawContent, StrategyError> {
        let resp = self.client.get(&self.url).await?;
        debug!(url = %resp.final_url, bytes = resp.body.len(), "static page fetched");

        if self.require_rows && populated_rows(&resp.body) == 0 {
            return Err(StrategyError::Unrendered);
        }
        Ok(RawContent::Markup(resp.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POPULATED: &str = "<table><tbody><tr><td>IGP/CENSIS/RS 2025-0111</td><td>Lima</td>\
        <td>05/11/2025 14:23:10</td><td>4.5</td><td></td></tr></tbody></table>";
    const SHELL: &str = "<html><body><table><tbody></tbody></table>\
        <script src=\"/app.js\"></script></body></html>";
    const LOADING: &str = "<html><body><table><tbody>\
        <tr><td colspan=\"5\">Cargando...</td></tr></tbody></table></body></html>";

    async fn serve(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sismos"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn strategy(server: &MockServer, require_rows: bool) -> StaticPage {
        let client = PageClient::new(&HttpSettings::default()).unwrap();
        StaticPage::new(client, &format!("{}/sismos", server.uri()), require_rows)
    }

    #[tokio::test]
    async fn test_populated_page_returns_markup() {
        let server = serve(POPULATED).await;
        let content = strategy(&server, true).fetch().await.unwrap();
        assert_eq!(content, RawContent::Markup(POPULATED.to_string()));
    }

    #[tokio::test]
    async fn test_script_shell_is_unrendered() {
        let server = serve(SHELL).await;
        let err = strategy(&server, true).fetch().await.unwrap_err();
        assert!(matches!(err, StrategyError::Unrendered));
    }

    #[tokio::test]
    async fn test_loading_placeholder_is_unrendered() {
        let server = serve(LOADING).await;
        let err = strategy(&server, true).fetch().await.unwrap_err();
        assert!(matches!(err, StrategyError::Unrendered));
    }

    #[tokio::test]
    async fn test_shell_accepted_when_rows_not_required() {
        let server = serve(SHELL).await;
        let content = strategy(&server, false).fetch().await.unwrap();
        assert!(matches!(content, RawContent::Markup(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_status_error() {
        let server = MockServer::start().await;
        let err = strategy(&server, true).fetch().await.unwrap_err();
        assert!(matches!(err, StrategyError::Status(404)));
    }
}
