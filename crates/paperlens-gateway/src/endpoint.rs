//! Backend addressing.
//!
//! A configured base URL wins; otherwise the fallback host and port are used.
//! The connection scheme always follows the base scheme (`https` → `wss`).

use paperlens_core::BackendConfig;
use url::Url;

pub const UPLOAD_PATH: &str = "/api/paper/upload";
const WS_DOCUMENT_PREFIX: [&str; 2] = ["ws", "paper"];

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid backend base url {url:?}: {source}")]
    InvalidBase {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme {0:?} in backend base url (expected http or https)")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn from_config(config: &BackendConfig) -> Result<Self, EndpointError> {
        match config.base_url.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => Self::parse(base),
            _ => Self::parse(&format!(
                "http://{}:{}",
                config.fallback_host, config.fallback_port
            )),
        }
    }

    pub fn parse(base: &str) -> Result<Self, EndpointError> {
        let trimmed = base.trim().trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|source| EndpointError::InvalidBase {
            url: base.to_string(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self { base: url }),
            other => Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("{}/{}", self.base(), path.trim_start_matches('/'))
    }

    pub fn upload_url(&self) -> String {
        self.http_url(UPLOAD_PATH)
    }

    /// Connection URL for one document. The id is a single escaped path
    /// segment, so `/`, `?` and `#` inside it cannot change the route.
    pub fn document_ws_url(&self, document_id: &str) -> String {
        let mut url = self.base.clone();
        // http(s) bases always have path segments and may switch to ws(s).
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(WS_DOCUMENT_PREFIX)
                .push(document_id);
        }
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        if url.set_scheme(scheme).is_err() {
            tracing::warn!(base = %self.base, "could not switch connection scheme");
        }
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_host_and_port() {
        let endpoint = Endpoint::from_config(&BackendConfig::default()).unwrap();
        assert_eq!(endpoint.base(), "http://127.0.0.1:8002");
        assert_eq!(
            endpoint.document_ws_url("abc"),
            "ws://127.0.0.1:8002/ws/paper/abc"
        );
    }

    #[test]
    fn secure_base_upgrades_to_wss() {
        let endpoint = Endpoint::parse("https://papers.example.org///").unwrap();
        assert_eq!(endpoint.base(), "https://papers.example.org");
        assert_eq!(
            endpoint.document_ws_url("p1"),
            "wss://papers.example.org/ws/paper/p1"
        );
        assert_eq!(
            endpoint.upload_url(),
            "https://papers.example.org/api/paper/upload"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        let endpoint = Endpoint::parse("http://gw.local:9000/lens/").unwrap();
        assert_eq!(endpoint.upload_url(), "http://gw.local:9000/lens/api/paper/upload");
        assert_eq!(
            endpoint.document_ws_url("x"),
            "ws://gw.local:9000/lens/ws/paper/x"
        );
    }

    #[test]
    fn document_id_is_escaped_as_one_segment() {
        let endpoint = Endpoint::parse("http://gw.local:9000/lens").unwrap();
        assert_eq!(
            endpoint.document_ws_url("a/b?c#d"),
            "ws://gw.local:9000/lens/ws/paper/a%2Fb%3Fc%23d"
        );
        assert_eq!(
            endpoint.document_ws_url("two words"),
            "ws://gw.local:9000/lens/ws/paper/two%20words"
        );
        let parsed = Url::parse(&endpoint.document_ws_url("a/b?c#d")).unwrap();
        assert_eq!(parsed.query(), None);
        assert_eq!(parsed.fragment(), None);
        assert_eq!(parsed.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn configured_base_wins_over_fallback() {
        let config = BackendConfig {
            base_url: Some(" http://10.1.2.3:7000/ ".into()),
            ..Default::default()
        };
        let endpoint = Endpoint::from_config(&config).unwrap();
        assert_eq!(endpoint.base(), "http://10.1.2.3:7000");
    }

    #[test]
    fn rejects_bad_bases() {
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(EndpointError::InvalidBase { .. })
        ));
        assert!(matches!(
            Endpoint::parse("ftp://files.example.org"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
    }
}
