//! Outbound page fetching.
//!
//! The research stage talks to the network only through [`PageFetcher`];
//! [`HttpFetcher`] is the production implementation.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use tracing::{debug, info, instrument, warn};
use url::{Host, Url};

use outreach_shared::ScraperConfig;

use crate::error::{BlockedRedirect, FetchError};

/// User-Agent string for research requests. Some sites refuse bare clients.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; OutreachResearch/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Content types we are willing to interpret.
const ACCEPTED_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "text/plain"];

/// A fetched document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Decoded response body.
    pub body: String,
}

/// Port for the fetch capability.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the document at `url`.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// reqwest-backed fetcher with size, content-type, and SSRF guards.
///
/// The SSRF guard runs on the requested URL and again on every redirect
/// hop, so a public host cannot bounce the request into a private network.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_body_bytes: u64,
    /// Allow loopback hosts (for tests against mock servers). Other private
    /// ranges stay blocked.
    allow_loopback: bool,
}

impl HttpFetcher {
    /// Create a fetcher from the `[scraper]` config section.
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        Self::build(config, false)
    }

    /// Fetcher that may reach loopback hosts (for tests).
    #[cfg(test)]
    pub(crate) fn allowing_loopback(config: &ScraperConfig) -> Result<Self, FetchError> {
        Self::build(config, true)
    }

    fn build(config: &ScraperConfig, allow_loopback: bool) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(allow_loopback))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
            allow_loopback,
        })
    }
}

/// Follow at most [`MAX_REDIRECTS`] hops, refusing any hop into a
/// non-public target.
fn redirect_policy(allow_loopback: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error(format!("too many redirects (max {MAX_REDIRECTS})"))
        } else if is_ssrf_target(attempt.url(), allow_loopback) {
            warn!(target_url = %attempt.url(), "SSRF protection: redirect blocked");
            let blocked = BlockedRedirect(attempt.url().to_string());
            attempt.error(blocked)
        } else {
            attempt.follow()
        }
    })
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if is_ssrf_target(url, self.allow_loopback) {
            warn!("SSRF protection: blocked");
            return Err(FetchError::Blocked(url.to_string()));
        }

        debug!("fetching page");

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), &e))?;

        let final_url = response.url().clone();
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !ACCEPTED_CONTENT_TYPES.contains(&mime.as_str()) {
                return Err(FetchError::UnsupportedContent {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        // Check content-length if available
        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    bytes: len,
                    max: self.max_body_bytes,
                });
            }
        }

        // Chunked responses carry no content-length, so the cap is also
        // enforced while streaming.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })? {
            let received = (bytes.len() + chunk.len()) as u64;
            if received > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    bytes: received,
                    max: self.max_body_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();

        info!(
            status = status.as_u16(),
            bytes = body.len(),
            final_url = %final_url,
            "page fetched"
        );

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url, allow_loopback: bool) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(Host::Ipv4(v4)) => {
            !(allow_loopback && v4.is_loopback()) && is_private_ip(&IpAddr::V4(v4))
        }
        Some(Host::Ipv6(v6)) => {
            !(allow_loopback && v6.is_loopback()) && is_private_ip(&IpAddr::V6(v6))
        }
        Some(Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            if host == "localhost" || host.ends_with(".localhost") {
                return !allow_loopback;
            }
            host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_fetcher() -> HttpFetcher {
        HttpFetcher::allowing_loopback(&ScraperConfig::default()).unwrap()
    }

    fn capped_fetcher(max_body_bytes: u64) -> HttpFetcher {
        let config = ScraperConfig {
            max_body_bytes,
            ..ScraperConfig::default()
        };
        HttpFetcher::allowing_loopback(&config).unwrap()
    }

    /// Serve one chunked response (no content-length) of `count` copies of
    /// `chunk`, and return its URL.
    async fn serve_chunked(chunk: &str, count: usize) -> Url {
        let chunk = chunk.to_string();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ntransfer-encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for _ in 0..count {
                let frame = format!("{:x}\r\n{chunk}\r\n", chunk.len());
                if socket.write_all(frame.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[test]
    fn ssrf_blocks_file_scheme() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(is_ssrf_target(&url, false));
    }

    #[test]
    fn ssrf_blocks_private_and_loopback() {
        for raw in [
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://[::1]/",
            "http://[fd00::1]/",
            "http://localhost:3000/api",
            "http://printer.local/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url, false), "{raw} should be blocked");
        }
    }

    #[test]
    fn ssrf_allows_public() {
        let url = Url::parse("https://acme.com/about").unwrap();
        assert!(!is_ssrf_target(&url, false));
    }

    #[tokio::test]
    async fn blocked_without_localhost_opt_in() {
        let fetcher = HttpFetcher::new(&ScraperConfig::default()).unwrap();
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Blocked(_)));
    }

    #[tokio::test]
    async fn fetch_html_page() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body><h1>Acme</h1></body></html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let page = test_fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.body.contains("<h1>Acme</h1>"));
    }

    #[tokio::test]
    async fn fetch_reports_http_status() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = test_fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn fetch_rejects_binary_content() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46]),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = test_fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedContent { .. }));
    }

    #[tokio::test]
    async fn fetch_enforces_body_cap() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("x".repeat(4096)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = capped_fetcher(1024).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { max: 1024, .. }));
    }

    #[tokio::test]
    async fn streamed_body_over_cap_is_rejected() {
        let url = serve_chunked(&"x".repeat(256), 16).await;
        let err = capped_fetcher(1024).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { max: 1024, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn streamed_body_under_cap_is_read() {
        let url = serve_chunked("<p>Acme Corp ships deploy tooling.</p>", 3).await;
        let page = capped_fetcher(1024).fetch(&url).await.unwrap();
        assert_eq!(page.body.matches("Acme Corp").count(), 3);
    }

    #[test]
    fn loopback_opt_in_keeps_other_private_ranges_blocked() {
        let loopback = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert!(!is_ssrf_target(&loopback, true));
        for raw in ["http://169.254.169.254/latest/meta-data/", "http://10.0.0.1/", "http://printer.local/"] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url, true), "{raw} should stay blocked");
        }
    }

    #[tokio::test]
    async fn redirect_to_private_address_is_blocked() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(302)
                    .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = test_fetcher().fetch(&url).await.unwrap_err();
        match err {
            FetchError::Blocked(target) => assert!(target.contains("169.254.169.254"), "{target}"),
            other => panic!("expected blocked redirect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_within_public_scope_is_followed() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(301).insert_header("location", "/home"))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/home"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body><h1>Acme</h1></body></html>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let page = test_fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.url.path(), "/home");
    }

    #[tokio::test]
    async fn fetch_unreachable_host_is_connection_error() {
        // Bind then drop a listener so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let err = test_fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Connection { .. } | FetchError::Timeout(_)
        ));
    }
}
