//! Redirect tracing for results-page links
//!
//! Jackett hands out `/dl/...` links on its own host. Following one either
//! redirects to a magnet URI (which an HTTP client cannot follow) or serves
//! the `.torrent` file, so redirects are walked one hop at a time.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::LOCATION, redirect::Policy};
use tracing::{debug, trace};
use url::Url;

use crate::fetch::{LinkTracer, ResolutionError};

/// Replacement host (and optional port) for indexer links
///
/// Jackett builds result links from the address it was reached on, which is
/// often not the one this process can reach it on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewrite {
    host: String,
    port: Option<u16>,
}

impl HostRewrite {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Swap the link's host, and its port when one is configured
    pub fn apply(&self, link: &str) -> Result<String, ResolutionError> {
        let mut url = Url::parse(link).map_err(|_| ResolutionError::InvalidUrl(link.to_string()))?;

        url.set_host(Some(&self.host))
            .map_err(|_| ResolutionError::InvalidUrl(link.to_string()))?;
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|_| ResolutionError::InvalidUrl(link.to_string()))?;
        }

        Ok(url.to_string())
    }
}

impl FromStr for HostRewrite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("host rewrite is empty"));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .with_context(|| format!("invalid port in host rewrite '{}'", s))?;
                Ok(Self::new(host, Some(port)))
            }
            Some(_) => Err(anyhow!("host rewrite '{}' has no host", s)),
            None => Ok(Self::new(s, None)),
        }
    }
}

impl fmt::Display for HostRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}

/// Result of looking at one response in a redirect chain
#[derive(Debug, PartialEq, Eq)]
enum Hop {
    /// The trace is finished with this locator
    Done(String),
    Follow(String),
}

fn next_hop(current: &str, status: StatusCode, location: Option<&str>) -> Result<Hop, ResolutionError> {
    if status.is_redirection() {
        let location = location
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| ResolutionError::MissingLocation(current.to_string()))?;

        if location.starts_with("magnet:") {
            return Ok(Hop::Done(location.to_string()));
        }

        let base = Url::parse(current).map_err(|_| ResolutionError::InvalidUrl(current.to_string()))?;
        let next = base
            .join(location)
            .map_err(|_| ResolutionError::InvalidUrl(location.to_string()))?;
        return Ok(Hop::Follow(next.to_string()));
    }

    if status.is_success() {
        return Ok(Hop::Done(current.to_string()));
    }

    Err(ResolutionError::Status {
        url: current.to_string(),
        status: status.as_u16(),
    })
}

/// [`LinkTracer`] over HTTP with automatic redirects disabled
#[derive(Clone)]
pub struct HttpLinkTracer {
    client: Client,
    max_hops: usize,
}

impl HttpLinkTracer {
    pub fn new(timeout: Duration, max_hops: usize) -> anyhow::Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .context("Failed to create redirect tracing client")?;

        Ok(Self { client, max_hops })
    }
}

#[async_trait]
impl LinkTracer for HttpLinkTracer {
    async fn trace(&self, url: &str) -> Result<String, ResolutionError> {
        let mut current = url.to_string();

        for hop in 0..=self.max_hops {
            if current.starts_with("magnet:") {
                return Ok(current);
            }

            trace!(url = %current, hop, "Tracing torrent link");
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| ResolutionError::Request {
                    url: current.clone(),
                    message: e.to_string(),
                })?;

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok());

            match next_hop(&current, response.status(), location)? {
                Hop::Done(locator) => {
                    debug!(url = %url, hops = hop, "Traced torrent link");
                    return Ok(locator);
                }
                Hop::Follow(next) => current = next,
            }
        }

        Err(ResolutionError::TooManyRedirects(self.max_hops))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    const LINK: &str = "http://127.0.0.1:9117/dl/alpha/?jackett_apikey=k&path=abc&file=Alpha";

    #[test]
    fn test_parse_host_rewrite() {
        let rewrite: HostRewrite = "jackett:9117".parse().unwrap();
        assert_eq!(rewrite, HostRewrite::new("jackett", Some(9117)));

        let rewrite: HostRewrite = "indexer.lan".parse().unwrap();
        assert_eq!(rewrite, HostRewrite::new("indexer.lan", None));
        assert_eq!(rewrite.to_string(), "indexer.lan");

        assert!("jackett:port".parse::<HostRewrite>().is_err());
        assert!(":9117".parse::<HostRewrite>().is_err());
        assert!("".parse::<HostRewrite>().is_err());
    }

    #[test]
    fn test_rewrite_swaps_host_and_port() {
        let rewrite = HostRewrite::new("jackett", Some(8080));
        assert_eq!(
            rewrite.apply(LINK).unwrap(),
            "http://jackett:8080/dl/alpha/?jackett_apikey=k&path=abc&file=Alpha"
        );
    }

    #[test]
    fn test_rewrite_without_port_keeps_link_port() {
        let rewrite = HostRewrite::new("jackett", None);
        assert_eq!(
            rewrite.apply(LINK).unwrap(),
            "http://jackett:9117/dl/alpha/?jackett_apikey=k&path=abc&file=Alpha"
        );
    }

    #[test]
    fn test_rewrite_rejects_garbage() {
        let rewrite = HostRewrite::new("jackett", None);
        assert_matches!(rewrite.apply("not a url"), Err(ResolutionError::InvalidUrl(_)));
    }

    #[test]
    fn test_magnet_redirect_ends_trace() {
        let hop = next_hop(LINK, StatusCode::FOUND, Some("magnet:?xt=urn:btih:abc")).unwrap();
        assert_eq!(hop, Hop::Done("magnet:?xt=urn:btih:abc".to_string()));
    }

    #[test]
    fn test_relative_redirect_is_joined() {
        let hop = next_hop(
            "http://jackett:9117/dl/alpha/",
            StatusCode::MOVED_PERMANENTLY,
            Some("/files/alpha.torrent"),
        )
        .unwrap();
        assert_eq!(
            hop,
            Hop::Follow("http://jackett:9117/files/alpha.torrent".to_string())
        );
    }

    #[test]
    fn test_success_ends_trace_at_current_url() {
        let hop = next_hop(LINK, StatusCode::OK, None).unwrap();
        assert_eq!(hop, Hop::Done(LINK.to_string()));
    }

    #[test]
    fn test_redirect_without_location_fails() {
        assert_matches!(
            next_hop(LINK, StatusCode::FOUND, None),
            Err(ResolutionError::MissingLocation(_))
        );
    }

    #[test]
    fn test_error_status_fails() {
        assert_matches!(
            next_hop(LINK, StatusCode::BAD_GATEWAY, None),
            Err(ResolutionError::Status { status: 502, .. })
        );
    }

    /// Serves `routes(path)` as a redirect (`Some(location)`) or a 200, counting requests
    async fn redirect_server(
        routes: fn(&str) -> Option<String>,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let (read, mut write) = stream.split();
                let mut reader = BufReader::new(read);

                let mut request_line = String::new();
                reader.read_line(&mut request_line).await.unwrap();
                let mut header = String::new();
                while reader.read_line(&mut header).await.unwrap() > 2 {
                    header.clear();
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let response = match routes(path) {
                    Some(location) => format!(
                        "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        location
                    ),
                    None => "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string(),
                };
                write.write_all(response.as_bytes()).await.unwrap();
                write.shutdown().await.ok();
            }
        });

        (base, hits)
    }

    #[tokio::test]
    async fn test_trace_follows_hops_to_magnet() {
        let (base, hits) = redirect_server(|path| match path {
            "/dl/alpha" => Some("/hop/two".to_string()),
            "/hop/two" => Some("three".to_string()),
            "/hop/three" => Some("magnet:?xt=urn:btih:abc".to_string()),
            _ => None,
        })
        .await;

        let tracer = HttpLinkTracer::new(Duration::from_secs(5), 5).unwrap();
        let locator = tracer.trace(&format!("{}/dl/alpha", base)).await.unwrap();

        assert_eq!(locator, "magnet:?xt=urn:btih:abc");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_trace_ends_at_torrent_file() {
        let (base, _) = redirect_server(|path| match path {
            "/dl/alpha" => Some("/files/alpha.torrent".to_string()),
            _ => None,
        })
        .await;

        let tracer = HttpLinkTracer::new(Duration::from_secs(5), 5).unwrap();
        let locator = tracer.trace(&format!("{}/dl/alpha", base)).await.unwrap();

        assert_eq!(locator, format!("{}/files/alpha.torrent", base));
    }

    #[tokio::test]
    async fn test_trace_gives_up_on_redirect_loop() {
        let (base, hits) = redirect_server(|_| Some("/loop".to_string())).await;

        let tracer = HttpLinkTracer::new(Duration::from_secs(5), 3).unwrap();
        let result = tracer.trace(&format!("{}/loop", base)).await;

        assert_matches!(result, Err(ResolutionError::TooManyRedirects(3)));
        // The first request plus three followed hops
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_magnet_input_needs_no_request() {
        let tracer = HttpLinkTracer::new(Duration::from_secs(1), 3).unwrap();
        let locator = tracer.trace("magnet:?xt=urn:btih:abc").await.unwrap();
        assert_eq!(locator, "magnet:?xt=urn:btih:abc");
    }
}
