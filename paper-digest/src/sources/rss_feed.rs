use crate::traits::FeedSource;
use crate::types::{FetchConfig, ParsedEntry, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::{info, warn};

/// Feed source that downloads each URL over HTTP and parses it as RSS or Atom.
pub struct RssFeedSource {
    fetcher: Fetcher,
}

impl RssFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
        })
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<ParsedEntry>> {
        info!("Pulling RSS feed: {}", url);

        let fetch_result = self.fetcher.fetch_feed(url).await?;
        if fetch_result.content.trim().is_empty() {
            warn!("Empty response body for feed {}", url);
            return Ok(Vec::new());
        }

        let parsed_feed = FeedParser::parse_feed(&fetch_result.content)?;

        info!(
            "Pulled {} entries from {} ({}) in {}ms",
            parsed_feed.entries.len(),
            url,
            parsed_feed.title.as_deref().unwrap_or("untitled feed"),
            fetch_result.response_time_ms
        );
        Ok(parsed_feed.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DigestError;
    use axum::{http::header, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title><link>http://x/</link><description>d</description>
<item><title>One</title><link>http://arxiv.org/abs/1</link><description>First.</description></item>
<item><title>Two</title><link>http://arxiv.org/abs/2</link><description>Second.</description></item>
</channel></rss>"#;

    #[tokio::test]
    async fn fetches_and_parses_over_http() {
        let app = Router::new()
            .route("/rss", get(|| async { ([(header::CONTENT_TYPE, "application/rss+xml")], FEED) }))
            .route("/html", get(|| async { "<html><body>maintenance</body></html>" }));
        let addr = serve(app).await;
        let source = RssFeedSource::new(FetchConfig::default()).unwrap();

        let entries = source.fetch_entries(&format!("http://{addr}/rss")).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].link, "http://arxiv.org/abs/2");

        let err = source.fetch_entries(&format!("http://{addr}/html")).await.unwrap_err();
        assert!(matches!(err, DigestError::Parse(_)));
    }
}
