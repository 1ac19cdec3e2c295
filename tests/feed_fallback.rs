// Integration tests for the HTTP feed source against a local server.

#[cfg(test)]
mod tests {
    use inky_refresh::config::FeedConfig;
    use inky_refresh::feed::rss::HttpFeedFetcher;
    use inky_refresh::feed::types::PLACEHOLDER_TITLE;
    use inky_refresh::feed::FeedSource;
    use inky_refresh::health::SourceStatus;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Local</title>
<item><title>A</title><description>&lt;b&gt;first&lt;/b&gt; story</description></item>
<item><title>B</title><description>second story</description></item>
<item><title>C</title><description>third story</description></item>
</channel></rss>"#;

    /// Serves `body` with the status held in `status` to every request.
    async fn serve(body: &'static str, status: Arc<AtomicU16>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let status = status.load(Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while let Ok(n) = socket.read(&mut buf[read..]).await {
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                            break;
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {} X\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}/feed.xml", addr)
    }

    fn source(state_dir: &std::path::Path) -> FeedSource {
        let config = FeedConfig {
            request_timeout_ms: 2000,
            ..FeedConfig::default()
        };
        let fetcher = HttpFeedFetcher::new(Duration::from_millis(config.request_timeout_ms)).unwrap();
        FeedSource::new(Box::new(fetcher), state_dir, &config)
    }

    #[tokio::test]
    async fn test_rotation_wraps_from_persisted_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let url = serve(RSS, Arc::new(AtomicU16::new(200))).await;
        std::fs::write(tmp.path().join("feedState.json"), r#"{"lastIndex":2}"#).unwrap();

        let feed = source(tmp.path());
        let outcome = feed.fetch(Some(&url)).await;
        assert_eq!(outcome.status, SourceStatus::Live);
        assert_eq!(outcome.item.title, "A");
        assert_eq!(outcome.item.text, "first story");
        assert_eq!(feed.cursor(), Some(0));

        assert_eq!(feed.fetch(Some(&url)).await.item.title, "B");
    }

    #[tokio::test]
    async fn test_peek_does_not_move_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let url = serve(RSS, Arc::new(AtomicU16::new(200))).await;
        let feed = source(tmp.path());

        assert_eq!(feed.peek(Some(&url)).await.unwrap().title, "A");
        assert_eq!(feed.peek(Some(&url)).await.unwrap().title, "A");
        assert_eq!(feed.cursor(), None);
        assert!(feed.cached().is_none());
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let status = Arc::new(AtomicU16::new(200));
        let url = serve(RSS, status.clone()).await;
        let feed = source(tmp.path());

        assert_eq!(feed.fetch(Some(&url)).await.item.title, "A");

        status.store(503, Ordering::SeqCst);
        let outcome = feed.fetch(Some(&url)).await;
        assert_eq!(outcome.status, SourceStatus::Cached);
        assert_eq!(outcome.item.title, "A");
        assert_eq!(feed.cursor(), Some(0));
    }

    #[tokio::test]
    async fn test_empty_feed_without_cache_gives_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let url = serve(
            "<rss version=\"2.0\"><channel><title>Quiet</title></channel></rss>",
            Arc::new(AtomicU16::new(200)),
        )
        .await;
        let feed = source(tmp.path());

        let outcome = feed.fetch(Some(&url)).await;
        assert_eq!(outcome.status, SourceStatus::Unavailable);
        assert_eq!(outcome.item.title, PLACEHOLDER_TITLE);
    }

    #[tokio::test]
    async fn test_missing_url_counts_as_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let feed = source(tmp.path());

        let outcome = feed.fetch(None).await;
        assert_eq!(outcome.status, SourceStatus::Unavailable);
        assert!(feed.peek(Some("  ")).await.is_err());
    }
}
