//! Keeps the line store fed from the upstream provider.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::LinesProviderClient;
use crate::db::LineStore;
use crate::error::LineError;
use crate::models::SportType;
use crate::ticker::Ticker;

/// One [`Ticker`] per sport, each fetching from the provider and storing
/// what it gets. Failures are logged and the next poll proceeds.
pub struct LinePoller {
    tickers: Vec<Ticker>,
}

/// Fetch one sport from the provider and store every returned line.
/// Returns how many lines were stored.
pub async fn poll_once(
    client: &LinesProviderClient,
    store: &dyn LineStore,
    sport_type: SportType,
) -> usize {
    let lines = match client.fetch_lines(sport_type).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!(sport = %sport_type, error = %format!("{:#}", e), "Provider fetch failed");
            return 0;
        }
    };

    let mut stored = 0;
    for line in &lines {
        match store.store(line).await {
            Ok(()) => stored += 1,
            Err(e) => warn!(sport = %line.sport_type, error = %e, "Failed to store line"),
        }
    }
    debug!(sport = %sport_type, stored, "Poll complete");
    stored
}

impl LinePoller {
    pub fn start(
        client: LinesProviderClient,
        store: Arc<dyn LineStore>,
        sports: &[SportType],
        period: Duration,
    ) -> Result<Self, LineError> {
        let mut tickers = Vec::with_capacity(sports.len());
        for &sport_type in sports {
            let client = client.clone();
            let store = store.clone();
            tickers.push(Ticker::start(period, move || {
                let client = client.clone();
                let store = store.clone();
                async move {
                    poll_once(&client, store.as_ref(), sport_type).await;
                }
            })?);
        }
        Ok(Self { tickers })
    }

    pub fn stop(&self) {
        for ticker in &self.tickers {
            ticker.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryLineStore;
    use crate::models::SportLine;

    #[tokio::test]
    async fn test_unreachable_provider_stores_nothing() {
        // Port 9 (discard) on localhost refuses connections
        let client =
            LinesProviderClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let store = InMemoryLineStore::new();

        let stored = poll_once(&client, &store, SportType::Baseball).await;

        assert_eq!(stored, 0);
        assert!(store.is_empty());
    }

    /// Serve one canned JSON response on an ephemeral port.
    async fn serve_once(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_poll_once_stores_provider_lines() {
        let base = serve_once(r#"{"lines":{"BASEBALL":"0.744"}}"#).await;
        let client = LinesProviderClient::new(base, Duration::from_secs(2)).unwrap();
        let store = InMemoryLineStore::new();

        let stored = poll_once(&client, &store, SportType::Baseball).await;

        assert_eq!(stored, 1);
        let lines = store
            .get_lines_by_sport_types(&[SportType::Baseball])
            .await
            .unwrap();
        assert_eq!(lines, vec![SportLine::new(SportType::Baseball, 0.744).unwrap()]);
    }

    #[tokio::test]
    async fn test_one_ticker_per_sport() {
        let client =
            LinesProviderClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let store: Arc<dyn LineStore> = Arc::new(InMemoryLineStore::new());

        let poller = LinePoller::start(
            client,
            store,
            &[SportType::Baseball, SportType::Soccer],
            Duration::from_secs(60),
        )
        .unwrap();

        assert_eq!(poller.len(), 2);
        poller.stop();
    }
}
