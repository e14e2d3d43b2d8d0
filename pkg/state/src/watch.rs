use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use pkg_constants::network::WATCH_RECONNECT_DELAY_SECS;
use pkg_types::watch::WatchEvent;

use crate::store::StoreError;

/// Incremental parser for the `data:` lines of a server-sent event stream.
#[derive(Default)]
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    /// Feed a chunk of the response body, returning every complete event it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<WatchEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            match serde_json::from_str::<WatchEvent>(data.trim_start()) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping malformed watch event: {}", e),
            }
        }
        events
    }
}

/// Follows the API server's watch stream for one key prefix, resuming from the last
/// sequence number seen whenever the connection drops.
pub struct Watcher {
    http: reqwest::Client,
    base: String,
    token: String,
    prefix: String,
    seq: u64,
}

impl Watcher {
    pub fn new(server: &str, token: &str, prefix: &str) -> Result<Self, StoreError> {
        reqwest::Url::parse(server)
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {}", server, e)))?;
        // No request timeout: the stream stays open indefinitely.
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base: server.trim_end_matches('/').to_string(),
            token: token.to_string(),
            prefix: prefix.to_string(),
            seq: 0,
        })
    }

    /// Forward events to `tx` until `shutdown` flips to true or the receiver goes away.
    pub async fn run(mut self, tx: mpsc::UnboundedSender<WatchEvent>, mut shutdown: watch::Receiver<bool>) {
        info!("Watching {} on {}", self.prefix, self.base);
        loop {
            tokio::select! {
                result = self.follow(&tx) => {
                    match result {
                        Ok(()) => debug!("Watch stream closed by server"),
                        Err(e) => warn!("Watch stream failed: {}", e),
                    }
                }
                _ = shutdown.changed() => break,
            }
            if tx.is_closed() || *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(WATCH_RECONNECT_DELAY_SECS)) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("Watcher for {} stopped", self.prefix);
    }

    async fn follow(&mut self, tx: &mpsc::UnboundedSender<WatchEvent>) -> Result<(), StoreError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/v1/watch", self.base),
            &[("prefix", self.prefix.clone()), ("seq", self.seq.to_string())],
        )
        .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StoreError::Api {
                status: resp.status().as_u16(),
                path: "/api/v1/watch".to_string(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let mut parser = SseParser::default();
        let mut body = resp.bytes_stream();
        let mut first = true;
        while let Some(chunk) = body.next().await {
            for event in parser.push(&chunk?) {
                if !self.accept(event.seq, first) {
                    continue;
                }
                first = false;
                if tx.send(event).is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Track `seq` and decide whether its event is new. Sequence numbers only grow within
    /// one server lifetime, so a connection that opens at or below the last one seen means
    /// the server restarted its event log.
    fn accept(&mut self, seq: u64, first_on_connection: bool) -> bool {
        if seq <= self.seq {
            if !first_on_connection {
                return false;
            }
            info!(
                "Watch sequence restarted at {} (last seen {}), following the new log",
                seq, self.seq
            );
        }
        self.seq = seq;
        true
    }
}
