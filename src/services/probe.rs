// src/services/probe.rs

//! Stream quality probing service.
//!
//! Each entry gets a two-stage test: fetch the playlist resource and measure
//! latency, then stream a bounded slice of one concrete media sub-resource
//! and measure throughput. Every failure is a reason string on an invalid
//! outcome, never a run-level error.
//!
//! Probes run as isolated tokio tasks under a hard wall-clock timeout
//! enforced by the scheduler: when the timeout fires the task is aborted,
//! so a network call that ignores cancellation cannot stall the batch.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use url::Url;

use crate::error::Result;
use crate::models::{Channel, ProbeConfig};
use crate::utils::http::create_probe_client;

/// Result of probing one entry.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub valid: bool,
    pub latency_ms: Option<u64>,
    pub throughput_kbps: Option<f64>,
    /// Failure reason when invalid
    pub reason: Option<String>,
}

impl ProbeOutcome {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Counts from probing a batch.
#[derive(Debug, Default)]
pub struct ProbeSummary {
    pub valid: usize,
    pub invalid: usize,
}

/// Service for probing stream entries.
pub struct QualityProbe {
    config: Arc<ProbeConfig>,
    client: Client,
}

impl QualityProbe {
    /// Create a probe service from configuration.
    pub fn new(config: Arc<ProbeConfig>, user_agent: &str) -> Result<Self> {
        let client = create_probe_client(user_agent, config.request_timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Probe one entry without the hard-timeout wrapper.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        probe_url(self.client.clone(), Arc::clone(&self.config), url.to_string()).await
    }

    /// Probe all entries concurrently and write results in place.
    ///
    /// One spawned task per entry, pool capped at `max_concurrent`. Each
    /// task is bounded by `hard_timeout_secs`; on expiry it is aborted and
    /// the entry recorded as timeout-invalid. Each entry's result fields are
    /// written by exactly one fan-in assignment.
    pub async fn probe_all(&self, channels: &mut [Channel]) -> ProbeSummary {
        let concurrency = self.config.max_concurrent.min(channels.len()).max(1);
        let hard_timeout = Duration::from_secs(self.config.hard_timeout_secs);

        let jobs: Vec<(usize, String)> = channels
            .iter()
            .enumerate()
            .map(|(index, channel)| (index, channel.url.clone()))
            .collect();

        let mut summary = ProbeSummary::default();
        let mut probe_stream = stream::iter(jobs)
            .map(|(index, url)| {
                let client = self.client.clone();
                let config = Arc::clone(&self.config);
                async move {
                    let mut handle = tokio::spawn(probe_url(client, config, url));
                    let outcome = match tokio::time::timeout(hard_timeout, &mut handle).await {
                        Ok(Ok(outcome)) => outcome,
                        // Probe task panicked.
                        Ok(Err(join_error)) => {
                            ProbeOutcome::rejected(format!("probe task failed: {join_error}"))
                        }
                        Err(_elapsed) => {
                            // Forcibly terminate the hung task; dropping the
                            // handle alone would leave it running.
                            handle.abort();
                            ProbeOutcome::rejected(format!(
                                "timeout after {}s",
                                hard_timeout.as_secs()
                            ))
                        }
                    };
                    (index, outcome)
                }
            })
            .buffer_unordered(concurrency);

        while let Some((index, outcome)) = probe_stream.next().await {
            let channel = &mut channels[index];
            if outcome.valid {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
                log::debug!(
                    "Probe rejected {} ({}): {}",
                    channel.name,
                    channel.url,
                    outcome.reason.as_deref().unwrap_or("unknown")
                );
            }
            channel.valid = outcome.valid;
            channel.latency_ms = outcome.latency_ms;
            channel.throughput_kbps = outcome.throughput_kbps;
        }

        summary
    }
}

/// Run the two-stage probe against a stream URL.
async fn probe_url(client: Client, config: Arc<ProbeConfig>, url: String) -> ProbeOutcome {
    // Stage 1: liveness. Fetch the playlist resource and time it.
    let started = Instant::now();
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(error) => return ProbeOutcome::rejected(describe_request_error(&error)),
    };

    let status = response.status();
    if !status.is_success() {
        return ProbeOutcome::rejected(format!("HTTP error status {}", status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    if content_type.contains("text/html") {
        return ProbeOutcome::rejected("web page, not a stream");
    }

    // Stage 2: throughput against one concrete media sub-resource.
    let (latency_ms, transfer) = if is_streamable_content_type(&content_type) {
        // Directly streamable; keep reading the open response.
        let latency_ms = started.elapsed().as_millis() as u64;
        (latency_ms, read_quota(response, config.byte_quota).await)
    } else {
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => return ProbeOutcome::rejected(describe_request_error(&error)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        if !body.trim_start().starts_with("#EXTM3U") {
            return ProbeOutcome::rejected("malformed stream: neither playlist nor media");
        }
        let Some(media_url) = resolve_media_url(&url, &body) else {
            return ProbeOutcome::rejected("malformed stream: playlist has no media lines");
        };

        let media_response = match client.get(&media_url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                return ProbeOutcome::rejected(format!(
                    "HTTP error status {} on media",
                    response.status().as_u16()
                ));
            }
            Err(error) => return ProbeOutcome::rejected(describe_request_error(&error)),
        };
        (latency_ms, read_quota(media_response, config.byte_quota).await)
    };

    let (bytes_read, elapsed) = match transfer {
        Ok(transfer) => transfer,
        Err(error) => return ProbeOutcome::rejected(describe_request_error(&error)),
    };

    match evaluate_transfer(bytes_read, elapsed, config.throughput_floor_kbps) {
        Ok(throughput_kbps) => ProbeOutcome {
            valid: true,
            latency_ms: Some(latency_ms),
            throughput_kbps: Some(throughput_kbps),
            reason: None,
        },
        Err(reason) => ProbeOutcome {
            valid: false,
            latency_ms: Some(latency_ms),
            throughput_kbps: None,
            reason: Some(reason),
        },
    }
}

/// Read a response body up to the byte quota, returning bytes read and time
/// spent reading.
async fn read_quota(
    response: Response,
    quota: u64,
) -> std::result::Result<(u64, Duration), reqwest::Error> {
    let started = Instant::now();
    let mut bytes_read: u64 = 0;
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        bytes_read += chunk?.len() as u64;
        if bytes_read >= quota {
            break;
        }
    }

    Ok((bytes_read, started.elapsed()))
}

/// Judge a measured transfer against the throughput floor.
///
/// Returns the throughput in KB/s, or the rejection reason.
fn evaluate_transfer(
    bytes_read: u64,
    elapsed: Duration,
    floor_kbps: f64,
) -> std::result::Result<f64, String> {
    if bytes_read == 0 {
        return Err("no data received".to_string());
    }

    let secs = elapsed.as_secs_f64().max(1e-6);
    let throughput_kbps = bytes_read as f64 / 1024.0 / secs;
    if throughput_kbps < floor_kbps {
        return Err(format!(
            "too slow: {:.1} KB/s below {:.1} KB/s floor",
            throughput_kbps, floor_kbps
        ));
    }
    Ok(throughput_kbps)
}

/// Content types that can be streamed directly without playlist indirection.
fn is_streamable_content_type(content_type: &str) -> bool {
    content_type.starts_with("video/")
        || content_type.starts_with("audio/")
        || content_type.contains("octet-stream")
        || content_type.contains("mp2t")
}

/// Resolve the first media line of a playlist (variant or segment) against
/// the playlist URL.
fn resolve_media_url(playlist_url: &str, body: &str) -> Option<String> {
    let line = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))?;

    match Url::parse(playlist_url) {
        Ok(base) => Some(crate::utils::resolve_url(&base, line)),
        Err(_) => Some(line.to_string()),
    }
}

/// Classify a reqwest error into a distinct probe reason.
fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return "timeout".to_string();
    }

    // reqwest does not expose DNS failures directly; inspect the chain.
    let mut cause: Option<&dyn StdError> = error.source();
    while let Some(inner) = cause {
        let text = inner.to_string().to_lowercase();
        if text.contains("dns") || text.contains("lookup") {
            return "dns failure".to_string();
        }
        cause = inner.source();
    }

    if error.is_connect() {
        return format!("connection failed: {error}");
    }
    format!("request failed: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config(request_timeout_secs: u64, hard_timeout_secs: u64) -> Arc<ProbeConfig> {
        Arc::new(ProbeConfig {
            request_timeout_secs,
            hard_timeout_secs,
            max_concurrent: 4,
            byte_quota: 128 * 1024,
            throughput_floor_kbps: 100.0,
        })
    }

    fn probe_with(config: Arc<ProbeConfig>) -> QualityProbe {
        QualityProbe::new(config, "streamrank-test").unwrap()
    }

    /// Minimal one-shot HTTP server: answers every connection with the
    /// response produced by `respond(path)`.
    async fn spawn_server(respond: fn(&str) -> String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_string();
                    let response = respond(&path);
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn test_evaluate_transfer_below_floor() {
        // 50 KB over one second against a 100 KB/s floor.
        let result = evaluate_transfer(50 * 1024, Duration::from_secs(1), 100.0);
        let reason = result.unwrap_err();
        assert!(reason.contains("slow"), "reason: {reason}");
    }

    #[test]
    fn test_evaluate_transfer_zero_bytes() {
        let reason = evaluate_transfer(0, Duration::from_secs(1), 100.0).unwrap_err();
        assert!(reason.contains("no data"));
    }

    #[test]
    fn test_evaluate_transfer_accepts_fast_stream() {
        let throughput = evaluate_transfer(512 * 1024, Duration::from_secs(1), 100.0).unwrap();
        assert!((throughput - 512.0).abs() < 1.0);
    }

    #[test]
    fn test_streamable_content_types() {
        assert!(is_streamable_content_type("video/mp2t"));
        assert!(is_streamable_content_type("application/octet-stream"));
        assert!(is_streamable_content_type("audio/aac"));
        assert!(!is_streamable_content_type("text/html; charset=utf-8"));
        assert!(!is_streamable_content_type("application/vnd.apple.mpegurl"));
    }

    #[test]
    fn test_resolve_media_url_relative_and_absolute() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\nchunk/v0.m3u8\n";
        assert_eq!(
            resolve_media_url("http://h/live/index.m3u8", body).as_deref(),
            Some("http://h/live/chunk/v0.m3u8")
        );

        let body = "#EXTM3U\nhttp://cdn/v0.ts\n";
        assert_eq!(
            resolve_media_url("http://h/live/index.m3u8", body).as_deref(),
            Some("http://cdn/v0.ts")
        );

        assert_eq!(resolve_media_url("http://h/a.m3u8", "#EXTM3U\n"), None);
    }

    #[tokio::test]
    async fn test_probe_http_error_status() {
        let base = spawn_server(|_| http_response("404 Not Found", "text/plain", "gone")).await;
        let probe = probe_with(test_config(5, 10));

        let outcome = probe.probe(&format!("{base}/missing.m3u8")).await;
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("error"));
    }

    #[tokio::test]
    async fn test_probe_rejects_web_page() {
        let base =
            spawn_server(|_| http_response("200 OK", "text/html", "<html>portal</html>")).await;
        let probe = probe_with(test_config(5, 10));

        let outcome = probe.probe(&format!("{base}/index.m3u8")).await;
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("web page"));
    }

    #[tokio::test]
    async fn test_probe_rejects_non_playlist_body() {
        let base = spawn_server(|_| http_response("200 OK", "text/plain", "hello there")).await;
        let probe = probe_with(test_config(5, 10));

        let outcome = probe.probe(&format!("{base}/list.m3u8")).await;
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn test_probe_accepts_playlist_with_fast_segment() {
        fn respond(path: &str) -> String {
            match path {
                "/live.m3u8" => http_response(
                    "200 OK",
                    "application/vnd.apple.mpegurl",
                    "#EXTM3U\n#EXTINF:10,\n/seg0.ts\n",
                ),
                _ => {
                    let body = "x".repeat(64 * 1024);
                    http_response("200 OK", "video/mp2t", &body)
                }
            }
        }
        let base = spawn_server(respond).await;
        let probe = probe_with(test_config(5, 10));

        let outcome = probe.probe(&format!("{base}/live.m3u8")).await;
        assert!(outcome.valid, "reason: {:?}", outcome.reason);
        assert!(outcome.latency_ms.is_some());
        // Local loopback transfer is far above the floor.
        assert!(outcome.throughput_kbps.unwrap() > 100.0);
    }

    #[tokio::test]
    async fn test_hung_endpoint_hits_hard_timeout() {
        // Accepts connections but never writes a byte.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        // Request timeout far above the hard bound: the scheduler-enforced
        // abort must fire first.
        let probe = probe_with(test_config(60, 1));
        let mut channels = vec![Channel::new("Hung", format!("http://{addr}/x.m3u8"), "")];

        let started = Instant::now();
        let summary = probe.probe_all(&mut channels).await;
        let elapsed = started.elapsed();

        assert_eq!(summary.invalid, 1);
        assert!(!channels[0].valid);
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_probe_all_mixes_valid_and_invalid() {
        fn respond(path: &str) -> String {
            match path {
                "/ok.m3u8" => {
                    let body = "y".repeat(64 * 1024);
                    http_response("200 OK", "video/mp2t", &body)
                }
                _ => http_response("404 Not Found", "text/plain", "gone"),
            }
        }
        let base = spawn_server(respond).await;
        let probe = probe_with(test_config(5, 10));

        let mut channels = vec![
            Channel::new("Good", format!("{base}/ok.m3u8"), ""),
            Channel::new("Bad", format!("{base}/nope.m3u8"), ""),
        ];
        let summary = probe.probe_all(&mut channels).await;

        assert_eq!(summary.valid, 1);
        assert_eq!(summary.invalid, 1);
        assert!(channels[0].valid);
        assert!(!channels[1].valid);
    }
}
