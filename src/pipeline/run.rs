// src/pipeline/run.rs

//! Full aggregation pipeline.
//!
//! Registry → fetch (parallel) → parse → dedup → classify → probe
//! (parallel) → rank → write. A hard barrier sits between the fetch and
//! probe stages; per-unit failures never abort the run.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Channel, Config, RunStats, Source};
use crate::pipeline::{classify_all, dedupe, parse_playlist, rank};
use crate::services::{QualityProbe, SourceFetcher};
use crate::storage::ArtifactWriter;

/// Run the aggregation pipeline end to end.
pub async fn run_pipeline(config: Arc<Config>, source_list: &Path) -> Result<RunStats> {
    let list_text = match tokio::fs::read_to_string(source_list).await {
        Ok(text) => text,
        Err(error) => {
            // Missing or unreadable list is not fatal; the backup fallback
            // below may still supply entries.
            log::warn!("Source list {:?} unavailable: {}", source_list, error);
            String::new()
        }
    };
    let sources = Source::parse_list(&list_text);
    let mut stats = RunStats::begin(sources.len());
    log::info!("Loaded {} sources", sources.len());

    let writer = ArtifactWriter::new(config.output.clone());
    let (mut channels, failures) = fetch_and_parse(&config, &sources).await?;
    stats.sources_failed = failures;
    stats.entries_parsed = channels.len();

    if channels.is_empty() {
        channels = restore_from_backup(&writer, &mut stats).await?;
    }

    let mut channels = dedupe(channels);
    stats.entries_unique = channels.len();
    log::info!(
        "Parsed {} entries, {} unique",
        stats.entries_parsed,
        stats.entries_unique
    );

    classify_all(&mut channels, &config.classify);

    let probe = QualityProbe::new(
        Arc::new(config.probe.clone()),
        &config.fetcher.user_agent,
    )?;
    let summary = probe.probe_all(&mut channels).await;
    stats.entries_valid = summary.valid;
    stats.entries_invalid = summary.invalid;
    log::info!(
        "Probe complete: {} valid, {} invalid",
        summary.valid,
        summary.invalid
    );

    if summary.valid == 0 {
        if writer.read_backup().await.is_none() {
            return Err(AppError::pipeline(
                "zero valid entries after probing and no usable backup",
            ));
        }
        // Previous artifacts stay in place for consumers.
        log::warn!("Zero valid entries this run; keeping previous artifacts");
        stats.end_time = Utc::now();
        return Ok(stats);
    }

    let mut ranked: Vec<Channel> = channels.into_iter().filter(|c| c.valid).collect();
    rank(&mut ranked, &config.classify);

    writer.write_artifacts(&ranked).await?;
    writer.write_backup(&ranked).await?;
    log::info!(
        "Wrote {} entries to {:?}",
        ranked.len(),
        config.output.playlist_path
    );

    stats.end_time = Utc::now();
    Ok(stats)
}

/// Fetch all sources and parse their playlists, merging the per-task
/// buffers in source-list order. Returns the entries and the failure count.
async fn fetch_and_parse(config: &Config, sources: &[Source]) -> Result<(Vec<Channel>, usize)> {
    if sources.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let fetcher = SourceFetcher::new(Arc::new(config.fetcher.clone()))?;
    let outcome = fetcher.fetch_all(sources).await;

    let mut channels = Vec::new();
    for (source, body) in &outcome.bodies {
        let parsed = parse_playlist(
            body,
            &source.name,
            source.apply_region_filter,
            &config.filter.region_keywords,
        );
        log::debug!("Source {} contributed {} entries", source.name, parsed.len());
        channels.extend(parsed);
    }
    Ok((channels, outcome.failures))
}

/// Re-parse the backup playlist when the network yielded nothing.
async fn restore_from_backup(
    writer: &ArtifactWriter,
    stats: &mut RunStats,
) -> Result<Vec<Channel>> {
    let Some(backup) = writer.read_backup().await else {
        return Err(AppError::pipeline(
            "no entries fetched and no usable backup",
        ));
    };

    // The backup was already region-filtered when first written.
    let channels = parse_playlist(&backup, "backup", false, &[]);
    log::warn!(
        "No entries fetched; restored {} entries from backup {:?}",
        channels.len(),
        writer.backup_path()
    );
    stats.used_backup = true;
    stats.entries_parsed = channels.len();
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::models::OutputConfig;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.fetcher.cache_dir = dir.join("cache");
        // Each test gets a fresh temp dir; a zero TTL also rules out reuse.
        config.fetcher.cache_ttl_secs = 0;
        config.probe.request_timeout_secs = 2;
        config.probe.hard_timeout_secs = 5;
        config.output = OutputConfig {
            playlist_path: dir.join("out/playlist.m3u"),
            index_path: dir.join("out/index.txt"),
            backup_path: dir.join("out/playlist.backup.m3u"),
        };
        config
    }

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
                    let _ = socket.write_all(respond(&path).as_bytes()).await;
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

    #[tokio::test]
    async fn test_no_sources_and_no_backup_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(dir.path()));
        let list = dir.path().join("sources.txt");
        tokio::fs::write(&list, "# empty\n").await.unwrap();

        let result = run_pipeline(config, &list).await;
        assert!(matches!(result, Err(AppError::Pipeline(_))));
        assert!(!dir.path().join("out/playlist.m3u").exists());
        assert!(!dir.path().join("out/index.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_source_list_behaves_like_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(dir.path()));

        let result = run_pipeline(config, &dir.path().join("absent.txt")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_with_local_servers() {
        fn respond(path: &str) -> String {
            match path {
                "/list.m3u" => http_response(
                    "200 OK",
                    "application/vnd.apple.mpegurl",
                    concat!(
                        "#EXTM3U\n",
                        "#EXTINF:-1 group-title=\"香港\",TVB Jade HD\n",
                        "/stream/jade.ts\n",
                        "#EXTINF:-1 group-title=\"US\",Filtered Out\n",
                        "/stream/other.ts\n",
                    ),
                ),
                _ => {
                    let body = "z".repeat(64 * 1024);
                    http_response("200 OK", "video/mp2t", &body)
                }
            }
        }
        let base = spawn_server(respond).await;

        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(dir.path()));
        let list = dir.path().join("sources.txt");
        tokio::fs::write(&list, format!("{base}/list.m3u\n"))
            .await
            .unwrap();

        let stats = run_pipeline(Arc::clone(&config), &list).await.unwrap();
        assert_eq!(stats.sources_total, 1);
        assert_eq!(stats.sources_failed, 0);
        // The region filter drops the US entry before probing.
        assert_eq!(stats.entries_unique, 1);
        assert_eq!(stats.entries_valid, 1);

        let playlist =
            tokio::fs::read_to_string(&config.output.playlist_path).await.unwrap();
        assert!(playlist.contains("TVB Jade HD"));
        assert!(!playlist.contains("Filtered Out"));

        let backup =
            tokio::fs::read_to_string(&config.output.backup_path).await.unwrap();
        assert_eq!(playlist, backup);

        let index = tokio::fs::read_to_string(&config.output.index_path).await.unwrap();
        assert!(index.contains("TVB Jade HD [HD]"));
    }

    #[tokio::test]
    async fn test_backup_fallback_when_network_yields_nothing() {
        fn respond(path: &str) -> String {
            match path {
                // Source fetch fails outright.
                "/list.m3u" => http_response("500 Internal Server Error", "text/plain", "down"),
                _ => {
                    let body = "z".repeat(64 * 1024);
                    http_response("200 OK", "video/mp2t", &body)
                }
            }
        }
        let base = spawn_server(respond).await;

        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(dir.path()));
        let list = dir.path().join("sources.txt");
        tokio::fs::write(&list, format!("{base}/list.m3u\n"))
            .await
            .unwrap();

        // Seed a backup from a previous good run.
        tokio::fs::create_dir_all(dir.path().join("out")).await.unwrap();
        tokio::fs::write(
            &config.output.backup_path,
            format!(
                "#EXTM3U\n#EXTINF:-1 group-title=\"general\",Jade\n{base}/stream/jade.ts\n"
            ),
        )
        .await
        .unwrap();

        let stats = run_pipeline(Arc::clone(&config), &list).await.unwrap();
        assert!(stats.used_backup);
        assert_eq!(stats.sources_failed, 1);
        assert_eq!(stats.entries_valid, 1);

        let playlist =
            tokio::fs::read_to_string(&config.output.playlist_path).await.unwrap();
        assert!(playlist.contains("Jade"));
    }

    #[tokio::test]
    async fn test_all_invalid_with_backup_keeps_previous_artifacts() {
        fn respond(path: &str) -> String {
            match path {
                "/list.m3u" => http_response(
                    "200 OK",
                    "application/vnd.apple.mpegurl",
                    "#EXTM3U\n#EXTINF:-1 group-title=\"香港\",Dead HK\n/dead.ts\n",
                ),
                // Every stream request 404s, so nothing validates.
                _ => http_response("404 Not Found", "text/plain", "gone"),
            }
        }
        let base = spawn_server(respond).await;

        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(dir.path()));
        let list = dir.path().join("sources.txt");
        tokio::fs::write(&list, format!("{base}/list.m3u\n"))
            .await
            .unwrap();

        tokio::fs::create_dir_all(dir.path().join("out")).await.unwrap();
        let previous_backup = "#EXTM3U\n#EXTINF:-1 group-title=\"general\",Old\nhttp://old/x.ts\n";
        tokio::fs::write(&config.output.backup_path, previous_backup)
            .await
            .unwrap();

        let stats = run_pipeline(Arc::clone(&config), &list).await.unwrap();
        assert_eq!(stats.entries_valid, 0);

        // Backup untouched, no new playlist written.
        let backup =
            tokio::fs::read_to_string(&config.output.backup_path).await.unwrap();
        assert_eq!(backup, previous_backup);
        assert!(!config.output.playlist_path.exists());
    }
}
