//! Artifact serialization.
//!
//! Emits three files:
//! - `playlist.m3u`: ranked entries as directive + URL pairs, grouped by
//!   category through `group-title`
//! - `index.txt`: human-readable listing under category headings
//! - `playlist.backup.m3u`: copy of the playlist, overwritten only after a
//!   run that produced valid entries; a later run that fetches nothing from
//!   the network re-parses it as its entry source
//!
//! All writes are atomic (write to temp, then rename).

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::{Channel, OutputConfig};

/// Writes ranked entries to the output artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output: OutputConfig,
}

impl ArtifactWriter {
    /// Create a writer for the configured output locations.
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    /// Write the playlist and index artifacts.
    pub async fn write_artifacts(&self, channels: &[Channel]) -> Result<()> {
        let playlist = playlist_text(channels);
        write_atomic(&self.output.playlist_path, playlist.as_bytes()).await?;
        write_atomic(&self.output.index_path, index_text(channels).as_bytes()).await?;
        Ok(())
    }

    /// Overwrite the backup playlist. Callers invoke this only after a run
    /// with at least one valid entry.
    pub async fn write_backup(&self, channels: &[Channel]) -> Result<()> {
        write_atomic(&self.output.backup_path, playlist_text(channels).as_bytes()).await
    }

    /// Read the backup playlist text, if one exists.
    pub async fn read_backup(&self) -> Option<String> {
        tokio::fs::read_to_string(&self.output.backup_path).await.ok()
    }

    /// Path of the backup artifact.
    pub fn backup_path(&self) -> &Path {
        &self.output.backup_path
    }
}

async fn write_atomic(path: &PathBuf, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Render entries as an M3U playlist.
pub fn playlist_text(channels: &[Channel]) -> String {
    let mut text = String::from("#EXTM3U\n");
    for channel in channels {
        let tvg_id = attribute(channel, "tvg-id");
        let tvg_name = channel
            .attributes
            .get("tvg-name")
            .cloned()
            .unwrap_or_else(|| channel.name.clone());
        let tvg_logo = attribute(channel, "tvg-logo");

        text.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\",{}\n",
            tvg_id, tvg_name, tvg_logo, channel.category, channel.name
        ));
        text.push_str(&channel.url);
        text.push('\n');
    }
    text
}

/// Render the human-readable index.
pub fn index_text(channels: &[Channel]) -> String {
    let mut text = String::new();
    text.push_str("# streamrank channel index\n");
    text.push_str(&format!(
        "# Generated: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    text.push_str(&format!("# Channels: {}\n", channels.len()));

    let mut current_category: Option<&str> = None;
    for channel in channels {
        if current_category != Some(channel.category.as_str()) {
            current_category = Some(channel.category.as_str());
            text.push_str(&format!("\n== {} ==\n", channel.category));
        }

        let hd_flag = if channel.is_hd() { " [HD]" } else { "" };
        let latency = channel
            .latency_ms
            .map(|ms| format!(" [{ms}ms]"))
            .unwrap_or_default();
        let throughput = channel
            .throughput_kbps
            .map(|kbps| format!(" [{kbps:.1}KB/s]"))
            .unwrap_or_default();

        text.push_str(&format!(
            "{}{}{}{},{}\n",
            channel.name, hd_flag, latency, throughput, channel.url
        ));
    }
    text
}

fn attribute(channel: &Channel, key: &str) -> String {
    channel.attributes.get(key).cloned().unwrap_or_default()
}
