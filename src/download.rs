// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! HTTP downloads.
//!
//! Used for two things: fetching the default pose model when it is missing
//! locally, and staging a remotely stored video before extraction. Both
//! stream to a `.part` file and rename it into place once complete.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cli::logging::is_verbose;
use crate::error::{PipelineError, Result};

/// Default pose model name.
pub const DEFAULT_POSE_MODEL: &str = "yolo11n-pose.onnx";

/// URL for downloading the default pose model.
const DEFAULT_POSE_MODEL_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.3.0/yolo11n-pose.onnx";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

/// Progress bar width in characters.
const BAR_WIDTH: usize = 12;

/// Minimum seconds between progress redraws.
const MIN_UPDATE_INTERVAL: f64 = 0.1;

/// Format bytes as human-readable string (e.g., "10.4MB").
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format time duration.
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let mins = (seconds / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{mins}:{secs:04.1}")
    } else {
        let hours = (seconds / 3600.0) as u32;
        let mins = ((seconds % 3600.0) / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{hours}:{mins:02}:{secs:04.1}")
    }
}

/// Generate progress bar string.
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64) as usize;
    let partial = progress * width as f64 - filled as f64;

    let mut bar = "━".repeat(filled);
    if filled < width {
        if partial > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

/// Whether a string is an HTTP(S) URL.
#[must_use]
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Last path segment of a URL, without query or fragment.
#[must_use]
pub fn url_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains([':', '\\']) && *name != "." && *name != "..")
}

fn progress_line(desc: &str, downloaded: u64, total: u64, elapsed: f64) -> String {
    let rate = if elapsed > 0.0 {
        downloaded as f64 / elapsed
    } else {
        0.0
    };
    if total > 0 {
        let progress = (downloaded as f64 / total as f64).min(1.0);
        format!(
            "{desc}: {}% {} {}/{} {}/s {}",
            (progress * 100.0) as u8,
            generate_bar(progress, BAR_WIDTH),
            format_bytes(downloaded as f64),
            format_bytes(total as f64),
            format_bytes(rate),
            format_time(elapsed)
        )
    } else {
        format!(
            "{desc}: {} {}/s {}",
            format_bytes(downloaded as f64),
            format_bytes(rate),
            format_time(elapsed)
        )
    }
}

/// Stream `reader` into `writer`, redrawing a progress line on stderr.
fn copy_with_progress<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    desc: &str,
    total: u64,
) -> std::io::Result<u64> {
    let show = is_verbose();
    let mut buffer = [0u8; 65536];
    let mut downloaded: u64 = 0;
    let start = Instant::now();
    let mut last_update = start;

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        downloaded += n as u64;

        let now = Instant::now();
        if show && now.duration_since(last_update).as_secs_f64() >= MIN_UPDATE_INTERVAL {
            last_update = now;
            eprint!(
                "\r\x1b[K{}",
                progress_line(desc, downloaded, total, start.elapsed().as_secs_f64())
            );
            std::io::stderr().flush().ok();
        }
    }
    writer.flush()?;

    if show {
        eprintln!(
            "\r\x1b[K{}",
            progress_line(desc, downloaded, total.max(downloaded), start.elapsed().as_secs_f64())
        );
    }
    Ok(downloaded)
}

/// Download a URL to `dest`.
///
/// Streams to `<dest>.part` and renames it into place, so a failed transfer
/// never leaves a truncated file at `dest`.
///
/// # Arguments
///
/// * `url` - HTTP or HTTPS URL.
/// * `dest` - Destination file path.
/// * `wrap` - Builds the error returned on failure, e.g. `PipelineError::ModelLoad`.
///
/// # Errors
///
/// Returns `wrap(message)` if the request, transfer or rename fails.
pub fn download_file(url: &str, dest: &Path, wrap: fn(String) -> PipelineError) -> Result<u64> {
    if !is_url(url) {
        return Err(wrap(format!("unsupported URL scheme: {url}")));
    }

    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        wrap(match &e {
            ureq::Error::Timeout(_) => format!("connection timed out while downloading {url}"),
            ureq::Error::Io(io_err) => format!("network error downloading {url}: {io_err}"),
            _ => format!("failed to download {url}: {e}"),
        })
    })?;

    let total: u64 = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);

    let file = File::create(&temp_path)
        .map_err(|e| wrap(format!("failed to create {}: {e}", temp_path.display())))?;
    let mut writer = BufWriter::new(file);
    let mut reader = response.into_body().into_reader();
    let desc = format!("Downloading {url} to '{}'", dest.display());

    let downloaded = match copy_with_progress(&mut reader, &mut writer, &desc, total) {
        Ok(n) => n,
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(&temp_path);
            return Err(wrap(format!("transfer of {url} failed: {e}")));
        }
    };
    drop(writer);

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        wrap(format!("failed to move download to {}: {e}", dest.display()))
    })?;

    Ok(downloaded)
}

/// Download the default pose model if `model_path` names it.
///
/// # Errors
///
/// Returns [`PipelineError::ModelLoad`] if the model is not the default pose
/// model or the download fails.
pub fn try_download_model<P: AsRef<Path>>(model_path: P) -> Result<PathBuf> {
    let path = model_path.as_ref();
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if filename != DEFAULT_POSE_MODEL {
        return Err(PipelineError::ModelLoad(format!(
            "model file not found: {}. Auto-download is only supported for {DEFAULT_POSE_MODEL}",
            path.display(),
        )));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    download_file(DEFAULT_POSE_MODEL_URL, path, PipelineError::ModelLoad)?;
    Ok(path.to_path_buf())
}

/// Fetch a remote video into `dir`, returning the staged path.
///
/// # Errors
///
/// Returns [`PipelineError::SourceResolution`] if the reference is not an
/// HTTP(S) URL or cannot be retrieved.
pub fn fetch_remote(url: &str, dir: &Path) -> Result<PathBuf> {
    let name = url_file_name(url).unwrap_or("remote-video");
    let dest = dir.join(name);
    download_file(url, &dest, PipelineError::SourceResolution)?;
    Ok(dest)
}
