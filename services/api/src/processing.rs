//! Media inspection and remuxing via external tools
//!
//! Both steps shell out: `ffprobe` reports stream metadata as JSON and
//! `ffmpeg` rewrites the container for progressive playback. The subprocess
//! boundary is the [`CommandRunner`] trait so tests can substitute canned
//! output without spawning real processes.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, warn};

/// Upper bound on a single ffprobe/ffmpeg invocation. The tools normally
/// finish in seconds; a stuck process must not pin a request forever.
const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(300);

const ASPECT_TOLERANCE: f64 = 0.1;
const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;

/// Suffix appended to the input path for the remuxed sibling file
const FAST_START_SUFFIX: &str = ".processing";

/// Runs an external program and captures its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
}

/// [`CommandRunner`] that spawns real processes, bounded by a timeout
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let output = tokio::time::timeout(
            SUBPROCESS_TIMEOUT,
            Command::new(program).args(args).output(),
        )
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", program, SUBPROCESS_TIMEOUT))?
        .with_context(|| format!("failed to run {}", program))?;

        Ok(output)
    }
}

/// Coarse aspect-ratio classification of a video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    /// Name used as the storage-key prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }

    /// Classify a width/height ratio. Landscape is checked before portrait;
    /// the bands cannot overlap at the current tolerance, but the ordering
    /// is deliberate should the tolerance ever widen.
    pub fn from_ratio(ratio: f64) -> Self {
        if (ratio - LANDSCAPE_RATIO).abs() < ASPECT_TOLERANCE {
            AspectRatio::Landscape
        } else if (ratio - PORTRAIT_RATIO).abs() < ASPECT_TOLERANCE {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    pub fn from_dimensions(width: i64, height: i64) -> Self {
        Self::from_ratio(width as f64 / height as f64)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<i64>,
    height: Option<i64>,
}

/// Scratch file owner that removes the file when dropped, so remuxed
/// artifacts are cleaned up on every exit path.
pub struct ScratchPath(PathBuf);

impl ScratchPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchPath {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove scratch file {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Media pipeline steps behind the subprocess seam
#[derive(Clone)]
pub struct MediaProcessor {
    runner: Arc<dyn CommandRunner>,
}

impl MediaProcessor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Probe a local video file and classify the first stream's aspect ratio.
    ///
    /// Returns `Ok(None)` when the probe succeeds but reports no stream with
    /// dimensions; callers treat that as an unknown classification.
    pub async fn aspect_ratio(&self, path: &Path) -> Result<Option<AspectRatio>> {
        info!("Probing aspect ratio of {}", path.display());

        let path_arg = path.to_string_lossy();
        let output = self
            .runner
            .run(
                "ffprobe",
                &[
                    "-v",
                    "error",
                    "-print_format",
                    "json",
                    "-show_streams",
                    &path_arg,
                ],
            )
            .await?;

        if !output.status.success() {
            bail!("ffprobe exited with {}", output.status);
        }

        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).context("failed to parse ffprobe output")?;

        let Some(stream) = probe.streams.first() else {
            return Ok(None);
        };
        let (Some(width), Some(height)) = (stream.width, stream.height) else {
            return Ok(None);
        };

        Ok(Some(AspectRatio::from_dimensions(width, height)))
    }

    /// Rewrite the container so its layout metadata is front-loaded for
    /// progressive download, copying all streams verbatim. Writes to a
    /// sibling path and returns it as a self-cleaning scratch file.
    pub async fn remux_for_fast_start(&self, path: &Path) -> Result<ScratchPath> {
        let mut output_path = path.as_os_str().to_owned();
        output_path.push(FAST_START_SUFFIX);
        let output_path = PathBuf::from(output_path);

        info!(
            "Remuxing {} for fast start into {}",
            path.display(),
            output_path.display()
        );

        let input_arg = path.to_string_lossy();
        let output_arg = output_path.to_string_lossy();
        let output = self
            .runner
            .run(
                "ffmpeg",
                &[
                    "-i",
                    &input_arg,
                    "-c",
                    "copy",
                    "-movflags",
                    "faststart",
                    "-f",
                    "mp4",
                    &output_arg,
                ],
            )
            .await?;

        // Claim the output path before checking the exit status: ffmpeg may
        // leave a partial file behind on failure.
        let remuxed = ScratchPath::new(output_path);

        if !output.status.success() {
            bail!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(remuxed)
    }
}
