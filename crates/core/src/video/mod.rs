//! Video source debug mode.
//!
//! Finds the available network video sources, lets the operator pick one, and
//! then captures frames until shutdown, reporting the average color of each
//! video frame.

mod synthetic;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{LightControlError, Result, ShutdownSignal};

pub use synthetic::SyntheticSource;

/// Source announced on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
}

/// Uncompressed BGRA video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub frame_rate_n: u32,
    pub frame_rate_d: u32,
    pub bgra: Vec<u8>,
}

impl VideoFrame {
    pub fn average_color(&self) -> Option<AverageColor> {
        average_bgr(&self.bgra)
    }
}

/// Result of one capture attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedFrame {
    Video(VideoFrame),
    Audio { samples: usize },
    Metadata(String),
    /// Nothing arrived before the timeout.
    None,
    /// The receiver reported a broken frame; capturing can continue.
    Error(String),
}

/// Per-channel mean of a frame, each in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageColor {
    pub b: f64,
    pub g: f64,
    pub r: f64,
}

impl fmt::Display for AverageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Avg (B, G, R): ({:.1}, {:.1}, {:.1})", self.b, self.g, self.r)
    }
}

/// Averages the blue, green and red channels of BGRA pixels, ignoring alpha.
///
/// Returns `None` when there is not a single whole pixel. Trailing bytes that
/// do not form a pixel are ignored.
pub fn average_bgr(bgra: &[u8]) -> Option<AverageColor> {
    let pixels = bgra.chunks_exact(4);
    let count = pixels.len();
    if count == 0 {
        return None;
    }

    let (mut b, mut g, mut r) = (0u64, 0u64, 0u64);
    for pixel in pixels {
        b += u64::from(pixel[0]);
        g += u64::from(pixel[1]);
        r += u64::from(pixel[2]);
    }

    let count = count as f64;
    Some(AverageColor {
        b: b as f64 / count,
        g: g as f64 / count,
        r: r as f64 / count,
    })
}

/// Network video source collaborator.
pub trait VideoSource {
    /// Lists the sources seen after waiting `wait` for announcements.
    fn discover(&mut self, wait: Duration) -> Result<Vec<SourceInfo>>;

    fn connect(&mut self, source: &SourceInfo) -> Result<()>;

    /// Waits up to `timeout` for the next frame.
    fn capture(&mut self, timeout: Duration) -> Result<CapturedFrame>;

    /// Releases the receiver and finder.
    fn shutdown(&mut self);
}

/// Picks one of the discovered sources.
pub trait SourceChooser {
    fn choose(&mut self, sources: &[SourceInfo]) -> Result<usize>;
}

/// Discovers sources, asks `chooser` for one, and connects to it.
pub fn open_source<V, C>(source: &mut V, chooser: &mut C, wait: Duration) -> Result<SourceInfo>
where
    V: VideoSource + ?Sized,
    C: SourceChooser + ?Sized,
{
    tracing::info!(?wait, "searching for video sources");
    let sources = source.discover(wait)?;
    if sources.is_empty() {
        return Err(LightControlError::Video("no video sources found".to_string()));
    }

    tracing::info!(count = sources.len(), "found video sources");
    for (index, info) in sources.iter().enumerate() {
        tracing::info!(index, name = %info.name, "video source");
    }

    let index = chooser.choose(&sources)?;
    let selected = sources.get(index).cloned().ok_or_else(|| {
        LightControlError::Video(format!(
            "source index {index} is out of range (0-{})",
            sources.len() - 1
        ))
    })?;

    tracing::info!(name = %selected.name, "connecting to video source");
    source.connect(&selected)?;
    Ok(selected)
}

/// Counters collected by [`VideoDebugSession::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoStats {
    /// Capture attempts, whatever they returned.
    pub frames_processed: u64,
    pub video_frames: u64,
    pub audio_frames: u64,
    pub metadata_frames: u64,
    pub errors: u64,
    pub last_average: Option<AverageColor>,
}

/// Capture loop of the video debug mode.
#[derive(Debug)]
pub struct VideoDebugSession<'v, V: ?Sized> {
    source: &'v mut V,
    capture_timeout: Duration,
    report_every: u64,
}

impl<'v, V: VideoSource + ?Sized> VideoDebugSession<'v, V> {
    pub fn new(source: &'v mut V, capture_timeout: Duration, report_every: u64) -> Self {
        Self {
            source,
            capture_timeout,
            report_every: report_every.max(1),
        }
    }

    /// Captures until shutdown is requested.
    pub fn run(&mut self, signal: &ShutdownSignal) -> Result<VideoStats> {
        tracing::info!("video debug mode active, press Ctrl+C to stop");
        let mut stats = VideoStats::default();

        while !signal.is_shutdown_requested() {
            match self.source.capture(self.capture_timeout)? {
                CapturedFrame::Video(frame) => {
                    stats.video_frames += 1;
                    let average = frame.average_color();
                    tracing::debug!(
                        width = frame.width,
                        height = frame.height,
                        fps_n = frame.frame_rate_n,
                        fps_d = frame.frame_rate_d,
                        average = ?average,
                        "video frame"
                    );
                    if average.is_some() {
                        stats.last_average = average;
                    }
                }
                CapturedFrame::Audio { samples } => {
                    stats.audio_frames += 1;
                    tracing::debug!(samples, "audio frame");
                }
                CapturedFrame::Metadata(data) => {
                    stats.metadata_frames += 1;
                    tracing::debug!(%data, "metadata frame");
                }
                CapturedFrame::None => {}
                CapturedFrame::Error(reason) => {
                    stats.errors += 1;
                    tracing::warn!(%reason, "error receiving frame");
                }
            }

            stats.frames_processed += 1;
            if stats.frames_processed % self.report_every == 0 {
                tracing::info!(frames = stats.frames_processed, "processed frames");
            }
        }

        tracing::info!(
            total = stats.frames_processed,
            video = stats.video_frames,
            "video debug mode stopped"
        );
        Ok(stats)
    }
}
