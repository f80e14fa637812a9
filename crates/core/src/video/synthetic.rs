use std::{thread, time::Duration};

use crate::{config::VideoConfig, LightControlError, Result};

use super::{CapturedFrame, SourceInfo, VideoFrame, VideoSource};

/// Local test-pattern source: a horizontal gradient that scrolls one step per
/// frame, delivered at the configured frame rate.
#[derive(Debug)]
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_rate: u32,
    connected: bool,
    frame_index: u64,
}

impl SyntheticSource {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            name: format!("LIGHT-CONTROL ({})", config.source_name),
            width: config.width.max(1),
            height: config.height.max(1),
            frame_rate: config.frame_rate.max(1),
            connected: false,
            frame_index: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate
    }

    fn render(&self) -> VideoFrame {
        let (width, height) = (self.width as usize, self.height as usize);
        let offset = (self.frame_index * 4) as usize;
        let mut bgra = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            let g = (y * 255 / height) as u8;
            for x in 0..width {
                let b = (((x + offset) % width) * 255 / width) as u8;
                let r = (offset % 256) as u8;
                bgra.extend_from_slice(&[b, g, r, 255]);
            }
        }
        VideoFrame {
            width: self.width,
            height: self.height,
            frame_rate_n: self.frame_rate,
            frame_rate_d: 1,
            bgra,
        }
    }
}

impl VideoSource for SyntheticSource {
    fn discover(&mut self, wait: Duration) -> Result<Vec<SourceInfo>> {
        thread::sleep(wait);
        Ok(vec![SourceInfo {
            name: self.name.clone(),
        }])
    }

    fn connect(&mut self, source: &SourceInfo) -> Result<()> {
        if source.name != self.name {
            return Err(LightControlError::Video(format!(
                "unknown video source `{}`",
                source.name
            )));
        }
        self.connected = true;
        self.frame_index = 0;
        Ok(())
    }

    fn capture(&mut self, timeout: Duration) -> Result<CapturedFrame> {
        if !self.connected {
            return Err(LightControlError::Video("no receiver connected".to_string()));
        }

        let interval = self.frame_interval();
        if interval > timeout {
            thread::sleep(timeout);
            return Ok(CapturedFrame::None);
        }

        thread::sleep(interval);
        let frame = self.render();
        self.frame_index += 1;
        Ok(CapturedFrame::Video(frame))
    }

    fn shutdown(&mut self) {
        if self.connected {
            tracing::info!(name = %self.name, "destroying video receiver");
        }
        self.connected = false;
    }
}
