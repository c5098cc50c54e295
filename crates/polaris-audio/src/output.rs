//! Device output through rodio.
//!
//! Only compiled with the `rodio-output` feature. rodio's mixer thread pulls
//! samples from [`MixerSource`], which in turn drives the [`Mixer`] one block
//! at a time, so the device callback is the real-time side of the bridge.

use polaris_core::{PolarisError, PolarisResult};
use rodio::{OutputStream, OutputStreamHandle, Source};

use crate::mixer::Mixer;

struct MixerSource {
    mixer: Mixer,
    buffer: Vec<f32>,
    pos: usize,
    sample_rate: u32,
}

impl Iterator for MixerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.buffer.len() {
            self.mixer.render(&mut self.buffer);
            self.pos = 0;
        }
        let sample = self.buffer[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.mixer.layout().0
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<std::time::Duration> {
        None
    }
}

/// Keeps the default output device open while alive.
pub struct RodioOutput {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
}

impl RodioOutput {
    /// Open the default device and start pulling from `mixer`.
    pub fn start(mixer: Mixer, sample_rate: u32, block_frames: usize) -> PolarisResult<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| PolarisError::Audio(format!("failed to open output device: {e}")))?;

        let block = block_frames.max(1) * mixer.layout().channels().max(1);
        let source = MixerSource {
            mixer,
            buffer: vec![0.0; block],
            pos: block,
            sample_rate,
        };
        handle
            .play_raw(source)
            .map_err(|e| PolarisError::Audio(format!("failed to start playback: {e}")))?;

        tracing::info!(sample_rate, block_frames, "audio output started");
        Ok(Self {
            _stream: stream,
            _handle: handle,
        })
    }
}
