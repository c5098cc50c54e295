//! Wave sources: the engine-owned PCM streams channels point at.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// A PCM stream the bridge can pull from.
///
/// The cursor lives inside the source, so `read` takes `&self` and advances
/// it through interior mutability. Implementations are read from the
/// real-time thread and must not block or allocate in `read`.
pub trait WaveSource: Send + Sync {
    /// Interleaved channel count, 1 or 2.
    fn channels(&self) -> u16;

    /// Fill `out` with up to `out.len() / channels` interleaved frames.
    /// Returns the number of frames written.
    fn read(&self, out: &mut [i16]) -> usize;

    /// True once the last frame has been read.
    fn is_eos(&self) -> bool;

    /// Move the cursor back to the first frame and clear end-of-stream.
    fn rewind(&self);
}

/// How many times a [`PcmWave`] plays its loop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play through once.
    Once,
    /// Play the loop region this many times in total, then run to the end.
    Times(u32),
    /// Loop until stopped.
    Forever,
}

/// An in-memory 16-bit PCM wave with an optional loop region.
///
/// The first pass starts at frame 0. Repeats restart at `loop_start` and end
/// at `loop_start + loop_length`. The final pass continues to the last frame.
#[derive(Debug)]
pub struct PcmWave {
    samples: Vec<i16>,
    channels: u16,
    loop_start: usize,
    loop_length: Option<usize>,
    mode: LoopMode,
    pos: AtomicUsize,
    passes: AtomicU32,
    eos: AtomicBool,
}

impl PcmWave {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn new(channels: u16, mut samples: Vec<i16>) -> Self {
        let channels = channels.clamp(1, 2);
        let whole = samples.len() / channels as usize * channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            channels,
            loop_start: 0,
            loop_length: None,
            mode: LoopMode::Once,
            pos: AtomicUsize::new(0),
            passes: AtomicU32::new(0),
            eos: AtomicBool::new(false),
        }
    }

    /// A mono sine tone, handy for demos and tests.
    pub fn sine(frequency: f32, sample_rate: u32, seconds: f32, amplitude: f32) -> Self {
        let frames = (sample_rate as f32 * seconds) as usize;
        let amp = amplitude.clamp(0.0, 1.0) * i16::MAX as f32;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (amp * (t * frequency * std::f32::consts::TAU).sin()) as i16
            })
            .collect();
        Self::new(1, samples)
    }

    /// Loop region in frames. `length` of `None` loops to the end.
    pub fn with_loop(mut self, start: usize, length: Option<usize>, mode: LoopMode) -> Self {
        let frames = self.frames();
        self.loop_start = start.min(frames);
        self.loop_length = length.map(|len| len.min(frames - self.loop_start));
        self.mode = mode;
        self
    }

    /// Total frames in the buffer.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Current cursor position in frames.
    pub fn position(&self) -> usize {
        self.pos.load(Ordering::Acquire)
    }

    fn loop_end(&self) -> usize {
        match self.loop_length {
            Some(len) => self.loop_start + len,
            None => self.frames(),
        }
    }

    fn loops_again(&self, passes: u32) -> bool {
        match self.mode {
            LoopMode::Once => false,
            LoopMode::Times(n) => passes + 1 < n,
            LoopMode::Forever => true,
        }
    }
}

impl WaveSource for PcmWave {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&self, out: &mut [i16]) -> usize {
        if self.eos.load(Ordering::Acquire) {
            return 0;
        }
        let ch = self.channels as usize;
        let want = out.len() / ch;
        let mut pos = self.pos.load(Ordering::Acquire);
        let mut passes = self.passes.load(Ordering::Acquire);
        let mut written = 0;

        loop {
            let looping = self.loops_again(passes);
            let end = if looping { self.loop_end() } else { self.frames() };

            if pos >= end {
                // An empty loop region would spin forever.
                if looping && self.loop_end() > self.loop_start {
                    pos = self.loop_start;
                    passes = passes.saturating_add(1);
                    continue;
                }
                self.eos.store(true, Ordering::Release);
                break;
            }
            if written == want {
                break;
            }

            let n = (want - written).min(end - pos);
            out[written * ch..(written + n) * ch]
                .copy_from_slice(&self.samples[pos * ch..(pos + n) * ch]);
            written += n;
            pos += n;
        }

        self.pos.store(pos, Ordering::Release);
        self.passes.store(passes, Ordering::Release);
        written
    }

    fn is_eos(&self) -> bool {
        self.eos.load(Ordering::Acquire)
    }

    fn rewind(&self) {
        self.pos.store(0, Ordering::Release);
        self.passes.store(0, Ordering::Release);
        self.eos.store(false, Ordering::Release);
    }
}
