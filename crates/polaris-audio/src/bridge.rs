//! Per-channel wave references shared between the control side and the
//! real-time pull side.
//!
//! The control side writes a slot under a short lock and bumps the slot's
//! generation. The real-time side only ever `try_lock`s: when the generation
//! moved it adopts the new reference into its own local copy. If the lock
//! happens to be held, the reference it had may already be stopped, so that
//! pull is silent and the adoption is retried next pull.
//! Every pull upgrades the local weak reference once and samples from that
//! captured `Arc`, so a concurrent `stop` can never pull the source out from
//! under a pull in progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::wave::WaveSource;

/// The fixed set of playback channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundChannel {
    Bgm,
    Se,
    Voice,
    System,
}

impl SoundChannel {
    pub const ALL: [SoundChannel; 4] = [
        SoundChannel::Bgm,
        SoundChannel::Se,
        SoundChannel::Voice,
        SoundChannel::System,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Engine stream number to channel: 0 BGM, 1 SE, 2 voice, anything
    /// else the system channel.
    pub fn from_stream(stream: i32) -> Self {
        match stream {
            0 => SoundChannel::Bgm,
            1 => SoundChannel::Se,
            2 => SoundChannel::Voice,
            _ => SoundChannel::System,
        }
    }
}

/// Interleaved output channel count requested by the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout(pub u16);

impl ChannelLayout {
    pub const MONO: ChannelLayout = ChannelLayout(1);
    pub const STEREO: ChannelLayout = ChannelLayout(2);

    pub fn channels(self) -> usize {
        self.0 as usize
    }
}

/// What a single pull produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Nothing assigned, or the source is gone. Output is silence.
    Silence,
    /// Samples were written and the source has more.
    Playing,
    /// The source reached end-of-stream during this pull and the channel
    /// dropped its reference. Any frames past the end are silence.
    Finished,
}

#[derive(Default)]
struct Slot {
    wave: Mutex<Option<Weak<dyn WaveSource>>>,
    generation: AtomicU64,
    eos_count: AtomicU64,
}

struct Slots([Slot; 4]);

impl Slots {
    fn get(&self, channel: SoundChannel) -> &Slot {
        &self.0[channel.index()]
    }
}

/// Control-side handle, owned by the main thread.
pub struct AudioBridge {
    slots: Arc<Slots>,
}

impl Default for AudioBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBridge {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Slots(Default::default())),
        }
    }

    /// Point `channel` at `wave`. The bridge keeps only a weak reference;
    /// the caller must keep the wave alive for as long as it should play.
    pub fn play(&self, channel: SoundChannel, wave: &Arc<dyn WaveSource>) {
        self.assign(channel, Some(Arc::downgrade(wave)));
        tracing::debug!(?channel, "sound assigned");
    }

    pub fn stop(&self, channel: SoundChannel) {
        self.assign(channel, None);
        tracing::debug!(?channel, "sound stopped");
    }

    fn assign(&self, channel: SoundChannel, wave: Option<Weak<dyn WaveSource>>) {
        let slot = self.slots.get(channel);
        let old = {
            let mut guard = slot.wave.lock();
            let old = std::mem::replace(&mut *guard, wave);
            slot.generation.fetch_add(1, Ordering::Release);
            old
        };
        // Dropped outside the lock.
        drop(old);
    }

    /// Whether the channel's shared slot still references a live wave.
    pub fn is_assigned(&self, channel: SoundChannel) -> bool {
        self.slots
            .get(channel)
            .wave
            .lock()
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// How many times the real-time side has seen this channel's source end.
    pub fn eos_count(&self, channel: SoundChannel) -> u64 {
        self.slots.get(channel).eos_count.load(Ordering::Acquire)
    }

    /// Create the real-time reader for `channel`.
    ///
    /// `max_block_frames` sizes the reader's scratch buffer; larger pulls
    /// are processed in several passes.
    pub fn reader(&self, channel: SoundChannel, max_block_frames: usize) -> ChannelReader {
        ChannelReader {
            slots: Arc::clone(&self.slots),
            channel,
            seen_generation: 0,
            wave: None,
            clear_pending: false,
            scratch: vec![0; max_block_frames.max(1) * 2],
        }
    }
}

/// Real-time side of one channel. Owned by the audio callback.
pub struct ChannelReader {
    slots: Arc<Slots>,
    channel: SoundChannel,
    seen_generation: u64,
    wave: Option<Weak<dyn WaveSource>>,
    /// End-of-stream seen while the slot lock was held.
    clear_pending: bool,
    scratch: Vec<i16>,
}

impl ChannelReader {
    pub fn channel(&self) -> SoundChannel {
        self.channel
    }

    /// Adopt the shared slot if the control side changed it.
    fn refresh(&mut self) {
        let slot = self.slots.get(self.channel);
        if slot.generation.load(Ordering::Acquire) == self.seen_generation {
            if self.clear_pending {
                self.clear_shared();
            }
            return;
        }
        match slot.wave.try_lock() {
            Some(guard) => {
                self.wave = (*guard).clone();
                self.seen_generation = slot.generation.load(Ordering::Acquire);
                self.clear_pending = false;
            }
            None => self.wave = None,
        }
    }

    /// Fill `out` with `out.len() / layout` interleaved frames as `f32`.
    ///
    /// Samples are normalized as `s / 32767.0`. A mono source is copied to
    /// every output channel. A multi-channel source feeding mono output is
    /// averaged; extra output channels beyond the source's are silent.
    pub fn pull(&mut self, out: &mut [f32], layout: ChannelLayout) -> PullOutcome {
        self.refresh();

        let out_ch = layout.channels();
        let Some(wave) = self.wave.as_ref().and_then(Weak::upgrade) else {
            self.wave = None;
            out.fill(0.0);
            return PullOutcome::Silence;
        };
        if out_ch == 0 {
            return PullOutcome::Silence;
        }

        let frames = out.len() / out_ch;
        let src_ch = wave.channels().clamp(1, 2) as usize;
        let chunk = self.scratch.len() / src_ch;
        let mut done = 0;
        while done < frames {
            let want = (frames - done).min(chunk);
            let got = wave.read(&mut self.scratch[..want * src_ch]);
            convert_frames(
                &self.scratch[..got * src_ch],
                src_ch,
                &mut out[done * out_ch..(done + got) * out_ch],
                out_ch,
            );
            done += got;
            if got < want {
                break;
            }
        }
        out[done * out_ch..].fill(0.0);

        if wave.is_eos() {
            self.finish();
            return PullOutcome::Finished;
        }
        PullOutcome::Playing
    }

    /// Drop the local reference and, if the control side has not reassigned
    /// the channel meanwhile, the shared one too.
    fn finish(&mut self) {
        self.wave = None;
        self.clear_pending = true;
        self.clear_shared();
        self.slots
            .get(self.channel)
            .eos_count
            .fetch_add(1, Ordering::AcqRel);
    }

    fn clear_shared(&mut self) {
        let slot = self.slots.get(self.channel);
        if let Some(mut guard) = slot.wave.try_lock() {
            if slot.generation.load(Ordering::Acquire) == self.seen_generation {
                *guard = None;
            }
            self.clear_pending = false;
        }
    }
}

fn convert_frames(src: &[i16], src_ch: usize, dst: &mut [f32], dst_ch: usize) {
    for (frame, out) in src.chunks_exact(src_ch).zip(dst.chunks_exact_mut(dst_ch)) {
        if src_ch == 1 {
            out.fill(frame[0] as f32 / 32767.0);
        } else if dst_ch == 1 {
            let sum: f32 = frame.iter().map(|&s| s as f32 / 32767.0).sum();
            out[0] = sum / src_ch as f32;
        } else {
            for (i, o) in out.iter_mut().enumerate() {
                *o = frame.get(i).map_or(0.0, |&s| s as f32 / 32767.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wave::PcmWave;

    fn wave(channels: u16, samples: Vec<i16>) -> Arc<dyn WaveSource> {
        Arc::new(PcmWave::new(channels, samples))
    }

    #[test]
    fn test_stream_mapping() {
        assert_eq!(SoundChannel::from_stream(0), SoundChannel::Bgm);
        assert_eq!(SoundChannel::from_stream(1), SoundChannel::Se);
        assert_eq!(SoundChannel::from_stream(2), SoundChannel::Voice);
        assert_eq!(SoundChannel::from_stream(3), SoundChannel::System);
        assert_eq!(SoundChannel::from_stream(-1), SoundChannel::System);
    }

    #[test]
    fn test_unassigned_pull_is_silence() {
        let bridge = AudioBridge::new();
        let mut reader = bridge.reader(SoundChannel::Bgm, 64);
        let mut out = [1.0f32; 10];
        assert_eq!(reader.pull(&mut out, ChannelLayout::STEREO), PullOutcome::Silence);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mono_to_stereo_normalization() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![32767, -32767, 0, 16384]);
        bridge.play(SoundChannel::Se, &w);
        let mut reader = bridge.reader(SoundChannel::Se, 64);

        let mut out = [0.0f32; 4];
        assert_eq!(reader.pull(&mut out, ChannelLayout::STEREO), PullOutcome::Playing);
        assert_eq!(out, [1.0, 1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let bridge = AudioBridge::new();
        let w = wave(2, vec![32767, 0, 32767, 32767, 0, 0]);
        bridge.play(SoundChannel::Voice, &w);
        let mut reader = bridge.reader(SoundChannel::Voice, 64);

        let mut out = [0.0f32; 2];
        reader.pull(&mut out, ChannelLayout::MONO);
        assert_eq!(out, [0.5, 1.0]);
    }

    #[test]
    fn test_eos_clears_exactly_once() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![100; 5]);
        bridge.play(SoundChannel::Bgm, &w);
        let mut reader = bridge.reader(SoundChannel::Bgm, 64);

        let mut out = [0.0f32; 8];
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Finished);
        assert!(out[..5].iter().all(|&s| s > 0.0));
        assert!(out[5..].iter().all(|&s| s == 0.0));
        assert!(!bridge.is_assigned(SoundChannel::Bgm));

        for _ in 0..3 {
            assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Silence);
            assert!(out.iter().all(|&s| s == 0.0));
        }
        assert_eq!(bridge.eos_count(SoundChannel::Bgm), 1);
    }

    #[test]
    fn test_play_then_stop_before_pull() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![1000; 64]);
        let mut reader = bridge.reader(SoundChannel::Bgm, 64);
        bridge.play(SoundChannel::Bgm, &w);
        bridge.stop(SoundChannel::Bgm);

        let mut out = [1.0f32; 16];
        assert_eq!(reader.pull(&mut out, ChannelLayout::STEREO), PullOutcome::Silence);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stop_while_slot_is_locked_is_silent() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![1000; 64]);
        bridge.play(SoundChannel::Bgm, &w);
        let mut reader = bridge.reader(SoundChannel::Bgm, 64);
        let mut out = [0.0f32; 4];
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Playing);

        bridge.stop(SoundChannel::Bgm);
        {
            let _held = bridge.slots.get(SoundChannel::Bgm).wave.lock();
            assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Silence);
            assert_eq!(out, [0.0; 4]);
        }
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Silence);

        bridge.play(SoundChannel::Bgm, &w);
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Playing);
    }

    #[test]
    fn test_eos_while_slot_is_locked_clears_on_next_pull() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![100; 6]);
        bridge.play(SoundChannel::Se, &w);
        let mut reader = bridge.reader(SoundChannel::Se, 64);
        let mut out = [0.0f32; 4];
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Playing);

        {
            let _held = bridge.slots.get(SoundChannel::Se).wave.lock();
            assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Finished);
        }
        assert!(bridge.is_assigned(SoundChannel::Se));
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Silence);
        assert!(!bridge.is_assigned(SoundChannel::Se));
        assert_eq!(bridge.eos_count(SoundChannel::Se), 1);
    }

    #[test]
    fn test_dropped_wave_degrades_to_silence() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![1000; 64]);
        bridge.play(SoundChannel::System, &w);
        let mut reader = bridge.reader(SoundChannel::System, 64);
        let mut out = [0.0f32; 4];
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Playing);

        drop(w);
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Silence);
        assert!(!bridge.is_assigned(SoundChannel::System));
    }

    #[test]
    fn test_pull_larger_than_scratch() {
        let bridge = AudioBridge::new();
        let w = wave(1, (0..100).map(|i| i as i16).collect());
        bridge.play(SoundChannel::Bgm, &w);
        let mut reader = bridge.reader(SoundChannel::Bgm, 7);

        let mut out = [0.0f32; 50];
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Playing);
        assert_eq!(out[49], 49.0 / 32767.0);
    }

    #[test]
    fn test_replay_after_finish() {
        let bridge = AudioBridge::new();
        let w = wave(1, vec![10; 2]);
        bridge.play(SoundChannel::Se, &w);
        let mut reader = bridge.reader(SoundChannel::Se, 16);
        let mut out = [0.0f32; 4];
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Finished);

        w.rewind();
        bridge.play(SoundChannel::Se, &w);
        assert_eq!(reader.pull(&mut out, ChannelLayout::MONO), PullOutcome::Finished);
        assert_eq!(out[0], 10.0 / 32767.0);
        assert_eq!(bridge.eos_count(SoundChannel::Se), 2);
    }
}
