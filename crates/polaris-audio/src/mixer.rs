use crate::bridge::{AudioBridge, ChannelLayout, ChannelReader, PullOutcome, SoundChannel};

/// The real-time mixing callback: pulls every channel and sums them into one
/// interleaved buffer, clamped to [-1, 1].
///
/// All buffers are allocated in [`Mixer::new`]; `render` only reuses them.
pub struct Mixer {
    readers: Vec<ChannelReader>,
    layout: ChannelLayout,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(bridge: &AudioBridge, layout: ChannelLayout, max_block_frames: usize) -> Self {
        let max_block_frames = max_block_frames.max(1);
        Self {
            readers: SoundChannel::ALL
                .iter()
                .map(|&channel| bridge.reader(channel, max_block_frames))
                .collect(),
            layout,
            scratch: vec![0.0; max_block_frames * layout.channels().max(1)],
        }
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Fill `out` with the mix of all channels. Returns how many channels
    /// contributed samples.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let mut active = 0;
        for reader in &mut self.readers {
            let mut contributed = false;
            for block in out.chunks_mut(self.scratch.len()) {
                let scratch = &mut self.scratch[..block.len()];
                match reader.pull(scratch, self.layout) {
                    PullOutcome::Silence => break,
                    PullOutcome::Playing | PullOutcome::Finished => {
                        contributed = true;
                        for (o, s) in block.iter_mut().zip(scratch.iter()) {
                            *o += *s;
                        }
                    }
                }
            }
            if contributed {
                active += 1;
            }
        }
        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wave::{PcmWave, WaveSource};
    use std::sync::Arc;

    #[test]
    fn test_mix_sums_and_clamps() {
        let bridge = AudioBridge::new();
        let bgm: Arc<dyn WaveSource> = Arc::new(PcmWave::new(1, vec![16384; 8]));
        let se: Arc<dyn WaveSource> = Arc::new(PcmWave::new(1, vec![32767; 8]));
        bridge.play(SoundChannel::Bgm, &bgm);
        let mut mixer = Mixer::new(&bridge, ChannelLayout::STEREO, 16);

        let mut out = [0.0f32; 4];
        assert_eq!(mixer.render(&mut out), 1);
        assert!((out[0] - 0.5).abs() < 1e-3);
        assert_eq!(out[0], out[1]);

        bridge.play(SoundChannel::Se, &se);
        assert_eq!(mixer.render(&mut out), 2);
        assert_eq!(out, [1.0; 4]);
    }

    #[test]
    fn test_silent_mix() {
        let bridge = AudioBridge::new();
        let mut mixer = Mixer::new(&bridge, ChannelLayout::MONO, 4);
        let mut out = [0.3f32; 9];
        assert_eq!(mixer.render(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_blocks_larger_than_scratch() {
        let bridge = AudioBridge::new();
        let w: Arc<dyn WaveSource> = Arc::new(PcmWave::new(1, (0..40).collect()));
        bridge.play(SoundChannel::Voice, &w);
        let mut mixer = Mixer::new(&bridge, ChannelLayout::MONO, 8);

        let mut out = [0.0f32; 30];
        mixer.render(&mut out);
        assert_eq!(out[29], 29.0 / 32767.0);
    }
}
