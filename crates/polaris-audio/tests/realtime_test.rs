use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use polaris_audio::{AudioBridge, ChannelLayout, Mixer, PcmWave, PullOutcome, SoundChannel, WaveSource};

#[test]
fn test_concurrent_play_stop_and_drop_never_crash() {
    let bridge = AudioBridge::new();
    let mut reader = bridge.reader(SoundChannel::Bgm, 256);
    let running = Arc::new(AtomicBool::new(true));

    let rt_running = Arc::clone(&running);
    let rt = thread::spawn(move || {
        let mut out = vec![0.0f32; 512];
        let mut pulls = 0u64;
        while rt_running.load(Ordering::Acquire) {
            reader.pull(&mut out, ChannelLayout::STEREO);
            // Every sample is either silence or the constant the waves carry.
            assert!(out.iter().all(|&s| s == 0.0 || s == 8000.0 / 32767.0));
            pulls += 1;
        }
        pulls
    });

    for i in 0..2000 {
        let wave: Arc<dyn WaveSource> = Arc::new(PcmWave::new(1, vec![8000; 300]));
        bridge.play(SoundChannel::Bgm, &wave);
        if i % 3 == 0 {
            bridge.stop(SoundChannel::Bgm);
        }
        // The wave is dropped here while the reader may still hold it.
    }
    running.store(false, Ordering::Release);
    let pulls = rt.join().expect("real-time thread panicked");
    assert!(pulls > 0);
}

#[test]
fn test_finished_wave_stays_finished_across_threads() {
    let bridge = AudioBridge::new();
    let wave: Arc<dyn WaveSource> = Arc::new(PcmWave::new(2, vec![1000; 200]));
    bridge.play(SoundChannel::Voice, &wave);
    let mut reader = bridge.reader(SoundChannel::Voice, 64);

    let outcomes = thread::spawn(move || {
        let mut out = [0.0f32; 64];
        (0..10)
            .map(|_| reader.pull(&mut out, ChannelLayout::STEREO))
            .collect::<Vec<_>>()
    })
    .join()
    .expect("pull thread panicked");

    // 100 stereo frames, 32 per pull: three full pulls, then the end.
    assert_eq!(&outcomes[..3], &[PullOutcome::Playing; 3]);
    assert_eq!(outcomes[3], PullOutcome::Finished);
    assert!(outcomes[4..].iter().all(|&o| o == PullOutcome::Silence));
    assert_eq!(bridge.eos_count(SoundChannel::Voice), 1);
    assert!(!bridge.is_assigned(SoundChannel::Voice));
}

#[test]
fn test_mixer_runs_on_its_own_thread() {
    let bridge = AudioBridge::new();
    let wave: Arc<dyn WaveSource> = Arc::new(PcmWave::sine(440.0, 44100, 0.1, 0.5));
    bridge.play(SoundChannel::Bgm, &wave);
    let mut mixer = Mixer::new(&bridge, ChannelLayout::STEREO, 512);

    let peak = thread::spawn(move || {
        let mut out = vec![0.0f32; 1024];
        let mut peak = 0.0f32;
        for _ in 0..4 {
            mixer.render(&mut out);
            peak = out.iter().fold(peak, |p, s| p.max(s.abs()));
        }
        peak
    })
    .join()
    .expect("mixer thread panicked");

    assert!(peak > 0.4 && peak <= 0.5 + 1e-3, "peak {peak}");
    drop(wave);
}
