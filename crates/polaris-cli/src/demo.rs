//! A small built-in engine core used by `polaris run`.
//!
//! It exercises every draw mode over a fixed timeline: a backdrop, a warped
//! panel and a sprite with a glow, a dimmed message band, then a rule wipe
//! and a melt into a second backdrop. A looping tone plays on the BGM channel.

use std::sync::Arc;

use polaris_audio::{LoopMode, PcmWave, SoundChannel, WaveSource};
use polaris_core::{Quad, Rect, Viewport};
use polaris_hal::{Capabilities, EngineCore, Key, LapTimer, Platform};

pub const BACKDROP_A: i32 = 1;
pub const BACKDROP_B: i32 = 2;
pub const SPRITE: i32 = 3;
pub const RULE: i32 = 4;

const SPRITE_SIZE: u32 = 128;
const RUN_COUNTER: &str = "sav/demo.sav";

pub struct DemoCore {
    viewport: Viewport,
    total_frames: u64,
    frame: u64,
    sample_rate: u32,
    bgm: Option<Arc<dyn WaveSource>>,
    lap: LapTimer,
    runs: u32,
    skip: bool,
    quit: bool,
}

impl DemoCore {
    pub fn new(viewport: Viewport, total_frames: u64, sample_rate: u32) -> Self {
        Self {
            viewport,
            total_frames: total_frames.max(1),
            frame: 0,
            sample_rate,
            bgm: None,
            lap: LapTimer::default(),
            runs: 0,
            skip: false,
            quit: false,
        }
    }

    pub fn frames_run(&self) -> u64 {
        self.frame
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Timeline position in [0, 1].
    fn progress(&self) -> f32 {
        if self.skip || self.total_frames == 1 {
            return 1.0;
        }
        self.frame.min(self.total_frames - 1) as f32 / (self.total_frames - 1) as f32
    }

    fn full(&self) -> Rect {
        Rect::new(0, 0, self.viewport.width as i32, self.viewport.height as i32)
    }

    fn upload_images(&self, platform: &mut dyn Platform) {
        let (w, h) = (self.viewport.width, self.viewport.height);
        platform.notify_image_update(BACKDROP_A, w, h, &gradient(w, h, [255, 180, 90], [120, 40, 90]));
        platform.notify_image_update(BACKDROP_B, w, h, &gradient(w, h, [40, 90, 200], [10, 20, 60]));
        platform.notify_image_update(SPRITE, SPRITE_SIZE, SPRITE_SIZE, &disc(SPRITE_SIZE));
        platform.notify_image_update(RULE, w, h, &diagonal_rule(w, h));
    }

    fn draw_sprite(&self, platform: &mut dyn Platform, p: f32) {
        let (vw, vh) = (self.viewport.width as f32, self.viewport.height as f32);
        let cx = vw * (0.25 + 0.5 * p);
        let cy = vh * 0.45;
        let alpha = (255.0 * (p * 4.0).min(1.0)) as u8;

        // A skewed panel onto the second backdrop. Warped draws take their
        // UVs from the corners, so the panel shows the area it covers.
        let half = vh * 0.3;
        let skew = (p * std::f32::consts::TAU).sin() * half * 0.5;
        let panel = Quad::from_coords([
            (cx - half + skew, cy - half),
            (cx + half + skew, cy - half),
            (cx - half, cy + half),
            (cx + half, cy + half),
        ]);
        let full = self.full();
        platform.render_image_3d_normal(panel, BACKDROP_B, full, alpha / 2);
        platform.render_image_3d_add(panel, BACKDROP_B, full, alpha / 4);

        let src = Rect::new(0, 0, SPRITE_SIZE as i32, SPRITE_SIZE as i32);
        let size = SPRITE_SIZE as i32;
        let sprite = Rect::new(cx as i32 - size / 2, cy as i32 - size / 2, size, size);
        platform.render_image_normal(sprite, SPRITE, src, alpha);

        let glow = Rect::new(cx as i32 - 32, cy as i32 + size / 2, 64, 16);
        platform.render_image_add(glow, SPRITE, src, alpha / 2);
    }

    fn draw_message_band(&self, platform: &mut dyn Platform) {
        let (w, h) = (self.viewport.width as i32, self.viewport.height as i32);
        let band = Rect::new(w / 16, h * 3 / 4, w - w / 8, h / 5);
        platform.render_image_dim(band, BACKDROP_A, band, 255);
    }
}

impl EngineCore for DemoCore {
    fn on_init(&mut self, platform: &mut dyn Platform, capabilities: &Capabilities) -> bool {
        if !capabilities.additive_blend {
            platform.log_warn("additive blending falls back to normal blending");
        }
        platform.make_sav_dir();
        self.runs = platform
            .get_file_contents(RUN_COUNTER)
            .and_then(|bytes| bytes.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            .unwrap_or(0)
            + 1;

        self.upload_images(platform);

        let tone = PcmWave::sine(220.0, self.sample_rate, 1.0, 0.2).with_loop(0, None, LoopMode::Forever);
        let bgm: Arc<dyn WaveSource> = Arc::new(tone);
        platform.play_sound(SoundChannel::Bgm, &bgm);
        self.bgm = Some(bgm);

        platform.reset_lap_timer(&mut self.lap);
        let message = format!(
            "demo core started (run {}, locale {})",
            self.runs,
            platform.get_system_locale()
        );
        platform.log_info(&message);
        true
    }

    fn on_frame(&mut self, platform: &mut dyn Platform) -> bool {
        let p = self.progress();
        let full = self.full();

        platform.render_image_normal(full, BACKDROP_A, full, 255);
        if p < 0.8 {
            self.draw_sprite(platform, p);
        }
        self.draw_message_band(platform);

        if (0.5..0.8).contains(&p) {
            let threshold = ((p - 0.5) / 0.3 * 255.0) as u8;
            platform.render_image_rule(BACKDROP_B, RULE, threshold);
        } else if p >= 0.8 {
            let progress = ((p - 0.8) / 0.2 * 255.0).round() as u8;
            platform.render_image_melt(BACKDROP_B, RULE, progress);
        }

        self.frame += 1;
        !(self.quit || self.skip) && self.frame < self.total_frames
    }

    fn on_cleanup(&mut self, platform: &mut dyn Platform) {
        platform.stop_sound(SoundChannel::Bgm);
        self.bgm = None;

        platform.open_save_file(RUN_COUNTER);
        for byte in self.runs.to_le_bytes() {
            platform.write_save_file(byte);
        }
        platform.close_save_file();

        let elapsed = platform.get_lap_timer_millisec(&self.lap);
        platform.log_info(&format!("demo core finished {} frames in {elapsed} ms", self.frame));
    }

    fn on_key_press(&mut self, key: Key) {
        match key {
            Key::Space | Key::Return => self.skip = true,
            Key::Escape => self.quit = true,
            _ => {}
        }
    }
}

fn argb(rgb: [u8; 3], a: u8) -> u32 {
    (a as u32) << 24 | (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

/// Vertical gradient, opaque.
fn gradient(w: u32, h: u32, top: [u8; 3], bottom: [u8; 3]) -> Vec<u32> {
    let mut pixels = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        let t = y as f32 / h.saturating_sub(1).max(1) as f32;
        let row = argb([lerp(top[0], bottom[0], t), lerp(top[1], bottom[1], t), lerp(top[2], bottom[2], t)], 255);
        pixels.extend(std::iter::repeat(row).take(w as usize));
    }
    pixels
}

/// A white disc with a soft edge on a transparent square.
fn disc(size: u32) -> Vec<u32> {
    let r = size as f32 / 2.0;
    (0..size * size)
        .map(|i| {
            let dx = (i % size) as f32 + 0.5 - r;
            let dy = (i / size) as f32 + 0.5 - r;
            let d = (dx * dx + dy * dy).sqrt();
            let a = ((r - d) / 4.0).clamp(0.0, 1.0);
            argb([255, 250, 235], (a * 255.0) as u8)
        })
        .collect()
}

/// Grey ramp from the top-left corner to the bottom-right one.
fn diagonal_rule(w: u32, h: u32) -> Vec<u32> {
    let span = (w + h).saturating_sub(2).max(1) as f32;
    (0..w * h)
        .map(|i| {
            let v = (((i % w) + (i / w)) as f32 / span * 255.0) as u8;
            argb([v, v, v], 255)
        })
        .collect()
}
