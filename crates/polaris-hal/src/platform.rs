//! The services the presentation layer offers the engine core.

use std::sync::Arc;

use polaris_audio::{SoundChannel, WaveSource};
use polaris_core::{Quad, Rect};
use polaris_render::ImageId;
use serde::Serialize;

use crate::timer::LapTimer;

/// What this platform actually implements, handed to the core once at
/// startup. Everything reported `false` still answers with a fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub video: bool,
    pub full_screen: bool,
    pub sound_volume: bool,
    pub sound_finished_query: bool,
    pub speech: bool,
    /// `false` while the additive modes draw with normal blending.
    pub additive_blend: bool,
}

impl Capabilities {
    /// The headless desktop host: none of the optional services.
    pub const HEADLESS: Capabilities = Capabilities {
        video: false,
        full_screen: false,
        sound_volume: false,
        sound_finished_query: false,
        speech: false,
        additive_blend: false,
    };

    /// Capability names paired with their state, in a stable order.
    pub fn table(&self) -> [(&'static str, bool); 6] {
        [
            ("video", self.video),
            ("full_screen", self.full_screen),
            ("sound_volume", self.sound_volume),
            ("sound_finished_query", self.sound_finished_query),
            ("speech", self.speech),
            ("additive_blend", self.additive_blend),
        ]
    }
}

/// Calls from the engine core into the presentation layer.
///
/// Every call is synchronous and made from the main thread. Draws and image
/// mutations take effect in call order.
pub trait Platform {
    fn log_info(&mut self, message: &str);
    fn log_warn(&mut self, message: &str);
    /// Captured for the host, never shown to the user.
    fn log_error(&mut self, message: &str);

    fn make_sav_dir(&mut self) -> bool;
    fn make_valid_path(&self, dir: Option<&str>, file: Option<&str>, dst: &mut [u8]) -> usize;
    fn check_file_exist(&self, name: &str) -> bool;
    fn get_file_contents(&self, name: &str) -> Option<Vec<u8>>;
    fn open_save_file(&mut self, name: &str);
    fn write_save_file(&mut self, byte: u8);
    fn close_save_file(&mut self);

    /// `pixels` are ARGB words, row-major, `width * height` long.
    fn notify_image_update(&mut self, id: ImageId, width: u32, height: u32, pixels: &[u32]);
    fn notify_image_free(&mut self, id: ImageId);

    fn render_image_normal(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8);
    fn render_image_add(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8);
    fn render_image_dim(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8);
    fn render_image_rule(&mut self, image: ImageId, rule: ImageId, threshold: u8);
    fn render_image_melt(&mut self, image: ImageId, rule: ImageId, progress: u8);
    fn render_image_3d_normal(&mut self, dst: Quad, image: ImageId, src: Rect, alpha: u8);
    fn render_image_3d_add(&mut self, dst: Quad, image: ImageId, src: Rect, alpha: u8);

    fn reset_lap_timer(&self, timer: &mut LapTimer);
    fn get_lap_timer_millisec(&self, timer: &LapTimer) -> i64;

    /// The platform keeps only a weak reference to `wave`.
    fn play_sound(&mut self, channel: SoundChannel, wave: &Arc<dyn WaveSource>);
    fn stop_sound(&mut self, channel: SoundChannel);
    fn set_sound_volume(&mut self, channel: SoundChannel, volume: f32);
    fn is_sound_finished(&self, channel: SoundChannel) -> bool;

    fn play_video(&mut self, file: &str, skippable: bool) -> bool;
    fn stop_video(&mut self);
    fn is_video_playing(&self) -> bool;

    fn update_window_title(&mut self);
    fn is_full_screen_supported(&self) -> bool;
    fn is_full_screen_mode(&self) -> bool;
    fn enter_full_screen_mode(&mut self);
    fn leave_full_screen_mode(&mut self);

    fn get_system_locale(&self) -> &str;
    fn speak_text(&mut self, text: Option<&str>);
    fn set_continuous_swipe_enabled(&mut self, enabled: bool);

    fn capabilities(&self) -> Capabilities;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_table_is_all_gaps() {
        let table = Capabilities::HEADLESS.table();
        assert_eq!(table.len(), 6);
        assert!(table.iter().all(|(_, on)| !on));
        assert_eq!(table[5].0, "additive_blend");
    }
}
