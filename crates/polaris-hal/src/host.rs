//! The host context: one explicitly owned bundle of image cache,
//! compositor, audio bridge and storage, handed to the engine core as its
//! [`Platform`].

use std::sync::Arc;

use polaris_audio::{AudioBridge, SoundChannel, WaveSource};
use polaris_core::{contract_violation, FrameBuffer, PolarisConfig, PolarisError, PolarisResult, Quad, Rect};
use polaris_render::{ImageId, RenderPipeline};

use crate::engine::{EngineCore, InputEvent};
use crate::locale;
use crate::log::ErrorRing;
use crate::platform::{Capabilities, Platform};
use crate::storage::{self, Storage};
use crate::timer::{Clock, LapTimer, MonotonicClock};

/// Whether the frame loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Continue,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

pub struct Host {
    render: RenderPipeline,
    audio: AudioBridge,
    storage: Storage,
    clock: Arc<dyn Clock>,
    errors: ErrorRing,
    locale: String,
    capabilities: Capabilities,
    lifecycle: Lifecycle,
    frames: u64,
}

impl Host {
    /// Build every component from configuration.
    pub fn new(config: &PolarisConfig) -> PolarisResult<Self> {
        let render = RenderPipeline::new(&config.render)?;
        let storage = Storage::from_config(&config.storage)?;
        let mut host = Self::from_parts(render, storage, Arc::new(MonotonicClock::new()));
        host.errors = ErrorRing::new(config.logging.error_ring_capacity);
        host.locale = locale::resolve(&config.locale.fallback, config.locale.detect_from_env);
        tracing::info!(locale = host.locale, "host created");
        Ok(host)
    }

    /// Assemble a host from prepared components, with default logging and
    /// locale settings.
    pub fn from_parts(render: RenderPipeline, storage: Storage, clock: Arc<dyn Clock>) -> Self {
        let defaults = PolarisConfig::default();
        Self {
            render,
            audio: AudioBridge::new(),
            storage,
            clock,
            errors: ErrorRing::new(defaults.logging.error_ring_capacity),
            locale: defaults.locale.fallback,
            capabilities: Capabilities::HEADLESS,
            lifecycle: Lifecycle::Created,
            frames: 0,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn audio(&self) -> &AudioBridge {
        &self.audio
    }

    pub fn render(&self) -> &RenderPipeline {
        &self.render
    }

    pub fn errors(&self) -> &ErrorRing {
        &self.errors
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn read_frame(&mut self) -> PolarisResult<FrameBuffer> {
        self.render.read_frame()
    }

    /// Negotiate capabilities and initialise the core.
    pub fn init(&mut self, core: &mut dyn EngineCore) -> PolarisResult<FrameStatus> {
        if self.lifecycle != Lifecycle::Created {
            return Err(PolarisError::Contract("host initialised twice".to_string()));
        }
        let capabilities = self.capabilities;
        if !core.on_init(self, &capabilities) {
            tracing::warn!("engine core refused to start");
            self.lifecycle = Lifecycle::Stopped;
            return Ok(FrameStatus::Exit);
        }
        self.lifecycle = Lifecycle::Running;
        Ok(FrameStatus::Continue)
    }

    /// One frame: clear the command list, deliver input, step the core and
    /// submit what it drew.
    pub fn run_frame(
        &mut self,
        core: &mut dyn EngineCore,
        input: &[InputEvent],
    ) -> PolarisResult<FrameStatus> {
        if self.lifecycle != Lifecycle::Running {
            return Err(PolarisError::Contract(
                "run_frame called outside the running state".to_string(),
            ));
        }
        self.render.begin_frame();
        for event in input {
            event.dispatch(core);
        }
        let keep_going = core.on_frame(self);
        self.render.end_frame()?;
        self.frames += 1;

        if keep_going {
            Ok(FrameStatus::Continue)
        } else {
            tracing::info!(frames = self.frames, "engine core requested exit");
            Ok(FrameStatus::Exit)
        }
    }

    /// Let the core clean up and silence every channel.
    pub fn shutdown(&mut self, core: &mut dyn EngineCore) {
        if self.lifecycle == Lifecycle::Running {
            core.on_cleanup(self);
        }
        for channel in SoundChannel::ALL {
            self.audio.stop(channel);
        }
        self.lifecycle = Lifecycle::Stopped;
    }

    fn report(&mut self, result: PolarisResult<()>) {
        if let Err(err) = result {
            if err.is_contract_violation() {
                contract_violation(&err);
            } else {
                tracing::error!(error = %err, "platform operation failed");
            }
        }
    }
}

impl Platform for Host {
    fn log_info(&mut self, message: &str) {
        tracing::info!(target: "polaris::engine", "{message}");
    }

    fn log_warn(&mut self, message: &str) {
        tracing::warn!(target: "polaris::engine", "{message}");
    }

    fn log_error(&mut self, message: &str) {
        self.errors.push(message);
        tracing::debug!(target: "polaris::engine", "{message}");
    }

    fn make_sav_dir(&mut self) -> bool {
        match self.storage.make_sav_dir() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "could not prepare save area");
                false
            }
        }
    }

    fn make_valid_path(&self, dir: Option<&str>, file: Option<&str>, dst: &mut [u8]) -> usize {
        storage::make_valid_path(dir, file, dst)
    }

    fn check_file_exist(&self, name: &str) -> bool {
        self.storage.check_file_exist(name)
    }

    fn get_file_contents(&self, name: &str) -> Option<Vec<u8>> {
        self.storage.get_file_contents(name)
    }

    fn open_save_file(&mut self, name: &str) {
        self.storage.open_save_file(name);
    }

    fn write_save_file(&mut self, byte: u8) {
        self.storage.write_save_file(byte);
    }

    fn close_save_file(&mut self) {
        if let Err(e) = self.storage.close_save_file() {
            tracing::warn!(error = %e, "save stream not persisted");
        }
    }

    fn notify_image_update(&mut self, id: ImageId, width: u32, height: u32, pixels: &[u32]) {
        let result = self.render.update_image(id, width, height, pixels);
        self.report(result);
    }

    fn notify_image_free(&mut self, id: ImageId) {
        let result = self.render.free_image(id);
        self.report(result);
    }

    fn render_image_normal(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8) {
        let result = self.render.render_normal(dst, image, src, alpha);
        self.report(result);
    }

    fn render_image_add(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8) {
        let result = self.render.render_add(dst, image, src, alpha);
        self.report(result);
    }

    fn render_image_dim(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8) {
        let result = self.render.render_dim(dst, image, src, alpha);
        self.report(result);
    }

    fn render_image_rule(&mut self, image: ImageId, rule: ImageId, threshold: u8) {
        let result = self.render.render_rule(image, rule, threshold);
        self.report(result);
    }

    fn render_image_melt(&mut self, image: ImageId, rule: ImageId, progress: u8) {
        let result = self.render.render_melt(image, rule, progress);
        self.report(result);
    }

    fn render_image_3d_normal(&mut self, dst: Quad, image: ImageId, src: Rect, alpha: u8) {
        let result = self.render.render_3d_normal(dst, image, src, alpha);
        self.report(result);
    }

    fn render_image_3d_add(&mut self, dst: Quad, image: ImageId, src: Rect, alpha: u8) {
        let result = self.render.render_3d_add(dst, image, src, alpha);
        self.report(result);
    }

    fn reset_lap_timer(&self, timer: &mut LapTimer) {
        timer.reset(self.clock.as_ref());
    }

    fn get_lap_timer_millisec(&self, timer: &LapTimer) -> i64 {
        timer.elapsed_millis(self.clock.as_ref())
    }

    fn play_sound(&mut self, channel: SoundChannel, wave: &Arc<dyn WaveSource>) {
        self.audio.play(channel, wave);
    }

    fn stop_sound(&mut self, channel: SoundChannel) {
        self.audio.stop(channel);
    }

    // Volume is not implemented on this host.
    fn set_sound_volume(&mut self, channel: SoundChannel, volume: f32) {
        tracing::trace!(?channel, volume, "sound volume ignored");
    }

    // Finished-query is not implemented on this host.
    fn is_sound_finished(&self, _channel: SoundChannel) -> bool {
        true
    }

    fn play_video(&mut self, file: &str, skippable: bool) -> bool {
        tracing::debug!(file, skippable, "video playback unsupported, skipping");
        true
    }

    fn stop_video(&mut self) {}

    fn is_video_playing(&self) -> bool {
        false
    }

    fn update_window_title(&mut self) {}

    fn is_full_screen_supported(&self) -> bool {
        false
    }

    fn is_full_screen_mode(&self) -> bool {
        false
    }

    fn enter_full_screen_mode(&mut self) {}

    fn leave_full_screen_mode(&mut self) {}

    fn get_system_locale(&self) -> &str {
        &self.locale
    }

    fn speak_text(&mut self, _text: Option<&str>) {}

    fn set_continuous_swipe_enabled(&mut self, _enabled: bool) {}

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
