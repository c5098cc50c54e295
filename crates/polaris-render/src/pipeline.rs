use std::sync::Arc;

use polaris_core::{
    BackendKind, FrameBuffer, PolarisError, PolarisResult, Quad, Rect, RenderConfig, Viewport,
};

use crate::backend::RenderBackend;
use crate::compositor::{Compositor, DrawCommand};
use crate::cpu::CpuBackend;
use crate::gpu::GpuContext;
use crate::gpu_backend::GpuBackend;
use crate::image_cache::{ImageCache, ImageId};

/// The render half of the bridge context: image cache, compositor and the
/// backend they feed, owned together so draws can borrow all three.
pub struct RenderPipeline {
    cache: ImageCache,
    compositor: Compositor,
    backend: Box<dyn RenderBackend>,
    frames_submitted: u64,
}

impl RenderPipeline {
    /// Build from configuration, creating the requested backend.
    pub fn new(config: &RenderConfig) -> PolarisResult<Self> {
        let viewport = config.viewport();
        let clear = config.clear_color()?;

        let backend: Box<dyn RenderBackend> = match config.backend {
            BackendKind::Cpu => Box::new(CpuBackend::new(viewport, clear)),
            BackendKind::Gpu => {
                let gpu = GpuContext::init().map_err(|e| PolarisError::Gpu(e.to_string()))?;
                Box::new(GpuBackend::new(Arc::new(gpu), viewport, clear))
            }
            BackendKind::Auto => match GpuContext::init() {
                Ok(gpu) => Box::new(GpuBackend::new(Arc::new(gpu), viewport, clear)),
                Err(e) => {
                    tracing::warn!(error = %e, "GPU unavailable, falling back to CPU backend");
                    Box::new(CpuBackend::new(viewport, clear))
                }
            },
        };

        tracing::info!(
            backend = backend.name(),
            width = viewport.width,
            height = viewport.height,
            "render pipeline ready"
        );
        Ok(Self::with_backend(viewport, backend))
    }

    pub fn with_backend(viewport: Viewport, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            cache: ImageCache::new(),
            compositor: Compositor::new(viewport),
            backend,
            frames_submitted: 0,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.compositor.viewport()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn commands(&self) -> &[DrawCommand] {
        self.compositor.commands()
    }

    pub fn upload_count(&self) -> u64 {
        self.backend.upload_count()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn update_image(
        &mut self,
        id: ImageId,
        width: u32,
        height: u32,
        pixels: &[u32],
    ) -> PolarisResult<()> {
        self.cache.update(id, width, height, pixels)
    }

    pub fn free_image(&mut self, id: ImageId) -> PolarisResult<()> {
        self.cache.free(id, self.backend.as_mut())
    }

    /// Drop the previous frame's commands. Anything queued but never
    /// submitted is discarded along with the textures it kept alive.
    pub fn begin_frame(&mut self) {
        self.cache.settle(self.backend.as_mut());
        self.compositor.begin_frame();
    }

    pub fn render_normal(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8) -> PolarisResult<()> {
        self.compositor
            .render_normal(&mut self.cache, self.backend.as_mut(), dst, image, src, alpha)
    }

    pub fn render_add(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8) -> PolarisResult<()> {
        self.compositor
            .render_add(&mut self.cache, self.backend.as_mut(), dst, image, src, alpha)
    }

    pub fn render_dim(&mut self, dst: Rect, image: ImageId, src: Rect, alpha: u8) -> PolarisResult<()> {
        self.compositor
            .render_dim(&mut self.cache, self.backend.as_mut(), dst, image, src, alpha)
    }

    pub fn render_rule(&mut self, image: ImageId, rule: ImageId, threshold: u8) -> PolarisResult<()> {
        self.compositor
            .render_rule(&mut self.cache, self.backend.as_mut(), image, rule, threshold)
    }

    pub fn render_melt(&mut self, image: ImageId, rule: ImageId, progress: u8) -> PolarisResult<()> {
        self.compositor
            .render_melt(&mut self.cache, self.backend.as_mut(), image, rule, progress)
    }

    pub fn render_3d_normal(&mut self, dst: Quad, image: ImageId, src: Rect, alpha: u8) -> PolarisResult<()> {
        self.compositor
            .render_3d_normal(&mut self.cache, self.backend.as_mut(), dst, image, src, alpha)
    }

    pub fn render_3d_add(&mut self, dst: Quad, image: ImageId, src: Rect, alpha: u8) -> PolarisResult<()> {
        self.compositor
            .render_3d_add(&mut self.cache, self.backend.as_mut(), dst, image, src, alpha)
    }

    /// Submit the accumulated command list.
    pub fn end_frame(&mut self) -> PolarisResult<()> {
        let submitted = self.backend.submit(self.compositor.commands());
        self.cache.settle(self.backend.as_mut());
        submitted?;
        self.frames_submitted += 1;
        tracing::trace!(
            frame = self.frames_submitted,
            draws = self.compositor.commands().len(),
            "frame submitted"
        );
        Ok(())
    }

    pub fn read_frame(&mut self) -> PolarisResult<FrameBuffer> {
        self.backend.read_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_pipeline_from_config() {
        let config = RenderConfig {
            viewport_width: 32,
            viewport_height: 16,
            clear_color: "#FFFFFF".to_string(),
            ..Default::default()
        };
        let mut pipeline = RenderPipeline::new(&config).unwrap();
        assert_eq!(pipeline.backend_name(), "cpu");

        pipeline.begin_frame();
        pipeline.end_frame().unwrap();
        let frame = pipeline.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.get_pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(pipeline.frames_submitted(), 1);
    }

    #[test]
    fn test_free_releases_backend_texture() {
        let config = RenderConfig {
            viewport_width: 8,
            viewport_height: 8,
            ..Default::default()
        };
        let mut pipeline = RenderPipeline::new(&config).unwrap();
        pipeline.update_image(3, 1, 1, &[0xFFFFFFFF]).unwrap();
        pipeline
            .render_normal(Rect::new(0, 0, 8, 8), 3, Rect::new(0, 0, 1, 1), 255)
            .unwrap();
        pipeline.free_image(3).unwrap();
        assert!(!pipeline.cache().contains(3));
        assert!(pipeline.free_image(3).is_err());
        assert_eq!(pipeline.cache().retired_count(), 1);

        pipeline.end_frame().unwrap();
        assert_eq!(pipeline.cache().retired_count(), 0);
    }

    #[test]
    fn test_draw_then_update_keeps_first_contents() {
        let config = RenderConfig {
            viewport_width: 8,
            viewport_height: 8,
            ..Default::default()
        };
        let mut pipeline = RenderPipeline::new(&config).unwrap();
        pipeline.begin_frame();
        pipeline.update_image(1, 1, 1, &[0xFFFF0000]).unwrap();
        pipeline
            .render_normal(Rect::new(0, 0, 4, 8), 1, Rect::new(0, 0, 1, 1), 255)
            .unwrap();
        pipeline.update_image(1, 1, 1, &[0xFF0000FF]).unwrap();
        pipeline
            .render_normal(Rect::new(4, 0, 4, 8), 1, Rect::new(0, 0, 1, 1), 255)
            .unwrap();
        pipeline.end_frame().unwrap();

        let frame = pipeline.read_frame().unwrap();
        assert_eq!(frame.get_pixel(1, 4), Some([255, 0, 0, 255]));
        assert_eq!(frame.get_pixel(6, 4), Some([0, 0, 255, 255]));
        assert_eq!(pipeline.upload_count(), 2);
    }
}
