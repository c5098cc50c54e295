use polaris_core::{FrameBuffer, PolarisResult};

use crate::compositor::DrawCommand;

/// Backend-side texture handle, issued by the image cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// The seam between the compositor and whatever actually draws pixels.
///
/// Everything here runs on the main thread. A backend owns its texture
/// copies; it never reads the cache's CPU-side pixels outside `upload`.
pub trait RenderBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Create `texture` or re-sync it from `pixels`.
    fn upload(&mut self, texture: TextureId, pixels: &FrameBuffer) -> PolarisResult<()>;

    /// Drop the backend copy of `texture`. Unknown handles are ignored.
    fn release(&mut self, texture: TextureId);

    /// Clear the target and execute one frame's commands in order.
    fn submit(&mut self, commands: &[DrawCommand]) -> PolarisResult<()>;

    /// The most recently submitted frame.
    fn read_frame(&mut self) -> PolarisResult<FrameBuffer>;

    /// Number of `upload` calls served so far.
    fn upload_count(&self) -> u64;
}
