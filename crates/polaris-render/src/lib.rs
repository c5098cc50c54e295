//! # polaris-render
//!
//! The Polaris rendering bridge. Turns the engine core's image updates and
//! draw calls into textured quads, one command list per frame, executed by a
//! pluggable [`RenderBackend`]: a deterministic CPU rasterizer or wgpu.

pub mod backend;
pub mod compositor;
pub mod cpu;
pub mod gpu;
pub mod gpu_backend;
pub mod image_cache;
pub mod pipeline;

pub use backend::{RenderBackend, TextureId};
pub use compositor::{Compositor, DrawCommand, DrawMode, ShaderProgram, Vertex, QUAD_INDICES};
pub use cpu::CpuBackend;
pub use gpu::GpuContext;
pub use gpu_backend::GpuBackend;
pub use image_cache::{ImageCache, ImageId};
pub use pipeline::RenderPipeline;
