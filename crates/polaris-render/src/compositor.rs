//! Per-frame draw command list.
//!
//! Every draw is an independent textured quad. Geometry is resolved into
//! device-space vertices here so both backends consume identical data.

use polaris_core::{PolarisError, PolarisResult, Point2D, Quad, Rect, Viewport};

use crate::backend::{RenderBackend, TextureId};
use crate::image_cache::{ImageCache, ImageId};

/// Triangle list over the TL, TR, BL, BR vertex order.
pub const QUAD_INDICES: [usize; 6] = [0, 1, 2, 1, 3, 2];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    /// Vertex color alpha. For rule and melt it carries the normalized
    /// threshold or progress instead.
    pub alpha: f32,
}

/// Draw entry points the engine core can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Normal,
    Add,
    Dim,
    Rule,
    Melt,
    Normal3d,
    Add3d,
}

/// Fragment program a draw ends up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Normal,
    Dim,
    Rule,
    Melt,
}

impl ShaderProgram {
    pub const ALL: [ShaderProgram; 4] = [
        ShaderProgram::Normal,
        ShaderProgram::Dim,
        ShaderProgram::Rule,
        ShaderProgram::Melt,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn uses_rule(self) -> bool {
        matches!(self, ShaderProgram::Rule | ShaderProgram::Melt)
    }
}

impl DrawMode {
    /// Additive modes have no blend state of their own yet and render
    /// exactly like their normal counterparts.
    pub fn program(self) -> ShaderProgram {
        match self {
            DrawMode::Normal | DrawMode::Add | DrawMode::Normal3d | DrawMode::Add3d => {
                ShaderProgram::Normal
            }
            DrawMode::Dim => ShaderProgram::Dim,
            DrawMode::Rule => ShaderProgram::Rule,
            DrawMode::Melt => ShaderProgram::Melt,
        }
    }
}

/// One resolved draw. Lives for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub mode: DrawMode,
    pub image: ImageId,
    pub texture: TextureId,
    pub src_rect: Rect,
    pub alpha: u8,
    pub rule: Option<(ImageId, TextureId)>,
    /// Threshold for rule, progress for melt.
    pub scalar: Option<u8>,
    pub vertices: [Vertex; 4],
}

impl DrawCommand {
    pub fn program(&self) -> ShaderProgram {
        self.mode.program()
    }

    /// The six vertices of the two triangles, in draw order.
    pub fn triangle_vertices(&self) -> [Vertex; 6] {
        QUAD_INDICES.map(|i| self.vertices[i])
    }
}

/// Accumulates the frame's draws in emission order.
#[derive(Debug)]
pub struct Compositor {
    viewport: Viewport,
    commands: Vec<DrawCommand>,
}

impl Compositor {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            commands: Vec::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Drop the previous frame's commands.
    pub fn begin_frame(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_normal(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Rect,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        self.push_rect(DrawMode::Normal, cache, backend, dst, image, src, alpha)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_add(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Rect,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        self.push_rect(DrawMode::Add, cache, backend, dst, image, src, alpha)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_dim(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Rect,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        self.push_rect(DrawMode::Dim, cache, backend, dst, image, src, alpha)
    }

    /// Full-viewport wipe: pixels whose rule value is below `threshold`
    /// show `image`, the rest stay untouched.
    pub fn render_rule(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        image: ImageId,
        rule: ImageId,
        threshold: u8,
    ) -> PolarisResult<()> {
        self.push_transition(DrawMode::Rule, cache, backend, image, rule, threshold)
    }

    /// Full-viewport dissolve driven by `progress` against the rule image.
    pub fn render_melt(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        image: ImageId,
        rule: ImageId,
        progress: u8,
    ) -> PolarisResult<()> {
        self.push_transition(DrawMode::Melt, cache, backend, image, rule, progress)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_3d_normal(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Quad,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        self.push_quad(DrawMode::Normal3d, cache, backend, dst, image, src, alpha)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render_3d_add(
        &mut self,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Quad,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        self.push_quad(DrawMode::Add3d, cache, backend, dst, image, src, alpha)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_rect(
        &mut self,
        mode: DrawMode,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Rect,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        let (w, h) = cache.size(image).ok_or(PolarisError::UnknownImage(image))?;
        let texture = cache.ensure_uploaded(image, backend)?;

        let Quad([tl, _, _, br]) = src.corners();
        let (w, h) = (w as f32, h as f32);
        let (u0, v0) = (tl.x / w, tl.y / h);
        let (u1, v1) = (br.x / w, br.y / h);
        let uvs = [[u0, v0], [u1, v0], [u0, v1], [u1, v1]];

        let vertices = self.vertices(&dst.corners(), uvs, alpha as f32 / 255.0);
        self.commands.push(DrawCommand {
            mode,
            image,
            texture,
            src_rect: src,
            alpha,
            rule: None,
            scalar: None,
            vertices,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_quad(
        &mut self,
        mode: DrawMode,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        dst: Quad,
        image: ImageId,
        src: Rect,
        alpha: u8,
    ) -> PolarisResult<()> {
        let (w, h) = cache.size(image).ok_or(PolarisError::UnknownImage(image))?;
        let texture = cache.ensure_uploaded(image, backend)?;

        // UVs come from the destination corners themselves, scaled by the
        // source image size. `src` is recorded but does not feed the UVs.
        let uvs = dst.0.map(|p| [p.x / w as f32, p.y / h as f32]);

        let vertices = self.vertices(&dst, uvs, alpha as f32 / 255.0);
        self.commands.push(DrawCommand {
            mode,
            image,
            texture,
            src_rect: src,
            alpha,
            rule: None,
            scalar: None,
            vertices,
        });
        Ok(())
    }

    fn push_transition(
        &mut self,
        mode: DrawMode,
        cache: &mut ImageCache,
        backend: &mut dyn RenderBackend,
        image: ImageId,
        rule: ImageId,
        scalar: u8,
    ) -> PolarisResult<()> {
        // Both images must exist before either is uploaded.
        let (w, h) = cache.size(image).ok_or(PolarisError::UnknownImage(image))?;
        if !cache.contains(rule) {
            return Err(PolarisError::MissingRuleImage(rule));
        }
        let texture = cache.ensure_uploaded(image, backend)?;
        let rule_texture = cache.ensure_uploaded(rule, backend)?;

        let full = Rect::new(0, 0, self.viewport.width as i32, self.viewport.height as i32);
        let uvs = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let vertices = self.vertices(&full.corners(), uvs, scalar as f32 / 255.0);

        self.commands.push(DrawCommand {
            mode,
            image,
            texture,
            src_rect: Rect::new(0, 0, w as i32, h as i32),
            alpha: 255,
            rule: Some((rule, rule_texture)),
            scalar: Some(scalar),
            vertices,
        });
        Ok(())
    }

    fn vertices(&self, corners: &Quad, uvs: [[f32; 2]; 4], alpha: f32) -> [Vertex; 4] {
        let vp = self.viewport;
        let make = |p: Point2D, uv: [f32; 2]| Vertex {
            position: vp.to_device(p),
            uv,
            alpha,
        };
        [
            make(corners.0[0], uvs[0]),
            make(corners.0[1], uvs[1]),
            make(corners.0[2], uvs[2]),
            make(corners.0[3], uvs[3]),
        ]
    }
}
