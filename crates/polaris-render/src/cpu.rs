//! Deterministic software backend.
//!
//! Rasterizes each quad as two triangles with a top-left fill rule, samples
//! bilinearly and blends with straight-alpha "over", mirroring the GPU
//! pipeline's fixed-function state. Used headless and by the render tests.

use std::collections::HashMap;

use polaris_core::frame::blend_over;
use polaris_core::{Color, FrameBuffer, PolarisError, PolarisResult, Viewport};
use rayon::prelude::*;

use crate::backend::{RenderBackend, TextureId};
use crate::compositor::{DrawCommand, ShaderProgram, Vertex};

pub struct CpuBackend {
    viewport: Viewport,
    clear: Color,
    target: FrameBuffer,
    textures: HashMap<TextureId, FrameBuffer>,
    uploads: u64,
}

impl CpuBackend {
    /// A backend whose target matches the logical viewport one to one.
    pub fn new(viewport: Viewport, clear: Color) -> Self {
        Self::with_target_size(viewport, clear, viewport.width, viewport.height)
    }

    /// A backend rendering the logical viewport into a differently sized target.
    pub fn with_target_size(viewport: Viewport, clear: Color, width: u32, height: u32) -> Self {
        Self {
            viewport,
            clear,
            target: FrameBuffer::solid(width, height, clear),
            textures: HashMap::new(),
            uploads: 0,
        }
    }

    pub fn resident_textures(&self) -> usize {
        self.textures.len()
    }

    fn draw(&mut self, cmd: &DrawCommand) -> PolarisResult<()> {
        let src = self
            .textures
            .get(&cmd.texture)
            .ok_or_else(|| PolarisError::Render(format!("texture {:?} not resident", cmd.texture)))?;
        let program = cmd.program();
        let rule = match cmd.rule {
            Some((_, texture)) if program.uses_rule() => Some(self.textures.get(&texture).ok_or_else(
                || PolarisError::Render(format!("rule texture {:?} not resident", texture)),
            )?),
            _ => None,
        };

        let (tw, th) = (self.target.width, self.target.height);
        let to_px = |v: &Vertex| {
            let p = self.viewport.device_to_target(v.position, tw, th);
            RasterVertex {
                x: p[0],
                y: p[1],
                uv: v.uv,
                alpha: v.alpha,
            }
        };
        let verts = cmd.vertices.map(|v| to_px(&v));
        let triangles = [
            [verts[0], verts[1], verts[2]],
            [verts[1], verts[3], verts[2]],
        ];

        let stride = self.target.stride();
        for tri in triangles {
            let Some(setup) = TriangleSetup::new(tri, tw, th) else {
                continue;
            };
            self.target
                .data
                .par_chunks_mut(stride)
                .enumerate()
                .skip(setup.min_y)
                .take(setup.max_y + 1 - setup.min_y)
                .for_each(|(y, row)| {
                    for x in setup.min_x..=setup.max_x {
                        let Some((uv, alpha)) = setup.interpolate(x as f32 + 0.5, y as f32 + 0.5)
                        else {
                            continue;
                        };
                        let color = shade(program, src, rule, uv, alpha);
                        blend_over(&mut row[x * 4..x * 4 + 4], color);
                    }
                });
        }
        Ok(())
    }
}

/// Fragment rules, one per shader program.
fn shade(
    program: ShaderProgram,
    src: &FrameBuffer,
    rule: Option<&FrameBuffer>,
    uv: [f32; 2],
    alpha: f32,
) -> [f32; 4] {
    let mut c = src.sample_bilinear(uv[0], uv[1]);
    match program {
        ShaderProgram::Normal => c[3] *= alpha,
        ShaderProgram::Dim => {
            c[0] *= 0.5;
            c[1] *= 0.5;
            c[2] *= 0.5;
        }
        ShaderProgram::Rule => {
            let r = rule.map_or(1.0, |r| r.sample_bilinear(uv[0], uv[1])[2]);
            c[3] = if r < alpha { 1.0 } else { 0.0 };
        }
        ShaderProgram::Melt => {
            let r = rule.map_or(1.0, |r| r.sample_bilinear(uv[0], uv[1])[2]);
            c[3] = ((1.0 - r) + (alpha * 2.0 - 1.0)).clamp(0.0, 1.0);
        }
    }
    c
}

#[derive(Debug, Clone, Copy)]
struct RasterVertex {
    x: f32,
    y: f32,
    uv: [f32; 2],
    alpha: f32,
}

fn edge(a: &RasterVertex, b: &RasterVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Whether pixels exactly on edge `a -> b` belong to this triangle.
/// Opposite traversals of a shared edge always disagree.
fn owns_edge(a: &RasterVertex, b: &RasterVertex) -> bool {
    let dy = b.y - a.y;
    dy > 0.0 || (dy == 0.0 && b.x - a.x < 0.0)
}

struct TriangleSetup {
    v: [RasterVertex; 3],
    area: f32,
    owns: [bool; 3],
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

impl TriangleSetup {
    fn new(mut v: [RasterVertex; 3], width: u32, height: u32) -> Option<Self> {
        let mut area = edge(&v[0], &v[1], v[2].x, v[2].y);
        if area == 0.0 || width == 0 || height == 0 {
            return None;
        }
        if area < 0.0 {
            v.swap(1, 2);
            area = -area;
        }

        let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let max_x = v
            .iter()
            .map(|p| p.x)
            .fold(f32::NEG_INFINITY, f32::max)
            .ceil()
            .min(width as f32 - 1.0);
        let max_y = v
            .iter()
            .map(|p| p.y)
            .fold(f32::NEG_INFINITY, f32::max)
            .ceil()
            .min(height as f32 - 1.0);
        if max_x < min_x || max_y < min_y {
            return None;
        }

        Some(Self {
            owns: [
                owns_edge(&v[1], &v[2]),
                owns_edge(&v[2], &v[0]),
                owns_edge(&v[0], &v[1]),
            ],
            v,
            area,
            min_x: min_x as usize,
            max_x: max_x as usize,
            min_y: min_y as usize,
            max_y: max_y as usize,
        })
    }

    /// Interpolated UV and alpha at a sample point, or None if outside.
    fn interpolate(&self, px: f32, py: f32) -> Option<([f32; 2], f32)> {
        let [a, b, c] = &self.v;
        let w = [edge(b, c, px, py), edge(c, a, px, py), edge(a, b, px, py)];
        for i in 0..3 {
            if w[i] < 0.0 || (w[i] == 0.0 && !self.owns[i]) {
                return None;
            }
        }
        // Relative to `a`, so attributes shared by all corners stay exact.
        let (lb, lc) = (w[1] / self.area, w[2] / self.area);
        let lerp = |fa: f32, fb: f32, fc: f32| fa + lb * (fb - fa) + lc * (fc - fa);
        let uv = [
            lerp(a.uv[0], b.uv[0], c.uv[0]),
            lerp(a.uv[1], b.uv[1], c.uv[1]),
        ];
        Some((uv, lerp(a.alpha, b.alpha, c.alpha)))
    }
}

impl RenderBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn upload(&mut self, texture: TextureId, pixels: &FrameBuffer) -> PolarisResult<()> {
        self.textures.insert(texture, pixels.clone());
        self.uploads += 1;
        Ok(())
    }

    fn release(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn submit(&mut self, commands: &[DrawCommand]) -> PolarisResult<()> {
        self.target.fill(self.clear);
        for cmd in commands {
            self.draw(cmd)?;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> PolarisResult<FrameBuffer> {
        Ok(self.target.clone())
    }

    fn upload_count(&self) -> u64 {
        self.uploads
    }
}
