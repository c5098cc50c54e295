use crate::color::convert_argb_into;
use crate::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Straight-alpha RGBA, one byte per channel.
    Rgba8,
}

/// Row-major RGBA8 pixels: an image's CPU copy or a composited frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameBuffer {
    /// Transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 4],
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Convert engine ARGB pixels. `None` unless there are exactly
    /// `width * height` of them.
    pub fn from_argb(width: u32, height: u32, pixels: &[u32]) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        let mut fb = Self::new(width, height);
        convert_argb_into(pixels, &mut fb.data);
        Some(fb)
    }

    /// Wrap RGBA bytes, as read back from a backend.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 4).then_some(Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        })
    }

    pub fn fill(&mut self, color: Color) {
        let rgba = color.to_rgba8();
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = y as usize * self.stride() + x as usize * 4;
        self.data.get(o..o + 4)?.try_into().ok()
    }

    /// Bilinear sample at normalized `(u, v)` with clamp-to-edge addressing.
    ///
    /// Texel centers sit at `(i + 0.5) / width`, matching a GPU linear
    /// sampler. Returns components in [0, 1]. An empty buffer samples as
    /// transparent black.
    pub fn sample_bilinear(&self, u: f32, v: f32) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 4];
        }
        let max_x = self.width as i64 - 1;
        let max_y = self.height as i64 - 1;
        let fx = u * self.width as f32 - 0.5;
        let fy = v * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;

        let texel = |x: i64, y: i64| -> [f32; 4] {
            let x = x.clamp(0, max_x) as usize;
            let y = y.clamp(0, max_y) as usize;
            let o = y * self.stride() + x * 4;
            [
                self.data[o] as f32 / 255.0,
                self.data[o + 1] as f32 / 255.0,
                self.data[o + 2] as f32 / 255.0,
                self.data[o + 3] as f32 / 255.0,
            ]
        };

        let (x0, y0) = (x0 as i64, y0 as i64);
        let a = texel(x0, y0);
        let b = texel(x0 + 1, y0);
        let c = texel(x0, y0 + 1);
        let d = texel(x0 + 1, y0 + 1);

        let mut out = [0.0f32; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * tx;
            let bottom = c[i] + (d[i] - c[i]) * tx;
            out[i] = top + (bottom - top) * ty;
        }
        out
    }
}

/// Blend a straight-alpha source color over one RGBA8 destination pixel.
///
/// Color uses `src * a + dst * (1 - a)`; alpha uses `a + dst_a * (1 - a)`.
/// This is the fixed-function `SrcAlpha, OneMinusSrcAlpha` blend state.
#[inline]
pub fn blend_over(dst: &mut [u8], src: [f32; 4]) {
    let sa = src[3].clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let inv = 1.0 - sa;
    for i in 0..3 {
        let d = dst[i] as f32 / 255.0;
        let out = src[i].clamp(0.0, 1.0) * sa + d * inv;
        dst[i] = (out * 255.0).round() as u8;
    }
    let da = dst[3] as f32 / 255.0;
    dst[3] = ((sa + da * inv) * 255.0).round() as u8;
}
