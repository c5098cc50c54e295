//! Engine pixels and colors.
//!
//! The engine hands over pixels as packed `0xAARRGGBB` words with straight
//! alpha. [`Color`] keeps that representation so configured colors and
//! image pixels compare directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A straight-alpha color packed as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const TRANSPARENT: Color = Color(0x0000_0000);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb8(0xFF, r, g, b)
    }

    pub const fn from_argb8(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self::from_argb8(rgba[3], rgba[0], rgba[1], rgba[2])
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        argb_to_rgba(self.0)
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Components as `[r, g, b, a]` in `0.0..=1.0`.
    pub fn to_unit(self) -> [f32; 4] {
        self.to_rgba8().map(|c| c as f32 / 255.0)
    }

    /// Parse `#RRGGBB` (opaque) or `#AARRGGBB`, the leading `#` optional.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorError::Digit(hex.to_string()));
        }
        let value = u32::from_str_radix(digits, 16).map_err(|_| ColorError::Digit(hex.to_string()))?;
        match digits.len() {
            6 => Ok(Color(0xFF00_0000 | value)),
            8 => Ok(Color(value)),
            n => Err(ColorError::Length(n)),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha() == 0xFF {
            write!(f, "#{:06X}", self.0 & 0x00FF_FFFF)
        } else {
            write!(f, "#{:08X}", self.0)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("expected 6 or 8 hex digits, got {0}")]
    Length(usize),
    #[error("not a hex color: {0:?}")]
    Digit(String),
}

/// Unpack one engine pixel into RGBA byte order.
#[inline]
pub fn argb_to_rgba(pixel: u32) -> [u8; 4] {
    let [a, r, g, b] = pixel.to_be_bytes();
    [r, g, b, a]
}

/// Convert a packed ARGB slice into a row-major RGBA byte buffer.
///
/// `dst` must hold exactly `4 * src.len()` bytes.
pub fn convert_argb_into(src: &[u32], dst: &mut [u8]) {
    debug_assert_eq!(dst.len(), src.len() * 4);
    for (out, &pixel) in dst.chunks_exact_mut(4).zip(src) {
        out.copy_from_slice(&argb_to_rgba(pixel));
    }
}
