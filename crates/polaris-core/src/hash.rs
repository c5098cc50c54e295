//! SHA-256 digests of composited frames and engine images.
//!
//! Two frames digest equal exactly when their size and RGBA bytes match.
//! [`hash_argb`] digests engine pixels as if they had been converted to a
//! frame first, so an uploaded image can be compared with a read-back.

use sha2::{Digest, Sha256};

use crate::color::argb_to_rgba;
use crate::frame::{FrameBuffer, PixelFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

fn header(width: u32, height: u32, format: PixelFormat) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(width.to_le_bytes());
    hasher.update(height.to_le_bytes());
    hasher.update([format as u8]);
    hasher
}

pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    let mut hasher = header(frame.width, frame.height, frame.format);
    hasher.update(&frame.data);
    ContentHash(hasher.finalize().into())
}

/// Digest packed ARGB pixels as the RGBA frame they convert to.
pub fn hash_argb(width: u32, height: u32, pixels: &[u32]) -> ContentHash {
    let mut hasher = header(width, height, PixelFormat::Rgba8);
    for &pixel in pixels {
        hasher.update(argb_to_rgba(pixel));
    }
    ContentHash(hasher.finalize().into())
}
