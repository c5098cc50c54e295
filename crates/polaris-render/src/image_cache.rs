//! Bitmap textures owned on behalf of the engine core.
//!
//! Pixels arrive as packed ARGB, are stored as RGBA, and reach the backend
//! lazily: an update only marks the entry dirty, and the next draw that reads
//! it performs the single upload for that dirty period.
//!
//! Draws are recorded now and executed at submit, so a texture that a queued
//! draw reads is never rewritten or released mid-frame. An update of such an
//! image moves it to a fresh texture, and a free defers the release until
//! [`ImageCache::settle`].

use std::collections::HashMap;

use polaris_core::color::convert_argb_into;
use polaris_core::{FrameBuffer, PolarisError, PolarisResult};

use crate::backend::{RenderBackend, TextureId};

/// Engine-assigned image identifier.
pub type ImageId = i32;

#[derive(Debug)]
struct CachedImage {
    pixels: FrameBuffer,
    texture: TextureId,
    resident: bool,
    dirty: bool,
    /// Read by a draw queued since the last settle.
    queued: bool,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<ImageId, CachedImage>,
    next_texture: u64,
    retired: Vec<TextureId>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store new contents for `id`, creating the entry on first use.
    ///
    /// An existing entry must keep its dimensions. The backend is not touched.
    pub fn update(
        &mut self,
        id: ImageId,
        width: u32,
        height: u32,
        pixels: &[u32],
    ) -> PolarisResult<()> {
        let expected = (width as usize) * (height as usize);
        if pixels.len() != expected {
            return Err(PolarisError::PixelCount {
                id,
                expected,
                actual: pixels.len(),
            });
        }

        if let Some(image) = self.images.get(&id) {
            let current = (image.pixels.width, image.pixels.height);
            if current != (width, height) {
                return Err(PolarisError::SizeMismatch {
                    id,
                    expected: current,
                    actual: (width, height),
                });
            }
        } else {
            let texture = self.allocate_texture();
            tracing::debug!(image_id = id, width, height, "image created");
            self.images.insert(
                id,
                CachedImage {
                    pixels: FrameBuffer::new(width, height),
                    texture,
                    resident: false,
                    dirty: true,
                    queued: false,
                },
            );
        }

        let queued = self.images.get(&id).is_some_and(|image| image.queued);
        let fresh = queued.then(|| self.allocate_texture());
        let image = self
            .images
            .get_mut(&id)
            .ok_or(PolarisError::UnknownImage(id))?;
        if let Some(fresh) = fresh {
            // Earlier draws this frame keep the old contents.
            self.retired.push(image.texture);
            image.texture = fresh;
            image.resident = false;
            image.queued = false;
        }
        convert_argb_into(pixels, &mut image.pixels.data);
        image.dirty = true;
        Ok(())
    }

    /// Sync the backend copy if the entry is dirty and return its texture.
    pub fn ensure_uploaded(
        &mut self,
        id: ImageId,
        backend: &mut dyn RenderBackend,
    ) -> PolarisResult<TextureId> {
        let image = self
            .images
            .get_mut(&id)
            .ok_or(PolarisError::UnknownImage(id))?;
        if image.dirty {
            backend.upload(image.texture, &image.pixels)?;
            image.dirty = false;
            image.resident = true;
        }
        image.queued = true;
        Ok(image.texture)
    }

    /// Remove `id` and release its backend texture, or schedule the release
    /// for the next settle if a queued draw still reads it.
    pub fn free(&mut self, id: ImageId, backend: &mut dyn RenderBackend) -> PolarisResult<()> {
        let image = self
            .images
            .remove(&id)
            .ok_or(PolarisError::UnknownImage(id))?;
        if image.resident {
            if image.queued {
                self.retired.push(image.texture);
            } else {
                backend.release(image.texture);
            }
        }
        tracing::debug!(image_id = id, "image freed");
        Ok(())
    }

    /// Call once the queued draws have been submitted or discarded. Releases
    /// retired textures and forgets which images were read.
    pub fn settle(&mut self, backend: &mut dyn RenderBackend) {
        for texture in self.retired.drain(..) {
            backend.release(texture);
        }
        for image in self.images.values_mut() {
            image.queued = false;
        }
    }

    /// Textures waiting for the next settle.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    fn allocate_texture(&mut self) -> TextureId {
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        texture
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.images.contains_key(&id)
    }

    pub fn size(&self, id: ImageId) -> Option<(u32, u32)> {
        self.images
            .get(&id)
            .map(|image| (image.pixels.width, image.pixels.height))
    }

    pub fn is_dirty(&self, id: ImageId) -> Option<bool> {
        self.images.get(&id).map(|image| image.dirty)
    }

    /// CPU-side RGBA contents of `id`.
    pub fn pixels(&self, id: ImageId) -> Option<&FrameBuffer> {
        self.images.get(&id).map(|image| &image.pixels)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
