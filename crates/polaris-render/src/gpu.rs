//! wgpu device setup and the image texture pool.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

/// Format of every image texture and of the offscreen target.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const IMAGE_USAGE: wgpu::TextureUsages =
    wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::COPY_DST);

/// Idle textures kept per size before extras are dropped.
const MAX_IDLE_PER_SIZE: usize = 4;

/// Recycles image textures by size. Scenes free and recreate same-sized
/// layers all the time, so a released texture is usually reused within a
/// few frames.
#[derive(Default)]
pub struct TexturePool {
    idle: Mutex<HashMap<(u32, u32), Vec<wgpu::Texture>>>,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `width` x `height` image texture, pooled when one is idle.
    pub fn acquire(&self, device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
        if let Some(texture) = self.idle.lock().get_mut(&(width, height)).and_then(Vec::pop) {
            return texture;
        }
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("polaris_image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: IMAGE_USAGE,
            view_formats: &[],
        })
    }

    pub fn release(&self, texture: wgpu::Texture) {
        let mut idle = self.idle.lock();
        let slot = idle.entry((texture.width(), texture.height())).or_default();
        if slot.len() < MAX_IDLE_PER_SIZE {
            slot.push(texture);
        } else {
            texture.destroy();
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().values().map(Vec::len).sum()
    }
}

/// Headless device and queue shared by GPU backends.
pub struct GpuContext {
    pub adapter_name: String,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub texture_pool: TexturePool,
}

impl GpuContext {
    /// Open the first adapter wgpu offers, without a surface.
    pub fn init() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no wgpu adapter available"))?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("polaris_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))?;

        tracing::info!(adapter = %adapter_name, "gpu context ready");
        Ok(Self {
            adapter_name,
            device,
            queue,
            texture_pool: TexturePool::new(),
        })
    }
}
