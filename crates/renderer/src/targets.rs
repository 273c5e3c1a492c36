use std::collections::HashMap;
use std::hash::Hash;

use anyhow::{anyhow, Result};
use ssgi::{AllocError, Extent, FilterMode, TargetAllocator, TargetFormat, TargetHandle, TargetId};

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Rejects targets the device could never create.
#[derive(Clone, Copy, Debug)]
pub struct DeviceLimits {
    max_dimension: u32,
}

impl DeviceLimits {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn from_device(device: &wgpu::Device) -> Self {
        Self::new(device.limits().max_texture_dimension_2d)
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl TargetAllocator for DeviceLimits {
    fn allocate(&mut self, target: &TargetHandle) -> Result<(), AllocError> {
        let extent = target.extent;
        if extent.width > self.max_dimension || extent.height > self.max_dimension {
            return Err(AllocError::TooLarge {
                extent,
                max: self.max_dimension,
            });
        }
        Ok(())
    }

    fn release(&mut self, _target: &TargetHandle) {}
}

pub fn texture_format(
    format: TargetFormat,
    camera_format: wgpu::TextureFormat,
) -> wgpu::TextureFormat {
    match format {
        TargetFormat::DefaultHdr => HDR_FORMAT,
        TargetFormat::Camera => camera_format,
    }
}

/// Everything that makes two transient textures interchangeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub extent: Extent,
    pub format: wgpu::TextureFormat,
}

impl TextureKey {
    pub fn for_target(target: &TargetHandle, camera_format: wgpu::TextureFormat) -> Self {
        Self {
            extent: target.extent,
            format: texture_format(target.desc.format, camera_format),
        }
    }
}

/// Free lists of released resources, keyed by what makes them reusable.
pub struct RecycleBin<K, T> {
    free: HashMap<K, Vec<T>>,
}

impl<K, T> Default for RecycleBin<K, T> {
    fn default() -> Self {
        Self {
            free: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, T> RecycleBin<K, T> {
    pub fn take(&mut self, key: &K) -> Option<T> {
        self.free.get_mut(key).and_then(Vec::pop)
    }

    pub fn put(&mut self, key: K, item: T) {
        self.free.entry(key).or_default().push(item);
    }

    pub fn len(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}

pub(crate) struct PooledTexture {
    key: TextureKey,
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub filter: FilterMode,
}

/// GPU textures backing live target handles, recycled across frames.
#[derive(Default)]
pub struct TransientTextures {
    live: HashMap<TargetId, PooledTexture>,
    bin: RecycleBin<TextureKey, (wgpu::Texture, wgpu::TextureView)>,
    created: usize,
}

impl TransientTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        target: &TargetHandle,
        camera_format: wgpu::TextureFormat,
    ) -> Result<()> {
        if self.live.contains_key(&target.id) {
            return Err(anyhow!("target {target} is already backed by a texture"));
        }
        let key = TextureKey::for_target(target, camera_format);
        let (texture, view) = match self.bin.take(&key) {
            Some(recycled) => recycled,
            None => {
                self.created += 1;
                tracing::debug!(
                    handle = %target,
                    extent = %key.extent,
                    format = ?key.format,
                    "creating transient texture"
                );
                create_texture(device, target.label(), key)
            }
        };
        self.live.insert(
            target.id,
            PooledTexture {
                key,
                texture,
                view,
                filter: target.desc.filter,
            },
        );
        Ok(())
    }

    pub fn release(&mut self, target: &TargetHandle) -> Result<()> {
        let pooled = self
            .live
            .remove(&target.id)
            .ok_or_else(|| anyhow!("target {target} has no texture to release"))?;
        self.bin.put(pooled.key, (pooled.texture, pooled.view));
        Ok(())
    }

    /// Returns every live texture to the free lists; used when a frame fails
    /// halfway through encoding.
    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        for (_, pooled) in self.live.drain() {
            self.bin.put(pooled.key, (pooled.texture, pooled.view));
        }
        count
    }

    pub(crate) fn get(&self, target: &TargetHandle) -> Result<&PooledTexture> {
        self.live
            .get(&target.id)
            .ok_or_else(|| anyhow!("target {target} is not backed by a texture"))
    }

    pub(crate) fn texture(&self, target: &TargetHandle) -> Result<&wgpu::Texture> {
        self.get(target).map(|pooled| &pooled.texture)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn free_count(&self) -> usize {
        self.bin.len()
    }

    /// Textures created since this cache was built; recycled ones don't count.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Drops every free texture.
    pub fn trim(&mut self) {
        self.bin.clear();
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    key: TextureKey,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: key.extent.width.max(1),
            height: key.extent.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: key.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
