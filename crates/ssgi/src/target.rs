use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// Pixel dimensions of a target or of the camera output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scales both dimensions, rounding toward zero and never below one pixel.
    pub fn scaled(self, scale: f32) -> Self {
        Self {
            width: ((self.width as f32 * scale) as u32).max(1),
            height: ((self.height as f32 * scale) as u32).max(1),
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// `(1/width, 1/height, width)`, the texel-size vector pass programs expect.
    pub fn texel_size(self) -> [f32; 3] {
        let width = self.width.max(1) as f32;
        let height = self.height.max(1) as f32;
        [1.0 / width, 1.0 / height, width]
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Requested size of a transient target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSize {
    /// Literal pixel dimensions.
    Pixels(Extent),
    /// Match whatever the camera renders at this frame.
    Camera,
}

impl TargetSize {
    pub fn resolve(self, camera: Extent) -> Extent {
        match self {
            TargetSize::Pixels(extent) => extent,
            TargetSize::Camera => camera,
        }
    }
}

/// Storage format of a transient target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFormat {
    /// Half-float RGBA, wide enough for unclamped lighting.
    DefaultHdr,
    /// Whatever the camera's color buffer uses, so a plain copy is valid.
    Camera,
}

impl TargetFormat {
    /// Estimated storage cost; camera targets are assumed to be 8-bit RGBA.
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            TargetFormat::DefaultHdr => 8,
            TargetFormat::Camera => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Point,
    Bilinear,
}

/// Everything needed to request a transient target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TargetDesc {
    pub label: &'static str,
    pub size: TargetSize,
    pub format: TargetFormat,
    pub filter: FilterMode,
    pub depth_bits: u32,
}

impl TargetDesc {
    /// An HDR, bilinear, depth-less color target.
    pub fn new(label: &'static str, size: TargetSize) -> Self {
        Self {
            label,
            size,
            format: TargetFormat::DefaultHdr,
            filter: FilterMode::Bilinear,
            depth_bits: 0,
        }
    }

    pub fn format(mut self, format: TargetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }
}

/// Pool-issued identity of a transient target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TargetId(pub(crate) u64);

impl TargetId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live (or formerly live) transient target.
///
/// Handles compare and hash by [`TargetId`] alone: two handles with the same id
/// name the same allocation, whatever their labels say.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TargetHandle {
    pub id: TargetId,
    pub desc: TargetDesc,
    /// Size after resolving [`TargetSize::Camera`] against the frame extent.
    pub extent: Extent,
}

impl TargetHandle {
    pub fn label(&self) -> &'static str {
        self.desc.label
    }

    pub fn estimated_bytes(&self) -> u64 {
        self.extent.area() * self.desc.format.bytes_per_pixel()
    }
}

impl PartialEq for TargetHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TargetHandle {}

impl Hash for TargetHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.desc.label, self.id)
    }
}
