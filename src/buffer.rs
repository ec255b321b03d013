//! Video buffer backends.
//!
//! A [`VideoBuffer`] owns pixel storage and knows how to expose it to the
//! CPU. Backends implement a single-level map/unmap contract; nesting and
//! sharing are layered on top by [`PixelBuffer`](crate::PixelBuffer).

use std::sync::Arc;

use arrayvec::ArrayVec;
use tracing::debug;

use crate::format::MAX_PLANES;
use crate::image::Image;

// ---------------------------------------------------------------------------
// Map state
// ---------------------------------------------------------------------------

/// CPU access requested from, or granted by, a mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MapMode {
    #[default]
    NotMapped = 0,
    ReadOnly = 1,
    WriteOnly = 2,
    ReadWrite = 3,
}

impl MapMode {
    /// Whether mapped bytes may be read.
    #[inline]
    pub const fn is_readable(self) -> bool {
        (self as u8) & 1 != 0
    }

    /// Whether mapped bytes may be written.
    #[inline]
    pub const fn is_writable(self) -> bool {
        (self as u8) & 2 != 0
    }
}

/// Kind of storage behind a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HandleType {
    /// Ordinary CPU memory.
    #[default]
    NoHandle,
    /// Opaque GPU texture handles. Not CPU-mappable.
    Texture,
}

// ---------------------------------------------------------------------------
// Mapped planes
// ---------------------------------------------------------------------------

/// One mapped plane: base pointer, bytes per row, and byte length.
///
/// The pointer is valid only while the mapping that produced it is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedPlane {
    data: *mut u8,
    stride: usize,
    len: usize,
}

// The pointer is a view into storage owned by the buffer; access is gated
// by the map mode, not by which thread holds the plane.
unsafe impl Send for MappedPlane {}
unsafe impl Sync for MappedPlane {}

impl MappedPlane {
    pub const fn new(data: *mut u8, stride: usize, len: usize) -> Self {
        Self { data, stride, len }
    }

    #[inline]
    pub const fn data(&self) -> *mut u8 {
        self.data
    }

    /// Bytes per row.
    #[inline]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Result of a map call. Empty when the map was refused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapData {
    planes: ArrayVec<MappedPlane, MAX_PLANES>,
}

impl MapData {
    /// A refused mapping.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A mapping of a single plane.
    pub fn single(plane: MappedPlane) -> Self {
        let mut data = Self::default();
        data.planes.push(plane);
        data
    }

    /// Build from planes. Planes beyond [`MAX_PLANES`] are dropped.
    pub fn from_planes(planes: impl IntoIterator<Item = MappedPlane>) -> Self {
        Self {
            planes: planes.into_iter().take(MAX_PLANES).collect(),
        }
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn plane(&self, index: usize) -> Option<&MappedPlane> {
        self.planes.get(index)
    }

    pub fn planes(&self) -> &[MappedPlane] {
        &self.planes
    }
}

// ---------------------------------------------------------------------------
// Backend interface
// ---------------------------------------------------------------------------

/// Storage backend of a video frame.
///
/// Implementations map at most once at a time: `map` on an already
/// mapped buffer, or with [`MapMode::NotMapped`], returns
/// [`MapData::empty`] and changes nothing. `unmap` on an unmapped buffer
/// is a no-op.
pub trait VideoBuffer: Send {
    /// What kind of storage this is.
    fn handle_type(&self) -> HandleType {
        HandleType::NoHandle
    }

    /// Current map mode.
    fn map_mode(&self) -> MapMode;

    /// Map the storage for CPU access.
    fn map(&mut self, mode: MapMode) -> MapData;

    /// Release the current mapping.
    fn unmap(&mut self);

    /// Backing bytes of `plane`, without mapping.
    ///
    /// `None` for out-of-range planes, for backends that cannot expose
    /// their storage, and while the buffer is mapped for writing.
    fn underlying_bytes(&self, _plane: usize) -> Option<Arc<Vec<u8>>> {
        None
    }

    /// Native handle of `plane`. Zero for CPU buffers.
    fn texture_handle(&self, _plane: usize) -> u64 {
        0
    }
}

fn refuse(current: MapMode, requested: MapMode) -> MapData {
    debug!(target: "zenframe", ?current, ?requested, "map refused");
    MapData::empty()
}

// ---------------------------------------------------------------------------
// MemoryVideoBuffer
// ---------------------------------------------------------------------------

/// Single-plane buffer over shared bytes.
///
/// Storage may be shared with whoever supplied it. Read-only maps expose
/// the shared bytes directly; write maps first take a private copy if the
/// bytes are shared, so writers never disturb other owners.
#[derive(Debug)]
pub struct MemoryVideoBuffer {
    data: Arc<Vec<u8>>,
    bytes_per_line: usize,
    mode: MapMode,
}

impl MemoryVideoBuffer {
    pub fn new(data: Vec<u8>, bytes_per_line: usize) -> Self {
        Self::from_shared(Arc::new(data), bytes_per_line)
    }

    /// Wrap bytes that remain shared with the caller until written.
    pub fn from_shared(data: Arc<Vec<u8>>, bytes_per_line: usize) -> Self {
        Self {
            data,
            bytes_per_line,
            mode: MapMode::NotMapped,
        }
    }

    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }
}

impl VideoBuffer for MemoryVideoBuffer {
    fn map_mode(&self) -> MapMode {
        self.mode
    }

    fn map(&mut self, mode: MapMode) -> MapData {
        if mode == MapMode::NotMapped || self.mode != MapMode::NotMapped {
            return refuse(self.mode, mode);
        }
        if self.data.is_empty() {
            debug!(target: "zenframe", "map of empty memory buffer");
            return MapData::empty();
        }
        let ptr = if mode.is_writable() {
            if Arc::strong_count(&self.data) > 1 {
                debug!(
                    target: "zenframe",
                    bytes = self.data.len(),
                    "detaching shared storage for write"
                );
            }
            Arc::make_mut(&mut self.data).as_mut_ptr()
        } else {
            self.data.as_ptr().cast_mut()
        };
        self.mode = mode;
        MapData::single(MappedPlane::new(ptr, self.bytes_per_line, self.data.len()))
    }

    fn unmap(&mut self) {
        self.mode = MapMode::NotMapped;
    }

    fn underlying_bytes(&self, plane: usize) -> Option<Arc<Vec<u8>>> {
        // a write mapping aliases the bytes mutably
        (plane == 0 && !self.mode.is_writable()).then(|| Arc::clone(&self.data))
    }
}

// ---------------------------------------------------------------------------
// ImageVideoBuffer
// ---------------------------------------------------------------------------

/// Single-plane buffer owning an [`Image`].
#[derive(Debug)]
pub struct ImageVideoBuffer {
    image: Image,
    mode: MapMode,
}

impl ImageVideoBuffer {
    pub fn new(image: Image) -> Self {
        Self {
            image,
            mode: MapMode::NotMapped,
        }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }
}

impl VideoBuffer for ImageVideoBuffer {
    fn map_mode(&self) -> MapMode {
        self.mode
    }

    fn map(&mut self, mode: MapMode) -> MapData {
        if mode == MapMode::NotMapped || self.mode != MapMode::NotMapped {
            return refuse(self.mode, mode);
        }
        if self.image.is_null() {
            return MapData::empty();
        }
        let stride = self.image.bytes_per_line();
        let bytes = self.image.data_mut();
        self.mode = mode;
        MapData::single(MappedPlane::new(bytes.as_mut_ptr(), stride, bytes.len()))
    }

    fn unmap(&mut self) {
        self.mode = MapMode::NotMapped;
    }
}

// ---------------------------------------------------------------------------
// TextureVideoBuffer
// ---------------------------------------------------------------------------

/// Opaque GPU-side buffer identified by per-plane handles.
///
/// Exists so frames can carry textures through the same API; every CPU
/// map is refused.
#[derive(Clone, Debug, Default)]
pub struct TextureVideoBuffer {
    handles: ArrayVec<u64, MAX_PLANES>,
}

impl TextureVideoBuffer {
    /// Handles beyond [`MAX_PLANES`] are ignored.
    pub fn new(handles: &[u64]) -> Self {
        Self {
            handles: handles.iter().copied().take(MAX_PLANES).collect(),
        }
    }
}

impl VideoBuffer for TextureVideoBuffer {
    fn handle_type(&self) -> HandleType {
        HandleType::Texture
    }

    fn map_mode(&self) -> MapMode {
        MapMode::NotMapped
    }

    fn map(&mut self, mode: MapMode) -> MapData {
        debug!(target: "zenframe", ?mode, "texture buffers cannot be mapped");
        MapData::empty()
    }

    fn unmap(&mut self) {}

    fn texture_handle(&self, plane: usize) -> u64 {
        self.handles.get(plane).copied().unwrap_or(0)
    }
}
