//! Shared, nestable mapping over a [`VideoBuffer`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::buffer::{HandleType, MapData, MapMode, VideoBuffer};
use crate::format::PixelFormat;

/// Why a map request failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MapError {
    /// [`MapMode::NotMapped`] is not a mode that can be mapped.
    #[error("map requested with NotMapped mode")]
    NotMappedMode,
    /// The frame is invalid and has nothing to map.
    #[error("frame has no buffer")]
    NullBuffer,
    /// An existing mapping is incompatible with the requested mode.
    #[error("buffer is mapped {current:?}, cannot map {requested:?}")]
    AlreadyMapped { current: MapMode, requested: MapMode },
    /// The backend could not expose its bytes.
    #[error("buffer returned no planes")]
    NoData,
    /// The backend's planes are too small for the frame geometry.
    #[error("mapped planes do not fit the {format} layout")]
    PlaneLayout { format: PixelFormat },
}

struct Mapping {
    buffer: Box<dyn VideoBuffer>,
    mode: MapMode,
    depth: usize,
    planes: MapData,
}

/// Reference-counted handle to a video buffer and its map state.
///
/// Clones share the buffer, so a mapping made through one clone is visible
/// through all of them. The backend is dropped with the last clone.
///
/// Read-only mappings nest: each successful `map(ReadOnly)` while mapped
/// read-only returns the same planes and must be balanced by one
/// [`unmap`](Self::unmap). Write mappings do not nest, and no mapping can
/// be upgraded to a writable one while held.
#[derive(Clone)]
pub struct PixelBuffer {
    inner: Arc<Mutex<Mapping>>,
}

impl PixelBuffer {
    pub fn new(buffer: impl VideoBuffer + 'static) -> Self {
        Self::from_box(Box::new(buffer))
    }

    pub fn from_box(buffer: Box<dyn VideoBuffer>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Mapping {
                buffer,
                mode: MapMode::NotMapped,
                depth: 0,
                planes: MapData::empty(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Mapping> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map for CPU access, or explain why not.
    ///
    /// A failed request leaves the current mapping untouched.
    pub fn try_map(&self, mode: MapMode) -> Result<MapData, MapError> {
        if mode == MapMode::NotMapped {
            return Err(MapError::NotMappedMode);
        }
        let mut m = self.lock();
        let held = m.mode;
        match held {
            MapMode::NotMapped => {
                let planes = m.buffer.map(mode);
                if planes.is_empty() {
                    debug!(target: "zenframe", ?mode, "backend returned no planes");
                    return Err(MapError::NoData);
                }
                m.mode = mode;
                m.depth = 1;
                m.planes = planes.clone();
                trace!(target: "zenframe", ?mode, planes = planes.plane_count(), "mapped");
                Ok(planes)
            }
            MapMode::ReadOnly if mode == MapMode::ReadOnly => {
                m.depth += 1;
                trace!(target: "zenframe", depth = m.depth, "nested read map");
                Ok(m.planes.clone())
            }
            current => {
                debug!(target: "zenframe", ?current, requested = ?mode, "map refused");
                Err(MapError::AlreadyMapped {
                    current,
                    requested: mode,
                })
            }
        }
    }

    /// Map for CPU access. Returns [`MapData::empty`] on failure.
    pub fn map(&self, mode: MapMode) -> MapData {
        self.try_map(mode).unwrap_or_default()
    }

    /// Release one level of mapping. The backend is unmapped when the
    /// outermost mapping is released. No-op when not mapped.
    pub fn unmap(&self) {
        let mut m = self.lock();
        if m.mode == MapMode::NotMapped {
            return;
        }
        m.depth -= 1;
        trace!(target: "zenframe", depth = m.depth, "unmap");
        if m.depth == 0 {
            m.buffer.unmap();
            m.mode = MapMode::NotMapped;
            m.planes = MapData::empty();
        }
    }

    pub fn map_mode(&self) -> MapMode {
        self.lock().mode
    }

    pub fn is_mapped(&self) -> bool {
        self.map_mode() != MapMode::NotMapped
    }

    /// Outstanding map calls not yet balanced by `unmap`.
    pub fn map_depth(&self) -> usize {
        self.lock().depth
    }

    /// Planes of the current mapping; empty when not mapped.
    pub fn current_mapping(&self) -> MapData {
        self.lock().planes.clone()
    }

    /// Run `f` with the current mode and planes while the mapping is held
    /// locked, so it cannot be released underneath `f`.
    pub(crate) fn with_mapping<R>(&self, f: impl FnOnce(MapMode, &MapData) -> R) -> R {
        let m = self.lock();
        f(m.mode, &m.planes)
    }

    pub fn handle_type(&self) -> HandleType {
        self.lock().buffer.handle_type()
    }

    pub fn texture_handle(&self, plane: usize) -> u64 {
        self.lock().buffer.texture_handle(plane)
    }

    /// Backing bytes of `plane`. `None` while mapped for writing, since the
    /// mapping may still change them.
    pub fn underlying_bytes(&self, plane: usize) -> Option<Arc<Vec<u8>>> {
        let m = self.lock();
        if m.mode.is_writable() {
            return None;
        }
        m.buffer.underlying_bytes(plane)
    }

    /// Whether both handles share one buffer.
    pub fn ptr_eq(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.lock();
        write!(
            f,
            "PixelBuffer({:?}, depth {}, {:?})",
            m.mode,
            m.depth,
            m.buffer.handle_type()
        )
    }
}
