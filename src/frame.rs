//! Video frame handle.
//!
//! A [`VideoFrame`] pairs a [`FrameFormat`] with an optional
//! [`PixelBuffer`]. Cloning a frame is cheap: clones share the buffer and
//! its map state but keep their own copy of the timing and presentation
//! metadata. A frame without a buffer is *invalid*; it still reports the
//! format it was created with and every map request on it fails.

use std::{ptr, slice};

use tracing::{debug, warn};

use crate::buffer::{HandleType, MapData, MapMode, MappedPlane, MemoryVideoBuffer, VideoBuffer};
use crate::limits::{FrameLimits, LimitExceeded};
use crate::pixel_buffer::{MapError, PixelBuffer};
use crate::{FrameFormat, Image, ImageFormat, PixelFormat, Rotation};

/// Why a frame could not be built or exported.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The format fails [`FrameFormat::is_valid`].
    #[error("frame format is invalid")]
    InvalidFormat,
    /// The source image has no pixels.
    #[error("image is null")]
    NullImage,
    /// The image could not be converted to a frame-compatible layout.
    #[error("image format {0:?} cannot back a frame")]
    UnsupportedImageFormat(ImageFormat),
    /// The frame's pixel format cannot be exported as an image.
    #[error("pixel format {0} has no image equivalent")]
    UnsupportedPixelFormat(PixelFormat),
    /// A [`FrameLimits`] check failed.
    #[error(transparent)]
    Limit(#[from] LimitExceeded),
    /// Mapping the buffer failed.
    #[error(transparent)]
    Map(#[from] MapError),
}

/// A video frame: format, timing, and a shared pixel buffer.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    buffer: Option<PixelBuffer>,
    format: FrameFormat,
    start_time: i64,
    end_time: i64,
}

impl Default for VideoFrame {
    fn default() -> Self {
        Self::null()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl VideoFrame {
    /// A frame with no buffer and no format.
    pub fn null() -> Self {
        Self::with_buffer(None, FrameFormat::default())
    }

    fn with_buffer(buffer: Option<PixelBuffer>, format: FrameFormat) -> Self {
        Self {
            buffer,
            format,
            start_time: -1,
            end_time: -1,
        }
    }

    /// Allocate a zeroed frame for `format`.
    ///
    /// An invalid format yields an invalid frame that still reports the
    /// requested size and pixel format.
    pub fn new(format: FrameFormat) -> Self {
        if !format.is_valid() {
            debug!(target: "zenframe", ?format, "invalid format, frame has no buffer");
            return Self::with_buffer(None, format);
        }
        Self::allocate(format)
    }

    /// Allocate a zeroed frame, failing on an invalid format.
    pub fn try_new(format: FrameFormat) -> Result<Self, FrameError> {
        Self::try_new_with_limits(format, &FrameLimits::none())
    }

    /// Allocate a zeroed frame within `limits`.
    ///
    /// Limits are checked before allocating, and before validity so that a
    /// format too large to address reports the memory limit it exceeds.
    pub fn try_new_with_limits(
        format: FrameFormat,
        limits: &FrameLimits,
    ) -> Result<Self, FrameError> {
        limits.check_format(&format)?;
        if !format.is_valid() {
            return Err(FrameError::InvalidFormat);
        }
        Ok(Self::allocate(format))
    }

    fn allocate(format: FrameFormat) -> Self {
        let buffer = MemoryVideoBuffer::new(vec![0; format.bytes_per_frame()], format.bytes_per_line());
        Self::with_buffer(Some(PixelBuffer::new(buffer)), format)
    }

    /// Wrap a backend. The frame takes ownership and drops the backend with
    /// its last clone.
    pub fn from_buffer(buffer: impl VideoBuffer + 'static, format: FrameFormat) -> Self {
        Self::from_pixel_buffer(PixelBuffer::new(buffer), format)
    }

    /// Wrap an existing shared buffer.
    pub fn from_pixel_buffer(buffer: PixelBuffer, format: FrameFormat) -> Self {
        Self::with_buffer(Some(buffer), format)
    }

    /// Copy an image into a new frame.
    ///
    /// Returns an invalid frame for null images. See
    /// [`try_from_image`](Self::try_from_image).
    pub fn from_image(image: &Image) -> Self {
        Self::try_from_image(image).unwrap_or_default()
    }

    /// Copy an image into a new frame.
    ///
    /// Images whose layout has a pixel format equivalent are copied byte
    /// for byte. Others are first converted to `Argb32Premultiplied` when
    /// premultiplied, to `Argb32` when they carry alpha, or to `Rgb32`.
    pub fn try_from_image(image: &Image) -> Result<Self, FrameError> {
        Self::try_from_image_with_limits(image, &FrameLimits::none())
    }

    /// Like [`try_from_image`](Self::try_from_image), checking `limits`
    /// before any copy or conversion.
    pub fn try_from_image_with_limits(
        image: &Image,
        limits: &FrameLimits,
    ) -> Result<Self, FrameError> {
        if image.is_null() {
            return Err(FrameError::NullImage);
        }
        let (width, height) = (image.width(), image.height());
        limits.check_dimensions(width, height)?;

        let direct = PixelFormat::from_image_format(image.format());
        let target = if direct != PixelFormat::Invalid {
            None
        } else if image.format().is_premultiplied() {
            Some(ImageFormat::Argb32Premultiplied)
        } else if image.has_alpha_channel() {
            Some(ImageFormat::Argb32)
        } else {
            Some(ImageFormat::Rgb32)
        };
        let stride = match target {
            Some(target) => target.bytes_per_line(width),
            None => image.bytes_per_line(),
        };
        let bytes = stride
            .checked_mul(height as usize)
            .map_or(u64::MAX, |b| b as u64);
        limits.check_memory(bytes)?;

        let converted;
        let (source, pixel_format) = match target {
            None => (image, direct),
            Some(target) => {
                debug!(
                    target: "zenframe",
                    from = ?image.format(),
                    to = ?target,
                    "converting image for frame"
                );
                converted = image.convert_to(target);
                if converted.is_null() {
                    return Err(FrameError::UnsupportedImageFormat(image.format()));
                }
                (&converted, PixelFormat::from_image_format(target))
            }
        };

        let format = FrameFormat::new(width, height, pixel_format);
        let buffer = MemoryVideoBuffer::new(source.data().to_vec(), source.bytes_per_line());
        Ok(Self::from_buffer(buffer, format))
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

impl VideoFrame {
    /// Whether the frame has a buffer and a nonzero size.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.buffer.is_some() && self.format.width() > 0 && self.format.height() > 0
    }

    /// Map the frame for CPU access, or explain why not.
    ///
    /// When the backend exposes one region for a multi-plane format, the
    /// region is split into the format's planes. A region too small for the
    /// format fails with [`MapError::PlaneLayout`] and leaves the frame
    /// unmapped.
    pub fn try_map(&self, mode: MapMode) -> Result<(), MapError> {
        let buffer = self.buffer.as_ref().ok_or(MapError::NullBuffer)?;
        let mapped = buffer.try_map(mode)?;
        if self.frame_planes(&mapped).is_none() {
            let pixel_format = self.format.pixel_format();
            warn!(
                target: "zenframe",
                format = %pixel_format,
                width = self.format.width(),
                height = self.format.height(),
                bytes = mapped.plane(0).map_or(0, MappedPlane::len),
                "mapped region does not fit the pixel format"
            );
            buffer.unmap();
            return Err(MapError::PlaneLayout {
                format: pixel_format,
            });
        }
        Ok(())
    }

    /// Map the frame for CPU access. Returns `false` on failure.
    ///
    /// Read-only maps nest; each successful call must be balanced by one
    /// [`unmap`](Self::unmap). The mapping is shared with every clone.
    pub fn map(&self, mode: MapMode) -> bool {
        self.try_map(mode).is_ok()
    }

    /// Release one level of mapping. No-op when not mapped.
    pub fn unmap(&self) {
        if let Some(buffer) = &self.buffer {
            buffer.unmap();
        }
    }

    pub fn map_mode(&self) -> MapMode {
        self.buffer
            .as_ref()
            .map_or(MapMode::NotMapped, PixelBuffer::map_mode)
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map_mode() != MapMode::NotMapped
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.map_mode().is_readable()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.map_mode().is_writable()
    }

    /// Split a backend mapping into this frame's planes.
    fn frame_planes(&self, mapped: &MapData) -> Option<MapData> {
        if mapped.plane_count() > 1 || self.format.plane_count() <= 1 {
            return Some(mapped.clone());
        }
        let region = mapped.plane(0)?;
        let spans = self.format.pixel_format().split_planes(
            region.stride(),
            self.format.height(),
            region.len(),
        )?;
        Some(MapData::from_planes(spans.iter().map(|span| {
            MappedPlane::new(region.data().wrapping_add(span.offset), span.stride, span.len)
        })))
    }

    fn mapped_planes(&self) -> MapData {
        self.buffer
            .as_ref()
            .and_then(|buffer| self.frame_planes(&buffer.current_mapping()))
            .unwrap_or_default()
    }

    fn mapped_plane(&self, plane: usize) -> Option<MappedPlane> {
        self.mapped_planes().plane(plane).copied()
    }

    /// Start of `plane` in the current mapping. Null when unmapped or out
    /// of range.
    pub fn bits(&self, plane: usize) -> *const u8 {
        self.mapped_plane(plane)
            .map_or(ptr::null(), |p| p.data().cast_const())
    }

    /// Writable start of `plane`. Null unless the mapping is writable.
    pub fn bits_mut(&self, plane: usize) -> *mut u8 {
        if !self.is_writable() {
            return ptr::null_mut();
        }
        self.mapped_plane(plane)
            .map_or(ptr::null_mut(), |p| p.data())
    }

    /// Stride of `plane`. Zero when unmapped or out of range.
    pub fn bytes_per_line(&self, plane: usize) -> usize {
        self.mapped_plane(plane).map_or(0, |p| p.stride())
    }

    /// Byte length of `plane`. Zero when unmapped or out of range.
    pub fn mapped_bytes(&self, plane: usize) -> usize {
        self.mapped_plane(plane).map_or(0, |p| p.len())
    }

    /// Planes of the pixel format, mapped or not.
    #[inline]
    pub fn plane_count(&self) -> usize {
        self.format.plane_count()
    }

    /// Copy out the bytes of `plane`. Requires a readable mapping.
    pub fn copy_plane(&self, plane: usize) -> Option<Vec<u8>> {
        let buffer = self.buffer.as_ref()?;
        buffer.with_mapping(|mode, mapped| {
            if !mode.is_readable() {
                return None;
            }
            let p = *self.frame_planes(mapped)?.plane(plane)?;
            if p.data().is_null() {
                return None;
            }
            // SAFETY: the mapping stays locked for the copy and covers
            // `p.len()` bytes.
            Some(unsafe { slice::from_raw_parts(p.data(), p.len()) }.to_vec())
        })
    }

    /// Copy `bytes` to the start of `plane`. Requires a writable mapping
    /// and `bytes` no longer than the plane.
    pub fn write_plane(&self, plane: usize, bytes: &[u8]) -> bool {
        let Some(buffer) = &self.buffer else {
            return false;
        };
        buffer.with_mapping(|mode, mapped| {
            if !mode.is_writable() {
                return false;
            }
            let Some(p) = self.frame_planes(mapped).and_then(|m| m.plane(plane).copied()) else {
                return false;
            };
            if p.data().is_null() || bytes.len() > p.len() {
                return false;
            }
            // SAFETY: write maps are exclusive, the mapping stays locked for
            // the copy, and the plane covers at least `bytes.len()` bytes.
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), p.data(), bytes.len()) };
            true
        })
    }

    /// Borrow the bytes of `plane` from a readable mapping.
    ///
    /// # Safety
    ///
    /// The slice aliases the mapped storage. The caller must keep the
    /// mapping alive, through this frame and every clone sharing its
    /// buffer, for as long as the slice is used.
    pub unsafe fn plane_slice(&self, plane: usize) -> Option<&[u8]> {
        if !self.is_readable() {
            return None;
        }
        let p = self.mapped_plane(plane)?;
        if p.data().is_null() {
            return None;
        }
        // SAFETY: the caller keeps the read mapping alive; read maps never
        // coexist with writers.
        Some(unsafe { slice::from_raw_parts(p.data(), p.len()) })
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

impl VideoFrame {
    /// Presentation start time in microseconds; `-1` when unset.
    #[inline]
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn set_start_time(&mut self, time: i64) {
        self.start_time = time;
    }

    /// Presentation end time in microseconds; `-1` when unset.
    #[inline]
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn set_end_time(&mut self, time: i64) {
        self.end_time = time;
    }

    #[inline]
    pub fn rotation(&self) -> Rotation {
        self.format.rotation()
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.format.set_rotation(rotation);
    }

    #[inline]
    pub fn mirrored(&self) -> bool {
        self.format.mirrored()
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.format.set_mirrored(mirrored);
    }

    #[inline]
    pub fn stream_frame_rate(&self) -> f64 {
        self.format.stream_frame_rate()
    }

    pub fn set_stream_frame_rate(&mut self, rate: f64) {
        self.format.set_stream_frame_rate(rate);
    }

    /// The format, including any metadata changed through this handle.
    #[inline]
    pub fn surface_format(&self) -> FrameFormat {
        self.format
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.format.pixel_format()
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.format.size()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.format.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.format.height()
    }

    pub fn handle_type(&self) -> HandleType {
        self.buffer
            .as_ref()
            .map_or(HandleType::NoHandle, PixelBuffer::handle_type)
    }

    /// Native handle of `plane`. Zero for CPU buffers and invalid frames.
    pub fn texture_handle(&self, plane: usize) -> u64 {
        self.buffer
            .as_ref()
            .map_or(0, |buffer| buffer.texture_handle(plane))
    }

    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.buffer.as_ref()
    }

    /// Whether both frames are backed by the same buffer.
    pub fn shares_buffer_with(&self, other: &VideoFrame) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Packed 32-bit layouts that convert to an image by reordering bytes:
/// target format, byte positions of R, G, B, and of alpha if stored.
fn packed_layout(format: PixelFormat) -> Option<(ImageFormat, [usize; 3], Option<usize>)> {
    Some(match format {
        PixelFormat::Argb8888 => (ImageFormat::Argb32, [1, 2, 3], Some(0)),
        PixelFormat::Argb8888Premultiplied => (ImageFormat::Argb32Premultiplied, [1, 2, 3], Some(0)),
        PixelFormat::Xrgb8888 => (ImageFormat::Rgb32, [1, 2, 3], None),
        PixelFormat::Bgra8888 => (ImageFormat::Argb32, [2, 1, 0], Some(3)),
        PixelFormat::Bgra8888Premultiplied => (ImageFormat::Argb32Premultiplied, [2, 1, 0], Some(3)),
        PixelFormat::Bgrx8888 => (ImageFormat::Rgb32, [2, 1, 0], None),
        PixelFormat::Abgr8888 => (ImageFormat::Argb32, [3, 2, 1], Some(0)),
        PixelFormat::Xbgr8888 => (ImageFormat::Rgb32, [3, 2, 1], None),
        _ => return None,
    })
}

impl VideoFrame {
    /// Copy the frame into an [`Image`].
    ///
    /// See [`try_to_image`](Self::try_to_image).
    pub fn to_image(&self) -> Option<Image> {
        self.try_to_image().ok()
    }

    /// Copy the frame into an [`Image`].
    ///
    /// Formats with an image equivalent are copied row for row; other
    /// packed 32-bit RGB layouts are reordered into `Argb32`, `Rgb32`, or
    /// `Argb32Premultiplied`. YUV and JPEG frames are not converted. The
    /// frame is mapped read-only for the copy, so this fails while it is
    /// mapped for writing.
    pub fn try_to_image(&self) -> Result<Image, FrameError> {
        let pixel_format = self.pixel_format();
        let (target, layout) = match pixel_format.image_format() {
            Some(format) => (format, None),
            None => {
                let (format, rgb, alpha) = packed_layout(pixel_format)
                    .ok_or(FrameError::UnsupportedPixelFormat(pixel_format))?;
                (format, Some((rgb, alpha)))
            }
        };
        self.try_map(MapMode::ReadOnly)?;
        let stride = self.bytes_per_line(0);
        let bytes = self.copy_plane(0);
        self.unmap();
        let bytes = bytes.ok_or(MapError::NoData)?;

        let (width, height) = self.size();
        let image = match layout {
            None => Image::from_vec(width, height, target, stride, bytes).ok(),
            Some((rgb, alpha)) => swizzle(&bytes, stride, width, height, target, rgb, alpha),
        };
        image.ok_or(FrameError::Map(MapError::PlaneLayout {
            format: pixel_format,
        }))
    }
}

fn swizzle(
    bytes: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    target: ImageFormat,
    [r, g, b]: [usize; 3],
    alpha: Option<usize>,
) -> Option<Image> {
    let mut out = Image::new(width, height, target);
    let out_stride = out.bytes_per_line();
    let row_len = width as usize * 4;
    for y in 0..height as usize {
        let src = bytes.get(y * stride..y * stride + row_len)?;
        let dst = &mut out.data_mut()[y * out_stride..y * out_stride + row_len];
        for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
            let a = alpha.map_or(0xff, |i| s[i]);
            let argb = u32::from_be_bytes([a, s[r], s[g], s[b]]);
            d.copy_from_slice(&argb.to_ne_bytes());
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextureVideoBuffer;
    use rayon::prelude::*;
    use rgb::Rgba;
    use std::sync::{Arc, Weak};

    const VALID_MODES: [MapMode; 3] = [MapMode::ReadOnly, MapMode::WriteOnly, MapMode::ReadWrite];

    fn argb(width: u32, height: u32) -> VideoFrame {
        VideoFrame::new(FrameFormat::new(width, height, PixelFormat::Argb8888))
    }

    /// Backend that never maps and reports when it is dropped.
    struct DummyBuffer {
        handle_type: HandleType,
        _alive: Arc<()>,
    }

    impl DummyBuffer {
        fn new(handle_type: HandleType) -> (Self, Weak<()>) {
            let alive = Arc::new(());
            let weak = Arc::downgrade(&alive);
            (
                Self {
                    handle_type,
                    _alive: alive,
                },
                weak,
            )
        }
    }

    impl VideoBuffer for DummyBuffer {
        fn handle_type(&self) -> HandleType {
            self.handle_type
        }

        fn map_mode(&self) -> MapMode {
            MapMode::NotMapped
        }

        fn map(&mut self, _mode: MapMode) -> MapData {
            MapData::empty()
        }

        fn unmap(&mut self) {}
    }

    /// 1024 bytes exposed as three planes with their own strides.
    struct PlanarBuffer {
        data: Vec<u8>,
        mode: MapMode,
    }

    impl VideoBuffer for PlanarBuffer {
        fn map_mode(&self) -> MapMode {
            self.mode
        }

        fn map(&mut self, mode: MapMode) -> MapData {
            if mode == MapMode::NotMapped || self.mode != MapMode::NotMapped {
                return MapData::empty();
            }
            self.mode = mode;
            let base = self.data.as_mut_ptr();
            MapData::from_planes([
                MappedPlane::new(base, 64, 512),
                MappedPlane::new(base.wrapping_add(512), 36, 253),
                MappedPlane::new(base.wrapping_add(765), 36, 259),
            ])
        }

        fn unmap(&mut self) {
            self.mode = MapMode::NotMapped;
        }
    }

    fn assert_unmapped(frame: &VideoFrame) {
        assert!(frame.bits(0).is_null());
        assert!(!frame.is_mapped());
        assert_eq!(frame.mapped_bytes(0), 0);
        assert_eq!(frame.bytes_per_line(0), 0);
        assert_eq!(frame.map_mode(), MapMode::NotMapped);
    }

    #[test]
    fn is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VideoFrame>();
    }

    // --- Construction ---

    #[test]
    fn create_allocates_buffer() {
        let cases = [
            (64, 64, PixelFormat::Argb8888, 256),
            (32, 256, PixelFormat::Yuv420p, 32),
            (32, 256, PixelFormat::Uyvy, 64),
        ];
        for (w, h, pixel_format, stride) in cases {
            let frame = VideoFrame::new(FrameFormat::new(w, h, pixel_format));
            assert!(frame.is_valid(), "{pixel_format}");
            assert!(frame.buffer().is_some());
            assert_eq!(frame.handle_type(), HandleType::NoHandle);
            assert_eq!(frame.texture_handle(0), 0);
            assert_eq!(frame.pixel_format(), pixel_format);
            assert_eq!(frame.size(), (w, h));
            assert_eq!(frame.width(), w);
            assert_eq!(frame.height(), h);
            assert_eq!(frame.start_time(), -1);
            assert_eq!(frame.end_time(), -1);

            assert!(frame.map(MapMode::ReadOnly));
            assert_eq!(frame.bytes_per_line(0), stride, "{pixel_format}");
            assert!(frame.copy_plane(0).unwrap().iter().all(|&b| b == 0));
            frame.unmap();
        }
    }

    #[test]
    fn create_invalid_keeps_format() {
        for (w, h, pixel_format) in [(0, 64, PixelFormat::Argb8888), (32, 0, PixelFormat::Yuv420p)] {
            let frame = VideoFrame::new(FrameFormat::new(w, h, pixel_format));
            assert!(!frame.is_valid());
            assert!(frame.buffer().is_none());
            assert_eq!(frame.pixel_format(), pixel_format);
            assert_eq!(frame.size(), (w, h));
            assert!(!frame.map(MapMode::ReadOnly));
        }
    }

    #[test]
    fn try_new_rejects_invalid_format() {
        let err = VideoFrame::try_new(FrameFormat::new(0, 64, PixelFormat::Argb8888)).unwrap_err();
        assert_eq!(err, FrameError::InvalidFormat);
        assert!(VideoFrame::try_new(FrameFormat::new(8, 8, PixelFormat::Nv12)).is_ok());
    }

    #[test]
    fn try_new_respects_limits() {
        let format = FrameFormat::new(640, 480, PixelFormat::Nv12);
        let limits = FrameLimits::none().with_max_memory(460_799);
        assert_eq!(
            VideoFrame::try_new_with_limits(format, &limits).unwrap_err(),
            FrameError::Limit(LimitExceeded::Memory {
                actual: 460_800,
                max: 460_799
            })
        );
        let limits = FrameLimits::none().with_max_memory(460_800);
        assert!(VideoFrame::try_new_with_limits(format, &limits).is_ok());
    }

    #[test]
    fn oversized_format_fails_without_allocating() {
        let format = FrameFormat::new(u32::MAX, 1 << 30, PixelFormat::Argb8888);
        let limits = FrameLimits::none().with_max_memory(1 << 30);
        assert_eq!(
            VideoFrame::try_new_with_limits(format, &limits).unwrap_err(),
            FrameError::Limit(LimitExceeded::Memory {
                actual: u64::MAX,
                max: 1 << 30
            })
        );
        assert_eq!(
            VideoFrame::try_new(format).unwrap_err(),
            FrameError::InvalidFormat
        );
        let frame = VideoFrame::new(format);
        assert!(!frame.is_valid());
        assert!(frame.buffer().is_none());
        assert_eq!(frame.size(), (u32::MAX, 1 << 30));
    }

    #[test]
    fn create_from_buffer() {
        for handle_type in [HandleType::NoHandle, HandleType::Texture] {
            let (buffer, _) = DummyBuffer::new(handle_type);
            let frame =
                VideoFrame::from_buffer(buffer, FrameFormat::new(64, 64, PixelFormat::Argb8888));
            assert!(frame.is_valid());
            assert_eq!(frame.handle_type(), handle_type);
            assert_eq!(frame.pixel_format(), PixelFormat::Argb8888);
            assert_eq!(frame.start_time(), -1);
            assert!(!frame.map(MapMode::ReadOnly));
        }
        let (buffer, _) = DummyBuffer::new(HandleType::NoHandle);
        let sizeless = VideoFrame::from_buffer(buffer, FrameFormat::new(0, 8, PixelFormat::Y8));
        assert!(!sizeless.is_valid());
        assert!(sizeless.buffer().is_some());
    }

    #[test]
    fn texture_frame_reports_handles() {
        let frame = VideoFrame::from_buffer(
            TextureVideoBuffer::new(&[11, 12]),
            FrameFormat::new(16, 16, PixelFormat::Nv12),
        );
        assert_eq!(frame.handle_type(), HandleType::Texture);
        assert_eq!(frame.texture_handle(0), 11);
        assert_eq!(frame.texture_handle(1), 12);
        assert_eq!(frame.texture_handle(2), 0);
        assert_eq!(frame.try_map(MapMode::ReadOnly), Err(MapError::NoData));
    }

    #[test]
    fn null_frame() {
        let frame = VideoFrame::default();
        assert!(!frame.is_valid());
        assert_eq!(frame.handle_type(), HandleType::NoHandle);
        assert_eq!(frame.pixel_format(), PixelFormat::Invalid);
        assert_eq!(frame.size(), (0, 0));
        assert_eq!(frame.start_time(), -1);
        assert_eq!(frame.end_time(), -1);
        assert_eq!(frame.plane_count(), 0);
        for mode in VALID_MODES {
            assert_eq!(frame.try_map(mode), Err(MapError::NullBuffer));
            assert!(!frame.map(mode));
        }
        frame.unmap();
        assert!(!frame.is_readable());
        assert!(!frame.is_writable());
        assert_unmapped(&frame);
        assert!(frame.copy_plane(0).is_none());
        assert!(!frame.write_plane(0, &[1]));
        assert!(frame.to_image().is_none());
    }

    #[test]
    fn null_buffer_with_format() {
        let frame = VideoFrame::new(FrameFormat::new(1024, 768, PixelFormat::Invalid));
        assert!(!frame.is_valid());
        assert_eq!(frame.size(), (1024, 768));

        let frame = VideoFrame {
            format: FrameFormat::new(1024, 768, PixelFormat::Argb8888),
            ..VideoFrame::null()
        };
        assert_eq!(frame.pixel_format(), PixelFormat::Argb8888);
        assert_eq!(frame.size(), (1024, 768));
        assert!(!frame.map(MapMode::ReadWrite));
    }

    #[test]
    fn drop_releases_buffer() {
        let (buffer, alive) = DummyBuffer::new(HandleType::NoHandle);
        let frame = VideoFrame::from_buffer(buffer, FrameFormat::new(4, 4, PixelFormat::Argb8888));
        let copy = frame.clone();
        drop(frame);
        assert!(alive.upgrade().is_some());
        drop(copy);
        assert!(alive.upgrade().is_none());
    }

    // --- Sharing ---

    #[test]
    fn clone_copies_metadata_and_shares_buffer() {
        for (start, end) in [(63_641_740, 63_641_954), (12_345, 12_389)] {
            let mut frame = argb(16, 16);
            frame.set_start_time(start);
            frame.set_end_time(end);

            let mut copy = frame.clone();
            assert!(copy.is_valid());
            assert!(copy.shares_buffer_with(&frame));
            assert_eq!(copy.pixel_format(), PixelFormat::Argb8888);
            assert_eq!(copy.start_time(), start);
            assert_eq!(copy.end_time(), end);

            copy.set_end_time(-1);
            assert_eq!(copy.end_time(), -1);
            assert_eq!(frame.end_time(), end);
        }
    }

    #[test]
    fn assigning_null_releases_buffer() {
        let (buffer, alive) = DummyBuffer::new(HandleType::NoHandle);
        let mut frame =
            VideoFrame::from_buffer(buffer, FrameFormat::new(4, 4, PixelFormat::Argb8888));
        frame.set_start_time(7);
        frame = VideoFrame::null();
        assert!(alive.upgrade().is_none());
        assert!(!frame.is_valid());
        assert_eq!(frame.start_time(), -1);
        assert!(!frame.shares_buffer_with(&VideoFrame::null()));
    }

    #[test]
    fn clones_see_writes() {
        let frame = argb(4, 1);
        let copy = frame.clone();
        assert!(frame.map(MapMode::ReadWrite));
        assert_eq!(copy.map_mode(), MapMode::ReadWrite);
        assert!(frame.write_plane(0, &[1, 2, 3, 4]));
        frame.unmap();

        assert!(copy.map(MapMode::ReadOnly));
        assert_eq!(&copy.copy_plane(0).unwrap()[..4], &[1, 2, 3, 4]);
        copy.unmap();
    }

    #[test]
    fn write_detaches_shared_bytes() {
        let shared = Arc::new(vec![9u8; 64]);
        let frame = VideoFrame::from_buffer(
            MemoryVideoBuffer::from_shared(Arc::clone(&shared), 16),
            FrameFormat::new(4, 4, PixelFormat::Argb8888),
        );
        assert!(frame.map(MapMode::ReadOnly));
        assert_eq!(frame.bits(0), shared.as_ptr());
        frame.unmap();

        assert!(frame.map(MapMode::WriteOnly));
        assert_ne!(frame.bits(0), shared.as_ptr());
        assert!(frame.write_plane(0, &[0; 16]));
        frame.unmap();
        assert!(shared.iter().all(|&b| b == 9));

        let underlying = frame.buffer().unwrap().underlying_bytes(0).unwrap();
        assert!(underlying[..16].iter().all(|&b| b == 0));
        assert!(underlying[16..].iter().all(|&b| b == 9));
    }

    #[test]
    fn snapshot_survives_later_writes() {
        let frame = argb(4, 1);
        let buffer = frame.buffer().unwrap();

        assert!(frame.map(MapMode::ReadWrite));
        assert!(buffer.underlying_bytes(0).is_none());
        frame.unmap();

        let snapshot = buffer.underlying_bytes(0).unwrap();
        assert!(frame.map(MapMode::ReadWrite));
        assert!(frame.write_plane(0, &[0xAB; 16]));
        frame.unmap();
        assert!(snapshot.iter().all(|&b| b == 0));
        assert_eq!(buffer.underlying_bytes(0).unwrap()[0], 0xAB);
    }

    // --- Mapping ---

    #[test]
    fn map_modes() {
        let frame = argb(64, 64);
        assert_unmapped(&frame);
        for mode in VALID_MODES {
            assert!(frame.map(mode));
            assert!(!frame.bits(0).is_null());
            assert!(frame.is_mapped());
            assert_eq!(frame.mapped_bytes(0), 16384);
            assert_eq!(frame.bytes_per_line(0), 256);
            assert_eq!(frame.map_mode(), mode);
            assert_eq!(frame.is_readable(), mode.is_readable());
            assert_eq!(frame.is_writable(), mode.is_writable());
            frame.unmap();
            assert_unmapped(&frame);
        }
    }

    #[test]
    fn nested_read_map() {
        let frame = argb(64, 64);
        assert!(frame.map(MapMode::ReadOnly));
        let bits = frame.bits(0);
        assert!(frame.map(MapMode::ReadOnly));
        assert_eq!(frame.bits(0), bits);
        assert!(frame.bits_mut(0).is_null());

        frame.unmap();
        assert!(frame.is_mapped());
        assert_eq!(frame.bits(0), bits);

        for mode in [MapMode::WriteOnly, MapMode::ReadWrite] {
            assert_eq!(
                frame.try_map(mode),
                Err(MapError::AlreadyMapped {
                    current: MapMode::ReadOnly,
                    requested: mode
                })
            );
        }
        frame.unmap();
        assert_unmapped(&frame);
    }

    #[test]
    fn write_map_is_exclusive() {
        for held in [MapMode::WriteOnly, MapMode::ReadWrite] {
            let frame = argb(64, 64);
            assert!(frame.map(held));
            assert!(!frame.bits_mut(0).is_null());
            for mode in VALID_MODES {
                assert!(!frame.map(mode), "{held:?} {mode:?}");
                assert_eq!(frame.map_mode(), held);
            }
            frame.unmap();
            assert_unmapped(&frame);
        }
    }

    #[test]
    fn empty_data_cannot_map() {
        let frame = VideoFrame::from_buffer(
            MemoryVideoBuffer::new(Vec::new(), 600),
            FrameFormat::new(800, 600, PixelFormat::Argb8888),
        );
        assert!(!frame.map(MapMode::ReadOnly));
        assert_eq!(frame.try_map(MapMode::ReadOnly), Err(MapError::NoData));
    }

    #[test]
    fn short_region_is_a_plane_layout_error() {
        let frame = VideoFrame::from_buffer(
            MemoryVideoBuffer::new(vec![0; 64 * 64], 64),
            FrameFormat::new(64, 64, PixelFormat::Yuv420p),
        );
        assert_eq!(
            frame.try_map(MapMode::ReadOnly),
            Err(MapError::PlaneLayout {
                format: PixelFormat::Yuv420p
            })
        );
        assert_unmapped(&frame);
    }

    #[test]
    fn multi_plane_backend_passes_through() {
        let frame = VideoFrame::from_buffer(
            PlanarBuffer {
                data: vec![0; 1024],
                mode: MapMode::NotMapped,
            },
            FrameFormat::new(64, 64, PixelFormat::Yuv420p),
        );
        assert!(frame.map(MapMode::ReadOnly));
        let base = frame.bits(0) as usize;
        assert_eq!(frame.bits(1) as usize - base, 512);
        assert_eq!(frame.bits(2) as usize - base, 765);
        assert_eq!(
            [0, 1, 2].map(|p| frame.bytes_per_line(p)),
            [64, 36, 36]
        );
        assert_eq!([0, 1, 2].map(|p| frame.mapped_bytes(p)), [512, 253, 259]);
        assert!(frame.bits(3).is_null());
        frame.unmap();
    }

    #[test]
    fn plane_geometry() {
        let cases: &[(PixelFormat, &[usize], &[usize])] = &[
            (PixelFormat::Argb8888, &[240], &[]),
            (PixelFormat::Yuv420p, &[64, 32, 32], &[4096, 5120]),
            (PixelFormat::Yv12, &[64, 32, 32], &[4096, 5120]),
            (PixelFormat::Yuv422p, &[64, 32, 32], &[4096, 6144]),
            (PixelFormat::Nv12, &[64, 64], &[4096]),
            (PixelFormat::Nv21, &[64, 64], &[4096]),
            (PixelFormat::Imc2, &[64, 64], &[4096]),
            (PixelFormat::Imc4, &[64, 64], &[4096]),
            (PixelFormat::Imc1, &[64, 64, 64], &[4096, 6144]),
            (PixelFormat::Imc3, &[64, 64, 64], &[4096, 6144]),
        ];
        for &(pixel_format, strides, offsets) in cases {
            let frame = VideoFrame::new(FrameFormat::new(60, 64, pixel_format));
            assert!(frame.map(MapMode::ReadOnly), "{pixel_format}");
            assert_eq!(frame.plane_count(), strides.len(), "{pixel_format}");
            for (plane, &stride) in strides.iter().enumerate() {
                assert_eq!(frame.bytes_per_line(plane), stride, "{pixel_format} plane {plane}");
            }
            let base = frame.bits(0) as usize;
            for (i, &offset) in offsets.iter().enumerate() {
                assert_eq!(frame.bits(i + 1) as usize - base, offset, "{pixel_format}");
            }
            let total: usize = (0..frame.plane_count()).map(|p| frame.mapped_bytes(p)).sum();
            assert_eq!(total, FrameFormat::new(60, 64, pixel_format).bytes_per_frame());
            frame.unmap();
        }
    }

    #[test]
    fn copy_and_write_need_matching_mode() {
        let frame = argb(4, 1);
        assert!(frame.copy_plane(0).is_none());
        assert!(!frame.write_plane(0, &[1]));

        assert!(frame.map(MapMode::WriteOnly));
        assert!(frame.copy_plane(0).is_none());
        assert!(frame.write_plane(0, &[5; 16]));
        assert!(!frame.write_plane(0, &[5; 17]));
        assert!(!frame.write_plane(1, &[5]));
        frame.unmap();

        assert!(frame.map(MapMode::ReadOnly));
        assert!(!frame.write_plane(0, &[1]));
        assert_eq!(frame.copy_plane(0).unwrap(), vec![5; 16]);
        assert!(frame.copy_plane(1).is_none());
        let slice = unsafe { frame.plane_slice(0) }.unwrap();
        assert_eq!(slice, &[5; 16]);
        frame.unmap();
        assert!(unsafe { frame.plane_slice(0) }.is_none());
    }

    #[test]
    fn writes_land_in_the_right_plane() {
        let frame = VideoFrame::new(FrameFormat::new(16, 4, PixelFormat::Nv12));
        assert!(frame.map(MapMode::ReadWrite));
        assert_eq!(frame.mapped_bytes(1), 16 * 2);
        assert!(frame.write_plane(1, &[0x80; 32]));
        let all = frame.buffer().unwrap().current_mapping();
        let region = all.plane(0).unwrap();
        let bytes = unsafe { slice::from_raw_parts(region.data(), region.len()) };
        assert!(bytes[..64].iter().all(|&b| b == 0));
        assert!(bytes[64..].iter().all(|&b| b == 0x80));
        frame.unmap();
    }

    #[test]
    fn concurrent_clones_read_the_same_planes() {
        let frame = VideoFrame::new(FrameFormat::new(32, 32, PixelFormat::Yuv420p));
        let results: Vec<(usize, usize)> = (0..32)
            .into_par_iter()
            .map(|_| {
                let local = frame.clone();
                assert!(local.map(MapMode::ReadOnly));
                (local.bits(0) as usize, local.bits(2) as usize)
            })
            .collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(frame.buffer().unwrap().map_depth(), 32);
        (0..32).into_par_iter().for_each(|_| frame.unmap());
        assert_unmapped(&frame);
    }

    // --- Metadata ---

    #[test]
    fn mirrored_from_format() {
        let format = FrameFormat::new(10, 20, PixelFormat::Argb8888).with_mirrored(true);
        let mut frame = VideoFrame::new(format);
        assert!(frame.mirrored());
        frame.set_mirrored(false);
        frame.set_rotation(Rotation::Clockwise180);
        assert!(!frame.mirrored());
        assert!(!frame.surface_format().mirrored());
    }

    #[test]
    fn rotation_from_format() {
        let format = FrameFormat::new(10, 20, PixelFormat::Argb8888)
            .with_rotation(Rotation::Clockwise270);
        let mut frame = VideoFrame::new(format);
        assert_eq!(frame.rotation(), Rotation::Clockwise270);
        frame.set_rotation(Rotation::Clockwise180);
        assert_eq!(frame.rotation(), Rotation::Clockwise180);
        assert_eq!(frame.surface_format().rotation(), Rotation::Clockwise180);
    }

    #[test]
    fn stream_frame_rate_from_format() {
        let format = FrameFormat::new(10, 20, PixelFormat::Argb8888).with_stream_frame_rate(20.0);
        let mut frame = VideoFrame::new(format);
        assert_eq!(frame.stream_frame_rate(), 20.0);
        frame.set_stream_frame_rate(25.0);
        assert_eq!(frame.stream_frame_rate(), 25.0);
        assert_eq!(frame.surface_format().stream_frame_rate(), 25.0);
    }

    // --- Images ---

    /// 3x2 of opaque primaries: red, green, blue over blue, red, green.
    fn primaries(format: ImageFormat) -> Image {
        let mut image = Image::new(3, 2, ImageFormat::Rgba8888);
        let colors = [
            Rgba::new(255, 0, 0, 255),
            Rgba::new(0, 255, 0, 255),
            Rgba::new(0, 0, 255, 255),
        ];
        for x in 0..3 {
            image.set_pixel(x, 0, colors[x as usize]);
            image.set_pixel(x, 1, colors[(x as usize + 2) % 3]);
        }
        image.convert_to(format)
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn image_formats_map_to_pixel_formats() {
        use ImageFormat as I;
        use PixelFormat as P;
        let cases = [
            (I::Mono, P::Bgrx8888),
            (I::MonoLsb, P::Bgrx8888),
            (I::Indexed8, P::Bgrx8888),
            (I::Rgb32, P::Bgrx8888),
            (I::Argb32, P::Bgra8888),
            (I::Argb32Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgb16, P::Bgrx8888),
            (I::Argb8565Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgb666, P::Bgrx8888),
            (I::Argb6666Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgb555, P::Bgrx8888),
            (I::Argb8555Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgb888, P::Bgrx8888),
            (I::Rgb444, P::Bgrx8888),
            (I::Argb4444Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgbx8888, P::Rgbx8888),
            (I::Rgba8888, P::Rgba8888),
            (I::Rgba8888Premultiplied, P::Rgbx8888),
            (I::Bgr30, P::Bgrx8888),
            (I::A2Bgr30Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgb30, P::Bgrx8888),
            (I::A2Rgb30Premultiplied, P::Bgra8888Premultiplied),
            (I::Alpha8, P::Bgra8888),
            (I::Grayscale8, P::Y8),
            (I::Grayscale16, P::Y16),
            (I::Rgbx64, P::Bgrx8888),
            (I::Rgba64, P::Bgra8888),
            (I::Rgba64Premultiplied, P::Bgra8888Premultiplied),
            (I::Bgr888, P::Bgrx8888),
            (I::Rgbx16FPx4, P::Bgrx8888),
            (I::Rgba16FPx4, P::Bgra8888),
            (I::Rgba16FPx4Premultiplied, P::Bgra8888Premultiplied),
            (I::Rgbx32FPx4, P::Bgrx8888),
            (I::Rgba32FPx4, P::Bgra8888),
            (I::Rgba32FPx4Premultiplied, P::Bgra8888Premultiplied),
        ];
        for (image_format, pixel_format) in cases {
            let image = primaries(image_format);
            assert!(!image.is_null(), "{image_format:?}");
            let frame = VideoFrame::from_image(&image);
            assert!(frame.is_valid(), "{image_format:?}");
            assert_eq!(frame.pixel_format(), pixel_format, "{image_format:?}");
            assert_eq!(frame.size(), (3, 2));

            let exported = frame.to_image().unwrap();
            for y in 0..2 {
                for x in 0..3 {
                    assert_eq!(
                        exported.pixel(x, y),
                        image.pixel(x, y),
                        "{image_format:?} at {x},{y}"
                    );
                }
            }
        }
    }

    #[test]
    fn direct_image_formats_copy_bytes() {
        for format in [ImageFormat::Rgba8888, ImageFormat::Grayscale8, ImageFormat::Rgb32] {
            let image = primaries(format);
            let frame = VideoFrame::from_image(&image);
            assert!(frame.map(MapMode::ReadOnly));
            assert_eq!(frame.bytes_per_line(0), image.bytes_per_line());
            assert_eq!(frame.copy_plane(0).unwrap(), image.data());
            frame.unmap();
        }
    }

    #[test]
    fn null_or_empty_image_gives_invalid_frame() {
        assert!(!VideoFrame::from_image(&Image::null()).is_valid());
        assert_eq!(
            VideoFrame::try_from_image(&Image::null()).unwrap_err(),
            FrameError::NullImage
        );
        for (w, h) in [(0, 0), (1, 0), (0, 1)] {
            assert!(!VideoFrame::from_image(&Image::new(w, h, ImageFormat::Rgb32)).is_valid());
        }
        assert!(!VideoFrame::from_image(&Image::new(1, 1, ImageFormat::Invalid)).is_valid());
    }

    #[test]
    fn image_limits_checked_before_copy() {
        let image = Image::new(100, 10, ImageFormat::Rgb888);
        let limits = FrameLimits::none().with_max_width(64);
        assert_eq!(
            VideoFrame::try_from_image_with_limits(&image, &limits).unwrap_err(),
            FrameError::Limit(LimitExceeded::Width {
                actual: 100,
                max: 64
            })
        );
        // converted to 4 bytes per pixel
        let limits = FrameLimits::none().with_max_memory(3999);
        assert_eq!(
            VideoFrame::try_from_image_with_limits(&image, &limits).unwrap_err(),
            FrameError::Limit(LimitExceeded::Memory {
                actual: 4000,
                max: 3999
            })
        );
    }

    #[test]
    fn packed_rgb_frames_export() {
        let formats = [
            PixelFormat::Argb8888,
            PixelFormat::Argb8888Premultiplied,
            PixelFormat::Xrgb8888,
            PixelFormat::Bgra8888,
            PixelFormat::Bgra8888Premultiplied,
            PixelFormat::Bgrx8888,
            PixelFormat::Abgr8888,
            PixelFormat::Xbgr8888,
            PixelFormat::Rgba8888,
            PixelFormat::Rgbx8888,
            PixelFormat::Y8,
            PixelFormat::Y16,
        ];
        for pixel_format in formats {
            let frame = VideoFrame::new(FrameFormat::new(64, 64, pixel_format));
            let image = frame.to_image().unwrap();
            assert!(!image.is_null(), "{pixel_format}");
            assert_eq!((image.width(), image.height()), (64, 64), "{pixel_format}");
        }
    }

    #[test]
    fn swizzled_export_reads_channels() {
        // one pixel: r=10 g=20 b=30 a=40 in each byte order
        let cases = [
            (PixelFormat::Argb8888, [40, 10, 20, 30], 40),
            (PixelFormat::Xrgb8888, [0, 10, 20, 30], 255),
            (PixelFormat::Abgr8888, [40, 30, 20, 10], 40),
            (PixelFormat::Xbgr8888, [0, 30, 20, 10], 255),
            (PixelFormat::Bgra8888, [30, 20, 10, 40], 40),
            (PixelFormat::Bgrx8888, [30, 20, 10, 0], 255),
        ];
        for (pixel_format, bytes, alpha) in cases {
            let frame = VideoFrame::new(FrameFormat::new(1, 1, pixel_format));
            assert!(frame.map(MapMode::WriteOnly));
            assert!(frame.write_plane(0, &bytes));
            frame.unmap();
            let image = frame.to_image().unwrap();
            assert_eq!(
                image.pixel(0, 0),
                Some(Rgba::new(10, 20, 30, alpha)),
                "{pixel_format}"
            );
        }
    }

    #[test]
    fn yuv_frames_do_not_export() {
        for pixel_format in [PixelFormat::Yuv420p, PixelFormat::Nv12, PixelFormat::Uyvy, PixelFormat::Jpeg] {
            let frame = VideoFrame::new(FrameFormat::new(64, 64, pixel_format));
            assert_eq!(
                frame.try_to_image().unwrap_err(),
                FrameError::UnsupportedPixelFormat(pixel_format)
            );
        }
    }

    #[test]
    fn export_fails_while_write_mapped() {
        let frame = argb(8, 8);
        assert!(frame.map(MapMode::WriteOnly));
        assert!(matches!(
            frame.try_to_image(),
            Err(FrameError::Map(MapError::AlreadyMapped { .. }))
        ));
        frame.unmap();
        assert!(frame.to_image().is_some());
        assert!(!frame.is_mapped());
    }
}
