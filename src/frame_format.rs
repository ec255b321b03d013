//! Frame format descriptor.

use crate::{ColorRange, ColorSpace, ColorTransfer, PixelFormat, Rotation};

/// Describes the layout and presentation of a video frame.
///
/// Size and pixel format determine the buffer geometry; the remaining
/// fields are presentation metadata that never affect memory layout.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameFormat {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    rotation: Rotation,
    mirrored: bool,
    stream_frame_rate: f64,
    color_space: ColorSpace,
    color_transfer: ColorTransfer,
    color_range: ColorRange,
}

impl FrameFormat {
    /// Create a descriptor with default presentation metadata.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
            ..Self::default()
        }
    }

    /// Set the display rotation.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set whether the frame is mirrored horizontally for display.
    pub fn with_mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    /// Set the nominal frame rate of the stream this frame belongs to.
    pub fn with_stream_frame_rate(mut self, rate: f64) -> Self {
        self.stream_frame_rate = rate;
        self
    }

    /// Set the color space.
    pub fn with_color_space(mut self, space: ColorSpace) -> Self {
        self.color_space = space;
        self
    }

    /// Set the transfer characteristic.
    pub fn with_color_transfer(mut self, transfer: ColorTransfer) -> Self {
        self.color_transfer = transfer;
        self
    }

    /// Set the quantization range.
    pub fn with_color_range(mut self, range: ColorRange) -> Self {
        self.color_range = range;
        self
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub const fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    #[inline]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[inline]
    pub const fn mirrored(&self) -> bool {
        self.mirrored
    }

    #[inline]
    pub const fn stream_frame_rate(&self) -> f64 {
        self.stream_frame_rate
    }

    #[inline]
    pub const fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    #[inline]
    pub const fn color_transfer(&self) -> ColorTransfer {
        self.color_transfer
    }

    #[inline]
    pub const fn color_range(&self) -> ColorRange {
        self.color_range
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn set_stream_frame_rate(&mut self, rate: f64) {
        self.stream_frame_rate = rate;
    }

    /// A format is valid when it names a pixel format, both dimensions are
    /// nonzero, and its byte size fits in `usize`. Only valid formats can
    /// back a frame.
    pub fn is_valid(&self) -> bool {
        self.pixel_format != PixelFormat::Invalid
            && self.width > 0
            && self.height > 0
            && self.pixel_format.bytes_per_frame(self.width, self.height).is_some()
    }

    /// Number of planes of the pixel format.
    pub fn plane_count(&self) -> usize {
        self.pixel_format.plane_count()
    }

    /// Stride of the first plane of a buffer allocated for this format.
    /// Zero when the stride overflows `usize`.
    pub fn bytes_per_line(&self) -> usize {
        self.pixel_format.stride_for_width(self.width).unwrap_or(0)
    }

    /// Bytes needed to hold every plane. Zero for invalid formats,
    /// including ones whose size overflows `usize`.
    pub fn bytes_per_frame(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.pixel_format.bytes_per_frame(self.width, self.height).unwrap_or(0)
    }

    /// Size after applying [`rotation`](Self::rotation).
    pub fn display_size(&self) -> (u32, u32) {
        self.rotation.display_dimensions(self.width, self.height)
    }
}
