//! Pixel formats and plane geometry.
//!
//! Geometry is a pure function of `(format, width, height)`: every stride,
//! plane size, and offset reported here is reproducible. Rows of the first
//! plane are aligned to 16 bytes.

use arrayvec::ArrayVec;

use crate::ImageFormat;

/// Maximum number of planes any [`PixelFormat`] uses.
pub const MAX_PLANES: usize = 4;

/// Row alignment, in bytes, of buffers allocated for a frame.
pub const ROW_ALIGNMENT: usize = 16;

/// Pixel layout of a video frame.
///
/// Packed RGB names list components in memory byte order, so
/// [`Bgra8888`](PixelFormat::Bgra8888) stores blue first.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Invalid,
    Argb8888,
    Argb8888Premultiplied,
    Xrgb8888,
    Bgra8888,
    Bgra8888Premultiplied,
    Bgrx8888,
    Abgr8888,
    Xbgr8888,
    Rgba8888,
    Rgbx8888,
    Ayuv,
    AyuvPremultiplied,
    /// Planar 4:2:0, Y then U then V.
    Yuv420p,
    /// Planar 4:2:2, Y then U then V.
    Yuv422p,
    /// Planar 4:2:0, Y then V then U.
    Yv12,
    Uyvy,
    Yuyv,
    /// Semi-planar 4:2:0, Y then interleaved UV.
    Nv12,
    /// Semi-planar 4:2:0, Y then interleaved VU.
    Nv21,
    /// Y, then V and U each padded to the full luma stride.
    Imc1,
    /// Y, then V and U rows sharing one full-stride row.
    Imc2,
    /// Y, then U and V each padded to the full luma stride.
    Imc3,
    /// Y, then U and V rows sharing one full-stride row.
    Imc4,
    Y8,
    Y16,
    /// Semi-planar 4:2:0, 10 bits in the high bits of 16-bit words.
    P010,
    /// Semi-planar 4:2:0, 16-bit samples.
    P016,
    /// Planar 4:2:0, 10 bits in the low bits of 16-bit words.
    Yuv420p10,
    /// Compressed JPEG. Treated as an opaque 4-byte-per-pixel surface.
    Jpeg,
}

/// One plane's location within a single mapped region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneSpan {
    /// Byte offset from the start of the region.
    pub offset: usize,
    /// Bytes per row.
    pub stride: usize,
    /// Bytes in this plane.
    pub len: usize,
}

impl PixelFormat {
    /// Every valid format, in declaration order.
    pub const ALL: &'static [PixelFormat] = &[
        Self::Argb8888,
        Self::Argb8888Premultiplied,
        Self::Xrgb8888,
        Self::Bgra8888,
        Self::Bgra8888Premultiplied,
        Self::Bgrx8888,
        Self::Abgr8888,
        Self::Xbgr8888,
        Self::Rgba8888,
        Self::Rgbx8888,
        Self::Ayuv,
        Self::AyuvPremultiplied,
        Self::Yuv420p,
        Self::Yuv422p,
        Self::Yv12,
        Self::Uyvy,
        Self::Yuyv,
        Self::Nv12,
        Self::Nv21,
        Self::Imc1,
        Self::Imc2,
        Self::Imc3,
        Self::Imc4,
        Self::Y8,
        Self::Y16,
        Self::P010,
        Self::P016,
        Self::Yuv420p10,
        Self::Jpeg,
    ];

    /// Number of planes. Zero for [`Invalid`](PixelFormat::Invalid).
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Invalid => 0,
            Self::Yuv420p
            | Self::Yuv422p
            | Self::Yv12
            | Self::Yuv420p10
            | Self::Imc1
            | Self::Imc3 => 3,
            Self::Nv12 | Self::Nv21 | Self::Imc2 | Self::Imc4 | Self::P010 | Self::P016 => 2,
            _ => 1,
        }
    }

    /// Bytes per pixel in the first plane.
    pub const fn stride_factor(self) -> usize {
        match self {
            Self::Invalid => 0,
            Self::Argb8888
            | Self::Argb8888Premultiplied
            | Self::Xrgb8888
            | Self::Bgra8888
            | Self::Bgra8888Premultiplied
            | Self::Bgrx8888
            | Self::Abgr8888
            | Self::Xbgr8888
            | Self::Rgba8888
            | Self::Rgbx8888
            | Self::Ayuv
            | Self::AyuvPremultiplied
            | Self::Jpeg => 4,
            Self::Uyvy | Self::Yuyv | Self::Y16 | Self::P010 | Self::P016 | Self::Yuv420p10 => 2,
            Self::Yuv420p
            | Self::Yuv422p
            | Self::Yv12
            | Self::Nv12
            | Self::Nv21
            | Self::Imc1
            | Self::Imc2
            | Self::Imc3
            | Self::Imc4
            | Self::Y8 => 1,
        }
    }

    /// Stride of the first plane for a frame `width` pixels wide.
    ///
    /// `width * stride_factor` rounded up to [`ROW_ALIGNMENT`]. `None` when
    /// the stride does not fit in `usize`.
    pub fn stride_for_width(self, width: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(self.stride_factor())?
            .checked_next_multiple_of(ROW_ALIGNMENT)
    }

    /// Bytes needed to hold every plane of a `width` × `height` frame.
    ///
    /// Zero when either dimension is zero or the format is invalid; `None`
    /// when the size does not fit in `usize`.
    pub fn bytes_per_frame(self, width: u32, height: u32) -> Option<usize> {
        if width == 0 || height == 0 {
            return Some(0);
        }
        let stride = self.stride_for_width(width)?;
        let h = height as usize;
        let rows = match self {
            Self::Invalid => 0,
            Self::Yuv420p
            | Self::Yv12
            | Self::Yuv420p10
            | Self::Nv12
            | Self::Nv21
            | Self::Imc2
            | Self::Imc4
            | Self::P010
            | Self::P016 => (h.checked_mul(3)? / 2 + 1) & !1,
            Self::Yuv422p | Self::Imc1 | Self::Imc3 => h.checked_mul(2)?,
            _ => h,
        };
        stride.checked_mul(rows)
    }

    /// Lay out this format's planes inside one contiguous region.
    ///
    /// `stride0` and `height` describe the first plane; `total` is the byte
    /// length of the whole region. Chroma strides are derived from whatever
    /// bytes remain after the luma plane, so regions with padded chroma
    /// rows still split correctly.
    ///
    /// Returns `None` when the region is too small for the format or the
    /// format has no planes.
    pub fn split_planes(
        self,
        stride0: usize,
        height: u32,
        total: usize,
    ) -> Option<ArrayVec<PlaneSpan, MAX_PLANES>> {
        let h = height as usize;
        let mut planes = ArrayVec::new();
        if self.plane_count() == 0 || h == 0 {
            return None;
        }
        let luma = stride0.checked_mul(h)?;
        let rest = total.checked_sub(luma)?;
        planes.push(PlaneSpan {
            offset: 0,
            stride: stride0,
            len: luma,
        });
        match self {
            Self::Yuv420p | Self::Yv12 | Self::Yuv420p10 | Self::Yuv422p => {
                let uv_height = if self == Self::Yuv422p {
                    h
                } else {
                    h.div_ceil(2)
                };
                let uv_stride = rest / uv_height / 2;
                let uv_len = uv_stride * uv_height;
                if uv_len == 0 {
                    return None;
                }
                planes.push(PlaneSpan {
                    offset: luma,
                    stride: uv_stride,
                    len: uv_len,
                });
                planes.push(PlaneSpan {
                    offset: luma + uv_len,
                    stride: uv_stride,
                    len: uv_len,
                });
            }
            Self::Nv12 | Self::Nv21 | Self::Imc2 | Self::Imc4 | Self::P010 | Self::P016 => {
                if rest == 0 {
                    return None;
                }
                planes.push(PlaneSpan {
                    offset: luma,
                    stride: stride0,
                    len: rest,
                });
            }
            Self::Imc1 | Self::Imc3 => {
                let first = stride0 * h.div_ceil(2);
                if rest <= first {
                    return None;
                }
                planes.push(PlaneSpan {
                    offset: luma,
                    stride: stride0,
                    len: first,
                });
                planes.push(PlaneSpan {
                    offset: luma + first,
                    stride: stride0,
                    len: rest - first,
                });
            }
            _ => {
                // single plane formats own the whole region
                planes[0].len = total;
            }
        }
        Some(planes)
    }

    /// Whether samples are YUV rather than RGB or gray.
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            Self::Ayuv
                | Self::AyuvPremultiplied
                | Self::Yuv420p
                | Self::Yuv422p
                | Self::Yv12
                | Self::Uyvy
                | Self::Yuyv
                | Self::Nv12
                | Self::Nv21
                | Self::Imc1
                | Self::Imc2
                | Self::Imc3
                | Self::Imc4
                | Self::P010
                | Self::P016
                | Self::Yuv420p10
        )
    }

    /// Whether the format carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Argb8888
                | Self::Argb8888Premultiplied
                | Self::Bgra8888
                | Self::Bgra8888Premultiplied
                | Self::Abgr8888
                | Self::Rgba8888
                | Self::Ayuv
                | Self::AyuvPremultiplied
        )
    }

    /// Whether color is stored premultiplied by alpha.
    pub fn is_premultiplied(self) -> bool {
        matches!(
            self,
            Self::Argb8888Premultiplied | Self::Bgra8888Premultiplied | Self::AyuvPremultiplied
        )
    }

    /// Image format whose bytes are laid out exactly like this format.
    ///
    /// On little-endian hosts the 32-bit `Argb32` family stores bytes as
    /// B, G, R, A and so matches [`Bgra8888`](PixelFormat::Bgra8888); on
    /// big-endian hosts it matches [`Argb8888`](PixelFormat::Argb8888).
    /// YUV formats and [`Jpeg`](PixelFormat::Jpeg) have no image
    /// equivalent.
    pub fn image_format(self) -> Option<ImageFormat> {
        let native = if cfg!(target_endian = "little") {
            [Self::Bgrx8888, Self::Bgra8888, Self::Bgra8888Premultiplied]
        } else {
            [Self::Xrgb8888, Self::Argb8888, Self::Argb8888Premultiplied]
        };
        match self {
            f if f == native[0] => Some(ImageFormat::Rgb32),
            f if f == native[1] => Some(ImageFormat::Argb32),
            f if f == native[2] => Some(ImageFormat::Argb32Premultiplied),
            Self::Rgbx8888 => Some(ImageFormat::Rgbx8888),
            Self::Rgba8888 => Some(ImageFormat::Rgba8888),
            Self::Y8 => Some(ImageFormat::Grayscale8),
            Self::Y16 => Some(ImageFormat::Grayscale16),
            _ => None,
        }
    }

    /// Pixel format that stores an image format's bytes unchanged.
    ///
    /// Returns [`Invalid`](PixelFormat::Invalid) for image formats with no
    /// direct equivalent. `Rgba8888Premultiplied` maps to
    /// [`Rgbx8888`](PixelFormat::Rgbx8888): there is no premultiplied RGBA
    /// frame layout, and presenters treat the alpha byte as padding.
    pub fn from_image_format(format: ImageFormat) -> Self {
        let little = cfg!(target_endian = "little");
        match format {
            ImageFormat::Rgb32 if little => Self::Bgrx8888,
            ImageFormat::Rgb32 => Self::Xrgb8888,
            ImageFormat::Argb32 if little => Self::Bgra8888,
            ImageFormat::Argb32 => Self::Argb8888,
            ImageFormat::Argb32Premultiplied if little => Self::Bgra8888Premultiplied,
            ImageFormat::Argb32Premultiplied => Self::Argb8888Premultiplied,
            ImageFormat::Rgbx8888 | ImageFormat::Rgba8888Premultiplied => Self::Rgbx8888,
            ImageFormat::Rgba8888 => Self::Rgba8888,
            ImageFormat::Grayscale8 => Self::Y8,
            ImageFormat::Grayscale16 => Self::Y16,
            _ => Self::Invalid,
        }
    }
}

impl core::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Invalid => "Invalid",
            Self::Argb8888 => "ARGB8888",
            Self::Argb8888Premultiplied => "ARGB8888 Premultiplied",
            Self::Xrgb8888 => "XRGB8888",
            Self::Bgra8888 => "BGRA8888",
            Self::Bgra8888Premultiplied => "BGRA8888 Premultiplied",
            Self::Bgrx8888 => "BGRX8888",
            Self::Abgr8888 => "ABGR8888",
            Self::Xbgr8888 => "XBGR8888",
            Self::Rgba8888 => "RGBA8888",
            Self::Rgbx8888 => "RGBX8888",
            Self::Ayuv => "AYUV",
            Self::AyuvPremultiplied => "AYUV Premultiplied",
            Self::Yuv420p => "YUV420P",
            Self::Yuv422p => "YUV422P",
            Self::Yv12 => "YV12",
            Self::Uyvy => "UYVY",
            Self::Yuyv => "YUYV",
            Self::Nv12 => "NV12",
            Self::Nv21 => "NV21",
            Self::Imc1 => "IMC1",
            Self::Imc2 => "IMC2",
            Self::Imc3 => "IMC3",
            Self::Imc4 => "IMC4",
            Self::Y8 => "Y8",
            Self::Y16 => "Y16",
            Self::P010 => "P010",
            Self::P016 => "P016",
            Self::Yuv420p10 => "YUV420P10",
            Self::Jpeg => "JPEG",
        })
    }
}
