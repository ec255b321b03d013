//! CPU image adapter.
//!
//! [`Image`] is a plain owned pixel grid in one of the [`ImageFormat`]
//! layouts. Frames are built from images and exported back to them; the
//! per-format decode and encode below is what lets a frame accept any
//! image layout by converting to a 32-bit one first.
//!
//! Multi-byte fields of packed formats are stored in host byte order,
//! so `Rgb32` is a native `u32` of `0xAARRGGBB`.

use half::f16;
use imgref::{ImgRef, ImgVec};
use rgb::alt::BGR;
use rgb::{Gray, Rgb, Rgba};

/// Memory layout of an [`Image`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    #[default]
    Invalid,
    /// 1 bit per pixel, most significant bit first, indexed.
    Mono,
    /// 1 bit per pixel, least significant bit first, indexed.
    MonoLsb,
    /// 8-bit index into the color table.
    Indexed8,
    /// Native `u32` `0xffRRGGBB`.
    Rgb32,
    /// Native `u32` `0xAARRGGBB`.
    Argb32,
    Argb32Premultiplied,
    /// Native `u16` 5-6-5.
    Rgb16,
    /// Alpha byte followed by a little-endian 5-6-5 `u16`.
    Argb8565Premultiplied,
    /// 24-bit little-endian 6-6-6.
    Rgb666,
    Argb6666Premultiplied,
    /// Native `u16` x-5-5-5.
    Rgb555,
    /// Alpha byte followed by a little-endian x-5-5-5 `u16`.
    Argb8555Premultiplied,
    /// Bytes R, G, B.
    Rgb888,
    /// Native `u16` `0x0RGB`.
    Rgb444,
    Argb4444Premultiplied,
    /// Bytes R, G, B, padding.
    Rgbx8888,
    /// Bytes R, G, B, A.
    Rgba8888,
    Rgba8888Premultiplied,
    /// Native `u32` with 10-bit blue in the high bits.
    Bgr30,
    A2Bgr30Premultiplied,
    /// Native `u32` with 10-bit red in the high bits.
    Rgb30,
    A2Rgb30Premultiplied,
    /// Alpha only; color is black.
    Alpha8,
    Grayscale8,
    /// Native `u16` gray.
    Grayscale16,
    /// Four native `u16` R, G, B, padding.
    Rgbx64,
    Rgba64,
    Rgba64Premultiplied,
    /// Bytes B, G, R.
    Bgr888,
    /// Four IEEE half floats R, G, B, padding.
    Rgbx16FPx4,
    Rgba16FPx4,
    Rgba16FPx4Premultiplied,
    /// Four `f32` R, G, B, padding.
    Rgbx32FPx4,
    Rgba32FPx4,
    Rgba32FPx4Premultiplied,
}

impl ImageFormat {
    /// Every valid format.
    pub const ALL: &'static [ImageFormat] = &[
        Self::Mono,
        Self::MonoLsb,
        Self::Indexed8,
        Self::Rgb32,
        Self::Argb32,
        Self::Argb32Premultiplied,
        Self::Rgb16,
        Self::Argb8565Premultiplied,
        Self::Rgb666,
        Self::Argb6666Premultiplied,
        Self::Rgb555,
        Self::Argb8555Premultiplied,
        Self::Rgb888,
        Self::Rgb444,
        Self::Argb4444Premultiplied,
        Self::Rgbx8888,
        Self::Rgba8888,
        Self::Rgba8888Premultiplied,
        Self::Bgr30,
        Self::A2Bgr30Premultiplied,
        Self::Rgb30,
        Self::A2Rgb30Premultiplied,
        Self::Alpha8,
        Self::Grayscale8,
        Self::Grayscale16,
        Self::Rgbx64,
        Self::Rgba64,
        Self::Rgba64Premultiplied,
        Self::Bgr888,
        Self::Rgbx16FPx4,
        Self::Rgba16FPx4,
        Self::Rgba16FPx4Premultiplied,
        Self::Rgbx32FPx4,
        Self::Rgba32FPx4,
        Self::Rgba32FPx4Premultiplied,
    ];

    /// Storage bits per pixel.
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::Mono | Self::MonoLsb => 1,
            Self::Indexed8 | Self::Alpha8 | Self::Grayscale8 => 8,
            Self::Rgb16
            | Self::Rgb555
            | Self::Rgb444
            | Self::Argb4444Premultiplied
            | Self::Grayscale16 => 16,
            Self::Argb8565Premultiplied
            | Self::Rgb666
            | Self::Argb6666Premultiplied
            | Self::Argb8555Premultiplied
            | Self::Rgb888
            | Self::Bgr888 => 24,
            Self::Rgb32
            | Self::Argb32
            | Self::Argb32Premultiplied
            | Self::Rgbx8888
            | Self::Rgba8888
            | Self::Rgba8888Premultiplied
            | Self::Bgr30
            | Self::A2Bgr30Premultiplied
            | Self::Rgb30
            | Self::A2Rgb30Premultiplied => 32,
            Self::Rgbx64
            | Self::Rgba64
            | Self::Rgba64Premultiplied
            | Self::Rgbx16FPx4
            | Self::Rgba16FPx4
            | Self::Rgba16FPx4Premultiplied => 64,
            Self::Rgbx32FPx4 | Self::Rgba32FPx4 | Self::Rgba32FPx4Premultiplied => 128,
        }
    }

    /// Whether the layout stores alpha.
    ///
    /// [`Indexed8`](ImageFormat::Indexed8) reports `false` here; whether an
    /// indexed image has alpha depends on its color table, see
    /// [`Image::has_alpha_channel`].
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Argb32
                | Self::Argb32Premultiplied
                | Self::Argb8565Premultiplied
                | Self::Argb6666Premultiplied
                | Self::Argb8555Premultiplied
                | Self::Argb4444Premultiplied
                | Self::Rgba8888
                | Self::Rgba8888Premultiplied
                | Self::A2Bgr30Premultiplied
                | Self::A2Rgb30Premultiplied
                | Self::Alpha8
                | Self::Rgba64
                | Self::Rgba64Premultiplied
                | Self::Rgba16FPx4
                | Self::Rgba16FPx4Premultiplied
                | Self::Rgba32FPx4
                | Self::Rgba32FPx4Premultiplied
        )
    }

    /// Whether color is stored premultiplied by alpha.
    pub const fn is_premultiplied(self) -> bool {
        matches!(
            self,
            Self::Argb32Premultiplied
                | Self::Argb8565Premultiplied
                | Self::Argb6666Premultiplied
                | Self::Argb8555Premultiplied
                | Self::Argb4444Premultiplied
                | Self::Rgba8888Premultiplied
                | Self::A2Bgr30Premultiplied
                | Self::A2Rgb30Premultiplied
                | Self::Rgba64Premultiplied
                | Self::Rgba16FPx4Premultiplied
                | Self::Rgba32FPx4Premultiplied
        )
    }

    /// Whether pixels are indices into a color table.
    pub const fn is_indexed(self) -> bool {
        matches!(self, Self::Mono | Self::MonoLsb | Self::Indexed8)
    }

    /// Bytes per row, padded to a 4-byte boundary.
    pub const fn bytes_per_line(self, width: u32) -> usize {
        (width as usize)
            .saturating_mul(self.bits_per_pixel() as usize)
            .div_ceil(32)
            * 4
    }
}

/// Error constructing an [`Image`] from raw bytes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ImageError {
    /// The format is [`ImageFormat::Invalid`].
    #[error("image format is invalid")]
    InvalidFormat,
    /// Width or height is zero.
    #[error("image dimensions {width}x{height} are invalid")]
    InvalidDimensions { width: u32, height: u32 },
    /// The stride cannot hold one row of pixels.
    #[error("stride {stride} is smaller than the {min} bytes a row needs")]
    StrideTooSmall { stride: usize, min: usize },
    /// `stride * height` overflows `usize`.
    #[error("stride {stride} times {height} rows overflows usize")]
    TooLarge { stride: usize, height: u32 },
    /// The byte vector is shorter than `stride * height`.
    #[error("image data is {actual} bytes, expected at least {expected}")]
    InsufficientData { actual: usize, expected: usize },
}

/// Owned pixel grid.
///
/// A null image (see [`is_null`](Image::is_null)) has no pixels and no
/// format; operations on it are no-ops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Image {
    format: ImageFormat,
    width: u32,
    height: u32,
    bytes_per_line: usize,
    data: Vec<u8>,
    color_table: Vec<Rgba<u8>>,
}

const BLACK: Rgba<u8> = Rgba::new(0, 0, 0, 255);
const WHITE: Rgba<u8> = Rgba::new(255, 255, 255, 255);
const TRANSPARENT: Rgba<u8> = Rgba::new(0, 0, 0, 0);

impl Image {
    /// An image with no pixels.
    pub fn null() -> Self {
        Self::default()
    }

    /// Allocate a zeroed image.
    ///
    /// Returns a null image when either dimension is zero, the byte size
    /// overflows `usize`, or the format is [`Invalid`](ImageFormat::Invalid).
    /// Mono images start with a black-and-white color table; indexed images
    /// start with none.
    pub fn new(width: u32, height: u32, format: ImageFormat) -> Self {
        if width == 0 || height == 0 || format == ImageFormat::Invalid {
            return Self::null();
        }
        let bytes_per_line = format.bytes_per_line(width);
        let Some(len) = bytes_per_line.checked_mul(height as usize) else {
            return Self::null();
        };
        Self {
            format,
            width,
            height,
            bytes_per_line,
            data: vec![0; len],
            color_table: default_color_table(format),
        }
    }

    /// Wrap existing bytes.
    ///
    /// `bytes_per_line` may exceed the packed row size; it must not be
    /// smaller.
    pub fn from_vec(
        width: u32,
        height: u32,
        format: ImageFormat,
        bytes_per_line: usize,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        if format == ImageFormat::Invalid {
            return Err(ImageError::InvalidFormat);
        }
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidDimensions { width, height });
        }
        let min = (width as usize)
            .saturating_mul(format.bits_per_pixel() as usize)
            .div_ceil(8);
        if bytes_per_line < min {
            return Err(ImageError::StrideTooSmall {
                stride: bytes_per_line,
                min,
            });
        }
        let expected =
            bytes_per_line
                .checked_mul(height as usize)
                .ok_or(ImageError::TooLarge {
                    stride: bytes_per_line,
                    height,
                })?;
        if data.len() < expected {
            return Err(ImageError::InsufficientData {
                actual: data.len(),
                expected,
            });
        }
        Ok(Self {
            format,
            width,
            height,
            bytes_per_line,
            data,
            color_table: default_color_table(format),
        })
    }

    /// Whether this image has no pixels.
    pub fn is_null(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    /// All pixel bytes, rows separated by [`bytes_per_line`](Self::bytes_per_line).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the image, returning its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of row `y`, including padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y as usize).checked_mul(self.bytes_per_line)?;
        self.data.get(start..start.checked_add(self.bytes_per_line)?)
    }

    fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y as usize).checked_mul(self.bytes_per_line)?;
        self.data.get_mut(start..start.checked_add(self.bytes_per_line)?)
    }

    pub fn color_table(&self) -> &[Rgba<u8>] {
        &self.color_table
    }

    /// Replace the color table of an indexed image. At most 256 entries
    /// are kept.
    pub fn set_color_table(&mut self, table: &[Rgba<u8>]) {
        if self.format.is_indexed() {
            self.color_table = table.iter().copied().take(256).collect();
        }
    }

    /// Whether any pixel can be non-opaque.
    ///
    /// For indexed images this is true when any color table entry is not
    /// fully opaque.
    pub fn has_alpha_channel(&self) -> bool {
        if self.format.is_indexed() {
            return self.color_table.iter().any(|c| c.a != 255);
        }
        self.format.has_alpha()
    }

    /// Read the pixel at `(x, y)` as straight (unpremultiplied) RGBA.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        let x = x as usize;
        let px = match self.format {
            ImageFormat::Invalid => return None,
            ImageFormat::Mono | ImageFormat::MonoLsb | ImageFormat::Indexed8 => {
                let index = match self.format {
                    ImageFormat::Mono => (row[x / 8] >> (7 - x % 8)) & 1,
                    ImageFormat::MonoLsb => (row[x / 8] >> (x % 8)) & 1,
                    _ => row[x],
                };
                self.color_table
                    .get(index as usize)
                    .copied()
                    .unwrap_or(TRANSPARENT)
            }
            format => {
                let raw = read_raw(format, row, x);
                if format.is_premultiplied() {
                    unpremultiply(raw)
                } else {
                    raw
                }
            }
        };
        Some(px)
    }

    /// Write the pixel at `(x, y)` from straight RGBA.
    ///
    /// Indexed images store the nearest color table entry. Returns `false`
    /// when out of bounds or when an indexed image has no color table.
    pub fn set_pixel(&mut self, x: u32, y: u32, px: Rgba<u8>) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let format = self.format;
        let index = if format.is_indexed() {
            match nearest_index(&self.color_table, px) {
                Some(i) => i,
                None => return false,
            }
        } else {
            0
        };
        let Some(row) = self.row_mut(y) else {
            return false;
        };
        let x = x as usize;
        match format {
            ImageFormat::Invalid => return false,
            ImageFormat::Mono => {
                let bit = 0x80 >> (x % 8);
                set_bit(&mut row[x / 8], bit, index != 0);
            }
            ImageFormat::MonoLsb => {
                let bit = 1 << (x % 8);
                set_bit(&mut row[x / 8], bit, index != 0);
            }
            ImageFormat::Indexed8 => row[x] = index,
            format => {
                let stored = if format.is_premultiplied() {
                    premultiply(px)
                } else {
                    px
                };
                write_raw(format, row, x, stored);
            }
        }
        true
    }

    /// Convert to another layout, going through straight 8-bit RGBA.
    ///
    /// Converting to [`Indexed8`](ImageFormat::Indexed8) builds a color
    /// table from the first 256 distinct colors; later colors map to the
    /// nearest entry. Returns a null image when `self` is null or `format`
    /// is invalid.
    pub fn convert_to(&self, format: ImageFormat) -> Image {
        if self.is_null() || format == ImageFormat::Invalid {
            return Self::null();
        }
        if format == self.format {
            return self.clone();
        }
        let mut out = Image::new(self.width, self.height, format);
        if format == ImageFormat::Indexed8 {
            let mut table = Vec::new();
            for px in self.pixels() {
                if table.len() < 256 && !table.contains(&px) {
                    table.push(px);
                }
            }
            out.color_table = table;
        }
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(px) = self.pixel(x, y) {
                    out.set_pixel(x, y, px);
                }
            }
        }
        out
    }

    /// Decode every pixel to straight 8-bit RGBA.
    pub fn to_rgba8(&self) -> ImgVec<Rgba<u8>> {
        ImgVec::new(
            self.pixels().collect(),
            self.width as usize,
            self.height as usize,
        )
    }

    fn pixels(&self) -> impl Iterator<Item = Rgba<u8>> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| self.pixel(x, y).unwrap_or(TRANSPARENT))
        })
    }
}

fn default_color_table(format: ImageFormat) -> Vec<Rgba<u8>> {
    match format {
        ImageFormat::Mono | ImageFormat::MonoLsb => vec![BLACK, WHITE],
        _ => Vec::new(),
    }
}

fn set_bit(byte: &mut u8, bit: u8, on: bool) {
    if on {
        *byte |= bit;
    } else {
        *byte &= !bit;
    }
}

fn nearest_index(table: &[Rgba<u8>], px: Rgba<u8>) -> Option<u8> {
    let dist = |c: &Rgba<u8>| {
        let d = |a: u8, b: u8| (a as i32 - b as i32).pow(2);
        d(c.r, px.r) + d(c.g, px.g) + d(c.b, px.b) + d(c.a, px.a)
    };
    table
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| dist(c))
        .map(|(i, _)| i as u8)
}

// ---------------------------------------------------------------------------
// Per-format pixel packing
// ---------------------------------------------------------------------------

#[inline]
fn mul_div_255(x: u32, a: u32) -> u8 {
    let t = x * a + 128;
    ((t + (t >> 8)) >> 8) as u8
}

fn premultiply(px: Rgba<u8>) -> Rgba<u8> {
    let a = px.a as u32;
    Rgba::new(
        mul_div_255(px.r as u32, a),
        mul_div_255(px.g as u32, a),
        mul_div_255(px.b as u32, a),
        px.a,
    )
}

fn unpremultiply(px: Rgba<u8>) -> Rgba<u8> {
    let a = px.a as u32;
    if a == 0 {
        return TRANSPARENT;
    }
    if a == 255 {
        return px;
    }
    let un = |c: u8| ((c as u32 * 255 + a / 2) / a).min(255) as u8;
    Rgba::new(un(px.r), un(px.g), un(px.b), px.a)
}

/// Scale an `bits`-wide channel to 8 bits.
#[inline]
fn widen(v: u32, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((v * 255 + max / 2) / max) as u8
}

/// Scale an 8-bit channel to `bits` wide.
#[inline]
fn narrow(v: u8, bits: u32) -> u32 {
    let max = (1u32 << bits) - 1;
    (v as u32 * max + 127) / 255
}

#[inline]
fn div_257(v: u16) -> u8 {
    let v = v as u32;
    ((v - (v >> 8) + 0x80) >> 8) as u8
}

#[inline]
fn gray_of(px: Rgba<u8>) -> u8 {
    ((px.r as u32 * 11 + px.g as u32 * 16 + px.b as u32 * 5) / 32) as u8
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn u8_to_unit(v: u8) -> f32 {
    v as f32 / 255.0
}

fn read_u16(row: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([row[at], row[at + 1]])
}

fn read_u16_le(row: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([row[at], row[at + 1]])
}

fn read_u24_le(row: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([row[at], row[at + 1], row[at + 2], 0])
}

fn read_u32(row: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([row[at], row[at + 1], row[at + 2], row[at + 3]])
}

fn read_f32(row: &[u8], at: usize) -> f32 {
    f32::from_bits(read_u32(row, at))
}

/// Decode a direct-color pixel exactly as stored.
fn read_raw(format: ImageFormat, row: &[u8], x: usize) -> Rgba<u8> {
    use ImageFormat as F;
    match format {
        F::Rgb32 | F::Argb32 | F::Argb32Premultiplied => {
            let v = read_u32(row, x * 4);
            let a = if format == F::Rgb32 { 255 } else { (v >> 24) as u8 };
            Rgba::new((v >> 16) as u8, (v >> 8) as u8, v as u8, a)
        }
        F::Rgbx8888 | F::Rgba8888 | F::Rgba8888Premultiplied => {
            let p = &row[x * 4..x * 4 + 4];
            let a = if format == F::Rgbx8888 { 255 } else { p[3] };
            Rgba::new(p[0], p[1], p[2], a)
        }
        F::Rgb16 => {
            let v = read_u16(row, x * 2) as u32;
            rgb565(v, 255)
        }
        F::Argb8565Premultiplied => {
            let v = read_u16_le(row, x * 3 + 1) as u32;
            rgb565(v, row[x * 3])
        }
        F::Rgb666 | F::Argb6666Premultiplied => {
            let v = read_u24_le(row, x * 3);
            let a = if format == F::Rgb666 {
                255
            } else {
                widen((v >> 18) & 0x3f, 6)
            };
            Rgba::new(
                widen((v >> 12) & 0x3f, 6),
                widen((v >> 6) & 0x3f, 6),
                widen(v & 0x3f, 6),
                a,
            )
        }
        F::Rgb555 => rgb555(read_u16(row, x * 2) as u32, 255),
        F::Argb8555Premultiplied => rgb555(read_u16_le(row, x * 3 + 1) as u32, row[x * 3]),
        F::Rgb888 => {
            let p = &row[x * 3..x * 3 + 3];
            Rgba::new(p[0], p[1], p[2], 255)
        }
        F::Bgr888 => {
            let p = &row[x * 3..x * 3 + 3];
            Rgba::new(p[2], p[1], p[0], 255)
        }
        F::Rgb444 | F::Argb4444Premultiplied => {
            let v = read_u16(row, x * 2) as u32;
            let a = if format == F::Rgb444 {
                255
            } else {
                widen((v >> 12) & 0xf, 4)
            };
            Rgba::new(
                widen((v >> 8) & 0xf, 4),
                widen((v >> 4) & 0xf, 4),
                widen(v & 0xf, 4),
                a,
            )
        }
        F::Bgr30 | F::A2Bgr30Premultiplied | F::Rgb30 | F::A2Rgb30Premultiplied => {
            let v = read_u32(row, x * 4);
            let high = widen((v >> 20) & 0x3ff, 10);
            let mid = widen((v >> 10) & 0x3ff, 10);
            let low = widen(v & 0x3ff, 10);
            let a = match format {
                F::Bgr30 | F::Rgb30 => 255,
                _ => widen(v >> 30, 2),
            };
            if matches!(format, F::Bgr30 | F::A2Bgr30Premultiplied) {
                Rgba::new(low, mid, high, a)
            } else {
                Rgba::new(high, mid, low, a)
            }
        }
        F::Alpha8 => Rgba::new(0, 0, 0, row[x]),
        F::Grayscale8 => Rgba::new(row[x], row[x], row[x], 255),
        F::Grayscale16 => {
            let g = div_257(read_u16(row, x * 2));
            Rgba::new(g, g, g, 255)
        }
        F::Rgbx64 | F::Rgba64 | F::Rgba64Premultiplied => {
            let c = |i: usize| div_257(read_u16(row, x * 8 + i * 2));
            let a = if format == F::Rgbx64 { 255 } else { c(3) };
            Rgba::new(c(0), c(1), c(2), a)
        }
        F::Rgbx16FPx4 | F::Rgba16FPx4 | F::Rgba16FPx4Premultiplied => {
            let c = |i: usize| unit_to_u8(f16::from_bits(read_u16(row, x * 8 + i * 2)).to_f32());
            let a = if format == F::Rgbx16FPx4 { 255 } else { c(3) };
            Rgba::new(c(0), c(1), c(2), a)
        }
        F::Rgbx32FPx4 | F::Rgba32FPx4 | F::Rgba32FPx4Premultiplied => {
            let c = |i: usize| unit_to_u8(read_f32(row, x * 16 + i * 4));
            let a = if format == F::Rgbx32FPx4 { 255 } else { c(3) };
            Rgba::new(c(0), c(1), c(2), a)
        }
        F::Invalid | F::Mono | F::MonoLsb | F::Indexed8 => TRANSPARENT,
    }
}

fn rgb565(v: u32, a: u8) -> Rgba<u8> {
    Rgba::new(
        widen(v >> 11, 5),
        widen((v >> 5) & 0x3f, 6),
        widen(v & 0x1f, 5),
        a,
    )
}

fn rgb555(v: u32, a: u8) -> Rgba<u8> {
    Rgba::new(
        widen((v >> 10) & 0x1f, 5),
        widen((v >> 5) & 0x1f, 5),
        widen(v & 0x1f, 5),
        a,
    )
}

fn pack565(px: Rgba<u8>) -> u16 {
    ((narrow(px.r, 5) << 11) | (narrow(px.g, 6) << 5) | narrow(px.b, 5)) as u16
}

fn pack555(px: Rgba<u8>) -> u16 {
    ((narrow(px.r, 5) << 10) | (narrow(px.g, 5) << 5) | narrow(px.b, 5)) as u16
}

/// Encode a direct-color pixel exactly as given.
fn write_raw(format: ImageFormat, row: &mut [u8], x: usize, px: Rgba<u8>) {
    use ImageFormat as F;
    match format {
        F::Rgb32 | F::Argb32 | F::Argb32Premultiplied => {
            let a = if format == F::Rgb32 { 255 } else { px.a as u32 };
            let v = (a << 24) | ((px.r as u32) << 16) | ((px.g as u32) << 8) | px.b as u32;
            row[x * 4..x * 4 + 4].copy_from_slice(&v.to_ne_bytes());
        }
        F::Rgbx8888 | F::Rgba8888 | F::Rgba8888Premultiplied => {
            let a = if format == F::Rgbx8888 { 255 } else { px.a };
            row[x * 4..x * 4 + 4].copy_from_slice(&[px.r, px.g, px.b, a]);
        }
        F::Rgb16 => row[x * 2..x * 2 + 2].copy_from_slice(&pack565(px).to_ne_bytes()),
        F::Argb8565Premultiplied => {
            row[x * 3] = px.a;
            row[x * 3 + 1..x * 3 + 3].copy_from_slice(&pack565(px).to_le_bytes());
        }
        F::Rgb666 | F::Argb6666Premultiplied => {
            let a = if format == F::Rgb666 {
                0
            } else {
                narrow(px.a, 6)
            };
            let v = (a << 18) | (narrow(px.r, 6) << 12) | (narrow(px.g, 6) << 6) | narrow(px.b, 6);
            row[x * 3..x * 3 + 3].copy_from_slice(&v.to_le_bytes()[..3]);
        }
        F::Rgb555 => row[x * 2..x * 2 + 2].copy_from_slice(&pack555(px).to_ne_bytes()),
        F::Argb8555Premultiplied => {
            row[x * 3] = px.a;
            row[x * 3 + 1..x * 3 + 3].copy_from_slice(&pack555(px).to_le_bytes());
        }
        F::Rgb888 => row[x * 3..x * 3 + 3].copy_from_slice(&[px.r, px.g, px.b]),
        F::Bgr888 => row[x * 3..x * 3 + 3].copy_from_slice(&[px.b, px.g, px.r]),
        F::Rgb444 | F::Argb4444Premultiplied => {
            let a = if format == F::Rgb444 {
                0
            } else {
                narrow(px.a, 4)
            };
            let v = (a << 12) | (narrow(px.r, 4) << 8) | (narrow(px.g, 4) << 4) | narrow(px.b, 4);
            row[x * 2..x * 2 + 2].copy_from_slice(&(v as u16).to_ne_bytes());
        }
        F::Bgr30 | F::A2Bgr30Premultiplied | F::Rgb30 | F::A2Rgb30Premultiplied => {
            let a = match format {
                F::Bgr30 | F::Rgb30 => 3,
                _ => narrow(px.a, 2),
            };
            let (high, low) = if matches!(format, F::Bgr30 | F::A2Bgr30Premultiplied) {
                (px.b, px.r)
            } else {
                (px.r, px.b)
            };
            let v = (a << 30) | (narrow(high, 10) << 20) | (narrow(px.g, 10) << 10) | narrow(low, 10);
            row[x * 4..x * 4 + 4].copy_from_slice(&v.to_ne_bytes());
        }
        F::Alpha8 => row[x] = px.a,
        F::Grayscale8 => row[x] = gray_of(px),
        F::Grayscale16 => {
            let g = gray_of(px) as u16 * 257;
            row[x * 2..x * 2 + 2].copy_from_slice(&g.to_ne_bytes());
        }
        F::Rgbx64 | F::Rgba64 | F::Rgba64Premultiplied => {
            let a = if format == F::Rgbx64 { 255 } else { px.a };
            for (i, c) in [px.r, px.g, px.b, a].into_iter().enumerate() {
                let at = x * 8 + i * 2;
                row[at..at + 2].copy_from_slice(&(c as u16 * 257).to_ne_bytes());
            }
        }
        F::Rgbx16FPx4 | F::Rgba16FPx4 | F::Rgba16FPx4Premultiplied => {
            let a = if format == F::Rgbx16FPx4 { 255 } else { px.a };
            for (i, c) in [px.r, px.g, px.b, a].into_iter().enumerate() {
                let at = x * 8 + i * 2;
                row[at..at + 2].copy_from_slice(&f16::from_f32(u8_to_unit(c)).to_bits().to_ne_bytes());
            }
        }
        F::Rgbx32FPx4 | F::Rgba32FPx4 | F::Rgba32FPx4Premultiplied => {
            let a = if format == F::Rgbx32FPx4 { 255 } else { px.a };
            for (i, c) in [px.r, px.g, px.b, a].into_iter().enumerate() {
                let at = x * 16 + i * 4;
                row[at..at + 4].copy_from_slice(&u8_to_unit(c).to_ne_bytes());
            }
        }
        F::Invalid | F::Mono | F::MonoLsb | F::Indexed8 => {}
    }
}

// ---------------------------------------------------------------------------
// ImgRef → Image (copying From impls)
// ---------------------------------------------------------------------------

macro_rules! impl_from_imgref {
    ($pixel:ty, $format:expr) => {
        impl<'a> From<ImgRef<'a, $pixel>> for Image {
            fn from(img: ImgRef<'a, $pixel>) -> Self {
                use rgb::ComponentBytes;
                let mut image = Image::new(img.width() as u32, img.height() as u32, $format);
                if image.is_null() {
                    return image;
                }
                let row_bytes = img.width() * core::mem::size_of::<$pixel>();
                let stride = image.bytes_per_line;
                for (y, src) in img.rows().enumerate() {
                    let start = y * stride;
                    image.data[start..start + row_bytes].copy_from_slice(src.as_bytes());
                }
                image
            }
        }
    };
}

impl_from_imgref!(Rgb<u8>, ImageFormat::Rgb888);
impl_from_imgref!(BGR<u8>, ImageFormat::Bgr888);
impl_from_imgref!(Rgba<u8>, ImageFormat::Rgba8888);
impl_from_imgref!(Rgba<u16>, ImageFormat::Rgba64);
impl_from_imgref!(Rgba<f32>, ImageFormat::Rgba32FPx4);
impl_from_imgref!(Gray<u8>, ImageFormat::Grayscale8);
impl_from_imgref!(Gray<u16>, ImageFormat::Grayscale16);
