//! Video frame buffers with explicit CPU mapping.
//!
//! This crate models a video frame as a format descriptor plus a shared,
//! mappable pixel buffer:
//!
//! - [`VideoFrame`]: cheap-to-clone frame handle with timing and
//!   presentation metadata
//! - [`PixelBuffer`]: shared map state with nested read-only mapping
//! - [`VideoBuffer`]: backend trait, with [`MemoryVideoBuffer`],
//!   [`ImageVideoBuffer`], and [`TextureVideoBuffer`]
//! - [`FrameFormat`] / [`PixelFormat`]: plane geometry
//! - [`Image`] / [`ImageFormat`]: CPU images frames are built from and
//!   exported to
//! - [`FrameLimits`]: allocation limits
//!
//! Memory buffers share their bytes until written: a writable map takes a
//! private copy when the bytes are shared, so other owners never observe
//! the write.

#![deny(unsafe_op_in_unsafe_fn)]

mod buffer;
mod color;
mod format;
mod frame;
mod frame_format;
mod image;
mod limits;
mod pixel_buffer;
mod rotation;

pub use buffer::{
    HandleType, ImageVideoBuffer, MapData, MapMode, MappedPlane, MemoryVideoBuffer,
    TextureVideoBuffer, VideoBuffer,
};
pub use color::{ColorRange, ColorSpace, ColorTransfer};
pub use format::{MAX_PLANES, PixelFormat, PlaneSpan, ROW_ALIGNMENT};
pub use frame::{FrameError, VideoFrame};
pub use frame_format::FrameFormat;
pub use image::{Image, ImageError, ImageFormat};
pub use limits::{FrameLimits, LimitExceeded};
pub use pixel_buffer::{MapError, PixelBuffer};
pub use rotation::Rotation;

// Re-exports for building images from typed pixels.
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb;
pub use rgb::alt::BGR as Bgr;
pub use rgb::{Gray, Rgb, Rgba};
