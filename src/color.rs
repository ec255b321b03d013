//! Color metadata carried by frames.
//!
//! These tags describe how YUV samples relate to RGB and light. The crate
//! never converts between color spaces; the tags travel with the
//! [`FrameFormat`](crate::FrameFormat) so a presenter can pick the right
//! shader or CMS transform. Codes follow ITU-T H.273 (CICP).

/// YUV matrix coefficients / primaries family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorSpace {
    /// Not specified. Presenters usually assume BT.601 for SD and BT.709 for HD.
    #[default]
    Undefined,
    /// ITU-R BT.601.
    Bt601,
    /// ITU-R BT.709.
    Bt709,
    /// Adobe RGB (1998). No H.273 code.
    AdobeRgb,
    /// ITU-R BT.2020 (constant or non-constant luminance).
    Bt2020,
}

impl ColorSpace {
    /// Map an H.273 `matrix_coefficients` code.
    ///
    /// Returns `None` for codes with no equivalent here.
    pub const fn from_cicp(matrix_coefficients: u8) -> Option<Self> {
        match matrix_coefficients {
            1 => Some(Self::Bt709),
            5 | 6 => Some(Self::Bt601),
            9 | 10 => Some(Self::Bt2020),
            2 => Some(Self::Undefined),
            _ => None,
        }
    }

    /// H.273 `matrix_coefficients` code, if one exists.
    pub const fn to_cicp(self) -> Option<u8> {
        match self {
            Self::Undefined => Some(2),
            Self::Bt601 => Some(6),
            Self::Bt709 => Some(1),
            Self::Bt2020 => Some(9),
            Self::AdobeRgb => None,
        }
    }
}

/// Transfer characteristic (opto-electronic curve).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorTransfer {
    /// Not specified.
    #[default]
    Unknown,
    /// ITU-R BT.709.
    Bt709,
    /// ITU-R BT.601 (SMPTE 170M).
    Bt601,
    /// Linear light.
    Linear,
    /// Pure gamma 2.2.
    Gamma22,
    /// Pure gamma 2.8.
    Gamma28,
    /// SMPTE ST 2084 perceptual quantizer (HDR10).
    St2084,
    /// ARIB STD-B67 hybrid log-gamma.
    StdB67,
}

impl ColorTransfer {
    /// Map an H.273 `transfer_characteristics` code.
    pub const fn from_cicp(tc: u8) -> Option<Self> {
        match tc {
            1 => Some(Self::Bt709),
            6 => Some(Self::Bt601),
            8 => Some(Self::Linear),
            4 => Some(Self::Gamma22),
            5 => Some(Self::Gamma28),
            16 => Some(Self::St2084),
            18 => Some(Self::StdB67),
            2 => Some(Self::Unknown),
            _ => None,
        }
    }

    /// H.273 `transfer_characteristics` code.
    pub const fn to_cicp(self) -> u8 {
        match self {
            Self::Unknown => 2,
            Self::Bt709 => 1,
            Self::Bt601 => 6,
            Self::Linear => 8,
            Self::Gamma22 => 4,
            Self::Gamma28 => 5,
            Self::St2084 => 16,
            Self::StdB67 => 18,
        }
    }

    /// Whether this is a high dynamic range curve.
    pub const fn is_hdr(self) -> bool {
        matches!(self, Self::St2084 | Self::StdB67)
    }
}

/// Quantization range of the samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorRange {
    /// Not specified.
    #[default]
    Unknown,
    /// Limited ("studio" / "TV") range, e.g. 16..=235 for 8-bit luma.
    Video,
    /// Full range, 0..=255 for 8-bit.
    Full,
}

impl ColorRange {
    /// From the H.273 `video_full_range_flag`.
    pub const fn from_full_range_flag(full_range: bool) -> Self {
        if full_range { Self::Full } else { Self::Video }
    }

    /// The H.273 `video_full_range_flag`, if the range is known.
    pub const fn full_range_flag(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Video => Some(false),
            Self::Full => Some(true),
        }
    }
}
