//! Frame rotation support.

/// Clockwise rotation to apply to a frame for display.
///
/// Stored pixel data is never rotated in place; the rotation travels with
/// the frame's [`FrameFormat`](crate::FrameFormat) and presenters apply it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Rotation {
    /// No rotation.
    #[default]
    None = 0,
    /// Rotate 90 degrees clockwise.
    Clockwise90 = 90,
    /// Rotate 180 degrees.
    Clockwise180 = 180,
    /// Rotate 270 degrees clockwise (= 90 CCW).
    Clockwise270 = 270,
}

impl Rotation {
    /// Create from an arbitrary angle in degrees.
    ///
    /// The angle is normalized into `0..360` and snapped to the nearest
    /// quarter turn, so `-90` yields [`Clockwise270`](Rotation::Clockwise270)
    /// and `100` yields [`Clockwise90`](Rotation::Clockwise90).
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            1 => Self::Clockwise90,
            2 => Self::Clockwise180,
            3 => Self::Clockwise270,
            _ => Self::None,
        }
    }

    /// Angle in degrees (0, 90, 180 or 270).
    #[inline]
    pub const fn degrees(self) -> u16 {
        self as u16
    }

    /// Whether this rotation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::Clockwise90 | Self::Clockwise270)
    }

    /// Compute display dimensions for the given stored dimensions.
    pub fn display_dimensions(self, stored_width: u32, stored_height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (stored_height, stored_width)
        } else {
            (stored_width, stored_height)
        }
    }

    /// Whether any transformation is needed.
    pub fn is_identity(self) -> bool {
        matches!(self, Self::None)
    }

    /// Rotation equivalent to applying `self` followed by `other`.
    pub fn then(self, other: Rotation) -> Self {
        Self::from_degrees(self.degrees() as i32 + other.degrees() as i32)
    }

    /// Rotation that undoes this one.
    pub fn inverse(self) -> Self {
        Self::from_degrees(-(self.degrees() as i32))
    }
}
