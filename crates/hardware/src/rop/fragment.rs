//! Fragment records exchanged between the rasterizer stages.

/// A rasterized fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    /// Pixel column in device coordinates.
    pub x: i32,
    /// Pixel row in device coordinates.
    pub y: i32,
    /// Depth produced by the rasterizer, already in buffer precision.
    pub z: u32,
    /// Whether the sample lies inside the triangle.
    pub inside_triangle: bool,
}

/// One sample of a stamp as carried on the fragment signals.
///
/// A sample without a fragment marks the end of a batch: every sample of the
/// last stamp of a batch carries `fragment: None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentInput {
    /// Fragment, or `None` for the end-of-batch stamp.
    pub fragment: Option<Fragment>,
    /// Shader output attributes; attribute 0 is the position.
    pub attributes: Vec<[f32; 4]>,
    /// Triangle the fragment belongs to.
    pub triangle_id: u32,
    /// Whether the sample has been culled by an earlier test.
    pub culled: bool,
}

impl FragmentInput {
    /// Creates a sample for a fragment.
    pub fn new(fragment: Fragment, triangle_id: u32) -> Self {
        Self {
            culled: !fragment.inside_triangle,
            fragment: Some(fragment),
            attributes: Vec::new(),
            triangle_id,
        }
    }

    /// Creates a sample of the end-of-batch stamp.
    pub const fn end_of_batch() -> Self {
        Self {
            fragment: None,
            attributes: Vec::new(),
            triangle_id: 0,
            culled: true,
        }
    }

    /// Attaches shader output attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<[f32; 4]>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns true for samples of the end-of-batch stamp.
    #[inline]
    pub const fn is_end_of_batch(&self) -> bool {
        self.fragment.is_none()
    }
}

/// Stamp of samples, ordered in the stamp's row-major pixel order.
pub type Stamp = Vec<FragmentInput>;
