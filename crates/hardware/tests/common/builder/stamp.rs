use zstsim_core::common::TileLayout;
use zstsim_core::rop::{Fragment, FragmentInput, Stamp};

/// Builds one stamp whose samples cover the stamp at `(x, y)` in row-major order.
pub struct StampBuilder {
    x: i32,
    y: i32,
    z: u32,
    triangle: u32,
    outside: Vec<usize>,
    attribute_z: Option<f32>,
}

impl StampBuilder {
    pub fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            z: 0,
            triangle: 0,
            outside: Vec::new(),
            attribute_z: None,
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn depth(mut self, z: u32) -> Self {
        self.z = z;
        self
    }

    pub fn triangle(mut self, id: u32) -> Self {
        self.triangle = id;
        self
    }

    /// Marks a sample as outside the triangle.
    pub fn outside(mut self, sample: usize) -> Self {
        self.outside.push(sample);
        self
    }

    /// Marks every sample of a stamp of `samples` samples as outside.
    pub fn all_outside(mut self, samples: usize) -> Self {
        self.outside = (0..samples).collect();
        self
    }

    /// Gives every sample a shader-written position with this depth.
    pub fn shader_depth(mut self, z: f32) -> Self {
        self.attribute_z = Some(z);
        self
    }

    pub fn build(self, layout: &TileLayout) -> Stamp {
        let mut stamp = Vec::with_capacity(layout.stamp_samples());
        for dy in 0..layout.stamp_h as i32 {
            for dx in 0..layout.stamp_w as i32 {
                let index = stamp.len();
                let fragment = Fragment {
                    x: self.x + dx,
                    y: self.y + dy,
                    z: self.z,
                    inside_triangle: !self.outside.contains(&index),
                };
                let mut sample = FragmentInput::new(fragment, self.triangle);
                if let Some(z) = self.attribute_z {
                    sample = sample.with_attributes(vec![[0.0, 0.0, 0.0, z]]);
                }
                stamp.push(sample);
            }
        }
        stamp
    }
}

impl Default for StampBuilder {
    fn default() -> Self {
        Self::new()
    }
}
