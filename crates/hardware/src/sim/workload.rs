//! Synthetic stamp streams.
//!
//! The generators here stand in for the rasterizer: they cover screen rectangles
//! with stamps the way the tile walker would emit them.

use crate::common::TileLayout;
use crate::rop::fragment::{Fragment, FragmentInput, Stamp};

/// Screen-aligned rectangle of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left column.
    pub x: i32,
    /// Top row.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width as i32 && y < self.y + self.height as i32
    }
}

/// Covers `rect` with stamps at a constant depth.
///
/// Stamps are aligned to the stamp grid and emitted in row-major stamp order.
/// Samples of a border stamp that fall outside the rectangle are marked as
/// outside the triangle.
pub fn rectangle(layout: &TileLayout, rect: Rect, z: u32, triangle_id: u32) -> Vec<Stamp> {
    let sw = layout.stamp_w as i32;
    let sh = layout.stamp_h as i32;
    let x0 = rect.x.div_euclid(sw) * sw;
    let y0 = rect.y.div_euclid(sh) * sh;
    let x1 = rect.x + rect.width as i32;
    let y1 = rect.y + rect.height as i32;

    let mut stamps = Vec::new();
    for sy in (y0..y1).step_by(sh as usize) {
        for sx in (x0..x1).step_by(sw as usize) {
            let mut stamp = Vec::with_capacity(layout.stamp_samples());
            for py in sy..sy + sh {
                for px in sx..sx + sw {
                    let fragment = Fragment {
                        x: px,
                        y: py,
                        z,
                        inside_triangle: rect.contains(px, py),
                    };
                    stamp.push(FragmentInput::new(fragment, triangle_id));
                }
            }
            stamps.push(stamp);
        }
    }
    stamps
}

/// Stamp closing a batch.
pub fn end_of_batch(samples: usize) -> Stamp {
    vec![FragmentInput::end_of_batch(); samples]
}
