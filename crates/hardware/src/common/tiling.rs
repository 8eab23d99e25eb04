//! Framebuffer Tiling.
//!
//! The depth/stencil buffer is stored as a hierarchy of tiles so that a cache line
//! covers a compact screen region. From the outside in:
//! 1. **Over-scan tiles:** stored in rows across the display.
//! 2. **Scan tiles:** stored in Morton order inside an over-scan tile.
//! 3. **Generation tiles:** stored in rows inside a scan tile.
//! 4. **Stamps:** stored in rows inside a generation tile.
//! 5. **Pixels:** stored in rows inside a stamp.
//!
//! Each level is measured in units of the level below it.

use serde::Deserialize;

/// Tile hierarchy dimensions, each level expressed in units of the next lower level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TileLayout {
    /// Stamp width in pixels.
    pub stamp_w: u32,
    /// Stamp height in pixels.
    pub stamp_h: u32,
    /// Generation tile width in stamps.
    pub gen_w: u32,
    /// Generation tile height in stamps.
    pub gen_h: u32,
    /// Scan tile width in generation tiles.
    pub scan_w: u32,
    /// Scan tile height in generation tiles.
    pub scan_h: u32,
    /// Over-scan tile width in scan tiles.
    pub over_w: u32,
    /// Over-scan tile height in scan tiles.
    pub over_h: u32,
}

impl Default for TileLayout {
    /// 2x2 stamps, 4x4 stamp generation tiles (8x8 pixels), 2x2 generation tile
    /// scan tiles and 4x4 scan tile over-scan tiles.
    fn default() -> Self {
        Self {
            stamp_w: 2,
            stamp_h: 2,
            gen_w: 4,
            gen_h: 4,
            scan_w: 2,
            scan_h: 2,
            over_w: 4,
            over_h: 4,
        }
    }
}

impl TileLayout {
    /// Number of samples in one stamp.
    #[inline]
    pub const fn stamp_samples(&self) -> usize {
        (self.stamp_w * self.stamp_h) as usize
    }

    /// Width in pixels of an over-scan tile.
    #[inline]
    const fn over_tile_pixels_w(&self) -> u32 {
        self.over_w * self.scan_w * self.gen_w * self.stamp_w
    }

    /// Translates a device pixel position into a byte offset inside the buffer.
    ///
    /// # Arguments
    ///
    /// * `x` - Pixel column in device coordinates.
    /// * `y` - Pixel row in device coordinates.
    /// * `x_res` - Display horizontal resolution in pixels.
    /// * `bytes_pixel` - Bytes stored per pixel.
    ///
    /// # Returns
    ///
    /// The byte offset of the pixel relative to the start of the buffer.
    pub fn pixel_to_memory(&self, x: i32, y: i32, x_res: u32, bytes_pixel: u32) -> u32 {
        // Positions are already in device coordinates; clipping happens downstream.
        let x = x.max(0) as u32;
        let y = y.max(0) as u32;

        let over_tile_w = self.over_tile_pixels_w();
        let over_tile_h = self.over_h * self.scan_h * self.gen_h * self.stamp_h;
        let over_columns = x_res.div_ceil(over_tile_w).max(1);
        let mut address = (y / over_tile_h) * over_columns + x / over_tile_w;

        let x_scan = (x / (self.scan_w * self.gen_w * self.stamp_w)) % self.over_w;
        let y_scan = (y / (self.scan_h * self.gen_h * self.stamp_h)) % self.over_h;
        address = address * self.over_w * self.over_h + self.scan_tile_index(x_scan, y_scan);

        let x_gen = (x / (self.gen_w * self.stamp_w)) % self.scan_w;
        let y_gen = (y / (self.gen_h * self.stamp_h)) % self.scan_h;
        address = address * self.scan_w * self.scan_h + y_gen * self.scan_w + x_gen;

        let x_stamp = (x / self.stamp_w) % self.gen_w;
        let y_stamp = (y / self.stamp_h) % self.gen_h;
        address = address * self.gen_w * self.gen_h + y_stamp * self.gen_w + x_stamp;

        let x_pixel = x % self.stamp_w;
        let y_pixel = y % self.stamp_h;
        address = address * self.stamp_w * self.stamp_h + y_pixel * self.stamp_w + x_pixel;

        address * bytes_pixel
    }

    /// Position of a scan tile inside its over-scan tile.
    ///
    /// Square power-of-two over-scan tiles use Morton order, anything else
    /// falls back to row order.
    fn scan_tile_index(&self, x: u32, y: u32) -> u32 {
        if self.over_w == self.over_h && self.over_w.is_power_of_two() {
            morton(self.over_w.trailing_zeros(), x, y)
        } else {
            y * self.over_w + x
        }
    }
}

/// Interleaves the low `bits` bits of `x` (even positions) and `y` (odd positions).
pub fn morton(bits: u32, x: u32, y: u32) -> u32 {
    let mut index = 0;
    for bit in 0..bits {
        index |= ((x >> bit) & 1) << (2 * bit);
        index |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    index
}
