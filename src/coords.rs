//! Coordinate transforms between the three coordinate systems of a feed.
//!
//! * chip: camera-native sensor pixels, before any flip or transpose
//! * frame: pixel indices within a (cropped, binned) feed buffer
//! * display: chip coordinates after the camera's flip/transpose, as rendered
//!
//! The forward chip to display map flips horizontally, then vertically, then
//! transposes. The inverse applies the same steps in reverse order.

use crate::camera::CameraIdentity;

/// A point or extent in one of the coordinate systems.
pub type Point = (i64, i64);

/// Orientation flags of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub transpose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateModel {
    chip: Point,
    bin: Point,
    sensor_start: Point,
    feed_start: Point,
    feed_pixels: Point,
    transform: Transform,
}

impl CoordinateModel {
    /// Model of the unmodified camera output.
    pub fn for_camera(camera: &CameraIdentity) -> Self {
        Self {
            chip: (camera.x_chip as i64, camera.y_chip as i64),
            bin: (camera.x_bin as i64, camera.y_bin as i64),
            sensor_start: (camera.x_start as i64, camera.y_start as i64),
            feed_start: (0, 0),
            feed_pixels: (camera.x_pixels as i64, camera.y_pixels as i64),
            transform: camera.transform,
        }
    }

    /// Restrict the model to a feed region. `start` is the 0-based origin of
    /// the region within the camera frame.
    pub fn with_feed_region(mut self, start: (usize, usize), pixels: (u32, u32)) -> Self {
        self.feed_start = (start.0 as i64, start.1 as i64);
        self.feed_pixels = (pixels.0 as i64, pixels.1 as i64);
        self
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn chip_to_display(&self, x: i64, y: i64) -> Point {
        let (mut x, mut y) = (x, y);
        if self.transform.flip_horizontal {
            x = self.chip.0 - x;
        }
        if self.transform.flip_vertical {
            y = self.chip.1 - y;
        }
        if self.transform.transpose {
            std::mem::swap(&mut x, &mut y);
        }
        (x, y)
    }

    pub fn display_to_chip(&self, x: i64, y: i64) -> Point {
        let (mut x, mut y) = (x, y);
        if self.transform.transpose {
            std::mem::swap(&mut x, &mut y);
        }
        if self.transform.flip_vertical {
            y = self.chip.1 - y;
        }
        if self.transform.flip_horizontal {
            x = self.chip.0 - x;
        }
        (x, y)
    }

    /// Chip coordinates to indices within this feed's frame. Truncates toward
    /// zero, so points left of or above the frame map to 0 or below.
    pub fn chip_to_frame(&self, x: i64, y: i64) -> Point {
        let x = (x - (self.sensor_start.0 + self.feed_start.0)) / self.bin.0;
        let y = (y - (self.sensor_start.1 + self.feed_start.1)) / self.bin.1;
        (x, y)
    }

    /// Center of the frame in display coordinates.
    pub fn frame_center(&self) -> Point {
        let cx = self.sensor_start.0 + self.bin.0 * self.feed_start.0 + self.feed_pixels.0 / 2;
        let cy = self.sensor_start.1 + self.bin.1 * self.feed_start.1 + self.feed_pixels.1 / 2;
        self.chip_to_display(cx, cy)
    }

    /// Where the frame's (0, 0) pixel lands in display coordinates.
    pub fn frame_origin(&self) -> Point {
        let zx = self.sensor_start.0 + self.bin.0 * self.feed_start.0;
        let zy = self.sensor_start.1 + self.bin.1 * self.feed_start.1;
        self.chip_to_display(zx, zy)
    }

    /// Chip extent in display orientation.
    pub fn chip_size(&self) -> Point {
        self.oriented(self.chip)
    }

    /// Bin factors in display orientation.
    pub fn frame_scale(&self) -> Point {
        self.oriented(self.bin)
    }

    /// Frame dimensions in display orientation.
    pub fn frame_size(&self) -> Point {
        self.oriented(self.feed_pixels)
    }

    fn oriented(&self, (x, y): Point) -> Point {
        if self.transform.transpose {
            (y, x)
        } else {
            (x, y)
        }
    }
}
