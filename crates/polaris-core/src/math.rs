use serde::{Deserialize, Serialize};

/// A 2D point in logical viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self::zero()
    }
}

/// An integer rectangle: origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The four corners in TL, TR, BL, BR order.
    pub fn corners(&self) -> Quad {
        let (x0, y0) = (self.x as f32, self.y as f32);
        let (x1, y1) = (x0 + self.width as f32, y0 + self.height as f32);
        Quad([
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x0, y1),
            Point2D::new(x1, y1),
        ])
    }
}

/// Four corners in TL, TR, BL, BR order. Need not be axis-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point2D; 4]);

impl Quad {
    pub fn from_coords(coords: [(f32, f32); 4]) -> Self {
        Quad(coords.map(|(x, y)| Point2D::new(x, y)))
    }
}

/// The fixed logical viewport every draw is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Map a logical point to device space.
    ///
    /// `x' = x/w - 0.5`, `y' = 0.5 - y/h`: the viewport becomes a quad
    /// centered on the origin spanning [-0.5, 0.5] on both axes.
    pub fn to_device(&self, p: Point2D) -> [f32; 2] {
        [
            p.x / self.width as f32 - 0.5,
            0.5 - p.y / self.height as f32,
        ]
    }

    /// Inverse of [`to_device`](Self::to_device), yielding target pixel space
    /// for a target of `target_w` x `target_h`.
    pub fn device_to_target(&self, d: [f32; 2], target_w: u32, target_h: u32) -> [f32; 2] {
        [
            (d[0] + 0.5) * target_w as f32,
            (0.5 - d[1]) * target_h as f32,
        ]
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}
