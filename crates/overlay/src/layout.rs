//! Overlay placement
//!
//! Anchors are expressed for a 1024x720 reference frame and multiplied by
//! the output scale. Text anchors are baselines.

pub const REFERENCE_WIDTH: u32 = 1024;
pub const REFERENCE_HEIGHT: u32 = 720;

/// Output area over reference area
pub fn scale_for(width: u32, height: u32) -> f32 {
    (width as f32 * height as f32) / (REFERENCE_WIDTH as f32 * REFERENCE_HEIGHT as f32)
}

pub type Anchor = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub scale: f32,
    pub bottom: f32,
    pub top: f32,
    pub left: f32,
    pub right: f32,
    pub centre: f32,
}

fn anchor(x: f32, y: f32) -> Anchor {
    (x.round() as i32, y.round() as i32)
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        let scale = scale_for(width, height);
        Self {
            scale,
            bottom: height as f32 - 15.0 * scale,
            top: 35.0 * scale,
            left: 40.0 * scale,
            right: width as f32 - 90.0 * scale,
            centre: width as f32 / 2.0,
        }
    }

    /// Room left between the bottom labels and the graphics above them
    fn graphics_bottom(&self) -> f32 {
        self.bottom - 30.0 * self.scale
    }

    pub fn speed_value(&self) -> Anchor {
        anchor(self.left, self.bottom)
    }

    pub fn speed_units(&self) -> Anchor {
        anchor(self.left + 198.0 * self.scale, self.bottom)
    }

    /// Top-left corner of the speed gauge
    pub fn speed_gauge(&self, _width: u32, height: u32) -> Anchor {
        anchor(self.left, self.graphics_bottom() - height as f32)
    }

    pub fn lean_label(&self) -> Anchor {
        anchor(self.centre - 20.0 * self.scale, self.bottom)
    }

    /// Top-left corner of the lean gauge, centred horizontally
    pub fn lean_gauge(&self, width: u32, height: u32) -> Anchor {
        anchor(
            self.centre - width as f32 / 2.0,
            self.graphics_bottom() - height as f32 / 2.0,
        )
    }

    pub fn acceleration_value(&self) -> Anchor {
        anchor(self.right - 35.0 * self.scale, self.bottom)
    }

    pub fn acceleration_unit(&self) -> Anchor {
        anchor(self.right + 25.0 * self.scale, self.bottom)
    }

    /// Top-left corner of the force icon
    pub fn force_icon(&self, width: u32, height: u32) -> Anchor {
        anchor(
            self.right - width as f32 / 2.0,
            self.graphics_bottom() - height as f32,
        )
    }

    pub fn distance(&self) -> Anchor {
        anchor(self.left + 65.0 * self.scale, self.top)
    }

    pub fn altitude(&self) -> Anchor {
        anchor(self.centre - 10.0 * self.scale, self.top)
    }

    pub fn terrain_inclination(&self) -> Anchor {
        anchor(self.right + 5.0 * self.scale, self.top)
    }
}
