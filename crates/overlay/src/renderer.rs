//! Per-frame overlay composition

use image::{Rgb, RgbImage, Rgba};
use serde::{Deserialize, Serialize};
use storage::{EnabledMetrics, InclinationSnapshot, LocationSnapshot, GRAVITY};
use tracing::debug;

use crate::force::ForceIcons;
use crate::labels;
use crate::layout::Layout;
use crate::lean::LeanGauge;
use crate::speed::SpeedGauge;
use crate::sprite::blit;
use crate::text::TextRenderer;
use crate::units::UnitSystem;
use crate::OverlayError;

/// Text height on the reference frame (px)
pub const REFERENCE_TEXT_HEIGHT: f32 = 30.0;

/// Overlay appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// RGB colour of labels and graphics
    pub color: [u8; 3],
    pub units: UnitSystem,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [0, 188, 212],
            units: UnitSystem::Metric,
        }
    }
}

/// Draws the enabled metrics onto frames of one fixed size.
///
/// Built once per composition: every graphic is rendered and scaled to
/// the output resolution up front.
pub struct OverlayRenderer {
    width: u32,
    height: u32,
    layout: Layout,
    metrics: EnabledMetrics,
    units: UnitSystem,
    text: TextRenderer,
    speed: SpeedGauge,
    lean: LeanGauge,
    force: ForceIcons,
}

impl OverlayRenderer {
    pub fn new(
        width: u32,
        height: u32,
        max_speed: f32,
        metrics: EnabledMetrics,
        style: &OverlayStyle,
    ) -> Result<Self, OverlayError> {
        if width == 0 || height == 0 {
            return Err(OverlayError::InvalidSize { width, height });
        }

        let layout = Layout::new(width, height);
        let [r, g, b] = style.color;
        let graphics = Rgba([r, g, b, 255]);
        debug!("Overlay for {}x{}, scale {:.3}, max speed {:.1}", width, height, layout.scale, max_speed);

        Ok(Self {
            width,
            height,
            metrics,
            units: style.units,
            text: TextRenderer::new(REFERENCE_TEXT_HEIGHT * layout.scale, Rgb(style.color)),
            speed: SpeedGauge::new(max_speed, layout.scale, graphics),
            lean: LeanGauge::new(layout.scale, graphics),
            force: ForceIcons::new(layout.scale, graphics),
            layout,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn metrics(&self) -> &EnabledMetrics {
        &self.metrics
    }

    /// Draw every enabled metric whose telemetry is available
    pub fn render(
        &self,
        canvas: &mut RgbImage,
        location: Option<&LocationSnapshot>,
        inclination: Option<&InclinationSnapshot>,
    ) -> Result<(), OverlayError> {
        if canvas.dimensions() != (self.width, self.height) {
            return Err(OverlayError::SizeMismatch {
                expected: (self.width, self.height),
                actual: canvas.dimensions(),
            });
        }

        if let Some(location) = location {
            self.draw_location(canvas, location);
        }
        if let Some(inclination) = inclination {
            self.draw_inclination(canvas, inclination);
        }
        Ok(())
    }

    fn draw_location(&self, canvas: &mut RgbImage, location: &LocationSnapshot) {
        let layout = &self.layout;

        if self.metrics.speed {
            let gauge = self.speed.sprite(location.speed);
            let (x, y) = layout.speed_gauge(gauge.width(), gauge.height());
            blit(canvas, gauge, x, y);
            self.text_at(canvas, layout.speed_value(), &labels::speed(location.speed, self.units));
            self.text_at(canvas, layout.speed_units(), self.units.speed_label());
        }
        if self.metrics.distance {
            self.text_at(canvas, layout.distance(), &labels::length(location.distance, self.units));
        }
        if self.metrics.altitude {
            self.text_at(canvas, layout.altitude(), &labels::length(location.altitude, self.units));
        }
        if self.metrics.terrain_inclination {
            self.text_at(
                canvas,
                layout.terrain_inclination(),
                &labels::terrain_inclination(location.terrain_inclination),
            );
        }
    }

    fn draw_inclination(&self, canvas: &mut RgbImage, inclination: &InclinationSnapshot) {
        let layout = &self.layout;

        if self.metrics.lean_angle {
            let gauge = self.lean.sprite(inclination.roll);
            let (x, y) = layout.lean_gauge(gauge.width(), gauge.height());
            blit(canvas, gauge, x, y);
            self.text_at(canvas, layout.lean_label(), &labels::lean_angle(inclination.roll));
        }
        if self.metrics.acceleration {
            let scalar = inclination.acceleration_scalar();
            let icon = self.force.icon(scalar / GRAVITY, inclination.acceleration_direction());
            let (x, y) = layout.force_icon(icon.width(), icon.height());
            blit(canvas, icon, x, y);
            self.text_at(canvas, layout.acceleration_value(), &labels::acceleration(scalar));
            self.text_at(canvas, layout.acceleration_unit(), labels::ACCELERATION_UNIT);
        }
    }

    fn text_at(&self, canvas: &mut RgbImage, (x, y): (i32, i32), text: &str) {
        self.text.draw(canvas, x, y, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> LocationSnapshot {
        LocationSnapshot {
            timestamp_ms: 1000,
            speed: 20.0,
            distance: 1500.0,
            altitude: 320.0,
            terrain_inclination: 4,
            ..Default::default()
        }
    }

    fn inclination() -> InclinationSnapshot {
        InclinationSnapshot {
            timestamp_ms: 1000,
            roll: -27,
            acceleration_lateral: -9.0,
            acceleration_longitudinal: 1.0,
        }
    }

    fn lit(canvas: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
        (x0..x1).any(|x| (y0..y1).any(|y| *canvas.get_pixel(x, y) != Rgb([0, 0, 0])))
    }

    #[test]
    fn test_draws_each_region() {
        let renderer = OverlayRenderer::new(1024, 720, 40.0, EnabledMetrics::default(), &OverlayStyle::default()).unwrap();
        let mut canvas = RgbImage::new(1024, 720);
        renderer.render(&mut canvas, Some(&location()), Some(&inclination())).unwrap();

        // Speed gauge and value, bottom left
        assert!(lit(&canvas, 40, 575, 230, 675));
        assert!(lit(&canvas, 40, 677, 120, 706));
        // Lean gauge, bottom centre
        assert!(lit(&canvas, 447, 639, 577, 711));
        // Force icon, bottom right
        assert!(lit(&canvas, 899, 605, 969, 675));
        // Distance label, top left
        assert!(lit(&canvas, 105, 7, 200, 36));
    }

    #[test]
    fn test_disabled_or_missing_metrics_draw_nothing() {
        let none = EnabledMetrics {
            speed: false,
            lean_angle: false,
            acceleration: false,
            distance: false,
            altitude: false,
            terrain_inclination: false,
        };
        let renderer = OverlayRenderer::new(320, 240, 40.0, none, &OverlayStyle::default()).unwrap();
        let mut canvas = RgbImage::new(320, 240);
        renderer.render(&mut canvas, Some(&location()), Some(&inclination())).unwrap();
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));

        let renderer = OverlayRenderer::new(320, 240, 40.0, EnabledMetrics::default(), &OverlayStyle::default()).unwrap();
        renderer.render(&mut canvas, None, None).unwrap();
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_size_checks() {
        assert!(matches!(
            OverlayRenderer::new(0, 720, 10.0, EnabledMetrics::default(), &OverlayStyle::default()),
            Err(OverlayError::InvalidSize { .. })
        ));

        let renderer = OverlayRenderer::new(64, 48, 10.0, EnabledMetrics::default(), &OverlayStyle::default()).unwrap();
        let mut wrong = RgbImage::new(48, 64);
        assert!(matches!(
            renderer.render(&mut wrong, Some(&location()), None),
            Err(OverlayError::SizeMismatch { .. })
        ));
    }
}
