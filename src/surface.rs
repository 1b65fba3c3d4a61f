//! A frame of the particle field, in half-block pixel space.
//!
//! The drawing surface is an RGBA buffer twice as tall as the terminal has rows, because 2
//! "pixels" can fit in a single TTY cell using the UTF8 half-block trick: ▀▄▀▄. All the raster
//! primitives blend with straight alpha, and the finished frame is converted to a Termwiz cell
//! surface just before being sent to the renderer.

use glam::Vec2;
use palette::IntoColor as _;
use termwiz::surface::Change as TermwizChange;
use termwiz::surface::Position as TermwizPosition;

/// An RGBA colour
pub(crate) type Colour = (f32, f32, f32, f32);

/// A fully transparent pixel.
pub const TRANSPARENT: Colour = (0.0, 0.0, 0.0, 0.0);

/// A default pure white.
pub const WHITE: Colour = (1.0, 1.0, 1.0, 1.0);

/// `Surface`
#[derive(Clone)]
pub(crate) struct Surface {
    /// The terminal's width
    pub width: usize,
    /// The terminal's height
    pub height: usize,
    /// The pixel buffer. Its dimensions are `width` × `height * 2`.
    pixels: Vec<Colour>,
}

impl Surface {
    /// Create an empty surface for the given terminal size.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width * height * 2],
        }
    }

    /// The height of the surface in pixels, as opposed to rows.
    #[must_use]
    pub const fn pixel_height(&self) -> usize {
        self.height * 2
    }

    /// Get the pixel at the given coordinate.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Colour> {
        if x >= self.width || y >= self.pixel_height() {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// Alpha-blend a colour over the pixel at the given coordinate. Coordinates outside the
    /// surface are silently clipped, so callers are free to draw shapes that spill over the edges.
    pub fn blend_pixel(&mut self, x: i64, y: i64, colour: Colour) {
        if x < 0 || y < 0 {
            return;
        }
        #[expect(
            clippy::cast_sign_loss,
            clippy::as_conversions,
            reason = "Negative values have just been discarded"
        )]
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.pixel_height() {
            return;
        }

        let index = y * self.width + x;
        let Some(destination) = self.pixels.get_mut(index) else {
            return;
        };

        let (source_red, source_green, source_blue, source_alpha) = colour;
        let (dest_red, dest_green, dest_blue, dest_alpha) = *destination;
        let out_alpha = source_alpha + dest_alpha * (1.0 - source_alpha);
        if out_alpha <= 0.0 {
            *destination = TRANSPARENT;
            return;
        }

        let blend_channel = |source: f32, dest: f32| {
            (source * source_alpha + dest * dest_alpha * (1.0 - source_alpha)) / out_alpha
        };
        *destination = (
            blend_channel(source_red, dest_red),
            blend_channel(source_green, dest_green),
            blend_channel(source_blue, dest_blue),
            out_alpha,
        );
    }

    /// Draw a filled circle.
    pub fn fill_circle(&mut self, centre: Vec2, radius: f32, colour: Colour) {
        let radius = radius.max(0.0);
        #[expect(
            clippy::cast_possible_truncation,
            clippy::as_conversions,
            reason = "We're just rasterising to a pixel grid"
        )]
        let (left, right, top, bottom) = (
            (centre.x - radius).floor() as i64,
            (centre.x + radius).ceil() as i64,
            (centre.y - radius).floor() as i64,
            (centre.y + radius).ceil() as i64,
        );

        for y in top..=bottom {
            for x in left..=right {
                #[expect(
                    clippy::cast_precision_loss,
                    clippy::as_conversions,
                    reason = "We're just rasterising to a pixel grid"
                )]
                let offset = Vec2::new(x as f32, y as f32) - centre;
                if offset.length() <= radius {
                    self.blend_pixel(x, y, colour);
                }
            }
        }
    }

    /// Draw a soft halo: a filled circle whose alpha falls off linearly from the centre to fully
    /// transparent at the given radius.
    pub fn halo(&mut self, centre: Vec2, radius: f32, colour: Colour) {
        let radius = radius.max(0.0);
        if radius <= 0.0 {
            return;
        }
        #[expect(
            clippy::cast_possible_truncation,
            clippy::as_conversions,
            reason = "We're just rasterising to a pixel grid"
        )]
        let (left, right, top, bottom) = (
            (centre.x - radius).floor() as i64,
            (centre.x + radius).ceil() as i64,
            (centre.y - radius).floor() as i64,
            (centre.y + radius).ceil() as i64,
        );

        for y in top..=bottom {
            for x in left..=right {
                #[expect(
                    clippy::cast_precision_loss,
                    clippy::as_conversions,
                    reason = "We're just rasterising to a pixel grid"
                )]
                let offset = Vec2::new(x as f32, y as f32) - centre;
                let distance = offset.length();
                if distance <= radius {
                    let falloff = 1.0 - distance / radius;
                    let (red, green, blue, alpha) = colour;
                    self.blend_pixel(x, y, (red, green, blue, alpha * falloff));
                }
            }
        }
    }

    /// Draw a straight line segment between 2 points.
    pub fn line(&mut self, from: Vec2, to: Vec2, colour: Colour) {
        let delta = to - from;
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::as_conversions,
            reason = "We're just rasterising to a pixel grid"
        )]
        let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as usize;

        for step in 0..=steps {
            #[expect(
                clippy::cast_precision_loss,
                clippy::as_conversions,
                reason = "Step counts are tiny"
            )]
            let progress = step as f32 / steps as f32;
            let point = from + delta * progress;
            #[expect(
                clippy::cast_possible_truncation,
                clippy::as_conversions,
                reason = "We're just rasterising to a pixel grid"
            )]
            self.blend_pixel(point.x.round() as i64, point.y.round() as i64, colour);
        }
    }

    /// Convert the pixel buffer to a surface of terminal cells using the half-block trick.
    ///
    /// The rule is that we default to rendering any pair of pixels using the upper half block,
    /// so the upper pixel becomes the cell's foreground and the lower pixel its background.
    /// When only the lower pixel is set we use a lower half block instead, which retains the
    /// ANSI-coded default background colour in the upper half.
    #[must_use]
    pub fn to_cells(&self) -> termwiz::surface::Surface {
        let mut cells = termwiz::surface::Surface::new(self.width, self.height);

        for row in 0..self.height {
            for col in 0..self.width {
                let upper = self.pixel(col, row * 2).unwrap_or(TRANSPARENT);
                let lower = self.pixel(col, row * 2 + 1).unwrap_or(TRANSPARENT);
                let is_upper_set = upper.3 > 0.0;
                let is_lower_set = lower.3 > 0.0;
                if !is_upper_set && !is_lower_set {
                    continue;
                }

                cells.add_change(TermwizChange::CursorPosition {
                    x: TermwizPosition::Absolute(col),
                    y: TermwizPosition::Absolute(row),
                });

                if is_upper_set && is_lower_set {
                    cells.add_changes(vec![
                        Self::make_fg_colour(flatten(upper)),
                        Self::make_bg_colour(flatten(lower)),
                    ]);
                    cells.add_change("▀");
                } else if is_upper_set {
                    cells.add_changes(vec![
                        Self::make_fg_colour(flatten(upper)),
                        Self::make_default_bg_colour(),
                    ]);
                    cells.add_change("▀");
                } else {
                    cells.add_changes(vec![
                        Self::make_fg_colour(flatten(lower)),
                        Self::make_default_bg_colour(),
                    ]);
                    cells.add_change("▄");
                }
            }
        }

        cells
    }

    /// Make a Termwiz colour attribute
    #[must_use]
    pub const fn make_colour_attribute(colour: Colour) -> termwiz::color::ColorAttribute {
        termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(termwiz::color::SrgbaTuple(
            colour.0, colour.1, colour.2, colour.3,
        ))
    }

    /// Make a Termwiz background colour
    #[must_use]
    pub const fn make_bg_colour(colour: Colour) -> TermwizChange {
        let colour_attribute = Self::make_colour_attribute(colour);
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(colour_attribute))
    }

    /// Make the default Termwiz background colour. This is the non-colour, usually black, that a
    /// terminal displays when nothing else has been set.
    #[must_use]
    pub const fn make_default_bg_colour() -> TermwizChange {
        let colour_attribute = termwiz::color::ColorAttribute::Default;
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(colour_attribute))
    }

    /// Make a Termwiz foreground colour
    #[must_use]
    pub const fn make_fg_colour(colour: Colour) -> TermwizChange {
        let colour_attribute = Self::make_colour_attribute(colour);
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Foreground(colour_attribute))
    }
}

/// Composite a translucent pixel onto the terminal's (assumed dark) background. True colour
/// terminals don't blend alpha themselves, so it has to be baked in before the cell is emitted.
fn flatten(colour: Colour) -> Colour {
    let (red, green, blue, alpha) = colour;
    (red * alpha, green * alpha, blue * alpha, 1.0)
}

/// Build an RGBA colour from hue/saturation/lightness. Hue is in degrees.
#[must_use]
pub fn hsl_colour(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Colour {
    let rgb: palette::Srgb = palette::Hsl::new(hue, saturation, lightness).into_color();
    (rgb.red, rgb.green, rgb.blue, alpha)
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    clippy::unwrap_used,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    const GREY: Colour = (0.5, 0.5, 0.5, 1.0);

    #[test]
    fn blend_over_transparent_keeps_colour() {
        let mut surface = Surface::new(2, 2);
        surface.blend_pixel(0, 0, GREY);
        assert_eq!(surface.pixel(0, 0).unwrap(), GREY);
    }

    #[test]
    fn blend_is_alpha_weighted() {
        let mut surface = Surface::new(1, 1);
        surface.blend_pixel(0, 0, (1.0, 1.0, 1.0, 1.0));
        surface.blend_pixel(0, 0, (0.0, 0.0, 0.0, 0.5));
        let (red, green, blue, alpha) = surface.pixel(0, 0).unwrap();
        assert!((red - 0.5).abs() < f32::EPSILON);
        assert!((green - 0.5).abs() < f32::EPSILON);
        assert!((blue - 0.5).abs() < f32::EPSILON);
        assert!((alpha - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_bounds_pixels_are_clipped() {
        let mut surface = Surface::new(2, 2);
        surface.blend_pixel(-1, 0, WHITE);
        surface.blend_pixel(0, -5, WHITE);
        surface.blend_pixel(2, 0, WHITE);
        surface.blend_pixel(0, 4, WHITE);
        for y in 0..surface.pixel_height() {
            for x in 0..surface.width {
                assert_eq!(surface.pixel(x, y).unwrap(), TRANSPARENT);
            }
        }
    }

    #[test]
    fn upper_pixel_renders_as_upper_half_block() {
        let mut surface = Surface::new(2, 2);
        surface.blend_pixel(0, 0, WHITE);
        let mut cells = surface.to_cells();

        let cell = &cells.screen_cells()[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(WHITE)
        );
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn lone_lower_pixel_renders_as_lower_half_block() {
        let mut surface = Surface::new(1, 1);
        surface.blend_pixel(0, 1, WHITE);
        let mut cells = surface.to_cells();

        let cell = &cells.screen_cells()[0][0];
        assert_eq!(cell.str(), "▄");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(WHITE)
        );
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn both_pixels_render_as_full_cell() {
        let mut surface = Surface::new(1, 1);
        surface.blend_pixel(0, 0, WHITE);
        surface.blend_pixel(0, 1, GREY);
        let mut cells = surface.to_cells();

        let cell = &cells.screen_cells()[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(WHITE)
        );
        assert_eq!(
            cell.attrs().background(),
            Surface::make_colour_attribute(GREY)
        );
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut surface = Surface::new(10, 5);
        surface.line(Vec2::new(0.0, 0.0), Vec2::new(9.0, 9.0), WHITE);
        assert_eq!(surface.pixel(0, 0).unwrap(), WHITE);
        assert_eq!(surface.pixel(9, 9).unwrap(), WHITE);
    }

    #[test]
    fn circle_fills_its_centre() {
        let mut surface = Surface::new(10, 5);
        surface.fill_circle(Vec2::new(5.0, 5.0), 2.0, WHITE);
        assert_eq!(surface.pixel(5, 5).unwrap(), WHITE);
        assert_eq!(surface.pixel(5, 7).unwrap(), WHITE);
        // Comfortably outside the radius.
        assert_eq!(surface.pixel(9, 9).unwrap(), TRANSPARENT);
    }

    #[test]
    fn halo_fades_towards_its_edge() {
        let mut surface = Surface::new(20, 10);
        surface.halo(Vec2::new(10.0, 10.0), 5.0, WHITE);
        let centre_alpha = surface.pixel(10, 10).unwrap().3;
        let edge_alpha = surface.pixel(13, 10).unwrap().3;
        assert!(centre_alpha > edge_alpha);
        assert!(edge_alpha > 0.0);
    }
}
