//! Built-in color transforms.

use crate::core::types::Color;
use crate::transforms::registry::TransformRegistry;

/// Register the built-in color transforms.
pub fn register(registry: &mut TransformRegistry) {
    registry
        .register("lighten", "Raise HSL lightness by amount percent", lighten)
        .register("darken", "Lower HSL lightness by amount percent", darken)
        .register("brightness", "Add amount to each RGB channel", brightness)
        .register("contrast", "Scale RGB around mid-gray by amount", contrast)
        .register("invert", "Invert RGB channels", invert)
        .register("grayscale", "Replace RGB with Rec. 601 luma", grayscale);
}

/// Raise lightness by `amount` percentage points.
pub fn lighten(color: Color, amount: f64) -> Color {
    shift_lightness(color, amount / 100.0)
}

/// Lower lightness by `amount` percentage points.
pub fn darken(color: Color, amount: f64) -> Color {
    shift_lightness(color, -amount / 100.0)
}

fn shift_lightness(color: Color, delta: f64) -> Color {
    if delta == 0.0 {
        return color;
    }
    let (h, s, l) = color.to_hsl();
    Color::from_hsl(h, s, l + delta, color.a)
}

/// Add `amount` to each RGB channel.
pub fn brightness(color: Color, amount: f64) -> Color {
    Color::from_f64(
        color.r as f64 + amount,
        color.g as f64 + amount,
        color.b as f64 + amount,
        color.a as f64,
    )
}

/// Scale each RGB channel's distance from 128 by `amount`.
pub fn contrast(color: Color, amount: f64) -> Color {
    let adjust = |v: u8| (v as f64 - 128.0) * amount + 128.0;
    Color::from_f64(adjust(color.r), adjust(color.g), adjust(color.b), color.a as f64)
}

/// Invert RGB. The amount is ignored.
pub fn invert(color: Color, _amount: f64) -> Color {
    Color::new(255 - color.r, 255 - color.g, 255 - color.b, color.a)
}

/// Convert to gray using Rec. 601 luma. The amount is ignored.
pub fn grayscale(color: Color, _amount: f64) -> Color {
    let luma = 0.299 * color.r as f64 + 0.587 * color.g as f64 + 0.114 * color.b as f64;
    Color::from_f64(luma, luma, luma, color.a as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lighten_raises_every_channel() {
        let color = Color::new(100, 50, 20, 77);
        let lighter = lighten(color, 10.0);
        assert!(lighter.r > color.r);
        assert!(lighter.g > color.g);
        assert!(lighter.b > color.b);
        assert_eq!(lighter.a, 77);
    }

    #[test]
    fn test_darken_and_saturation() {
        let color = Color::rgb(200, 180, 160);
        let darker = darken(color, 20.0);
        assert!(darker.r < color.r && darker.g < color.g && darker.b < color.b);

        assert_eq!(lighten(Color::rgb(250, 250, 250), 100.0), Color::rgb(255, 255, 255));
        assert_eq!(darken(Color::rgb(5, 5, 5), 100.0), Color::rgb(0, 0, 0));
    }

    #[test]
    fn test_zero_amount_is_identity() {
        let color = Color::new(3, 140, 250, 9);
        assert_eq!(lighten(color, 0.0), color);
        assert_eq!(brightness(color, 0.0), color);
        assert_eq!(contrast(color, 1.0), color);
    }

    #[test]
    fn test_brightness_clamps() {
        assert_eq!(brightness(Color::rgb(250, 10, 0), 10.0), Color::rgb(255, 20, 10));
        assert_eq!(brightness(Color::rgb(250, 10, 0), -20.0), Color::rgb(230, 0, 0));
    }

    #[test]
    fn test_invert_and_grayscale() {
        assert_eq!(invert(Color::new(0, 100, 255, 1), 0.0), Color::new(255, 155, 0, 1));
        let gray = grayscale(Color::rgb(255, 0, 0), 0.0);
        assert_eq!((gray.r, gray.g, gray.b), (76, 76, 76));
    }
}
