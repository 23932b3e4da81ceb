use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Marker and annotation colour for detected peaks.
pub const PEAK_COLOR: RGBColor = RGBColor(214, 39, 40);

/// Colour of the first series, matching the usual plotting default blue.
const FIRST_SERIES: RGBColor = RGBColor(31, 119, 180);

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            RGBColor(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Colours for the channels of one panel.
///
/// A single series keeps the default blue; several series are spread over
/// the hue wheel, offset so none collides with the red used for peaks.
pub fn series_colors(n: usize) -> Vec<RGBColor> {
    match n {
        0 => Vec::new(),
        1 => vec![FIRST_SERIES],
        _ => {
            let mut colors = vec![FIRST_SERIES];
            colors.extend(
                generate_palette(n + 1)
                    .into_iter()
                    .skip(1)
                    .take(n - 1),
            );
            colors
        }
    }
}
