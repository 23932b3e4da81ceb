use anyhow::{anyhow, Context, Result};
use plotters::chart::SeriesLabelPosition;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::figure::{Figure, Panel, TickFormat};
use super::FigureSink;
use crate::color::PEAK_COLOR;
use crate::config::LegendPosition;

// ---------------------------------------------------------------------------
// PNG backend
// ---------------------------------------------------------------------------

/// Draws figures with plotters into a pixel buffer and encodes it as PNG.
///
/// The buffer lives only for the duration of one [`FigureSink::render`]
/// call, so memory use does not grow with the size of the batch.
#[derive(Debug, Default)]
pub struct PngRenderer;

impl FigureSink for PngRenderer {
    fn render(&mut self, figure: &Figure) -> Result<()> {
        let (width, height) = figure.size;
        let mut buffer = vec![255u8; width as usize * height as usize * 3];

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height))
                .into_drawing_area();
            root.fill(&WHITE)?;

            let areas = root.split_evenly((figure.panels.len().max(1), 1));
            for (area, panel) in areas.iter().zip(&figure.panels) {
                draw_panel(area, panel)
                    .with_context(|| format!("drawing panel '{}'", panel.title))?;
            }
            root.present()?;
        }

        let image = image::RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
        image
            .save_with_format(&figure.path, image::ImageFormat::Png)
            .with_context(|| format!("writing {}", figure.path.display()))?;
        Ok(())
    }
}

fn draw_panel(area: &DrawingArea<BitMapBackend<'_>, Shift>, panel: &Panel) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(36)
        .y_label_area_size(56)
        .build_cartesian_2d(panel.x_range.clone(), panel.y_range.clone())?;

    let scientific = |v: &f64| format_scientific(*v);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .x_labels(8)
        .label_style(("sans-serif", 11));
    if panel.x_ticks == TickFormat::Scientific {
        mesh.x_label_formatter(&scientific);
    }
    if let Some(step) = panel.y_step {
        // One label (and gridline) per step across the fixed range.
        let count = ((panel.y_range.end - panel.y_range.start) / step).round() as usize + 1;
        mesh.y_labels(count.min(64));
    } else {
        mesh.y_labels(6);
    }
    mesh.draw()?;

    let (y_lo, y_hi) = (panel.y_range.start, panel.y_range.end);
    for s in &panel.series {
        if s.points.is_empty() {
            continue;
        }
        let color = s.color;
        let points = s.points.iter().map(move |&(x, y)| (x, y.clamp(y_lo, y_hi)));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(1)))?
            .label(s.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if !panel.markers.is_empty() {
        chart.draw_series(
            panel
                .markers
                .iter()
                .map(|m| Circle::new((m.x, m.y), 4, PEAK_COLOR.filled())),
        )?;
        let label_style = ("sans-serif", 11).into_font().color(&PEAK_COLOR);
        chart.draw_series(panel.markers.iter().filter_map(|m| {
            m.label
                .as_ref()
                .map(|l| Text::new(l.clone(), (m.x, m.y), label_style.clone()))
        }))?;
    }

    if let Some(position) = panel.legend {
        let position = match position {
            LegendPosition::UpperRight => SeriesLabelPosition::UpperRight,
            LegendPosition::LowerRight => SeriesLabelPosition::LowerRight,
        };
        chart
            .configure_series_labels()
            .position(position)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font(("sans-serif", 11))
            .draw()?;
    }

    if !panel.note.is_empty() {
        draw_note(&chart.plotting_area().strip_coord_spec(), &panel.note)?;
    }

    Ok(())
}

fn format_scientific(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else {
        format!("{v:.2e}")
    }
}

/// Boxed text block anchored to the upper right corner of `area`.
fn draw_note(area: &DrawingArea<BitMapBackend<'_>, Shift>, lines: &[String]) -> Result<()> {
    const LINE_HEIGHT: i32 = 14;
    const CHAR_WIDTH: i32 = 7;

    let (width, _) = area.dim_in_pixel();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
    let box_w = longest * CHAR_WIDTH + 12;
    let box_h = lines.len() as i32 * LINE_HEIGHT + 10;
    let left = width as i32 - box_w - 8;
    let top = 8;

    area.draw(&Rectangle::new(
        [(left, top), (left + box_w, top + box_h)],
        WHITE.mix(0.5).filled(),
    ))?;
    area.draw(&Rectangle::new(
        [(left, top), (left + box_w, top + box_h)],
        BLACK.stroke_width(1),
    ))?;

    let style = ("sans-serif", 12).into_font().color(&BLACK);
    for (i, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.as_str(),
            (left + 6, top + 5 + i as i32 * LINE_HEIGHT),
            style.clone(),
        ))?;
    }
    Ok(())
}
