/// Rendering: analysis results → figure descriptions → image files.
///
/// ```text
///   Analysis ──► figure::build ──► Vec<Figure> ──► FigureSink::render ──► PNG
/// ```
///
/// `figure` decides everything that depends on the mode (titles, ranges,
/// annotation text, output paths). A sink only draws what it is given.

pub mod figure;
pub mod plot;

pub use figure::{FileJob, Figure};
pub use plot::PngRenderer;

/// Destination for finished figures.
pub trait FigureSink {
    /// Draw `figure` and persist it at `figure.path`. Implementations must
    /// not keep drawing state alive after returning.
    fn render(&mut self, figure: &Figure) -> anyhow::Result<()>;
}
