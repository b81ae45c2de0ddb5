//! Self-contained HTML line charts.

pub mod render;
pub mod style;
pub mod writer;

pub use render::render_html;
pub use style::{ChartStyle, LegendOrientation, LineShape, ThemePreset};
pub use writer::{write_atomic, write_chart};
