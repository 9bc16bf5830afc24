//! Presentation engine for the splitdeck dashboard: the renderer
//! capability contract, the reconciling table, and the chart shape
//! transforms. Everything here is synchronous and pure with respect to
//! its inputs; the concrete visual surface lives behind `Renderer`.

pub mod chart;
pub mod renderer;
pub mod table;

pub use chart::{
    histogram_plot, line_plot, render_plot, Limits, Shape, ShapeGroup, BAR_WIDTH_FRACTION,
    MARKER_RADIUS,
};
pub use renderer::{NodeId, Renderer, TreeNode, TreeRenderer, HIDDEN_CLASS};
pub use table::{ClassSpec, Column, RowId, Table, NON_BREAKING_SPACE};
