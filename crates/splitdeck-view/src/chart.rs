//! Chart engine: stateless transforms from numeric samples to
//! normalized shape sets for a line plot or a binned histogram.
//!
//! Coordinates are fractions of the plot area (0..1) under a linear
//! mapping of each axis range. Plot coordinate systems grow downward
//! while data grows upward, so every data-derived group is marked
//! `mirror_y`; the surface applies the vertical flip to those groups
//! and never to the axes.

use crate::renderer::{NodeId, Renderer};

pub const MARKER_RADIUS: f64 = 5.0;
pub const BAR_WIDTH_FRACTION: f64 = 0.8;

/// Inclusive value range of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

impl Limits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Linear position of `value` within the range. A degenerate range
    /// maps through divisor 1 rather than dividing by zero.
    pub fn position(&self, value: f64) -> f64 {
        let span = if self.max == self.min {
            1.0
        } else {
            self.max - self.min
        };
        (value - self.min) / span
    }

    /// Where to draw the perpendicular axis: at the zero crossing, or
    /// at the range minimum when zero lies outside the range.
    fn axis_position(&self) -> f64 {
        if self.min <= 0.0 && 0.0 <= self.max {
            self.position(0.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        class: &'static str,
    },
    Marker {
        x: f64,
        y: f64,
        radius: f64,
        label: String,
    },
    Bar {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        label: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeGroup {
    pub class: &'static str,
    pub mirror_y: bool,
    pub shapes: Vec<Shape>,
}

fn axes_group(xlim: Limits, ylim: Limits) -> ShapeGroup {
    let x_axis_y = ylim.axis_position();
    let y_axis_x = xlim.axis_position();
    ShapeGroup {
        class: "axes",
        mirror_y: false,
        shapes: vec![
            Shape::Line {
                x1: 0.0,
                y1: x_axis_y,
                x2: 1.0,
                y2: x_axis_y,
                class: "axis",
            },
            Shape::Line {
                x1: y_axis_x,
                y1: 0.0,
                x2: y_axis_x,
                y2: 1.0,
                class: "axis",
            },
        ],
    }
}

/// Line plot over `points` in input order: an axis pair, the connecting
/// polyline, and one labeled marker per point.
pub fn line_plot(
    points: &[(f64, f64)],
    xlim: Limits,
    ylim: Limits,
    format: &dyn Fn(f64, f64) -> String,
) -> Vec<ShapeGroup> {
    let mut lines = Vec::new();
    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        lines.push(Shape::Line {
            x1: xlim.position(from.0),
            y1: ylim.position(from.1),
            x2: xlim.position(to.0),
            y2: ylim.position(to.1),
            class: "line",
        });
    }

    let markers = points
        .iter()
        .map(|point| Shape::Marker {
            x: xlim.position(point.0),
            y: ylim.position(point.1),
            radius: MARKER_RADIUS,
            label: format(point.0, point.1),
        })
        .collect();

    vec![
        axes_group(xlim, ylim),
        ShapeGroup {
            class: "lines",
            mirror_y: true,
            shapes: lines,
        },
        ShapeGroup {
            class: "points",
            mirror_y: true,
            shapes: markers,
        },
    ]
}

/// Histogram over `values` in `bin_count` bins.
///
/// The bin width divisor is `bin_count - 1`, not `bin_count`: the top
/// bin's upper edge deliberately exceeds the maximum by one bin width,
/// which keeps a value exactly at the maximum inside the last bin under
/// the floor rule. A degenerate range (all values equal) collapses
/// everything into bin 0.
pub fn histogram_plot(
    values: &[f64],
    bin_count: usize,
    format: &dyn Fn(f64) -> String,
) -> Vec<ShapeGroup> {
    if values.is_empty() || bin_count == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bin_width = if bin_count > 1 {
        (max - min) / (bin_count - 1) as f64
    } else {
        0.0
    };

    let mut bins = vec![0usize; bin_count];
    for value in values {
        let index = if bin_width == 0.0 {
            0
        } else {
            (((value - min) / bin_width).floor() as usize).min(bin_count - 1)
        };
        bins[index] += 1;
    }

    let fullest = bins.iter().copied().max().unwrap_or(0).max(1);
    let stride = BAR_WIDTH_FRACTION / bin_count as f64
        + if bin_count > 1 {
            (1.0 - BAR_WIDTH_FRACTION) / (bin_count - 1) as f64
        } else {
            0.0
        };

    let bars = bins
        .iter()
        .enumerate()
        .map(|(index, count)| {
            let low = min + index as f64 * bin_width;
            let high = min + (index + 1) as f64 * bin_width;
            Shape::Bar {
                x: stride * index as f64,
                y: 0.0,
                width: stride * BAR_WIDTH_FRACTION,
                height: *count as f64 / fullest as f64,
                label: format!("{} to {}: {count}", format(low), format(high)),
            }
        })
        .collect();

    let xlim = Limits::new(0.0, bin_count as f64);
    let ylim = Limits::new(0.0, fullest as f64);
    vec![
        axes_group(xlim, ylim),
        ShapeGroup {
            class: "bars",
            mirror_y: true,
            shapes: bars,
        },
    ]
}

/// Materializes a shape set under `parent`. Coordinates become percent
/// attributes; data groups get the vertical flip transform; labels
/// become `title` attributes. Returns the plot node so the caller can
/// toggle its visibility.
pub fn render_plot<R: Renderer>(
    renderer: &mut R,
    parent: NodeId,
    groups: &[ShapeGroup],
) -> NodeId {
    let plot = renderer.create_container();
    renderer.add_class(plot, "plot");
    for group in groups {
        let group_node = renderer.create_container();
        renderer.add_class(group_node, group.class);
        if group.mirror_y {
            renderer.set_attribute(group_node, "transform", "scale(1, -1)");
        }
        for shape in &group.shapes {
            let node = renderer.create_container();
            match shape {
                Shape::Line { x1, y1, x2, y2, class } => {
                    renderer.add_class(node, class);
                    renderer.set_attribute(node, "x1", &percent(*x1));
                    renderer.set_attribute(node, "y1", &percent(*y1));
                    renderer.set_attribute(node, "x2", &percent(*x2));
                    renderer.set_attribute(node, "y2", &percent(*y2));
                }
                Shape::Marker { x, y, radius, label } => {
                    renderer.add_class(node, "point");
                    renderer.set_attribute(node, "cx", &percent(*x));
                    renderer.set_attribute(node, "cy", &percent(*y));
                    renderer.set_attribute(node, "r", &radius.to_string());
                    renderer.set_attribute(node, "title", label);
                }
                Shape::Bar { x, y, width, height, label } => {
                    renderer.add_class(node, "bar");
                    renderer.set_attribute(node, "x", &percent(*x));
                    renderer.set_attribute(node, "y", &percent(*y));
                    renderer.set_attribute(node, "width", &percent(*width));
                    renderer.set_attribute(node, "height", &percent(*height));
                    renderer.set_attribute(node, "title", label);
                }
            }
            renderer.append_child(group_node, node);
        }
        renderer.append_child(plot, group_node);
    }
    renderer.append_child(parent, plot);
    plot
}

fn percent(fraction: f64) -> String {
    format!("{}%", 100.0 * fraction)
}

#[cfg(test)]
mod tests {
    use super::{histogram_plot, line_plot, render_plot, Limits, Shape, ShapeGroup};
    use crate::renderer::{Renderer, TreeRenderer};

    fn group<'a>(groups: &'a [ShapeGroup], class: &str) -> &'a ShapeGroup {
        groups
            .iter()
            .find(|group| group.class == class)
            .unwrap_or_else(|| panic!("missing group {class}"))
    }

    #[test]
    fn unit_limits_position_is_linear_with_degenerate_fallback() {
        let lim = Limits::new(10.0, 20.0);
        assert_eq!(lim.position(10.0), 0.0);
        assert_eq!(lim.position(15.0), 0.5);
        assert_eq!(lim.position(20.0), 1.0);

        let flat = Limits::new(7.0, 7.0);
        assert_eq!(flat.position(7.0), 0.0);
        assert_eq!(flat.position(8.0), 1.0);
    }

    #[test]
    fn functional_line_plot_emits_axes_segments_and_labeled_markers() {
        let points = [(0.0, 100.0), (1.0, 150.0), (2.0, 125.0)];
        let groups = line_plot(
            &points,
            Limits::new(0.0, 2.0),
            Limits::new(100.0, 150.0),
            &|_, y| format!("y={y}"),
        );

        let axes = group(&groups, "axes");
        assert!(!axes.mirror_y);
        assert_eq!(axes.shapes.len(), 2);

        let lines = group(&groups, "lines");
        assert!(lines.mirror_y);
        assert_eq!(lines.shapes.len(), points.len() - 1);
        let Shape::Line { x1, y1, x2, y2, .. } = &lines.shapes[0] else {
            panic!("expected line");
        };
        assert_eq!((*x1, *y1), (0.0, 0.0));
        assert_eq!((*x2, *y2), (0.5, 1.0));

        let markers = group(&groups, "points");
        assert!(markers.mirror_y);
        assert_eq!(markers.shapes.len(), points.len());
        let Shape::Marker { label, .. } = &markers.shapes[1] else {
            panic!("expected marker");
        };
        assert_eq!(label, "y=150");
    }

    #[test]
    fn unit_axes_sit_at_zero_crossing_or_clamp_to_range_min() {
        // Zero inside the y-range: the x-axis sits at its crossing.
        let groups = line_plot(
            &[(0.0, -1.0), (1.0, 1.0)],
            Limits::new(0.0, 1.0),
            Limits::new(-1.0, 1.0),
            &|_, _| String::new(),
        );
        let Shape::Line { y1, .. } = &group(&groups, "axes").shapes[0] else {
            panic!("expected axis line");
        };
        assert_eq!(*y1, 0.5);

        // Zero below the y-range: clamp to the range minimum.
        let groups = line_plot(
            &[(0.0, 100.0), (1.0, 150.0)],
            Limits::new(0.0, 1.0),
            Limits::new(100.0, 150.0),
            &|_, _| String::new(),
        );
        let Shape::Line { y1, .. } = &group(&groups, "axes").shapes[0] else {
            panic!("expected axis line");
        };
        assert_eq!(*y1, 0.0);
    }

    #[test]
    fn functional_histogram_bins_edge_values_with_floor_rule() {
        let groups = histogram_plot(&[0.0, 1.0, 2.0, 3.0], 4, &|value| value.to_string());
        let bars = group(&groups, "bars");
        assert_eq!(bars.shapes.len(), 4);
        // bin width (3-0)/3 = 1; each edge value lands in its own bin,
        // so every bar reaches full height.
        for (index, shape) in bars.shapes.iter().enumerate() {
            let Shape::Bar { height, label, .. } = shape else {
                panic!("expected bar");
            };
            assert_eq!(*height, 1.0, "bin {index}");
            assert!(label.ends_with(": 1"), "bin {index} label {label}");
        }
        let Shape::Bar { label, .. } = &bars.shapes[0] else {
            panic!("expected bar");
        };
        assert_eq!(label, "0 to 1: 1");
    }

    #[test]
    fn unit_histogram_bar_layout_uses_the_fractional_stride() {
        let groups = histogram_plot(&[0.0, 1.0, 2.0, 3.0], 4, &|value| value.to_string());
        let bars = group(&groups, "bars");
        let stride = 0.8 / 4.0 + 0.2 / 3.0;
        for (index, shape) in bars.shapes.iter().enumerate() {
            let Shape::Bar { x, width, .. } = shape else {
                panic!("expected bar");
            };
            assert!((x - stride * index as f64).abs() < 1e-12);
            assert!((width - stride * 0.8).abs() < 1e-12);
        }
    }

    #[test]
    fn regression_histogram_degenerate_range_collapses_into_bin_zero() {
        let groups = histogram_plot(&[5.0, 5.0, 5.0], 10, &|value| value.to_string());
        let bars = group(&groups, "bars");
        let Shape::Bar { height, label, .. } = &bars.shapes[0] else {
            panic!("expected bar");
        };
        assert_eq!(*height, 1.0);
        assert_eq!(label, "5 to 5: 3");
        for shape in &bars.shapes[1..] {
            let Shape::Bar { height, .. } = shape else {
                panic!("expected bar");
            };
            assert_eq!(*height, 0.0);
        }
    }

    #[test]
    fn regression_histogram_handles_empty_input_and_single_bin() {
        assert!(histogram_plot(&[], 10, &|value| value.to_string()).is_empty());
        let groups = histogram_plot(&[1.0, 2.0], 1, &|value| value.to_string());
        let bars = group(&groups, "bars");
        assert_eq!(bars.shapes.len(), 1);
    }

    #[test]
    fn functional_render_plot_applies_flip_transform_to_data_groups_only() {
        let mut renderer = TreeRenderer::new();
        let parent = renderer.create_container();
        let groups = line_plot(
            &[(0.0, 1.0), (1.0, 2.0)],
            Limits::new(0.0, 1.0),
            Limits::new(1.0, 2.0),
            &|_, y| format!("{y}"),
        );
        let plot = render_plot(&mut renderer, parent, &groups);

        assert!(renderer.node(plot).expect("plot").has_class("plot"));
        let children = renderer.children(plot).to_vec();
        assert_eq!(children.len(), 3);

        let axes = renderer.node(children[0]).expect("axes group");
        assert!(axes.has_class("axes"));
        assert_eq!(axes.attribute("transform"), None);

        for data_group in &children[1..] {
            let node = renderer.node(*data_group).expect("data group");
            assert_eq!(node.attribute("transform"), Some("scale(1, -1)"));
        }

        let marker = renderer.children(children[2])[0];
        let marker_node = renderer.node(marker).expect("marker");
        assert_eq!(marker_node.attribute("cx"), Some("0%"));
        assert_eq!(marker_node.attribute("r"), Some("5"));
        assert_eq!(marker_node.attribute("title"), Some("1"));
    }
}
