use std::ops::Range;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset};
use chrono_tz::Tz;
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use serde::Serialize;
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    OffsetDateTime,
};

use super::style::{ChartStyle, LegendOrientation, LineShape};
use crate::{
    error::ChartError,
    series::{DeviceSeries, SeriesPoint},
    zone,
};

const CLOCK_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

const FONT: &str = "sans-serif";
const MARGIN: i32 = 12;
const X_LABEL_AREA: u32 = 28;
const Y_LABEL_AREA: u32 = 52;
const X_LABELS: usize = 8;
const Y_LABELS: usize = 6;
const VERTICAL_LEGEND_WIDTH: u32 = 170;
const LEGEND_TOP: i32 = 12;
const LEGEND_BOX_X: i32 = 4;
const LEGEND_LEFT: i32 = 12;
const LEGEND_PAD: i32 = 6;
const LEGEND_ROW: i32 = 18;
const LEGEND_SWATCH: i32 = 16;
const LEGEND_CHAR_WIDTH: i32 = 7;
const LEGEND_FONT_SIZE: i32 = 12;
const MARKER_RADIUS: i32 = 3;
const HIT_RADIUS: i32 = 6;
const CURVE_STEPS: usize = 8;
/// Half-width of the time axis around a single instant.
const SINGLE_INSTANT_PAD_MINUTES: i64 = 30;

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type AxisPoint = (DateTime<FixedOffset>, f64);

/// A series that has something to draw.
struct Trace<'a> {
    label: &'a str,
    hex: &'a str,
    color: RGBColor,
    points: Vec<&'a SeriesPoint>,
}

/// Pixel positions of one series' samples, for the tooltip overlay.
struct HoverGroup<'a> {
    label: &'a str,
    hex: &'a str,
    targets: Vec<HoverTarget>,
}

struct HoverTarget {
    x: i32,
    y: i32,
    time: String,
    value: f64,
}

/// Legend entry anchors, relative to the legend area, and the total drawing
/// height once the legend fits.
struct LegendLayout {
    slots: Vec<(i32, i32)>,
    height: u32,
}

impl LegendLayout {
    /// One entry per row in a column right of the plot. The drawing grows
    /// taller than the style height when the column needs it.
    fn vertical(count: usize, style: &ChartStyle) -> Self {
        let slots = (0..count as i32)
            .map(|i| (LEGEND_BOX_X + 8, LEGEND_TOP + 4 + LEGEND_ROW * i + LEGEND_ROW / 2))
            .collect();
        let needed = (vertical_box_bottom(count) + MARGIN).max(0) as u32;
        Self {
            slots,
            height: style.height.max(needed),
        }
    }

    /// Greedy row packing in a strip below the plot.
    fn horizontal(traces: &[Trace<'_>], style: &ChartStyle) -> Self {
        let available = style.width as i32 - 2 * LEGEND_LEFT;
        let mut slots = Vec::with_capacity(traces.len());
        let (mut row, mut cursor) = (0, 0);
        for trace in traces {
            let item = legend_item_width(trace.label);
            if cursor > 0 && cursor + item > available {
                row += 1;
                cursor = 0;
            }
            slots.push((LEGEND_LEFT + cursor, LEGEND_PAD + LEGEND_ROW * row + LEGEND_ROW / 2));
            cursor += item;
        }
        let rows = if traces.is_empty() { 0 } else { row + 1 };
        Self {
            slots,
            height: style.height + (LEGEND_ROW * rows + 2 * LEGEND_PAD) as u32,
        }
    }
}

fn vertical_box_bottom(count: usize) -> i32 {
    LEGEND_TOP + 8 + LEGEND_ROW * count as i32
}

fn legend_item_width(label: &str) -> i32 {
    LEGEND_SWATCH + 6 + label.chars().count() as i32 * LEGEND_CHAR_WIDTH + 18
}

#[derive(Serialize)]
struct ChartData<'a> {
    unit: &'a str,
    series: Vec<SeriesData<'a>>,
}

#[derive(Serialize)]
struct SeriesData<'a> {
    label: &'a str,
    color: &'a str,
    points: Vec<(String, f64)>,
}

/// Render `series` as a self-contained HTML document. Axis labels, tooltips
/// and the data island show times in `zone`.
///
/// Output depends only on the arguments: no clocks, no random ids.
pub fn render_html(series: &DeviceSeries, unit: &str, zone: Tz, style: &ChartStyle) -> Result<String, ChartError> {
    let traces = traces(series, style);

    let svg = if traces.is_empty() {
        render_placeholder(style)?
    } else {
        render_plot(&traces, unit, zone, style)?
    };
    let data = data_island(series, unit, zone, style)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(unit.as_bytes());
    hasher.update(svg.as_bytes());
    hasher.update(data.as_bytes());
    let id = format!("chart-{}", &hasher.finalize().to_hex()[..16]);

    let hover_class = if traces.is_empty() { " no-hover" } else { "" };

    let mut out = String::with_capacity(svg.len() + data.len() + 1024);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape(unit)));
    out.push_str("<style>\n");
    out.push_str(&format!(
        "html, body {{ margin: 0; padding: 0; background: {bg}; }}\n\
         #{id} {{ font-family: {font}; color: {text}; }}\n\
         #{id} svg {{ display: block; width: 100%; height: auto; }}\n\
         #{id} .pt {{ cursor: crosshair; }}\n\
         #{id} .pt:hover {{ stroke: {text}; stroke-width: 1.5; fill-opacity: 1; }}\n\
         #{id}.no-hover svg {{ pointer-events: none; }}\n",
        bg = css_hex(style.background),
        font = style.font_family,
        text = css_hex(style.text_color),
    ));
    out.push_str("</style>\n</head>\n<body>\n");
    out.push_str(&format!("<div id=\"{id}\" class=\"mote-chart{hover_class}\">\n"));
    out.push_str(&svg);
    out.push_str("</div>\n");
    out.push_str(&format!(
        "<script type=\"application/json\" id=\"{id}-data\">{data}</script>\n"
    ));
    out.push_str("</body>\n</html>\n");
    Ok(out)
}

fn traces<'a>(series: &'a DeviceSeries, style: &'a ChartStyle) -> Vec<Trace<'a>> {
    series
        .iter()
        .enumerate()
        .filter_map(|(position, (label, points))| {
            let points: Vec<&SeriesPoint> = points.iter().filter(|p| p.value.is_finite()).collect();
            (!points.is_empty()).then(|| Trace {
                label: label.as_str(),
                hex: style.color_for(position),
                color: style.rgb_for(position),
                points,
            })
        })
        .collect()
}

fn render_error(e: impl std::fmt::Display) -> ChartError {
    ChartError::Render(e.to_string())
}

fn render_placeholder(style: &ChartStyle) -> Result<String, ChartError> {
    let (width, height) = (style.width, style.height);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&style.background).map_err(render_error)?;
        let text = (FONT, 14)
            .into_font()
            .color(&style.muted_text_color)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(
            style.empty_message.as_str(),
            ((width / 2) as i32, (height / 2) as i32),
            text,
        ))
        .map_err(render_error)?;
        root.present().map_err(render_error)?;
    }
    Ok(make_svg_responsive(svg, width, height))
}

fn render_plot(traces: &[Trace<'_>], unit: &str, zone: Tz, style: &ChartStyle) -> Result<String, ChartError> {
    let layout = match style.legend_orientation {
        LegendOrientation::Vertical => LegendLayout::vertical(traces.len(), style),
        LegendOrientation::Horizontal => LegendLayout::horizontal(traces, style),
    };
    let (width, height) = (style.width, layout.height);

    let mut svg = String::new();
    let hover = {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&style.background).map_err(render_error)?;

        let (plot, legend) = match style.legend_orientation {
            LegendOrientation::Vertical => {
                let (left, right) = root.split_horizontally(width.saturating_sub(VERTICAL_LEGEND_WIDTH));
                (left.split_vertically(style.height).0, right)
            }
            LegendOrientation::Horizontal => root.split_vertically(style.height),
        };
        let hover = draw_plot(&plot, traces, zone, style)?;
        draw_legend(&legend, traces, &layout, style)?;
        root.present().map_err(render_error)?;
        hover
    };

    Ok(attach_hover(make_svg_responsive(svg, width, height), &hover, unit))
}

fn draw_plot<'a>(
    area: &Area<'_>,
    traces: &[Trace<'a>],
    zone: Tz,
    style: &ChartStyle,
) -> Result<Vec<HoverGroup<'a>>, ChartError> {
    let (first, last, v_min, v_max) = extents(traces);
    let offset = axis_offset(zone, last)?;
    let (x_from, x_to) = time_range(first, last, offset)?;
    let y_range = value_range(v_min, v_max, style.fill_under_line);
    let baseline = y_range.start;
    let decimals = label_decimals(y_range.end - y_range.start);
    let pattern = clock_pattern(x_to - x_from);

    let mut chart = ChartBuilder::on(area)
        .margin(MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(x_from..x_to, y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_labels(X_LABELS)
        .y_labels(Y_LABELS)
        .light_line_style(TRANSPARENT)
        .bold_line_style(style.grid_color)
        .axis_style(style.axis_color)
        .label_style((FONT, 11, &style.muted_text_color))
        .x_label_formatter(&|x| x.with_timezone(&zone).format(pattern).to_string())
        .y_label_formatter(&|v| format!("{v:.decimals$}"))
        .draw()
        .map_err(render_error)?;

    let mut hover = Vec::with_capacity(traces.len());
    for trace in traces {
        let coords = trace
            .points
            .iter()
            .map(|p| Ok((to_axis(p.at, offset)?, p.value)))
            .collect::<Result<Vec<AxisPoint>, ChartError>>()?;
        let line = match style.line_shape {
            LineShape::Linear => coords.clone(),
            LineShape::Curved => catmull_rom(&coords),
        };

        if coords.len() > 1 {
            if style.fill_under_line {
                chart
                    .draw_series(AreaSeries::new(
                        line.iter().copied(),
                        baseline,
                        trace.color.mix(style.fill_opacity),
                    ))
                    .map_err(render_error)?;
            }
            chart
                .draw_series(LineSeries::new(
                    line.iter().copied(),
                    ShapeStyle::from(&trace.color).stroke_width(style.line_width),
                ))
                .map_err(render_error)?;
        }

        // A lone sample has no segment to draw, so it always gets a marker.
        if style.show_markers || coords.len() == 1 {
            chart
                .draw_series(
                    coords
                        .iter()
                        .map(|&point| Circle::new(point, MARKER_RADIUS, trace.color.filled())),
                )
                .map_err(render_error)?;
        }

        let targets = trace
            .points
            .iter()
            .zip(&coords)
            .map(|(p, coord)| {
                let (x, y) = chart.backend_coord(coord);
                Ok(HoverTarget {
                    x,
                    y,
                    time: zone::in_zone(p.at, zone)?.format(CLOCK_FORMAT)?,
                    value: p.value,
                })
            })
            .collect::<Result<Vec<_>, ChartError>>()?;
        hover.push(HoverGroup {
            label: trace.label,
            hex: trace.hex,
            targets,
        });
    }

    Ok(hover)
}

fn draw_legend(
    area: &Area<'_>,
    traces: &[Trace<'_>],
    layout: &LegendLayout,
    style: &ChartStyle,
) -> Result<(), ChartError> {
    if style.legend_orientation == LegendOrientation::Vertical {
        let corners = [
            (LEGEND_BOX_X, LEGEND_TOP),
            (VERTICAL_LEGEND_WIDTH as i32 - MARGIN, vertical_box_bottom(traces.len())),
        ];
        area.draw(&Rectangle::new(corners, style.legend_background.filled()))
            .map_err(render_error)?;
        area.draw(&Rectangle::new(corners, ShapeStyle::from(&style.legend_border)))
            .map_err(render_error)?;
    }

    let text = (FONT, LEGEND_FONT_SIZE)
        .into_font()
        .color(&style.text_color)
        .pos(Pos::new(HPos::Left, VPos::Center));
    for (trace, &(x, y)) in traces.iter().zip(&layout.slots) {
        area.draw(&PathElement::new(
            vec![(x, y), (x + LEGEND_SWATCH, y)],
            ShapeStyle::from(&trace.color).stroke_width(3),
        ))
        .map_err(render_error)?;
        area.draw(&Text::new(trace.label, (x + LEGEND_SWATCH + 6, y), text.clone()))
            .map_err(render_error)?;
    }
    Ok(())
}

fn extents(traces: &[Trace<'_>]) -> (OffsetDateTime, OffsetDateTime, f64, f64) {
    let first = traces[0].points[0];
    let mut t = (first.at, first.at);
    let mut v = (first.value, first.value);
    for p in traces.iter().flat_map(|tr| tr.points.iter()) {
        t = (t.0.min(p.at), t.1.max(p.at));
        v = (v.0.min(p.value), v.1.max(p.value));
    }
    (t.0, t.1, v.0, v.1)
}

/// Axis coordinates use the offset the display zone has at the newest
/// sample; labels are formatted through the zone itself.
fn axis_offset(zone: Tz, at: OffsetDateTime) -> Result<FixedOffset, ChartError> {
    let offset = zone::offset_at(zone, at)?;
    FixedOffset::east_opt(offset.whole_seconds())
        .ok_or_else(|| ChartError::TimeZone(format!("offset {offset} out of range")))
}

fn to_axis(at: OffsetDateTime, offset: FixedOffset) -> Result<DateTime<FixedOffset>, ChartError> {
    Ok(zone::to_chrono(at)?.with_timezone(&offset))
}

fn time_range(
    first: OffsetDateTime,
    last: OffsetDateTime,
    offset: FixedOffset,
) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), ChartError> {
    let (from, to) = (to_axis(first, offset)?, to_axis(last, offset)?);
    if from == to {
        let pad = ChronoDuration::minutes(SINGLE_INSTANT_PAD_MINUTES);
        return Ok((from - pad, to + pad));
    }
    Ok((from, to))
}

fn value_range(min: f64, max: f64, fill: bool) -> Range<f64> {
    let low = if fill { min.min(0.0) } else { min };
    let span = max - low;
    if span <= f64::EPSILON {
        let pad = (max.abs() * 0.1).max(1.0);
        return (low - pad)..(max + pad);
    }
    let bottom = if fill && low == 0.0 { 0.0 } else { low - span * 0.05 };
    bottom..(max + span * 0.1)
}

fn label_decimals(span: f64) -> usize {
    match span {
        s if s >= 10.0 => 0,
        s if s >= 1.0 => 1,
        s if s >= 0.1 => 2,
        _ => 3,
    }
}

fn clock_pattern(span: ChronoDuration) -> &'static str {
    if span <= ChronoDuration::days(1) {
        "%H:%M"
    } else if span <= ChronoDuration::days(62) {
        "%d/%m %H:%M"
    } else {
        "%Y-%m-%d"
    }
}

/// Densify `coords` along a Catmull-Rom spline through every sample.
fn catmull_rom(coords: &[AxisPoint]) -> Vec<AxisPoint> {
    if coords.len() < 3 {
        return coords.to_vec();
    }
    let origin = coords[0].0;
    let xs: Vec<f64> = coords
        .iter()
        .map(|(t, _)| (*t - origin).num_milliseconds() as f64)
        .collect();

    let last = coords.len() - 1;
    let mut out = Vec::with_capacity(last * CURVE_STEPS + 1);
    for i in 0..last {
        let (p0, p3) = (i.saturating_sub(1), (i + 2).min(last));
        for step in 0..CURVE_STEPS {
            let s = step as f64 / CURVE_STEPS as f64;
            let x = spline(xs[p0], xs[i], xs[i + 1], xs[p3], s);
            let y = spline(coords[p0].1, coords[i].1, coords[i + 1].1, coords[p3].1, s);
            out.push((origin + ChronoDuration::milliseconds(x.round() as i64), y));
        }
    }
    out.push(coords[last]);
    out
}

fn spline(p0: f64, p1: f64, p2: f64, p3: f64, s: f64) -> f64 {
    0.5 * (2.0 * p1
        + (p2 - p0) * s
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * s * s
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * s * s * s)
}

/// Swap the fixed pixel size for a `viewBox` so the drawing scales with the
/// page.
fn make_svg_responsive(svg: String, width: u32, height: u32) -> String {
    let needle = format!("width=\"{width}\" height=\"{height}\"");
    let view_box = format!("viewBox=\"0 0 {width} {height}\"");
    let sizing = "width=\"100%\" height=\"100%\" preserveAspectRatio=\"xMidYMid meet\"";
    let replacement = if svg.contains(&view_box) {
        sizing.to_string()
    } else {
        format!("{view_box} {sizing}")
    };
    svg.replacen(&needle, &replacement, 1)
}

/// Invisible hit targets carrying a native tooltip for every sample.
fn attach_hover(mut svg: String, groups: &[HoverGroup<'_>], unit: &str) -> String {
    let unit = escape(unit);
    let mut overlay = String::from("<g class=\"hover\">\n");
    for group in groups {
        let label = escape(group.label);
        overlay.push_str(&format!("<g data-label=\"{label}\">\n"));
        for t in &group.targets {
            overlay.push_str(&format!(
                "<circle class=\"pt\" cx=\"{}\" cy=\"{}\" r=\"{HIT_RADIUS}\" fill=\"{}\" fill-opacity=\"0\">\
                 <title>{label}&#10;Time: {}&#10;Consumption: {:.2} {unit}</title></circle>\n",
                t.x, t.y, group.hex, t.time, t.value,
            ));
        }
        overlay.push_str("</g>\n");
    }
    overlay.push_str("</g>\n");

    match svg.rfind("</svg>") {
        Some(end) => svg.insert_str(end, &overlay),
        None => svg.push_str(&overlay),
    }
    svg
}

/// Plotted data as JSON for the presentation layer. `<` is escaped so the
/// payload cannot close its script element.
fn data_island(series: &DeviceSeries, unit: &str, zone: Tz, style: &ChartStyle) -> Result<String, ChartError> {
    let mut entries = Vec::with_capacity(series.len());
    for (position, (label, points)) in series.iter().enumerate() {
        let points = points
            .iter()
            .map(|p| Ok((zone::in_zone(p.at, zone)?.format(&Rfc3339)?, p.value)))
            .collect::<Result<Vec<_>, ChartError>>()?;
        entries.push(SeriesData {
            label,
            color: style.color_for(position),
            points,
        });
    }

    let json = serde_json::to_string(&ChartData { unit, series: entries })?;
    Ok(json.replace('<', "\\u003c"))
}

fn css_hex(c: RGBColor) -> String {
    format!("#{:02X}{:02X}{:02X}", c.0, c.1, c.2)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
