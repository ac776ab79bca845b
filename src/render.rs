//! Hands the prepared lines to plotters.

use crate::plot::Options;
use crate::transform::Line;
use crate::{format_count, min_and_max, Error, Metric, Result, DATE_FORMAT};
use chrono::{Duration, NaiveDate};
use plotters::coord::ranged1d::{Ranged, ValueFormatter};
use plotters::coord::types::RangedCoordi64;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything the renderer needs: the lines and how to draw them.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub logarithmic: bool,
    pub annotate: bool,
    pub aligned: bool,
    pub per_capita: bool,
    pub lines: Vec<Line>,
}

/// A plotted point: x in days, the value on y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: i64,
    pub value: f64,
}

impl Chart {
    pub fn new(options: &Options, lines: Vec<Line>) -> Chart {
        let title = if options.logarithmic {
            "Logarithmic"
        } else {
            "Linear"
        };
        Chart {
            title: title.to_string(),
            logarithmic: options.logarithmic,
            annotate: options.annotate,
            aligned: options.align,
            per_capita: options.per_capita,
            lines,
        }
    }

    /// earliest date over all lines, the x origin of unaligned charts
    pub fn base_date(&self) -> Option<NaiveDate> {
        self.lines.iter().filter_map(|l| l.series.dates.first()).min().copied()
    }

    pub fn x_desc(&self) -> &'static str {
        if self.aligned {
            "Days since threshold"
        } else {
            "Days"
        }
    }

    pub fn y_desc(&self) -> &'static str {
        if self.per_capita {
            "Cases per 100'000"
        } else {
            "Cases"
        }
    }

    /// Points of a line in plot coordinates. Aligned charts count days from the line's
    /// day zero, the others from the base date. Log charts drop values <= 0.
    pub fn points(&self, line: &Line) -> Vec<Point> {
        let xs = match (self.aligned, line.origin, self.base_date()) {
            (true, Some(origin), _) => line.offsets(origin),
            (_, _, Some(base)) => line.offsets(base),
            _ => return Vec::new(),
        };
        xs.into_iter()
            .zip(line.series.counts.iter().copied())
            .filter(|(_, v)| !self.logarithmic || *v > 0.)
            .map(|(x, value)| Point { x, value })
            .collect()
    }

    /// lines of the same region share the color index
    pub fn color_index(&self, line: &Line) -> usize {
        let mut regions: Vec<&str> = Vec::new();
        for l in self.lines.iter() {
            if !regions.contains(&l.region.as_str()) {
                regions.push(&l.region);
            }
            if l.region == line.region {
                break;
            }
        }
        regions.len().saturating_sub(1)
    }
}

/// Consumes a prepared chart; the svg renderer in production, a recorder in tests.
pub trait ChartSink {
    fn draw(&mut self, chart: &Chart) -> Result<()>;
}

/// Renders the chart to an svg file.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    pub path: PathBuf,
    pub size: (u32, u32),
}

impl SvgRenderer {
    pub fn new<P: Into<PathBuf>>(path: P) -> SvgRenderer {
        SvgRenderer {
            path: path.into(),
            size: (1600, 900),
        }
    }
}

impl ChartSink for SvgRenderer {
    fn draw(&mut self, chart: &Chart) -> Result<()> {
        if chart.lines.iter().all(|l| chart.points(l).is_empty()) {
            return Err(Error::NoData);
        }
        draw_svg(chart, &self.path, self.size).map_err(|e| Error::Render(e.to_string()))?;
        info!("chart written to {}", self.path.display());
        Ok(())
    }
}

/// plots the lines to svg, one color per region and one marker per metric;
/// logarithmic charts use a log coordinate spanning whole decades
fn draw_svg(
    chart: &Chart,
    fout: &Path,
    size: (u32, u32),
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let points: Vec<Vec<Point>> = chart.lines.iter().map(|l| chart.points(l)).collect();
    let xs: Vec<i64> = points.iter().flatten().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().flatten().map(|p| p.value).collect();
    let (xmin, xmax) = min_and_max(&xs[..]).ok_or(Error::NoData)?;
    let (ymin, ymax) = min_and_max(&ys[..]).ok_or(Error::NoData)?;
    let base = chart.base_date().ok_or(Error::NoData)?;

    let root = SVGBackend::new(fout, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut builder = ChartBuilder::on(&root);
    builder
        .caption(&chart.title, ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(90)
        .y_label_area_size(110);
    if chart.logarithmic {
        let (ymin, ymax) = decades(ymin, ymax);
        debug!("x range {}..{}, log y range {}..{}", xmin, xmax, ymin, ymax);
        let mut cc = builder.build_cartesian_2d(xmin - 1..xmax + 1, (ymin..ymax).log_scale())?;
        draw_lines(&mut cc, chart, &points, base)?;
    } else {
        let ymin = 0f64.min(ymin);
        let ymax = ymax + ((ymax - ymin) / 20.).max(1.);
        debug!("x range {}..{}, y range {}..{}", xmin, xmax, ymin, ymax);
        let mut cc = builder.build_cartesian_2d(xmin - 1..xmax + 1, ymin..ymax)?;
        draw_lines(&mut cc, chart, &points, base)?;
    }
    root.present()?;
    Ok(())
}

/// widens a positive range to the enclosing powers of ten
pub fn decades(min: f64, max: f64) -> (f64, f64) {
    let low = 10f64.powf(min.log10().floor());
    let high = 10f64.powf(max.log10().ceil());
    if high > low {
        (low, high)
    } else {
        (low, low * 10.)
    }
}

/// mesh, lines, markers, annotations and legend, for either y coordinate
fn draw_lines<'a, 'b: 'a, Y>(
    cc: &mut ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordi64, Y>>,
    chart: &Chart,
    points: &[Vec<Point>],
    base: NaiveDate,
) -> std::result::Result<(), Box<dyn std::error::Error>>
where
    Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    let aligned = chart.aligned;
    let x_fmt = |x: &i64| {
        if aligned {
            x.to_string()
        } else {
            (base + Duration::days(*x)).format(DATE_FORMAT).to_string()
        }
    };
    let y_fmt = |y: &f64| format_count(*y);
    cc.configure_mesh()
        .light_line_style(&RGBColor(230, 230, 230))
        .bold_line_style(RGBColor(150, 150, 150).stroke_width(1))
        .set_all_tick_mark_size(2)
        .label_style(("sans-serif", 16))
        .x_desc(chart.x_desc())
        .y_desc(chart.y_desc())
        .x_labels(20)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .draw()?;

    for (line, pts) in chart.lines.iter().zip(points.iter()) {
        let color = Palette99::pick(chart.color_index(line)).to_rgba();
        let xy: Vec<(i64, f64)> = pts.iter().map(|p| (p.x, p.value)).collect();
        cc.draw_series(LineSeries::new(xy.iter().copied(), color.stroke_width(2)))?
            .label(line.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        match line.metric {
            Metric::Confirmed => {
                cc.draw_series(xy.iter().map(|p| Circle::new(*p, 3, color.filled())))?;
            }
            Metric::Deaths => {
                cc.draw_series(xy.iter().map(|p| TriangleMarker::new(*p, 4, color.filled())))?;
            }
            Metric::Recovered => {
                cc.draw_series(xy.iter().map(|p| Cross::new(*p, 4, color.stroke_width(1))))?;
            }
        }
        if chart.annotate {
            cc.draw_series(xy.iter().map(|p| {
                Text::new(format_count(p.1), *p, ("sans-serif", 11).into_font())
            }))?;
        }
    }

    cc.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 16))
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Series;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn line(region: &str, metric: Metric, first: u32, counts: &[f64], origin: Option<NaiveDate>) -> Line {
        let mut series = Series::new(counts.len());
        for (i, c) in counts.iter().enumerate() {
            series.push(day(first + i as u32), *c);
        }
        Line {
            label: format!("{} - {}", region, metric),
            region: region.to_string(),
            metric,
            series,
            origin,
        }
    }

    fn chart(lines: Vec<Line>, logarithmic: bool, aligned: bool) -> Chart {
        let options = Options {
            logarithmic,
            align: aligned,
            ..Options::default()
        };
        Chart::new(&options, lines)
    }

    #[test]
    fn titles_and_axis_descriptions() {
        let c = chart(vec![], true, true);
        assert_eq!(c.title, "Logarithmic");
        assert_eq!(c.x_desc(), "Days since threshold");
        assert_eq!(c.y_desc(), "Cases");
        assert_eq!(chart(vec![], false, false).title, "Linear");
    }

    #[test]
    fn unaligned_points_count_from_the_earliest_date() {
        let c = chart(
            vec![
                line("Italy", Metric::Confirmed, 3, &[5., 6.], None),
                line("Spain", Metric::Confirmed, 1, &[1., 2.], None),
            ],
            false,
            false,
        );
        assert_eq!(c.base_date(), Some(day(1)));
        let xs: Vec<i64> = c.points(&c.lines[0]).iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![2, 3]);
    }

    #[test]
    fn aligned_points_count_from_day_zero() {
        let c = chart(
            vec![line("Italy", Metric::Confirmed, 1, &[5., 60., 120.], Some(day(2)))],
            false,
            true,
        );
        let xs: Vec<i64> = c.points(&c.lines[0]).iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![-1, 0, 1]);
    }

    #[test]
    fn log_points_skip_zero_counts() {
        let c = chart(vec![line("Italy", Metric::Deaths, 1, &[0., 10., 1000.], None)], true, false);
        let pts = c.points(&c.lines[0]);
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0].value, 10.);
        assert_eq!(pts[1].value, 1000.);
    }

    #[test]
    fn log_range_spans_whole_decades() {
        let close = |(a, b): (f64, f64), (c, d): (f64, f64)| {
            (a - c).abs() < 1e-9 * c && (b - d).abs() < 1e-9 * d
        };
        assert!(close(decades(0.1, 4.), (0.1, 10.)));
        assert!(close(decades(0.23, 2.9), (0.1, 10.)));
        assert!(close(decades(20., 250.), (10., 1000.)));
        assert!(close(decades(100., 100.), (100., 1000.)));
    }

    #[test]
    fn regions_share_colors_across_metrics() {
        let c = chart(
            vec![
                line("Italy", Metric::Confirmed, 1, &[1.], None),
                line("Italy", Metric::Deaths, 1, &[1.], None),
                line("Spain", Metric::Confirmed, 1, &[1.], None),
            ],
            false,
            false,
        );
        assert_eq!(c.color_index(&c.lines[0]), 0);
        assert_eq!(c.color_index(&c.lines[1]), 0);
        assert_eq!(c.color_index(&c.lines[2]), 1);
    }

    #[test]
    fn empty_chart_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = SvgRenderer::new(dir.path().join("empty.svg"));
        assert!(matches!(renderer.draw(&chart(vec![], false, false)), Err(Error::NoData)));
    }
}
