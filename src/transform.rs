//! Turns the loaded rows into the labelled lines handed to the renderer:
//! select countries (aggregated or per province), clamp to a start date,
//! normalize per capita and align on a common day zero.

use crate::load::{Dataset, Populations};
use crate::plot::Options;
use crate::{Error, Metric, Region, Result, Series};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// One plotted series: a metric of a region, optionally shifted to its own day zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub label: String,
    pub region: String,
    pub metric: Metric,
    pub series: Series,
    /// day zero when the chart is aligned
    pub origin: Option<NaiveDate>,
}

impl Line {
    /// days between each point and the base date
    pub fn offsets(&self, base: NaiveDate) -> Vec<i64> {
        self.series.dates.iter().map(|d| (*d - base).num_days()).collect()
    }

    /// days relative to day zero, None for unaligned lines
    pub fn relative_days(&self) -> Option<Vec<i64>> {
        self.origin.map(|o| self.offsets(o))
    }
}

/// The metric and value that define day zero of each region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub metric: Metric,
    pub threshold: f64,
}

/// Picks the requested countries; with split each row (province) is its own region,
/// otherwise the rows of a country are summed. Duplicated names are taken once.
pub fn select(
    dataset: &Dataset,
    countries: &[String],
    split: bool,
    populations: Option<&Populations>,
) -> Result<Vec<Region>> {
    let mut regions: Vec<Region> = Vec::new();
    let mut seen: Vec<&str> = Vec::with_capacity(countries.len());
    for country in countries.iter().map(|c| c.trim()) {
        if seen.contains(&country) {
            continue;
        }
        seen.push(country);
        let rows: Vec<&Region> = dataset.rows_of(country).collect();
        if rows.is_empty() {
            return Err(Error::UnknownRegion(country.to_string()));
        }
        debug!("{}: {} row(s)", country, rows.len());
        if split {
            for row in rows {
                let mut region = row.clone();
                region.population = populations.and_then(|p| {
                    let province = row.country.as_ref().map(|_| row.name.as_str());
                    p.get(country, province)
                });
                regions.push(region);
            }
        } else {
            regions.push(aggregate(country, &rows, populations));
        }
    }
    Ok(regions)
}

/// element-wise sum of the rows of a country; the population is the country's own
/// or, when missing, the sum over its provinces if all of them are known
fn aggregate(country: &str, rows: &[&Region], populations: Option<&Populations>) -> Region {
    let mut region = Region::new(country, None);
    for row in rows {
        for (metric, series) in row.series.iter() {
            match region.series.get_mut(metric) {
                Some(total) => total.accumulate(series),
                None => {
                    region.series.insert(*metric, series.clone());
                }
            }
        }
    }
    region.population = populations.and_then(|p| {
        p.get(country, None).or_else(|| {
            rows.iter()
                .map(|r| p.get(country, r.country.as_ref().map(|_| r.name.as_str())))
                .sum::<Option<f64>>()
        })
    });
    region
}

/// keeps the points on or after the start date
pub fn since(regions: &[Region], start: NaiveDate) -> Vec<Region> {
    regions
        .iter()
        .map(|r| Region {
            series: r.series.iter().map(|(m, s)| (*m, s.since(start))).collect(),
            ..r.clone()
        })
        .collect()
}

/// converts the counts to cases per 100'000 inhabitants
pub fn per_capita(regions: &[Region]) -> Result<Vec<Region>> {
    regions
        .iter()
        .map(|r| {
            let population = r
                .population
                .ok_or_else(|| Error::MissingPopulation(r.label()))?;
            Ok(Region {
                series: r
                    .series
                    .iter()
                    .map(|(m, s)| (*m, s.per_capita(population)))
                    .collect(),
                ..r.clone()
            })
        })
        .collect()
}

/// Day zero of a region: the date whose count of the alignment metric is closest to the
/// threshold. Regions without that metric fall back to the first metric they have,
/// in confirmed, deaths, recovered order.
pub fn day_zero(region: &Region, alignment: &Alignment) -> Option<NaiveDate> {
    let series = region
        .series
        .get(&alignment.metric)
        .or_else(|| region.series.values().next())?;
    series
        .closest_index(alignment.threshold)
        .map(|i| series.dates[i])
}

/// One line per region and metric, in region order then metric order.
/// Empty series (e.g. after the start date clamp) are dropped.
pub fn to_lines(regions: &[Region], metrics: &[Metric], alignment: Option<&Alignment>) -> Vec<Line> {
    let mut lines = Vec::with_capacity(regions.len() * metrics.len());
    for region in regions {
        let origin = alignment.and_then(|a| day_zero(region, a));
        if let (Some(a), Some(o)) = (alignment, origin) {
            debug!("{}: day zero {} for {} {}", region.label(), o, a.threshold, a.metric);
        }
        for metric in metrics {
            match region.series.get(metric) {
                Some(series) if !series.is_empty() => lines.push(Line {
                    label: format!("{} - {}", region.label(), metric),
                    region: region.label(),
                    metric: *metric,
                    series: series.clone(),
                    origin,
                }),
                _ => warn!("no {} data for {}", metric, region.label()),
            }
        }
    }
    lines
}

/// Runs select, start date, per-capita and alignment as requested by the options.
pub fn prepare(
    dataset: &Dataset,
    options: &Options,
    populations: Option<&Populations>,
) -> Result<Vec<Line>> {
    let mut regions = select(dataset, &options.countries, options.split_by_state, populations)?;
    if let Some(start) = options.start_date {
        regions = since(&regions, start);
    }
    if options.per_capita {
        regions = per_capita(&regions)?;
    }
    let alignment = options.alignment();
    let lines = to_lines(&regions, &options.metrics, alignment.as_ref());
    info!("prepared {} line(s) for {} region(s)", lines.len(), regions.len());
    Ok(lines)
}
