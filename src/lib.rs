use chrono::prelude::*;
use std::collections::BTreeMap;
pub mod error;
pub mod load;
pub mod plot;
pub mod render;
pub mod transform;

pub use error::{Error, Result};

pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_COUNTRY: &str = "Switzerland";
pub const DEFAULT_DATA_DIR: &str = "COVID-19/csse_covid_19_data";
pub const DATA_DIR_ENV: &str = "COVID_DATA_DIR";
pub const POPULATION_FILE: &str = "UID_ISO_FIPS_LookUp_Table.csv";
pub const PER_CAPITA_BASE: f64 = 100_000.;

/// The three cumulative counts published per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    /// capitalized form used by the legacy file names, e.g. time_series_19-covid-Deaths.csv
    pub fn legacy_name(self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Deaths => "Deaths",
            Metric::Recovered => "Recovered",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The main struct for a cumulative daily time series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub dates: Vec<NaiveDate>,
    pub counts: Vec<f64>,
}

impl Series {
    pub fn new(capacity: usize) -> Series {
        Series {
            dates: Vec::with_capacity(capacity),
            counts: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, date: NaiveDate, count: f64) {
        self.dates.push(date);
        self.counts.push(count);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.counts.iter().copied())
    }

    /// keeps only the points on or after the given date
    /// takes a reference and returns a new Series
    pub fn since(&self, start: NaiveDate) -> Series {
        let mut series = Series::new(self.len());
        for (d, c) in self.iter().filter(|(d, _)| *d >= start) {
            series.push(d, c);
        }
        series
    }

    /// converts every count to a rate per 100'000 inhabitants
    /// takes a reference and returns a new Series
    pub fn per_capita(&self, population: f64) -> Series {
        Series {
            dates: self.dates.clone(),
            counts: self
                .counts
                .iter()
                .map(|c| c * PER_CAPITA_BASE / population)
                .collect(),
        }
    }

    /// adds the counts of another series sharing the same dates, element by element;
    /// extra points of the longer series are ignored
    pub fn accumulate(&mut self, other: &Series) {
        for (c, o) in self.counts.iter_mut().zip(other.counts.iter()) {
            *c += o;
        }
    }

    /// index of the count closest to the threshold, the earliest one on ties
    pub fn closest_index(&self, threshold: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in self.counts.iter().enumerate() {
            let distance = (c - threshold).abs();
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((i, distance)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// checks that dates strictly increase and counts never decrease
    pub fn is_cumulative(&self) -> bool {
        let dates_ok = self.dates.windows(2).all(|w| w[0] < w[1]);
        let counts_ok = self.counts.windows(2).all(|w| w[0] <= w[1]);
        dates_ok && counts_ok && self.counts.iter().all(|c| *c >= 0.)
    }
}

/// A country or a province with one series per loaded metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    /// set for provinces/states, the country they belong to
    pub country: Option<String>,
    pub population: Option<f64>,
    pub series: BTreeMap<Metric, Series>,
}

impl Region {
    pub fn new(name: &str, country: Option<&str>) -> Region {
        Region {
            name: name.to_string(),
            country: country.map(|c| c.to_string()),
            population: None,
            series: BTreeMap::new(),
        }
    }

    /// "Country - Province" for provinces, the plain name otherwise
    pub fn label(&self) -> String {
        match &self.country {
            Some(c) => format!("{} - {}", c, self.name),
            None => self.name.clone(),
        }
    }

    pub fn country_name(&self) -> &str {
        self.country.as_deref().unwrap_or(&self.name)
    }
}

/// formats an integer with ' as thousands separator, 1234567 -> 1'234'567
pub fn group(number: i64) -> String {
    let digits = number.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if number < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\'');
        }
        grouped.push(ch);
    }
    grouped
}

/// grouped integer for whole or large values, two decimals for small rates
pub fn format_count(value: f64) -> String {
    if value.fract() == 0. || value.abs() >= 100. {
        group(value.round() as i64)
    } else {
        format!("{:.2}", value)
    }
}

pub fn min_and_max<T: std::cmp::PartialOrd + Copy>(s: &[T]) -> Option<(T, T)> {
    let mut s_iter = s.iter();
    let (mut min, mut max) = match s_iter.next() {
        Some(v) => (*v, *v),
        None => return None,
    };
    for es in s_iter {
        if *es > max {
            max = *es
        }
        if *es < min {
            min = *es
        }
    }
    Some((min, max))
}

/// Parses the column headers of the time series, month/day/year without padding, e.g. 1/22/20.
/// Two-digit years are taken as 20yy.
pub fn parse_header_date(s: &str) -> Result<NaiveDate> {
    let invalid = || Error::InvalidDate(s.to_string());
    let mut parts = s.trim().split('/');
    let mut next_number = || -> Result<i32> {
        parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(invalid)
    };
    let month = next_number()?;
    let day = next_number()?;
    let year = next_number()?;
    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(invalid)
}

/// Parses the YYYY-MM-DD dates given on the command line.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate(s.to_string()))
}
