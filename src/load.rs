//! Reads the CSSE time series csv files and the population lookup table.

use crate::{parse_header_date, Error, Metric, Region, Result, Series, POPULATION_FILE};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TIME_SERIES_DIR: &str = "csse_covid_19_time_series";
const COUNTRY_HEADERS: [&str; 2] = ["Country/Region", "Country_Region"];
const PROVINCE_HEADERS: [&str; 2] = ["Province/State", "Province_State"];

/// Root of the CSSE data directory (csse_covid_19_data).
#[derive(Debug, Clone)]
pub struct DataSource {
    pub dir: PathBuf,
}

impl DataSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> DataSource {
        DataSource { dir: dir.into() }
    }

    /// current file name first, then the one used before the March 2020 rename
    pub fn time_series_candidates(&self, metric: Metric) -> [PathBuf; 2] {
        let ts_dir = self.dir.join(TIME_SERIES_DIR);
        [
            ts_dir.join(format!("time_series_covid19_{}_global.csv", metric.name())),
            ts_dir.join(format!("time_series_19-covid-{}.csv", metric.legacy_name())),
        ]
    }

    pub fn time_series_path(&self, metric: Metric) -> Result<PathBuf> {
        let [current, legacy] = self.time_series_candidates(metric);
        if current.is_file() {
            Ok(current)
        } else if legacy.is_file() {
            Ok(legacy)
        } else {
            Err(Error::MissingData(current))
        }
    }

    pub fn population_path(&self) -> PathBuf {
        self.dir.join(POPULATION_FILE)
    }
}

/// All the rows of the loaded time series, one Region per (country, province).
/// Country rows have no parent country, province rows have their country as parent.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub regions: Vec<Region>,
    index: HashMap<(String, Option<String>), usize>,
}

impl Dataset {
    pub fn new() -> Dataset {
        Dataset::default()
    }

    /// Loads one time series file per metric and merges the rows by (country, province).
    pub fn load(source: &DataSource, metrics: &[Metric]) -> Result<Dataset> {
        let mut dataset = Dataset::new();
        for &metric in metrics {
            let path = source.time_series_path(metric)?;
            info!("reading {} from {}", metric, path.display());
            let file = std::fs::File::open(&path)?;
            dataset.add_time_series(file, metric, &path)?;
        }
        debug!("loaded {} rows", dataset.regions.len());
        Ok(dataset)
    }

    /// Parses a time series csv: Province/State, Country/Region, Lat, Long, then one column per date.
    /// Columns whose header is not a date are ignored; an empty, negative or non-finite count
    /// takes the previous value of the row. Repeated (country, province) rows are summed.
    pub fn add_time_series<R: Read>(&mut self, reader: R, metric: Metric, origin: &Path) -> Result<()> {
        let csv_err = |source: csv::Error| Error::Csv {
            path: origin.to_path_buf(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers().map_err(csv_err)?.clone();
        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h));
        let i_country = find(&COUNTRY_HEADERS[..]).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no Country/Region column", origin.display()))
        })?;
        let i_province = find(&PROVINCE_HEADERS[..]);
        let date_columns: Vec<(usize, chrono::NaiveDate)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != i_country && Some(*i) != i_province)
            .filter_map(|(i, h)| parse_header_date(h).ok().map(|d| (i, d)))
            .collect();
        debug!("{}: {} date columns", origin.display(), date_columns.len());

        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            let country = match record.get(i_country) {
                Some(c) if !c.is_empty() => c,
                _ => {
                    warn!("skipping row without country in {}", origin.display());
                    continue;
                }
            };
            let province = i_province
                .and_then(|i| record.get(i))
                .filter(|p| !p.is_empty());
            let mut series = Series::new(date_columns.len());
            let mut previous = 0.;
            for &(i, date) in date_columns.iter() {
                let count = match record.get(i).map(str::parse::<f64>) {
                    Some(Ok(c)) if c.is_finite() && c >= 0. => c,
                    _ => {
                        warn!(
                            "invalid {} count for {} {:?} on {}, using {}",
                            metric, country, province, date, previous
                        );
                        previous
                    }
                };
                series.push(date, count);
                previous = count;
            }
            if !series.is_cumulative() {
                debug!("{} {:?} {} is not cumulative", country, province, metric);
            }
            let region = self.region_mut(country, province);
            match region.series.get_mut(&metric) {
                Some(existing) => {
                    warn!(
                        "duplicated {} row for {} {:?} in {}, adding it up",
                        metric, country, province, origin.display()
                    );
                    existing.accumulate(&series);
                }
                None => {
                    region.series.insert(metric, series);
                }
            }
        }
        Ok(())
    }

    fn region_mut(&mut self, country: &str, province: Option<&str>) -> &mut Region {
        let key = (country.to_string(), province.map(|p| p.to_string()));
        let regions = &mut self.regions;
        let i = *self.index.entry(key).or_insert_with(|| {
            let region = match province {
                Some(p) => Region::new(p, Some(country)),
                None => Region::new(country, None),
            };
            regions.push(region);
            regions.len() - 1
        });
        &mut self.regions[i]
    }

    /// rows (country or provinces) belonging to the country, in file order
    pub fn rows_of<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a Region> + 'a {
        self.regions.iter().filter(move |r| r.country_name() == country)
    }

    /// distinct country/region names, sorted
    pub fn region_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.regions.iter().map(|r| r.country_name()).collect();
        names.into_iter().map(String::from).collect()
    }
}

/// Population per (country, province), from the CSSE UID_ISO_FIPS lookup table.
#[derive(Debug, Clone, Default)]
pub struct Populations {
    by_region: HashMap<(String, String), f64>,
}

impl Populations {
    /// Reads the lookup table at path, MissingData if the file does not exist.
    pub fn load(path: &Path) -> Result<Populations> {
        if !path.is_file() {
            return Err(Error::MissingData(path.to_path_buf()));
        }
        info!("reading populations from {}", path.display());
        let file = std::fs::File::open(path)?;
        Populations::from_reader(file, path)
    }

    /// County-level rows (non-empty Admin2) and rows without population are skipped.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Populations> {
        let csv_err = |source: csv::Error| Error::Csv {
            path: origin.to_path_buf(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers().map_err(csv_err)?.clone();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let (i_country, i_population) = match (find("Country_Region"), find("Population")) {
            (Some(c), Some(p)) => (c, p),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "{} needs Country_Region and Population columns",
                    origin.display()
                )))
            }
        };
        let i_province = find("Province_State");
        let i_admin2 = find("Admin2");

        let mut populations = Populations::default();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            if i_admin2.and_then(|i| record.get(i)).map_or(false, |a| !a.is_empty()) {
                continue;
            }
            let population = match record.get(i_population).map(str::parse::<f64>) {
                Some(Ok(p)) if p > 0. => p,
                _ => continue,
            };
            let country = record.get(i_country).unwrap_or_default();
            let province = i_province.and_then(|i| record.get(i)).unwrap_or_default();
            populations.insert(country, Some(province).filter(|p| !p.is_empty()), population);
        }
        debug!("{} populations", populations.by_region.len());
        Ok(populations)
    }

    pub fn insert(&mut self, country: &str, province: Option<&str>, population: f64) {
        self.by_region.insert(
            (country.to_string(), province.unwrap_or_default().to_string()),
            population,
        );
    }

    pub fn get(&self, country: &str, province: Option<&str>) -> Option<f64> {
        self.by_region
            .get(&(country.to_string(), province.unwrap_or_default().to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CONFIRMED: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Switzerland,46.8,8.2,0,1,3
Hubei,China,30.9,112.2,444,444,549
Beijing,China,40.1,116.4,14,22,
,Italy,43.0,12.0,0,0,2
";

    fn dataset() -> Dataset {
        let mut ds = Dataset::new();
        ds.add_time_series(CONFIRMED.as_bytes(), Metric::Confirmed, Path::new("confirmed.csv"))
            .unwrap();
        ds
    }

    #[test]
    fn rows_keep_file_order_and_provinces() {
        let ds = dataset();
        let labels: Vec<String> = ds.regions.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["Switzerland", "China - Hubei", "China - Beijing", "Italy"]);
        let ch = &ds.regions[0].series[&Metric::Confirmed];
        assert_eq!(ch.dates[0], NaiveDate::from_ymd_opt(2020, 1, 22).unwrap());
        assert_eq!(ch.counts, vec![0., 1., 3.]);
    }

    #[test]
    fn empty_cell_carries_previous_count() {
        let ds = dataset();
        let beijing = &ds.regions[2].series[&Metric::Confirmed];
        assert_eq!(beijing.counts, vec![14., 22., 22.]);
    }

    #[test]
    fn nan_and_negative_cells_carry_previous_count() {
        let mut ds = Dataset::new();
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20,1/25/20\n,X,0,0,1,NaN,-4,inf\n";
        ds.add_time_series(csv.as_bytes(), Metric::Confirmed, Path::new("x.csv"))
            .unwrap();
        assert_eq!(ds.regions[0].series[&Metric::Confirmed].counts, vec![1., 1., 1., 1.]);
    }

    #[test]
    fn repeated_rows_are_summed() {
        let mut ds = Dataset::new();
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n,X,0,0,1,2\n,X,0,0,10,20\n";
        ds.add_time_series(csv.as_bytes(), Metric::Confirmed, Path::new("x.csv"))
            .unwrap();
        assert_eq!(ds.regions.len(), 1);
        assert_eq!(ds.regions[0].series[&Metric::Confirmed].counts, vec![11., 22.]);
    }

    #[test]
    fn metrics_merge_into_the_same_region() {
        let mut ds = dataset();
        let deaths = "Province/State,Country/Region,Lat,Long,1/22/20\n,Italy,43.0,12.0,0\n";
        ds.add_time_series(deaths.as_bytes(), Metric::Deaths, Path::new("deaths.csv"))
            .unwrap();
        assert_eq!(ds.regions.len(), 4);
        assert_eq!(ds.regions[3].series.len(), 2);
    }

    #[test]
    fn region_names_are_distinct_and_sorted() {
        assert_eq!(dataset().region_names(), vec!["China", "Italy", "Switzerland"]);
    }

    #[test]
    fn rows_of_country() {
        let ds = dataset();
        assert_eq!(ds.rows_of("China").count(), 2);
        assert_eq!(ds.rows_of("Narnia").count(), 0);
    }

    #[test]
    fn missing_country_column_is_rejected() {
        let mut ds = Dataset::new();
        let res = ds.add_time_series("a,b\n1,2\n".as_bytes(), Metric::Confirmed, Path::new("x.csv"));
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn missing_file_is_missing_data() {
        let source = DataSource::new("/nonexistent/csse_covid_19_data");
        assert!(matches!(source.time_series_path(Metric::Deaths), Err(Error::MissingData(_))));
        assert!(matches!(
            Dataset::load(&source, &[Metric::Confirmed]),
            Err(Error::MissingData(_))
        ));
        assert!(matches!(
            Populations::load(Path::new("/nonexistent/UID_ISO_FIPS_LookUp_Table.csv")),
            Err(Error::MissingData(_))
        ));
    }

    #[test]
    fn populations_skip_counties_and_blanks() {
        let table = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population
756,CH,CHE,756,,,,Switzerland,46.8,8.2,Switzerland,8654622
84001001,US,USA,840,1001,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",55869
84000001,US,USA,840,1,,Alabama,US,32.3,-86.9,\"Alabama, US\",4903185
999,,,,,,,Diamond Princess,0,0,Diamond Princess,
";
        let pops = Populations::from_reader(table.as_bytes(), Path::new("lookup.csv")).unwrap();
        assert_eq!(pops.len(), 2);
        assert_eq!(pops.get("Switzerland", None), Some(8654622.));
        assert_eq!(pops.get("US", Some("Alabama")), Some(4903185.));
        assert_eq!(pops.get("Diamond Princess", None), None);
    }
}
