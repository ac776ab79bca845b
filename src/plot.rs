use crate::load::{DataSource, Dataset, Populations};
use crate::render::{Chart, ChartSink};
use crate::transform::{prepare, Alignment};
use crate::{parse_date, Metric, Result, DATA_DIR_ENV, DEFAULT_COUNTRY, DEFAULT_DATA_DIR, VERSION};
use chrono::NaiveDate;
use clap::{App, Arg, ArgMatches};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_SVG: &str = "covid_19.svg";
pub const DEFAULT_THRESHOLD: &str = "100";

/// Validated command line options of covid_plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub countries: Vec<String>,
    pub metrics: Vec<Metric>,
    pub logarithmic: bool,
    pub start_date: Option<NaiveDate>,
    pub align: bool,
    pub threshold: f64,
    pub annotate: bool,
    pub per_capita: bool,
    pub population: Option<PathBuf>,
    pub split_by_state: bool,
    pub list_countries: bool,
    pub data_dir: PathBuf,
    pub svgout: PathBuf,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            countries: vec![DEFAULT_COUNTRY.to_string()],
            metrics: vec![Metric::Confirmed],
            logarithmic: false,
            start_date: None,
            align: false,
            threshold: 100.,
            annotate: true,
            per_capita: false,
            population: None,
            split_by_state: false,
            list_countries: false,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            svgout: PathBuf::from(DEFAULT_SVG),
            verbose: false,
        }
    }
}

impl Options {
    pub fn from_matches(cli_args: &ArgMatches) -> Result<Options> {
        let countries: Vec<String> = cli_args
            .values_of("countries")
            .map(|v| v.map(String::from).collect())
            .unwrap_or_else(|| vec![DEFAULT_COUNTRY.to_string()]);
        let metrics: Vec<Metric> = if cli_args.is_present("all") {
            Metric::ALL.to_vec()
        } else {
            let selected: Vec<Metric> = Metric::ALL
                .iter()
                .copied()
                .filter(|m| cli_args.is_present(m.name()))
                .collect();
            if selected.is_empty() {
                vec![Metric::Confirmed]
            } else {
                selected
            }
        };
        let start_date = match cli_args.value_of("startdate") {
            Some(s) => Some(parse_date(s)?),
            None => None,
        };
        let threshold = parse_threshold(cli_args.value_of("threshold").unwrap_or(DEFAULT_THRESHOLD))?;
        let data_dir = PathBuf::from(cli_args.value_of("data_dir").unwrap_or(DEFAULT_DATA_DIR));
        Ok(Options {
            countries,
            metrics,
            logarithmic: cli_args.is_present("logarithmic"),
            start_date,
            align: cli_args.is_present("align"),
            threshold,
            annotate: !cli_args.is_present("no_annotate"),
            per_capita: cli_args.is_present("per_capita"),
            population: cli_args.value_of("population").map(PathBuf::from),
            split_by_state: cli_args.is_present("split_by_state"),
            list_countries: cli_args.is_present("list_countries"),
            data_dir,
            svgout: PathBuf::from(cli_args.value_of("output_svgfile").unwrap_or(DEFAULT_SVG)),
            verbose: cli_args.is_present("verbose"),
        })
    }

    pub fn source(&self) -> DataSource {
        DataSource::new(&self.data_dir)
    }

    /// the population table given on the command line, or the one inside the data directory
    pub fn population_path(&self) -> PathBuf {
        self.population
            .clone()
            .unwrap_or_else(|| self.source().population_path())
    }

    /// day zero is looked up on the first selected metric
    pub fn alignment(&self) -> Option<Alignment> {
        if !self.align {
            return None;
        }
        Some(Alignment {
            metric: self.metrics.first().copied().unwrap_or(Metric::Confirmed),
            threshold: self.threshold,
        })
    }
}

fn valid_date(s: String) -> std::result::Result<(), String> {
    parse_date(&s).map(|_| ()).map_err(|e| e.to_string())
}

fn parse_threshold(s: &str) -> Result<f64> {
    match s.parse::<f64>() {
        Ok(t) if t.is_finite() && t >= 0. => Ok(t),
        _ => Err(crate::Error::InvalidArgument(format!(
            "threshold must be a non-negative number, got '{}'",
            s
        ))),
    }
}

fn valid_threshold(s: String) -> std::result::Result<(), String> {
    parse_threshold(&s).map(|_| ()).map_err(|e| e.to_string())
}

/// Defines the CLI arguments that control the selection, transformation and plotting of the series.
pub fn app<'a, 'b>() -> App<'a, 'b> {
    let arg_countries = Arg::with_name("countries")
        .help("list of countries/regions")
        .multiple(true)
        .default_value(DEFAULT_COUNTRY);
    let arg_log = Arg::with_name("logarithmic")
        .help("use logarithmic scale")
        .short("l")
        .long("logarithmic");
    let arg_confirmed = Arg::with_name("confirmed")
        .help("include confirmed (default)")
        .short("c")
        .long("confirmed");
    let arg_deaths = Arg::with_name("deaths")
        .help("include deaths")
        .short("d")
        .long("deaths");
    let arg_recovered = Arg::with_name("recovered")
        .help("include recovered")
        .short("r")
        .long("recovered");
    let arg_all = Arg::with_name("all")
        .help("include confirmed, deaths and recovered")
        .short("a")
        .long("all");
    let arg_startdate = Arg::with_name("startdate")
        .help("plot data past given date - format YYYY-MM-DD")
        .short("s")
        .long("startdate")
        .takes_value(true)
        .validator(valid_date);
    let arg_align = Arg::with_name("align")
        .help("align the regions on the day their count is closest to the threshold")
        .long("align");
    let arg_threshold = Arg::with_name("threshold")
        .help("count (or rate with --per-capita) that defines day zero for --align")
        .long("threshold")
        .takes_value(true)
        .default_value(DEFAULT_THRESHOLD)
        .validator(valid_threshold);
    let arg_no_annotate = Arg::with_name("no_annotate")
        .help("disable annotation of data points")
        .long("no-annotate");
    let arg_per_capita = Arg::with_name("per_capita")
        .help("plot cases per 100'000 inhabitants")
        .long("per-capita");
    let arg_population = Arg::with_name("population")
        .help("population lookup table, defaults to UID_ISO_FIPS_LookUp_Table.csv in the data directory")
        .long("population")
        .takes_value(true);
    let arg_split = Arg::with_name("split_by_state")
        .help("show graph for each province/state")
        .long("split-by-state");
    let arg_list = Arg::with_name("list_countries")
        .help("list available countries/regions")
        .long("list-countries");
    let arg_data_dir = Arg::with_name("data_dir")
        .help("path of the csse_covid_19_data directory")
        .long("data-dir")
        .takes_value(true)
        .env(DATA_DIR_ENV)
        .default_value(DEFAULT_DATA_DIR);
    let arg_svgout = Arg::with_name("output_svgfile")
        .help("name of the output svg file")
        .short("o")
        .long("svgfile")
        .takes_value(true)
        .default_value(DEFAULT_SVG);
    let arg_verbose = Arg::with_name("verbose")
        .help("print verbose information")
        .short("v")
        .long("verbose");
    App::new("covid_plot")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to plot the COVID-19 time series of the CSSE data repository")
        .arg(arg_countries)
        .arg(arg_log)
        .arg(arg_confirmed)
        .arg(arg_deaths)
        .arg(arg_recovered)
        .arg(arg_all)
        .arg(arg_startdate)
        .arg(arg_align)
        .arg(arg_threshold)
        .arg(arg_no_annotate)
        .arg(arg_per_capita)
        .arg(arg_population)
        .arg(arg_split)
        .arg(arg_list)
        .arg(arg_data_dir)
        .arg(arg_svgout)
        .arg(arg_verbose)
}

/// Takes the CLI arguments of the process; clap exits on invalid arguments and --help.
pub fn parse_cli() -> Result<Options> {
    Options::from_matches(&app().get_matches())
}

pub fn parse_cli_from<I, T>(args: I) -> Result<Options>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = app().get_matches_from_safe(args)?;
    Options::from_matches(&cli_args)
}

/// distinct country/region names of the selected metrics' files, sorted
pub fn list_countries(options: &Options) -> Result<Vec<String>> {
    let dataset = Dataset::load(&options.source(), &options.metrics)?;
    Ok(dataset.region_names())
}

/// Loads the data, runs the transformations and hands the chart to the sink.
pub fn plot(options: &Options, sink: &mut dyn ChartSink) -> Result<Chart> {
    let dataset = Dataset::load(&options.source(), &options.metrics)?;
    let populations = if options.per_capita {
        Some(Populations::load(&options.population_path())?)
    } else {
        None
    };
    let lines = prepare(&dataset, options, populations.as_ref())?;
    let chart = Chart::new(options, lines);
    sink.draw(&chart)?;
    info!("plotted {} line(s)", chart.lines.len());
    Ok(chart)
}
