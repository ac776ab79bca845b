use std::path::PathBuf;

/// Everything that can stop the pipeline between reading the csv files and writing the chart.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse csv file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A data file required by the selected metrics (or the population table) does not exist.
    #[error("missing data file: {0}")]
    MissingData(PathBuf),

    #[error("unknown country/region '{0}', use --list-countries to see the available names")]
    UnknownRegion(String),

    #[error("no population available for '{0}', cannot compute the per-capita rate")]
    MissingPopulation(String),

    #[error("not a valid date: '{0}'")]
    InvalidDate(String),

    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("nothing to plot")]
    NoData,

    #[error("could not render the chart: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
