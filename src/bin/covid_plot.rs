use covid_plot::plot::{list_countries, parse_cli, plot};
use covid_plot::render::SvgRenderer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let options = match parse_cli() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over --verbose
    let level = if options.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    if options.list_countries {
        match list_countries(&options) {
            Ok(names) => {
                println!("{}", names.join("\n"));
                std::process::exit(0);
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    info!(
        "plotting {} for {} to {}",
        options
            .metrics
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(", "),
        options.countries.join(", "),
        options.svgout.display()
    );
    let mut renderer = SvgRenderer::new(&options.svgout);
    if let Err(e) = plot(&options, &mut renderer) {
        error!("{}", e);
        std::process::exit(1);
    }
}
