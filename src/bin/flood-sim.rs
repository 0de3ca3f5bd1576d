use flood_sim::cli::{self, Command, FormatArg};
use flood_sim::config;
use flood_sim::engine;
use flood_sim::error::Result;
use flood_sim::output::{self, Formatter, HumanFormatter, JsonFormatter, SummaryFormatter};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args()?;
    match args.command {
        Command::Run(run_args) => {
            let config = config::build_config(&run_args.config)?;
            let result = engine::run_simulation(&config)?;
            let formatter = formatter_for(run_args.format);
            print!("{}", formatter.write(&result));
        }
        Command::ShowConfig(config_args) => {
            let config = config::build_config(&config_args)?;
            print!("{}", output::render_config(&config)?);
        }
    }
    Ok(())
}

fn formatter_for(format: FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
    }
}
