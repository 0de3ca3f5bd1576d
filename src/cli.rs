use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Parser, Debug)]
#[command(
    name = "flood-sim",
    version,
    about = "Discrete-event simulation of a server cluster under legitimate and flood traffic"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation and print the outcome.
    Run(RunArgs),
    /// Print the resolved configuration without running.
    ShowConfig(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML or JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub servers: Option<usize>,
    /// Simulated seconds.
    #[arg(long)]
    pub duration: Option<f64>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub legit_clients: Option<usize>,
    #[arg(long)]
    pub bot_clients: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    pub format: FormatArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Human,
    Summary,
    Json,
}

pub fn parse_args() -> Result<Cli> {
    Cli::try_parse().map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => Error::Cli(err.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_overrides_and_format() {
        let cli = Cli::try_parse_from([
            "flood-sim",
            "run",
            "--servers",
            "3",
            "--duration",
            "15",
            "--seed",
            "9",
            "--bot-clients",
            "0",
            "--format",
            "summary",
        ])
        .unwrap();

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config.servers, Some(3));
                assert_eq!(args.config.duration, Some(15.0));
                assert_eq!(args.config.seed, Some(9));
                assert_eq!(args.config.bot_clients, Some(0));
                assert_eq!(args.config.legit_clients, None);
                assert_eq!(args.format, FormatArg::Summary);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn run_defaults_to_human_output() {
        let cli = Cli::try_parse_from(["flood-sim", "run"]).unwrap();
        match cli.command {
            Command::Run(args) => assert_eq!(args.format, FormatArg::Human),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = Cli::try_parse_from(["flood-sim", "run", "--format", "csv"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn show_config_takes_config_path() {
        let cli =
            Cli::try_parse_from(["flood-sim", "show-config", "--config", "sim.toml"]).unwrap();
        match cli.command {
            Command::ShowConfig(args) => {
                assert_eq!(args.config, Some(PathBuf::from("sim.toml")))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
