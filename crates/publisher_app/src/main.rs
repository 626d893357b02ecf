mod app;
mod persistence;
mod render;
mod session;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use publisher_logging::{publish_error, LevelFilter, LogDestination};

use settings::AppSettings;

#[derive(Parser)]
#[command(name = "publisher")]
#[command(about = "Package a web build, upload it and wait until it is live")]
struct Cli {
    #[arg(long, global = true, help = "RON settings file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "file", help = "Where log output goes")]
    log: LogTarget,

    #[arg(long, short = 'v', global = true, help = "Log at debug level")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Archive, upload and publish a build directory
    Publish {
        #[arg(help = "Build output directory")]
        dir: PathBuf,
        #[arg(long, default_value = "", help = "Title shown on the published page")]
        title: String,
    },
    /// Wait until a session token is available
    Login,
    /// Show the state of the last run
    Status,
    /// Forget the last run, keeping the build location
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogTarget {
    File,
    Terminal,
    Both,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            publish_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = match &cli.config {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match cli.log {
        LogTarget::File => LogDestination::File(settings.log_file.clone()),
        LogTarget::Terminal => LogDestination::Terminal,
        LogTarget::Both => LogDestination::Both(settings.log_file.clone()),
    };
    publisher_logging::initialize(destination, level);

    match cli.command {
        Command::Publish { dir, title } => app::publish(settings, dir, title),
        Command::Login => app::login(settings),
        Command::Status => Ok(app::status(&settings)),
        Command::Reset => app::reset(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_publish_command() {
        let cli = Cli::try_parse_from(["publisher", "publish", "builds/demo", "--title", "Demo"])
            .unwrap();
        match cli.command {
            Command::Publish { dir, title } => {
                assert_eq!(dir, PathBuf::from("builds/demo"));
                assert_eq!(title, "Demo");
            }
            _ => panic!("expected publish"),
        }
        assert_eq!(cli.log, LogTarget::File);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["publisher", "status", "--log", "both", "-v"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.log, LogTarget::Both);
        assert!(cli.verbose);
    }
}
