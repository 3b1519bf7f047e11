//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Consolidate raw capture files into hourly archives
    Combine {
        /// Directory the streaming script writes raw npz captures to
        #[clap(short, long)]
        input_directory: PathBuf,
        /// Root of the hourly archive tree
        #[clap(short, long, default_value = "/dev/shm")]
        output_directory: PathBuf,
        /// Remove each capture file once it has merged successfully
        #[clap(short, long)]
        delete_files: bool,
        /// Report planned writes without touching the archives
        #[clap(short = 'n', long)]
        dry_run: bool,
        /// Worker threads; distinct hours merge in parallel
        #[clap(short = 'j', long, default_value_t = 4)]
        workers: usize,
    },
    /// Resample hourly archives onto the gap-free nominal grid
    Fill {
        /// Archive files, or directories to walk for archives
        #[clap(required = true)]
        inputs: Vec<PathBuf>,
        /// Nominal sample rate of the output grid in Hz
        #[clap(short, long, default_value_t = crate::NOMINAL_RATE_HZ)]
        rate: f64,
        /// Report planned writes without performing them
        #[clap(short = 'n', long)]
        dry_run: bool,
    },
    /// Print what one or more npz files contain
    Inspect {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_args_parse() {
        let args = Args::parse_from([
            "hour_stacker",
            "combine",
            "-i",
            "/data/raw",
            "-o",
            "/data/Doppler",
            "--delete-files",
            "-n",
        ]);
        match args.command {
            Command::Combine {
                input_directory,
                output_directory,
                delete_files,
                dry_run,
                workers,
            } => {
                assert_eq!(input_directory, PathBuf::from("/data/raw"));
                assert_eq!(output_directory, PathBuf::from("/data/Doppler"));
                assert!(delete_files);
                assert!(dry_run);
                assert_eq!(workers, 4);
            }
            _ => panic!("expected the combine subcommand"),
        }
    }

    #[test]
    fn fill_defaults_to_the_nominal_rate() {
        let args = Args::parse_from(["hour_stacker", "fill", "archive.npz"]);
        match args.command {
            Command::Fill { rate, dry_run, .. } => {
                assert_eq!(rate, crate::NOMINAL_RATE_HZ);
                assert!(!dry_run);
            }
            _ => panic!("expected the fill subcommand"),
        }
    }
}
