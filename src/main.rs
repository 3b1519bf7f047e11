use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use hour_stacker::args::{convert_filter, Args, Command};
use hour_stacker::batch::{self, CombineConfig, FillConfig};
use hour_stacker::store;
use hour_stacker::StackerError;
use tracing::{info, warn};

fn main() -> Result<(), StackerError> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    // Ctrl-c stops submission of new work; in-flight merges run to
    // completion so no archive is left half-written.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            warn!("interrupt received, finishing in-flight work");
            stop.store(true, Ordering::Relaxed);
        })
        .expect("installing the ctrl-c handler");
    }

    match args.command {
        Command::Combine {
            input_directory,
            output_directory,
            delete_files,
            dry_run,
            workers,
        } => {
            let cfg = CombineConfig {
                input_dir: input_directory,
                output_root: output_directory,
                delete_inputs: delete_files,
                dry_run,
                workers,
            };
            let report = batch::combine_directory(&cfg, &stop)?;
            info!(
                "{} capture files processed: {} hour merges, {} unchanged, {} failed",
                report.processed,
                report.merged,
                report.unchanged,
                report.failures.len()
            );
        }
        Command::Fill {
            inputs,
            rate,
            dry_run,
        } => {
            let cfg = FillConfig { rate, dry_run };
            let report = batch::fill_paths(&inputs, &cfg, &stop)?;
            info!(
                "{} archives processed: {} gap-filled, {} failed",
                report.processed,
                report.written,
                report.failures.len()
            );
        }
        Command::Inspect { files } => {
            for file in files {
                match store::summarize(&file) {
                    Ok(summary) => println!("{}\n{}", file.display(), summary),
                    Err(err) => println!("{}\n\t{}", file.display(), err),
                }
            }
        }
    }
    Ok(())
}
