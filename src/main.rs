//! INDIGO Generator - driver definition compiler
//!
//! # Usage
//!
//! ```bash
//! indigo_generator [-v|--verbose] [-c|--create] indigo_aux_upb.driver
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indigo_generator::{logging, Command};

/// Compile INDIGO driver definitions into C sources and back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace every parsed attribute and block
    #[arg(short, long)]
    verbose: bool,

    /// Create a new definition from an existing generated source file
    #[arg(short, long)]
    create: bool,

    /// Path to the driver definition (.driver) or generated source file
    #[arg(value_name = "DEFINITION_FILE")]
    definition_file: PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // help and version included
            e.print().ok();
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(args.verbose);

    let result = Command::resolve(&args.definition_file, args.create).and_then(|command| {
        log::debug!("{:?}", command);
        command.run()
    });
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", args.definition_file.display(), e);
            ExitCode::FAILURE
        }
    }
}
