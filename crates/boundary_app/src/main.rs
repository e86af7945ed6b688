use std::process::ExitCode;

use boundary_app::cli::CliArgs;
use boundary_app::run::run;
use boundary_logging::boundary_error;
use clap::Parser;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    boundary_logging::initialize(args.log, args.log_level());

    match run(&args) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            boundary_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
