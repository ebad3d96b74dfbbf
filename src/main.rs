// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use pose_animation::cli::args::{Cli, Commands};
use pose_animation::cli::commands::{run_convert, run_encode, run_extract};
use pose_animation::cli::logging::set_verbose;
use pose_animation::error;

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Extract(args) => {
            set_verbose(args.verbose);
            run_extract(args)
        }
        Commands::Encode(args) => {
            set_verbose(args.verbose);
            run_encode(args)
        }
        Commands::Convert(args) => {
            set_verbose(args.verbose);
            run_convert(args)
        }
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
