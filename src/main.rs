mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let module = markrun::demo::module();

    let result = match cli.command {
        Some(Commands::Run(args)) => cli::run(module, args),
        Some(Commands::List { config }) => cli::list(module, config),
        None => cli::run(module, cli.run),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
