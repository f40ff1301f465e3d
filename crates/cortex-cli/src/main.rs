//! `cortex` — harness CLI driving one CORTEX benchmark run.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Benchmarking substrate for streaming signal-processing kernels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Execute one benchmark run against a kernel, in-process or over the
    /// device adapter protocol.
    Run(commands::run::RunArgs),
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
