use anyhow::Context;
use catalog_migrator::cli::Args;
use catalog_migrator::commands;
use clap::{CommandFactory, Parser};
use std::process;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // No subcommand: print usage and exit cleanly
    if args.command.is_none() {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    // CTRL+C is handled inside the command so the store is released first
    let result = runtime.block_on(commands::run(args));

    if let Err(error) = result {
        eprintln!("Error: {}", error.format_detailed());
        process::exit(1);
    }
    Ok(())
}
