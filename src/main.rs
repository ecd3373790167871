// RIPTIDE v0.7 -- ADAPTIVE HYBRID-CACHE REQUEST SPLITTER
// THE LIBRARY CRATE IS THE PRODUCT; THE HOST CACHE ENGINE LINKS IT.
// THIS BINARY DRIVES THE SPLITTER AGAINST A SYNTHETIC LINK FOR
// TUNING, DEMO RUNS, AND TABLE INSPECTION.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "riptide")]
#[command(about = "RIPTIDE -- ADAPTIVE HYBRID-CACHE REQUEST SPLITTER")]
struct Cli {
    #[command(subcommand)]
    command: Option<SubCmd>,
}

#[derive(Subcommand)]
enum SubCmd {
    /// Drive the splitter with a synthetic phased workload
    Run(cli::sim::RunArgs),

    /// Load a bandwidth table and show what the optimizer makes of it
    Table(cli::table::TableArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(SubCmd::Run(_)) => {
            let args = match cli.command {
                Some(SubCmd::Run(a)) => a,
                _ => cli::sim::RunArgs {
                    threads: 4,
                    duration_secs: 30,
                    table: None,
                    miss_permil: 100,
                    io_depth: 16,
                    numjobs: 1,
                    debug: false,
                    dump_log: false,
                },
            };
            cli::sim::run_sim(args)
        }
        Some(SubCmd::Table(args)) => cli::table::run_table(args),
    }
}
