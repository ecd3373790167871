// RIPTIDE TABLE INSPECTION
// LOADS A BANDWIDTH TABLE, PRINTS THE CURVE AT ONE OPERATING POINT,
// AND SHOWS THE RATIO THE OPTIMIZER DERIVES FROM IT -- CLEAN LINK
// AND A CONGESTED ONE SIDE BY SIDE.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use riptide::split;
use riptide::table::BandwidthTable;

#[derive(Parser)]
pub struct TableArgs {
    /// Bandwidth table file (builtin curve when omitted)
    #[arg(long)]
    pub path: Option<PathBuf>,

    #[arg(long, default_value_t = split::IO_DEPTH)]
    pub io_depth: u64,

    #[arg(long, default_value_t = split::NUM_JOBS)]
    pub numjobs: u64,
}

pub fn run_table(args: TableArgs) -> Result<()> {
    let table = match &args.path {
        Some(path) => BandwidthTable::load(path)?,
        None => BandwidthTable::builtin(),
    };
    if table.is_empty() {
        bail!("TABLE IS EMPTY");
    }

    println!(
        "BANDWIDTH CURVE AT io_depth={} numjobs={} ({} rows total)",
        args.io_depth,
        args.numjobs,
        table.len()
    );
    println!();
    println!("{:<10} {:>12}", "SPLIT_PCT", "IOPS");
    println!("{}", "-".repeat(23));

    let mut max_iops = 1u64;
    for pct in (0..=100).step_by(10) {
        let iops = table.lookup_bw(args.io_depth, args.numjobs, pct);
        max_iops = max_iops.max(iops);
    }
    for pct in (0..=100).step_by(10) {
        let iops = table.lookup_bw(args.io_depth, args.numjobs, pct);
        let bar_len = (iops * 40 / max_iops) as usize;
        println!("{:<10} {:>12}  {}", pct, iops, "#".repeat(bar_len));
    }
    println!();

    let cache_iops = table.lookup_bw(args.io_depth, args.numjobs, 100);
    let backend_iops = table.lookup_bw(args.io_depth, args.numjobs, 0);

    if cache_iops == 0 && backend_iops == 0 {
        bail!(
            "NO ROWS FOR OPERATING POINT io_depth={} numjobs={}",
            args.io_depth,
            args.numjobs
        );
    }

    let clean = split::optimal_ratio(cache_iops, backend_iops, 0, 0);
    // 300 PERMIL DROP / 100 PERMIL LATENCY INCREASE: A TYPICAL
    // CONGESTION SPELL ON THE INTERCONNECT
    let congested = split::optimal_ratio(cache_iops, backend_iops, 300, 100);

    println!("CACHE-ONLY IOPS:    {}", cache_iops);
    println!("BACKEND-ONLY IOPS:  {}", backend_iops);
    println!("OPTIMAL RATIO:      {} ({}% TO CACHE)", clean, clean / 100);
    println!("UNDER CONGESTION:   {} ({}% TO CACHE)", congested, congested / 100);

    Ok(())
}
