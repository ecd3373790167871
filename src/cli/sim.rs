// RIPTIDE SYNTHETIC WORKLOAD
// DRIVES THE SPLITTER THROUGH A SCRIPTED LINK PROFILE:
//   WARMUP RAMP -> STABLE PLATEAU -> CONGESTION SPELL -> RECOVERY
// SUBMITTER THREADS ISSUE DISPATCH CALLS; THE MAIN THREAD PRINTS ONE
// DISPATCH-SIDE DELTA LINE PER SECOND NEXT TO THE SPLITTER'S OWN
// CONTROL-PATH LINE.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use riptide::split::SplitConfig;
use riptide::splitter::{PerfSample, PerfSource, Request, SplitStats, Splitter};
use riptide::table::BandwidthTable;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
pub struct RunArgs {
    /// Submitter threads issuing requests
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Run duration in seconds
    #[arg(long, default_value_t = 30)]
    pub duration_secs: u64,

    /// Bandwidth table file (builtin curve when omitted)
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Misses per 1000 requests
    #[arg(long, default_value_t = 100)]
    pub miss_permil: u64,

    #[arg(long, default_value_t = 16)]
    pub io_depth: u64,

    #[arg(long, default_value_t = 1)]
    pub numjobs: u64,

    /// Verbose control-path logging
    #[arg(long)]
    pub debug: bool,

    /// Dump the tick log after the run
    #[arg(long)]
    pub dump_log: bool,
}

// --- SCRIPTED LINK ---
// PHASE BOUNDARIES ARE FRACTIONS OF THE RUN. JITTER COMES FROM A
// BARE LCG SO RUNS ARE REPRODUCIBLE.

const BASE_BW: u64 = 10_000;        // MB/S ON THE UNCONGESTED LINK
const BASE_LAT_NS: u64 = 500_000;
const BASE_IOPS: u64 = 200_000;
const CONG_BW: u64 = 6_000;         // CONGESTION: BW DOWN ~40%
const CONG_LAT_NS: u64 = 1_000_000; // CONGESTION: LATENCY DOUBLES

struct ScriptedLink {
    t_ms: u64,
    duration_ms: u64,
    seed: u64,
}

impl ScriptedLink {
    fn new(duration_ms: u64) -> Self {
        Self {
            t_ms: 0,
            duration_ms,
            seed: 0x5eed_cafe_f00d_d00d,
        }
    }

    // +/- ~2% JITTER
    fn jitter(&mut self, v: u64) -> u64 {
        self.seed = self
            .seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let wiggle = (self.seed >> 33) % 41; // 0..=40
        v * (980 + wiggle) / 1000
    }
}

impl PerfSource for ScriptedLink {
    fn measure_performance(&mut self, elapsed_ms: u64) -> PerfSample {
        self.t_ms += elapsed_ms;
        let pct = if self.duration_ms > 0 {
            (self.t_ms * 100 / self.duration_ms).min(100)
        } else {
            100
        };

        let (bw, lat, iops) = match pct {
            // RAMP FROM A COLD LINK
            0..=19 => {
                let ramp = (pct + 1) * 5; // 5%..100%
                (BASE_BW * ramp / 100, BASE_LAT_NS, BASE_IOPS * ramp / 100)
            }
            20..=49 => (BASE_BW, BASE_LAT_NS, BASE_IOPS),
            50..=74 => (CONG_BW, CONG_LAT_NS, BASE_IOPS * 6 / 10),
            _ => (BASE_BW, BASE_LAT_NS, BASE_IOPS),
        };

        PerfSample {
            rdma_bw: self.jitter(bw),
            rdma_lat_ns: self.jitter(lat),
            iops: self.jitter(iops),
        }
    }
}

// --- SUBMITTERS ---

struct SimRequest {
    miss: bool,
}

impl Request for SimRequest {
    fn is_miss(&self) -> bool {
        self.miss
    }
}

fn submitter(splitter: &Splitter, miss_permil: u64) {
    let mut n: u64 = 0;
    while !SHUTDOWN.load(Ordering::Relaxed) {
        let req = SimRequest {
            miss: miss_permil > 0 && n % 1000 < miss_permil,
        };
        let _ = splitter.should_send_to_backend(&req);
        n += 1;

        // KEEP THE AGGREGATE RATE IN THE TENS OF THOUSANDS PER SECOND
        if n % 64 == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

// --- RUN ---

pub fn run_sim(args: RunArgs) -> Result<()> {
    ctrlc::set_handler(move || {
        SHUTDOWN.store(true, Ordering::Relaxed);
    })?;

    riptide::set_debug(args.debug as u8);

    let table = match &args.table {
        Some(path) => BandwidthTable::load(path)?,
        None => BandwidthTable::builtin(),
    };

    let config = SplitConfig {
        io_depth: args.io_depth,
        numjobs: args.numjobs,
    };

    println!("RIPTIDE v0.7");
    println!("THREADS:         {}", args.threads);
    println!("DURATION:        {}s", args.duration_secs);
    println!(
        "TABLE:           {} ({} rows)",
        args.table
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "builtin".into()),
        table.len()
    );
    println!("OPERATING POINT: io_depth={} numjobs={}", args.io_depth, args.numjobs);
    println!("MISS RATE:       {}/1000", args.miss_permil);
    println!();

    let splitter = riptide::init(config, table, Box::new(ScriptedLink::new(args.duration_secs * 1_000)));

    println!("RIPTIDE IS ACTIVE (CTRL+C TO EXIT)");

    let mut handles = Vec::with_capacity(args.threads);
    for _ in 0..args.threads {
        let miss_permil = args.miss_permil;
        handles.push(thread::spawn(move || submitter(splitter, miss_permil)));
    }

    let mut prev = SplitStats::default();
    for _ in 0..args.duration_secs {
        if SHUTDOWN.load(Ordering::Relaxed) {
            break;
        }
        thread::sleep(Duration::from_secs(1));

        let stats = splitter.stats();
        let d_cache = stats.cache.wrapping_sub(prev.cache);
        let d_backend = stats.backend.wrapping_sub(prev.backend);
        let d_miss = stats.miss.wrapping_sub(prev.miss);
        let total = d_cache + d_backend;
        let cache_pct = if total > 0 { d_cache * 100 / total } else { 0 };

        println!(
            "req/s: {:<8} cache: {:<8} backend: {:<8} miss: {:<6} split: {}% ratio: {:<5} [{}]",
            total + d_miss,
            d_cache,
            d_backend,
            d_miss,
            cache_pct,
            splitter.ratio(),
            splitter.mode().label(),
        );

        prev = stats;
    }

    SHUTDOWN.store(true, Ordering::Relaxed);
    for h in handles {
        let _ = h.join();
    }

    println!("RIPTIDE IS SHUTTING DOWN");

    if args.dump_log {
        splitter.dump_log();
    }
    splitter.log_summary();

    let stats = splitter.stats();
    let served = stats.cache + stats.backend;
    println!();
    println!("TOTAL DISPATCHES:  {}", served + stats.miss);
    println!("  CACHE:           {}", stats.cache);
    println!("  BACKEND:         {}", stats.backend);
    println!("  MISS BYPASS:     {}", stats.miss);
    if served > 0 {
        println!("  REALIZED SPLIT:  {}%", stats.cache * 100 / served);
    }
    println!("RIPTIDE OUT.");

    Ok(())
}
