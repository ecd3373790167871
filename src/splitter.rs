// RIPTIDE SPLITTER
// OWNS ALL SPLITTER STATE BEHIND ONE OBJECT: ATOMIC RATIO WORD,
// CONTROL-PATH MUTEX, DISPATCH-PATH MUTEX.
//
// TWO PATHS, ONE LOCK EACH:
//   DISPATCH PATH: EVERY REQUEST. ATOMIC RATIO LOAD + CONSTANT-TIME
//                  CRITICAL SECTION. NO ALLOCATION, NO I/O.
//   CONTROL PATH:  AT MOST 10HZ, PIGGYBACKED ON DISPATCH CALLS.
//                  SAMPLE, WINDOWS, MODE MACHINE, OPTIMIZER, COMMIT.
//
// THERE IS NO TIMER THREAD. NO REQUESTS MEANS NO RETUNING, WHICH IS
// FINE: THE SYSTEM IS DRIVEN BY I/O LOAD.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::dispatch::DispatchState;
use crate::event::{Snapshot, TickLog};
use crate::split::{
    self, Mode, ModeState, RatioAction, SplitConfig, TickStats, LOG_INTERVAL_MS,
    MONITOR_INTERVAL_MS, SPLIT_SCALE,
};
use crate::table::BandwidthTable;
use crate::window::{LatencyWindow, ThroughputWindow};
use crate::{log_debug, log_info, log_warn};

// --- COLLABORATOR SEAMS ---

// MONOTONIC MILLISECOND SOURCE. WALL-CLOCK JUMPS MUST NOT REACH THE
// INTERVAL CHECKS.
pub trait Clock: Send + Sync {
    fn monotonic_ms(&self) -> u64;
}

pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn monotonic_ms(&self) -> u64 {
        let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        (ts.tv_sec as u64) * 1_000 + (ts.tv_nsec as u64) / 1_000_000
    }
}

// RAW LINK TELEMETRY FOR ONE MONITOR INTERVAL. lat == 0 MEANS NO
// VALID LATENCY YET.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerfSample {
    pub rdma_bw: u64,
    pub rdma_lat_ns: u64,
    pub iops: u64,
}

pub trait PerfSource: Send {
    fn measure_performance(&mut self, elapsed_ms: u64) -> PerfSample;
}

// OPAQUE REQUEST HANDLE. THE HOST'S HIT/MISS CLASSIFIER ANSWERS HERE.
pub trait Request {
    fn is_miss(&self) -> bool;
}

// --- STATS ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub cache: u64,
    pub backend: u64,
    pub miss: u64,
}

// --- CONTROL STATE ---
// EVERYTHING THE 10HZ PATH MUTATES LIVES UNDER ONE LOCK. UPDATES ARE
// INFREQUENT; FINE-GRAINED LOCKING WOULD BUY NOTHING HERE.

struct Control {
    sampler: Box<dyn PerfSource>,
    bw: ThroughputWindow,
    lat: LatencyWindow,
    mode: ModeState,
    log: TickLog,
    last_stats: TickStats,
}

impl Control {
    fn new(sampler: Box<dyn PerfSource>) -> Self {
        Self {
            sampler,
            bw: ThroughputWindow::new(),
            lat: LatencyWindow::new(),
            mode: ModeState::new(),
            log: TickLog::new(),
            last_stats: TickStats::default(),
        }
    }
}

// --- SPLITTER ---

pub struct Splitter {
    config: SplitConfig,
    table: BandwidthTable,
    clock: Box<dyn Clock>,

    // RATIO STORE: ONE WORD, RELAXED LOAD PER DISPATCH, STORED ONLY
    // FROM THE CONTROL PATH. ALWAYS IN [0, SPLIT_SCALE].
    ratio: AtomicU64,
    // MODE MIRROR FOR LOCK-FREE OBSERVERS; AUTHORITATIVE COPY IS IN
    // Control.mode, WRITTEN ONLY UNDER THE CONTROL LOCK.
    mode: AtomicU8,

    // INTERVAL SHADOWS: READ LOCK-FREE AS THE FAST GATE, STORED ONLY
    // INSIDE THE CONTROL CRITICAL SECTION.
    last_monitor_ms: AtomicU64,
    last_log_ms: AtomicU64,

    nr_cache: AtomicU64,
    nr_backend: AtomicU64,
    nr_miss: AtomicU64,

    control: Mutex<Control>,
    dispatch: Mutex<DispatchState>,
}

impl Splitter {
    pub fn new(
        config: SplitConfig,
        table: BandwidthTable,
        sampler: Box<dyn PerfSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        if table.is_empty() {
            log_warn!("BANDWIDTH TABLE EMPTY -- RATIO STAYS AT FULL CACHE");
        }
        let now = clock.monotonic_ms();
        Self {
            config,
            table,
            clock,
            ratio: AtomicU64::new(SPLIT_SCALE),
            mode: AtomicU8::new(Mode::Idle as u8),
            last_monitor_ms: AtomicU64::new(now),
            last_log_ms: AtomicU64::new(now),
            nr_cache: AtomicU64::new(0),
            nr_backend: AtomicU64::new(0),
            nr_miss: AtomicU64::new(0),
            control: Mutex::new(Control::new(sampler)),
            dispatch: Mutex::new(DispatchState::new()),
        }
    }

    pub fn with_defaults(
        config: SplitConfig,
        table: BandwidthTable,
        sampler: Box<dyn PerfSource>,
    ) -> Self {
        Self::new(config, table, sampler, Box::new(MonotonicClock))
    }

    // --- DISPATCH PATH ---

    // ONE VERDICT PER REQUEST: TRUE SENDS IT TO THE BACKEND.
    // SAFE UNDER CONCURRENT CALLERS; NEVER FAILS, NEVER BLOCKS ON I/O.
    pub fn should_send_to_backend(&self, req: &dyn Request) -> bool {
        self.update_split_ratio();

        if req.is_miss() {
            // MISSES BYPASS TO THE BACKEND WITHOUT TOUCHING QUOTAS OR
            // PATTERN POSITION. TALLIED SEPARATELY.
            self.nr_miss.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        let ratio = self.ratio.load(Ordering::Relaxed);
        let to_backend = {
            let mut d = self
                .dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            d.decide(ratio)
        };

        if to_backend {
            self.nr_backend.fetch_add(1, Ordering::Relaxed);
        } else {
            self.nr_cache.fetch_add(1, Ordering::Relaxed);
        }
        to_backend
    }

    // --- CONTROL PATH ---

    // EDGE-TRIGGERED PERIODIC TICK. IDEMPOTENT WITHIN AN INTERVAL;
    // CONTENDED CALLS BAIL OUT AND LET THE HOLDER FINISH.
    pub fn update_split_ratio(&self) {
        let now = self.clock.monotonic_ms();
        let monitor_due =
            now.saturating_sub(self.last_monitor_ms.load(Ordering::Relaxed)) >= MONITOR_INTERVAL_MS;
        let log_due =
            now.saturating_sub(self.last_log_ms.load(Ordering::Relaxed)) >= LOG_INTERVAL_MS;
        if !monitor_due && !log_due {
            return;
        }

        let mut ctl = match self.control.try_lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };

        // RE-CHECK UNDER THE LOCK: A CONCURRENT TICK MAY HAVE RUN
        // BETWEEN THE GATE AND THE ACQUIRE.
        let last = self.last_monitor_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) >= MONITOR_INTERVAL_MS {
            self.monitor_tick(&mut ctl, now.saturating_sub(last));
            self.last_monitor_ms.store(now, Ordering::Relaxed);
        }

        let last_log = self.last_log_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last_log) >= LOG_INTERVAL_MS {
            self.log_tick(&mut ctl, now);
            self.last_log_ms.store(now, Ordering::Relaxed);
        }
    }

    fn monitor_tick(&self, ctl: &mut Control, elapsed_ms: u64) {
        let sample = ctl.sampler.measure_performance(elapsed_ms);
        ctl.bw.push(sample.rdma_bw);
        ctl.lat.push(sample.rdma_lat_ns);

        let stats = TickStats {
            rdma_bw: sample.rdma_bw,
            iops: sample.iops,
            bw_drop_permil: split::bw_drop_permil(ctl.bw.max_avg(), ctl.bw.average()),
            lat_increase_permil: split::lat_increase_permil(
                ctl.lat.min_avg(),
                ctl.lat.established(),
                ctl.lat.average(),
            ),
            window_full: ctl.bw.is_full(),
            caching_failed: split::CACHING_FAILED,
        };

        let prev_mode = ctl.mode.mode;
        let action = split::step(&mut ctl.mode, &stats);
        if ctl.mode.mode != prev_mode {
            self.mode.store(ctl.mode.mode as u8, Ordering::Relaxed);
            log_debug!("mode {} -> {}", prev_mode.label(), ctl.mode.mode.label());
        }

        match action {
            RatioAction::Hold => {}
            RatioAction::ForceFullCache => self.commit_ratio(SPLIT_SCALE),
            RatioAction::Recompute {
                bw_drop_permil,
                lat_increase_permil,
            } => {
                let cache_iops =
                    self.table
                        .lookup_bw(self.config.io_depth, self.config.numjobs, 100);
                let backend_iops =
                    self.table
                        .lookup_bw(self.config.io_depth, self.config.numjobs, 0);
                let r = split::optimal_ratio(
                    cache_iops,
                    backend_iops,
                    bw_drop_permil,
                    lat_increase_permil,
                );
                self.commit_ratio(r);
            }
        }

        ctl.last_stats = stats;
    }

    // STORE ONLY ON CHANGE: DISPATCHERS RE-PLAN AT THE NEXT WINDOW
    // BOUNDARY EITHER WAY, BUT A QUIET WORD KEEPS CACHE LINES COOL.
    fn commit_ratio(&self, r: u64) {
        let r = r.min(SPLIT_SCALE);
        if self.ratio.load(Ordering::Relaxed) != r {
            self.ratio.store(r, Ordering::Relaxed);
            log_debug!("ratio -> {}", r);
        }
    }

    fn log_tick(&self, ctl: &mut Control, now_ms: u64) {
        let s = ctl.last_stats;
        let ratio = self.ratio.load(Ordering::Relaxed);
        let stats = self.stats();

        log_info!(
            "bw: {:<8} lat: {:<9} iops: {:<8} drop: {:<4} incr: {:<4} ratio: {:<5} cache: {:<8} backend: {:<8} miss: {:<6} [{}]",
            ctl.bw.average(),
            ctl.lat.average(),
            s.iops,
            s.bw_drop_permil,
            s.lat_increase_permil,
            ratio,
            stats.cache,
            stats.backend,
            stats.miss,
            ctl.mode.mode.label(),
        );

        ctl.log.snapshot(Snapshot {
            ts_ms: now_ms,
            mode: ctl.mode.mode,
            ratio,
            bw_avg: ctl.bw.average(),
            lat_avg_ns: ctl.lat.average(),
            iops: s.iops,
            bw_drop_permil: s.bw_drop_permil,
            lat_increase_permil: s.lat_increase_permil,
        });
    }

    // --- RESET ---

    // BACK TO THE POST-init STATE. TAKES BOTH LOCKS, SO IT SERIALIZES
    // AGAINST IN-FLIGHT DISPATCH AND TICKS.
    pub fn reset(&self) {
        let mut ctl = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        let mut d = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);

        ctl.bw = ThroughputWindow::new();
        ctl.lat = LatencyWindow::new();
        ctl.mode = ModeState::new();
        ctl.log.clear();
        ctl.last_stats = TickStats::default();
        d.reset();

        self.ratio.store(SPLIT_SCALE, Ordering::Relaxed);
        self.mode.store(Mode::Idle as u8, Ordering::Relaxed);
        self.nr_cache.store(0, Ordering::Relaxed);
        self.nr_backend.store(0, Ordering::Relaxed);
        self.nr_miss.store(0, Ordering::Relaxed);

        let now = self.clock.monotonic_ms();
        self.last_monitor_ms.store(now, Ordering::Relaxed);
        self.last_log_ms.store(now, Ordering::Relaxed);
    }

    // --- OBSERVERS ---

    pub fn ratio(&self) -> u64 {
        self.ratio.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn stats(&self) -> SplitStats {
        SplitStats {
            cache: self.nr_cache.load(Ordering::Relaxed),
            backend: self.nr_backend.load(Ordering::Relaxed),
            miss: self.nr_miss.load(Ordering::Relaxed),
        }
    }

    pub fn last_tick(&self) -> TickStats {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_stats
    }

    pub fn dump_log(&self) {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .dump();
    }

    pub fn log_summary(&self) {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .summary();
    }
}
