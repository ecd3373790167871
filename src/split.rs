// RIPTIDE SPLIT POLICY
// PURE-RUST MODULE: ZERO OS DEPENDENCIES
// SHARED BETWEEN BINARY CRATE (splitter.rs, cli) AND LIB CRATE (tests)
//
// THE POLICY COUPLES THREE PIECES:
//   MODE MACHINE: COARSE OPERATING REGIME OVER THE INTERCONNECT.
//                 HYSTERESIS ON THE LATENCY DELTA PREVENTS OSCILLATION
//                 AT THE CONGESTION BOUNDARY.
//   OPTIMIZER:    CACHE FRACTION FROM THE MEASURED BANDWIDTH SURFACE.
//   WINDOW PLAN:  QUOTA + REPEATING PATTERN THAT REALIZES THE FRACTION
//                 OVER 100 REQUESTS WITH LOW JITTER.

// --- RATIO SCALE ---

pub const SPLIT_SCALE: u64 = 10_000;  // RATIO UNIT: HUNDREDTHS OF A PERCENT
pub const WINDOW_SIZE: u64 = 100;     // DISPATCH PLAN SPANS 100 REQUESTS
pub const MAX_PATTERN: u64 = 10;      // REPEATING PATTERN LENGTH CAP

// --- CONTROL INTERVALS ---

pub const MONITOR_INTERVAL_MS: u64 = 100;   // SAMPLE + MODE STEP + OPTIMIZE
pub const LOG_INTERVAL_MS: u64 = 1_000;     // ONE STATUS LINE PER SECOND

// --- MODE THRESHOLDS ---
// ENTER/EXIT SEPARATION ON THE LATENCY DELTA (70 VS 50 PERMIL) IS THE
// DEAD ZONE THAT KEEPS STABLE<->CONGESTION FROM THRASHING.

pub const RDMA_LOW: u64 = 100;    // WITH IOPS_LOW: LINK CONSIDERED IDLE
pub const IOPS_LOW: u64 = 1_000;
pub const LAT_CONG: u64 = 70;     // PERMIL LATENCY INCREASE: ENTER CONGESTION
pub const LAT_REC: u64 = 50;      // PERMIL LATENCY INCREASE: LEAVE CONGESTION
pub const BW_CONG: u64 = 90;      // RESERVED: NOT CONSULTED BY THE MODE MACHINE
pub const BW_REC: u64 = 70;       // RESERVED: NOT CONSULTED BY THE MODE MACHINE

// --- OPERATING POINT DEFAULTS ---

pub const IO_DEPTH: u64 = 16;
pub const NUM_JOBS: u64 = 1;

// RESERVED: NO FAILURE SIGNAL IS WIRED UP. THE Failure ARM STAYS
// REACHABLE THROUGH step() FOR WHEN THE CACHE ENGINE GROWS ONE.
pub const CACHING_FAILED: bool = false;

// --- OPERATING POINT ---

#[derive(Clone, Copy, Debug)]
pub struct SplitConfig {
    pub io_depth: u64,
    pub numjobs: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            io_depth: IO_DEPTH,
            numjobs: NUM_JOBS,
        }
    }
}

// --- MODE ---

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Idle = 0,
    Warmup = 1,
    Stable = 2,
    Congestion = 3,
    Failure = 4,
}

impl Mode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Warmup,
            2 => Self::Stable,
            3 => Self::Congestion,
            _ => Self::Failure,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Warmup => "WARMUP",
            Self::Stable => "STABLE",
            Self::Congestion => "CONGESTION",
            Self::Failure => "FAILURE",
        }
    }
}

// --- TICK INPUT ---
// ONE MONITOR TICK'S VIEW OF THE LINK: RAW SAMPLE VALUES PLUS THE
// DERIVED DELTAS AGAINST THE BEST-EVER BASELINES.

#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    pub rdma_bw: u64,
    pub iops: u64,
    pub bw_drop_permil: u64,
    pub lat_increase_permil: u64,
    pub window_full: bool,
    pub caching_failed: bool,
}

// --- MODE MACHINE ---

#[derive(Clone, Copy, Debug)]
pub struct ModeState {
    pub mode: Mode,
    // RATIO ALREADY FORCED TO FULL CACHE FOR THE CURRENT IDLE SPELL.
    // CLEARED WHEN TRAFFIC PROMOTES US TO WARMUP.
    pub idle_applied: bool,
    // STABLE COMPUTES THE RATIO ONCE PER ENTRY, THEN FREEZES IT.
    pub stable_calc_done: bool,
}

impl ModeState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            idle_applied: false,
            stable_calc_done: false,
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}

// WHAT THE CONTROL PATH SHOULD DO WITH THE RATIO AFTER THIS TICK.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RatioAction {
    Hold,
    ForceFullCache,
    Recompute {
        bw_drop_permil: u64,
        lat_increase_permil: u64,
    },
}

// ONE MODE-MACHINE STEP: TRANSITION, THEN THE NEW MODE'S ACTION.
// LOW TRAFFIC DRAGS ANY MODE BACK TO IDLE; THE FAILURE LATCH HOLDS
// EVERY NON-IDLE MODE.
pub fn step(st: &mut ModeState, s: &TickStats) -> RatioAction {
    let idle_traffic = s.rdma_bw <= RDMA_LOW && s.iops <= IOPS_LOW;

    let next = if idle_traffic {
        Mode::Idle
    } else if s.caching_failed && st.mode != Mode::Idle {
        Mode::Failure
    } else {
        match st.mode {
            // TRAFFIC ABOVE EITHER THRESHOLD
            Mode::Idle => Mode::Warmup,
            Mode::Warmup => {
                if s.window_full {
                    Mode::Stable
                } else {
                    Mode::Warmup
                }
            }
            Mode::Stable => {
                if s.lat_increase_permil > LAT_CONG {
                    Mode::Congestion
                } else {
                    Mode::Stable
                }
            }
            Mode::Congestion => {
                if s.lat_increase_permil < LAT_REC {
                    Mode::Stable
                } else {
                    Mode::Congestion
                }
            }
            Mode::Failure => Mode::Failure,
        }
    };

    if next != st.mode {
        match (st.mode, next) {
            (Mode::Idle, Mode::Warmup) => st.idle_applied = false,
            (Mode::Warmup, Mode::Stable) => st.stable_calc_done = false,
            (Mode::Stable, Mode::Congestion) => st.stable_calc_done = true,
            (Mode::Congestion, Mode::Stable) => st.stable_calc_done = false,
            _ => {}
        }
        st.mode = next;
    }

    match st.mode {
        Mode::Idle => {
            if !st.idle_applied {
                st.idle_applied = true;
                RatioAction::ForceFullCache
            } else {
                RatioAction::Hold
            }
        }
        // NO-CONTENTION ASSUMPTION WHILE THE WINDOWS FILL
        Mode::Warmup => RatioAction::Recompute {
            bw_drop_permil: 0,
            lat_increase_permil: 0,
        },
        Mode::Stable => {
            if !st.stable_calc_done && s.window_full {
                st.stable_calc_done = true;
                RatioAction::Recompute {
                    bw_drop_permil: s.bw_drop_permil,
                    lat_increase_permil: s.lat_increase_permil,
                }
            } else {
                RatioAction::Hold
            }
        }
        Mode::Congestion => {
            if s.window_full {
                RatioAction::Recompute {
                    bw_drop_permil: s.bw_drop_permil,
                    lat_increase_permil: s.lat_increase_permil,
                }
            } else {
                RatioAction::Hold
            }
        }
        Mode::Failure => RatioAction::Hold,
    }
}

// --- DERIVED METRICS ---
// PERMIL DELTAS AGAINST THE BEST-EVER BASELINES. EVERY DIVISION IS
// GUARDED, EVERY SUBTRACTION SATURATES.

pub fn bw_drop_permil(max_bw_avg: u64, bw_avg: u64) -> u64 {
    if max_bw_avg == 0 {
        return 0;
    }
    max_bw_avg.saturating_sub(bw_avg) * 1000 / max_bw_avg
}

pub fn lat_increase_permil(min_lat_avg: u64, established: bool, lat_avg: u64) -> u64 {
    if !established || min_lat_avg == 0 || min_lat_avg == u64::MAX {
        return 0;
    }
    lat_avg.saturating_sub(min_lat_avg) * 1000 / min_lat_avg
}

// --- RATIO OPTIMIZER ---
// A = CACHE-ONLY IOPS, B = BACKEND-ONLY IOPS FROM THE TABLE.
// UNDER CONGESTION THE BACKEND CONTRIBUTION IS DISCOUNTED BY THE
// OBSERVED BANDWIDTH DROP BEFORE SPLITTING PROPORTIONALLY.
pub fn optimal_ratio(
    cache_iops: u64,
    backend_iops: u64,
    bw_drop_permil: u64,
    lat_increase_permil: u64,
) -> u64 {
    let mut backend = backend_iops;
    if lat_increase_permil > LAT_CONG {
        backend = backend * (1000u64.saturating_sub(bw_drop_permil.min(1000))) / 1000;
    }
    let denom = cache_iops + backend;
    if denom == 0 {
        // EMPTY OR UNMEASURED OPERATING POINT: EVERYTHING TO CACHE
        return SPLIT_SCALE;
    }
    (cache_iops * SPLIT_SCALE / denom).min(SPLIT_SCALE)
}

// --- WINDOW PLAN ---

// gcd(0, 0) IS DEFINED AS 1 SO A DEGENERATE PLAN STILL HAS SIZE >= 1.
pub fn gcd(a: u64, b: u64) -> u64 {
    if a == 0 && b == 0 {
        return 1;
    }
    let (mut x, mut y) = (a, b);
    while y != 0 {
        let r = x % y;
        x = y;
        y = r;
    }
    x
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WindowPlan {
    pub cache_quota: u64,
    pub backend_quota: u64,
    pub pattern_size: u64,
    pub pattern_cache: u64,
    pub pattern_backend: u64,
}

// QUOTAS AND REPEATING PATTERN FOR ONE 100-REQUEST WINDOW AT THE
// GIVEN RATIO. pattern_size IS ALWAYS IN [1, MAX_PATTERN].
pub fn plan_window(ratio: u64) -> WindowPlan {
    let p = ratio.min(SPLIT_SCALE) / 100;
    let a = p;
    let b = WINDOW_SIZE - p;
    let g = gcd(a, b);
    let pattern_size = ((a + b) / g).min(MAX_PATTERN);
    let pattern_cache = a * pattern_size / WINDOW_SIZE;
    WindowPlan {
        cache_quota: a,
        backend_quota: b,
        pattern_size,
        pattern_cache,
        pattern_backend: pattern_size - pattern_cache,
    }
}
