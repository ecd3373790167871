// RIPTIDE -- ADAPTIVE REQUEST SPLITTER FOR HYBRID CACHE TIERS
// A FAST LOCAL CACHE DEVICE FRONTS A SLOWER RDMA-ATTACHED BACKEND.
// EVERY BLOCK REQUEST GETS A CACHE-OR-BACKEND VERDICT; A 10HZ CONTROL
// LOOP RETUNES THE SPLIT RATIO AS THE INTERCONNECT MOVES.
//
// THE SPLITTER IS ADVISORY: IT MOVES NO DATA. ITS WHOLE OUTPUT IS ONE
// BOOLEAN PER REQUEST PLUS A SHARED RATIO WORD.

pub mod dispatch;
pub mod event;
pub mod split;
pub mod splitter;
pub mod table;
pub mod window;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use split::SplitConfig;
use splitter::{PerfSource, Request, Splitter};
use table::BandwidthTable;

// --- LOGGING ---
// SINGLE-LINE SINK. DEBUG LINES ARE GATED BEFORE FORMATTING SO THE
// DISABLED CASE COSTS ONE RELAXED LOAD AND NOTHING ELSE.

static DEBUG_LEVEL: AtomicU8 = AtomicU8::new(0);

pub fn set_debug(level: u8) {
    DEBUG_LEVEL.store(level, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG_LEVEL.load(Ordering::Relaxed) > 0
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        println!("[riptide] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        eprintln!("[riptide] WARN {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::debug_enabled() {
            println!("[riptide] {}", format_args!($($arg)*))
        }
    };
}

// --- PROCESS-WIDE INSTANCE ---
// THE HOST CACHE ENGINE TALKS TO ONE SPLITTER PER PROCESS. THE TYPED
// API ON splitter::Splitter IS THE SAME THING WITHOUT THE SINGLETON.

static GLOBAL: OnceLock<Splitter> = OnceLock::new();

// INSTALL THE SPLITTER AND ZERO ITS STATE. THE FIRST CALL CONSUMES
// THE COLLABORATORS; LATER CALLS RESET THE EXISTING INSTANCE AND
// DISCARD THE NEW ONES.
pub fn init(
    config: SplitConfig,
    table: BandwidthTable,
    sampler: Box<dyn PerfSource>,
) -> &'static Splitter {
    match GLOBAL.get() {
        Some(s) => {
            s.reset();
            s
        }
        None => GLOBAL.get_or_init(|| Splitter::with_defaults(config, table, sampler)),
    }
}

pub fn global() -> Option<&'static Splitter> {
    GLOBAL.get()
}

// BEFORE init THE VERDICT IS ALWAYS CACHE: THE DEFAULT RATIO IS FULL
// CACHE AND NOTHING CAN BE CLASSIFIED AS A MISS YET.
pub fn should_send_to_backend(req: &dyn Request) -> bool {
    match GLOBAL.get() {
        Some(s) => s.should_send_to_backend(req),
        None => false,
    }
}

pub fn update_split_ratio() {
    if let Some(s) = GLOBAL.get() {
        s.update_split_ratio();
    }
}

pub fn reset() {
    if let Some(s) = GLOBAL.get() {
        s.reset();
    }
}
