// RIPTIDE DISPATCH ENGINE
// PER-REQUEST CACHE-OR-BACKEND VERDICTS THAT REALIZE THE TARGET RATIO
// OVER A SLIDING 100-REQUEST WINDOW.
//
// THREE LAYERS, CHEAPEST FIRST:
//   EXPECTED COUNT: GREEDY CORRECTION AGAINST floor(total * p / 100).
//                   BOUNDS SHORT-TERM DEVIATION TO ONE REQUEST.
//   PATTERN:        GCD-REDUCED REPEATING SEQUENCE (LENGTH <= 10)
//                   BREAKS TIES WHEN BOTH COUNTS ARE ON TARGET.
//   QUOTA:          PER-WINDOW BUDGET, SATURATING. GUARD FOR THE
//                   DEGENERATE ALL-ONE-SIDE PLANS.
//
// CONSTANT-TIME, NO ALLOCATION. THE CALLER HOLDS THE DISPATCH LOCK.

use crate::split::{plan_window, SPLIT_SCALE, WINDOW_SIZE};

#[derive(Clone, Copy)]
pub struct DispatchState {
    request_counter: u64,
    total: u64,
    cache_count: u64,
    backend_count: u64,
    cache_quota: u64,
    backend_quota: u64,
    pattern_size: u64,
    pattern_cache: u64,
    pattern_backend: u64,
    pattern_pos: u64,
    last_to_cache: bool,
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            request_counter: 0,
            total: 0,
            cache_count: 0,
            backend_count: 0,
            cache_quota: 0,
            backend_quota: 0,
            pattern_size: 0,
            pattern_cache: 0,
            pattern_backend: 0,
            pattern_pos: 0,
            last_to_cache: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // ONE HIT-PATH DECISION AGAINST THE RATIO SNAPSHOT.
    // RETURNS TRUE WHEN THE REQUEST GOES TO THE BACKEND.
    pub fn decide(&mut self, ratio: u64) -> bool {
        let p = ratio.min(SPLIT_SCALE) / 100;

        if self.request_counter % WINDOW_SIZE == 0 || self.pattern_size == 0 {
            let plan = plan_window(ratio);
            self.cache_quota = plan.cache_quota;
            self.backend_quota = plan.backend_quota;
            self.pattern_size = plan.pattern_size;
            self.pattern_cache = plan.pattern_cache;
            self.pattern_backend = plan.pattern_backend;
            self.total = 0;
            self.cache_count = 0;
            self.backend_count = 0;
            self.pattern_pos = 0;
        }

        self.request_counter += 1;
        self.total += 1;

        let exp_cache = self.total * p / WINDOW_SIZE;
        let exp_backend = self.total - exp_cache;

        let to_cache = if self.cache_count < exp_cache {
            true
        } else if self.backend_count < exp_backend {
            false
        } else if self.pattern_pos < self.pattern_size {
            let c = self.pattern_pos < self.pattern_cache;
            self.pattern_pos = (self.pattern_pos + 1) % self.pattern_size;
            c
        } else if self.cache_quota == 0 {
            // PATTERN EXHAUSTED: UNREACHABLE AFTER PLAN INIT (POSITION
            // WRAPS MODULO SIZE >= 1), KEPT AS A GUARD
            false
        } else if self.backend_quota == 0 {
            true
        } else {
            !self.last_to_cache
        };

        if to_cache {
            self.cache_quota = self.cache_quota.saturating_sub(1);
            self.cache_count += 1;
        } else {
            self.backend_quota = self.backend_quota.saturating_sub(1);
            self.backend_count += 1;
        }
        self.last_to_cache = to_cache;

        !to_cache
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn cache_count(&self) -> u64 {
        self.cache_count
    }

    pub fn backend_count(&self) -> u64 {
        self.backend_count
    }

    pub fn cache_quota(&self) -> u64 {
        self.cache_quota
    }

    pub fn backend_quota(&self) -> u64 {
        self.backend_quota
    }

    pub fn pattern_size(&self) -> u64 {
        self.pattern_size
    }

    pub fn request_counter(&self) -> u64 {
        self.request_counter
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}
