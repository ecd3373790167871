// RIPTIDE SPLIT POLICY TESTS
// MODE TRANSITIONS, DERIVED METRICS, OPTIMIZER, WINDOW PLAN
//
// ALL TESTS USE PURE-RUST TYPES FROM riptide::split.
// ZERO COLLABORATORS. RUN OFFLINE.

use riptide::split::{
    bw_drop_permil, gcd, lat_increase_permil, optimal_ratio, plan_window, step, Mode, ModeState,
    RatioAction, TickStats, IOPS_LOW, LAT_CONG, LAT_REC, MAX_PATTERN, RDMA_LOW, SPLIT_SCALE,
    WINDOW_SIZE,
};

fn stats(rdma_bw: u64, iops: u64, lat_increase_permil: u64, window_full: bool) -> TickStats {
    TickStats {
        rdma_bw,
        iops,
        bw_drop_permil: 0,
        lat_increase_permil,
        window_full,
        caching_failed: false,
    }
}

// === MODE TRANSITIONS ===

#[test]
fn idle_stays_idle_below_thresholds() {
    let mut st = ModeState::new();
    let action = step(&mut st, &stats(RDMA_LOW, IOPS_LOW, 0, false));
    assert_eq!(st.mode, Mode::Idle);
    // FIRST IDLE TICK FORCES THE RATIO TO FULL CACHE, THEN HOLDS
    assert_eq!(action, RatioAction::ForceFullCache);
    let action = step(&mut st, &stats(50, 500, 0, false));
    assert_eq!(st.mode, Mode::Idle);
    assert_eq!(action, RatioAction::Hold);
}

#[test]
fn idle_to_warmup_on_traffic() {
    let mut st = ModeState::new();
    let action = step(&mut st, &stats(200, 2_000, 0, false));
    assert_eq!(st.mode, Mode::Warmup);
    assert_eq!(
        action,
        RatioAction::Recompute {
            bw_drop_permil: 0,
            lat_increase_permil: 0
        }
    );
}

#[test]
fn either_threshold_alone_promotes() {
    // BANDWIDTH ABOVE, IOPS BELOW
    let mut st = ModeState::new();
    step(&mut st, &stats(RDMA_LOW + 1, 0, 0, false));
    assert_eq!(st.mode, Mode::Warmup);

    // IOPS ABOVE, BANDWIDTH BELOW
    let mut st = ModeState::new();
    step(&mut st, &stats(0, IOPS_LOW + 1, 0, false));
    assert_eq!(st.mode, Mode::Warmup);
}

#[test]
fn warmup_holds_until_window_full() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    assert_eq!(st.mode, Mode::Warmup);

    for _ in 0..10 {
        let action = step(&mut st, &stats(10_000, 10_000, 0, false));
        assert_eq!(st.mode, Mode::Warmup);
        // WARMUP RECOMPUTES EVERY TICK UNDER THE NO-CONTENTION ASSUMPTION
        assert_eq!(
            action,
            RatioAction::Recompute {
                bw_drop_permil: 0,
                lat_increase_permil: 0
            }
        );
    }
}

#[test]
fn warmup_to_stable_computes_once_then_freezes() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));

    let action = step(&mut st, &stats(10_000, 10_000, 0, true));
    assert_eq!(st.mode, Mode::Stable);
    assert!(matches!(action, RatioAction::Recompute { .. }));
    assert!(st.stable_calc_done);

    // FROZEN FROM HERE ON
    for _ in 0..10 {
        let action = step(&mut st, &stats(10_000, 10_000, 0, true));
        assert_eq!(st.mode, Mode::Stable);
        assert_eq!(action, RatioAction::Hold);
    }
}

#[test]
fn stable_calc_waits_for_full_window() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    assert_eq!(st.mode, Mode::Stable);

    // CALC PENDING BUT WINDOW NOT FULL: THE ONE-SHOT WAITS
    st.stable_calc_done = false;
    let action = step(&mut st, &stats(10_000, 10_000, 0, false));
    assert_eq!(st.mode, Mode::Stable);
    assert_eq!(action, RatioAction::Hold);
    assert!(!st.stable_calc_done);
}

#[test]
fn stable_to_congestion_above_lat_cong() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    assert_eq!(st.mode, Mode::Stable);

    // EXACTLY AT THE THRESHOLD: NOT YET CONGESTION
    step(&mut st, &stats(10_000, 10_000, LAT_CONG, true));
    assert_eq!(st.mode, Mode::Stable);

    let action = step(&mut st, &stats(10_000, 10_000, LAT_CONG + 1, true));
    assert_eq!(st.mode, Mode::Congestion);
    assert!(st.stable_calc_done);
    assert!(matches!(action, RatioAction::Recompute { .. }));
}

#[test]
fn congestion_recomputes_every_tick() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    step(&mut st, &stats(10_000, 10_000, 100, true));
    assert_eq!(st.mode, Mode::Congestion);

    for _ in 0..5 {
        let action = step(&mut st, &stats(10_000, 10_000, 100, true));
        assert_eq!(st.mode, Mode::Congestion);
        assert_eq!(
            action,
            RatioAction::Recompute {
                bw_drop_permil: 0,
                lat_increase_permil: 100
            }
        );
    }
}

#[test]
fn congestion_holds_in_dead_zone() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    step(&mut st, &stats(10_000, 10_000, 100, true));
    assert_eq!(st.mode, Mode::Congestion);

    // BETWEEN LAT_REC AND LAT_CONG: STAYS CONGESTED
    step(&mut st, &stats(10_000, 10_000, LAT_REC, true));
    assert_eq!(st.mode, Mode::Congestion);
    step(&mut st, &stats(10_000, 10_000, LAT_CONG, true));
    assert_eq!(st.mode, Mode::Congestion);
}

#[test]
fn congestion_recovers_below_lat_rec() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    step(&mut st, &stats(10_000, 10_000, 100, true));
    assert_eq!(st.mode, Mode::Congestion);

    let action = step(&mut st, &stats(10_000, 10_000, LAT_REC - 1, true));
    assert_eq!(st.mode, Mode::Stable);
    // stable_calc_done CLEARED ON REENTRY: ONE FRESH CALC, THEN FREEZE
    assert!(st.stable_calc_done);
    assert!(matches!(action, RatioAction::Recompute { .. }));
    let action = step(&mut st, &stats(10_000, 10_000, 0, true));
    assert_eq!(action, RatioAction::Hold);
}

#[test]
fn any_mode_drops_to_idle_on_low_traffic() {
    // WARMUP
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    assert_eq!(st.mode, Mode::Warmup);
    step(&mut st, &stats(50, 500, 0, false));
    assert_eq!(st.mode, Mode::Idle);

    // STABLE
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    assert_eq!(st.mode, Mode::Stable);
    step(&mut st, &stats(50, 500, 0, true));
    assert_eq!(st.mode, Mode::Idle);

    // CONGESTION
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    step(&mut st, &stats(10_000, 10_000, 0, true));
    step(&mut st, &stats(10_000, 10_000, 100, true));
    assert_eq!(st.mode, Mode::Congestion);
    step(&mut st, &stats(50, 500, 100, true));
    assert_eq!(st.mode, Mode::Idle);
}

#[test]
fn reentering_idle_reapplies_full_cache() {
    let mut st = ModeState::new();
    step(&mut st, &stats(50, 500, 0, false)); // FIRST IDLE APPLY
    step(&mut st, &stats(10_000, 10_000, 0, false));
    assert_eq!(st.mode, Mode::Warmup);

    let action = step(&mut st, &stats(50, 500, 0, false));
    assert_eq!(st.mode, Mode::Idle);
    assert_eq!(action, RatioAction::ForceFullCache);
}

// === FAILURE LATCH ===

#[test]
fn failure_latches_from_active_modes() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    assert_eq!(st.mode, Mode::Warmup);

    let failed = TickStats {
        caching_failed: true,
        ..stats(10_000, 10_000, 0, true)
    };
    let action = step(&mut st, &failed);
    assert_eq!(st.mode, Mode::Failure);
    // FAILURE RETAINS THE CURRENT RATIO
    assert_eq!(action, RatioAction::Hold);

    // LATCHED WHILE TRAFFIC FLOWS
    let action = step(&mut st, &stats(10_000, 10_000, 0, true));
    assert_eq!(st.mode, Mode::Failure);
    assert_eq!(action, RatioAction::Hold);
}

#[test]
fn failure_does_not_fire_from_idle() {
    let mut st = ModeState::new();
    let failed = TickStats {
        caching_failed: true,
        ..stats(10_000, 10_000, 0, false)
    };
    step(&mut st, &failed);
    assert_eq!(st.mode, Mode::Warmup);
}

#[test]
fn failure_still_drops_to_idle_on_low_traffic() {
    let mut st = ModeState::new();
    step(&mut st, &stats(10_000, 10_000, 0, false));
    let failed = TickStats {
        caching_failed: true,
        ..stats(10_000, 10_000, 0, true)
    };
    step(&mut st, &failed);
    assert_eq!(st.mode, Mode::Failure);

    step(&mut st, &stats(50, 500, 0, true));
    assert_eq!(st.mode, Mode::Idle);
}

// === DERIVED METRICS ===

#[test]
fn bw_drop_guards() {
    assert_eq!(bw_drop_permil(0, 500), 0);
    assert_eq!(bw_drop_permil(1_000, 900), 100);
    assert_eq!(bw_drop_permil(1_000, 1_000), 0);
    // CURRENT ABOVE BASELINE: SATURATE, NOT WRAP
    assert_eq!(bw_drop_permil(1_000, 1_200), 0);
    assert_eq!(bw_drop_permil(1_000, 0), 1_000);
}

#[test]
fn lat_increase_guards() {
    assert_eq!(lat_increase_permil(500_000, false, 700_000), 0);
    assert_eq!(lat_increase_permil(0, true, 700_000), 0);
    assert_eq!(lat_increase_permil(u64::MAX, true, 700_000), 0);
    assert_eq!(lat_increase_permil(500_000, true, 535_000), 70);
    assert_eq!(lat_increase_permil(500_000, true, 1_000_000), 1_000);
    // CURRENT BELOW BASELINE: SATURATE TO 0
    assert_eq!(lat_increase_permil(500_000, true, 400_000), 0);
}

// === OPTIMIZER ===

#[test]
fn ratio_is_proportional_split() {
    // 420K CACHE-ONLY VS 180K BACKEND-ONLY -> 70% TO CACHE
    assert_eq!(optimal_ratio(420_000, 180_000, 0, 0), 7_000);
    assert_eq!(optimal_ratio(300_000, 300_000, 0, 0), 5_000);
}

#[test]
fn penalty_applies_only_above_lat_cong() {
    // AT THE THRESHOLD: NO PENALTY
    assert_eq!(optimal_ratio(420_000, 180_000, 300, LAT_CONG), 7_000);

    // ABOVE IT: BACKEND DISCOUNTED BY THE DROP -> MORE TO CACHE
    let r = optimal_ratio(420_000, 180_000, 300, LAT_CONG + 1);
    assert!(r > 7_000, "penalized ratio {} should exceed 7000", r);
    // B' = 180000 * 700 / 1000 = 126000; 420000*10000/546000 = 7692
    assert_eq!(r, 7_692);
}

#[test]
fn degenerate_inputs_default_to_full_cache() {
    assert_eq!(optimal_ratio(0, 0, 0, 0), SPLIT_SCALE);
    assert_eq!(optimal_ratio(0, 0, 500, 500), SPLIT_SCALE);
    // TOTAL DROP WIPES THE BACKEND OUT ENTIRELY
    assert_eq!(optimal_ratio(420_000, 180_000, 1_000, 100), SPLIT_SCALE);
    // DROP BEYOND THE SCALE IS CLAMPED, NOT WRAPPED
    assert_eq!(optimal_ratio(420_000, 180_000, 5_000, 100), SPLIT_SCALE);
}

#[test]
fn one_sided_tables() {
    assert_eq!(optimal_ratio(0, 180_000, 0, 0), 0);
    assert_eq!(optimal_ratio(420_000, 0, 0, 0), SPLIT_SCALE);
}

#[test]
fn ratio_always_clamped() {
    for a in [0u64, 1, 100, 420_000] {
        for b in [0u64, 1, 100, 180_000] {
            for lat in [0u64, 100] {
                let r = optimal_ratio(a, b, 300, lat);
                assert!(r <= SPLIT_SCALE);
            }
        }
    }
}

// === GCD ===

#[test]
fn gcd_definition() {
    assert_eq!(gcd(70, 30), 10);
    assert_eq!(gcd(33, 67), 1);
    assert_eq!(gcd(50, 50), 50);
    assert_eq!(gcd(100, 0), 100);
    assert_eq!(gcd(0, 100), 100);
    assert_eq!(gcd(0, 0), 1);
}

// === WINDOW PLAN ===

#[test]
fn plan_70_percent() {
    let plan = plan_window(7_000);
    assert_eq!(plan.cache_quota, 70);
    assert_eq!(plan.backend_quota, 30);
    assert_eq!(plan.pattern_size, 10);
    assert_eq!(plan.pattern_cache, 7);
    assert_eq!(plan.pattern_backend, 3);
}

#[test]
fn plan_extremes() {
    let all_cache = plan_window(SPLIT_SCALE);
    assert_eq!(all_cache.cache_quota, 100);
    assert_eq!(all_cache.backend_quota, 0);
    assert_eq!(all_cache.pattern_size, 1);
    assert_eq!(all_cache.pattern_cache, 1);

    let all_backend = plan_window(0);
    assert_eq!(all_backend.cache_quota, 0);
    assert_eq!(all_backend.backend_quota, 100);
    assert_eq!(all_backend.pattern_size, 1);
    assert_eq!(all_backend.pattern_cache, 0);
}

#[test]
fn plan_coprime_split_caps_at_max_pattern() {
    // 33/67 REDUCES TO NOTHING: FULL 100-STEP PATTERN CAPPED AT 10
    let plan = plan_window(3_300);
    assert_eq!(plan.pattern_size, MAX_PATTERN);
    assert_eq!(plan.pattern_cache, 3);
    assert_eq!(plan.pattern_backend, 7);
}

#[test]
fn plan_even_split() {
    let plan = plan_window(5_000);
    assert_eq!(plan.pattern_size, 2);
    assert_eq!(plan.pattern_cache, 1);
    assert_eq!(plan.pattern_backend, 1);
}

#[test]
fn plan_invariants_across_all_ratios() {
    for r in (0..=SPLIT_SCALE).step_by(100) {
        let plan = plan_window(r);
        assert_eq!(plan.cache_quota + plan.backend_quota, WINDOW_SIZE, "ratio {}", r);
        assert!(plan.pattern_size >= 1 && plan.pattern_size <= MAX_PATTERN, "ratio {}", r);
        assert_eq!(plan.pattern_cache + plan.pattern_backend, plan.pattern_size, "ratio {}", r);
    }
    // OVER-SCALE INPUT IS CLAMPED
    let plan = plan_window(SPLIT_SCALE + 5_000);
    assert_eq!(plan.cache_quota, 100);
}
