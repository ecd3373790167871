// RIPTIDE TICK LOG
// RECORDS CONTROL-TICK SNAPSHOTS WHILE THE SPLITTER RUNS.
// PRE-ALLOCATED RING BUFFER. NO HEAP ALLOCATION DURING MONITORING.
// WRAPS AROUND AT CAPACITY -- OLDEST ENTRIES OVERWRITTEN.

use crate::split::Mode;

const MAX_SNAPSHOTS: usize = 4096;

#[derive(Clone, Copy)]
pub struct Snapshot {
    pub ts_ms: u64,
    pub mode: Mode,
    pub ratio: u64,
    pub bw_avg: u64,
    pub lat_avg_ns: u64,
    pub iops: u64,
    pub bw_drop_permil: u64,
    pub lat_increase_permil: u64,
}

impl Snapshot {
    fn zero() -> Self {
        Self {
            ts_ms: 0,
            mode: Mode::Idle,
            ratio: 0,
            bw_avg: 0,
            lat_avg_ns: 0,
            iops: 0,
            bw_drop_permil: 0,
            lat_increase_permil: 0,
        }
    }
}

pub struct TickLog {
    snapshots: Vec<Snapshot>,
    head: usize,
    len: usize,
}

impl TickLog {
    pub fn new() -> Self {
        Self {
            snapshots: vec![Snapshot::zero(); MAX_SNAPSHOTS],
            head: 0,
            len: 0,
        }
    }

    // RECORD ONE SNAPSHOT. CALLED ONCE PER LOG INTERVAL FROM THE
    // CONTROL PATH. OVERWRITES OLDEST ENTRY WHEN FULL.
    pub fn snapshot(&mut self, s: Snapshot) {
        self.snapshots[self.head] = s;
        self.head = (self.head + 1) % MAX_SNAPSHOTS;
        if self.len < MAX_SNAPSHOTS {
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // ITERATE SNAPSHOTS IN CHRONOLOGICAL ORDER
    fn iter_chronological(&self) -> impl Iterator<Item = &Snapshot> {
        let start = if self.len < MAX_SNAPSHOTS { 0 } else { self.head };
        (0..self.len).map(move |i| &self.snapshots[(start + i) % MAX_SNAPSHOTS])
    }

    // DUMP THE TIME SERIES AFTER A RUN
    pub fn dump(&self) {
        if self.len == 0 {
            return;
        }

        let mut iter = self.iter_chronological();
        let first = iter.next().unwrap();
        let base_ts = first.ts_ms;

        println!(
            "\n{:<8} {:<11} {:<6} {:<10} {:<10} {:<9} {:<5} {:<5}",
            "TIME_S", "MODE", "RATIO", "BW_AVG", "LAT_AVG", "IOPS", "DROP", "INCR"
        );
        println!("{}", "-".repeat(70));

        let row = |s: &Snapshot| {
            let elapsed_s = s.ts_ms.saturating_sub(base_ts) as f64 / 1_000.0;
            println!(
                "{:<8.1} {:<11} {:<6} {:<10} {:<10} {:<9} {:<5} {:<5}",
                elapsed_s,
                s.mode.label(),
                s.ratio,
                s.bw_avg,
                s.lat_avg_ns,
                s.iops,
                s.bw_drop_permil,
                s.lat_increase_permil,
            );
        };

        row(first);
        for s in iter {
            row(s);
        }

        if self.len == MAX_SNAPSHOTS {
            println!("\n(RING BUFFER WRAPPED -- SHOWING MOST RECENT {} SNAPSHOTS)", MAX_SNAPSHOTS);
        }
        println!("TOTAL SNAPSHOTS: {}", self.len);
    }

    // SUMMARY STATISTICS
    pub fn summary(&self) {
        if self.len < 2 {
            return;
        }

        let snapshots: Vec<&Snapshot> = self.iter_chronological().collect();

        let mut mode_ticks = [0u64; 5];
        for s in &snapshots {
            mode_ticks[s.mode as usize] += 1;
        }

        let ratio_min = snapshots.iter().map(|s| s.ratio).min().unwrap_or(0);
        let ratio_max = snapshots.iter().map(|s| s.ratio).max().unwrap_or(0);
        let peak_bw = snapshots.iter().map(|s| s.bw_avg).max().unwrap_or(0);
        let final_snap = snapshots.last().unwrap();

        let elapsed_ms = final_snap.ts_ms - snapshots.first().unwrap().ts_ms;
        let elapsed_s = elapsed_ms as f64 / 1_000.0;

        println!("\n{}", "=".repeat(50));
        println!("RIPTIDE SUMMARY");
        println!("{}", "=".repeat(50));
        println!(
            "  MODE TICKS:     IDLE {} / WARMUP {} / STABLE {} / CONG {} / FAIL {}",
            mode_ticks[Mode::Idle as usize],
            mode_ticks[Mode::Warmup as usize],
            mode_ticks[Mode::Stable as usize],
            mode_ticks[Mode::Congestion as usize],
            mode_ticks[Mode::Failure as usize],
        );
        println!("  RATIO RANGE:    {} .. {}", ratio_min, ratio_max);
        println!("  FINAL RATIO:    {} ({})", final_snap.ratio, final_snap.mode.label());
        println!("  PEAK BW AVG:    {}", peak_bw);
        println!("  ELAPSED:        {:.1}s", elapsed_s);
        println!("  SAMPLES:        {}", self.len);
    }
}

impl Default for TickLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts_ms: u64, ratio: u64) -> Snapshot {
        Snapshot {
            ts_ms,
            mode: Mode::Stable,
            ratio,
            bw_avg: 10_000,
            lat_avg_ns: 500_000,
            iops: 10_000,
            bw_drop_permil: 0,
            lat_increase_permil: 0,
        }
    }

    #[test]
    fn snapshot_records() {
        let mut log = TickLog::new();
        assert_eq!(log.len(), 0);

        log.snapshot(snap(1_000, 7_000));
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshots[0].ratio, 7_000);
        assert_eq!(log.snapshots[0].ts_ms, 1_000);
    }

    #[test]
    fn ring_buffer_wraps() {
        let mut log = TickLog::new();

        // FILL TO CAPACITY
        for i in 0..MAX_SNAPSHOTS {
            log.snapshot(snap(i as u64, i as u64));
        }
        assert_eq!(log.len(), MAX_SNAPSHOTS);
        assert_eq!(log.head, 0); // WRAPPED BACK TO START

        // WRITE ONE MORE -- OVERWRITES OLDEST
        log.snapshot(snap(99_999, 9_999));
        assert_eq!(log.len(), MAX_SNAPSHOTS);
        assert_eq!(log.head, 1);
        assert_eq!(log.snapshots[0].ratio, 9_999);

        // CHRONOLOGICAL ITERATION STARTS FROM OLDEST SURVIVOR
        let ordered: Vec<u64> = log.iter_chronological().map(|s| s.ratio).collect();
        assert_eq!(ordered[0], 1);
        assert_eq!(*ordered.last().unwrap(), 9_999);
        assert_eq!(ordered.len(), MAX_SNAPSHOTS);
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut log = TickLog::new();
        log.snapshot(snap(1, 1));
        log.snapshot(snap(2, 2));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.iter_chronological().count(), 0);
    }

    #[test]
    fn summary_no_panic_empty() {
        let log = TickLog::new();
        log.summary();
    }

    #[test]
    fn summary_no_panic_one() {
        let mut log = TickLog::new();
        log.snapshot(snap(1_000, 10_000));
        log.summary();
    }

    #[test]
    fn dump_no_panic() {
        let mut log = TickLog::new();
        log.snapshot(snap(1_000, 10_000));
        log.snapshot(snap(2_000, 7_000));
        log.dump();
    }
}
