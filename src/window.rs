// RIPTIDE MOVING WINDOWS
// TWO FIXED-CAPACITY RINGS OVER THE LAST 100 TELEMETRY SAMPLES.
// NO HEAP ALLOCATION AFTER CONSTRUCTION.
//
// THE BEST-EVER WINDOW AVERAGE IS THE UNCONGESTED REFERENCE: MAX FOR
// THROUGHPUT, MIN FOR LATENCY. THE LATENCY BASELINE WAITS OUT THE
// FIRST 40 SAMPLES SO A STARTUP TRANSIENT NEVER GETS FROZEN IN.

pub const WINDOW_SAMPLES: usize = 100;
pub const LAT_STABILIZATION: u64 = 40;

// --- METRIC WINDOW ---
// INVARIANT: sum == SIGMA buf[0..count]; average == sum / count.

#[derive(Clone, Copy)]
pub struct MetricWindow {
    buf: [u64; WINDOW_SAMPLES],
    idx: usize,
    count: usize,
    sum: u64,
    average: u64,
}

impl MetricWindow {
    pub fn new() -> Self {
        Self {
            buf: [0; WINDOW_SAMPLES],
            idx: 0,
            count: 0,
            sum: 0,
            average: 0,
        }
    }

    pub fn push(&mut self, x: u64) {
        if self.count < WINDOW_SAMPLES {
            self.count += 1;
        } else {
            self.sum -= self.buf[self.idx];
        }
        self.buf[self.idx] = x;
        self.sum += x;
        self.average = self.sum / self.count as u64;
        self.idx = (self.idx + 1) % WINDOW_SAMPLES;
    }

    pub fn average(&self) -> u64 {
        self.average
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count == WINDOW_SAMPLES
    }
}

impl Default for MetricWindow {
    fn default() -> Self {
        Self::new()
    }
}

// --- THROUGHPUT WINDOW ---

#[derive(Clone, Copy, Default)]
pub struct ThroughputWindow {
    window: MetricWindow,
    max_avg: u64,
}

impl ThroughputWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bw: u64) {
        self.window.push(bw);
        if self.window.average() > self.max_avg {
            self.max_avg = self.window.average();
        }
    }

    pub fn average(&self) -> u64 {
        self.window.average()
    }

    // MONOTONE NON-DECREASING OVER A RUN
    pub fn max_avg(&self) -> u64 {
        self.max_avg
    }

    pub fn is_full(&self) -> bool {
        self.window.is_full()
    }

    pub fn count(&self) -> usize {
        self.window.count()
    }
}

// --- LATENCY WINDOW ---

#[derive(Clone, Copy)]
pub struct LatencyWindow {
    window: MetricWindow,
    min_avg: u64,
    established: bool,
    samples_seen: u64,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self {
            window: MetricWindow::new(),
            min_avg: u64::MAX,
            established: false,
            samples_seen: 0,
        }
    }

    // lat == 0 IS THE NO-VALID-LATENCY SENTINEL. IT ENTERS THE WINDOW
    // LIKE ANY SAMPLE; THE average > 0 GUARD BELOW IS WHAT KEEPS IT
    // FROM BECOMING THE BASELINE.
    pub fn push(&mut self, lat: u64) {
        self.window.push(lat);
        self.samples_seen += 1;
        if self.samples_seen < LAT_STABILIZATION {
            return;
        }
        let avg = self.window.average();
        if !self.established {
            if avg > 0 {
                self.min_avg = avg;
                self.established = true;
            }
        } else if avg < self.min_avg {
            self.min_avg = avg;
        }
    }

    pub fn average(&self) -> u64 {
        self.window.average()
    }

    // MONOTONE NON-INCREASING ONCE ESTABLISHED
    pub fn min_avg(&self) -> u64 {
        self.min_avg
    }

    pub fn established(&self) -> bool {
        self.established
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new()
    }
}
