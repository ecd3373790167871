// RIPTIDE BANDWIDTH TABLE
// EXPECTED IOPS PER (IO_DEPTH, NUMJOBS, SPLIT_PCT) OPERATING POINT.
// LOADED ONCE, READ-ONLY AFTERWARDS. LOOKUPS ARE TOTAL: NO ERROR
// SURFACES ON THE CONTROL PATH, A MISSING POINT RETURNS 0 AND THE
// OPTIMIZER FALLS BACK TO FULL CACHE.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TableRow {
    pub io_depth: u64,
    pub numjobs: u64,
    pub split_pct: u64,
    pub iops: u64,
}

#[derive(Clone, Default, Debug)]
pub struct BandwidthTable {
    rows: Vec<TableRow>,
}

impl BandwidthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    // EXACT MATCH ON io_depth/numjobs, NEAREST NEIGHBOUR ON split_pct.
    // TIES GO TO THE EARLIEST ROW.
    pub fn lookup_bw(&self, io_depth: u64, numjobs: u64, split_pct: u64) -> u64 {
        let mut best: Option<(u64, u64)> = None;
        for r in &self.rows {
            if r.io_depth != io_depth || r.numjobs != numjobs {
                continue;
            }
            let dist = r.split_pct.abs_diff(split_pct);
            match best {
                Some((d, _)) if d <= dist => {}
                _ => best = Some((dist, r.iops)),
            }
        }
        best.map(|(_, iops)| iops).unwrap_or(0)
    }

    // TEXT FORMAT: ONE ROW PER LINE, `io_depth numjobs split_pct iops`,
    // WHITESPACE SEPARATED. `#` COMMENTS AND BLANK LINES SKIPPED.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading bandwidth table {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                bail!(
                    "table line {}: expected `io_depth numjobs split_pct iops`, got {} fields",
                    i + 1,
                    fields.len()
                );
            }
            let row = TableRow {
                io_depth: parse_field(fields[0], "io_depth", i + 1)?,
                numjobs: parse_field(fields[1], "numjobs", i + 1)?,
                split_pct: parse_field(fields[2], "split_pct", i + 1)?,
                iops: parse_field(fields[3], "iops", i + 1)?,
            };
            if row.split_pct > 100 {
                bail!("table line {}: split_pct {} out of range 0..=100", i + 1, row.split_pct);
            }
            rows.push(row);
        }
        Ok(Self { rows })
    }

    // MEASURED-SHAPE CURVE FOR THE SIMULATOR AND FOR RUNS WITHOUT A
    // TABLE FILE: CACHE-ONLY ROUGHLY 2.3X BACKEND-ONLY AT THE DEFAULT
    // OPERATING POINT, MILDLY CONCAVE IN BETWEEN.
    pub fn builtin() -> Self {
        const CURVE: [(u64, u64); 11] = [
            (0, 180_000),
            (10, 205_000),
            (20, 231_000),
            (30, 258_000),
            (40, 286_000),
            (50, 310_000),
            (60, 335_000),
            (70, 364_000),
            (80, 390_000),
            (90, 408_000),
            (100, 420_000),
        ];
        let rows = CURVE
            .iter()
            .map(|&(split_pct, iops)| TableRow {
                io_depth: crate::split::IO_DEPTH,
                numjobs: crate::split::NUM_JOBS,
                split_pct,
                iops,
            })
            .collect();
        Self { rows }
    }
}

fn parse_field(s: &str, name: &str, line: usize) -> Result<u64> {
    s.parse::<u64>()
        .with_context(|| format!("table line {}: bad {} `{}`", line, name, s))
}
