// Simulated annealing over the staircase partition
// every proposal is applied, measured, and either kept or undone by its exact
// inverse; the three variants below only decide which corners and cells get
// proposed and how the temperature moves

pub mod regions;
pub mod schedule;
pub mod unrestricted;
pub mod window;

pub use schedule::Schedule;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::emit::Layer;
use crate::geom::Cell;
use crate::staircase::Staircase;

/// how corners and cells are sampled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// uniform over all corners and cells
    Unrestricted,
    /// coarse region grid sampled by adaptive weight
    Regions,
    /// repeated local restarts inside random windows
    Window,
}

/// tuning of the search, built from `RunSettings::to_search_config`
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub variant: Variant,
    pub seed: u64,
    pub schedule: Schedule,
    pub start_temperature: f64,
    /// acceptance scale K in exp(-delta / (K * T))
    pub acceptance_scale: f64,
    /// tries to find a free cell for ADD in the unrestricted variant
    pub add_tries: u32,
    pub region_grid: u32,
    pub region_boost: f64,
    pub region_lambda: f64,
    pub region_remove_warmup: u64,
    pub region_add_chance: f64,
    pub move_radius: i32,
    pub move_tries: u32,
    pub window_min_side: u32,
    pub window_min_area: u64,
    pub window_max_area: u64,
    pub window_iterations: u64,
    pub reseed_chance: f64,
    pub record_moves: bool,
    /// send a progress snapshot every N improvements
    pub progress_interval: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            variant: Variant::Unrestricted,
            seed: 0,
            schedule: Schedule::Cubic,
            start_temperature: 0.01,
            acceptance_scale: 10_000.0,
            add_tries: 32,
            region_grid: 25,
            region_boost: 50.0,
            region_lambda: 0.8,
            region_remove_warmup: 123,
            region_add_chance: 1.0 / 17.0,
            move_radius: 3,
            move_tries: 5,
            window_min_side: 40,
            window_min_area: 2555,
            window_max_area: 12345,
            window_iterations: 5000,
            reseed_chance: 1.0 / 7.0,
            record_moves: false,
            progress_interval: 16,
        }
    }
}

//──────────────────────────────────────────────────────────────────────────────
// budget
//──────────────────────────────────────────────────────────────────────────────

/// wall-clock and/or iteration limit plus an external cancellation flag.
/// with an iteration limit the schedule follows iterations, never the clock.
#[derive(Clone, Debug)]
pub struct Budget {
    start: Instant,
    seconds: Option<f64>,
    max_iterations: Option<u64>,
    cancel: Arc<AtomicBool>,
}

impl Budget {
    pub fn new(seconds: Option<f64>, max_iterations: Option<u64>, cancel: Arc<AtomicBool>) -> Self {
        Budget { start: Instant::now(), seconds, max_iterations, cancel }
    }

    /// iteration-only budget, used for reproducible runs
    pub fn iterations(n: u64) -> Self {
        Budget::new(None, Some(n), Arc::new(AtomicBool::new(false)))
    }

    #[inline]
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn exhausted(&self, iterations: u64) -> bool {
        if self.cancelled() {
            return true;
        }
        if let Some(max) = self.max_iterations {
            if iterations >= max {
                return true;
            }
        }
        match self.seconds {
            Some(s) => self.elapsed() >= s,
            None => self.max_iterations.is_none(),
        }
    }

    /// fraction of the budget used, in [0, 1]
    pub fn progress(&self, iterations: u64) -> f64 {
        let p = match (self.max_iterations, self.seconds) {
            (Some(max), _) => iterations as f64 / max.max(1) as f64,
            (None, Some(s)) if s > 0.0 => self.elapsed() / s,
            _ => 1.0,
        };
        p.clamp(0.0, 1.0)
    }
}

//──────────────────────────────────────────────────────────────────────────────
// moves and statistics
//──────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Add,
    Remove,
    Swap,
    Move,
}

impl MoveKind {
    const ALL: [MoveKind; 4] = [MoveKind::Add, MoveKind::Remove, MoveKind::Swap, MoveKind::Move];

    fn index(self) -> usize {
        match self {
            MoveKind::Add => 0,
            MoveKind::Remove => 1,
            MoveKind::Swap => 2,
            MoveKind::Move => 3,
        }
    }
}

/// a reversible staircase edit; `apply` returns its exact inverse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    Add { cell: Cell, rank: usize },
    Remove { cell: Cell },
    /// take the corner out and put it back at `rank` (counted without itself)
    Rerank { cell: Cell, rank: usize },
    /// take the corner off `from` and put it on `to`, keeping its rank
    Shift { from: Cell, to: Cell, rank: usize },
}

impl Move {
    pub fn apply(self, stairs: &mut Staircase<'_>) -> Move {
        match self {
            Move::Add { cell, rank } => {
                stairs.add_corner(cell, rank);
                Move::Remove { cell }
            }
            Move::Remove { cell } => {
                let rank = stairs.remove_corner(cell);
                Move::Add { cell, rank }
            }
            Move::Rerank { cell, rank } => {
                let old = stairs.remove_corner(cell);
                stairs.add_corner(cell, rank);
                Move::Rerank { cell, rank: old }
            }
            Move::Shift { from, to, rank } => {
                let old = stairs.remove_corner(from);
                debug_assert_eq!(old, rank);
                stairs.add_corner(to, rank);
                Move::Shift { from: to, to: from, rank }
            }
        }
    }
}

/// how the acceptance rule judged a measured move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// total went down
    Downhill,
    /// total unchanged
    Neutral,
    /// total went up and the metropolis draw accepted it
    Uphill,
    Rejected,
}

impl Verdict {
    pub fn accepted(self) -> bool {
        self != Verdict::Rejected
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveStats {
    pub downhill: u64,
    pub neutral: u64,
    pub uphill: u64,
    pub rejected: u64,
}

impl MoveStats {
    pub fn proposed(&self) -> u64 {
        self.downhill + self.neutral + self.uphill + self.rejected
    }
}

#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    per_kind: [MoveStats; 4],
    pub iterations: u64,
    pub improvements: u64,
    pub windows: u64,
    pub windows_restored: u64,
}

impl SearchStats {
    pub fn kind(&self, kind: MoveKind) -> MoveStats {
        self.per_kind[kind.index()]
    }

    fn count(&mut self, kind: MoveKind, verdict: Verdict) {
        let s = &mut self.per_kind[kind.index()];
        match verdict {
            Verdict::Downhill => s.downhill += 1,
            Verdict::Neutral => s.neutral += 1,
            Verdict::Uphill => s.uphill += 1,
            Verdict::Rejected => s.rejected += 1,
        }
    }
}

/// one judged proposal, recorded when `record_moves` is on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub iteration: u64,
    pub kind: MoveKind,
    pub mv: Move,
    pub delta: i64,
    pub verdict: Verdict,
}

/// copy-on-improve view of the best partition so far
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub layers: Arc<[Layer]>,
    /// milli-units
    pub total: i64,
    pub iteration: u64,
}

/// decides which new bests reach the progress channel: with `progress_interval = k`
/// only every k-th improvement is published, so a fast descent does not flood
/// the listener with near-identical partitions
struct SnapshotGate {
    improvements: u64,
    every: u64,
}

impl SnapshotGate {
    fn new(progress_interval: u32) -> Self {
        SnapshotGate { improvements: 0, every: u64::from(progress_interval.max(1)) }
    }

    /// count one improvement; true when it should be published
    #[inline]
    fn admit(&mut self) -> bool {
        self.improvements += 1;
        self.improvements % self.every == 0
    }
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub layers: Arc<[Layer]>,
    /// best total, milli-units
    pub total: i64,
    pub start_total: i64,
    pub stats: SearchStats,
    pub moves: Vec<MoveRecord>,
}

//──────────────────────────────────────────────────────────────────────────────
// annealer
//──────────────────────────────────────────────────────────────────────────────

pub struct Annealer<'p> {
    pub stairs: Staircase<'p>,
    pub rng: Pcg32,
    pub cfg: SearchConfig,
    pub temperature: f64,
    pub iteration: u64,
    start_total: i64,
    best_total: i64,
    best: Arc<[Layer]>,
    pub stats: SearchStats,
    log: Option<Vec<MoveRecord>>,
    progress: Option<Sender<Snapshot>>,
    gate: SnapshotGate,
}

impl<'p> Annealer<'p> {
    pub fn new(stairs: Staircase<'p>, cfg: SearchConfig) -> Self {
        let best_total = stairs.total();
        let best: Arc<[Layer]> = Arc::from(stairs.layers());
        Annealer {
            rng: Pcg32::seed_from_u64(cfg.seed),
            temperature: cfg.start_temperature,
            iteration: 0,
            start_total: best_total,
            best_total,
            best,
            stats: SearchStats::default(),
            log: cfg.record_moves.then(Vec::new),
            progress: None,
            gate: SnapshotGate::new(cfg.progress_interval),
            stairs,
            cfg,
        }
    }

    /// stream throttled snapshots of every new best to `tx`
    pub fn with_progress(mut self, tx: Sender<Snapshot>) -> Self {
        self.progress = Some(tx);
        self
    }

    #[inline]
    pub fn best_total(&self) -> i64 {
        self.best_total
    }

    /// metropolis rule on a measured change of the total
    fn judge(&mut self, delta: i64) -> Verdict {
        if delta < 0 {
            return Verdict::Downhill;
        }
        if delta == 0 {
            return Verdict::Neutral;
        }
        if self.temperature <= 0.0 {
            return Verdict::Rejected;
        }
        let p = (-(delta as f64) / (self.cfg.acceptance_scale * self.temperature)).exp();
        if self.rng.random::<f64>() < p {
            Verdict::Uphill
        } else {
            Verdict::Rejected
        }
    }

    /// apply `mv`, keep it or roll it back; true if kept
    pub fn attempt(&mut self, kind: MoveKind, mv: Move) -> bool {
        profiling::scope!("attempt");
        let before = self.stairs.total();
        let undo = mv.apply(&mut self.stairs);
        let delta = self.stairs.total() - before;
        let verdict = self.judge(delta);
        self.stats.count(kind, verdict);
        if let Some(log) = self.log.as_mut() {
            log.push(MoveRecord { iteration: self.iteration, kind, mv, delta, verdict });
        }
        if !verdict.accepted() {
            undo.apply(&mut self.stairs);
            debug_assert_eq!(self.stairs.total(), before);
            return false;
        }
        self.check_best();
        true
    }

    /// record the current partition if it beats the best so far
    pub(crate) fn check_best(&mut self) {
        if self.stairs.total() < self.best_total {
            self.note_best();
        }
    }

    fn note_best(&mut self) {
        self.best_total = self.stairs.total();
        self.best = Arc::from(self.stairs.layers());
        self.stats.improvements += 1;
        if self.gate.admit() {
            debug!(iteration = self.iteration, total = self.best_total, corners = self.best.len(), "new best");
            if let Some(tx) = &self.progress {
                let _ = tx.send(Snapshot {
                    layers: self.best.clone(),
                    total: self.best_total,
                    iteration: self.iteration,
                });
            }
        }
    }

    //──────────────────────────────────────────────────────────────────────────
    // sampling
    //──────────────────────────────────────────────────────────────────────────

    /// uniformly random corner other than the origin
    pub fn random_corner(&mut self) -> Option<Cell> {
        let k = self.stairs.corner_count();
        if k < 2 {
            return None;
        }
        let rank = self.rng.random_range(1..k);
        Some(self.stairs.corner(rank))
    }

    pub fn random_cell(&mut self) -> Cell {
        let r = self.rng.random_range(0..self.stairs.height());
        let c = self.rng.random_range(0..self.stairs.width());
        Cell::new(r, c)
    }

    /// random cell without a corner, giving up after `add_tries` draws
    pub fn random_free_cell(&mut self) -> Option<Cell> {
        for _ in 0..self.cfg.add_tries {
            let cell = self.random_cell();
            if !self.stairs.is_corner(cell) {
                return Some(cell);
            }
        }
        None
    }

    /// random neighbor among the 8 around `cell`, if inside the canvas
    pub fn random_neighbor(&mut self, cell: Cell) -> Option<Cell> {
        const DIRS: [(i64, i64); 8] = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];
        let (dr, dc) = DIRS[self.rng.random_range(0..DIRS.len())];
        self.offset(cell, dr, dc)
    }

    #[inline]
    pub fn offset(&self, cell: Cell, dr: i64, dc: i64) -> Option<Cell> {
        let (r, c) = (cell.row as i64 + dr, cell.col as i64 + dc);
        self.stairs.in_bounds(r, c).then(|| Cell::new(r as u32, c as u32))
    }

    //──────────────────────────────────────────────────────────────────────────
    // proposals
    //──────────────────────────────────────────────────────────────────────────

    /// add a corner on a free cell at a random legal rank
    pub fn propose_add(&mut self, cell: Cell) -> bool {
        if self.stairs.is_corner(cell) {
            return false;
        }
        let (lo, hi) = self.stairs.insert_range(cell);
        let rank = self.rng.random_range(lo..=hi);
        self.attempt(MoveKind::Add, Move::Add { cell, rank })
    }

    pub fn propose_remove(&mut self, cell: Cell) -> bool {
        if cell == Cell::ORIGIN || !self.stairs.is_corner(cell) {
            return false;
        }
        self.attempt(MoveKind::Remove, Move::Remove { cell })
    }

    /// move a corner to another legal rank; false without proposing when it has none
    pub fn propose_swap(&mut self, cell: Cell) -> bool {
        if cell == Cell::ORIGIN {
            return false;
        }
        let Some(current) = self.stairs.rank_of(cell) else {
            return false;
        };
        let (lo, hi) = self.stairs.insert_range_excluding(cell, cell);
        if lo == hi {
            return false;
        }
        // draw among the other ranks
        let mut rank = self.rng.random_range(lo..hi);
        if rank >= current {
            rank += 1;
        }
        self.attempt(MoveKind::Swap, Move::Rerank { cell, rank })
    }

    /// move a corner onto `to`, only where its current rank stays legal
    pub fn propose_shift(&mut self, from: Cell, to: Cell) -> bool {
        if from == Cell::ORIGIN || to == Cell::ORIGIN || self.stairs.is_corner(to) {
            return false;
        }
        let Some(rank) = self.stairs.rank_of(from) else {
            return false;
        };
        let (lo, hi) = self.stairs.insert_range_excluding(to, from);
        if rank < lo || rank > hi {
            return false;
        }
        self.attempt(MoveKind::Move, Move::Shift { from, to, rank })
    }

    pub fn finish(self) -> SearchResult {
        let stats = self.stats;
        info!(
            start = self.start_total,
            best = self.best_total,
            iterations = stats.iterations,
            improvements = stats.improvements,
            corners = self.best.len(),
            "search finished"
        );
        for kind in MoveKind::ALL {
            let s = stats.kind(kind);
            debug!(?kind, proposed = s.proposed(), downhill = s.downhill, neutral = s.neutral, uphill = s.uphill, rejected = s.rejected, "acceptance");
        }
        SearchResult {
            layers: self.best,
            total: self.best_total,
            start_total: self.start_total,
            stats,
            moves: self.log.unwrap_or_default(),
        }
    }
}

/// run the configured variant until the budget runs out
pub fn run(annealer: Annealer<'_>, budget: &Budget) -> SearchResult {
    profiling::scope!("search::run");
    info!(variant = ?annealer.cfg.variant, start = annealer.stairs.total(), corners = annealer.stairs.corner_count(), "search started");
    match annealer.cfg.variant {
        Variant::Unrestricted => unrestricted::run(annealer, budget),
        Variant::Regions => regions::run(annealer, budget),
        Variant::Window => window::run(annealer, budget),
    }
}
