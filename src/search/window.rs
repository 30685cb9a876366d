/// windowed hard restarts: clear every corner inside a random window, reseed a
/// fraction of its cells, and anneal on a fresh cubic schedule with every proposal
/// confined to the window. a window that ends worse than it started is put back
/// exactly as it was.
use rand::Rng;
use tracing::debug;

use super::schedule::cubic;
use super::{Annealer, Budget, SearchResult};
use crate::geom::{Cell, Rect};

/// random window honoring the configured side and area bounds, shrunk to fit
fn pick_window(a: &mut Annealer<'_>) -> Rect {
    let (n, m) = (a.stairs.height(), a.stairs.width());
    let min_side = a.cfg.window_min_side.clamp(1, n.min(m));
    let max_area = a.cfg.window_max_area.min(n as u64 * m as u64).max(min_side as u64 * min_side as u64);
    let min_area = a.cfg.window_min_area.clamp(min_side as u64 * min_side as u64, max_area);
    let area = a.rng.random_range(min_area..=max_area);
    let max_h = ((area / min_side as u64) as u32).clamp(min_side, n);
    let h = a.rng.random_range(min_side..=max_h);
    let w = ((area / h as u64) as u32).clamp(min_side, m);
    let r1 = a.rng.random_range(0..=n - h);
    let c1 = a.rng.random_range(0..=m - w);
    Rect::new(r1, c1, r1 + h, c1 + w)
}

fn random_in(a: &mut Annealer<'_>, rect: Rect) -> Cell {
    Cell::new(a.rng.random_range(rect.r1..rect.r2), a.rng.random_range(rect.c1..rect.c2))
}

/// corners inside the window, kept in step with accepted proposals
struct Local {
    rect: Rect,
    corners: Vec<Cell>,
}

impl Local {
    fn forget(&mut self, cell: Cell) {
        if let Some(pos) = self.corners.iter().position(|&c| c == cell) {
            self.corners.swap_remove(pos);
        }
    }
}

fn local_step(a: &mut Annealer<'_>, local: &mut Local) {
    let pick = |a: &mut Annealer<'_>, local: &Local| -> Option<Cell> {
        (!local.corners.is_empty()).then(|| local.corners[a.rng.random_range(0..local.corners.len())])
    };
    match a.rng.random_range(0..4u8) {
        0 => {
            let cell = random_in(a, local.rect);
            if a.propose_add(cell) {
                local.corners.push(cell);
            }
        }
        1 => {
            if let Some(cell) = pick(a, local) {
                if a.propose_remove(cell) {
                    local.forget(cell);
                }
            }
        }
        2 => {
            if let Some(cell) = pick(a, local) {
                if let Some(to) = a.random_neighbor(cell) {
                    if local.rect.contains(to) && a.propose_shift(cell, to) {
                        local.forget(cell);
                        local.corners.push(to);
                    }
                }
            }
        }
        _ => {
            if let Some(cell) = pick(a, local) {
                a.propose_swap(cell);
            }
        }
    }
}

/// scatter fresh corners over the window; the reseed alone may already be a new best
fn reseed(a: &mut Annealer<'_>, rect: Rect) -> Local {
    let mut local = Local { rect, corners: Vec::new() };
    for r in rect.r1..rect.r2 {
        for c in rect.c1..rect.c2 {
            let cell = Cell::new(r, c);
            if !a.stairs.is_corner(cell) && a.rng.random::<f64>() < a.cfg.reseed_chance {
                let (lo, hi) = a.stairs.insert_range(cell);
                let rank = a.rng.random_range(lo..=hi);
                a.stairs.add_corner(cell, rank);
                local.corners.push(cell);
            }
        }
    }
    a.check_best();
    local
}

pub fn run(mut a: Annealer<'_>, budget: &Budget) -> SearchResult {
    let t0 = a.cfg.start_temperature;
    let hard = a.cfg.window_iterations.max(1);

    while !budget.exhausted(a.iteration) {
        profiling::scope!("window");
        let rect = pick_window(&mut a);
        let start = a.stairs.total();

        // highest rank first, so re-adding in reverse restores every saved rank
        let mut saved = Vec::new();
        for cell in a.stairs.corners_in(rect).into_iter().rev() {
            if cell != Cell::ORIGIN {
                let rank = a.stairs.remove_corner(cell);
                saved.push((cell, rank));
            }
        }

        let mut local = reseed(&mut a, rect);

        for it in 0..hard {
            if budget.exhausted(a.iteration) {
                break;
            }
            a.temperature = cubic(t0, it as f64 / hard as f64);
            local_step(&mut a, &mut local);
            a.iteration += 1;
        }

        a.stats.windows += 1;
        if a.stairs.total() > start {
            for cell in a.stairs.corners_in(rect) {
                if cell != Cell::ORIGIN {
                    a.stairs.remove_corner(cell);
                }
            }
            for &(cell, rank) in saved.iter().rev() {
                a.stairs.add_corner(cell, rank);
            }
            a.stats.windows_restored += 1;
        }
        debug!(window = a.stats.windows, ?rect, start, end = a.stairs.total(), "window done");
        a.stats.iterations = a.iteration;
    }
    a.finish()
}
