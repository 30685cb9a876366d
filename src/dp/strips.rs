/// ---- strip DP --------------------------------------------------------------

/// exact solver for tile-aligned canvases. `g(r1, c1, r2, c2)` is the cheapest way to
/// paint a tile rectangle touching the far edge of the canvas as a chain of strips,
/// each painted from its own anchor with the rounded mean color of the strip; the
/// outer table `f[r][c]` composes those chains into the best layered painting of
/// everything above-right of tile `(r, c)`.
///
/// all costs are milli-units: `1000 * anchor paint cost + round(5 * deviation)`.
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::Tiling;
use crate::color::Color;
use crate::cost::{CostModel, PENALTY_MILLI};
use crate::emit::Layer;
use crate::error::SolveError;
use crate::geom::{Cell, Rect};
use crate::solver::Problem;

#[derive(Clone, Copy, Debug)]
enum Step {
    Empty,
    /// strip of rows `[r1, boundary)`, then recurse above it
    Rows { boundary: u32, color: Color },
    /// strip of columns `[c1, boundary)`, then recurse right of it
    Cols { boundary: u32, color: Color },
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    cost: i64,
    step: Step,
}

#[derive(Clone, Copy, Debug)]
enum Outer {
    Done,
    /// column chain `g(r, c, n, c2)`, then `f[r][c2]`
    Column { c2: u32 },
    /// row chain `g(r, c, r2, m)`, then `f[r2][c]`
    Row { r2: u32 },
}

#[derive(Clone, Debug)]
pub struct StripSolution {
    /// paint order: every layer repaints everything above-right of its anchor
    pub layers: Vec<Layer>,
    /// optimal cost in milli-units
    pub cost: i64,
    pub tiling: Tiling,
}

struct StripSolver<'p> {
    problem: &'p Problem,
    tiling: Tiling,
    memo: FxHashMap<(u32, u32, u32, u32), Entry>,
}

impl<'p> StripSolver<'p> {
    fn model(&self) -> &CostModel {
        &self.problem.model
    }

    /// cost and mean color of one strip, or None when it cannot come in under `limit`
    fn strip(&self, rect: Rect, limit: Option<i64>) -> Option<(i64, Color)> {
        let base = self.model().anchor_base(rect.anchor());
        let color = self.problem.sums.mean(rect);
        let dev = match limit {
            None => self.problem.canvas.deviation(rect, color),
            Some(limit) => {
                let room = limit - base;
                if room < 0 {
                    return None;
                }
                self.problem
                    .canvas
                    .deviation_bounded(rect, color, room as f64 / PENALTY_MILLI + 1.0)?
            }
        };
        Some((base + CostModel::penalty_milli(dev), color))
    }

    /// memoized strip chain cost; one of `r2 == n` or `c2 == m` holds
    fn g(&mut self, r1: u32, c1: u32, r2: u32, c2: u32) -> i64 {
        if r1 >= r2 || c1 >= c2 {
            return 0;
        }
        if let Some(e) = self.memo.get(&(r1, c1, r2, c2)) {
            return e.cost;
        }
        let (n, m) = (self.tiling.n, self.tiling.m);
        debug_assert!(r2 == n || c2 == m);
        let mut best = Entry { cost: i64::MAX, step: Step::Empty };

        if r2 == n {
            for b in r1 + 1..=r2 {
                let rest = self.g(b, c1, r2, c2);
                let limit = (best.cost != i64::MAX).then(|| best.cost - rest);
                let rect = self.tiling.pixels(r1, c1, b, c2);
                if let Some((cost, color)) = self.strip(rect, limit) {
                    if cost + rest < best.cost {
                        best = Entry { cost: cost + rest, step: Step::Rows { boundary: b, color } };
                    }
                }
            }
        }
        if c2 == m {
            for b in c1 + 1..=c2 {
                let rest = self.g(r1, b, r2, c2);
                let limit = (best.cost != i64::MAX).then(|| best.cost - rest);
                let rect = self.tiling.pixels(r1, c1, r2, b);
                if let Some((cost, color)) = self.strip(rect, limit) {
                    if cost + rest < best.cost {
                        best = Entry { cost: cost + rest, step: Step::Cols { boundary: b, color } };
                    }
                }
            }
        }
        self.memo.insert((r1, c1, r2, c2), best);
        best.cost
    }

    fn collect_g(&self, r1: u32, c1: u32, r2: u32, c2: u32, out: &mut Vec<Layer>) {
        let s = self.tiling.tile;
        let (mut r1, mut c1) = (r1, c1);
        while r1 < r2 && c1 < c2 {
            let Some(entry) = self.memo.get(&(r1, c1, r2, c2)) else {
                return;
            };
            let anchor = Cell::new(r1 * s, c1 * s);
            match entry.step {
                Step::Empty => return,
                Step::Rows { boundary, color } => {
                    out.push(Layer { anchor, color });
                    r1 = boundary;
                }
                Step::Cols { boundary, color } => {
                    out.push(Layer { anchor, color });
                    c1 = boundary;
                }
            }
        }
    }
}

/// optimal layered strip painting of `problem` at the given tile size
pub fn solve_strips(problem: &Problem, tile: u32, cancel: &AtomicBool) -> Result<StripSolution, SolveError> {
    profiling::scope!("solve_strips");
    let tiling = Tiling::new(tile, problem.model.height, problem.model.width)?;
    let (n, m) = (tiling.n, tiling.m);
    let mut solver = StripSolver { problem, tiling, memo: FxHashMap::default() };

    let stride = m as usize + 1;
    let mut f = vec![0i64; (n as usize + 1) * stride];
    let mut choice = vec![Outer::Done; (n as usize + 1) * stride];
    let at = |r: u32, c: u32| r as usize * stride + c as usize;

    for r in (0..n).rev() {
        if cancel.load(Ordering::Relaxed) {
            return Err(SolveError::Cancelled);
        }
        for c in (0..m).rev() {
            let mut best = i64::MAX;
            let mut pick = Outer::Done;
            for c2 in c + 1..=m {
                let v = f[at(r, c2)] + solver.g(r, c, n, c2);
                if v < best {
                    best = v;
                    pick = Outer::Column { c2 };
                }
            }
            for r2 in r + 1..=n {
                let v = f[at(r2, c)] + solver.g(r, c, r2, m);
                if v < best {
                    best = v;
                    pick = Outer::Row { r2 };
                }
            }
            f[at(r, c)] = best;
            choice[at(r, c)] = pick;
        }
        debug!(row = r, memo = solver.memo.len(), "strip dp row");
    }

    // walk the outer table: each chain is painted before the remainder it leaves
    let mut layers = Vec::new();
    let (mut r, mut c) = (0, 0);
    while r < n && c < m {
        match choice[at(r, c)] {
            Outer::Done => break,
            Outer::Column { c2 } => {
                solver.collect_g(r, c, n, c2, &mut layers);
                c = c2;
            }
            Outer::Row { r2 } => {
                solver.collect_g(r, c, r2, m, &mut layers);
                r = r2;
            }
        }
    }

    let cost = f[at(0, 0)];
    info!(tile, n, m, cost, layers = layers.len(), entries = solver.memo.len(), "strip dp solved");
    Ok(StripSolution { layers, cost, tiling })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::cost::{CostModel, Costs};

    fn problem(canvas: Canvas) -> Problem {
        let model = CostModel::new(Costs::default(), canvas.height(), canvas.width());
        Problem::new(canvas, model)
    }

    #[test]
    fn test_uniform_canvas_is_one_layer() {
        let p = problem(Canvas::filled(8, 8, Color::new(10, 20, 30, 255)));
        let sol = solve_strips(&p, 2, &AtomicBool::new(false)).unwrap();
        assert_eq!(sol.layers.len(), 1);
        assert_eq!(sol.layers[0].anchor, Cell::ORIGIN);
        assert_eq!(sol.layers[0].color, Color::new(10, 20, 30, 255));
        assert_eq!(sol.cost, 5000);
    }

    #[test]
    fn test_two_halves_beat_single_fill() {
        // left half black, right half white on a 40x40 canvas
        let canvas = Canvas::from_fn(40, 40, |_, c| if c < 20 { Color::new(0, 0, 0, 255) } else { Color::WHITE });
        let p = problem(canvas);
        let sol = solve_strips(&p, 10, &AtomicBool::new(false)).unwrap();
        assert_eq!(sol.layers.len(), 2);
        assert_eq!(sol.layers[0].anchor, Cell::ORIGIN);
        assert_eq!(sol.layers[1].anchor, Cell::new(0, 20));
        // color 5 + (cut 7 + color 10 + merge 2)
        assert_eq!(sol.cost, (5 + 19) * 1000);
    }

    #[test]
    fn test_bad_tile_fails_fast() {
        let p = problem(Canvas::filled(10, 10, Color::WHITE));
        assert!(matches!(
            solve_strips(&p, 3, &AtomicBool::new(false)),
            Err(SolveError::TileSize { tile: 3, .. })
        ));
    }

    #[test]
    fn test_cancelled() {
        let p = problem(Canvas::filled(8, 8, Color::WHITE));
        assert!(matches!(solve_strips(&p, 2, &AtomicBool::new(true)), Err(SolveError::Cancelled)));
    }
}
