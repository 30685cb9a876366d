/// ---- guillotine DP ---------------------------------------------------------

/// exact interval DP over every tile-aligned sub-rectangle: a rectangle is either
/// cut in two along a tile boundary or painted whole from its anchor with its
/// rounded mean color. leaves come out in a valid paint order (lower or left part
/// before the part it would otherwise overwrite).
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use super::Tiling;
use crate::color::Color;
use crate::cost::{CostModel, PENALTY_MILLI};
use crate::error::SolveError;
use crate::geom::Rect;
use crate::solver::Problem;

/// largest table the solver will allocate
pub const MAX_TABLE_CELLS: usize = 1 << 22;

#[derive(Clone, Copy, Debug)]
enum Choice {
    Unset,
    Leaf(Color),
    /// cut between tile rows `k - 1` and `k`
    Row(u32),
    /// cut between tile columns `k - 1` and `k`
    Col(u32),
}

#[derive(Clone, Debug)]
pub struct GuillotineSolution {
    /// pixel rectangles with their fill colors; they tile the canvas
    pub rects: Vec<(Rect, Color)>,
    /// optimal cost in milli-units
    pub cost: i64,
    pub tiling: Tiling,
}

struct Table {
    side_r: usize,
    side_c: usize,
    cost: Vec<i64>,
    choice: Vec<Choice>,
}

impl Table {
    #[inline]
    fn idx(&self, ra: u32, rb: u32, ca: u32, cb: u32) -> usize {
        ((ra as usize * self.side_r + rb as usize) * self.side_c + ca as usize) * self.side_c + cb as usize
    }
}

pub fn solve_guillotine(problem: &Problem, tile: u32, cancel: &AtomicBool) -> Result<GuillotineSolution, SolveError> {
    profiling::scope!("solve_guillotine");
    let tiling = Tiling::new(tile, problem.model.height, problem.model.width)?;
    let (n, m) = (tiling.n, tiling.m);
    let side_r = n as usize + 1;
    let side_c = m as usize + 1;
    let cells = side_r * side_r * side_c * side_c;
    if cells > MAX_TABLE_CELLS {
        return Err(SolveError::TooLarge { cells, cap: MAX_TABLE_CELLS });
    }
    let mut t = Table {
        side_r,
        side_c,
        cost: vec![i64::MAX; cells],
        choice: vec![Choice::Unset; cells],
    };

    for h in 1..=n {
        if cancel.load(Ordering::Relaxed) {
            return Err(SolveError::Cancelled);
        }
        for w in 1..=m {
            for ra in 0..=n - h {
                let rb = ra + h;
                for ca in 0..=m - w {
                    let cb = ca + w;
                    let mut best = i64::MAX;
                    let mut pick = Choice::Unset;
                    for k in ra + 1..rb {
                        let v = t.cost[t.idx(ra, k, ca, cb)] + t.cost[t.idx(k, rb, ca, cb)];
                        if v < best {
                            best = v;
                            pick = Choice::Row(k);
                        }
                    }
                    for k in ca + 1..cb {
                        let v = t.cost[t.idx(ra, rb, ca, k)] + t.cost[t.idx(ra, rb, k, cb)];
                        if v < best {
                            best = v;
                            pick = Choice::Col(k);
                        }
                    }

                    let rect = tiling.pixels(ra, ca, rb, cb);
                    let base = problem.model.anchor_base(rect.anchor());
                    if base < best {
                        let color = problem.sums.mean(rect);
                        let dev = if best == i64::MAX {
                            Some(problem.canvas.deviation(rect, color))
                        } else {
                            // abort the sum once the leaf cannot beat the best cut
                            let room = (best - base) as f64 / PENALTY_MILLI + 1.0;
                            problem.canvas.deviation_bounded(rect, color, room)
                        };
                        if let Some(dev) = dev {
                            let v = base + CostModel::penalty_milli(dev);
                            if v < best {
                                best = v;
                                pick = Choice::Leaf(color);
                            }
                        }
                    }
                    let i = t.idx(ra, rb, ca, cb);
                    t.cost[i] = best;
                    t.choice[i] = pick;
                }
            }
        }
    }

    let mut rects = Vec::new();
    let mut stack = vec![(0, n, 0, m)];
    while let Some((ra, rb, ca, cb)) = stack.pop() {
        match t.choice[t.idx(ra, rb, ca, cb)] {
            Choice::Leaf(color) => rects.push((tiling.pixels(ra, ca, rb, cb), color)),
            // push the upper / right part first so the lower / left part pops first
            Choice::Row(k) => {
                stack.push((k, rb, ca, cb));
                stack.push((ra, k, ca, cb));
            }
            Choice::Col(k) => {
                stack.push((ra, rb, k, cb));
                stack.push((ra, rb, ca, k));
            }
            Choice::Unset => return Err(SolveError::NoPaintOrder),
        }
    }

    let cost = t.cost[t.idx(0, n, 0, m)];
    info!(tile, n, m, cost, leaves = rects.len(), "guillotine dp solved");
    Ok(GuillotineSolution { rects, cost, tiling })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::cost::Costs;

    fn problem(canvas: Canvas) -> Problem {
        let model = CostModel::new(Costs::default(), canvas.height(), canvas.width());
        Problem::new(canvas, model)
    }

    #[test]
    fn test_uniform_is_single_leaf() {
        let p = problem(Canvas::filled(6, 6, Color::new(1, 2, 3, 4)));
        let sol = solve_guillotine(&p, 2, &AtomicBool::new(false)).unwrap();
        assert_eq!(sol.rects, vec![(Rect::new(0, 0, 6, 6), Color::new(1, 2, 3, 4))]);
        assert_eq!(sol.cost, 5000);
    }

    #[test]
    fn test_leaves_tile_canvas_in_paint_order() {
        let canvas = Canvas::from_fn(16, 16, |r, c| {
            if r < 8 && c >= 4 {
                Color::new(200, 0, 0, 255)
            } else {
                Color::new(0, 0, 200, 255)
            }
        });
        let p = problem(canvas);
        let sol = solve_guillotine(&p, 4, &AtomicBool::new(false)).unwrap();
        let area: u64 = sol.rects.iter().map(|(r, _)| r.area()).sum();
        assert_eq!(area, 256);
        // no later leaf's fill may reach an earlier leaf
        for (i, (a, _)) in sol.rects.iter().enumerate() {
            for (b, _) in &sol.rects[i + 1..] {
                assert!(!b.fill_reaches(a));
            }
        }
        assert_eq!(sol.rects[0].0.anchor(), crate::geom::Cell::ORIGIN);
    }

    #[test]
    fn test_table_cap() {
        // 400 / 2 = 200 tiles per side: 201^4 entries
        let p = problem(Canvas::filled(400, 400, Color::WHITE));
        assert!(matches!(
            solve_guillotine(&p, 2, &AtomicBool::new(false)),
            Err(SolveError::TooLarge { .. })
        ));
    }
}
