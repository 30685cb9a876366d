/// region-weighted sampling. the canvas is cut into a coarse grid; every step picks
/// one grid region with probability proportional to its weight and works only on
/// the corners and cells inside it. regions that just improved the total (and their
/// eight neighbors) get their weight pulled toward `region_boost`, the others decay
/// toward 1.
use rand::Rng;

use super::{Annealer, Budget, SearchResult};
use crate::geom::{Cell, Rect};

/// accepted moves one corner may chain in a single step
const MAX_CHAIN: usize = 64;

struct RegionGrid {
    rows: u32,
    cols: u32,
    cell_h: u32,
    cell_w: u32,
    height: u32,
    width: u32,
    weights: Vec<f64>,
}

impl RegionGrid {
    fn new(height: u32, width: u32, grid: u32) -> Self {
        let grid = grid.max(1);
        let cell_h = height.div_ceil(grid.min(height));
        let cell_w = width.div_ceil(grid.min(width));
        let rows = height.div_ceil(cell_h);
        let cols = width.div_ceil(cell_w);
        RegionGrid {
            rows,
            cols,
            cell_h,
            cell_w,
            height,
            width,
            weights: vec![1.0; rows as usize * cols as usize],
        }
    }

    fn rect(&self, i: usize) -> Rect {
        let (gr, gc) = (i as u32 / self.cols, i as u32 % self.cols);
        Rect::new(
            gr * self.cell_h,
            gc * self.cell_w,
            ((gr + 1) * self.cell_h).min(self.height),
            ((gc + 1) * self.cell_w).min(self.width),
        )
    }

    /// roulette-wheel pick by weight
    fn sample(&self, rng: &mut impl Rng) -> usize {
        let total: f64 = self.weights.iter().sum();
        let mut x = rng.random::<f64>() * total;
        for (i, w) in self.weights.iter().enumerate() {
            if x < *w {
                return i;
            }
            x -= w;
        }
        self.weights.len() - 1
    }

    fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let (gr, gc) = ((i as u32 / self.cols) as i64, (i as u32 % self.cols) as i64);
        (-1..=1i64)
            .flat_map(move |dr| (-1..=1i64).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .filter_map(move |(dr, dc)| {
                let (r, c) = (gr + dr, gc + dc);
                (r >= 0 && c >= 0 && r < self.rows as i64 && c < self.cols as i64)
                    .then(|| (r * self.cols as i64 + c) as usize)
            })
    }

    fn reward(&mut self, i: usize, boost: f64, lambda: f64) {
        self.weights[i] = boost * lambda + (1.0 - lambda) * self.weights[i];
        let l2 = lambda * lambda;
        let ns: Vec<usize> = self.neighbors(i).collect();
        for n in ns {
            self.weights[n] = boost * l2 + (1.0 - l2) * self.weights[n];
        }
    }

    fn decay(&mut self, i: usize, lambda: f64) {
        self.weights[i] = lambda + (1.0 - lambda) * self.weights[i];
    }
}

/// try random offsets around a corner, chaining on every accepted move
fn wander(a: &mut Annealer<'_>, start: Cell) {
    let radius = a.cfg.move_radius.max(1) as i64;
    let mut cell = start;
    let mut fails = 0;
    let mut moves = 0;
    while fails < a.cfg.move_tries && moves < MAX_CHAIN {
        let dr = a.rng.random_range(-radius..=radius);
        let dc = a.rng.random_range(-radius..=radius);
        let target = if dr == 0 && dc == 0 { None } else { a.offset(cell, dr, dc) };
        match target {
            Some(to) if a.propose_shift(cell, to) => {
                cell = to;
                moves += 1;
            }
            _ => fails += 1,
        }
    }
}

pub fn run(mut a: Annealer<'_>, budget: &Budget) -> SearchResult {
    let mut grid = RegionGrid::new(a.stairs.height(), a.stairs.width(), a.cfg.region_grid);
    let t0 = a.cfg.start_temperature;
    let schedule = a.cfg.schedule;
    let (boost, lambda) = (a.cfg.region_boost, a.cfg.region_lambda);

    while !budget.exhausted(a.iteration) {
        profiling::scope!("regions_step");
        let it = a.iteration;
        a.temperature = schedule.temperature(t0, budget.progress(it), it);
        let region = grid.sample(&mut a.rng);
        let rect = grid.rect(region);
        let start = a.stairs.total();

        for corner in a.stairs.corners_in(rect) {
            if corner != Cell::ORIGIN {
                wander(&mut a, corner);
            }
        }

        match it % 3 {
            0 => {
                for corner in a.stairs.corners_in(rect) {
                    if a.propose_swap(corner) {
                        break;
                    }
                }
            }
            1 => {
                for r in rect.r1..rect.r2 {
                    for c in rect.c1..rect.c2 {
                        let cell = Cell::new(r, c);
                        if !a.stairs.is_corner(cell) && a.rng.random::<f64>() < a.cfg.region_add_chance {
                            a.propose_add(cell);
                        }
                    }
                }
            }
            _ if it > a.cfg.region_remove_warmup => {
                for corner in a.stairs.corners_in(rect) {
                    if a.propose_remove(corner) {
                        break;
                    }
                }
            }
            _ => {}
        }

        if a.stairs.total() < start {
            grid.reward(region, boost, lambda);
        } else {
            grid.decay(region, lambda);
        }
        a.iteration += 1;
        a.stats.iterations = a.iteration;
    }
    a.finish()
}
