// Staircase partition
// an ordered list of corners; every cell belongs to the highest-ranked corner that
// is weakly below-left of it. ranks are kept a linear extension of dominance, so
// each corner owns itself and every region is a staircase (young diagram) hanging
// off its corner. ownership lives in a per-cell grid of region slots; regions are
// an arena addressed by slot with a free list.

pub mod recalc;

pub use recalc::{fit, Fit};

use crate::color::Color;
use crate::cost::CostModel;
use crate::emit::Layer;
use crate::geom::{Cell, Rect};
use crate::solver::Problem;

const NONE: u32 = u32::MAX;

#[derive(Clone, Debug)]
struct Region {
    cell: Cell,
    /// flat indices of owned cells
    members: Vec<u32>,
    color: Color,
    /// milli-units: anchor paint cost + scaled deviation
    cost: i64,
    rank: u32,
}

#[derive(Clone)]
pub struct Staircase<'p> {
    problem: &'p Problem,
    height: u32,
    width: u32,
    /// owning slot of every cell
    owner: Vec<u32>,
    /// slot of the corner sitting on a cell, NONE elsewhere
    slot_at: Vec<u32>,
    /// position of every cell inside its owner's member list
    member_pos: Vec<u32>,
    regions: Vec<Region>,
    free: Vec<u32>,
    /// slots by rank; the origin corner is always rank 0
    order: Vec<u32>,
    total: i64,
}

impl<'p> Staircase<'p> {
    /// a single corner at the origin owning the whole canvas
    pub fn new(problem: &'p Problem) -> Self {
        profiling::scope!("Staircase::new");
        let (height, width) = (problem.model.height, problem.model.width);
        let cells = height as usize * width as usize;
        let mut slot_at = vec![NONE; cells];
        slot_at[0] = 0;
        let mut s = Staircase {
            problem,
            height,
            width,
            owner: vec![0; cells],
            slot_at,
            member_pos: (0..cells as u32).collect(),
            regions: vec![Region {
                cell: Cell::ORIGIN,
                members: (0..cells as u32).collect(),
                color: Color::WHITE,
                cost: 0,
                rank: 0,
            }],
            free: Vec::new(),
            order: vec![0],
            total: 0,
        };
        s.recalc(0);
        s
    }

    #[inline]
    pub fn problem(&self) -> &'p Problem {
        self.problem
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// running sum of all region costs, milli-units
    #[inline]
    pub fn total(&self) -> i64 {
        self.total
    }

    #[inline]
    pub fn corner_count(&self) -> usize {
        self.order.len()
    }

    #[inline]
    fn idx(&self, cell: Cell) -> usize {
        cell.row as usize * self.width as usize + cell.col as usize
    }

    #[inline]
    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && row < self.height as i64 && col < self.width as i64
    }

    #[inline]
    pub fn is_corner(&self, cell: Cell) -> bool {
        self.slot_at[self.idx(cell)] != NONE
    }

    /// corner at `rank`
    #[inline]
    pub fn corner(&self, rank: usize) -> Cell {
        self.regions[self.order[rank] as usize].cell
    }

    pub fn rank_of(&self, cell: Cell) -> Option<usize> {
        match self.slot_at[self.idx(cell)] {
            NONE => None,
            slot => Some(self.regions[slot as usize].rank as usize),
        }
    }

    /// corner owning `cell`
    #[inline]
    pub fn owner_of(&self, cell: Cell) -> Cell {
        self.regions[self.owner[self.idx(cell)] as usize].cell
    }

    /// cached color and cost of the region hanging off corner `cell`
    pub fn region(&self, cell: Cell) -> Option<(Color, i64, usize)> {
        match self.slot_at[self.idx(cell)] {
            NONE => None,
            slot => {
                let r = &self.regions[slot as usize];
                Some((r.color, r.cost, r.members.len()))
            }
        }
    }

    /// corners with their cell inside `rect`, in rank order
    pub fn corners_in(&self, rect: Rect) -> Vec<Cell> {
        let mut out: Vec<(u32, Cell)> = Vec::new();
        for r in rect.r1..rect.r2.min(self.height) {
            for c in rect.c1..rect.c2.min(self.width) {
                let cell = Cell::new(r, c);
                let slot = self.slot_at[self.idx(cell)];
                if slot != NONE {
                    out.push((self.regions[slot as usize].rank, cell));
                }
            }
        }
        out.sort_unstable();
        out.into_iter().map(|(_, c)| c).collect()
    }

    /// the partition as paint layers, in rank order
    pub fn layers(&self) -> Vec<Layer> {
        self.order
            .iter()
            .map(|&s| {
                let r = &self.regions[s as usize];
                Layer { anchor: r.cell, color: r.color }
            })
            .collect()
    }

    //──────────────────────────────────────────────────────────────────────────
    // insertion ranks
    //──────────────────────────────────────────────────────────────────────────

    /// inclusive range of ranks at which a new corner on `cell` keeps the order a
    /// linear extension of dominance: after every corner below-left of it, before
    /// every corner above-right of it
    pub fn insert_range(&self, cell: Cell) -> (usize, usize) {
        self.range_skipping(cell, NONE)
    }

    /// like `insert_range`, but as if the corner on `skip` were not there
    pub fn insert_range_excluding(&self, cell: Cell, skip: Cell) -> (usize, usize) {
        self.range_skipping(cell, self.slot_at[self.idx(skip)])
    }

    fn range_skipping(&self, cell: Cell, skip: u32) -> (usize, usize) {
        let mut lo = 0;
        let mut hi = None;
        let mut i = 0;
        for &slot in &self.order {
            if slot == skip {
                continue;
            }
            let c = self.regions[slot as usize].cell;
            if c.dominates(cell) {
                lo = i + 1;
            }
            if hi.is_none() && cell.dominates(c) {
                hi = Some(i);
            }
            i += 1;
        }
        (lo, hi.unwrap_or(i))
    }

    //──────────────────────────────────────────────────────────────────────────
    // membership bookkeeping
    //──────────────────────────────────────────────────────────────────────────

    fn alloc(&mut self, cell: Cell, rank: u32) -> u32 {
        let region = Region { cell, members: Vec::new(), color: Color::WHITE, cost: 0, rank };
        match self.free.pop() {
            Some(slot) => {
                self.regions[slot as usize] = region;
                slot
            }
            None => {
                self.regions.push(region);
                (self.regions.len() - 1) as u32
            }
        }
    }

    fn rerank_from(&mut self, from: usize) {
        for i in from..self.order.len() {
            let slot = self.order[i] as usize;
            self.regions[slot].rank = i as u32;
        }
    }

    /// hand cell `i` over to `to`
    fn move_cell(&mut self, i: usize, to: u32) {
        let from = self.owner[i] as usize;
        let pos = self.member_pos[i] as usize;
        let members = &mut self.regions[from].members;
        members.swap_remove(pos);
        if let Some(&moved) = members.get(pos) {
            self.member_pos[moved as usize] = pos as u32;
        }
        let dest = &mut self.regions[to as usize].members;
        self.member_pos[i] = dest.len() as u32;
        dest.push(i as u32);
        self.owner[i] = to;
    }

    /// higher-ranked owner of the cells below and left of `cell`
    fn dominant_neighbor(&self, cell: Cell) -> u32 {
        let below = (cell.row > 0).then(|| self.owner[self.idx(Cell::new(cell.row - 1, cell.col))]);
        let left = (cell.col > 0).then(|| self.owner[self.idx(Cell::new(cell.row, cell.col - 1))]);
        match (below, left) {
            (Some(a), Some(b)) => {
                if self.regions[a as usize].rank >= self.regions[b as usize].rank {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            // only the origin has neither neighbor and it is always a corner
            (None, None) => self.owner[0],
        }
    }

    /// re-derive a non-corner cell's owner from its neighbors. returns the previous
    /// owner if it changed.
    fn recalc_owner(&mut self, cell: Cell) -> Option<u32> {
        let i = self.idx(cell);
        if self.slot_at[i] != NONE {
            return None;
        }
        let old = self.owner[i];
        let new = self.dominant_neighbor(cell);
        if new == old {
            return None;
        }
        self.move_cell(i, new);
        Some(old)
    }

    /// refit one region and fold its cost change into the running total
    fn recalc(&mut self, slot: u32) {
        let region = &self.regions[slot as usize];
        let f = fit(&self.problem.canvas, &region.members);
        let cost = self.problem.model.anchor_base(region.cell) + CostModel::penalty_milli(f.deviation);
        self.total += cost - region.cost;
        let region = &mut self.regions[slot as usize];
        region.color = f.color;
        region.cost = cost;
    }

    fn recalc_all(&mut self, mut touched: Vec<u32>) {
        touched.sort_unstable();
        touched.dedup();
        for slot in touched {
            self.recalc(slot);
        }
    }

    //──────────────────────────────────────────────────────────────────────────
    // corner insertion / removal
    //──────────────────────────────────────────────────────────────────────────

    /// insert a corner on `cell` at `rank` (which must lie in `insert_range(cell)`),
    /// returning the change of the total
    pub fn add_corner(&mut self, cell: Cell, rank: usize) -> i64 {
        profiling::scope!("add_corner");
        let i = self.idx(cell);
        debug_assert_eq!(self.slot_at[i], NONE, "cell already holds a corner");
        debug_assert!({
            let (lo, hi) = self.insert_range(cell);
            lo <= rank && rank <= hi
        });
        let before = self.total;
        let slot = self.alloc(cell, rank as u32);
        self.order.insert(rank, slot);
        self.rerank_from(rank + 1);
        self.slot_at[i] = slot;

        let mut touched = vec![slot, self.owner[i]];
        self.move_cell(i, slot);

        // the captured cells form a staircase hanging off `cell`: in every row they run
        // right from column `cell.col`, and the first unchanged cell ends the row
        // (or the whole sweep when it sits in the corner's column)
        'rows: for r in cell.row..self.height {
            if r > cell.row {
                match self.recalc_owner(Cell::new(r, cell.col)) {
                    Some(old) => push_distinct(&mut touched, old),
                    None => break 'rows,
                }
            }
            for c in cell.col + 1..self.width {
                match self.recalc_owner(Cell::new(r, c)) {
                    Some(old) => push_distinct(&mut touched, old),
                    None => break,
                }
            }
        }
        self.recalc_all(touched);
        self.total - before
    }

    /// remove the corner on `cell` (never the origin), returning the rank it had
    pub fn remove_corner(&mut self, cell: Cell) -> usize {
        profiling::scope!("remove_corner");
        let i = self.idx(cell);
        let slot = self.slot_at[i];
        debug_assert!(slot != NONE, "no corner to remove");
        debug_assert!(cell != Cell::ORIGIN, "origin corner is permanent");
        let rank = self.regions[slot as usize].rank as usize;
        self.order.remove(rank);
        self.rerank_from(rank);
        self.slot_at[i] = NONE;

        // every cell of the removed region falls back to its dominant neighbor; the
        // region is a staircase anchored at `cell`, swept in the same order as insertion
        let mut touched = Vec::new();
        'rows: for r in cell.row..self.height {
            let first = self.idx(Cell::new(r, cell.col));
            if self.owner[first] != slot {
                break 'rows;
            }
            let new = self.dominant_neighbor(Cell::new(r, cell.col));
            self.move_cell(first, new);
            push_distinct(&mut touched, new);
            for c in cell.col + 1..self.width {
                let j = self.idx(Cell::new(r, c));
                if self.owner[j] != slot {
                    break;
                }
                let new = self.dominant_neighbor(Cell::new(r, c));
                self.move_cell(j, new);
                push_distinct(&mut touched, new);
            }
        }
        debug_assert!(self.regions[slot as usize].members.is_empty());

        self.total -= self.regions[slot as usize].cost;
        self.regions[slot as usize].cost = 0;
        self.free.push(slot);
        self.recalc_all(touched);
        rank
    }

    //──────────────────────────────────────────────────────────────────────────
    // seeding
    //──────────────────────────────────────────────────────────────────────────

    /// add a corner per layer anchor, each at the latest legal rank
    pub fn seed_from_layers(&mut self, layers: &[Layer]) {
        profiling::scope!("seed_from_layers");
        for layer in layers {
            let cell = layer.anchor;
            if cell.row >= self.height || cell.col >= self.width || self.is_corner(cell) {
                continue;
            }
            let (_, hi) = self.insert_range(cell);
            self.add_corner(cell, hi);
        }
    }

    /// add a corner every `step` cells along both axes
    pub fn seed_grid(&mut self, step: u32) {
        let step = step.max(1) as usize;
        for r in (0..self.height).step_by(step) {
            for c in (0..self.width).step_by(step) {
                let cell = Cell::new(r, c);
                if self.is_corner(cell) {
                    continue;
                }
                let (_, hi) = self.insert_range(cell);
                self.add_corner(cell, hi);
            }
        }
    }

    //──────────────────────────────────────────────────────────────────────────
    // verification
    //──────────────────────────────────────────────────────────────────────────

    /// sum of region costs recomputed from each region's current members
    pub fn recompute_total(&self) -> i64 {
        self.order
            .iter()
            .map(|&s| {
                let r = &self.regions[s as usize];
                let f = fit(&self.problem.canvas, &r.members);
                self.problem.model.anchor_base(r.cell) + CostModel::penalty_milli(f.deviation)
            })
            .sum()
    }

    /// check every derived structure against a from-scratch evaluation
    pub fn audit(&self) -> Result<(), String> {
        if self.order.first().map(|&s| self.regions[s as usize].cell) != Some(Cell::ORIGIN) {
            return Err("origin corner is not rank 0".into());
        }
        for (rank, &s) in self.order.iter().enumerate() {
            let r = &self.regions[s as usize];
            if r.rank as usize != rank {
                return Err(format!("corner {:?} caches rank {} but sits at {rank}", r.cell, r.rank));
            }
            for &t in &self.order[rank + 1..] {
                let later = self.regions[t as usize].cell;
                if later.dominates(r.cell) {
                    return Err(format!("{later:?} dominates {:?} but ranks after it", r.cell));
                }
            }
        }
        let mut cached = 0;
        for r in 0..self.height {
            for c in 0..self.width {
                let cell = Cell::new(r, c);
                let want = self
                    .order
                    .iter()
                    .rev()
                    .find(|&&s| self.regions[s as usize].cell.dominates(cell))
                    .copied();
                let i = self.idx(cell);
                if want != Some(self.owner[i]) {
                    return Err(format!("cell {cell:?} owned by slot {} want {want:?}", self.owner[i]));
                }
                let members = &self.regions[self.owner[i] as usize].members;
                if members.get(self.member_pos[i] as usize) != Some(&(i as u32)) {
                    return Err(format!("cell {cell:?} missing from its owner's members"));
                }
            }
        }
        for &s in &self.order {
            cached += self.regions[s as usize].cost;
        }
        if cached != self.total {
            return Err(format!("running total {} but regions sum to {cached}", self.total));
        }
        let fresh = self.recompute_total();
        if fresh != self.total {
            return Err(format!("running total {} but refit gives {fresh}", self.total));
        }
        Ok(())
    }
}

#[inline]
fn push_distinct(v: &mut Vec<u32>, slot: u32) {
    if v.last() != Some(&slot) {
        v.push(slot);
    }
}
