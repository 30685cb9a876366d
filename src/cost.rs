/// ---- cost model ------------------------------------------------------------

/// every edit operation costs `round(coefficient * canvas_area / affected_area)`.
/// `CostModel` is the explicit context the executor, both DPs and the staircase
/// share, so a paint cost computed by a solver is bit-identical to what replaying
/// the emitted instructions charges.
use serde::{Deserialize, Serialize};

use crate::geom::Cell;

/// region and DP costs are kept in integer milli-units
pub const COST_SCALE: i64 = 1000;

/// weight of the summed per-pixel distance in the final score
pub const PIXEL_PENALTY: f64 = 0.005;

/// `PIXEL_PENALTY` expressed in milli-units
pub const PENALTY_MILLI: f64 = 5.0;

/// per-operation base costs, fixed for a run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Costs {
    pub split_line: f64,
    pub split_point: f64,
    pub color: f64,
    pub swap: f64,
    pub merge: f64,
}

impl Default for Costs {
    fn default() -> Self {
        Costs {
            split_line: 7.0,
            split_point: 10.0,
            color: 5.0,
            swap: 3.0,
            merge: 1.0,
        }
    }
}

/// which pair of remainder pieces is merged first after a point cut
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOrder {
    /// top pair, bottom pair, then the two full-width rows
    RowsFirst,
    /// right pair, left pair, then the two full-height columns
    ColsFirst,
}

#[derive(Clone, Copy, Debug)]
pub struct CostModel {
    pub costs: Costs,
    pub height: u32,
    pub width: u32,
}

impl CostModel {
    pub fn new(costs: Costs, height: u32, width: u32) -> Self {
        CostModel { costs, height, width }
    }

    #[inline]
    pub fn canvas_area(&self) -> u64 {
        self.height as u64 * self.width as u64
    }

    /// `round(coef * N * M / area)`; the one rounding point for every charge
    #[inline]
    pub fn charge(&self, coef: f64, area: u64) -> u64 {
        debug_assert!(area > 0);
        (coef * self.canvas_area() as f64 / area as f64).round() as u64
    }

    #[inline]
    pub fn color_cost(&self, area: u64) -> u64 {
        self.charge(self.costs.color, area)
    }

    #[inline]
    pub fn split_line_cost(&self, area: u64) -> u64 {
        self.charge(self.costs.split_line, area)
    }

    #[inline]
    pub fn split_point_cost(&self, area: u64) -> u64 {
        self.charge(self.costs.split_point, area)
    }

    #[inline]
    pub fn swap_cost(&self, area: u64) -> u64 {
        self.charge(self.costs.swap, area)
    }

    /// merge of an `s`-long edge between pieces `a` and `b` deep
    #[inline]
    pub fn merge_cost(&self, s: u32, a: u32, b: u32) -> u64 {
        self.charge(self.costs.merge, s as u64 * a.max(b) as u64)
    }

    fn rows_first(&self, h: u32, w: u32) -> u64 {
        let (n, m) = (self.height, self.width);
        self.merge_cost(h, w, m - w) + self.merge_cost(n - h, w, m - w) + self.merge_cost(m, h, n - h)
    }

    fn cols_first(&self, h: u32, w: u32) -> u64 {
        let (n, m) = (self.height, self.width);
        self.merge_cost(w, h, n - h) + self.merge_cost(m - w, h, n - h) + self.merge_cost(n, w, m - w)
    }

    /// cheaper merge order after a point cut painting an `h x w` top-right quadrant.
    /// ties go to rows first.
    pub fn merge_order(&self, h: u32, w: u32) -> MergeOrder {
        if self.rows_first(h, w) <= self.cols_first(h, w) {
            MergeOrder::RowsFirst
        } else {
            MergeOrder::ColsFirst
        }
    }

    /// cost of painting the `h x w` top-right part of a whole-canvas block a solid
    /// color and gluing the canvas back into one block
    pub fn paint_cost(&self, h: u32, w: u32) -> u64 {
        let (n, m) = (self.height, self.width);
        debug_assert!(h >= 1 && h <= n && w >= 1 && w <= m);
        let area = self.canvas_area();
        match (h == n, w == m) {
            (true, true) => self.color_cost(area),
            (true, false) => {
                self.split_line_cost(area) + self.color_cost(n as u64 * w as u64) + self.merge_cost(n, w, m - w)
            }
            (false, true) => {
                self.split_line_cost(area) + self.color_cost(h as u64 * m as u64) + self.merge_cost(m, h, n - h)
            }
            (false, false) => {
                self.split_point_cost(area)
                    + self.color_cost(h as u64 * w as u64)
                    + self.rows_first(h, w).min(self.cols_first(h, w))
            }
        }
    }

    /// paint cost of the region anchored at `cell` (filled up to the top-right corner)
    #[inline]
    pub fn anchor_paint_cost(&self, cell: Cell) -> u64 {
        self.paint_cost(self.height - cell.row, self.width - cell.col)
    }

    /// anchor paint cost in milli-units
    #[inline]
    pub fn anchor_base(&self, cell: Cell) -> i64 {
        COST_SCALE * self.anchor_paint_cost(cell) as i64
    }

    /// summed distance converted to the milli-unit penalty
    #[inline]
    pub fn penalty_milli(dev: f64) -> i64 {
        (dev * PENALTY_MILLI).round() as i64
    }
}

/// round a milli-unit total back to score units
#[inline]
pub fn from_milli(v: i64) -> i64 {
    (v as f64 / COST_SCALE as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(n: u32, m: u32) -> CostModel {
        CostModel::new(Costs::default(), n, m)
    }

    #[test]
    fn test_charge_rounds_half_away_from_zero() {
        let cm = model(4, 4);
        // 5 * 16 / 32 = 2.5 -> 3
        assert_eq!(cm.charge(5.0, 32), 3);
        assert_eq!(cm.color_cost(16), 5);
        assert_eq!(cm.color_cost(8), 10);
    }

    #[test]
    fn test_paint_cost_full_canvas_is_one_color() {
        let cm = model(400, 400);
        assert_eq!(cm.paint_cost(400, 400), 5);
        assert_eq!(cm.anchor_paint_cost(Cell::ORIGIN), 5);
    }

    #[test]
    fn test_paint_cost_full_height_stripe() {
        let cm = model(4, 4);
        // cut 7 + color 5*16/8 = 10 + merge 16/8 = 2
        assert_eq!(cm.paint_cost(4, 2), 19);
        assert_eq!(cm.paint_cost(2, 4), 19);
    }

    #[test]
    fn test_paint_cost_quadrant_takes_cheaper_order() {
        let cm = model(10, 10);
        // painted 2x7 quadrant: 10 + round(500/14) = 36 + merges
        let rows = cm.rows_first(2, 7);
        let cols = cm.cols_first(2, 7);
        assert_eq!(cm.paint_cost(2, 7), 10 + 36 + rows.min(cols));
        let order = cm.merge_order(2, 7);
        if rows <= cols {
            assert_eq!(order, MergeOrder::RowsFirst);
        } else {
            assert_eq!(order, MergeOrder::ColsFirst);
        }
    }

    #[test]
    fn test_paint_cost_uses_height_for_row_remainder() {
        // tall narrow canvas: the row remainder must be measured in rows
        let cm = model(20, 4);
        let h = 3;
        let w = 1;
        let want = cm.merge_cost(h, w, 3) + cm.merge_cost(17, w, 3) + cm.merge_cost(4, h, 17);
        assert_eq!(cm.rows_first(h, w), want);
    }

    #[test]
    fn test_costs_serde_names() {
        let json = serde_json::to_string(&Costs::default()).unwrap();
        assert!(json.contains("splitLine"));
        let parsed: Costs = serde_json::from_str(r#"{"merge": 2.0}"#).unwrap();
        assert_eq!(parsed.merge, 2.0);
        assert_eq!(parsed.color, 5.0);
    }

    #[test]
    fn test_from_milli_rounds() {
        assert_eq!(from_milli(2499), 2);
        assert_eq!(from_milli(2500), 3);
    }
}
