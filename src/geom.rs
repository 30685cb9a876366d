// grid geometry shared by the executor, the solvers and the emitter
//
// conventions:
// - rows grow upward from the bottom edge (row == y), columns grow rightward (col == x)
// - rectangles are half-open: [r1, r2) x [c1, c2)
// - a cell "dominates" another when it is weakly below-left of it; the painter that
//   fills from an anchor to the far corner covers exactly the cells the anchor dominates

use serde::{Deserialize, Serialize};

/// a single grid cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Cell { row, col }
    }

    pub const ORIGIN: Cell = Cell::new(0, 0);

    /// true if `self` is weakly below-left of `other` (so a fill anchored at `self` covers `other`)
    #[inline]
    pub fn dominates(self, other: Cell) -> bool {
        self.row <= other.row && self.col <= other.col
    }
}

/// half-open rectangle of cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub r1: u32,
    pub c1: u32,
    pub r2: u32,
    pub c2: u32,
}

impl Rect {
    #[inline]
    pub fn new(r1: u32, c1: u32, r2: u32, c2: u32) -> Self {
        debug_assert!(r1 <= r2 && c1 <= c2);
        Rect { r1, c1, r2, c2 }
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.r2 - self.r1
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.c2 - self.c1
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.height() as u64 * self.width() as u64
    }

    #[inline]
    pub fn anchor(&self) -> Cell {
        Cell::new(self.r1, self.c1)
    }

    #[inline]
    pub fn same_shape(&self, other: &Rect) -> bool {
        self.height() == other.height() && self.width() == other.width()
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        self.r1 <= cell.row && cell.row < self.r2 && self.c1 <= cell.col && cell.col < self.c2
    }

    /// union of two rectangles that share a full edge, or None.
    /// the shared edge must span the whole side of both rectangles.
    pub fn join(&self, other: &Rect) -> Option<Rect> {
        let stacked = self.c1 == other.c1 && self.c2 == other.c2;
        let side_by_side = self.r1 == other.r1 && self.r2 == other.r2;
        if stacked && self.r2 == other.r1 {
            Some(Rect::new(self.r1, self.c1, other.r2, self.c2))
        } else if stacked && other.r2 == self.r1 {
            Some(Rect::new(other.r1, self.c1, self.r2, self.c2))
        } else if side_by_side && self.c2 == other.c1 {
            Some(Rect::new(self.r1, self.c1, self.r2, other.c2))
        } else if side_by_side && other.c2 == self.c1 {
            Some(Rect::new(self.r1, other.c1, self.r2, self.c2))
        } else {
            None
        }
    }

    /// true if a fill anchored at this rectangle's corner would paint over `other`
    #[inline]
    pub fn fill_reaches(&self, other: &Rect) -> bool {
        other.r2 > self.r1 && other.c2 > self.c1
    }
}
