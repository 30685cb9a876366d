// Exact solvers over tile-aligned canvases
// strips: memoized strip recursion composed by an outer DP over tile boundaries
// guillotine: interval DP over every tile-aligned sub-rectangle

pub mod guillotine;
pub mod strips;

pub use guillotine::{solve_guillotine, GuillotineSolution};
pub use strips::{solve_strips, StripSolution};

use crate::error::SolveError;
use crate::geom::Rect;

/// canvas measured in `tile x tile` pixel blocks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tiling {
    pub tile: u32,
    /// tile rows
    pub n: u32,
    /// tile columns
    pub m: u32,
}

impl Tiling {
    /// fails unless `tile >= 2` divides both canvas dimensions
    pub fn new(tile: u32, height: u32, width: u32) -> Result<Self, SolveError> {
        if tile < 2 || height % tile != 0 || width % tile != 0 {
            return Err(SolveError::TileSize { tile, height, width });
        }
        Ok(Tiling { tile, n: height / tile, m: width / tile })
    }

    /// pixel rectangle of the tile rectangle `[r1, r2) x [c1, c2)`
    #[inline]
    pub fn pixels(&self, r1: u32, c1: u32, r2: u32, c2: u32) -> Rect {
        let s = self.tile;
        Rect::new(r1 * s, c1 * s, r2 * s, c2 * s)
    }
}
