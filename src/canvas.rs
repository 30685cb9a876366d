/// ---- target canvas -----------------------------------------------------------

/// the immutable target image plus the read-only reductions the solvers need:
/// 2D prefix sums for O(1) rectangle means and euclidean deviation sums.
use rayon::prelude::*;

use crate::color::{dist_wide, Color};
use crate::geom::{Cell, Rect};

/// rectangles with at least this many pixels sum their deviation row-parallel
const PAR_MIN_PIXELS: u64 = 1 << 15;

#[derive(Clone, Debug)]
pub struct Canvas {
    height: u32,
    width: u32,
    /// row-major, row 0 is the bottom edge
    pixels: Vec<Color>,
}

impl Canvas {
    /// wrap a row-major pixel buffer (row 0 = bottom). panics on a size mismatch,
    /// which is a caller bug (io validates dimensions before building one).
    pub fn new(height: u32, width: u32, pixels: Vec<Color>) -> Self {
        assert_eq!(pixels.len(), height as usize * width as usize, "canvas buffer size");
        Canvas { height, width, pixels }
    }

    pub fn filled(height: u32, width: u32, color: Color) -> Self {
        Canvas::new(height, width, vec![color; height as usize * width as usize])
    }

    /// build from a closure over (row, col)
    pub fn from_fn(height: u32, width: u32, mut f: impl FnMut(u32, u32) -> Color) -> Self {
        let mut pixels = Vec::with_capacity(height as usize * width as usize);
        for r in 0..height {
            for c in 0..width {
                pixels.push(f(r, c));
            }
        }
        Canvas { height, width, pixels }
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.height as u64 * self.width as u64
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.height, self.width)
    }

    #[inline]
    pub fn index(&self, cell: Cell) -> usize {
        cell.row as usize * self.width as usize + cell.col as usize
    }

    #[inline]
    pub fn at(&self, cell: Cell) -> Color {
        self.pixels[self.index(cell)]
    }

    #[inline]
    pub fn pixel(&self, idx: usize) -> Color {
        self.pixels[idx]
    }

    #[inline]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline]
    pub fn row(&self, r: u32) -> &[Color] {
        let w = self.width as usize;
        &self.pixels[r as usize * w..(r as usize + 1) * w]
    }

    /// sum of euclidean distances between `color` and every pixel in `rect`.
    /// large rectangles are reduced row-parallel; row sums are added in order so the
    /// result does not depend on the thread count.
    pub fn deviation(&self, rect: Rect, color: Color) -> f64 {
        profiling::scope!("Canvas::deviation");
        let wide = color.wide();
        let row_sum = |r: u32| -> f64 {
            self.row(r)[rect.c1 as usize..rect.c2 as usize]
                .iter()
                .map(|px| dist_wide(&wide, px))
                .sum()
        };
        if rect.area() >= PAR_MIN_PIXELS {
            let rows: Vec<f64> = (rect.r1..rect.r2).into_par_iter().map(row_sum).collect();
            rows.iter().sum()
        } else {
            (rect.r1..rect.r2).map(row_sum).sum()
        }
    }

    /// like `deviation`, but gives up and returns None as soon as the running sum
    /// exceeds `limit`
    pub fn deviation_bounded(&self, rect: Rect, color: Color, limit: f64) -> Option<f64> {
        let wide = color.wide();
        let mut acc = 0.0;
        for r in rect.r1..rect.r2 {
            for px in &self.row(r)[rect.c1 as usize..rect.c2 as usize] {
                acc += dist_wide(&wide, px);
            }
            if acc > limit {
                return None;
            }
        }
        Some(acc)
    }
}

/// 2D prefix sums of all four channels, for O(1) rectangle means
#[derive(Clone, Debug)]
pub struct PrefixSums {
    stride: usize,
    sums: Vec<[u64; 4]>,
}

impl PrefixSums {
    pub fn new(canvas: &Canvas) -> Self {
        profiling::scope!("PrefixSums::new");
        let stride = canvas.width() as usize + 1;
        let mut sums = vec![[0u64; 4]; stride * (canvas.height() as usize + 1)];
        for r in 0..canvas.height() as usize {
            for c in 0..canvas.width() as usize {
                let px = canvas.pixel(r * canvas.width() as usize + c);
                let up = sums[r * stride + c + 1];
                let left = sums[(r + 1) * stride + c];
                let diag = sums[r * stride + c];
                let mut cur = [0u64; 4];
                for k in 0..4 {
                    cur[k] = up[k] + left[k] - diag[k] + u64::from(px.0[k]);
                }
                sums[(r + 1) * stride + c + 1] = cur;
            }
        }
        PrefixSums { stride, sums }
    }

    #[inline]
    fn at(&self, r: u32, c: u32) -> [u64; 4] {
        self.sums[r as usize * self.stride + c as usize]
    }

    /// per-channel sums over `rect`
    pub fn sum(&self, rect: Rect) -> [u64; 4] {
        let a = self.at(rect.r2, rect.c2);
        let b = self.at(rect.r1, rect.c2);
        let c = self.at(rect.r2, rect.c1);
        let d = self.at(rect.r1, rect.c1);
        let mut out = [0u64; 4];
        for k in 0..4 {
            out[k] = a[k] + d[k] - b[k] - c[k];
        }
        out
    }

    /// rounded mean color of a non-empty `rect`
    #[inline]
    pub fn mean(&self, rect: Rect) -> Color {
        Color::rounded_mean(self.sum(rect), rect.area())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Canvas {
        Canvas::from_fn(4, 6, |r, c| Color::new((r * 10) as u8, (c * 10) as u8, 0, 255))
    }

    #[test]
    fn test_prefix_sum_matches_brute_force() {
        let canvas = ramp();
        let ps = PrefixSums::new(&canvas);
        let rect = Rect::new(1, 2, 4, 5);
        let mut want = [0u64; 4];
        for r in rect.r1..rect.r2 {
            for c in rect.c1..rect.c2 {
                let px = canvas.at(Cell::new(r, c));
                for k in 0..4 {
                    want[k] += u64::from(px.0[k]);
                }
            }
        }
        assert_eq!(ps.sum(rect), want);
        assert_eq!(ps.mean(rect), Color::new(20, 30, 0, 255));
    }

    #[test]
    fn test_deviation_zero_on_uniform() {
        let canvas = Canvas::filled(3, 3, Color::new(9, 9, 9, 9));
        assert_eq!(canvas.deviation(canvas.bounds(), Color::new(9, 9, 9, 9)), 0.0);
    }

    #[test]
    fn test_deviation_bounded_aborts() {
        let canvas = Canvas::filled(4, 4, Color::new(0, 0, 0, 0));
        let c = Color::new(3, 4, 0, 0); // 5 per pixel
        assert_eq!(canvas.deviation(canvas.bounds(), c), 80.0);
        assert_eq!(canvas.deviation_bounded(canvas.bounds(), c, 100.0), Some(80.0));
        assert_eq!(canvas.deviation_bounded(canvas.bounds(), c, 30.0), None);
    }
}
