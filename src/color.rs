/// rgba color and the per-pixel distance used by every cost in the crate.
/// the distance is euclidean over all four channels (alpha included).
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// largest possible squared distance between two rgba colors
pub const MAX_DIST_SQ: usize = 255 * 255 * 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);

    #[inline]
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color([r, g, b, a])
    }

    /// clamp a working color (may drift outside 0..=255 during refinement) back to bytes
    #[inline]
    pub fn from_wide(c: [i32; 4]) -> Self {
        Color(c.map(|v| v.clamp(0, 255) as u8))
    }

    #[inline]
    pub fn wide(self) -> [i32; 4] {
        self.0.map(i32::from)
    }

    #[inline]
    pub fn dist_sq(&self, other: &Color) -> u32 {
        dist_sq_wide(&self.wide(), other)
    }

    #[inline]
    pub fn dist(&self, other: &Color) -> f64 {
        sqrt_lut()[self.dist_sq(other) as usize]
    }

    /// rounded mean of `area` pixels whose channel sums are `sum`
    #[inline]
    pub fn rounded_mean(sum: [u64; 4], area: u64) -> Self {
        debug_assert!(area > 0);
        Color(sum.map(|s| ((2 * s + area) / (2 * area)).min(255) as u8))
    }
}

/// squared distance between a working color and a pixel
#[inline]
pub fn dist_sq_wide(c: &[i32; 4], px: &Color) -> u32 {
    let mut d = 0i32;
    for k in 0..4 {
        let delta = c[k] - i32::from(px.0[k]);
        d += delta * delta;
    }
    d as u32
}

/// euclidean distance between a working color and a pixel, via the shared table.
/// working colors stay within one step of 0..=255 so the squared distance never
/// leaves the table; anything larger falls back to a real sqrt.
#[inline]
pub fn dist_wide(c: &[i32; 4], px: &Color) -> f64 {
    let d = dist_sq_wide(c, px) as usize;
    match sqrt_lut().get(d) {
        Some(v) => *v,
        None => (d as f64).sqrt(),
    }
}

/// sqrt of every integer in 0..=MAX_DIST_SQ, built once on first use
pub fn sqrt_lut() -> &'static [f64] {
    static LUT: OnceLock<Vec<f64>> = OnceLock::new();
    LUT.get_or_init(|| {
        profiling::scope!("sqrt_lut");
        (0..=MAX_DIST_SQ).map(|i| (i as f64).sqrt()).collect()
    })
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "[{r}, {g}, {b}, {a}]")
    }
}
