/// ---- region refit ----------------------------------------------------------

/// best constant color for a set of cells under the summed euclidean distance.
/// starts at the rounded mean, runs a few iteratively reweighted mean steps
/// (weight 1 / max(1, distance)) and finishes with a +-1 coordinate descent.
///
/// distances and weights are accumulated in fixed point so the result does not
/// depend on the order of the member list.
use crate::canvas::Canvas;
use crate::color::{dist_wide, Color};

const IRLS_ROUNDS: usize = 5;

/// Q16 distance unit
const DIST_ONE: f64 = 65536.0;

/// Q32 weight unit
const WEIGHT_ONE: f64 = 4294967296.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    pub color: Color,
    /// summed distance from `color` to every member pixel
    pub deviation: f64,
}

#[inline]
fn dist_q16(c: &[i32; 4], px: &Color) -> u64 {
    (dist_wide(c, px) * DIST_ONE).round() as u64
}

#[inline]
fn deviation_q16(canvas: &Canvas, cells: &[u32], c: &[i32; 4]) -> u64 {
    cells.iter().map(|&i| dist_q16(c, &canvas.pixel(i as usize))).sum()
}

pub fn fit(canvas: &Canvas, cells: &[u32]) -> Fit {
    profiling::scope!("fit");
    if cells.is_empty() {
        return Fit { color: Color::WHITE, deviation: 0.0 };
    }

    let mut sum = [0u64; 4];
    for &i in cells {
        let px = canvas.pixel(i as usize);
        for k in 0..4 {
            sum[k] += u64::from(px.0[k]);
        }
    }
    let mut cur = Color::rounded_mean(sum, cells.len() as u64).wide();

    for _ in 0..IRLS_ROUNDS {
        let mut acc = [0u64; 4];
        let mut total_w = 0u64;
        for &i in cells {
            let px = canvas.pixel(i as usize);
            let w = (WEIGHT_ONE / dist_wide(&cur, &px).max(1.0)).round() as u64;
            total_w += w;
            for k in 0..4 {
                acc[k] += w * u64::from(px.0[k]);
            }
        }
        let next = acc.map(|a| ((2 * a + total_w) / (2 * total_w)) as i32);
        if next == cur {
            break;
        }
        cur = next;
    }

    let mut best = deviation_q16(canvas, cells, &cur);
    loop {
        let mut improved = false;
        for k in 0..4 {
            for step in [-1, 1] {
                let v = cur[k] + step;
                if !(0..=255).contains(&v) {
                    continue;
                }
                let mut cand = cur;
                cand[k] = v;
                let d = deviation_q16(canvas, cells, &cand);
                if d < best {
                    best = d;
                    cur = cand;
                    improved = true;
                    break;
                }
            }
        }
        if !improved {
            break;
        }
    }

    Fit { color: Color::from_wide(cur), deviation: best as f64 / DIST_ONE }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_region_is_exact() {
        let canvas = Canvas::filled(3, 3, Color::new(7, 8, 9, 10));
        let cells: Vec<u32> = (0..9).collect();
        let f = fit(&canvas, &cells);
        assert_eq!(f.color, Color::new(7, 8, 9, 10));
        assert_eq!(f.deviation, 0.0);
    }

    #[test]
    fn test_outlier_pulls_less_than_mean() {
        // nine dark pixels and one bright outlier: the fit stays near the majority
        let canvas = Canvas::from_fn(1, 10, |_, c| if c == 9 { Color::WHITE } else { Color::new(0, 0, 0, 255) });
        let cells: Vec<u32> = (0..10).collect();
        let f = fit(&canvas, &cells);
        let mean_dev = canvas.deviation(canvas.bounds(), Color::new(26, 26, 26, 255));
        assert!(f.deviation <= mean_dev);
        assert!(f.color.0[0] < 26);
    }

    #[test]
    fn test_member_order_does_not_matter() {
        let canvas = Canvas::from_fn(4, 4, |r, c| Color::new((r * 60) as u8, (c * 50) as u8, 17, 200));
        let cells: Vec<u32> = vec![0, 5, 6, 9, 10, 15, 3];
        let mut shuffled = cells.clone();
        shuffled.reverse();
        shuffled.swap(1, 4);
        assert_eq!(fit(&canvas, &cells), fit(&canvas, &shuffled));
    }
}
