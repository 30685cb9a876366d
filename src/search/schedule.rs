use serde::{Deserialize, Serialize};

/// cooling schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// t0 * (1 - progress)^3, reaching zero at the end of the budget
    Cubic,
    /// t0 * 0.9999^(iterations / 100)
    Geometric,
}

const GEOMETRIC_RATE: f64 = 0.9999;
const GEOMETRIC_STEP: u64 = 100;

impl Schedule {
    /// temperature after `iterations` outer steps at budget `progress` in [0, 1]
    pub fn temperature(self, t0: f64, progress: f64, iterations: u64) -> f64 {
        match self {
            Schedule::Cubic => cubic(t0, progress),
            Schedule::Geometric => t0 * GEOMETRIC_RATE.powf((iterations / GEOMETRIC_STEP) as f64),
        }
    }
}

#[inline]
pub fn cubic(t0: f64, progress: f64) -> f64 {
    let left = (1.0 - progress).clamp(0.0, 1.0);
    t0 * left * left * left
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_endpoints() {
        assert_eq!(Schedule::Cubic.temperature(0.01, 0.0, 0), 0.01);
        assert_eq!(Schedule::Cubic.temperature(0.01, 1.0, 0), 0.0);
        assert!((Schedule::Cubic.temperature(1.0, 0.5, 0) - 0.125).abs() < 1e-12);
        // past the end stays at zero
        assert_eq!(cubic(1.0, 1.5), 0.0);
    }

    #[test]
    fn test_geometric_steps_every_hundred() {
        let t = Schedule::Geometric.temperature(1.0, 0.0, 99);
        assert_eq!(t, 1.0);
        let t = Schedule::Geometric.temperature(1.0, 0.0, 200);
        assert!((t - 0.9999f64 * 0.9999).abs() < 1e-12);
    }
}
