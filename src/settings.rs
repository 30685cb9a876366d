/// run settings for blocktrace
/// loaded from a JSON file (missing fields take their defaults); the CLI overrides the common ones
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cost::Costs;
use crate::search::{Schedule, SearchConfig, Variant};

/// which solver produces the layered painting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// exact strip DP over tiles
    Strips,
    /// exact guillotine interval DP over tiles
    Guillotine,
    /// staircase annealing
    Anneal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// per-operation base costs
    pub costs: Costs,
    pub strategy: Strategy,
    /// tile size in pixels for the exact solvers (must divide both canvas sides)
    pub tile: u32,

    // annealing
    pub variant: Variant,
    /// wall-clock budget in seconds
    pub seconds: f64,
    /// iteration budget; when set the schedule follows iterations and runs are reproducible
    pub iterations: Option<u64>,
    pub seed: u64,
    pub start_temperature: f64,
    /// K in exp(-delta / (K * T)), milli-units
    pub acceptance_scale: f64,
    pub schedule: Schedule,

    // region-weighted variant
    /// region grid is region_grid x region_grid
    pub region_grid: u32,
    /// weight a region is pulled toward after improving the total
    pub region_boost: f64,
    /// moving-average factor for region weights
    pub region_lambda: f64,
    /// steps before removals start
    pub region_remove_warmup: u64,
    /// chance each free cell of the sampled region gets an ADD proposal
    pub region_add_chance: f64,
    /// largest corner offset per MOVE proposal
    pub move_radius: i32,
    /// failed MOVE proposals before a corner is left alone
    pub move_tries: u32,

    // windowed variant
    pub window_min_side: u32,
    pub window_min_area: u64,
    pub window_max_area: u64,
    /// proposals per window
    pub window_iterations: u64,
    /// chance each window cell is reseeded as a corner
    pub reseed_chance: f64,

    // seeding
    /// start the annealer from the strip DP painting (needs a valid tile)
    pub seed_from_dp: bool,
    /// start the annealer with a corner every N cells
    pub seed_grid: Option<u32>,

    // reporting
    /// progress snapshot every N improvements
    pub progress_interval: u32,
    /// keep every judged proposal (for reproducibility checks)
    pub record_moves: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        let search = SearchConfig::default();
        Self {
            costs: Costs::default(),
            strategy: Strategy::Anneal,
            tile: 20,

            variant: search.variant,
            seconds: 60.0,
            iterations: None,
            seed: 12345,
            start_temperature: search.start_temperature,
            acceptance_scale: search.acceptance_scale,
            schedule: search.schedule,

            region_grid: search.region_grid,
            region_boost: search.region_boost,
            region_lambda: search.region_lambda,
            region_remove_warmup: search.region_remove_warmup,
            region_add_chance: search.region_add_chance,
            move_radius: search.move_radius,
            move_tries: search.move_tries,

            window_min_side: search.window_min_side,
            window_min_area: search.window_min_area,
            window_max_area: search.window_max_area,
            window_iterations: search.window_iterations,
            reseed_chance: search.reseed_chance,

            seed_from_dp: false,
            seed_grid: None,

            progress_interval: search.progress_interval,
            record_moves: false,
        }
    }
}

impl RunSettings {
    /// save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), crate::error::IoError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| crate::error::IoError::Json {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| crate::error::IoError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// load settings from JSON, or return defaults if the file is missing or malformed
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("failed to parse {}: {}. using defaults.", path.display(), e);
                    Self::default()
                }
            },
            // file doesn't exist or can't be read - use defaults
            Err(_) => Self::default(),
        }
    }

    /// convert to SearchConfig for the annealer
    pub fn to_search_config(&self) -> SearchConfig {
        SearchConfig {
            variant: self.variant,
            seed: self.seed,
            schedule: self.schedule,
            start_temperature: self.start_temperature,
            acceptance_scale: self.acceptance_scale,
            region_grid: self.region_grid,
            region_boost: self.region_boost,
            region_lambda: self.region_lambda,
            region_remove_warmup: self.region_remove_warmup,
            region_add_chance: self.region_add_chance,
            move_radius: self.move_radius,
            move_tries: self.move_tries,
            window_min_side: self.window_min_side,
            window_min_area: self.window_min_area,
            window_max_area: self.window_max_area,
            window_iterations: self.window_iterations,
            reseed_chance: self.reseed_chance,
            record_moves: self.record_moves,
            progress_interval: self.progress_interval,
            ..SearchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: RunSettings = serde_json::from_str(r#"{"strategy": "strips", "tile": 8, "costs": {"swap": 9.0}}"#).unwrap();
        assert_eq!(s.strategy, Strategy::Strips);
        assert_eq!(s.tile, 8);
        assert_eq!(s.costs.swap, 9.0);
        assert_eq!(s.costs.split_point, 10.0);
        assert_eq!(s.variant, Variant::Unrestricted);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let s = RunSettings { seed: 99, variant: Variant::Window, ..RunSettings::default() };
        s.save(&path).unwrap();
        assert_eq!(RunSettings::load(&path), s);
    }

    #[test]
    fn test_bad_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(RunSettings::load(&path), RunSettings::default());
        assert_eq!(RunSettings::load(&dir.path().join("missing.json")), RunSettings::default());
    }

    #[test]
    fn test_search_config_carries_fields() {
        let s = RunSettings { region_grid: 7, seed: 4, record_moves: true, ..RunSettings::default() };
        let cfg = s.to_search_config();
        assert_eq!(cfg.region_grid, 7);
        assert_eq!(cfg.seed, 4);
        assert!(cfg.record_moves);
    }
}
