/// ---- run orchestrator ------------------------------------------------------

/// builds the shared problem context, runs the selected strategy, emits the program
/// and replays it through a fresh executor: the replay score is the one reported.
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{info, warn};

use crate::canvas::{Canvas, PrefixSums};
use crate::cost::{from_milli, CostModel};
use crate::dp::{solve_guillotine, solve_strips};
use crate::emit::{emit, order_rects, Layer};
use crate::error::SolveError;
use crate::executor::{InitialBlock, Painter};
use crate::instruction::Instruction;
use crate::merge;
use crate::search::{self, Annealer, Budget, SearchStats, Snapshot};
use crate::settings::{RunSettings, Strategy};
use crate::staircase::Staircase;

/// everything fixed for one run: the target, its prefix sums and the cost model
#[derive(Clone, Debug)]
pub struct Problem {
    pub canvas: Canvas,
    pub sums: PrefixSums,
    pub model: CostModel,
}

impl Problem {
    pub fn new(canvas: Canvas, model: CostModel) -> Self {
        debug_assert_eq!((canvas.height(), canvas.width()), (model.height, model.width));
        let sums = PrefixSums::new(&canvas);
        Problem { canvas, sums, model }
    }
}

#[derive(Clone, Debug)]
pub struct Solution {
    pub instructions: Vec<Instruction>,
    /// replayed score: operation cost plus image difference
    pub score: u64,
    /// replayed operation cost
    pub cost: u64,
    /// replayed image-difference term
    pub similarity: u64,
    pub layers: Vec<Layer>,
    /// the solver's own estimate, in score units
    pub estimate: i64,
    pub stats: Option<SearchStats>,
}

/// replay `program` from the initial blocks, failing on the first rejected instruction
pub fn replay(problem: &Problem, initial: &[InitialBlock], program: &[Instruction]) -> Result<Painter, SolveError> {
    profiling::scope!("replay");
    let mut painter = Painter::new(problem.model, initial);
    for (index, ins) in program.iter().enumerate() {
        painter.apply(ins).map_err(|source| SolveError::Replay {
            index,
            text: ins.to_string(),
            source,
        })?;
        debug_assert!(painter.is_tiling());
    }
    Ok(painter)
}

/// layers from the annealer, optionally seeded
fn anneal(
    problem: &Problem,
    settings: &RunSettings,
    cancel: &Arc<AtomicBool>,
    progress: Option<Sender<Snapshot>>,
) -> Result<(Vec<Layer>, i64, SearchStats), SolveError> {
    let mut stairs = Staircase::new(problem);
    if settings.seed_from_dp {
        match solve_strips(problem, settings.tile, cancel) {
            Ok(seed) => stairs.seed_from_layers(&seed.layers),
            Err(SolveError::TileSize { tile, height, width }) => {
                warn!(tile, height, width, "tile does not fit the canvas, annealing from scratch");
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(step) = settings.seed_grid {
        stairs.seed_grid(step);
    }
    let budget = Budget::new(Some(settings.seconds), settings.iterations, cancel.clone());
    let mut annealer = Annealer::new(stairs, settings.to_search_config());
    if let Some(tx) = progress {
        annealer = annealer.with_progress(tx);
    }
    let result = search::run(annealer, &budget);
    Ok((result.layers.to_vec(), result.total, result.stats))
}

/// solve one problem end to end
pub fn solve(
    problem: &Problem,
    initial: &[InitialBlock],
    settings: &RunSettings,
    cancel: Arc<AtomicBool>,
    progress: Option<Sender<Snapshot>>,
) -> Result<Solution, SolveError> {
    profiling::scope!("solve");
    let start = Painter::new(problem.model, initial);
    let plan = merge::plan(&start, initial)?;
    info!(strategy = ?settings.strategy, merges = plan.instructions.len(), merge_cost = plan.cost, "solving");

    let (layers, milli, stats) = match settings.strategy {
        Strategy::Strips => {
            let sol = solve_strips(problem, settings.tile, &cancel)?;
            (sol.layers, sol.cost, None)
        }
        Strategy::Guillotine => {
            let sol = solve_guillotine(problem, settings.tile, &cancel)?;
            (order_rects(&sol.rects)?, sol.cost, None)
        }
        Strategy::Anneal => {
            let (layers, total, stats) = anneal(problem, settings, &cancel, progress)?;
            (layers, total, Some(stats))
        }
    };

    let instructions = emit(&layers, &plan, &problem.model);
    let painter = replay(problem, initial, &instructions)?;
    let similarity = painter.similarity(&problem.canvas);
    let score = painter.total_score(&problem.canvas);
    let estimate = from_milli(milli) + plan.cost as i64;
    info!(score, cost = painter.cost(), similarity, estimate, layers = layers.len(), "solved");
    Ok(Solution {
        instructions,
        score,
        cost: painter.cost(),
        similarity,
        layers,
        estimate,
        stats,
    })
}
