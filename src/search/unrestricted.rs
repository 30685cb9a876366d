/// uniform sampling: each outer step proposes one rerank, a chain of neighbor
/// moves, one addition on a random free cell and one removal.
use super::{Annealer, Budget, SearchResult};

/// neighbor moves in one chain before starting over elsewhere
const MAX_CHAIN: usize = 64;

pub fn run(mut a: Annealer<'_>, budget: &Budget) -> SearchResult {
    let t0 = a.cfg.start_temperature;
    let schedule = a.cfg.schedule;
    while !budget.exhausted(a.iteration) {
        profiling::scope!("unrestricted_step");
        a.temperature = schedule.temperature(t0, budget.progress(a.iteration), a.iteration);

        if let Some(cell) = a.random_corner() {
            a.propose_swap(cell);
        }

        if let Some(mut cell) = a.random_corner() {
            for _ in 0..MAX_CHAIN {
                let Some(to) = a.random_neighbor(cell) else {
                    break;
                };
                if !a.propose_shift(cell, to) {
                    break;
                }
                cell = to;
            }
        }

        if let Some(cell) = a.random_free_cell() {
            a.propose_add(cell);
        }

        if let Some(cell) = a.random_corner() {
            a.propose_remove(cell);
        }

        a.iteration += 1;
        a.stats.iterations = a.iteration;
    }
    a.finish()
}
