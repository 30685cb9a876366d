/// ---- initial merge builder -------------------------------------------------

/// glues a regular grid of initial blocks into one whole-canvas block.
/// both orders (each row first, or each column first) are simulated through a
/// scratch executor so the ids and the charged cost are exact; the cheaper wins.
use tracing::debug;

use crate::color::Color;
use crate::error::SolveError;
use crate::executor::{InitialBlock, Painter};
use crate::instruction::{BlockId, Instruction};

/// instructions that produce a single whole-canvas block, and what they leave behind
#[derive(Clone, Debug)]
pub struct MergePlan {
    pub instructions: Vec<Instruction>,
    /// id of the whole-canvas block after the plan ran
    pub whole: BlockId,
    /// highest numeric id allocated after the plan ran
    pub last_id: u64,
    pub cost: u64,
    /// color of the whole canvas when every initial block shares one
    pub fill: Option<Color>,
}

/// initial blocks arranged as `rows x cols`, bottom row first
struct Grid {
    cells: Vec<Vec<BlockId>>,
}

impl Grid {
    fn detect(height: u32, width: u32, blocks: &[InitialBlock]) -> Result<Grid, SolveError> {
        let mut row_cuts: Vec<u32> = blocks.iter().map(|b| b.rect.r1).collect();
        let mut col_cuts: Vec<u32> = blocks.iter().map(|b| b.rect.c1).collect();
        row_cuts.sort_unstable();
        row_cuts.dedup();
        col_cuts.sort_unstable();
        col_cuts.dedup();
        if row_cuts.first() != Some(&0) || col_cuts.first() != Some(&0) {
            return Err(SolveError::IrregularGrid);
        }
        if blocks.len() != row_cuts.len() * col_cuts.len() {
            return Err(SolveError::IrregularGrid);
        }
        let mut cells: Vec<Vec<Option<BlockId>>> = vec![vec![None; col_cuts.len()]; row_cuts.len()];
        for b in blocks {
            // both lookups succeed: the cut lists were built from these very rects
            let i = row_cuts.binary_search(&b.rect.r1).map_err(|_| SolveError::IrregularGrid)?;
            let j = col_cuts.binary_search(&b.rect.c1).map_err(|_| SolveError::IrregularGrid)?;
            let r2 = row_cuts.get(i + 1).copied().unwrap_or(height);
            let c2 = col_cuts.get(j + 1).copied().unwrap_or(width);
            if b.rect.r2 != r2 || b.rect.c2 != c2 || cells[i][j].is_some() {
                return Err(SolveError::IrregularGrid);
            }
            cells[i][j] = Some(b.id.clone());
        }
        let cells = cells
            .into_iter()
            .map(|row| row.into_iter().collect::<Option<Vec<_>>>())
            .collect::<Option<Vec<_>>>()
            .ok_or(SolveError::IrregularGrid)?;
        Ok(Grid { cells })
    }

    fn transposed(&self) -> Vec<Vec<BlockId>> {
        let cols = self.cells.first().map_or(0, |r| r.len());
        (0..cols)
            .map(|j| self.cells.iter().map(|row| row[j].clone()).collect())
            .collect()
    }
}

/// merge each line of `lines` into one strip, then the strips into the whole canvas
fn simulate(start: &Painter, lines: &[Vec<BlockId>]) -> Result<(Painter, Vec<Instruction>, BlockId), SolveError> {
    let mut painter = start.clone();
    let mut program = Vec::new();
    let mut step = |painter: &mut Painter, a: BlockId, b: BlockId| -> Result<BlockId, SolveError> {
        let ins = Instruction::Merge { a: a.clone(), b: b.clone() };
        let id = painter.merge(&a, &b).map_err(|source| SolveError::Replay {
            index: program.len(),
            text: ins.to_string(),
            source,
        })?;
        program.push(ins);
        Ok(id)
    };

    let mut strips = Vec::with_capacity(lines.len());
    for line in lines {
        let mut iter = line.iter().cloned();
        let Some(mut acc) = iter.next() else {
            return Err(SolveError::IrregularGrid);
        };
        for next in iter {
            acc = step(&mut painter, acc, next)?;
        }
        strips.push(acc);
    }
    let mut iter = strips.into_iter();
    let Some(mut whole) = iter.next() else {
        return Err(SolveError::IrregularGrid);
    };
    for next in iter {
        whole = step(&mut painter, whole, next)?;
    }
    Ok((painter, program, whole))
}

/// plan the cheapest of the supported ways to reach a single whole-canvas block
pub fn plan(painter: &Painter, blocks: &[InitialBlock]) -> Result<MergePlan, SolveError> {
    profiling::scope!("merge::plan");
    let model = painter.model();
    let fill = blocks.first().map(|b| b.color).filter(|&c| blocks.iter().all(|b| b.color == c));
    if let [only] = blocks {
        return Ok(MergePlan {
            instructions: Vec::new(),
            whole: only.id.clone(),
            last_id: painter.last_id(),
            cost: 0,
            fill,
        });
    }
    let grid = Grid::detect(model.height, model.width, blocks)?;

    let (rp, rows_prog, rows_whole) = simulate(painter, &grid.cells)?;
    let (cp, cols_prog, cols_whole) = simulate(painter, &grid.transposed())?;
    let rows_cost = rp.cost() - painter.cost();
    let cols_cost = cp.cost() - painter.cost();
    debug!(rows_cost, cols_cost, blocks = blocks.len(), "initial merge");

    let plan = if rows_cost <= cols_cost {
        MergePlan { instructions: rows_prog, whole: rows_whole, last_id: rp.last_id(), cost: rows_cost, fill }
    } else {
        MergePlan { instructions: cols_prog, whole: cols_whole, last_id: cp.last_id(), cost: cols_cost, fill }
    };
    Ok(plan)
}
