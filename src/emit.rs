/// ---- instruction emitter ---------------------------------------------------

/// turns a layered painting into partition edits. every layer is carved out of the
/// whole-canvas block with at most one cut, colored, and glued back so the next
/// layer again starts from a single block:
///   anchor on the origin  -> color
///   anchor on the bottom  -> vertical cut, color `.1`, merge
///   anchor on the left    -> horizontal cut, color `.1`, merge
///   anchor inside         -> point cut, color `.2`, three merges in the cheaper order
/// a layer whose color already covers the whole canvas is skipped.
/// ids follow the executor's rules, so the program replays exactly.
use std::collections::VecDeque;

use crate::color::Color;
use crate::cost::{CostModel, MergeOrder};
use crate::error::SolveError;
use crate::geom::{Cell, Rect};
use crate::instruction::{BlockId, Instruction};
use crate::merge::MergePlan;

/// a solid fill of everything above-right of `anchor`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layer {
    pub anchor: Cell,
    pub color: Color,
}

/// order disjoint rectangles so that no rectangle's fill reaches one painted before it.
/// the result is one layer per rectangle, anchored at its bottom-left cell.
pub fn order_rects(rects: &[(Rect, Color)]) -> Result<Vec<Layer>, SolveError> {
    profiling::scope!("order_rects");
    let k = rects.len();
    let mut indegree = vec![0usize; k];
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, (a, _)) in rects.iter().enumerate() {
        for (j, (b, _)) in rects.iter().enumerate() {
            if i != j && a.fill_reaches(b) {
                succ[i].push(j);
                indegree[j] += 1;
            }
        }
    }
    let mut ready: VecDeque<usize> = (0..k).filter(|&i| indegree[i] == 0).collect();
    let mut out = Vec::with_capacity(k);
    while let Some(i) = ready.pop_front() {
        let (rect, color) = rects[i];
        out.push(Layer { anchor: rect.anchor(), color });
        for &j in &succ[i] {
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.push_back(j);
            }
        }
    }
    if out.len() != k {
        return Err(SolveError::NoPaintOrder);
    }
    Ok(out)
}

/// program painting `layers` in order, starting after `plan`
pub fn emit(layers: &[Layer], plan: &MergePlan, model: &CostModel) -> Vec<Instruction> {
    profiling::scope!("emit");
    let mut out = plan.instructions.clone();
    let mut whole = plan.whole.clone();
    let mut next = plan.last_id + 1;
    // the whole canvas is one solid color while this is set
    let mut fill = plan.fill;

    for layer in layers {
        let Cell { row, col } = layer.anchor;
        let color = layer.color;
        if fill == Some(color) {
            continue;
        }
        fill = (layer.anchor == Cell::ORIGIN).then_some(color);
        match (row, col) {
            (0, 0) => out.push(Instruction::Color { block: whole.clone(), color }),
            (0, x) => {
                out.push(Instruction::SplitX { block: whole.clone(), x });
                out.push(Instruction::Color { block: whole.child(1), color });
                out.push(Instruction::Merge { a: whole.child(0), b: whole.child(1) });
                whole = BlockId::numeric(next);
                next += 1;
            }
            (y, 0) => {
                out.push(Instruction::SplitY { block: whole.clone(), y });
                out.push(Instruction::Color { block: whole.child(1), color });
                out.push(Instruction::Merge { a: whole.child(0), b: whole.child(1) });
                whole = BlockId::numeric(next);
                next += 1;
            }
            (y, x) => {
                out.push(Instruction::SplitPoint { block: whole.clone(), x, y });
                out.push(Instruction::Color { block: whole.child(2), color });
                let (first, second) = match model.merge_order(model.height - y, model.width - x) {
                    MergeOrder::RowsFirst => ((3, 2), (0, 1)),
                    MergeOrder::ColsFirst => ((2, 1), (3, 0)),
                };
                out.push(Instruction::Merge { a: whole.child(first.0), b: whole.child(first.1) });
                out.push(Instruction::Merge { a: whole.child(second.0), b: whole.child(second.1) });
                out.push(Instruction::Merge { a: BlockId::numeric(next), b: BlockId::numeric(next + 1) });
                whole = BlockId::numeric(next + 2);
                next += 3;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Costs;
    use crate::executor::Painter;

    fn blank_plan() -> MergePlan {
        MergePlan { instructions: Vec::new(), whole: BlockId::numeric(0), last_id: 0, cost: 0, fill: Some(Color::WHITE) }
    }

    #[test]
    fn test_emit_replays_with_paint_costs() {
        let model = CostModel::new(Costs::default(), 20, 30);
        let layers = vec![
            Layer { anchor: Cell::ORIGIN, color: Color::new(1, 1, 1, 255) },
            Layer { anchor: Cell::new(0, 12), color: Color::new(2, 2, 2, 255) },
            Layer { anchor: Cell::new(7, 0), color: Color::new(3, 3, 3, 255) },
            Layer { anchor: Cell::new(5, 25), color: Color::new(4, 4, 4, 255) },
            Layer { anchor: Cell::new(18, 2), color: Color::new(5, 5, 5, 255) },
        ];
        let program = emit(&layers, &blank_plan(), &model);
        let mut painter = Painter::blank(model);
        for ins in &program {
            painter.apply(ins).unwrap();
            assert!(painter.is_tiling());
        }
        let want: u64 = layers.iter().map(|l| model.anchor_paint_cost(l.anchor)).sum();
        assert_eq!(painter.cost(), want);
        assert_eq!(painter.block_count(), 1);
        assert_eq!(painter.painted(Cell::new(19, 29)), Color::new(5, 5, 5, 255));
        assert_eq!(painter.painted(Cell::new(6, 29)), Color::new(4, 4, 4, 255));
        assert_eq!(painter.painted(Cell::new(8, 1)), Color::new(3, 3, 3, 255));
        assert_eq!(painter.painted(Cell::new(0, 12)), Color::new(2, 2, 2, 255));
        assert_eq!(painter.painted(Cell::new(0, 0)), Color::new(1, 1, 1, 255));
    }

    #[test]
    fn test_layers_already_on_the_canvas_are_skipped() {
        let model = CostModel::new(Costs::default(), 10, 10);
        let red = Color::new(200, 0, 0, 255);
        let layers = vec![
            Layer { anchor: Cell::ORIGIN, color: Color::WHITE },
            Layer { anchor: Cell::new(0, 5), color: Color::WHITE },
            Layer { anchor: Cell::new(4, 0), color: red },
            Layer { anchor: Cell::ORIGIN, color: red },
        ];
        let program = emit(&layers, &blank_plan(), &model);
        assert_eq!(program.len(), 4);
        assert_eq!(program[0], Instruction::SplitY { block: BlockId::numeric(0), y: 4 });
        assert_eq!(program[3], Instruction::Color { block: BlockId::numeric(1), color: red });

        let mut painter = Painter::blank(model);
        for ins in &program {
            painter.apply(ins).unwrap();
        }
        let want = model.anchor_paint_cost(Cell::new(4, 0)) + model.anchor_paint_cost(Cell::ORIGIN);
        assert_eq!(painter.cost(), want);
        assert_eq!(painter.painted(Cell::new(9, 9)), red);

        // a differently colored start still gets its origin fill
        let plan = MergePlan { fill: Some(red), ..blank_plan() };
        assert_eq!(emit(&layers[..1], &plan, &model).len(), 1);
    }

    #[test]
    fn test_order_rects_puts_reaching_fill_first() {
        let c = Color::WHITE;
        let rects = vec![
            (Rect::new(0, 2, 4, 4), c),
            (Rect::new(2, 0, 4, 2), c),
            (Rect::new(0, 0, 2, 2), c),
        ];
        let layers = order_rects(&rects).unwrap();
        assert_eq!(layers[0].anchor, Cell::ORIGIN);
        let pos = |cell: Cell| layers.iter().position(|l| l.anchor == cell).unwrap();
        // (2, 0)'s fill reaches the right-hand column, so it goes before it
        assert!(pos(Cell::new(2, 0)) < pos(Cell::new(0, 2)));
    }

    #[test]
    fn test_order_rects_rejects_overlap_cycle() {
        let c = Color::WHITE;
        let rects = vec![(Rect::new(0, 0, 2, 2), c), (Rect::new(1, 1, 3, 3), c)];
        assert!(matches!(order_rects(&rects), Err(SolveError::NoPaintOrder)));
    }
}
