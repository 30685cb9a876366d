//! Property-based invariant tests.
//!
//! 1. Any sequence of executor operations keeps the blocks tiling the canvas
//! 2. A rejected operation leaves blocks, cost and pixels untouched
//! 3. Accepted operations charge exactly what the cost model quotes
//! 4. Any sequence of corner additions and removals keeps the staircase consistent
//! 5. Every reversible staircase move is undone exactly by its inverse
//! 6. Program text parses back to the same instructions

use blocktrace::cost::{CostModel, Costs};
use blocktrace::instruction::{format_program, parse_program};
use blocktrace::search::Move;
use blocktrace::staircase::Staircase;
use blocktrace::{BlockId, Canvas, Cell, Color, Instruction, Painter, Problem, Rect};
use proptest::prelude::*;

// ── Executor ────────────────────────────────────────────────────────────

const H: u32 = 12;
const W: u32 = 10;

/// operations with block choices given as indices into the sorted live ids
#[derive(Debug, Clone)]
enum Op {
    Color(usize, [u8; 4]),
    SplitX(usize, u32),
    SplitY(usize, u32),
    SplitPoint(usize, u32, u32),
    Merge(usize, usize),
    Swap(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), any::<[u8; 4]>()).prop_map(|(b, c)| Op::Color(b, c)),
        (any::<usize>(), 0..=W).prop_map(|(b, x)| Op::SplitX(b, x)),
        (any::<usize>(), 0..=H).prop_map(|(b, y)| Op::SplitY(b, y)),
        (any::<usize>(), 0..=W, 0..=H).prop_map(|(b, x, y)| Op::SplitPoint(b, x, y)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Merge(a, b)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
    ]
}

fn live_ids(p: &Painter) -> Vec<BlockId> {
    let mut ids: Vec<BlockId> = p.blocks().map(|(id, _)| id.clone()).collect();
    ids.sort();
    ids
}

fn to_instruction(p: &Painter, op: &Op) -> Instruction {
    let ids = live_ids(p);
    let pick = |i: usize| ids[i % ids.len()].clone();
    match *op {
        Op::Color(b, c) => Instruction::Color { block: pick(b), color: Color(c) },
        Op::SplitX(b, x) => Instruction::SplitX { block: pick(b), x },
        Op::SplitY(b, y) => Instruction::SplitY { block: pick(b), y },
        Op::SplitPoint(b, x, y) => Instruction::SplitPoint { block: pick(b), x, y },
        Op::Merge(a, b) => Instruction::Merge { a: pick(a), b: pick(b) },
        Op::Swap(a, b) => Instruction::Swap { a: pick(a), b: pick(b) },
    }
}

fn layout(p: &Painter) -> Vec<(BlockId, Rect)> {
    let mut v: Vec<(BlockId, Rect)> = p.blocks().map(|(id, r)| (id.clone(), *r)).collect();
    v.sort_by(|a, b| a.0.cmp(&b.0));
    v
}

fn pixels(p: &Painter) -> Vec<Color> {
    (0..H).flat_map(|r| (0..W).map(move |c| Cell::new(r, c))).map(|cell| p.painted(cell)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn executor_keeps_tiling(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let model = CostModel::new(Costs::default(), H, W);
        let mut painter = Painter::blank(model);
        for op in &ops {
            let ins = to_instruction(&painter, op);
            let before_layout = layout(&painter);
            let before_pixels = pixels(&painter);
            let before_cost = painter.cost();
            match painter.apply(&ins) {
                Ok(charged) => {
                    prop_assert_eq!(painter.cost(), before_cost + charged);
                }
                Err(_) => {
                    prop_assert_eq!(layout(&painter), before_layout);
                    prop_assert_eq!(pixels(&painter), before_pixels);
                    prop_assert_eq!(painter.cost(), before_cost);
                }
            }
            prop_assert!(painter.is_tiling(), "after {}", ins);
            let area: u64 = painter.blocks().map(|(_, r)| r.area()).sum();
            prop_assert_eq!(area, H as u64 * W as u64);
        }
    }

    #[test]
    fn program_text_round_trips(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let painter = Painter::blank(CostModel::new(Costs::default(), H, W));
        let program: Vec<Instruction> = ops.iter().map(|op| to_instruction(&painter, op)).collect();
        let text = format_program(&program);
        prop_assert_eq!(parse_program(&text).unwrap(), program);
    }
}

// ── Staircase ───────────────────────────────────────────────────────────

const N: u32 = 9;
const M: u32 = 11;

fn noisy_problem(seed: u8) -> Problem {
    let canvas = Canvas::from_fn(N, M, |r, c| {
        let v = (r as u8).wrapping_mul(37) ^ (c as u8).wrapping_mul(91) ^ seed;
        if r * 2 >= N && c * 3 >= M {
            Color::new(v, 200, 30, 255)
        } else {
            Color::new(30, v / 2, 180, 255)
        }
    });
    Problem::new(canvas, CostModel::new(Costs::default(), N, M))
}

#[derive(Debug, Clone)]
enum Edit {
    /// add on (row, col) at a position inside the legal rank range
    Add(u32, u32, usize),
    /// remove the k-th non-origin corner
    Remove(usize),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (0..N, 0..M, any::<usize>()).prop_map(|(r, c, k)| Edit::Add(r, c, k)),
        2 => any::<usize>().prop_map(Edit::Remove),
    ]
}

fn apply_edit(s: &mut Staircase<'_>, edit: &Edit) {
    match *edit {
        Edit::Add(r, c, k) => {
            let cell = Cell::new(r, c);
            if !s.is_corner(cell) {
                let (lo, hi) = s.insert_range(cell);
                s.add_corner(cell, lo + k % (hi - lo + 1));
            }
        }
        Edit::Remove(k) => {
            let n = s.corner_count();
            if n > 1 {
                let cell = s.corner(1 + k % (n - 1));
                s.remove_corner(cell);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(120))]

    #[test]
    fn staircase_stays_consistent(seed in any::<u8>(), edits in prop::collection::vec(edit_strategy(), 1..40)) {
        let p = noisy_problem(seed);
        let mut s = Staircase::new(&p);
        for edit in &edits {
            apply_edit(&mut s, edit);
            prop_assert_eq!(s.audit(), Ok(()), "after {:?}", edit);
        }
        prop_assert_eq!(s.total(), s.recompute_total());
    }

    #[test]
    fn moves_invert_exactly(
        seed in any::<u8>(),
        edits in prop::collection::vec(edit_strategy(), 1..25),
        pick in any::<usize>(),
        rank_pick in any::<usize>(),
        to in (0..N, 0..M),
    ) {
        let p = noisy_problem(seed);
        let mut s = Staircase::new(&p);
        for edit in &edits {
            apply_edit(&mut s, edit);
        }
        let n = s.corner_count();
        prop_assume!(n > 1);
        let cell = s.corner(1 + pick % (n - 1));
        let rank = s.rank_of(cell).unwrap();
        let (lo, hi) = s.insert_range_excluding(cell, cell);

        let mut candidates = vec![Move::Remove { cell }];
        candidates.push(Move::Rerank { cell, rank: lo + rank_pick % (hi - lo + 1) });
        let to = Cell::new(to.0, to.1);
        if !s.is_corner(to) {
            let (lo, hi) = s.insert_range_excluding(to, cell);
            if lo <= rank && rank <= hi {
                candidates.push(Move::Shift { from: cell, to, rank });
            }
            let (lo, hi) = s.insert_range(to);
            candidates.push(Move::Add { cell: to, rank: lo + rank_pick % (hi - lo + 1) });
        }

        for mv in candidates {
            let total = s.total();
            let layers = s.layers();
            let undo = mv.apply(&mut s);
            prop_assert_eq!(s.audit(), Ok(()), "after {:?}", mv);
            undo.apply(&mut s);
            prop_assert_eq!(s.total(), total);
            prop_assert_eq!(s.layers(), layers);
        }
    }
}
