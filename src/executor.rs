/// ---- partition executor ----------------------------------------------------

/// owns the live block partition and the painted canvas, applies the five edit
/// operations validate-then-apply, and scores the result against a target.
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::canvas::Canvas;
use crate::color::Color;
use crate::cost::{CostModel, PIXEL_PENALTY};
use crate::error::OpError;
use crate::geom::{Cell, Rect};
use crate::instruction::{BlockId, Instruction};

/// a block present in the initial configuration
#[derive(Clone, Debug, PartialEq)]
pub struct InitialBlock {
    pub id: BlockId,
    pub rect: Rect,
    pub color: Color,
}

#[derive(Clone, Debug)]
pub struct Painter {
    model: CostModel,
    blocks: FxHashMap<BlockId, Rect>,
    /// painted pixels, row-major, row 0 at the bottom
    pixels: Vec<Color>,
    /// highest numeric id handed out so far
    last_id: u64,
    cost: u64,
}

impl Painter {
    /// white canvas holding the given blocks, each pre-painted with its color.
    /// the initial blocks are trusted to tile the canvas.
    pub fn new(model: CostModel, initial: &[InitialBlock]) -> Self {
        let (n, m) = (model.height, model.width);
        let mut painter = Painter {
            model,
            blocks: FxHashMap::default(),
            pixels: vec![Color::WHITE; n as usize * m as usize],
            last_id: 0,
            cost: 0,
        };
        for b in initial {
            painter.fill(b.rect, b.color);
            painter.blocks.insert(b.id.clone(), b.rect);
            if let Some(v) = b.id.as_number() {
                painter.last_id = painter.last_id.max(v);
            }
        }
        painter
    }

    /// single white block "0" covering the canvas
    pub fn blank(model: CostModel) -> Self {
        let whole = InitialBlock {
            id: BlockId::numeric(0),
            rect: Rect::new(0, 0, model.height, model.width),
            color: Color::WHITE,
        };
        Painter::new(model, &[whole])
    }

    #[inline]
    pub fn model(&self) -> &CostModel {
        &self.model
    }

    /// accumulated operation cost
    #[inline]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    #[inline]
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn block(&self, id: &BlockId) -> Option<Rect> {
        self.blocks.get(id).copied()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&BlockId, &Rect)> {
        self.blocks.iter()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn painted(&self, cell: Cell) -> Color {
        self.pixels[cell.row as usize * self.model.width as usize + cell.col as usize]
    }

    fn rect_of(&self, id: &BlockId) -> Result<Rect, OpError> {
        self.block(id).ok_or_else(|| OpError::UnknownBlock(id.clone()))
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        let w = self.model.width as usize;
        for r in rect.r1..rect.r2 {
            let row = r as usize * w;
            self.pixels[row + rect.c1 as usize..row + rect.c2 as usize].fill(color);
        }
    }

    /// apply one instruction, returning the cost it charged
    pub fn apply(&mut self, ins: &Instruction) -> Result<u64, OpError> {
        let before = self.cost;
        match ins {
            Instruction::Color { block, color } => self.color(block, *color)?,
            Instruction::SplitPoint { block, x, y } => self.split_point(block, *x, *y)?,
            Instruction::SplitX { block, x } => self.split_x(block, *x)?,
            Instruction::SplitY { block, y } => self.split_y(block, *y)?,
            Instruction::Merge { a, b } => {
                self.merge(a, b)?;
            }
            Instruction::Swap { a, b } => self.swap(a, b)?,
        }
        Ok(self.cost - before)
    }

    pub fn color(&mut self, id: &BlockId, color: Color) -> Result<(), OpError> {
        let rect = self.rect_of(id)?;
        self.cost += self.model.color_cost(rect.area());
        self.fill(rect, color);
        Ok(())
    }

    /// vertical cut at column `x`: `.0` keeps columns left of `x`, `.1` the rest
    pub fn split_x(&mut self, id: &BlockId, x: u32) -> Result<(), OpError> {
        let rect = self.rect_of(id)?;
        if !(rect.c1 < x && x < rect.c2) {
            return Err(OpError::CutOutside { block: id.clone(), at: x, lo: rect.c1, hi: rect.c2 });
        }
        self.cost += self.model.split_line_cost(rect.area());
        self.blocks.remove(id);
        self.blocks.insert(id.child(0), Rect::new(rect.r1, rect.c1, rect.r2, x));
        self.blocks.insert(id.child(1), Rect::new(rect.r1, x, rect.r2, rect.c2));
        Ok(())
    }

    /// horizontal cut at row `y`: `.0` keeps rows below `y`, `.1` the rest
    pub fn split_y(&mut self, id: &BlockId, y: u32) -> Result<(), OpError> {
        let rect = self.rect_of(id)?;
        if !(rect.r1 < y && y < rect.r2) {
            return Err(OpError::CutOutside { block: id.clone(), at: y, lo: rect.r1, hi: rect.r2 });
        }
        self.cost += self.model.split_line_cost(rect.area());
        self.blocks.remove(id);
        self.blocks.insert(id.child(0), Rect::new(rect.r1, rect.c1, y, rect.c2));
        self.blocks.insert(id.child(1), Rect::new(y, rect.c1, rect.r2, rect.c2));
        Ok(())
    }

    /// point cut into four: `.0` bottom-left, `.1` bottom-right, `.2` top-right, `.3` top-left
    pub fn split_point(&mut self, id: &BlockId, x: u32, y: u32) -> Result<(), OpError> {
        let rect = self.rect_of(id)?;
        if !(rect.c1 < x && x < rect.c2) {
            return Err(OpError::CutOutside { block: id.clone(), at: x, lo: rect.c1, hi: rect.c2 });
        }
        if !(rect.r1 < y && y < rect.r2) {
            return Err(OpError::CutOutside { block: id.clone(), at: y, lo: rect.r1, hi: rect.r2 });
        }
        self.cost += self.model.split_point_cost(rect.area());
        self.blocks.remove(id);
        self.blocks.insert(id.child(0), Rect::new(rect.r1, rect.c1, y, x));
        self.blocks.insert(id.child(1), Rect::new(rect.r1, x, y, rect.c2));
        self.blocks.insert(id.child(2), Rect::new(y, x, rect.r2, rect.c2));
        self.blocks.insert(id.child(3), Rect::new(y, rect.c1, rect.r2, x));
        Ok(())
    }

    /// join two blocks sharing a full edge into a block with a fresh numeric id
    pub fn merge(&mut self, a: &BlockId, b: &BlockId) -> Result<BlockId, OpError> {
        let ra = self.rect_of(a)?;
        let rb = self.rect_of(b)?;
        if a == b {
            return Err(OpError::SameBlock(a.clone()));
        }
        let joined = ra.join(&rb).ok_or_else(|| OpError::NotAdjacent(a.clone(), b.clone()))?;
        self.cost += self.model.charge(self.model.costs.merge, ra.area().max(rb.area()));
        self.blocks.remove(a);
        self.blocks.remove(b);
        self.last_id += 1;
        let id = BlockId::numeric(self.last_id);
        self.blocks.insert(id.clone(), joined);
        Ok(id)
    }

    /// exchange the pixels of two equally shaped blocks; ids stay bound to their rects
    pub fn swap(&mut self, a: &BlockId, b: &BlockId) -> Result<(), OpError> {
        let ra = self.rect_of(a)?;
        let rb = self.rect_of(b)?;
        if a == b {
            return Err(OpError::SameBlock(a.clone()));
        }
        if !ra.same_shape(&rb) {
            return Err(OpError::ShapeMismatch(a.clone(), b.clone()));
        }
        self.cost += self.model.swap_cost(ra.area());
        let w = self.model.width as usize;
        for dr in 0..ra.height() as usize {
            let row_a = (ra.r1 as usize + dr) * w + ra.c1 as usize;
            let row_b = (rb.r1 as usize + dr) * w + rb.c1 as usize;
            for dc in 0..ra.width() as usize {
                self.pixels.swap(row_a + dc, row_b + dc);
            }
        }
        Ok(())
    }

    /// true if the live blocks cover every cell exactly once
    pub fn is_tiling(&self) -> bool {
        let (n, m) = (self.model.height as usize, self.model.width as usize);
        let mut seen = vec![false; n * m];
        let mut covered = 0usize;
        for rect in self.blocks.values() {
            if rect.r2 as usize > n || rect.c2 as usize > m || rect.area() == 0 {
                return false;
            }
            for r in rect.r1..rect.r2 {
                for c in rect.c1..rect.c2 {
                    let idx = r as usize * m + c as usize;
                    if seen[idx] {
                        return false;
                    }
                    seen[idx] = true;
                    covered += 1;
                }
            }
        }
        covered == n * m
    }

    /// summed euclidean distance between painted and target pixels.
    /// rows are reduced in parallel and added in order.
    pub fn deviation(&self, target: &Canvas) -> f64 {
        profiling::scope!("Painter::deviation");
        debug_assert_eq!(target.height(), self.model.height);
        debug_assert_eq!(target.width(), self.model.width);
        let w = self.model.width as usize;
        let rows: Vec<f64> = (0..self.model.height)
            .into_par_iter()
            .map(|r| {
                let painted = &self.pixels[r as usize * w..(r as usize + 1) * w];
                painted
                    .iter()
                    .zip(target.row(r))
                    .map(|(p, t)| p.dist(t))
                    .sum()
            })
            .collect();
        rows.iter().sum()
    }

    /// rounded image-difference term of the score
    pub fn similarity(&self, target: &Canvas) -> u64 {
        (self.deviation(target) * PIXEL_PENALTY).round() as u64
    }

    /// image difference plus every operation cost charged so far
    pub fn total_score(&self, target: &Canvas) -> u64 {
        (self.deviation(target) * PIXEL_PENALTY + self.cost as f64).round() as u64
    }
}
