/// ---- file formats ----------------------------------------------------------

/// target images, initial block layouts and instruction programs.
/// images store their top row first; canvases keep row 0 at the bottom, so rows are flipped on load.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::color::Color;
use crate::cost::{CostModel, Costs};
use crate::error::IoError;
use crate::executor::{InitialBlock, Painter};
use crate::geom::Rect;
use crate::instruction::{format_program, parse_program, BlockId, Instruction};

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// decode any supported image into a canvas (row 0 = bottom image row)
pub fn load_target(path: &Path) -> Result<Canvas, IoError> {
    profiling::scope!("load_target");
    let img = image::open(path)
        .map_err(|source| IoError::Image { path: display(path), source })?
        .to_rgba8();
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(IoError::Invalid(format!("{} is empty", display(path))));
    }
    Ok(Canvas::from_fn(h, w, |r, c| Color(img.get_pixel(c, h - 1 - r).0)))
}

/// one block of an initial layout; coordinates are `[x, y]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSpec {
    pub block_id: String,
    pub bottom_left: [u32; 2],
    pub top_right: [u32; 2],
    pub color: [u8; 4],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialConfig {
    pub width: u32,
    pub height: u32,
    pub blocks: Vec<BlockSpec>,
}

impl InitialConfig {
    /// validate against the canvas size and convert to executor blocks
    pub fn into_blocks(self, height: u32, width: u32) -> Result<Vec<InitialBlock>, IoError> {
        if self.height != height || self.width != width {
            return Err(IoError::Invalid(format!(
                "initial layout is {}x{} but the target is {}x{}",
                self.width, self.height, width, height
            )));
        }
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for b in self.blocks {
            let [x1, y1] = b.bottom_left;
            let [x2, y2] = b.top_right;
            if x1 >= x2 || y1 >= y2 || x2 > width || y2 > height {
                return Err(IoError::Invalid(format!("block {} has a bad rectangle", b.block_id)));
            }
            blocks.push(InitialBlock {
                id: BlockId::new(b.block_id),
                rect: Rect::new(y1, x1, y2, x2),
                color: Color(b.color),
            });
        }
        // any cost model works for a coverage check
        let painter = Painter::new(CostModel::new(Costs::default(), height, width), &blocks);
        if painter.block_count() != blocks.len() || !painter.is_tiling() {
            return Err(IoError::Invalid("initial blocks do not tile the canvas".into()));
        }
        Ok(blocks)
    }
}

/// initial blocks from `path`, or a single white block "0" covering the canvas
pub fn load_initial(path: Option<&Path>, height: u32, width: u32) -> Result<Vec<InitialBlock>, IoError> {
    let Some(path) = path else {
        return Ok(vec![InitialBlock {
            id: BlockId::numeric(0),
            rect: Rect::new(0, 0, height, width),
            color: Color::WHITE,
        }]);
    };
    let text = std::fs::read_to_string(path).map_err(|source| IoError::Read { path: display(path), source })?;
    let config: InitialConfig =
        serde_json::from_str(&text).map_err(|source| IoError::Json { path: display(path), source })?;
    config.into_blocks(height, width)
}

pub fn read_program(path: &Path) -> Result<Vec<Instruction>, IoError> {
    let text = std::fs::read_to_string(path).map_err(|source| IoError::Read { path: display(path), source })?;
    Ok(parse_program(&text)?)
}

pub fn write_program(path: &Path, program: &[Instruction]) -> Result<(), IoError> {
    std::fs::write(path, format_program(program)).map_err(|source| IoError::Write { path: display(path), source })
}
