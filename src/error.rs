/// error types for the executor, the instruction parser and the solvers.
/// executor errors are always reported before any state is touched.
use thiserror::Error;

use crate::instruction::BlockId;

/// rejected partition edit. the executor is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    #[error("unknown block [{0}]")]
    UnknownBlock(BlockId),

    #[error("cut at {at} is not strictly inside [{lo}, {hi}) of block [{block}]")]
    CutOutside { block: BlockId, at: u32, lo: u32, hi: u32 },

    #[error("blocks [{0}] and [{1}] do not share a full edge")]
    NotAdjacent(BlockId, BlockId),

    #[error("blocks [{0}] and [{1}] have different shapes")]
    ShapeMismatch(BlockId, BlockId),

    #[error("block [{0}] used twice in one operation")]
    SameBlock(BlockId),
}

/// malformed instruction text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unknown command `{word}`")]
    UnknownCommand { line: usize, word: String },

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("tile size {tile} must be at least 2 and divide the {height}x{width} canvas")]
    TileSize { tile: u32, height: u32, width: u32 },

    #[error("guillotine table needs {cells} entries (cap {cap})")]
    TooLarge { cells: usize, cap: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("rectangles admit no paint order")]
    NoPaintOrder,

    #[error("initial blocks do not form a regular grid")]
    IrregularGrid,

    #[error("instruction {index} (`{text}`) rejected on replay: {source}")]
    Replay {
        index: usize,
        text: String,
        #[source]
        source: OpError,
    },
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("writing {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("parsing json {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Invalid(String),
}
