// blocktrace: paint a target image with block-partition edits at minimum cost
//
// leaves first: color / geom / canvas -> cost -> instruction -> executor -> merge
// solvers: dp (exact, tile aligned), staircase + search (annealing)
// emit turns any layered painting into a replayable program; solver ties it together

pub mod canvas;
pub mod color;
pub mod cost;
pub mod dp;
pub mod emit;
pub mod error;
pub mod executor;
pub mod geom;
pub mod instruction;
pub mod io;
pub mod merge;
pub mod search;
pub mod settings;
pub mod solver;
pub mod staircase;

pub use canvas::Canvas;
pub use color::Color;
pub use cost::{CostModel, Costs};
pub use emit::Layer;
pub use error::{IoError, OpError, ParseError, SolveError};
pub use executor::{InitialBlock, Painter};
pub use geom::{Cell, Rect};
pub use instruction::{BlockId, Instruction};
pub use settings::{RunSettings, Strategy};
pub use solver::{solve, Problem, Solution};
