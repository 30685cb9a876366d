/// ---- instructions ----------------------------------------------------------

/// block ids and the edit operations, with the text grammar used for program files:
///   color [id] [r, g, b, a]
///   cut [id] [x, y]
///   cut [id] [X] [x]
///   cut [id] [Y] [y]
///   merge [id] [id2]
///   swap [id] [id2]
use std::fmt;
use std::str::FromStr;

use crate::color::Color;
use crate::error::ParseError;

/// hierarchical block id: split children append `.0`..`.3`, merges get a fresh integer
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(s: impl Into<String>) -> Self {
        BlockId(s.into())
    }

    pub fn numeric(n: u64) -> Self {
        BlockId(n.to_string())
    }

    /// id of the k-th piece produced by a cut
    pub fn child(&self, k: u8) -> Self {
        BlockId(format!("{}.{}", self.0, k))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// value of a top-level numeric id ("12" -> 12, "12.0" -> None)
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId::new(s)
    }
}

/// one partition edit. x is a column coordinate, y a row coordinate, both absolute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Color { block: BlockId, color: Color },
    SplitPoint { block: BlockId, x: u32, y: u32 },
    SplitX { block: BlockId, x: u32 },
    SplitY { block: BlockId, y: u32 },
    Merge { a: BlockId, b: BlockId },
    Swap { a: BlockId, b: BlockId },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Color { block, color } => write!(f, "color [{block}] {color}"),
            Instruction::SplitPoint { block, x, y } => write!(f, "cut [{block}] [{x}, {y}]"),
            Instruction::SplitX { block, x } => write!(f, "cut [{block}] [X] [{x}]"),
            Instruction::SplitY { block, y } => write!(f, "cut [{block}] [Y] [{y}]"),
            Instruction::Merge { a, b } => write!(f, "merge [{a}] [{b}]"),
            Instruction::Swap { a, b } => write!(f, "swap [{a}] [{b}]"),
        }
    }
}

/// contents of every `[...]` group on a line, trimmed
fn bracket_groups(line: usize, s: &str) -> Result<Vec<&str>, ParseError> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = after.find(']').ok_or_else(|| ParseError::Malformed {
            line,
            reason: "unclosed `[`".into(),
        })?;
        out.push(after[..close].trim());
        rest = &after[close + 1..];
    }
    Ok(out)
}

fn number<T: FromStr>(line: usize, s: &str) -> Result<T, ParseError> {
    s.trim().parse().map_err(|_| ParseError::Malformed {
        line,
        reason: format!("bad number `{s}`"),
    })
}

fn arity(line: usize, cmd: &str, groups: &[&str], want: usize) -> Result<(), ParseError> {
    if groups.len() == want {
        Ok(())
    } else {
        Err(ParseError::Malformed {
            line,
            reason: format!("`{cmd}` takes {want} bracket groups, found {}", groups.len()),
        })
    }
}

/// parse one non-comment line; `line` is only used in error messages
pub fn parse_line(line: usize, s: &str) -> Result<Instruction, ParseError> {
    let s = s.trim();
    let word = s.split(|c: char| c.is_whitespace() || c == '[').next().unwrap_or("");
    let groups = bracket_groups(line, s)?;
    match word.to_ascii_lowercase().as_str() {
        "color" => {
            arity(line, word, &groups, 2)?;
            let parts: Vec<&str> = groups[1].split(',').collect();
            if parts.len() != 4 {
                return Err(ParseError::Malformed {
                    line,
                    reason: format!("color needs 4 channels, found {}", parts.len()),
                });
            }
            let mut rgba = [0u8; 4];
            for (k, p) in parts.iter().enumerate() {
                rgba[k] = number(line, p)?;
            }
            Ok(Instruction::Color {
                block: BlockId::new(groups[0]),
                color: Color(rgba),
            })
        }
        "cut" => match groups.len() {
            2 => {
                let (x, y) = groups[1].split_once(',').ok_or_else(|| ParseError::Malformed {
                    line,
                    reason: "point cut needs `[x, y]`".into(),
                })?;
                Ok(Instruction::SplitPoint {
                    block: BlockId::new(groups[0]),
                    x: number(line, x)?,
                    y: number(line, y)?,
                })
            }
            3 => {
                let block = BlockId::new(groups[0]);
                let at = number(line, groups[2])?;
                match groups[1] {
                    "X" | "x" => Ok(Instruction::SplitX { block, x: at }),
                    "Y" | "y" => Ok(Instruction::SplitY { block, y: at }),
                    other => Err(ParseError::Malformed {
                        line,
                        reason: format!("unknown cut axis `{other}`"),
                    }),
                }
            }
            n => Err(ParseError::Malformed {
                line,
                reason: format!("`cut` takes 2 or 3 bracket groups, found {n}"),
            }),
        },
        "merge" | "swap" => {
            arity(line, word, &groups, 2)?;
            let a = BlockId::new(groups[0]);
            let b = BlockId::new(groups[1]);
            if word.eq_ignore_ascii_case("merge") {
                Ok(Instruction::Merge { a, b })
            } else {
                Ok(Instruction::Swap { a, b })
            }
        }
        _ => Err(ParseError::UnknownCommand {
            line,
            word: word.to_string(),
        }),
    }
}

impl FromStr for Instruction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(1, s)
    }
}

/// parse a whole program, skipping blank lines and `#` comments
pub fn parse_program(text: &str) -> Result<Vec<Instruction>, ParseError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .map(|(i, l)| parse_line(i + 1, l))
        .collect()
}

/// render a program one instruction per line
pub fn format_program(program: &[Instruction]) -> String {
    let mut out = String::new();
    for ins in program {
        out.push_str(&ins.to_string());
        out.push('\n');
    }
    out
}
