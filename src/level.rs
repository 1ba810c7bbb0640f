//! Level-file text format: parsing, serialization, and `saved_levels/` persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::LevelParseError;
use crate::grid::{char_to_pawn, is_box, Grid};

/// One finished level: the playable grid plus the score and timing metadata recorded
/// when the driver produced it. `timestamp` is seconds since search start, matching
/// the driver's `best_score_time` bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub grid: Grid,
    pub box_count: i32,
    pub score: f64,
    pub timestamp: f64,
}

impl Level {
    pub fn from_grid(grid: Grid, score: f64, timestamp: f64) -> Level {
        let box_count = grid.get_count(is_box);
        Level {
            grid,
            box_count,
            score,
            timestamp,
        }
    }
}

/// Directory under which finished level sets are persisted.
pub const SAVED_LEVELS_DIR: &str = "saved_levels";

pub fn level_file_path(seed: u64) -> PathBuf {
    Path::new(SAVED_LEVELS_DIR).join(format!("{seed}.txt"))
}

/// Parse a `LEVEL W H` header followed by `H` rows of `W` tile characters, for as many
/// blank-line-separated sections as the text contains.
pub fn parse_level_set(file_name: &str, text: &str) -> Result<Vec<Level>, LevelParseError> {
    let mut levels = Vec::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }
        let header = lines[i];
        let mut tokens = header.split_whitespace();
        let tag = tokens.next();
        if tag != Some("LEVEL") {
            return Err(LevelParseError::new(
                file_name,
                i + 1,
                format!("expected a LEVEL header, found {header:?}"),
            ));
        }
        let width: i32 = tokens
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| LevelParseError::new(file_name, i + 1, "missing or invalid width"))?;
        let height: i32 = tokens
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| LevelParseError::new(file_name, i + 1, "missing or invalid height"))?;

        let mut grid = Grid::new(width, height);
        for row in 0..height {
            let line_no = i + 1 + 1 + row as usize;
            let line = lines.get(i + 1 + row as usize).ok_or_else(|| {
                LevelParseError::new(file_name, line_no, "level ended before all rows were read")
            })?;
            let chars: Vec<char> = line.chars().collect();
            if chars.len() != width as usize {
                return Err(LevelParseError::new(
                    file_name,
                    line_no,
                    format!("row has {} characters, expected {width}", chars.len()),
                ));
            }
            for (x, &c) in chars.iter().enumerate() {
                let pawn = char_to_pawn(c).ok_or_else(|| {
                    LevelParseError::new(file_name, line_no, format!("unrecognized tile character {c:?}"))
                })?;
                grid.set(x as i32, row, pawn);
            }
        }

        i += 1 + height as usize;
        levels.push(Level::from_grid(grid, 0.0, 0.0));
    }
    Ok(levels)
}

/// Serialize a level set to the §6 text format: one `LEVEL W H` section per level,
/// blank-line separated, with a trailing blank line after the last section.
pub fn format_level_set(levels: &[Level]) -> String {
    let mut out = String::new();
    for level in levels {
        out.push_str(&format!("LEVEL {} {}\n", level.grid.width, level.grid.height));
        out.push_str(&level.grid.to_text());
        out.push('\n');
    }
    out
}

pub fn save_level_set(seed: u64, levels: &[Level]) -> io::Result<PathBuf> {
    fs::create_dir_all(SAVED_LEVELS_DIR)?;
    let path = level_file_path(seed);
    fs::write(&path, format_level_set(levels))?;
    Ok(path)
}

pub fn load_level_set(name: &str) -> Result<Vec<Level>, LevelLoadError> {
    let path = Path::new(SAVED_LEVELS_DIR).join(format!("{name}.txt"));
    let text = fs::read_to_string(&path).map_err(LevelLoadError::Io)?;
    parse_level_set(&path.to_string_lossy(), &text).map_err(LevelLoadError::Parse)
}

#[derive(Debug)]
pub enum LevelLoadError {
    Io(io::Error),
    Parse(LevelParseError),
}

impl std::fmt::Display for LevelLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelLoadError::Io(e) => write!(f, "could not read level file: {e}"),
            LevelLoadError::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LevelLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LevelLoadError::Io(e) => Some(e),
            LevelLoadError::Parse(e) => Some(e),
        }
    }
}
