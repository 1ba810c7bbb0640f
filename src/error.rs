//! Error types for configuration validation and level-file parsing.
//!
//! Hand-rolled `std::error::Error` impls, matching the style already used by this
//! codebase's `search` module rather than pulling in an error-derive crate.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    BadBoardSize { width: i32, height: i32 },
    StartOutsideGrid { x: i32, y: i32, width: i32, height: i32 },
    BootstrapDeltaOutOfRange { delta: f64 },
    BootstrapNeedsTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadBoardSize { width, height } => write!(
                f,
                "board size {}x{} is out of range (16 <= w*h <= 254 required)",
                width, height
            ),
            ConfigError::StartOutsideGrid { x, y, width, height } => write!(
                f,
                "start position ({}, {}) is outside the {}x{} grid",
                x, y, width, height
            ),
            ConfigError::BootstrapDeltaOutOfRange { delta } => write!(
                f,
                "bootstrap delta {} is out of range [0, 1]",
                delta
            ),
            ConfigError::BootstrapNeedsTimeout => write!(
                f,
                "bootstrapping is not available without a positive timeout"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelParseError {
    pub file_name: String,
    pub line: usize,
    pub message: String,
}

impl LevelParseError {
    pub fn new(file_name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        LevelParseError {
            file_name: file_name.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for LevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.file_name, self.line, self.message
        )
    }
}

impl std::error::Error for LevelParseError {}
