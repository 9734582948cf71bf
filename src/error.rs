//! Error types for assembly, configuration and match setup.

use std::fmt;

use thiserror::Error;

/// A 1-based source position. `column` is 0 when only the line is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn line(line: usize) -> Self {
        Self { line, column: 0 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column == 0 {
            write!(f, "line {}", self.line)
        } else {
            write!(f, "line {}, column {}", self.line, self.column)
        }
    }
}

/// Assembler result type.
pub type Result<T> = std::result::Result<T, AsmError>;

/// Errors raised while expanding or assembling a warrior. Any of these is fatal
/// to the warrior: no load file is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("syntax error at {at}: {message}")]
    AssemblySyntaxError { message: String, at: Location },

    #[error("duplicate label '{name}' at {at}")]
    DuplicateLabel { name: String, at: Location },

    #[error("unresolved symbol '{name}' at {at}")]
    UnresolvedSymbol { name: String, at: Location },

    #[error("invalid FOR count {count} at {at}")]
    InvalidForCount { count: i64, at: Location },

    #[error("unterminated FOR block at {at}")]
    UnterminatedForBlock { at: Location },

    #[error("division by zero at {at}")]
    DivisionByZero { at: Location },

    #[error("unknown opcode '{name}' at {at}")]
    UnknownOpcode { name: String, at: Location },

    #[error("unknown addressing mode '{symbol}' at {at}")]
    UnknownAddressingMode { symbol: String, at: Location },

    #[error("warrior has no instructions")]
    EmptyWarrior,

    #[error("warrior has {length} instructions, more than the limit of {limit}")]
    WarriorTooLong { length: usize, limit: usize },

    #[error("assertion failed at {at}: {expression}")]
    AssertionFailed { expression: String, at: Location },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AsmError {
    pub fn syntax(message: impl Into<String>, at: Location) -> Self {
        Self::AssemblySyntaxError {
            message: message.into(),
            at,
        }
    }

    /// Where the error happened, if it is tied to a source position.
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::AssemblySyntaxError { at, .. }
            | Self::DuplicateLabel { at, .. }
            | Self::UnresolvedSymbol { at, .. }
            | Self::InvalidForCount { at, .. }
            | Self::UnterminatedForBlock { at }
            | Self::DivisionByZero { at }
            | Self::UnknownOpcode { at, .. }
            | Self::UnknownAddressingMode { at, .. }
            | Self::AssertionFailed { at, .. } => Some(*at),
            Self::EmptyWarrior | Self::WarriorTooLong { .. } | Self::Config(_) => None,
        }
    }

    /// Rebase a line-relative error onto an absolute source line.
    pub(crate) fn on_line(self, line: usize) -> Self {
        let fix = |at: Location| Location::new(line, at.column);
        match self {
            Self::AssemblySyntaxError { message, at } => Self::AssemblySyntaxError {
                message,
                at: fix(at),
            },
            Self::DuplicateLabel { name, at } => Self::DuplicateLabel { name, at: fix(at) },
            Self::UnresolvedSymbol { name, at } => Self::UnresolvedSymbol { name, at: fix(at) },
            Self::InvalidForCount { count, at } => Self::InvalidForCount { count, at: fix(at) },
            Self::UnterminatedForBlock { at } => Self::UnterminatedForBlock { at: fix(at) },
            Self::DivisionByZero { at } => Self::DivisionByZero { at: fix(at) },
            Self::UnknownOpcode { name, at } => Self::UnknownOpcode { name, at: fix(at) },
            Self::UnknownAddressingMode { symbol, at } => Self::UnknownAddressingMode {
                symbol,
                at: fix(at),
            },
            Self::AssertionFailed { expression, at } => Self::AssertionFailed {
                expression,
                at: fix(at),
            },
            other => other,
        }
    }
}

/// Rejected simulator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("core size must be positive")]
    InvalidCoreSize,

    #[error("max cycles must be positive")]
    InvalidMaxCycles,

    #[error("max processes must be positive")]
    InvalidMaxProcesses,

    #[error("at least one warrior is required")]
    InvalidWarriorCount,

    #[error("p-space size must be positive")]
    InvalidPSpaceSize,

    #[error("max length {max_length} exceeds min distance {min_distance}")]
    LengthExceedsDistance { max_length: u32, min_distance: u32 },

    #[error("{warriors} warriors at min distance {min_distance} do not fit in a core of {core_size}")]
    CoreTooSmall {
        warriors: usize,
        min_distance: u32,
        core_size: u32,
    },
}

/// Errors raised while setting up a match or battle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{given} warriors given, but the configuration allows {allowed}")]
    TooManyWarriors { given: usize, allowed: usize },

    #[error("no warriors given")]
    NoWarriors,

    #[error("warrior '{name}' has {length} instructions, more than the limit of {limit}")]
    WarriorTooLong {
        name: String,
        length: usize,
        limit: usize,
    },
}
