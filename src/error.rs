// Error taxonomy for the optimizer core.
//
// Follows the manual enum + hand-written Display/Error/From shape used
// throughout the teacher crate's save-state and cartridge-loading code,
// rather than pulling in a derive-macro error crate.

use std::fmt;
use std::io;

/// Malformed input: an OnOff file, a configuration value, or a palette
/// reference that does not resolve against the target-register vocabulary.
#[derive(Debug)]
pub enum InputError {
    /// OnOff file parse failure, reported with its 1-based line number.
    OnOffParse { line: usize, message: String },
    /// A register name that does not exist in the target vocabulary.
    UnknownRegister { line: usize, name: String },
    /// A FROM/TO range outside `[0, height)`.
    RangeOutOfBounds { line: usize, from: usize, to: usize, height: usize },
    /// Malformed configuration value.
    Config(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::OnOffParse { line, message } => {
                write!(f, "onoff parse error at line {line}: {message}")
            }
            InputError::UnknownRegister { line, name } => {
                write!(f, "onoff line {line}: unknown register '{name}'")
            }
            InputError::RangeOutOfBounds { line, from, to, height } => write!(
                f,
                "onoff line {line}: range {from}..{to} outside [0, {height})"
            ),
            InputError::Config(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl std::error::Error for InputError {}

/// Fatal allocation failure in a worker's arena.
#[derive(Debug)]
pub struct ResourceError {
    pub message: String,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource allocation failure: {}", self.message)
    }
}

impl std::error::Error for ResourceError {}

/// Corrupt persisted state (checkpoint or `.rp` program file).
#[derive(Debug)]
pub enum ProtocolError {
    Io(io::Error),
    Corrupt { what: &'static str, detail: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(e) => write!(f, "I/O error: {e}"),
            ProtocolError::Corrupt { what, detail } => {
                write!(f, "corrupt {what}: {detail}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        ProtocolError::Io(e)
    }
}
