use std::fmt;

/// Errors surfaced by engine entry points.
///
/// `Validation` and `NotFound` are human-readable rejections with no state
/// mutated. `NoClearSpace` is the bounded placement search giving up; callers
/// treat it as skip-and-log, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    GameNotActive,
    PlayerNotInGame,
    ActionNotImplemented(String),
    Validation(String),
    NotFound(String),
    NoClearSpace,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::GameNotActive => write!(f, "Game is not active"),
            EngineError::PlayerNotInGame => write!(f, "You aren't in this game"),
            EngineError::ActionNotImplemented(name) => {
                write!(f, "Action not implemented: {}", name)
            }
            EngineError::Validation(msg) => write!(f, "{}", msg),
            EngineError::NotFound(msg) => write!(f, "Not found: {}", msg),
            EngineError::NoClearSpace => write!(f, "No clear space found on the board"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
