use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Timeout for the startup handshake (spawn + uci/isready exchange)
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period after a `stop` before the process is force-killed
pub const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Short pause after `quit` before killing the child outright
pub const QUIT_GRACE: Duration = Duration::from_millis(100);

/// A search that exceeds `time_budget * BUSY_TIMEOUT_FACTOR` is treated as a
/// crashed engine and torn down.
pub const BUSY_TIMEOUT_FACTOR: u32 = 4;

/// Consecutive malformed output lines tolerated during a search before the
/// session fails with a protocol error.
pub const MAX_CONSECUTIVE_MALFORMED: u32 = 5;

/// Default search-time budget for a freshly built config
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(2);

// =============================================================================
// Error Types
// =============================================================================

/// Comprehensive error type for engine orchestration
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine failed to start: {0}")]
    StartupFailed(String),

    #[error("engine did not complete the handshake in time")]
    StartupTimeout,

    #[error("session already has an outstanding request")]
    SessionBusy,

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("engine process crashed or was force-stopped")]
    EngineCrashed,

    #[error("not enough games to derive a profile")]
    InsufficientData,

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("FEN parsing error: {0}")]
    FenParsing(#[from] shakmaty::fen::ParseFenError),

    #[error("position setup error: {0}")]
    PositionSetup(#[from] shakmaty::PositionError<shakmaty::Chess>),

    #[error("UCI move parsing error: {0}")]
    UciMoveParsing(#[from] shakmaty::uci::ParseUciMoveError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse error classification surfaced to the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    StartupFailed,
    StartupTimeout,
    SessionBusy,
    Protocol,
    EngineCrashed,
    InsufficientData,
    IllegalMove,
    InvalidConfig,
    Io,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Io(_) => ErrorKind::Io,
            EngineError::StartupFailed(_) => ErrorKind::StartupFailed,
            EngineError::StartupTimeout => ErrorKind::StartupTimeout,
            EngineError::SessionBusy => ErrorKind::SessionBusy,
            EngineError::Protocol(_) => ErrorKind::Protocol,
            EngineError::EngineCrashed => ErrorKind::EngineCrashed,
            EngineError::InsufficientData => ErrorKind::InsufficientData,
            EngineError::IllegalMove(_) => ErrorKind::IllegalMove,
            EngineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            EngineError::FenParsing(_)
            | EngineError::PositionSetup(_)
            | EngineError::UciMoveParsing(_) => ErrorKind::IllegalMove,
        }
    }
}

impl From<shakmaty::uci::IllegalUciMoveError> for EngineError {
    fn from(err: shakmaty::uci::IllegalUciMoveError) -> Self {
        EngineError::IllegalMove(err.to_string())
    }
}

// =============================================================================
// Session Types
// =============================================================================

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No process; the initial and final state
    Stopped,
    /// Process spawned, handshake in progress
    Starting,
    /// Handshake complete, ready for a request
    Ready,
    /// A move or analysis request is outstanding
    Busy,
    /// Teardown in progress
    Stopping,
    /// Force-stopped after a timeout or protocol failure; unusable
    Crashed,
}

/// Logical slot a session is bound to within a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Analysis,
    PrimaryOpponent,
    SecondaryOpponent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Analysis => write!(f, "analysis"),
            Role::PrimaryOpponent => write!(f, "primary opponent"),
            Role::SecondaryOpponent => write!(f, "secondary opponent"),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Individual engine option, sent verbatim as `setoption`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOption {
    pub name: String,
    pub value: String,
}

/// Immutable per-session engine configuration.
///
/// Created once before `start`; changing any field requires a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub path: PathBuf,
    pub options: Vec<EngineOption>,
    pub time_budget: Duration,
    /// Number of candidate lines requested from the engine (MultiPV)
    pub multi_line_count: u16,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: Vec::new(),
            time_budget: DEFAULT_TIME_BUDGET,
            multi_line_count: 1,
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.options.iter_mut().find(|o| o.name == name) {
            Some(opt) => opt.value = value,
            None => self.options.push(EngineOption { name, value }),
        }
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_multi_line_count(mut self, count: u16) -> Self {
        self.multi_line_count = count;
        self
    }

    /// Look up an option value by name
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.as_str())
    }

    /// Cheap structural validation, run before any process is spawned.
    ///
    /// A path that exists but is not an engine surfaces later as
    /// `StartupFailed`; this only rejects configs that can never work.
    pub fn validate(&self) -> EngineResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig("empty executable path".into()));
        }
        if self.multi_line_count == 0 {
            return Err(EngineError::InvalidConfig(
                "multi_line_count must be at least 1".into(),
            ));
        }
        if let Some(value) = self.option("Skill Level") {
            match value.parse::<i32>() {
                Ok(level) if (0..=20).contains(&level) => {}
                _ => {
                    return Err(EngineError::InvalidConfig(format!(
                        "Skill Level out of range: {value}"
                    )))
                }
            }
        }
        if self.time_budget.is_zero() {
            return Err(EngineError::InvalidConfig("zero time budget".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Per-Turn Types
// =============================================================================

/// One move request, created per turn and discarded after use
#[derive(Debug, Clone)]
pub struct MoveRequest {
    /// Position in FEN
    pub position: String,
    pub time_budget: Duration,
    pub side_to_move: shakmaty::Color,
}

/// Engine evaluation attached to a candidate line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c", rename_all = "camelCase")]
pub enum Evaluation {
    /// Score in centipawns, from the searching side's perspective
    Centipawns(i32),
    /// Moves until forced mate (negative: getting mated)
    Mate(i8),
}

/// One candidate line parsed from the engine's streamed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// First move of the line, in UCI notation
    pub uci: String,
    /// 1-based rank among the requested lines (MultiPV index)
    pub rank: u16,
    pub depth: u8,
    pub evaluation: Option<Evaluation>,
    pub nodes: u64,
    pub nps: u64,
}

/// Final outcome of one turn, after selection policy was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    /// Chosen move in UCI notation
    pub chosen: String,
    /// Raw evaluation reported by the engine for its best line
    pub evaluation: Option<Evaluation>,
    /// True when the error-injection policy picked a non-best candidate
    pub perturbed: bool,
}

/// Protocol traffic entry kept for diagnostics
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ProtocolLine {
    Gui(String),
    Engine(String),
}
