// =============================================================================
// Engine Orchestration Core
// =============================================================================
//
// This crate drives external UCI chess engines and arbitrates turn-taking
// across play modes, including "avatar" opponents: engine configurations
// derived from a real player's historical game statistics.
//
// ## Architecture Overview
//
// ```
// ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
// │  Orchestrator   │    │   SessionPool   │    │     Events      │
// │  (turn-taking)  │────│ (role→session)  │────│  (UI sink)      │
// └─────────────────┘    └─────────────────┘    └─────────────────┘
//          │                       │
// ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
// │    Selector     │    │  EngineSession  │    │    Protocol     │
// │ (humanization)  │    │ (process mgmt)  │────│ (UCI parsing)   │
// └─────────────────┘    └─────────────────┘    └─────────────────┘
//          │
// ┌─────────────────┐    ┌─────────────────┐
// │     Profile     │    │      Store      │
// │ (style derive)  │    │ (JSON snapshots)│
// └─────────────────┘    └─────────────────┘
// ```
//
// ## Module Responsibilities
//
// - **types**: shared type definitions, constants, and error types
// - **protocol**: UCI line parsing, candidate collection, capabilities
// - **session**: engine process lifecycle and request handling
// - **pool**: role-keyed session ownership and the no-leak teardown contract
// - **profile**: player history → play-parameter derivation
// - **selector**: deliberate-error injection and think-time emulation
// - **orchestrator**: play modes and the turn-taking state machine
// - **events**: notifications pushed to the UI collaborator
// - **store**: persisted configuration snapshots consumed at game start

pub mod events;
pub mod orchestrator;
pub mod pool;
pub mod profile;
pub mod protocol;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use types::{
    // Error handling
    EngineError, EngineResult, ErrorKind,

    // Session states and roles
    Role, SessionState,

    // Configuration types
    EngineConfig, EngineOption,

    // Per-turn types
    Candidate, Evaluation, MoveRequest, MoveResult, ProtocolLine,

    // Constants
    BUSY_TIMEOUT_FACTOR, CANCEL_GRACE, MAX_CONSECUTIVE_MALFORMED, STARTUP_TIMEOUT,
};

pub use protocol::{
    classify_handshake_line, classify_search_line, effective_multi_line, EngineCapabilities,
    HandshakeEvent, SearchCollector, SearchEvent,
};

pub use session::{EngineReply, EngineSession};

pub use pool::SessionPool;

pub use profile::{derive_profile, GameHistorySummary, StyleProfile, MAX_SKILL};

pub use selector::{choose, deliberate, Selection};

pub use orchestrator::{
    analyze_position, EngineOpponent, GameBoard, GameOrchestrator, OpponentSpec, Participant,
    PlayMode, ProfileOpponent,
};

pub use events::{ChannelSink, EventSink, Mover, NullSink, OrchestratorEvent};

pub use store::{EngineRegistry, ProfileCache};
