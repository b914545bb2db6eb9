use std::{path::PathBuf, sync::Arc};

use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use shakmaty::Color;
use tokio::sync::mpsc;

use crate::{
    events::{EventSink, Mover},
    pool::SessionPool,
    profile::StyleProfile,
    selector,
    session::{EngineReply, EngineSession},
    types::{EngineConfig, EngineResult, MoveRequest, MoveResult, Role},
};

// =============================================================================
// Play Modes and Participants
// =============================================================================

/// A plain engine opponent playing at full configured strength
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOpponent {
    pub config: EngineConfig,
}

/// An engine opponent impersonating a modeled player
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileOpponent {
    pub engine_path: PathBuf,
    pub profile: StyleProfile,
}

impl ProfileOpponent {
    fn engine_config(&self) -> EngineConfig {
        self.profile.engine_config(&self.engine_path)
    }
}

/// The game's participant layout, fixed at game start.
///
/// Each variant carries exactly the non-human participants it needs, so an
/// illegal mode/participant combination cannot be expressed.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayMode {
    /// Board sandbox: every move comes from the outside
    Free,
    HumanVsHuman,
    HumanVsEngine {
        engine: EngineOpponent,
        engine_color: Color,
    },
    HumanVsProfile {
        profile: ProfileOpponent,
        profile_color: Color,
    },
    EngineVsEngine {
        white: EngineOpponent,
        black: EngineOpponent,
    },
    ProfileVsProfile {
        white: ProfileOpponent,
        black: ProfileOpponent,
    },
    ProfileVsEngine {
        profile: ProfileOpponent,
        engine: EngineOpponent,
        profile_color: Color,
    },
}

/// Resolved participant for one turn
#[derive(Debug, Clone)]
pub enum Participant {
    Human,
    Opponent { role: Role, spec: OpponentSpec },
}

#[derive(Debug, Clone)]
pub enum OpponentSpec {
    Engine(EngineOpponent),
    Profile(ProfileOpponent),
}

impl OpponentSpec {
    fn engine_config(&self) -> EngineConfig {
        match self {
            OpponentSpec::Engine(engine) => engine.config.clone(),
            OpponentSpec::Profile(profile) => profile.engine_config(),
        }
    }
}

impl PlayMode {
    /// Which participant is due when `side` is to move.
    ///
    /// In two-opponent modes white is always the primary opponent and black
    /// the secondary; in mixed modes the profile holds the primary slot.
    pub fn participant_for(&self, side: Color) -> Participant {
        match self {
            PlayMode::Free | PlayMode::HumanVsHuman => Participant::Human,

            PlayMode::HumanVsEngine { engine, engine_color } => {
                if side == *engine_color {
                    Participant::Opponent {
                        role: Role::PrimaryOpponent,
                        spec: OpponentSpec::Engine(engine.clone()),
                    }
                } else {
                    Participant::Human
                }
            }

            PlayMode::HumanVsProfile { profile, profile_color } => {
                if side == *profile_color {
                    Participant::Opponent {
                        role: Role::PrimaryOpponent,
                        spec: OpponentSpec::Profile(profile.clone()),
                    }
                } else {
                    Participant::Human
                }
            }

            PlayMode::EngineVsEngine { white, black } => {
                let (role, engine) = match side {
                    Color::White => (Role::PrimaryOpponent, white),
                    Color::Black => (Role::SecondaryOpponent, black),
                };
                Participant::Opponent {
                    role,
                    spec: OpponentSpec::Engine(engine.clone()),
                }
            }

            PlayMode::ProfileVsProfile { white, black } => {
                let (role, profile) = match side {
                    Color::White => (Role::PrimaryOpponent, white),
                    Color::Black => (Role::SecondaryOpponent, black),
                };
                Participant::Opponent {
                    role,
                    spec: OpponentSpec::Profile(profile.clone()),
                }
            }

            PlayMode::ProfileVsEngine { profile, engine, profile_color } => {
                if side == *profile_color {
                    Participant::Opponent {
                        role: Role::PrimaryOpponent,
                        spec: OpponentSpec::Profile(profile.clone()),
                    }
                } else {
                    Participant::Opponent {
                        role: Role::SecondaryOpponent,
                        spec: OpponentSpec::Engine(engine.clone()),
                    }
                }
            }
        }
    }
}

// =============================================================================
// External Collaborators
// =============================================================================

/// The board-state collaborator the orchestrator drives.
///
/// The orchestrator never inspects chess rules itself; it only reacts to
/// what this interface reports.
pub trait GameBoard: Send {
    /// Current position in FEN
    fn current_position(&self) -> String;
    fn side_to_move(&self) -> Color;
    /// Commit a move in UCI notation
    fn apply_move(&mut self, uci: &str) -> EngineResult<()>;
    /// Checkmate, stalemate or any draw condition
    fn is_terminal(&self) -> bool;
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Turn-taking state machine over one game.
///
/// Owns the session pool; nothing else holds ambient engine state. Turn
/// order is a direct consequence of the sequential `run` loop: the next
/// request is dispatched only after the previous result was committed.
pub struct GameOrchestrator<B: GameBoard, S: EventSink> {
    mode: PlayMode,
    pool: Arc<SessionPool>,
    board: B,
    sink: S,
    human_rx: mpsc::UnboundedReceiver<String>,
    human_tx: mpsc::UnboundedSender<String>,
    rng: StdRng,
}

impl<B: GameBoard, S: EventSink> GameOrchestrator<B, S> {
    pub fn new(mode: PlayMode, board: B, sink: S) -> Self {
        Self::with_rng(mode, board, sink, StdRng::from_entropy())
    }

    /// Deterministic variant for tests pinning the error-injection seed
    pub fn with_rng(mode: PlayMode, board: B, sink: S, rng: StdRng) -> Self {
        let (human_tx, human_rx) = mpsc::unbounded_channel();
        Self {
            mode,
            pool: Arc::new(SessionPool::new()),
            board,
            sink,
            human_rx,
            human_tx,
            rng,
        }
    }

    /// Sender for externally played (human) moves, in UCI notation
    pub fn human_input(&self) -> mpsc::UnboundedSender<String> {
        self.human_tx.clone()
    }

    /// Shared handle to the pool, e.g. for background analysis alongside
    /// the running game
    pub fn pool(&self) -> Arc<SessionPool> {
        self.pool.clone()
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn mode(&self) -> &PlayMode {
        &self.mode
    }

    /// Drive the game until the board reports a terminal state.
    ///
    /// Returns early with the underlying error when a session fails —
    /// automatic play never continues past a failed participant, and no
    /// retry happens here; restarting is the caller's policy decision.
    /// All sessions are released before returning.
    pub async fn run(&mut self) -> EngineResult<()> {
        info!("starting game loop: {:?}", self.mode);

        let outcome = self.turn_loop().await;
        // Cancel anything in flight and enforce the no-leak contract
        self.pool.release_all().await;

        match &outcome {
            Ok(()) => info!("game loop finished"),
            Err(e) => warn!("game loop halted: {e}"),
        }
        outcome
    }

    async fn turn_loop(&mut self) -> EngineResult<()> {
        while !self.board.is_terminal() {
            let side = self.board.side_to_move();
            match self.mode.participant_for(side) {
                Participant::Human => {
                    let Some(uci) = self.human_rx.recv().await else {
                        info!("human input channel closed, abandoning game");
                        return Ok(());
                    };
                    if let Err(e) = self.board.apply_move(&uci) {
                        // The submitting UI already knows the move; let the
                        // human retry instead of killing the game
                        warn!("rejected human move {uci}: {e}");
                        continue;
                    }
                    let result = MoveResult {
                        chosen: uci,
                        evaluation: None,
                        perturbed: false,
                    };
                    self.sink.on_move_applied(&result, Mover::Human);
                }
                Participant::Opponent { role, spec } => {
                    self.play_opponent_turn(role, spec, side).await?;
                }
            }
        }
        Ok(())
    }

    async fn play_opponent_turn(
        &mut self,
        role: Role,
        spec: OpponentSpec,
        side: Color,
    ) -> EngineResult<()> {
        self.sink.on_thinking(Mover::Opponent(role));

        let config = spec.engine_config();
        let session = match self.pool.acquire(role, &config).await {
            Ok(session) => session,
            Err(e) => {
                self.sink.on_session_error(
                    role,
                    e.kind(),
                    &format!("engine for {role} could not be started: {e}"),
                );
                return Err(e);
            }
        };

        let request = MoveRequest {
            position: self.board.current_position(),
            time_budget: config.time_budget,
            side_to_move: side,
        };
        let reply = match session.request_move(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                self.sink.on_session_error(
                    role,
                    e.kind(),
                    &format!("{role} stopped playing: {e}"),
                );
                return Err(e);
            }
        };

        let result = match &spec {
            OpponentSpec::Engine(_) => MoveResult {
                chosen: reply.best().to_string(),
                evaluation: reply.evaluation,
                perturbed: false,
            },
            OpponentSpec::Profile(opponent) => {
                let selection =
                    selector::choose(&reply.candidates, &opponent.profile, &mut self.rng)?;
                debug!(
                    "{role} deliberates {:?} before playing {}",
                    selection.think_time, selection.uci
                );
                selector::deliberate(selection.think_time).await;
                MoveResult {
                    chosen: selection.uci,
                    evaluation: reply.evaluation,
                    perturbed: selection.perturbed,
                }
            }
        };

        if let Err(e) = self.board.apply_move(&result.chosen) {
            self.sink.on_session_error(
                role,
                e.kind(),
                &format!("{role} produced an unplayable move {}: {e}", result.chosen),
            );
            return Err(e);
        }
        self.sink.on_move_applied(&result, Mover::Opponent(role));
        Ok(())
    }

    /// Abort the game: cancel in-flight requests and tear the pool down
    pub async fn stop_game(&mut self) {
        info!("stopping game");
        self.pool.release_all().await;
    }
}

/// One-shot background analysis of a position, on the pool's analysis slot.
///
/// Runs on its own session, so it never contends with opponent sessions;
/// a busy analysis session means a previous call is still running and the
/// request fails with `SessionBusy`.
pub async fn analyze_position(
    pool: &SessionPool,
    config: &EngineConfig,
    position: &str,
) -> EngineResult<EngineReply> {
    let session: EngineSession = pool.acquire(Role::Analysis, config).await?;
    let fen: shakmaty::fen::Fen = position.parse()?;
    let parsed: shakmaty::Chess = fen.into_position(shakmaty::CastlingMode::Standard)?;
    let request = MoveRequest {
        position: position.to_string(),
        time_budget: config.time_budget,
        side_to_move: shakmaty::Position::turn(&parsed),
    };
    session.request_move(&request).await
}
