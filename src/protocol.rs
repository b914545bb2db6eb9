use log::{trace, warn};
use shakmaty::{fen::Fen, CastlingMode, Chess, Position};
use vampirc_uci::{parse_one, UciInfoAttribute, UciMessage, UciOptionConfig};

use crate::types::{Candidate, EngineConfig, EngineError, EngineResult, Evaluation};

/// Engine identity and declared options, collected during the handshake
#[derive(Debug, Clone, Default)]
pub struct EngineCapabilities {
    pub name: String,
    pub options: Vec<UciOptionConfig>,
}

impl EngineCapabilities {
    pub fn supports(&self, option_name: &str) -> bool {
        self.options.iter().any(|opt| option_name_of(opt) == option_name)
    }

    /// Declared min/max for a spin option, if the engine declared one
    pub fn spin_range(&self, option_name: &str) -> Option<(i64, i64)> {
        self.options.iter().find_map(|opt| match opt {
            UciOptionConfig::Spin { name, min, max, .. } if name == option_name => {
                Some((min.unwrap_or(i64::MIN), max.unwrap_or(i64::MAX)))
            }
            _ => None,
        })
    }

    /// Check a config against the engine's declared option ranges.
    ///
    /// Only options the engine actually declares are checked; engines ignore
    /// unknown `setoption` names, so those only warrant a warning.
    pub fn check_config(&self, config: &EngineConfig) -> EngineResult<()> {
        for option in &config.options {
            match self.spin_range(&option.name) {
                Some((min, max)) => {
                    let value: i64 = option.value.parse().map_err(|_| {
                        EngineError::InvalidConfig(format!(
                            "{} expects a number, got {:?}",
                            option.name, option.value
                        ))
                    })?;
                    if value < min || value > max {
                        return Err(EngineError::InvalidConfig(format!(
                            "{} = {} outside declared range {}..={}",
                            option.name, value, min, max
                        )));
                    }
                }
                None => {
                    if !self.supports(&option.name) {
                        warn!("engine {} does not declare option {}", self.name, option.name);
                    }
                }
            }
        }
        if config.multi_line_count > 1 {
            if let Some((_, max)) = self.spin_range("MultiPV") {
                if i64::from(config.multi_line_count) > max {
                    return Err(EngineError::InvalidConfig(format!(
                        "multi_line_count {} exceeds engine MultiPV max {}",
                        config.multi_line_count, max
                    )));
                }
            }
        }
        Ok(())
    }
}

fn option_name_of(opt: &UciOptionConfig) -> &str {
    match opt {
        UciOptionConfig::Check { name, .. } => name,
        UciOptionConfig::Spin { name, .. } => name,
        UciOptionConfig::Combo { name, .. } => name,
        UciOptionConfig::Button { name } => name,
        UciOptionConfig::String { name, .. } => name,
    }
}

// =============================================================================
// Line Classification
// =============================================================================

/// One line of engine output during the startup handshake
#[derive(Debug, Clone)]
pub enum HandshakeEvent {
    Id(String),
    DeclaredOption(UciOptionConfig),
    UciOk,
    ReadyOk,
    /// Banner text and other chatter engines print before speaking UCI
    Noise,
}

/// One line of engine output while a search is running
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// A well-formed info line carrying a principal variation
    Candidate(Candidate),
    /// The single terminating line of a search
    BestMove { uci: String },
    /// Well-formed but irrelevant (currmove, info string, readyok, ...)
    Noise,
    /// Not parseable as UCI at all
    Malformed,
}

pub fn classify_handshake_line(line: &str) -> HandshakeEvent {
    if line.trim().is_empty() {
        return HandshakeEvent::Noise;
    }
    match parse_one(line) {
        UciMessage::Id { name: Some(name), .. } => HandshakeEvent::Id(name),
        UciMessage::Option(opt) => HandshakeEvent::DeclaredOption(opt),
        UciMessage::UciOk => HandshakeEvent::UciOk,
        UciMessage::ReadyOk => HandshakeEvent::ReadyOk,
        _ => HandshakeEvent::Noise,
    }
}

pub fn classify_search_line(line: &str) -> SearchEvent {
    if line.trim().is_empty() {
        return SearchEvent::Noise;
    }
    match parse_one(line) {
        UciMessage::Info(attrs) => match candidate_from_attrs(attrs) {
            Some(candidate) => SearchEvent::Candidate(candidate),
            None => SearchEvent::Noise,
        },
        UciMessage::BestMove { best_move, .. } => SearchEvent::BestMove {
            uci: best_move.to_string(),
        },
        message if matches!(message, UciMessage::Unknown(..)) => {
            trace!("unparseable engine line: {}", line.trim());
            SearchEvent::Malformed
        }
        _ => SearchEvent::Noise,
    }
}

/// Build a candidate from the attributes of one info line.
///
/// Lines without a principal variation (depth-only updates, `info string`,
/// currmove progress) carry no candidate and are treated as noise.
fn candidate_from_attrs(attrs: Vec<UciInfoAttribute>) -> Option<Candidate> {
    let mut uci = None;
    let mut rank = 1u16;
    let mut depth = 0u8;
    let mut evaluation = None;
    let mut nodes = 0u64;
    let mut nps = 0u64;

    for attr in attrs {
        match attr {
            UciInfoAttribute::Pv(moves) => {
                uci = moves.first().map(|m| m.to_string());
            }
            UciInfoAttribute::MultiPv(index) => rank = index,
            UciInfoAttribute::Depth(d) => depth = d as u8,
            UciInfoAttribute::Score { cp, mate, .. } => {
                evaluation = mate
                    .map(|m| Evaluation::Mate(m as i8))
                    .or(cp.map(|v| Evaluation::Centipawns(v as i32)));
            }
            UciInfoAttribute::Nodes(n) => nodes = n,
            UciInfoAttribute::Nps(n) => nps = n,
            _ => {}
        }
    }

    uci.map(|uci| Candidate {
        uci,
        rank,
        depth,
        evaluation,
        nodes,
        nps,
    })
}

// =============================================================================
// Candidate Collection
// =============================================================================

/// Accumulates streamed info lines for one search.
///
/// For each rank only the most recent well-formed line is retained, so the
/// evaluation reported with the result is always the engine's final word.
#[derive(Debug)]
pub struct SearchCollector {
    lines: Vec<Option<Candidate>>,
}

impl SearchCollector {
    pub fn new(expected_lines: u16) -> Self {
        Self {
            lines: vec![None; expected_lines.max(1) as usize],
        }
    }

    pub fn record(&mut self, candidate: Candidate) {
        let index = candidate.rank.max(1) as usize - 1;
        if index >= self.lines.len() {
            // Engines occasionally emit more lines than asked for
            self.lines.resize(index + 1, None);
        }
        self.lines[index] = Some(candidate);
    }

    /// Evaluation of the engine's top line, as last reported
    pub fn reported_evaluation(&self) -> Option<Evaluation> {
        self.lines.first().and_then(|c| c.as_ref()).and_then(|c| c.evaluation)
    }

    /// Resolve the search into an ordered best-to-worst candidate list.
    ///
    /// The terminating best move always heads the list, even when the engine
    /// never streamed an info line for it.
    pub fn finish(self, best_uci: &str) -> Vec<Candidate> {
        let mut ordered: Vec<Candidate> = self.lines.into_iter().flatten().collect();
        ordered.sort_by_key(|c| c.rank);

        match ordered.iter().position(|c| c.uci == best_uci) {
            Some(0) => {}
            Some(index) => {
                let best = ordered.remove(index);
                ordered.insert(0, best);
            }
            None => ordered.insert(
                0,
                Candidate {
                    uci: best_uci.to_string(),
                    rank: 1,
                    depth: 0,
                    evaluation: None,
                    nodes: 0,
                    nps: 0,
                },
            ),
        }

        // A move may appear under several ranks while the engine reorders
        // lines between depths; keep the first occurrence only.
        let mut seen = Vec::with_capacity(ordered.len());
        ordered.retain(|c| {
            if seen.contains(&c.uci) {
                false
            } else {
                seen.push(c.uci.clone());
                true
            }
        });
        ordered
    }
}

/// Clamp a requested line count to the number of legal moves in a position
pub fn effective_multi_line(requested: u16, fen: &str) -> EngineResult<u16> {
    let fen: Fen = fen.parse()?;
    let position: Chess = fen.into_position(CastlingMode::Standard)?;
    let legal = position.legal_moves().len() as u16;
    Ok(requested.min(legal).max(1))
}
