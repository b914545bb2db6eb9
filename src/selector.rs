use std::time::Duration;

use log::debug;
use rand::Rng;

use crate::{
    profile::StyleProfile,
    types::{Candidate, EngineError, EngineResult},
};

/// Outcome of applying a selection policy to one set of candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chosen move in UCI notation
    pub uci: String,
    /// True when a non-best candidate was deliberately picked
    pub perturbed: bool,
    /// Deliberation delay to impose before the move is surfaced
    pub think_time: Duration,
}

/// Apply a profile's humanization policy to an ordered candidate list.
///
/// With probability `error_probability` a uniformly chosen non-best candidate
/// is played instead of the top line. A single candidate leaves nothing to
/// err towards, so the result is never marked perturbed in that case. The
/// think time is drawn uniformly from the profile's range.
///
/// Pure given the RNG, so tests can pin a seed.
pub fn choose(
    candidates: &[Candidate],
    profile: &StyleProfile,
    rng: &mut impl Rng,
) -> EngineResult<Selection> {
    let best = candidates
        .first()
        .ok_or_else(|| EngineError::Protocol("engine returned no candidates".into()))?;

    let mut chosen = best;
    let mut perturbed = false;
    if candidates.len() > 1 && rng.gen::<f64>() < profile.error_probability {
        let index = rng.gen_range(1..candidates.len());
        chosen = &candidates[index];
        perturbed = true;
        debug!(
            "error injection: playing candidate #{} ({}) over {}",
            index + 1,
            chosen.uci,
            best.uci
        );
    }

    let (min, max) = profile.think_time_range;
    let think_time = if max > min {
        min + (max - min).mul_f64(rng.gen::<f64>())
    } else {
        min
    };

    Ok(Selection {
        uci: chosen.uci.clone(),
        perturbed,
        think_time,
    })
}

/// Emulate deliberation. Suspends the caller only; other sessions keep
/// making progress while the delay elapses.
pub async fn deliberate(think_time: Duration) {
    if !think_time.is_zero() {
        tokio::time::sleep(think_time).await;
    }
}
