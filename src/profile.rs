use std::{path::PathBuf, time::Duration};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::{EngineConfig, EngineError, EngineResult, DEFAULT_TIME_BUDGET};

/// Top of the engine's strength-limiting scale (Stockfish convention)
pub const MAX_SKILL: u8 = 20;

/// Limit-strength window engines accept for a target rating (UCI_Elo)
pub const MIN_TARGET_RATING: u32 = 1320;
pub const MAX_TARGET_RATING: u32 = 3190;

/// Tendency score above which a player is modeled as sharp enough that only
/// the engine's top line is sampled (scores are 0-100, centered on 50)
const SHARP_STYLE_THRESHOLD: f64 = 60.0;

/// Rating bands, each mapped to a contiguous sub-range of the skill scale.
/// The exact rating is interpolated linearly inside its band.
const RATING_BANDS: [(u32, u32, u8, u8); 7] = [
    (1000, 1200, 0, 2),
    (1200, 1400, 3, 5),
    (1400, 1600, 6, 8),
    (1600, 1800, 9, 11),
    (1800, 2000, 12, 14),
    (2000, 2200, 15, 17),
    (2200, 2400, 18, 20),
];

/// Opening-name fragments counted as sharp when scoring tactical tendency
const SHARP_OPENINGS: [&str; 10] = [
    "sicilian", "dragon", "najdorf", "king", "gambit", "attack", "defense", "counter", "benoni",
    "dutch",
];

// =============================================================================
// Data Model
// =============================================================================

/// Aggregate statistics over one player's game history.
///
/// Produced by an external ingestion collaborator; the core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHistorySummary {
    pub player: String,
    pub total_games: u32,
    pub average_rating: u32,
    /// Result rates in percent
    pub win_rate: f64,
    pub draw_rate: f64,
    pub loss_rate: f64,
    pub white_win_rate: f64,
    pub black_win_rate: f64,
    /// Average game length in moves
    pub average_game_length: f64,
    /// Opening names with occurrence counts, most frequent first
    pub opening_frequency: Vec<(String, u32)>,
    /// Average thinking time per move, in seconds
    pub average_move_time: f64,
}

/// Play parameters derived once from a player's history.
///
/// Invariants: `error_probability` never increases with `skill_level`;
/// `think_time_range` is non-empty with non-negative bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProfile {
    /// Bounded strength-limit scale, 0..=MAX_SKILL
    pub skill_level: u8,
    /// Rating the engine is asked to imitate, when inside the engine's window
    pub target_rating: Option<u32>,
    pub search_depth_range: (u8, u8),
    pub think_time_range: (Duration, Duration),
    /// Chance of deliberately playing a non-best candidate, 0..=1
    pub error_probability: f64,
    /// Candidate lines requested per search
    pub multi_line_count: u16,
}

impl StyleProfile {
    /// Build the session config that makes `engine_path` play like this
    /// profile: strength limiting plus conservative resource options.
    pub fn engine_config(&self, engine_path: impl Into<PathBuf>) -> EngineConfig {
        let threads = std::thread::available_parallelism()
            .map(|n| (n.get() / 2).max(1))
            .unwrap_or(1);

        let mut config = EngineConfig::new(engine_path)
            .with_option("Skill Level", self.skill_level)
            .with_option("Threads", threads)
            .with_option("Hash", 128)
            .with_multi_line_count(self.multi_line_count)
            .with_time_budget(DEFAULT_TIME_BUDGET);

        if let Some(rating) = self.target_rating {
            config = config
                .with_option("UCI_LimitStrength", true)
                .with_option("UCI_Elo", rating);
        }
        config
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Derive the play parameters modeling a player from their history.
///
/// An empty history carries no signal at all, so it is rejected with
/// `InsufficientData` rather than silently producing a median profile.
pub fn derive_profile(summary: &GameHistorySummary) -> EngineResult<StyleProfile> {
    if summary.total_games == 0 {
        return Err(EngineError::InsufficientData);
    }

    let skill_level = skill_for_rating(summary.average_rating);
    let strength = f64::from(skill_level) / f64::from(MAX_SKILL);

    let error_probability = (0.25 - 0.23 * strength).clamp(0.02, 0.25);

    // Weakest profiles snap-move, strongest take a few seconds
    let think_time_range = (
        Duration::from_secs_f64(0.1 + 1.9 * strength),
        Duration::from_secs_f64(0.5 + 2.5 * strength),
    );

    let depth_hi = (4.0 + 16.0 * strength).round() as u8;
    let search_depth_range = (depth_hi.saturating_sub(2).max(2), depth_hi);

    let aggressive = aggressive_score(summary);
    let tactical = tactical_score(summary);
    let multi_line_count = if aggressive.max(tactical) > SHARP_STYLE_THRESHOLD {
        1
    } else {
        3
    };

    let target_rating = Some(
        summary
            .average_rating
            .clamp(MIN_TARGET_RATING, MAX_TARGET_RATING),
    );

    debug!(
        "derived profile for {}: skill={skill_level}, err={error_probability:.3}, \
         aggressive={aggressive:.1}, tactical={tactical:.1}, lines={multi_line_count}",
        summary.player
    );

    Ok(StyleProfile {
        skill_level,
        target_rating,
        search_depth_range,
        think_time_range,
        error_probability,
        multi_line_count,
    })
}

/// Monotone step function over the rating bands, interpolated within a band
fn skill_for_rating(rating: u32) -> u8 {
    for (low, high, skill_low, skill_high) in RATING_BANDS {
        if rating < high {
            let clamped = rating.max(low);
            let t = f64::from(clamped - low) / f64::from(high - low);
            let span = f64::from(skill_high - skill_low);
            return skill_low + (span * t).round() as u8;
        }
    }
    MAX_SKILL
}

/// Shorter decisive games read as aggression
fn aggressive_score(summary: &GameHistorySummary) -> f64 {
    let length_score = ((60.0 - summary.average_game_length) * 2.0).clamp(0.0, 100.0);
    (length_score * 0.7 + summary.win_rate * 0.3).clamp(0.0, 100.0)
}

/// Sharp openings and short games read as tactical play
fn tactical_score(summary: &GameHistorySummary) -> f64 {
    let mut sharp = 0u32;
    let mut total = 0u32;
    for (opening, count) in &summary.opening_frequency {
        let name = opening.to_lowercase();
        total += count;
        if SHARP_OPENINGS.iter().any(|kw| name.contains(kw)) {
            sharp += count;
        }
    }
    let opening_score = if total > 0 {
        f64::from(sharp) / f64::from(total) * 100.0
    } else {
        50.0
    };

    let length_score = ((60.0 - summary.average_game_length) * 1.5).clamp(0.0, 100.0);
    (opening_score * 0.6 + length_score * 0.4).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(rating: u32) -> GameHistorySummary {
        GameHistorySummary {
            player: "tester".into(),
            total_games: 120,
            average_rating: rating,
            win_rate: 48.0,
            draw_rate: 10.0,
            loss_rate: 42.0,
            white_win_rate: 50.0,
            black_win_rate: 46.0,
            average_game_length: 42.0,
            opening_frequency: vec![("Italian Game".into(), 30), ("Queen's Gambit".into(), 12)],
            average_move_time: 8.0,
        }
    }

    #[test]
    fn empty_history_is_rejected() {
        let mut empty = summary(1500);
        empty.total_games = 0;
        assert!(matches!(
            derive_profile(&empty),
            Err(EngineError::InsufficientData)
        ));
    }

    #[test]
    fn derivation_is_monotone_in_rating() {
        let mut last_skill = 0u8;
        let mut last_error = f64::MAX;
        for rating in (600..3000).step_by(25) {
            let profile = derive_profile(&summary(rating)).unwrap();
            assert!(
                profile.skill_level >= last_skill,
                "skill dropped at rating {rating}"
            );
            assert!(
                profile.error_probability <= last_error + 1e-12,
                "error probability rose at rating {rating}"
            );
            last_skill = profile.skill_level;
            last_error = profile.error_probability;
        }
    }

    #[test]
    fn skill_bands_cover_the_scale() {
        assert_eq!(skill_for_rating(700), 0);
        assert_eq!(skill_for_rating(1000), 0);
        assert_eq!(skill_for_rating(2400), 20);
        assert_eq!(skill_for_rating(2900), 20);
        // Interior band midpoint lands mid-sub-range
        assert_eq!(skill_for_rating(1700), 10);
    }

    #[test]
    fn error_probability_bounds() {
        let weakest = derive_profile(&summary(800)).unwrap();
        let strongest = derive_profile(&summary(2800)).unwrap();
        assert!((weakest.error_probability - 0.25).abs() < 1e-9);
        assert!((strongest.error_probability - 0.02).abs() < 1e-9);
    }

    #[test]
    fn think_time_range_is_well_formed() {
        for rating in [700, 1500, 2000, 2800] {
            let profile = derive_profile(&summary(rating)).unwrap();
            let (min, max) = profile.think_time_range;
            assert!(min <= max, "inverted range at rating {rating}");
            assert!(min >= Duration::from_millis(100));
            assert!(max <= Duration::from_secs(3));
        }
    }

    #[test]
    fn sharp_players_get_a_single_line() {
        let mut sharp = summary(1800);
        sharp.average_game_length = 24.0;
        sharp.opening_frequency = vec![("Sicilian Defense: Najdorf".into(), 40)];
        let profile = derive_profile(&sharp).unwrap();
        assert_eq!(profile.multi_line_count, 1);

        let mut quiet = summary(1800);
        quiet.average_game_length = 58.0;
        quiet.opening_frequency = vec![("Caro-Kann".into(), 40), ("Italian Game".into(), 22)];
        let profile = derive_profile(&quiet).unwrap();
        assert_eq!(profile.multi_line_count, 3);
    }

    #[test]
    fn target_rating_is_clamped_to_engine_window() {
        assert_eq!(
            derive_profile(&summary(900)).unwrap().target_rating,
            Some(MIN_TARGET_RATING)
        );
        assert_eq!(
            derive_profile(&summary(2000)).unwrap().target_rating,
            Some(2000)
        );
    }

    #[test]
    fn engine_config_carries_strength_options() {
        let profile = derive_profile(&summary(1650)).unwrap();
        let config = profile.engine_config("/usr/bin/stockfish");
        assert_eq!(
            config.option("Skill Level"),
            Some(profile.skill_level.to_string().as_str())
        );
        assert_eq!(config.option("UCI_LimitStrength"), Some("true"));
        assert_eq!(config.option("UCI_Elo"), Some("1650"));
        assert_eq!(config.multi_line_count, profile.multi_line_count);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn profile_serializes_round_trip() {
        let profile = derive_profile(&summary(1900)).unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        let back: StyleProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, back);
    }
}
