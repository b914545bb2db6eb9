use std::{collections::HashMap, fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    profile::StyleProfile,
    types::{EngineConfig, EngineError, EngineResult, Role},
};

/// Persisted role→engine mapping, read as a snapshot at game start.
///
/// The core never writes this during play; ownership stays with whatever
/// configuration UI maintains it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineRegistry {
    pub engines: HashMap<Role, EngineConfig>,
}

impl EngineRegistry {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        let registry: Self = serde_json::from_str(&text)
            .map_err(|e| EngineError::InvalidConfig(format!("engine registry {path:?}: {e}")))?;
        debug!("loaded engine registry: {} roles", registry.engines.len());
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidConfig(format!("engine registry: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn config_for(&self, role: Role) -> Option<&EngineConfig> {
        self.engines.get(&role)
    }

    pub fn set(&mut self, role: Role, config: EngineConfig) {
        self.engines.insert(role, config);
    }
}

/// Persisted player-identifier→profile cache, so a profile survives between
/// games without re-deriving it from the full history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileCache {
    pub profiles: HashMap<String, StyleProfile>,
}

impl ProfileCache {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        let cache: Self = serde_json::from_str(&text)
            .map_err(|e| EngineError::InvalidConfig(format!("profile cache {path:?}: {e}")))?;
        debug!("loaded profile cache: {} players", cache.profiles.len());
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidConfig(format!("profile cache: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn profile_for(&self, player: &str) -> Option<&StyleProfile> {
        self.profiles.get(player)
    }

    pub fn insert(&mut self, player: impl Into<String>, profile: StyleProfile) {
        self.profiles.insert(player.into(), profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{derive_profile, GameHistorySummary};

    fn sample_profile() -> StyleProfile {
        derive_profile(&GameHistorySummary {
            player: "sample".into(),
            total_games: 50,
            average_rating: 1750,
            win_rate: 51.0,
            draw_rate: 9.0,
            loss_rate: 40.0,
            white_win_rate: 53.0,
            black_win_rate: 49.0,
            average_game_length: 40.0,
            opening_frequency: vec![("Ruy Lopez".into(), 18)],
            average_move_time: 7.5,
        })
        .unwrap()
    }

    #[test]
    fn engine_registry_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engines.json");

        let mut registry = EngineRegistry::default();
        registry.set(
            Role::PrimaryOpponent,
            EngineConfig::new("/usr/bin/stockfish").with_option("Hash", 256),
        );
        registry.set(Role::Analysis, EngineConfig::new("/usr/bin/stockfish"));
        registry.save(&path).unwrap();

        let loaded = EngineRegistry::load(&path).unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(
            loaded
                .config_for(Role::PrimaryOpponent)
                .unwrap()
                .option("Hash"),
            Some("256")
        );
        assert!(loaded.config_for(Role::SecondaryOpponent).is_none());
    }

    #[test]
    fn profile_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        let mut cache = ProfileCache::default();
        cache.insert("lichess:someone", sample_profile());
        cache.save(&path).unwrap();

        let loaded = ProfileCache::load(&path).unwrap();
        assert_eq!(loaded, cache);
        assert!(loaded.profile_for("lichess:someone").is_some());
        assert!(loaded.profile_for("unknown").is_none());
    }

    #[test]
    fn corrupt_file_is_an_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engines.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EngineRegistry::load(&path),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
