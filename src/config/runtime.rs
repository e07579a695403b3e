use super::IngestConfig;

/// Source of override values; the process environment in production.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from `std::env`
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl IngestConfig {
    /// Overlay `REPLAY_INGEST_*` environment variables. Unparseable values
    /// are ignored and the current setting kept.
    pub fn apply_env(&mut self, env: &dyn EnvSource) {
        if let Some(v) = env.var("REPLAY_INGEST_DATABASE") {
            self.sink.database = v;
        }
        if let Some(v) = env.var("REPLAY_INGEST_GAME") {
            self.sink.game = v;
        }
        if let Some(v) = env.var("REPLAY_INGEST_FLUSH_WINDOW_TICKS") {
            if let Ok(n) = v.parse::<u32>() {
                self.flush.window_ticks = n;
            }
        }
        if let Some(v) = env.var("REPLAY_INGEST_FLUSH_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                self.flush.max_attempts = n;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn test_env_overrides() {
        let env = MapEnv(HashMap::from([
            ("REPLAY_INGEST_DATABASE", "/data/replays.db"),
            ("REPLAY_INGEST_FLUSH_WINDOW_TICKS", "30"),
        ]));

        let mut config = IngestConfig::default();
        config.apply_env(&env);
        assert_eq!(config.sink.database, "/data/replays.db");
        assert_eq!(config.flush.window_ticks, 30);
        assert_eq!(config.flush.max_attempts, 3);
    }

    #[test]
    fn test_invalid_env_value_keeps_setting() {
        let env = MapEnv(HashMap::from([
            ("REPLAY_INGEST_FLUSH_WINDOW_TICKS", "fifteen"),
            ("REPLAY_INGEST_FLUSH_MAX_ATTEMPTS", "-1"),
        ]));

        let mut config = IngestConfig::default();
        config.apply_env(&env);
        assert_eq!(config.flush.window_ticks, 15);
        assert_eq!(config.flush.max_attempts, 3);
    }

    #[test]
    fn test_env_overlays_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.toml");
        std::fs::write(&path, "[flush]\nwindow_ticks = 20\n\n[sink]\ngame = \"dota\"\n").unwrap();

        let mut config = load_config(&path).unwrap();
        let env = MapEnv(HashMap::from([("REPLAY_INGEST_GAME", "dota_reborn")]));
        config.apply_env(&env);

        // file values survive unless the environment names them
        assert_eq!(config.flush.window_ticks, 20);
        assert_eq!(config.sink.game, "dota_reborn");
        assert_eq!(config.sink.database, "gamevis.db");
    }
}
