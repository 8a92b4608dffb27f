// Level file loader: `levels/*.json`, hot-reloaded by mtime. A real asset
// pipeline and JSON-schema validation for uploaded custom levels are
// external collaborators (see `ports::LevelCatalog`'s doc comment); this
// keeps a small in-memory cache keyed by file stem and re-reads a file only
// when its mtime moves forward.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;

use tracing::warn;

use crate::domain::level::LevelData;
use crate::domain::match_state::GameMode;
use crate::domain::ports::LevelCatalog;

struct CachedLevel {
    mtime: SystemTime,
    data: LevelData,
}

pub struct FileLevelCatalog {
    dir: PathBuf,
    cache: RwLock<HashMap<String, CachedLevel>>,
}

impl FileLevelCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileLevelCatalog {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn load_fresh(&self, id: &str) -> Option<LevelData> {
        let path = self.dir.join(format!("{id}.json"));
        let metadata = fs::metadata(&path).ok()?;
        let mtime = metadata.modified().ok()?;

        if let Some(cached) = self.cache.read().expect("level cache poisoned").get(id) {
            if cached.mtime >= mtime {
                return Some(cached.data.clone());
            }
        }

        let raw = fs::read_to_string(&path).ok()?;
        let json: serde_json::Value = serde_json::from_str(&raw).ok()?;
        let data = LevelData::from_raw_json(id, &json)?;

        self.cache
            .write()
            .expect("level cache poisoned")
            .insert(id.to_string(), CachedLevel { mtime, data: data.clone() });
        Some(data)
    }

    fn list_level_ids(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect()
    }
}

impl LevelCatalog for FileLevelCatalog {
    fn get_level(&self, id: &str) -> Option<LevelData> {
        self.load_fresh(id)
    }

    fn get_random_level(&self, kind: &str, level_mode: GameMode) -> Option<LevelData> {
        let prefix = match level_mode {
            GameMode::Hell => "hell_",
            GameMode::Pvp => "pvp_",
            GameMode::Royale => "",
        };
        let candidates: Vec<String> = self
            .list_level_ids()
            .into_iter()
            .filter(|id| id.starts_with(kind) || id.starts_with(&format!("{prefix}{kind}")))
            .collect();
        if candidates.is_empty() {
            warn!(kind, "no level files matched random level request");
            return None;
        }
        let pick = crate::interface_adapters::utils::rng::rand_id() as usize % candidates.len();
        self.load_fresh(&candidates[pick])
    }

    fn validate_custom_level(&self, raw: &serde_json::Value) -> Result<LevelData, String> {
        LevelData::from_raw_json("custom", raw).ok_or_else(|| "malformed level".to_string())
    }
}
