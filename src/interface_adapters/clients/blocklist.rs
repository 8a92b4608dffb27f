// Persistent blocked-address list: `blocked.json`, an array of
// `[address, name, reason]` triples (SPEC_FULL.md §6). Grounded on
// `clients::levels::FileLevelCatalog`'s file-backed collaborator shape,
// generalized from a read-only hot-reloaded cache into a list the server
// itself appends to (`blockAddress` in the source system).

use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlockedEntry(String, String, String);

pub struct BlockList {
    path: PathBuf,
    entries: RwLock<Vec<BlockedEntry>>,
}

impl BlockList {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        BlockList { path, entries: RwLock::new(entries) }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let addr = ip.to_string();
        self.entries.read().expect("blocklist poisoned").iter().any(|e| e.0 == addr)
    }

    /// Appends `[address, name, reason]` and rewrites `blocked.json`, the
    /// way the source system's `blockAddress` keeps the file in sync.
    pub fn block(&self, ip: IpAddr, name: &str, reason: &str) {
        let addr = ip.to_string();
        let mut entries = self.entries.write().expect("blocklist poisoned");
        if entries.iter().any(|e| e.0 == addr) {
            return;
        }
        entries.push(BlockedEntry(addr, name.to_string(), reason.to_string()));
        match serde_json::to_string(&*entries) {
            Ok(raw) => {
                if let Err(err) = fs::write(&self.path, raw) {
                    warn!(error = %err, "failed to persist blocked.json");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize blocked.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let list = BlockList::load("/tmp/definitely_missing_blocked_file.json");
        assert!(!list.contains("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn block_then_contains() {
        let path = std::env::temp_dir().join("blocklist_test_block_then_contains.json");
        let _ = fs::remove_file(&path);
        let list = BlockList::load(&path);
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(!list.contains(ip));
        list.block(ip, "griefer", "trust abuse");
        assert!(list.contains(ip));
        let reloaded = BlockList::load(&path);
        assert!(reloaded.contains(ip));
        let _ = fs::remove_file(&path);
    }
}
