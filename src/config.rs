//! Configuration management
//!
//! Everything is persisted through a small key/value [`Store`], one JSON
//! document per key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

pub const LIBRARY_KEY: &str = "gravity_library";
pub const PREFS_KEY: &str = "gravity_prefs";
pub const COLLAPSED_GROUPS_KEY: &str = "gravity_collapsed_groups";

/// Get/set-by-key string storage
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

/// In-memory store, nothing survives the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Default location in the platform config directory
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("gravity");
        path.push("storage.json");
        path
    }

    /// Open the store at `path`; a missing or unreadable file starts empty
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), "ignoring corrupt storage file: {}", e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        debug!(path = %path.display(), keys = values.len(), "opened storage");
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write beside the target then rename, so a crash never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// Load a JSON value stored under `key`, falling back to the default
pub fn load_json<T>(store: &dyn Store, key: &str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    let Some(content) = store.get(key) else {
        return T::default();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(key, "failed to parse stored value: {}", e);
        T::default()
    })
}

/// Save a value as JSON under `key`
pub fn save_json<T: Serialize>(store: &mut dyn Store, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_string(value)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Groups A-Z
    #[default]
    Alphabetical,
    /// Groups in insertion order
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GridSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "alphabetical" | "a-z" => Ok(SortMode::Alphabetical),
            "default" => Ok(SortMode::Default),
            _ => Err(format!("unknown sort mode '{}'", s)),
        }
    }
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "grid" => Ok(ViewMode::Grid),
            "list" => Ok(ViewMode::List),
            _ => Err(format!("unknown view mode '{}'", s)),
        }
    }
}

impl std::str::FromStr for GridSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "small" => Ok(GridSize::Small),
            "medium" => Ok(GridSize::Medium),
            "large" => Ok(GridSize::Large),
            _ => Err(format!("unknown grid size '{}'", s)),
        }
    }
}

/// Library display preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub sort_mode: SortMode,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default)]
    pub grid_size: GridSize,
}

impl Preferences {
    pub fn load(store: &dyn Store) -> Self {
        load_json(store, PREFS_KEY)
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<()> {
        save_json(store, PREFS_KEY, self)
    }
}

/// Which library groups are collapsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CollapsedGroups(BTreeMap<String, bool>);

impl CollapsedGroups {
    pub fn load(store: &dyn Store) -> Self {
        load_json(store, COLLAPSED_GROUPS_KEY)
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<()> {
        save_json(store, COLLAPSED_GROUPS_KEY, self)
    }

    pub fn is_collapsed(&self, group: &str) -> bool {
        self.0.get(group).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, group: &str) {
        let collapsed = !self.is_collapsed(group);
        self.0.insert(group.to_string(), collapsed);
    }

    pub fn collapse_all<'a>(&mut self, groups: impl IntoIterator<Item = &'a str>) {
        self.0 = groups.into_iter().map(|g| (g.to_string(), true)).collect();
    }

    pub fn expand_all(&mut self) {
        self.0.clear();
    }

    /// True when there is at least one group and all of them are collapsed
    pub fn all_collapsed<'a>(&self, groups: impl IntoIterator<Item = &'a str>) -> bool {
        let mut any = false;
        for group in groups {
            if !self.is_collapsed(group) {
                return false;
            }
            any = true;
        }
        any
    }
}
