//! Channel library: the saved collection of channels

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::{Store, SortMode, LIBRARY_KEY};
use crate::error::{Error, Result};
use crate::m3u_parser::parse_m3u;
use crate::models::{new_id, timestamp_now, Channel};

/// A display group and its channels
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub name: &'a str,
    pub channels: Vec<&'a Channel>,
}

/// Ordered collection of channels with unique ids
#[derive(Debug, Clone, Default)]
pub struct Library {
    channels: Vec<Channel>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the library saved in `store`
    ///
    /// A corrupt saved library is logged and replaced by an empty one.
    pub fn load(store: &dyn Store) -> Self {
        let Some(content) = store.get(LIBRARY_KEY) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<Channel>>(&content) {
            Ok(channels) => {
                let mut library = Self::default();
                library.append_unique(channels, None);
                debug!(count = library.len(), "loaded library");
                library
            }
            Err(e) => {
                warn!("failed to parse saved library: {}", e);
                Self::default()
            }
        }
    }

    // Entries without an id, or with one already taken, get a fresh id.
    // `added_at` overrides the entries' own timestamp when set.
    fn append_unique(&mut self, channels: Vec<Channel>, added_at: Option<i64>) {
        let mut ids: HashSet<String> = self.channels.iter().map(|c| c.id.clone()).collect();
        self.channels.reserve(channels.len());

        for mut channel in channels {
            if channel.id.is_empty() || ids.contains(&channel.id) {
                channel.id = new_id();
            }
            ids.insert(channel.id.clone());
            if added_at.is_some() {
                channel.added_at = added_at;
            }
            self.channels.push(channel);
        }
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<()> {
        store.set(LIBRARY_KEY, serde_json::to_string(&self.channels)?)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Add a channel from the form; returns its new id
    pub fn add(&mut self, mut channel: Channel) -> String {
        channel.id = new_id();
        channel.added_at = Some(timestamp_now());
        let id = channel.id.clone();
        info!(name = %channel.name, id = %id, "added channel");
        self.channels.push(channel);
        id
    }

    /// Parse playlist text and append every entry; returns how many were added
    ///
    /// Nothing changes when the playlist holds no complete entry.
    pub fn import_m3u(&mut self, content: &str) -> usize {
        self.import_channels(parse_m3u(content))
    }

    /// Append already-parsed channels, stamping the import time
    pub fn import_channels(&mut self, channels: Vec<Channel>) -> usize {
        if channels.is_empty() {
            debug!("nothing to import");
            return 0;
        }

        let count = channels.len();
        self.append_unique(channels, Some(timestamp_now()));
        info!(count, "imported channels");
        count
    }

    /// Replace every field of an existing channel, keeping its id
    pub fn update(&mut self, id: &str, mut channel: Channel) -> Result<()> {
        let existing = self
            .channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::UnknownChannel(id.to_string()))?;
        channel.id = existing.id.clone();
        if channel.added_at.is_none() {
            channel.added_at = existing.added_at;
        }
        *existing = channel;
        debug!(id, "updated channel");
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Channel> {
        let pos = self
            .channels
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::UnknownChannel(id.to_string()))?;
        let removed = self.channels.remove(pos);
        info!(name = %removed.name, id, "removed channel");
        Ok(removed)
    }

    pub fn clear(&mut self) {
        info!(count = self.channels.len(), "cleared library");
        self.channels.clear();
    }

    /// Channels bucketed by display group
    ///
    /// Channels keep their insertion order inside a group.
    pub fn grouped(&self, sort_mode: SortMode) -> Vec<Group<'_>> {
        let mut groups: Vec<Group<'_>> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for channel in &self.channels {
            let name = channel.display_group();
            match index.get(name) {
                Some(&pos) => groups[pos].channels.push(channel),
                None => {
                    index.insert(name, groups.len());
                    groups.push(Group {
                        name,
                        channels: vec![channel],
                    });
                }
            }
        }

        if sort_mode == SortMode::Alphabetical {
            groups.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.name.cmp(b.name))
            });
        }
        groups
    }

    /// Filter the grouped library by a search query
    ///
    /// A group whose name matches keeps all of its channels, otherwise only
    /// channels whose name matches are kept. Matching is case-insensitive.
    pub fn search(&self, query: &str, sort_mode: SortMode) -> Vec<Group<'_>> {
        let groups = self.grouped(sort_mode);
        if query.trim().is_empty() {
            return groups;
        }

        let query = query.to_lowercase();
        groups
            .into_iter()
            .filter_map(|group| {
                if group.name.to_lowercase().contains(&query) {
                    return Some(group);
                }
                let channels: Vec<&Channel> = group
                    .channels
                    .into_iter()
                    .filter(|c| c.name.to_lowercase().contains(&query))
                    .collect();
                (!channels.is_empty()).then_some(Group {
                    name: group.name,
                    channels,
                })
            })
            .collect()
    }

    /// Channels in the order they are exported
    pub fn export_order(&self, sort_mode: SortMode) -> Vec<Channel> {
        self.grouped(sort_mode)
            .into_iter()
            .flat_map(|g| g.channels.into_iter().cloned())
            .collect()
    }
}
