//! Data models for the Gravity channel library

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name given to entries that carry no name of their own
pub const UNKNOWN_STREAM: &str = "Unknown Stream";
/// Group assigned to channels imported from a playlist without `group-title`
pub const DEFAULT_GROUP: &str = "General";
/// Bucket shown for channels whose group is empty
pub const UNCATEGORIZED: &str = "Uncategorized";

/// DRM scheme selected for a channel
///
/// Unknown strings deserialize to `None` so a foreign value can never be
/// mistaken for a real scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrmScheme {
    #[default]
    None,
    ClearKey,
    Widevine,
    PlayReady,
}

impl DrmScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrmScheme::None => "",
            DrmScheme::ClearKey => "clearkey",
            DrmScheme::Widevine => "widevine",
            DrmScheme::PlayReady => "playready",
        }
    }

    /// Lenient conversion, anything unrecognised means no DRM
    pub fn from_name(name: &str) -> Self {
        match name {
            "clearkey" => DrmScheme::ClearKey,
            "widevine" => DrmScheme::Widevine,
            "playready" => DrmScheme::PlayReady,
            _ => DrmScheme::None,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == DrmScheme::None
    }
}

impl std::fmt::Display for DrmScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing for user input, unlike [`DrmScheme::from_name`]
impl std::str::FromStr for DrmScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(DrmScheme::None),
            "clearkey" => Ok(DrmScheme::ClearKey),
            "widevine" => Ok(DrmScheme::Widevine),
            "playready" => Ok(DrmScheme::PlayReady),
            other => Err(format!("unknown DRM scheme '{}'", other)),
        }
    }
}

impl Serialize for DrmScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DrmScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.as_deref().map(DrmScheme::from_name).unwrap_or_default())
    }
}

/// Channel record shared by the parser, generator, library and player
///
/// Field names follow the persisted library format (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub manifest_url: String,
    #[serde(default)]
    pub drm_scheme: DrmScheme,
    /// `kid:key[,kid:key...]` for ClearKey
    #[serde(default)]
    pub clear_keys: String,
    /// License server for Widevine / PlayReady
    #[serde(default)]
    pub license_url: String,
    // Request header overrides
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub authorization: String,
    /// Unix timestamp (milliseconds) when the channel entered the library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<i64>,
}

impl Default for Channel {
    /// Blank record as presented by the configuration form
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "New Stream".to_string(),
            group: String::new(),
            logo: String::new(),
            manifest_url: String::new(),
            drm_scheme: DrmScheme::None,
            clear_keys: String::new(),
            license_url: String::new(),
            user_agent: String::new(),
            referrer: String::new(),
            authorization: String::new(),
            added_at: None,
        }
    }
}

impl Channel {
    /// Fresh record as started by an `#EXTINF` line
    pub fn parsed() -> Self {
        Self {
            name: UNKNOWN_STREAM.to_string(),
            group: DEFAULT_GROUP.to_string(),
            ..Self::default()
        }
    }

    /// Group used for display bucketing
    pub fn display_group(&self) -> &str {
        if self.group.is_empty() {
            UNCATEGORIZED
        } else {
            &self.group
        }
    }

    pub fn is_playable(&self) -> bool {
        !self.manifest_url.is_empty()
    }
}

/// Generate a new unique channel id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time as a millisecond Unix timestamp
pub fn timestamp_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
