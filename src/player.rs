//! Playback configuration and the external player
//!
//! Playback itself is done by another program. This module turns a channel
//! into the settings an engine needs (manifest, DRM servers or keys, header
//! overrides) and launches a player with them.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Channel, DrmScheme};

pub const WIDEVINE_KEY_SYSTEM: &str = "com.widevine.alpha";
pub const PLAYREADY_KEY_SYSTEM: &str = "com.microsoft.playready";

/// DRM settings handed to the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrmConfig {
    /// Key system -> license server URL
    pub servers: BTreeMap<String, String>,
    /// Key id -> key, for ClearKey
    pub clear_keys: BTreeMap<String, String>,
}

impl DrmConfig {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.clear_keys.is_empty()
    }
}

/// Everything an engine needs to start one channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackConfig {
    pub title: String,
    pub manifest_url: String,
    pub drm: DrmConfig,
    /// Header name -> value, applied to every request
    pub headers: Vec<(String, String)>,
}

impl PlaybackConfig {
    pub fn from_channel(channel: &Channel) -> Self {
        let mut drm = DrmConfig::default();
        match channel.drm_scheme {
            DrmScheme::ClearKey => drm.clear_keys = parse_clear_keys(&channel.clear_keys),
            DrmScheme::Widevine if !channel.license_url.is_empty() => {
                drm.servers
                    .insert(WIDEVINE_KEY_SYSTEM.to_string(), channel.license_url.clone());
            }
            DrmScheme::PlayReady if !channel.license_url.is_empty() => {
                drm.servers
                    .insert(PLAYREADY_KEY_SYSTEM.to_string(), channel.license_url.clone());
            }
            _ => {}
        }

        let headers = [
            ("User-Agent", &channel.user_agent),
            ("Referer", &channel.referrer),
            ("Authorization", &channel.authorization),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();

        Self {
            title: channel.name.clone(),
            manifest_url: channel.manifest_url.clone(),
            drm,
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse `kid:key[,kid:key...]`; pairs missing either half are skipped
pub fn parse_clear_keys(clear_keys: &str) -> BTreeMap<String, String> {
    clear_keys
        .split(',')
        .filter_map(|part| {
            let mut halves = part.trim().split(':');
            let kid = halves.next()?;
            let key = halves.next()?;
            (!kid.is_empty() && !key.is_empty()).then(|| (kid.to_string(), key.to_string()))
        })
        .collect()
}

/// Seam to a media engine
pub trait PlaybackEngine {
    /// Apply DRM and header settings before loading
    fn configure(&mut self, config: &PlaybackConfig) -> Result<()>;
    /// Start playing a manifest
    fn load(&mut self, manifest_url: &str) -> Result<()>;
    /// Stop playback and release the engine
    fn destroy(&mut self);
}

/// Play a channel on an engine, replacing whatever was playing
pub fn play(engine: &mut dyn PlaybackEngine, channel: &Channel) -> Result<()> {
    if !channel.is_playable() {
        return Err(Error::NotPlayable(channel.name.clone()));
    }
    let config = PlaybackConfig::from_channel(channel);

    engine.destroy();
    engine.configure(&config)?;
    engine.load(&config.manifest_url)
}

/// Engine that launches an external player program (mpv, vlc, ffplay...)
#[derive(Debug)]
pub struct ExternalPlayer {
    command: String,
    config: PlaybackConfig,
    child: Option<Child>,
}

impl Default for ExternalPlayer {
    fn default() -> Self {
        Self::new("mpv")
    }
}

impl ExternalPlayer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            config: PlaybackConfig::default(),
            child: None,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command-line arguments for the configured player
    pub fn build_args(&self, manifest_url: &str) -> Vec<String> {
        let player = self.command.to_lowercase();
        let config = &self.config;
        let user_agent = config.header("User-Agent");
        let referrer = config.header("Referer");
        let authorization = config.header("Authorization");

        let mut args = Vec::new();
        if player.contains("mpv") {
            args.push(manifest_url.to_string());
            if !config.title.is_empty() {
                args.push(format!("--force-media-title={}", config.title));
            }
            if let Some(ua) = user_agent {
                args.push(format!("--user-agent={}", ua));
            }
            if let Some(referrer) = referrer {
                args.push(format!("--referrer={}", referrer));
            }
            if let Some(auth) = authorization {
                // The -append form takes one header, so commas in the value survive
                args.push(format!("--http-header-fields-append=Authorization: {}", auth));
            }
        } else if player.contains("vlc") {
            args.push(manifest_url.to_string());
            if !config.title.is_empty() {
                args.push(format!("--meta-title={}", config.title));
            }
            if let Some(ua) = user_agent {
                args.push(format!("--http-user-agent={}", ua));
            }
            if let Some(referrer) = referrer {
                args.push(format!("--http-referrer={}", referrer));
            }
        } else if player.contains("ffplay") {
            // ffplay wants input options before the input
            if let Some(ua) = user_agent {
                args.extend(["-user_agent".to_string(), ua.to_string()]);
            }
            if let Some(referrer) = referrer {
                args.extend(["-referer".to_string(), referrer.to_string()]);
            }
            if let Some(auth) = authorization {
                args.extend(["-headers".to_string(), format!("Authorization: {}\r\n", auth)]);
            }
            args.push(manifest_url.to_string());
            if !config.title.is_empty() {
                args.extend(["-window_title".to_string(), config.title.clone()]);
            }
        } else {
            // Generic player - just pass URL
            args.push(manifest_url.to_string());
        }
        args
    }

    /// Wait for the running player to exit
    pub fn wait(&mut self) -> Result<Option<ExitStatus>> {
        match self.child.take() {
            Some(mut child) => Ok(Some(child.wait()?)),
            None => Ok(None),
        }
    }
}

impl PlaybackEngine for ExternalPlayer {
    fn configure(&mut self, config: &PlaybackConfig) -> Result<()> {
        if !config.drm.is_empty() {
            warn!(
                player = %self.command,
                "external players receive no DRM configuration, protected streams may not play"
            );
        }
        self.config = config.clone();
        Ok(())
    }

    fn load(&mut self, manifest_url: &str) -> Result<()> {
        let args = self.build_args(manifest_url);
        info!(player = %self.command, title = %self.config.title, "launching player");
        debug!(?args, "player arguments");

        let mut cmd = Command::new(&self.command);
        cmd.args(&args);
        if let Some(ua) = self.config.header("User-Agent") {
            // Set user agent environment variable for some players
            cmd.env("USER_AGENT", ua);
        }
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| Error::PlayerLaunch {
            player: self.command.clone(),
            source,
        })?;
        info!(pid = child.id(), "player launched");

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    if !line.trim().is_empty() {
                        debug!(target: "gravity::player::output", "{}", line);
                    }
                }
            });
        }

        self.child = Some(child);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait(); // Reap the process
            debug!("stopped previous player");
        }
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.destroy();
    }
}
