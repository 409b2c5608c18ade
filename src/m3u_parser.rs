//! M3U playlist parser with HTTPS download support
//!
//! Understands the subset of M3U written by the generator: `#EXTINF`
//! entries with `tvg-name`, `tvg-logo` and `group-title` attributes, plus
//! `#KODIPROP` lines carrying inputstream.adaptive DRM settings.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::models::{new_id, Channel, DrmScheme};

pub(crate) const EXTINF: &str = "#EXTINF:";
pub(crate) const KODIPROP: &str = "#KODIPROP:";
pub(crate) const LICENSE_TYPE: &str = "inputstream.adaptive.license_type";
pub(crate) const LICENSE_KEY: &str = "inputstream.adaptive.license_key";
pub(crate) const LICENSE_TYPE_CLEARKEY: &str = "clearkey";
pub(crate) const LICENSE_TYPE_WIDEVINE: &str = "com.widevine.alpha";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Scanner state carried from one line to the next
#[derive(Debug)]
enum ParseState {
    Idle,
    /// An `#EXTINF` has been seen, waiting for its URL line
    Accumulating(Channel),
}

/// Parse M3U content and extract channels
///
/// Entries are returned in source order. An `#EXTINF` that is never
/// followed by a URL is dropped, as is a URL with no `#EXTINF` before it.
/// This never fails: malformed input just yields fewer channels.
pub fn parse_m3u(content: &str) -> Vec<Channel> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let (state, channels) = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .fold((ParseState::Idle, Vec::new()), |(state, mut channels), line| {
            let next = step(state, line, &mut channels);
            (next, channels)
        });

    if let ParseState::Accumulating(channel) = state {
        trace!(name = %channel.name, "dropping trailing entry without URL");
    }
    debug!(count = channels.len(), "parsed M3U playlist");

    channels
}

fn step(state: ParseState, line: &str, channels: &mut Vec<Channel>) -> ParseState {
    if line.starts_with(EXTINF) {
        if let ParseState::Accumulating(dangling) = state {
            trace!(name = %dangling.name, "dropping entry without URL");
        }
        return ParseState::Accumulating(parse_extinf(line));
    }

    if let Some(prop) = line.strip_prefix(KODIPROP) {
        return match state {
            ParseState::Accumulating(mut channel) => {
                apply_kodiprop(&mut channel, prop.trim());
                ParseState::Accumulating(channel)
            }
            ParseState::Idle => ParseState::Idle,
        };
    }

    if line.starts_with('#') {
        return state;
    }

    // URL line
    match state {
        ParseState::Accumulating(mut channel) => {
            channel.manifest_url = line.to_string();
            channel.id = new_id();
            channels.push(channel);
        }
        ParseState::Idle => trace!(url = line, "ignoring URL without #EXTINF"),
    }
    ParseState::Idle
}

/// Build a channel from an `#EXTINF` line
fn parse_extinf(line: &str) -> Channel {
    let mut channel = Channel::parsed();

    // Channel name (after the last comma)
    if let Some(comma_pos) = line.rfind(',') {
        channel.name = line[comma_pos + 1..].trim().to_string();
    }

    if let Some(name) = extract_attr(line, "tvg-name") {
        channel.name = name.to_string();
    }
    if let Some(logo) = extract_attr(line, "tvg-logo") {
        channel.logo = logo.to_string();
    }
    if let Some(group) = extract_attr(line, "group-title") {
        channel.group = group.to_string();
    }

    channel
}

/// Extract a double-quoted attribute value anywhere in the line
///
/// The first `name="` wins. Embedded quotes are not escaped.
fn extract_attr<'a>(line: &'a str, attr_name: &str) -> Option<&'a str> {
    let search = format!("{}=\"", attr_name);
    let start = line.find(&search)? + search.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

/// Apply a `#KODIPROP:key=value` property to the in-progress channel
fn apply_kodiprop(channel: &mut Channel, prop: &str) {
    let Some((key, value)) = prop.split_once('=') else {
        return;
    };

    match key {
        LICENSE_TYPE => match value {
            LICENSE_TYPE_CLEARKEY => channel.drm_scheme = DrmScheme::ClearKey,
            LICENSE_TYPE_WIDEVINE => channel.drm_scheme = DrmScheme::Widevine,
            other => trace!(license_type = other, "unsupported license type"),
        },
        // Stored verbatim whatever the scheme, Widevine license URLs included
        LICENSE_KEY => channel.clear_keys = value.to_string(),
        _ => {}
    }
}

/// Parse raw playlist bytes, gunzipping them first if needed
///
/// Every member of a multi-member gzip stream is decoded.
pub fn parse_m3u_bytes(bytes: &[u8]) -> Result<Vec<Channel>> {
    let content = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        MultiGzDecoder::new(bytes).read_to_end(&mut decoded)?;
        debug!(compressed = bytes.len(), decoded = decoded.len(), "decompressed playlist");
        String::from_utf8_lossy(&decoded).into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    Ok(parse_m3u(&content))
}

/// Read and parse a playlist file (`.m3u`, `.m3u8` or gzipped)
pub fn parse_m3u_file(path: impl AsRef<Path>) -> Result<Vec<Channel>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading playlist file");
    let bytes = std::fs::read(path)?;
    parse_m3u_bytes(&bytes)
}

/// Download and parse M3U from URL (supports HTTP and HTTPS)
pub fn download_and_parse(url: &str, user_agent: &str) -> Result<Vec<Channel>> {
    let agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(120)))
        .timeout_connect(Some(Duration::from_secs(30)))
        .build()
        .new_agent();

    debug!(url, "downloading playlist");
    let mut response = agent.get(url).header("User-Agent", user_agent).call()?;

    if response.status() != 200 {
        return Err(Error::HttpStatus(response.status().as_u16()));
    }

    let bytes = response.body_mut().read_to_vec()?;
    parse_m3u_bytes(&bytes)
}

#[cfg(test)]
#[path = "m3u_parser_tests.rs"]
mod tests;
