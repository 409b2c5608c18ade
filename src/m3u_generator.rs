//! M3U playlist generation

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::m3u_parser::{
    EXTINF, KODIPROP, LICENSE_KEY, LICENSE_TYPE, LICENSE_TYPE_CLEARKEY, LICENSE_TYPE_WIDEVINE,
};
use crate::models::{Channel, DrmScheme, UNKNOWN_STREAM};

/// File name offered when exporting the library
pub const DEFAULT_EXPORT_FILENAME: &str = "gravity_playlist.m3u";
/// Content type of exported playlists
pub const M3U_CONTENT_TYPE: &str = "audio/x-mpegurl";

/// Generate M3U playlist content from channels, in the order given
///
/// Attribute values are written without escaping, so a `"` inside a name,
/// logo or group produces a line the parser cannot read back.
///
/// Only ClearKey and Widevine get `#KODIPROP` lines. PlayReady settings are
/// not representable here and are left out.
pub fn generate_m3u(channels: &[Channel]) -> String {
    let mut content = String::from("#EXTM3U\n");

    for channel in channels {
        write_entry(&mut content, channel);
    }

    content
}

fn write_entry(content: &mut String, channel: &Channel) {
    // Writing into a String cannot fail
    let _ = write!(content, "{}-1 tvg-name=\"{}\"", EXTINF, channel.name);
    if !channel.logo.is_empty() {
        let _ = write!(content, " tvg-logo=\"{}\"", channel.logo);
    }
    if !channel.group.is_empty() {
        let _ = write!(content, " group-title=\"{}\"", channel.group);
    }
    let display_name = if channel.name.is_empty() {
        UNKNOWN_STREAM
    } else {
        &channel.name
    };
    let _ = writeln!(content, ",{}", display_name);

    let (license_type, license_key) = match channel.drm_scheme {
        DrmScheme::ClearKey => (LICENSE_TYPE_CLEARKEY, channel.clear_keys.as_str()),
        DrmScheme::Widevine => (LICENSE_TYPE_WIDEVINE, channel.license_url.as_str()),
        DrmScheme::PlayReady | DrmScheme::None => ("", ""),
    };
    if !license_type.is_empty() {
        let _ = writeln!(content, "{}{}={}", KODIPROP, LICENSE_TYPE, license_type);
        if !license_key.is_empty() {
            let _ = writeln!(content, "{}{}={}", KODIPROP, LICENSE_KEY, license_key);
        }
    }

    if !channel.manifest_url.is_empty() {
        content.push_str(&channel.manifest_url);
        content.push('\n');
    }
}

/// Write a playlist for the channels to a file
pub fn write_m3u(path: impl AsRef<Path>, channels: &[Channel]) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, generate_m3u(channels))?;
    debug!(path = %path.display(), count = channels.len(), "wrote M3U playlist");
    Ok(())
}
