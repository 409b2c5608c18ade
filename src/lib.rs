//! Gravity: network stream channel manager
//!
//! Keeps a library of DASH/HLS channels (optionally DRM protected) and
//! moves them in and out of M3U playlists.

pub mod config;
pub mod error;
pub mod library;
pub mod m3u_generator;
pub mod m3u_parser;
pub mod models;
pub mod player;

pub use error::{Error, Result};
pub use library::Library;
pub use m3u_generator::generate_m3u;
pub use m3u_parser::parse_m3u;
pub use models::{Channel, DrmScheme};
