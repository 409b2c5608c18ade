//! Gravity command line: manage the channel library and its M3U playlists

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use bpaf::Bpaf;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use gravity::config::{CollapsedGroups, GridSize, JsonFileStore, Preferences, SortMode, ViewMode};
use gravity::m3u_generator::{generate_m3u, write_m3u, DEFAULT_EXPORT_FILENAME};
use gravity::m3u_parser::{download_and_parse, parse_m3u_file};
use gravity::models::{Channel, DrmScheme};
use gravity::player::{play, ExternalPlayer};
use gravity::Library;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

#[derive(Bpaf, Clone, Debug)]
#[bpaf(options, version)]
struct Options {
    /// Perform verbose logging
    #[bpaf(short, long)]
    verbose: bool,

    /// Storage file to use instead of the one in the config directory
    #[bpaf(long, argument("FILE"))]
    store: Option<PathBuf>,

    #[bpaf(external(command))]
    command: Command,
}

/// Editable channel fields
#[derive(Bpaf, Clone, Debug)]
struct ChannelFields {
    /// Display name
    #[bpaf(long, argument("NAME"))]
    name: Option<String>,
    /// DASH/HLS manifest URL
    #[bpaf(long("url"), argument("URL"))]
    manifest_url: Option<String>,
    /// Group the channel is listed under
    #[bpaf(long, argument("GROUP"))]
    group: Option<String>,
    /// Logo URL
    #[bpaf(long, argument("URL"))]
    logo: Option<String>,
    /// DRM scheme: none, clearkey, widevine or playready
    #[bpaf(long("drm"), argument("SCHEME"))]
    drm_scheme: Option<DrmScheme>,
    /// ClearKey pairs as kid:key[,kid:key...]
    #[bpaf(long("keys"), argument("KEYS"))]
    clear_keys: Option<String>,
    /// Widevine or PlayReady license server
    #[bpaf(long("license"), argument("URL"))]
    license_url: Option<String>,
    /// User-Agent header override
    #[bpaf(long, argument("AGENT"))]
    user_agent: Option<String>,
    /// Referer header override
    #[bpaf(long, argument("URL"))]
    referrer: Option<String>,
    /// Authorization header override
    #[bpaf(long, argument("VALUE"))]
    authorization: Option<String>,
}

impl ChannelFields {
    fn apply(self, channel: &mut Channel) {
        let fields = [
            (self.name, &mut channel.name),
            (self.manifest_url, &mut channel.manifest_url),
            (self.group, &mut channel.group),
            (self.logo, &mut channel.logo),
            (self.clear_keys, &mut channel.clear_keys),
            (self.license_url, &mut channel.license_url),
            (self.user_agent, &mut channel.user_agent),
            (self.referrer, &mut channel.referrer),
            (self.authorization, &mut channel.authorization),
        ];
        for (value, field) in fields {
            if let Some(value) = value {
                *field = value.trim().to_string();
            }
        }
        if let Some(scheme) = self.drm_scheme {
            channel.drm_scheme = scheme;
        }
    }
}

#[derive(Bpaf, Clone, Debug)]
enum Command {
    /// Import channels from an M3U file or http(s) URL
    #[bpaf(command)]
    Import {
        /// User-Agent sent when downloading
        #[bpaf(long, argument("AGENT"), fallback(DEFAULT_USER_AGENT.to_string()))]
        user_agent: String,
        /// Playlist path or URL
        #[bpaf(positional("SOURCE"))]
        source: String,
    },

    /// Export the library as an M3U playlist
    #[bpaf(command)]
    Export {
        /// Output file, `-` for stdout
        #[bpaf(short, long, argument("FILE"), fallback(PathBuf::from(DEFAULT_EXPORT_FILENAME)))]
        output: PathBuf,
    },

    /// List channels by group
    #[bpaf(command)]
    List {
        /// Only show groups or channels matching this text
        #[bpaf(short, long, argument("QUERY"))]
        search: Option<String>,
    },

    /// Add a channel
    #[bpaf(command)]
    Add {
        #[bpaf(external(channel_fields))]
        fields: ChannelFields,
    },

    /// Edit a channel, replacing the given fields
    #[bpaf(command)]
    Edit {
        #[bpaf(external(channel_fields))]
        fields: ChannelFields,
        /// Channel id
        #[bpaf(positional("ID"))]
        id: String,
    },

    /// Delete a channel
    #[bpaf(command)]
    Remove {
        /// Channel id
        #[bpaf(positional("ID"))]
        id: String,
    },

    /// Delete every channel
    #[bpaf(command)]
    Clear,

    /// Play a channel with an external player
    #[bpaf(command)]
    Play {
        /// Player program
        #[bpaf(long, argument("CMD"), fallback("mpv".to_string()))]
        player: String,
        /// Channel id
        #[bpaf(positional("ID"))]
        id: String,
    },

    /// Show or change display preferences
    #[bpaf(command)]
    Prefs {
        /// Group order: alphabetical or default
        #[bpaf(long, argument("MODE"))]
        sort: Option<SortMode>,
        /// grid or list
        #[bpaf(long, argument("MODE"))]
        view: Option<ViewMode>,
        /// small, medium or large
        #[bpaf(long, argument("SIZE"))]
        grid: Option<GridSize>,
    },

    /// Collapse or expand a group in listings
    #[bpaf(command)]
    Toggle {
        /// Group name
        #[bpaf(positional("GROUP"))]
        group: String,
    },

    /// Collapse every group, or expand them all if they are all collapsed
    #[bpaf(command("toggle-all"))]
    ToggleAll,
}

fn main() -> anyhow::Result<()> {
    let options = options().run();

    let env_filter = EnvFilter::builder()
        .with_default_directive(
            match options.verbose {
                true => LevelFilter::TRACE,
                _ => LevelFilter::INFO,
            }
            .into(),
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let store_path = options.store.unwrap_or_else(JsonFileStore::default_path);
    let mut store = JsonFileStore::open(&store_path);
    let mut library = Library::load(&store);
    let mut prefs = Preferences::load(&store);

    match options.command {
        Command::Import { user_agent, source } => {
            let channels = if source.starts_with("http://") || source.starts_with("https://") {
                download_and_parse(&source, &user_agent)
            } else {
                parse_m3u_file(&source)
            }
            .with_context(|| format!("failed to read playlist {}", source))?;

            let count = library.import_channels(channels);
            if count == 0 {
                println!("No channels found in {}", source);
                return Ok(());
            }
            library.save(&mut store)?;
            println!("Imported {} channels", count);
        }

        Command::Export { output } => {
            let channels = library.export_order(prefs.sort_mode);
            if output.as_os_str() == "-" {
                std::io::stdout().write_all(generate_m3u(&channels).as_bytes())?;
            } else {
                write_m3u(&output, &channels)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                println!("Exported {} channels to {}", channels.len(), output.display());
            }
        }

        Command::List { search } => {
            let collapsed = CollapsedGroups::load(&store);
            let query = search.unwrap_or_default();
            let groups = library.search(&query, prefs.sort_mode);

            if groups.is_empty() {
                if library.is_empty() {
                    println!("Library is empty");
                } else {
                    println!("No results for '{}'", query);
                }
                return Ok(());
            }

            let shown: usize = groups.iter().map(|g| g.channels.len()).sum();
            for group in &groups {
                let is_collapsed = collapsed.is_collapsed(group.name) && query.trim().is_empty();
                println!(
                    "{} {} ({})",
                    if is_collapsed { "+" } else { "-" },
                    group.name,
                    group.channels.len()
                );
                if is_collapsed {
                    continue;
                }
                for channel in &group.channels {
                    let drm = if channel.drm_scheme.is_none() {
                        String::new()
                    } else {
                        format!(" [{}]", channel.drm_scheme)
                    };
                    println!("    {}  {}{}", channel.id, channel.name, drm);
                    println!("        {}", channel.manifest_url);
                    if let Some(added) = channel.added_at.and_then(format_added) {
                        println!("        added {}", added);
                    }
                }
            }
            if query.trim().is_empty() {
                println!("{} streams in {} groups", library.len(), groups.len());
            } else {
                println!("{} results", shown);
            }
        }

        Command::Add { fields } => {
            let mut channel = Channel::default();
            fields.apply(&mut channel);
            validate(&channel)?;
            let id = library.add(channel);
            library.save(&mut store)?;
            println!("{}", id);
        }

        Command::Edit { fields, id } => {
            let Some(existing) = library.get(&id) else {
                bail!("no channel with id {}", id);
            };
            let mut channel = existing.clone();
            fields.apply(&mut channel);
            validate(&channel)?;
            library.update(&id, channel)?;
            library.save(&mut store)?;
            println!("Updated {}", id);
        }

        Command::Remove { id } => {
            let removed = library.remove(&id)?;
            library.save(&mut store)?;
            println!("Deleted \"{}\"", removed.name);
        }

        Command::Clear => {
            let count = library.len();
            library.clear();
            library.save(&mut store)?;
            println!("Deleted all {} streams", count);
        }

        Command::Play { player, id } => {
            let Some(channel) = library.get(&id) else {
                bail!("no channel with id {}", id);
            };
            let mut player = ExternalPlayer::new(player);
            play(&mut player, channel)?;
            if let Some(status) = player.wait()? {
                info!(%status, "player exited");
            }
        }

        Command::Prefs { sort, view, grid } => {
            let changed = sort.is_some() || view.is_some() || grid.is_some();
            if let Some(sort) = sort {
                prefs.sort_mode = sort;
            }
            if let Some(view) = view {
                prefs.view_mode = view;
            }
            if let Some(grid) = grid {
                prefs.grid_size = grid;
            }
            if changed {
                prefs.save(&mut store)?;
            }
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }

        Command::Toggle { group } => {
            let mut collapsed = CollapsedGroups::load(&store);
            collapsed.toggle(&group);
            collapsed.save(&mut store)?;
            let state = if collapsed.is_collapsed(&group) { "collapsed" } else { "expanded" };
            println!("{} {}", group, state);
        }

        Command::ToggleAll => {
            let mut collapsed = CollapsedGroups::load(&store);
            let groups = library.grouped(prefs.sort_mode);
            let names = groups.iter().map(|g| g.name);
            if collapsed.all_collapsed(names.clone()) {
                collapsed.expand_all();
                println!("Expanded all groups");
            } else {
                collapsed.collapse_all(names);
                println!("Collapsed {} groups", groups.len());
            }
            collapsed.save(&mut store)?;
        }
    }

    Ok(())
}

/// Checks done by the form before a channel is saved
fn validate(channel: &Channel) -> anyhow::Result<()> {
    if channel.name.is_empty() {
        bail!("a channel needs a name");
    }
    if channel.manifest_url.is_empty() {
        bail!("a channel needs a manifest URL (--url)");
    }
    Ok(())
}

/// Format a millisecond timestamp as local datetime YYYY-MM-DD HH:MM
fn format_added(ms: i64) -> Option<String> {
    use chrono::{Local, TimeZone};

    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
}
