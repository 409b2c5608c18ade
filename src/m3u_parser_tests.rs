//! Tests for M3U and M3U8 playlist parsing

#[cfg(test)]
mod tests {
    use crate::m3u_generator::generate_m3u;
    use crate::m3u_parser::*;
    use crate::models::{Channel, DrmScheme};

    #[test]
    fn test_parse_m3u() {
        let content = r#"
#EXTM3U
#EXTINF:-1 tvg-id="cnn" group-title="News",CNN
http://example.com/live/cnn.mpd
#EXTINF:-1 tvg-id="bbc" group-title="News",BBC
http://example.com/live/bbc.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "CNN");
        assert_eq!(channels[0].group, "News");
        assert_eq!(channels[1].name, "BBC");
        assert_eq!(channels[1].manifest_url, "http://example.com/live/bbc.mpd");
    }

    #[test]
    fn test_scenario_basic_entry() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-name="BBC One" tvg-logo="http://x/logo.png" group-title="UK",BBC One
http://example.com/bbc.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        let ch = &channels[0];
        assert_eq!(ch.name, "BBC One");
        assert_eq!(ch.logo, "http://x/logo.png");
        assert_eq!(ch.group, "UK");
        assert_eq!(ch.manifest_url, "http://example.com/bbc.mpd");
        assert_eq!(ch.drm_scheme, DrmScheme::None);
        assert!(!ch.id.is_empty());
        assert_eq!(ch.added_at, None);
    }

    #[test]
    fn test_scenario_clearkey_kodiprop() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-name="Sport" group-title="Sports",Sport
#KODIPROP:inputstream.adaptive.license_type=clearkey
#KODIPROP:inputstream.adaptive.license_key=11223344:aabbccdd
https://example.com/sport/manifest.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].drm_scheme, DrmScheme::ClearKey);
        assert_eq!(channels[0].clear_keys, "11223344:aabbccdd");
        assert_eq!(channels[0].license_url, "");
    }

    #[test]
    fn test_defaults_without_attributes() {
        let content = "#EXTINF:-1\nhttp://example.com/a.m3u8\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Unknown Stream");
        assert_eq!(channels[0].group, "General");
        assert_eq!(channels[0].logo, "");
    }

    #[test]
    fn test_tvg_name_overrides_comma_name() {
        let content = r#"#EXTINF:-1 tvg-name="X",Something Else
http://example.com/x.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].name, "X");
    }

    #[test]
    fn test_name_after_last_comma() {
        let content = "#EXTINF:-1 group-title=\"A,B\",  Final Name  \nhttp://example.com/x.mpd\n";
        let channels = parse_m3u(content);
        assert_eq!(channels[0].name, "Final Name");
        assert_eq!(channels[0].group, "A,B");
    }

    #[test]
    fn test_attribute_order_irrelevant() {
        let content = r#"#EXTINF:-1 group-title="Movies" tvg-logo="http://x/l.png" tvg-name="Film",Film HD
http://example.com/film.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].name, "Film");
        assert_eq!(channels[0].logo, "http://x/l.png");
        assert_eq!(channels[0].group, "Movies");
    }

    #[test]
    fn test_first_attribute_occurrence_wins() {
        let content = r#"#EXTINF:-1 group-title="First" group-title="Second",Name
http://example.com/x.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].group, "First");
    }

    #[test]
    fn test_empty_quoted_attribute() {
        let content = r#"#EXTINF:-1 tvg-name="" group-title="",Fallback
http://example.com/x.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].name, "");
        assert_eq!(channels[0].group, "");
    }

    #[test]
    fn test_dangling_extinf_dropped() {
        let content = r#"#EXTM3U
#EXTINF:-1,Dangling
#EXTINF:-1,Kept
http://example.com/kept.mpd
#EXTINF:-1,Trailing
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Kept");
    }

    #[test]
    fn test_orphan_url_dropped() {
        let content = r#"#EXTM3U
http://example.com/orphan.mpd
#EXTINF:-1,One
http://example.com/one.mpd
http://example.com/orphan2.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].manifest_url, "http://example.com/one.mpd");
        assert!(channels
            .iter()
            .all(|c| !c.manifest_url.contains("orphan")));
    }

    #[test]
    fn test_order_preserved() {
        let mut content = String::from("#EXTM3U\n");
        for i in 0..25 {
            content.push_str(&format!("#EXTINF:-1,Channel {}\nhttp://example.com/{}.mpd\n", i, i));
        }
        let channels = parse_m3u(&content);
        assert_eq!(channels.len(), 25);
        for (i, ch) in channels.iter().enumerate() {
            assert_eq!(ch.name, format!("Channel {}", i));
        }
    }

    #[test]
    fn test_ids_unique() {
        let content = "#EXTINF:-1,A\nhttp://a\n#EXTINF:-1,B\nhttp://b\n";
        let channels = parse_m3u(content);
        assert_ne!(channels[0].id, channels[1].id);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_m3u("").is_empty());
        assert!(parse_m3u("#EXTM3U\n").is_empty());
        assert!(parse_m3u("\n\n   \n").is_empty());
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let content = "#EXTM3U\r\n\r\n#EXTINF:-1 group-title=\"UK\",BBC\r\n\r\n  http://example.com/bbc.mpd  \r\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "BBC");
        assert_eq!(channels[0].manifest_url, "http://example.com/bbc.mpd");
    }

    #[test]
    fn test_kodiprop_without_entry_ignored() {
        let content = r#"#EXTM3U
#KODIPROP:inputstream.adaptive.license_type=clearkey
#EXTINF:-1,Plain
http://example.com/plain.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].drm_scheme, DrmScheme::None);
    }

    #[test]
    fn test_kodiprop_without_equals_ignored() {
        let content = r#"#EXTINF:-1,A
#KODIPROP:inputstream.adaptive.license_type
http://example.com/a.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].drm_scheme, DrmScheme::None);
    }

    #[test]
    fn test_unknown_kodiprop_and_license_type() {
        let content = r#"#EXTINF:-1,A
#KODIPROP:inputstream.adaptive.manifest_type=mpd
#KODIPROP:inputstream.adaptive.license_type=com.microsoft.playready
#KODIPROP:inputstream.adaptive.license_type=ClearKey
http://example.com/a.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].drm_scheme, DrmScheme::None);
        assert_eq!(channels[0].clear_keys, "");
    }

    #[test]
    fn test_license_key_value_keeps_equals() {
        let content = r#"#EXTINF:-1,A
#KODIPROP:inputstream.adaptive.license_type=com.widevine.alpha
#KODIPROP:inputstream.adaptive.license_key=https://lic.example.com/?token=abc=
http://example.com/a.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels[0].drm_scheme, DrmScheme::Widevine);
        assert_eq!(channels[0].clear_keys, "https://lic.example.com/?token=abc=");
        assert_eq!(channels[0].license_url, "");
    }

    #[test]
    fn test_comments_and_other_directives_ignored() {
        let content = r#"#EXTM3U x-tvg-url="http://example.com/epg.xml"
# a comment
#EXTVLCOPT:http-user-agent=Foo
#EXTINF:-1,A
#EXTGRP:Ignored
http://example.com/a.mpd
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].group, "General");
    }

    #[test]
    fn test_clearkey_round_trip() {
        let channel = Channel {
            name: "Keys".to_string(),
            group: "Secure".to_string(),
            logo: "http://x/k.png".to_string(),
            manifest_url: "http://example.com/k.mpd".to_string(),
            drm_scheme: DrmScheme::ClearKey,
            clear_keys: "abc:123".to_string(),
            ..Channel::default()
        };
        let parsed = parse_m3u(&generate_m3u(&[channel.clone()]));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, channel.name);
        assert_eq!(parsed[0].group, channel.group);
        assert_eq!(parsed[0].logo, channel.logo);
        assert_eq!(parsed[0].manifest_url, channel.manifest_url);
        assert_eq!(parsed[0].drm_scheme, DrmScheme::ClearKey);
        assert_eq!(parsed[0].clear_keys, "abc:123");
    }

    #[test]
    fn test_widevine_round_trip_moves_license_url() {
        // The license URL comes back in clear_keys, not license_url
        let channel = Channel {
            name: "WV".to_string(),
            manifest_url: "http://example.com/wv.mpd".to_string(),
            drm_scheme: DrmScheme::Widevine,
            license_url: "https://lic".to_string(),
            ..Channel::default()
        };
        let parsed = parse_m3u(&generate_m3u(&[channel]));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].drm_scheme, DrmScheme::Widevine);
        assert_eq!(parsed[0].clear_keys, "https://lic");
        assert_eq!(parsed[0].license_url, "");
    }

    #[test]
    fn test_playready_does_not_round_trip() {
        let channel = Channel {
            name: "PR".to_string(),
            manifest_url: "http://example.com/pr.mpd".to_string(),
            drm_scheme: DrmScheme::PlayReady,
            license_url: "https://pr.lic".to_string(),
            ..Channel::default()
        };
        let parsed = parse_m3u(&generate_m3u(&[channel]));
        assert_eq!(parsed[0].drm_scheme, DrmScheme::None);
        assert_eq!(parsed[0].license_url, "");
    }

    #[test]
    fn test_missing_url_entry_not_reparsed() {
        let channel = Channel {
            name: "No URL".to_string(),
            ..Channel::default()
        };
        let parsed = parse_m3u(&generate_m3u(&[channel]));
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_bytes_plain_and_bom() {
        let bytes = "\u{feff}#EXTINF:-1,A\nhttp://example.com/a.mpd\n".as_bytes();
        let channels = parse_m3u_bytes(bytes).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "A");
    }

    #[test]
    fn test_parse_bytes_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let content = "#EXTM3U\n#EXTINF:-1 group-title=\"Z\",Zipped\nhttp://example.com/z.mpd\n";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let channels = parse_m3u_bytes(&compressed).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Zipped");
        assert_eq!(channels[0].group, "Z");
    }

    #[test]
    fn test_parse_bytes_multi_member_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let parts = [
            "#EXTM3U\n#EXTINF:-1,First\nhttp://example.com/1.mpd\n",
            "#EXTINF:-1,Second\nhttp://example.com/2.mpd\n",
        ];
        let mut compressed = Vec::new();
        for part in parts {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part.as_bytes()).unwrap();
            compressed.extend(encoder.finish().unwrap());
        }

        let channels = parse_m3u_bytes(&compressed).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "First");
        assert_eq!(channels[1].name, "Second");
    }

    #[test]
    fn test_parse_file() {
        let path = std::env::temp_dir().join(format!("gravity_parse_{}.m3u", std::process::id()));
        std::fs::write(&path, "#EXTM3U\n#EXTINF:-1,File\nhttp://example.com/f.mpd\n").unwrap();
        let channels = parse_m3u_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "File");
    }

    #[test]
    fn test_parse_missing_file_errors() {
        assert!(parse_m3u_file("/nonexistent/gravity/playlist.m3u").is_err());
    }
}
