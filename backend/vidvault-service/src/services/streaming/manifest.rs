/// HLS manifest rewriting and object key handling for the streaming gateway
///
/// Transcoded playlists reference renditions, segments, keys and subtitle
/// tracks relative to their own location in storage. Before a playlist leaves
/// the gateway every such reference is resolved to a full object key and
/// replaced with the gateway's stream URL for that key, so the player never
/// talks to storage directly.
use tracing::debug;

const URI_ATTRIBUTE: &str = "URI=\"";

/// Whether the object is a playlist that must be rewritten
pub fn is_playlist(key: &str) -> bool {
    key.rsplit('.')
        .next()
        .map(|ext| ext.eq_ignore_ascii_case("m3u8"))
        .unwrap_or(false)
}

/// MIME type served for an object, from its extension
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "m3u8" => "application/vnd.apple.mpegurl",
        "ts" => "video/mp2t",
        "m4s" => "video/iso.segment",
        "mp4" | "m4v" => "video/mp4",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "vtt" | "webvtt" => "text/vtt",
        "mpd" => "application/dash+xml",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Collapse `.` and `..` segments. `None` if the path climbs above its root.
pub fn normalize_key(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Resolve a key requested through the gateway, accepting it only when it
/// stays under the video's output prefix
pub fn resolve_requested_key(output_prefix: &str, requested: &str) -> Option<String> {
    let key = normalize_key(requested)?;
    if key.starts_with(output_prefix) && key.len() > output_prefix.len() {
        Some(key)
    } else {
        None
    }
}

fn is_absolute_uri(uri: &str) -> bool {
    url::Url::parse(uri).is_ok()
}

/// Directory portion of a key, including the trailing slash
fn directory_of(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..=idx],
        None => "",
    }
}

/// Rewrites one playlist's references to gateway URLs
pub struct ManifestRewriter<'a> {
    /// Directory of the playlist being rewritten
    base_dir: &'a str,
    /// e.g. `https://api.example.com/videos/{id}/stream`
    gateway_base: &'a str,
}

impl<'a> ManifestRewriter<'a> {
    pub fn new(manifest_key: &'a str, gateway_base: &'a str) -> Self {
        Self {
            base_dir: directory_of(manifest_key),
            gateway_base: gateway_base.trim_end_matches('/'),
        }
    }

    /// Gateway URL for a reference found in the playlist. Absolute URIs and
    /// references that cannot be resolved are returned unchanged.
    pub fn rewrite_uri(&self, uri: &str) -> String {
        if uri.is_empty() || is_absolute_uri(uri) {
            return uri.to_string();
        }

        let path = uri.split(|c: char| c == '?' || c == '#').next().unwrap_or(uri);
        let joined = if let Some(rooted) = path.strip_prefix('/') {
            rooted.to_string()
        } else {
            format!("{}{}", self.base_dir, path)
        };

        match normalize_key(&joined) {
            Some(key) => format!("{}/{}", self.gateway_base, key),
            None => {
                debug!(uri, "playlist reference escapes storage root; left as is");
                uri.to_string()
            }
        }
    }

    /// Rewrite every `URI="..."` attribute inside a tag line
    fn rewrite_tag(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;

        while let Some(start) = rest.find(URI_ATTRIBUTE) {
            let value_start = start + URI_ATTRIBUTE.len();
            out.push_str(&rest[..value_start]);
            let after = &rest[value_start..];
            match after.find('"') {
                Some(end) => {
                    out.push_str(&self.rewrite_uri(&after[..end]));
                    out.push('"');
                    rest = &after[end + 1..];
                }
                None => {
                    rest = after;
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Rewrite a whole playlist, preserving line structure
    pub fn rewrite(&self, playlist: &str) -> String {
        let mut out = String::with_capacity(playlist.len() + 256);
        for line in playlist.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                out.push_str(line);
            } else if trimmed.starts_with('#') {
                if trimmed.contains(URI_ATTRIBUTE) {
                    out.push_str(&self.rewrite_tag(line));
                } else {
                    out.push_str(line);
                }
            } else {
                out.push_str(&self.rewrite_uri(trimmed));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATEWAY: &str = "https://api.example.com/videos/v1/stream";

    #[test]
    fn master_playlist_variants_point_at_gateway() {
        let master = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1280x720\n\
720p/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=854x480\n\
480p/index.m3u8\n";

        let rewritten =
            ManifestRewriter::new("users/u/videos/v1/hls/master.m3u8", GATEWAY).rewrite(master);

        assert!(rewritten.contains(
            "\nhttps://api.example.com/videos/v1/stream/users/u/videos/v1/hls/720p/index.m3u8\n"
        ));
        assert!(rewritten.contains("/users/u/videos/v1/hls/480p/index.m3u8\n"));
        assert!(rewritten.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(rewritten.contains("#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1280x720\n"));
    }

    #[test]
    fn media_playlist_segments_and_parent_references_resolve() {
        let media = "#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXTINF:10.0,\n\
segment000.ts\n\
#EXTINF:10.0,\n\
../shared/segment001.ts?v=2\n\
#EXT-X-ENDLIST\n";

        let rewritten =
            ManifestRewriter::new("users/u/videos/v1/hls/720p/index.m3u8", GATEWAY).rewrite(media);

        assert!(rewritten.contains(&format!(
            "{}/users/u/videos/v1/hls/720p/segment000.ts\n",
            GATEWAY
        )));
        assert!(rewritten.contains(&format!(
            "{}/users/u/videos/v1/hls/shared/segment001.ts\n",
            GATEWAY
        )));
        assert!(rewritten.ends_with("#EXT-X-ENDLIST\n"));
    }

    #[test]
    fn uri_attributes_are_rewritten() {
        let playlist = "#EXTM3U\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"keys/k1.key\",IV=0x1\n\
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"English\",URI=\"subs/en.m3u8\"\n\
#EXT-X-MAP:URI=\"init.mp4\"\n";

        let rewritten = ManifestRewriter::new("p/hls/master.m3u8", GATEWAY).rewrite(playlist);

        assert!(rewritten.contains(&format!(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"{}/p/hls/keys/k1.key\",IV=0x1\n",
            GATEWAY
        )));
        assert!(rewritten.contains(&format!(
            "NAME=\"English\",URI=\"{}/p/hls/subs/en.m3u8\"\n",
            GATEWAY
        )));
        assert!(rewritten.contains(&format!("#EXT-X-MAP:URI=\"{}/p/hls/init.mp4\"\n", GATEWAY)));
    }

    #[test]
    fn absolute_uris_are_left_alone() {
        let rewriter = ManifestRewriter::new("p/hls/master.m3u8", GATEWAY);
        assert_eq!(
            rewriter.rewrite_uri("https://cdn.example.com/ad.ts"),
            "https://cdn.example.com/ad.ts"
        );
        assert_eq!(
            rewriter.rewrite_uri("skd://key-server/1"),
            "skd://key-server/1"
        );
    }

    #[test]
    fn traversal_above_root_is_not_resolved() {
        let rewriter = ManifestRewriter::new("p/master.m3u8", GATEWAY);
        assert_eq!(rewriter.rewrite_uri("../../etc/passwd"), "../../etc/passwd");
    }

    #[test]
    fn requested_keys_must_stay_under_prefix() {
        let prefix = "users/u/videos/v1/hls/";
        assert_eq!(
            resolve_requested_key(prefix, "users/u/videos/v1/hls/720p/segment000.ts").as_deref(),
            Some("users/u/videos/v1/hls/720p/segment000.ts")
        );
        assert_eq!(
            resolve_requested_key(prefix, "users/u/videos/v1/hls/../original/video.mp4"),
            None
        );
        assert_eq!(
            resolve_requested_key(prefix, "users/u/videos/v2/hls/master.m3u8"),
            None
        );
        assert_eq!(resolve_requested_key(prefix, "users/u/videos/v1/hls/"), None);
        assert_eq!(resolve_requested_key(prefix, "../../"), None);
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("a/master.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("a/seg0.TS"), "video/mp2t");
        assert_eq!(content_type_for("a/seg0.m4s"), "video/iso.segment");
        assert_eq!(content_type_for("a/noext"), "application/octet-stream");
        assert!(is_playlist("a/720p/index.M3U8"));
        assert!(!is_playlist("a/seg.ts"));
    }
}
