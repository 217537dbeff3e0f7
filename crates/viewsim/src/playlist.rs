// HLS playlist parsing: master variant lists and media segment lists.

use tracing::debug;

use crate::config::VariantType;
use crate::error::SessionError;

/// One rendition advertised by a master playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub kind: VariantType,
    pub uri: String,
    /// `BANDWIDTH` attribute, when present and numeric.
    pub bandwidth: Option<u64>,
    /// `RESOLUTION` attribute as (width, height), when present.
    pub resolution: Option<(u32, u32)>,
}

impl Variant {
    /// The `WxH` form the RESOLUTION attribute uses on the wire, for
    /// exact-match selection.
    pub fn resolution_string(&self) -> Option<String> {
        self.resolution.map(|(w, h)| format!("{w}x{h}"))
    }
}

/// One downloadable chunk listed by a media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub uri: String,
    /// `EXTINF` duration in seconds.
    pub duration: f64,
}

/// Parsed form of one media playlist fetch. Replaced wholesale on every
/// reload, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// `EXT-X-TARGETDURATION`, `None` when the directive is absent.
    pub target_duration: Option<u64>,
    /// A playlist without `EXT-X-ENDLIST` is live and will slide forward.
    pub is_live: bool,
    /// Segments in file order.
    pub segments: Vec<Segment>,
}

/// Scans a master playlist for variant streams.
///
/// `#EXT-X-STREAM-INF` attribute lines pair with the following URI line;
/// `#EXT-X-MEDIA` renditions carry their URI inline. Anything else is
/// ignored, and a body with no variant lines yields an empty list —
/// callers treat that as "the supplied URL is itself the media playlist".
pub fn parse_master(text: &str) -> Vec<Variant> {
    let mut variants = Vec::new();
    // Attributes seen on the most recent STREAM-INF line, waiting for
    // its URI line.
    let mut pending: Option<(Option<u64>, Option<(u32, u32)>)> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let bandwidth = attribute(rest, "BANDWIDTH").and_then(|v| v.parse::<u64>().ok());
            let resolution = attribute(rest, "RESOLUTION").and_then(parse_resolution);
            pending = Some((bandwidth, resolution));
        } else if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA:") {
            let kind = match attribute(rest, "TYPE") {
                Some("AUDIO") => VariantType::Audio,
                Some("CLOSED-CAPTIONS") | Some("SUBTITLES") => VariantType::ClosedCaptions,
                _ => continue,
            };
            // CLOSED-CAPTIONS renditions embedded in the video stream
            // have no URI and nothing to fetch.
            let Some(uri) = attribute(rest, "URI") else {
                continue;
            };
            variants.push(Variant {
                kind,
                uri: uri.to_string(),
                bandwidth: None,
                resolution: None,
            });
        } else if line.is_empty() || line.starts_with('#') {
            // Comments and unrelated tags between STREAM-INF and its URI
            // line do not break the pairing.
        } else if let Some((bandwidth, resolution)) = pending.take() {
            variants.push(Variant {
                kind: VariantType::Video,
                uri: line.to_string(),
                bandwidth,
                resolution,
            });
        }
    }
    variants
}

/// Parses a media playlist body into its snapshot form.
///
/// A missing `EXT-X-TARGETDURATION` is not an error (`None` is returned
/// and the caller keeps its sticky value); a malformed numeric duration
/// is fatal for the reload that fetched this body.
pub fn parse_media(text: &str) -> Result<MediaPlaylist, SessionError> {
    let mut target_duration = None;
    let mut end_list = false;
    let mut segments = Vec::new();
    // EXTINF duration waiting for the following URI line.
    let mut pending_duration: Option<f64> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            let value = rest.trim();
            let parsed = value
                .parse::<u64>()
                .map_err(|e| SessionError::malformed_duration(value, e.to_string()))?;
            target_duration = Some(parsed);
        } else if line == "#EXT-X-ENDLIST" {
            end_list = true;
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            // "#EXTINF:<duration>,[<title>]"
            let value = rest.split(',').next().unwrap_or(rest).trim();
            let duration = value
                .parse::<f64>()
                .map_err(|e| SessionError::malformed_duration(value, e.to_string()))?;
            // "NaN"/"inf" parse as f64 but would poison the playback
            // clock downstream.
            if !duration.is_finite() || duration < 0.0 {
                return Err(SessionError::malformed_duration(
                    value,
                    "duration must be a non-negative finite number",
                ));
            }
            pending_duration = Some(duration);
        } else if line.is_empty() || line.starts_with('#') {
            // Other tags are irrelevant to pacing.
        } else if let Some(duration) = pending_duration.take() {
            segments.push(Segment {
                uri: line.to_string(),
                duration,
            });
        }
    }

    if target_duration.is_none() {
        debug!("media playlist carries no EXT-X-TARGETDURATION");
    }

    Ok(MediaPlaylist {
        target_duration,
        is_live: !end_list,
        segments,
    })
}

/// Looks up one attribute in a tag's attribute list, stripping quotes.
fn attribute<'a>(rest: &'a str, name: &str) -> Option<&'a str> {
    for part in split_attributes(rest) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case(name) {
            continue;
        }
        let mut value = value.trim();
        if let Some(stripped) = value.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            value = stripped;
        }
        return Some(value);
    }
    None
}

/// Splits an attribute list on commas, keeping quoted values intact.
fn split_attributes(rest: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(rest[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < rest.len() {
        parts.push(rest[start..].trim());
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",URI=\"audio/en.m3u8\"\n\
#EXT-X-MEDIA:TYPE=CLOSED-CAPTIONS,GROUP-ID=\"cc\",NAME=\"English\",INSTREAM-ID=\"CC1\"\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"\n\
low/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\n\
high/index.m3u8\n";

    #[test]
    fn master_parses_video_and_media_variants() {
        let variants = parse_master(MASTER);
        assert_eq!(variants.len(), 3);

        assert_eq!(variants[0].kind, VariantType::Audio);
        assert_eq!(variants[0].uri, "audio/en.m3u8");

        assert_eq!(variants[1].kind, VariantType::Video);
        assert_eq!(variants[1].uri, "low/index.m3u8");
        assert_eq!(variants[1].bandwidth, Some(800000));
        assert_eq!(variants[1].resolution, Some((640, 360)));
        assert_eq!(variants[1].resolution_string().as_deref(), Some("640x360"));

        assert_eq!(variants[2].bandwidth, Some(2500000));
        assert_eq!(variants[2].resolution, Some((1280, 720)));
    }

    #[test]
    fn master_skips_captions_without_uri() {
        let variants = parse_master(MASTER);
        assert!(
            !variants
                .iter()
                .any(|v| v.kind == VariantType::ClosedCaptions)
        );
    }

    #[test]
    fn master_without_stream_inf_yields_empty_list() {
        let variants = parse_master("#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg1.ts\n");
        assert!(variants.is_empty());
    }

    #[test]
    fn media_round_trip_with_end_marker() {
        let playlist = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:6\n\
#EXTINF:5.5,\nseg1.ts\n#EXTINF:6.0,\nseg2.ts\n#EXTINF:4.2,first\nseg3.ts\n\
#EXT-X-ENDLIST\n",
        )
        .expect("playlist should parse");

        assert_eq!(playlist.target_duration, Some(6));
        assert!(!playlist.is_live);
        assert_eq!(
            playlist.segments,
            vec![
                Segment {
                    uri: "seg1.ts".into(),
                    duration: 5.5
                },
                Segment {
                    uri: "seg2.ts".into(),
                    duration: 6.0
                },
                Segment {
                    uri: "seg3.ts".into(),
                    duration: 4.2
                },
            ]
        );
    }

    #[test]
    fn media_without_end_marker_is_live() {
        let playlist =
            parse_media("#EXTM3U\n#EXT-X-TARGETDURATION:2\n#EXTINF:2.0,\nseg1.ts\n").unwrap();
        assert!(playlist.is_live);
    }

    #[test]
    fn media_without_target_duration_is_not_an_error() {
        let playlist = parse_media("#EXTM3U\n#EXTINF:2.0,\nseg1.ts\n").unwrap();
        assert_eq!(playlist.target_duration, None);
        assert_eq!(playlist.segments.len(), 1);
    }

    #[test]
    fn malformed_extinf_duration_is_fatal() {
        let err = parse_media("#EXTM3U\n#EXTINF:abc,\nseg1.ts\n").unwrap_err();
        assert!(matches!(err, SessionError::MalformedDuration { .. }));
    }

    #[test]
    fn negative_or_non_finite_extinf_duration_is_fatal() {
        for body in [
            "#EXTM3U\n#EXTINF:-6.0,\nseg1.ts\n",
            "#EXTM3U\n#EXTINF:NaN,\nseg1.ts\n",
            "#EXTM3U\n#EXTINF:inf,\nseg1.ts\n",
        ] {
            let err = parse_media(body).unwrap_err();
            assert!(matches!(err, SessionError::MalformedDuration { .. }));
        }
    }

    #[test]
    fn malformed_target_duration_is_fatal() {
        let err = parse_media("#EXTM3U\n#EXT-X-TARGETDURATION:six\n").unwrap_err();
        assert!(matches!(err, SessionError::MalformedDuration { .. }));
    }

    #[test]
    fn attribute_lookup_respects_quoted_commas() {
        let rest = "BANDWIDTH=800000,CODECS=\"avc1.4d401e,mp4a.40.2\",RESOLUTION=640x360";
        assert_eq!(attribute(rest, "CODECS"), Some("avc1.4d401e,mp4a.40.2"));
        assert_eq!(attribute(rest, "RESOLUTION"), Some("640x360"));
        assert_eq!(attribute(rest, "MISSING"), None);
    }
}
