// Structured per-step outcomes for the harness driving a session.

use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::fetch::FetchResponse;

/// Which kind of fetch a step performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Master,
    Playlist,
    VideoSegment,
}

impl SampleKind {
    pub fn label(self) -> &'static str {
        match self {
            SampleKind::Master => "master",
            SampleKind::Playlist => "playlist",
            SampleKind::VideoSegment => "video_segment",
        }
    }
}

/// One externally observable unit of work: a single fetch with enough
/// status and metadata for the harness to report pass/fail without
/// reaching into session internals.
#[derive(Debug, Clone)]
pub struct Sample {
    pub kind: SampleKind,
    /// Fully resolved URL the fetch targeted.
    pub url: String,
    pub success: bool,
    /// HTTP status code, 0 when no response was received.
    pub status: u16,
    pub message: String,
    pub response_headers: Vec<(String, String)>,
    pub request_headers: String,
    /// Body of the response, collected for playlist fetches only.
    pub body: Bytes,
    /// Bytes drained from the wire.
    pub body_bytes: u64,
    pub sent_bytes: u64,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub started_at: SystemTime,
    pub elapsed: Duration,
}

impl Sample {
    pub fn from_response(
        kind: SampleKind,
        url: String,
        response: FetchResponse,
        started_at: SystemTime,
        elapsed: Duration,
    ) -> Self {
        Self {
            kind,
            url,
            success: response.success,
            status: response.status,
            message: response.message,
            response_headers: response.headers,
            request_headers: response.request_headers,
            body: response.body,
            body_bytes: response.body_bytes,
            sent_bytes: response.sent_bytes,
            content_type: response.content_type,
            content_encoding: response.content_encoding,
            started_at,
            elapsed,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_the_harness_contract() {
        assert_eq!(SampleKind::Master.label(), "master");
        assert_eq!(SampleKind::Playlist.label(), "playlist");
        assert_eq!(SampleKind::VideoSegment.label(), "video_segment");
    }
}
