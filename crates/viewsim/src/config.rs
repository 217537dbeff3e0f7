use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Track type a selection policy targets. A master playlist advertises
/// video renditions (`#EXT-X-STREAM-INF`) as well as alternate audio and
/// caption renditions (`#EXT-X-MEDIA`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariantType {
    #[default]
    Video,
    Audio,
    ClosedCaptions,
}

/// How a single metric (resolution or bandwidth) narrows the variant set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetricRule {
    /// Exact match against the configured value; no match means no
    /// selection (the caller falls back to the supplied URL).
    Custom(String),
    /// Smallest advertised value, ties broken by appearance order.
    Min,
    /// Largest advertised value, ties broken by appearance order.
    #[default]
    Max,
}

/// Variant selection policy, fixed for the lifetime of a session.
///
/// For video the resolution rule is applied first, then the bandwidth
/// rule picks one variant from what remains. Audio and caption tracks
/// are selected by type alone since the metrics do not meaningfully
/// apply to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub variant_type: VariantType,
    pub resolution: MetricRule,
    pub bandwidth: MetricRule,
}

/// Transport options consumed by [`HttpFetcher`](crate::fetch::HttpFetcher).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for each request, response body included.
    pub request_timeout: Duration,

    /// Connection timeout (time to establish the initial connection).
    pub connect_timeout: Duration,

    /// Whether to follow redirects.
    pub follow_redirects: bool,

    /// User agent string.
    pub user_agent: String,

    /// Additional request headers, applied to every fetch.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: Vec::new(),
        }
    }
}

/// Configuration for one simulated viewer session. Read-only once the
/// session is created.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Master playlist URL. May also point directly at a media playlist;
    /// selection then falls through and the URL is played as-is.
    pub master_url: String,

    /// Variant selection policy, applied once after the master fetch.
    pub policy: SelectionPolicy,

    /// Stop the session once played time exceeds this many seconds.
    /// `None` plays until the caller stops driving the session.
    pub duration_cap: Option<f64>,

    /// Transport options.
    pub http: HttpConfig,
}

impl SessionConfig {
    pub fn new(master_url: impl Into<String>) -> Self {
        Self {
            master_url: master_url.into(),
            policy: SelectionPolicy::default(),
            duration_cap: None,
            http: HttpConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_duration_cap(mut self, seconds: f64) -> Self {
        self.duration_cap = Some(seconds);
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }
}
