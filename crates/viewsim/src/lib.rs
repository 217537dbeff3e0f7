//! HLS viewer simulation engine.
//!
//! A [`PlaybackSession`] behaves like one video player pointed at a
//! master playlist URL: it fetches the master, picks a variant per a
//! [`SelectionPolicy`], then alternates media playlist reloads and
//! segment downloads paced to real playback time. Each call to
//! [`PlaybackSession::step`] performs at most one network fetch and
//! reports it as a [`Sample`], which makes sessions easy to drive from
//! a load-generation harness and to assert on in tests.

pub mod config;
pub mod error;
pub mod fetch;
pub mod playlist;
pub mod resolve;
pub mod sample;
pub mod select;
pub mod session;

// Re-exports for easier access
pub use config::{
    DEFAULT_USER_AGENT, HttpConfig, MetricRule, SelectionPolicy, SessionConfig, VariantType,
};
pub use error::SessionError;
pub use fetch::{Fetch, FetchResponse, HttpFetcher};
pub use playlist::{MediaPlaylist, Segment, Variant};
pub use sample::{Sample, SampleKind};
pub use select::select_variant;
pub use session::PlaybackSession;
