//! Per-label aggregation of the samples viewers produce.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use viewsim_engine::Sample;

#[derive(Debug, Default, Clone)]
pub struct LabelStats {
    pub requests: u64,
    pub failures: u64,
    pub bytes: u64,
    pub total_elapsed: Duration,
}

impl LabelStats {
    fn record(&mut self, sample: &Sample) {
        self.requests += 1;
        if !sample.success {
            self.failures += 1;
        }
        self.bytes += sample.body_bytes;
        self.total_elapsed += sample.elapsed;
    }

    pub fn mean_elapsed(&self) -> Duration {
        if self.requests == 0 {
            Duration::ZERO
        } else {
            self.total_elapsed / self.requests as u32
        }
    }
}

/// Rollup of everything one or more viewers fetched, keyed by sample
/// label so the master/playlist/segment rows stay separable.
#[derive(Debug, Default, Clone)]
pub struct Report {
    labels: BTreeMap<&'static str, LabelStats>,
    /// Viewers that gave up after exhausting their fetch retries.
    pub aborted_viewers: u64,
}

impl Report {
    pub fn record(&mut self, sample: &Sample) {
        self.labels.entry(sample.label()).or_default().record(sample);
    }

    pub fn merge(&mut self, other: Report) {
        for (label, stats) in other.labels {
            let entry = self.labels.entry(label).or_default();
            entry.requests += stats.requests;
            entry.failures += stats.failures;
            entry.bytes += stats.bytes;
            entry.total_elapsed += stats.total_elapsed;
        }
        self.aborted_viewers += other.aborted_viewers;
    }

    pub fn total_failures(&self) -> u64 {
        self.labels.values().map(|s| s.failures).sum()
    }

    pub fn label(&self, label: &str) -> Option<&LabelStats> {
        self.labels.get(label)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<14} {:>10} {:>10} {:>14} {:>12}",
            "label", "requests", "failures", "bytes", "mean ms"
        )?;
        for (label, stats) in &self.labels {
            writeln!(
                f,
                "{:<14} {:>10} {:>10} {:>14} {:>12.1}",
                label,
                stats.requests,
                stats.failures,
                stats.bytes,
                stats.mean_elapsed().as_secs_f64() * 1000.0
            )?;
        }
        if self.aborted_viewers > 0 {
            writeln!(f, "viewers aborted: {}", self.aborted_viewers)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use viewsim_engine::{FetchResponse, Sample, SampleKind};

    fn sample(kind: SampleKind, success: bool, bytes: u64) -> Sample {
        let response = FetchResponse {
            status: if success { 200 } else { 0 },
            success,
            body_bytes: bytes,
            ..Default::default()
        };
        Sample::from_response(
            kind,
            "http://example.com/x".to_string(),
            response,
            SystemTime::now(),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn records_group_by_label() {
        let mut report = Report::default();
        report.record(&sample(SampleKind::Master, true, 100));
        report.record(&sample(SampleKind::VideoSegment, true, 4000));
        report.record(&sample(SampleKind::VideoSegment, false, 0));

        let segments = report.label("video_segment").unwrap();
        assert_eq!(segments.requests, 2);
        assert_eq!(segments.failures, 1);
        assert_eq!(segments.bytes, 4000);
        assert_eq!(report.total_failures(), 1);
    }

    #[test]
    fn merge_sums_per_label() {
        let mut a = Report::default();
        a.record(&sample(SampleKind::Playlist, true, 500));
        let mut b = Report::default();
        b.record(&sample(SampleKind::Playlist, false, 0));
        b.aborted_viewers = 1;

        a.merge(b);
        let playlists = a.label("playlist").unwrap();
        assert_eq!(playlists.requests, 2);
        assert_eq!(playlists.failures, 1);
        assert_eq!(a.aborted_viewers, 1);
    }
}
