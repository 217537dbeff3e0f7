use clap::{Parser, ValueEnum};
use viewsim_engine::{MetricRule, SelectionPolicy, VariantType};

#[derive(Debug, Parser)]
#[command(
    name = "viewsim",
    about = "Simulates HLS viewers against a master playlist URL for load testing",
    version
)]
pub struct Args {
    /// Master playlist URL (http or https)
    pub url: String,

    /// Which rendition type each viewer plays
    #[arg(long, value_enum, default_value = "video")]
    pub variant_type: VariantKind,

    /// Resolution rule: `min`, `max`, or an exact `WIDTHxHEIGHT`
    #[arg(long, default_value = "max", value_parser = parse_metric_rule)]
    pub resolution: MetricRule,

    /// Bandwidth rule: `min`, `max`, or an exact bits-per-second value
    #[arg(long, default_value = "max", value_parser = parse_metric_rule)]
    pub bandwidth: MetricRule,

    /// Stop each viewer after this many seconds of played content.
    /// Without it, VOD plays to the end and live streams play until
    /// interrupted.
    #[arg(long)]
    pub play_seconds: Option<f64>,

    /// Number of concurrent simulated viewers
    #[arg(long, default_value_t = 1)]
    pub viewers: usize,

    /// Extra attempts for a failed fetch before the viewer gives up
    #[arg(long, default_value_t = 0)]
    pub step_retries: u32,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub connect_timeout: u64,

    /// Do not follow HTTP redirects
    #[arg(long)]
    pub no_redirects: bool,

    /// Override the User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VariantKind {
    Video,
    Audio,
    ClosedCaptions,
}

impl From<VariantKind> for VariantType {
    fn from(kind: VariantKind) -> Self {
        match kind {
            VariantKind::Video => VariantType::Video,
            VariantKind::Audio => VariantType::Audio,
            VariantKind::ClosedCaptions => VariantType::ClosedCaptions,
        }
    }
}

impl Args {
    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            variant_type: self.variant_type.into(),
            resolution: self.resolution.clone(),
            bandwidth: self.bandwidth.clone(),
        }
    }
}

fn parse_metric_rule(value: &str) -> Result<MetricRule, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("rule must not be empty".to_string());
    }
    Ok(match trimmed.to_ascii_lowercase().as_str() {
        "min" => MetricRule::Min,
        "max" => MetricRule::Max,
        _ => MetricRule::Custom(trimmed.to_string()),
    })
}

/// Splits a `Name: value` header argument at the first colon.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(format!("header `{raw}` is missing a `:` separator"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header `{raw}` has an empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_max_video() {
        let args = Args::try_parse_from(["viewsim", "http://example.com/master.m3u8"]).unwrap();
        let policy = args.selection_policy();
        assert_eq!(policy.variant_type, VariantType::Video);
        assert_eq!(policy.resolution, MetricRule::Max);
        assert_eq!(policy.bandwidth, MetricRule::Max);
        assert_eq!(args.viewers, 1);
        assert_eq!(args.step_retries, 0);
    }

    #[test]
    fn custom_rules_pass_through_verbatim() {
        let args = Args::try_parse_from([
            "viewsim",
            "http://example.com/master.m3u8",
            "--resolution",
            "1280x720",
            "--bandwidth",
            "min",
        ])
        .unwrap();
        assert_eq!(args.resolution, MetricRule::Custom("1280x720".to_string()));
        assert_eq!(args.bandwidth, MetricRule::Min);
    }

    #[test]
    fn header_parses_at_first_colon() {
        assert_eq!(
            parse_header("X-Token: abc:def").unwrap(),
            ("X-Token".to_string(), "abc:def".to_string())
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(
            Args::try_parse_from(["viewsim", "http://e/x.m3u8", "--quiet", "--verbose"]).is_err()
        );
    }
}
