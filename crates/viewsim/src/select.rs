// Variant selection: narrows a master playlist's variants to the one
// rendition this session will play.

use tracing::debug;

use crate::config::{MetricRule, SelectionPolicy, VariantType};
use crate::playlist::Variant;

/// Picks exactly one variant per the policy, or `None` when the list is
/// empty or nothing satisfies an exact-match rule. Callers treat `None`
/// as "the supplied URL is itself the media playlist".
///
/// Selection is deterministic: rules resolve by linear scan with ties
/// broken by appearance order.
pub fn select_variant<'a>(variants: &'a [Variant], policy: &SelectionPolicy) -> Option<&'a Variant> {
    match policy.variant_type {
        VariantType::Video => {
            let candidates: Vec<&Variant> = variants
                .iter()
                .filter(|v| v.kind == VariantType::Video)
                .collect();
            let candidates = apply_resolution_rule(candidates, &policy.resolution)?;
            apply_bandwidth_rule(&candidates, &policy.bandwidth)
        }
        // Bandwidth/resolution metrics do not meaningfully apply to
        // alternate audio or caption renditions; first match by type wins.
        kind => variants.iter().find(|v| v.kind == kind),
    }
}

fn apply_resolution_rule<'a>(
    candidates: Vec<&'a Variant>,
    rule: &MetricRule,
) -> Option<Vec<&'a Variant>> {
    match rule {
        MetricRule::Custom(wanted) => {
            let matched: Vec<&Variant> = candidates
                .into_iter()
                .filter(|v| v.resolution_string().as_deref() == Some(wanted.as_str()))
                .collect();
            if matched.is_empty() {
                debug!(resolution = %wanted, "no variant matches the requested resolution");
                return None;
            }
            Some(matched)
        }
        MetricRule::Min | MetricRule::Max => {
            if !candidates.iter().any(|v| v.resolution.is_some()) {
                // Nothing advertises RESOLUTION; the rule has nothing to
                // rank and passes every candidate through.
                return Some(candidates);
            }
            let mut best: Option<u64> = None;
            for v in &candidates {
                let Some(area) = v.resolution.map(|(w, h)| u64::from(w) * u64::from(h)) else {
                    continue;
                };
                best = Some(match (best, rule) {
                    (None, _) => area,
                    (Some(b), MetricRule::Min) => b.min(area),
                    (Some(b), _) => b.max(area),
                });
            }
            let best = best?;
            Some(
                candidates
                    .into_iter()
                    .filter(|v| {
                        v.resolution
                            .is_some_and(|(w, h)| u64::from(w) * u64::from(h) == best)
                    })
                    .collect(),
            )
        }
    }
}

fn apply_bandwidth_rule<'a>(candidates: &[&'a Variant], rule: &MetricRule) -> Option<&'a Variant> {
    match rule {
        MetricRule::Custom(wanted) => {
            let wanted = wanted.trim().parse::<u64>().ok()?;
            candidates
                .iter()
                .copied()
                .find(|v| v.bandwidth == Some(wanted))
        }
        MetricRule::Min | MetricRule::Max => {
            // Hand-rolled scan: `Iterator::max_by_key` keeps the last of
            // equal maxima, but ties must break to the first appearance.
            let mut best: Option<&Variant> = None;
            for v in candidates.iter().copied() {
                let Some(bandwidth) = v.bandwidth else {
                    continue;
                };
                best = match best {
                    None => Some(v),
                    Some(b) => {
                        let current = b.bandwidth.unwrap_or(0);
                        let wins = match rule {
                            MetricRule::Min => bandwidth < current,
                            _ => bandwidth > current,
                        };
                        if wins { Some(v) } else { Some(b) }
                    }
                };
            }
            if best.is_none() && !candidates.is_empty() {
                debug!("no variant advertises BANDWIDTH; defaulting to the first candidate");
                return candidates.first().copied();
            }
            best
        }
    }
}
