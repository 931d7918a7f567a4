//! Candidate list construction.

use crate::network::NetworkMode;

/// Ordered endpoints to try: the configured URL (if any) followed by the
/// mode's defaults. No deduplication; an empty configured URL is skipped.
pub fn build_candidates(mode: NetworkMode, configured: Option<&str>) -> Vec<String> {
    configured
        .filter(|url| !url.is_empty())
        .into_iter()
        .chain(mode.default_endpoints().iter().copied())
        .map(str::to_string)
        .collect()
}
