use crate::config::MotifDefinition;
use crate::types::CandidateSite;

/// Target span (1-based, inclusive) of the motif associated with a site.
///
/// Extensions are added towards the transcript 5′ end (`upstream`) and
/// 3′ end (`downstream`), then clamped to the target.
#[must_use]
pub fn motif_coordinates(
    site: &CandidateSite,
    definition: MotifDefinition,
    upstream: usize,
    downstream: usize,
    min_target_length: usize,
    target_length: usize,
) -> (usize, usize) {
    let (start, end) = match definition {
        MotifDefinition::Seed => (site.pairing.target_start, site.pairing.target_end),
        MotifDefinition::SeedExtended => (site.pairing.target_start, site.end_site),
        MotifDefinition::Site => (
            (site.end_site + 1).saturating_sub(min_target_length).max(1),
            site.end_site,
        ),
    };
    (
        start.saturating_sub(upstream).max(1),
        (end + downstream).min(target_length),
    )
}

/// Motif bases of a site, as found in the target.
#[must_use]
pub fn motif_sequence<'t>(target: &'t [u8], span: (usize, usize)) -> &'t [u8] {
    &target[span.0 - 1..span.1]
}
