//! Correlation grouping worker: one unit of work per seed precursor.
//!
//! A single generic scan routine serves both variants, parameterized over
//! the candidate element type and the overlap gate policy. The fragment
//! variant applies the stricter area/apex-containment gate plus the
//! all-or-nothing high-correlation confidence gate; the precursor variant
//! keeps only the boolean overlap test and the correlation gate.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::grouping::curve::{Curve, FragmentEdge, PrecursorCluster, PrecursorLink};
use crate::grouping::store::{RtIndexed, RtIndexedStore};
use crate::grouping::utility::{resampled_pearson, rt_overlap_fraction, spans_overlap};

/// Parameters for one grouping pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupingOpts {
    /// Candidate window half-width around the precursor apex, in minutes.
    pub apex_delta_min: f32,
    /// Minimum four-case RT overlap fraction (fragment variant only).
    pub min_rt_overlap: f32,
    /// Edges with correlation at or below this are rejected.
    pub min_correlation: f32,
    /// Correlation above this counts toward the confidence gate.
    pub high_correlation: f32,
    /// Fewer high-correlation edges than this discards the whole list.
    pub min_high_corr_count: usize,
    /// Resampling rate for the correlation, derived from the run's average
    /// MS1 cycle time.
    pub points_per_minute: f32,
}

impl Default for GroupingOpts {
    fn default() -> Self {
        Self {
            apex_delta_min: 0.6,
            min_rt_overlap: 0.3,
            min_correlation: 0.2,
            high_correlation: 0.7,
            min_high_corr_count: 2,
            points_per_minute: 60.0,
        }
    }
}

/// Gate applied before the correlation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapGate {
    /// Four-case area fraction above `min_rt_overlap` plus mutual apex
    /// containment.
    AreaWithApexContainment,
    /// Any boolean four-case interval overlap.
    AnyOverlap,
}

/// Candidate visible to the grouping scan: a representative curve plus the
/// identity carried onto the emitted edge.
pub trait GroupingCandidate {
    fn curve(&self) -> &Curve;
    fn candidate_index(&self) -> usize;
}

impl GroupingCandidate for Curve {
    #[inline]
    fn curve(&self) -> &Curve {
        self
    }

    #[inline]
    fn candidate_index(&self) -> usize {
        self.index
    }
}

impl GroupingCandidate for PrecursorCluster {
    #[inline]
    fn curve(&self) -> &Curve {
        &self.mono_curve
    }

    #[inline]
    fn candidate_index(&self) -> usize {
        self.index
    }
}

/// One candidate that survived all gates.
struct CandidateMatch {
    index: usize,
    mz: f64,
    intensity: f32,
    correlation: f32,
    overlap: f32,
    apex_delta: f32,
}

/// Window query + gates + correlation, shared by both variants. Does not
/// mutate the store.
fn scan_window<T>(
    seed: &Curve,
    mass_ceiling: Option<f64>,
    skip_index: Option<usize>,
    store: &RtIndexedStore<T>,
    gate: OverlapGate,
    opts: &GroupingOpts,
) -> Vec<CandidateMatch>
where
    T: RtIndexed + GroupingCandidate,
{
    let mut matches = Vec::new();
    let lo = seed.rt_apex - opts.apex_delta_min;
    let hi = seed.rt_apex + opts.apex_delta_min;
    for i in store.range(lo, hi) {
        let cand = store.get(i);
        let cc = cand.curve();
        if skip_index == Some(cand.candidate_index()) {
            continue;
        }
        // cheap prune before the expensive correlation
        if let Some(ceiling) = mass_ceiling {
            if cc.target_mz > ceiling {
                continue;
            }
        }
        let overlap = match gate {
            OverlapGate::AreaWithApexContainment => {
                let f = rt_overlap_fraction(seed.span(), cc.span());
                if f <= opts.min_rt_overlap {
                    continue;
                }
                // both apexes must lie within the other curve's span
                if !cc.contains_rt(seed.rt_apex) || !seed.contains_rt(cc.rt_apex) {
                    continue;
                }
                f
            }
            OverlapGate::AnyOverlap => {
                if !spans_overlap(seed.span(), cc.span()) {
                    continue;
                }
                rt_overlap_fraction(seed.span(), cc.span())
            }
        };
        let correlation = match resampled_pearson(seed, cc, opts.points_per_minute) {
            Ok(r) => r,
            Err(err) => {
                // local recovery: this pair contributes no evidence,
                // remaining candidates are unaffected
                warn!(
                    seed = seed.index,
                    candidate = cand.candidate_index(),
                    error = %err,
                    "correlation failed, treating as zero"
                );
                0.0
            }
        };
        if correlation.is_nan() || correlation <= opts.min_correlation {
            continue;
        }
        matches.push(CandidateMatch {
            index: cand.candidate_index(),
            mz: cc.target_mz,
            intensity: cc.apex_intensity,
            correlation,
            overlap,
            apex_delta: (seed.rt_apex - cc.rt_apex).abs(),
        });
    }
    matches
}

/// Find co-eluting fragment curves for one precursor and emit filtered
/// precursor-fragment edges.
///
/// Gates, in order: apex-RT window query, neutral-mass ceiling prune, RT
/// overlap fraction plus mutual apex containment, resampled Pearson above
/// `min_correlation`. Once the full window has been scanned, the entire
/// list is discarded unless at least `min_high_corr_count` edges exceed
/// `high_correlation` (a per-precursor accept/reject, not per edge).
pub fn group_fragments(
    precursor: &PrecursorCluster,
    store: &RtIndexedStore<Curve>,
    opts: &GroupingOpts,
) -> Vec<FragmentEdge> {
    let matches = scan_window(
        &precursor.mono_curve,
        Some(precursor.neutral_mass),
        None,
        store,
        OverlapGate::AreaWithApexContainment,
        opts,
    );
    let high = matches
        .iter()
        .filter(|m| m.correlation > opts.high_correlation)
        .count();
    if high < opts.min_high_corr_count {
        return Vec::new();
    }
    matches
        .into_iter()
        .map(|m| FragmentEdge {
            fragment_index: m.index,
            mz: m.mz,
            intensity: m.intensity,
            correlation: m.correlation,
            rt_overlap: m.overlap,
            apex_delta: m.apex_delta,
            complementary: false,
            intensity_rank: 0,
            corr_rank: 0,
        })
        .collect()
}

/// Precursor-to-precursor variant: boolean overlap gate only, same
/// correlation threshold, no confidence count gate, never links a cluster
/// to itself.
pub fn group_precursors(
    seed: &PrecursorCluster,
    store: &RtIndexedStore<PrecursorCluster>,
    opts: &GroupingOpts,
) -> Vec<PrecursorLink> {
    scan_window(
        &seed.mono_curve,
        None,
        Some(seed.index),
        store,
        OverlapGate::AnyOverlap,
        opts,
    )
    .into_iter()
    .map(|m| PrecursorLink {
        seed_index: seed.index,
        other_index: m.index,
        correlation: m.correlation,
        apex_delta: m.apex_delta,
    })
    .collect()
}
