//! Core entities for co-elution grouping: chromatographic curves, precursor
//! clusters, and the precursor-fragment edges the grouping pass produces.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::chemistry::constants::MASS_PROTON;

/// A single-m/z chromatographic intensity trace.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Curve {
    /// Index into the upstream curve collection.
    pub index: usize,
    /// Target m/z of the trace.
    pub target_mz: f64,
    /// RT span start, in minutes.
    pub rt_start: f32,
    /// RT span end, in minutes.
    pub rt_end: f32,
    /// Retention time of maximum intensity.
    pub rt_apex: f32,
    pub apex_intensity: f32,
    /// Sample times, ascending (parallel to `intensity`).
    pub rt: Vec<f32>,
    pub intensity: Vec<f32>,
}

impl Curve {
    #[inline]
    pub fn span(&self) -> (f32, f32) {
        (self.rt_start, self.rt_end)
    }

    #[inline]
    pub fn span_len(&self) -> f32 {
        (self.rt_end - self.rt_start).max(0.0)
    }

    /// True if `t` lies within the curve's RT span (closed interval).
    #[inline]
    pub fn contains_rt(&self, t: f32) -> bool {
        t >= self.rt_start && t <= self.rt_end
    }

    /// Intensity profile linearly interpolated at time `t`; 0 outside the
    /// sampled range.
    pub fn intensity_at(&self, t: f32) -> f32 {
        if self.rt.is_empty() {
            return 0.0;
        }
        let n = self.rt.len();
        if t < self.rt[0] || t > self.rt[n - 1] {
            return 0.0;
        }
        let hi = self.rt.partition_point(|&x| x < t);
        if hi == 0 {
            return self.intensity[0];
        }
        if hi >= n {
            return self.intensity[n - 1];
        }
        let (t0, t1) = (self.rt[hi - 1], self.rt[hi]);
        let (y0, y1) = (self.intensity[hi - 1], self.intensity[hi]);
        if t1 <= t0 {
            return y0.max(y1);
        }
        let f = (t - t0) / (t1 - t0);
        y0 + f * (y1 - y0)
    }
}

/// One precursor-fragment association supported by co-elution evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FragmentEdge {
    /// Index of the fragment curve that produced this edge.
    pub fragment_index: usize,
    /// Fragment m/z; rewritten to the charge-1 equivalent when an isotope
    /// train collapses under a charge-2 hypothesis.
    pub mz: f64,
    /// Fragment apex intensity; overwritten by complementary boosting.
    pub intensity: f32,
    /// Pearson correlation of the resampled profiles. Always finite and
    /// above the correlation gate, or the edge does not exist.
    pub correlation: f32,
    /// Fraction of the precursor span covered by the overlap, in [0, 1].
    pub rt_overlap: f32,
    /// |apex RT precursor - apex RT fragment| in minutes.
    pub apex_delta: f32,
    /// Set when the edge belongs to a complementary-ion group.
    pub complementary: bool,
    /// 1 = best, 0 = not yet assigned. Filled in during assembly.
    pub intensity_rank: u32,
    pub corr_rank: u32,
}

/// Co-elution link between two precursor clusters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrecursorLink {
    pub seed_index: usize,
    pub other_index: usize,
    pub correlation: f32,
    pub apex_delta: f32,
}

/// A deconvoluted MS1 feature together with its accumulated fragment
/// evidence.
///
/// Workers from different (possibly overlapping) isolation windows may
/// append to the same cluster over the lifetime of a run, so the aggregate
/// fragment list sits behind a read-write lock and the identification flag
/// is atomic.
#[derive(Debug)]
pub struct PrecursorCluster {
    pub index: usize,
    pub charge: u8,
    /// Neutral (uncharged) monoisotopic mass.
    pub neutral_mass: f64,
    /// Apex RTs of the peaks that contributed to this cluster.
    pub peak_rts: Vec<f32>,
    /// Representative monoisotopic trace.
    pub mono_curve: Curve,
    identified: AtomicBool,
    fragments: RwLock<Vec<FragmentEdge>>,
}

impl PrecursorCluster {
    pub fn new(index: usize, charge: u8, neutral_mass: f64, mono_curve: Curve) -> Self {
        Self {
            index,
            charge,
            neutral_mass,
            peak_rts: vec![mono_curve.rt_apex],
            mono_curve,
            identified: AtomicBool::new(false),
            fragments: RwLock::new(Vec::new()),
        }
    }

    /// m/z of the charged precursor ion.
    #[inline]
    pub fn precursor_mz(&self) -> f64 {
        self.neutral_mass / self.charge.max(1) as f64 + MASS_PROTON
    }

    #[inline]
    pub fn apex_rt(&self) -> f32 {
        self.mono_curve.rt_apex
    }

    pub fn is_identified(&self) -> bool {
        self.identified.load(AtomicOrdering::Relaxed)
    }

    /// Set by the external library-mapping stage.
    pub fn mark_identified(&self) {
        self.identified.store(true, AtomicOrdering::Relaxed);
    }

    /// Append one window's edges to the aggregate list (exclusive write).
    pub fn append_fragments(&self, edges: &[FragmentEdge]) {
        let mut guard = self.fragments.write().expect("fragment lock poisoned");
        guard.extend_from_slice(edges);
    }

    /// Snapshot of the aggregate fragment list.
    pub fn fragments(&self) -> Vec<FragmentEdge> {
        self.fragments.read().expect("fragment lock poisoned").clone()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.read().expect("fragment lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled_curve() -> Curve {
        Curve {
            index: 0,
            target_mz: 500.0,
            rt_start: 1.0,
            rt_end: 3.0,
            rt_apex: 2.0,
            apex_intensity: 10.0,
            rt: vec![1.0, 2.0, 3.0],
            intensity: vec![0.0, 10.0, 0.0],
        }
    }

    #[test]
    fn test_intensity_interpolation() {
        let c = sampled_curve();
        assert_eq!(c.intensity_at(2.0), 10.0);
        assert_eq!(c.intensity_at(1.5), 5.0);
        assert_eq!(c.intensity_at(2.5), 5.0);
        // outside the sampled range
        assert_eq!(c.intensity_at(0.5), 0.0);
        assert_eq!(c.intensity_at(3.5), 0.0);
    }

    #[test]
    fn test_span_contains() {
        let c = sampled_curve();
        assert!(c.contains_rt(1.0));
        assert!(c.contains_rt(3.0));
        assert!(!c.contains_rt(3.01));
        assert_eq!(c.span_len(), 2.0);
    }

    #[test]
    fn test_precursor_mz() {
        let p = PrecursorCluster::new(0, 2, 998.0, sampled_curve());
        let expect = 998.0 / 2.0 + MASS_PROTON;
        assert!((p.precursor_mz() - expect).abs() < 1e-9);
    }

    #[test]
    fn test_identified_flag() {
        let p = PrecursorCluster::new(0, 2, 998.0, sampled_curve());
        assert!(!p.is_identified());
        p.mark_identified();
        assert!(p.is_identified());
    }

    #[test]
    fn test_concurrent_append() {
        let p = PrecursorCluster::new(0, 2, 998.0, sampled_curve());
        let edge = FragmentEdge {
            fragment_index: 7,
            mz: 300.0,
            intensity: 1.0,
            correlation: 0.9,
            rt_overlap: 1.0,
            apex_delta: 0.0,
            complementary: false,
            intensity_rank: 0,
            corr_rank: 0,
        };
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        p.append_fragments(std::slice::from_ref(&edge));
                    }
                });
            }
        });
        assert_eq!(p.fragment_count(), 400);
    }
}
