//! Immutable apex-RT-sorted store with binary-search range queries.

use std::cmp::Ordering;

use crate::grouping::curve::{Curve, PrecursorCluster};

/// Element that can be ordered by apex retention time.
pub trait RtIndexed {
    fn apex_rt(&self) -> f32;
}

impl RtIndexed for Curve {
    #[inline]
    fn apex_rt(&self) -> f32 {
        self.rt_apex
    }
}

impl RtIndexed for PrecursorCluster {
    #[inline]
    fn apex_rt(&self) -> f32 {
        self.mono_curve.rt_apex
    }
}

/// Read-only container sorted ascending by apex RT, built once per grouping
/// pass and discarded with the window.
///
/// Index validity depends on the sort order staying stable for the duration
/// of one pass, so there is no mutation API; rebuilding is the only way to
/// add or remove entries.
#[derive(Clone, Debug, Default)]
pub struct RtIndexedStore<T> {
    entries: Vec<T>,
}

impl<T: RtIndexed> RtIndexedStore<T> {
    /// Sort ascending by apex RT once.
    pub fn build(mut entries: Vec<T>) -> Self {
        entries.sort_by(|a, b| {
            a.apex_rt()
                .partial_cmp(&b.apex_rt())
                .unwrap_or(Ordering::Equal)
        });
        Self { entries }
    }

    /// First index with apex RT >= `t`, or None past the end.
    pub fn lower_bound(&self, t: f32) -> Option<usize> {
        let i = self.entries.partition_point(|e| e.apex_rt() < t);
        (i < self.entries.len()).then_some(i)
    }

    /// Last index with apex RT <= `t`, or None before the start.
    pub fn upper_bound(&self, t: f32) -> Option<usize> {
        self.entries.partition_point(|e| e.apex_rt() <= t).checked_sub(1)
    }

    /// Index range of all entries with apex RT in `[lo, hi]`.
    pub fn range(&self, lo: f32, hi: f32) -> std::ops::Range<usize> {
        let a = self.entries.partition_point(|e| e.apex_rt() < lo);
        let b = self.entries.partition_point(|e| e.apex_rt() <= hi);
        a..b.max(a)
    }

    #[inline]
    pub fn get(&self, i: usize) -> &T {
        &self.entries[i]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }
}
