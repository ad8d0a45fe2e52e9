//! Per-isolation-window orchestration: parallel worker fan-out, a barrier,
//! then parallel assembly on a bounded thread pool.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::grouping::curve::{Curve, FragmentEdge, PrecursorCluster, PrecursorLink};
use crate::grouping::pseudo::{self, AssembleOpts, PseudoSpectrum};
use crate::grouping::store::RtIndexedStore;
use crate::grouping::worker::{self, GroupingOpts};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One DIA isolation window in precursor m/z space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsolationWindow {
    pub mz_lo: f64,
    pub mz_hi: f64,
}

impl IsolationWindow {
    #[inline]
    pub fn contains(&self, mz: f64) -> bool {
        mz >= self.mz_lo && mz <= self.mz_hi
    }
}

/// Runs the two-phase grouping pipeline window by window on a fixed-size
/// pool. Built once per run; windows are processed sequentially, the work
/// inside a window in parallel.
pub struct GroupingCoordinator {
    pool: ThreadPool,
    grouping: GroupingOpts,
    assemble: AssembleOpts,
    /// Spectra with fewer consensus points are dropped after assembly.
    min_fragments: usize,
}

impl GroupingCoordinator {
    pub fn new(
        num_threads: usize,
        grouping: GroupingOpts,
        assemble: AssembleOpts,
        min_fragments: usize,
    ) -> Result<Self, CoordinatorError> {
        let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
        Ok(Self {
            pool,
            grouping,
            assemble,
            min_fragments,
        })
    }

    /// Process one isolation window end to end.
    ///
    /// Phase 1 fans out one grouping worker per precursor visible in the
    /// window; the `collect` is the phase barrier. Each non-empty edge
    /// list is then appended to its cluster's guarded aggregate (a
    /// precursor near a window boundary can be visible in two windows, so
    /// this append is the one shared-mutation point). Phase 2 fans out
    /// the assembler over the non-empty lists. The fragment store and all
    /// scratch lists drop before returning, so peak memory stays bounded
    /// by one window's working set.
    pub fn process_window(
        &self,
        window: IsolationWindow,
        precursors: &[PrecursorCluster],
        fragment_curves: Vec<Curve>,
    ) -> Vec<PseudoSpectrum> {
        let store = RtIndexedStore::build(fragment_curves);

        let visible: Vec<&PrecursorCluster> = precursors
            .iter()
            .filter(|p| window.contains(p.precursor_mz()))
            .collect();

        // Phase 1: grouping
        let grouped: Vec<(&PrecursorCluster, Vec<FragmentEdge>)> = self.pool.install(|| {
            visible
                .par_iter()
                .map(|p| (*p, worker::group_fragments(p, &store, &self.grouping)))
                .filter(|(_, edges)| !edges.is_empty())
                .collect()
        });

        for (p, edges) in &grouped {
            p.append_fragments(edges);
        }

        debug!(
            mz_lo = window.mz_lo,
            mz_hi = window.mz_hi,
            visible = visible.len(),
            grouped = grouped.len(),
            "grouping phase complete"
        );

        // Phase 2: assembly
        let min_fragments = self.min_fragments;
        self.pool.install(|| {
            grouped
                .into_par_iter()
                .filter_map(|(p, mut edges)| {
                    let spectrum = pseudo::assemble(p, &mut edges, &self.assemble);
                    (spectrum.points.len() >= min_fragments).then_some(spectrum)
                })
                .collect()
        })
    }

    /// Precursor-to-precursor co-elution pass over a run-level cluster
    /// store, one seed per cluster, deduplicated by unordered pair.
    pub fn link_precursors(&self, store: &RtIndexedStore<PrecursorCluster>) -> Vec<PrecursorLink> {
        let mut links: Vec<PrecursorLink> = self.pool.install(|| {
            store
                .as_slice()
                .par_iter()
                .flat_map_iter(|seed| worker::group_precursors(seed, store, &self.grouping))
                .collect()
        });
        // every pair is found from both ends; keep one orientation
        links.retain(|l| l.seed_index < l.other_index);
        links
    }
}
