//! Assemble one precursor's filtered edge list into a pseudo-MS/MS
//! consensus spectrum: deisotoping, optional complementary-ion boosting,
//! near-duplicate collapse, rank assignment.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::chemistry::constants::{MASS_DIFF_C13_C12, MASS_PROTON};
use crate::grouping::curve::{FragmentEdge, PrecursorCluster};

/// Options for assembling pseudo spectra.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssembleOpts {
    /// MS2 fragment matching tolerance in parts per million.
    pub ppm_tolerance: f32,
    /// Pair fragments whose masses sum to the precursor mass and share the
    /// strongest member's evidence across the pair.
    pub boost_complementary: bool,
    /// Weight consensus intensities by correlation^2.
    pub adjust_intensity: bool,
    /// Isotope tolerance widens with the isotope index:
    /// `ppm_tolerance * (tol_widening * index + 1)`.
    pub tol_widening: f32,
    /// Boosted intensity = group maximum times this factor.
    pub boost_growth: f32,
}

impl Default for AssembleOpts {
    fn default() -> Self {
        Self {
            ppm_tolerance: 30.0,
            boost_complementary: true,
            adjust_intensity: false,
            tol_widening: 0.5,
            boost_growth: 1.0,
        }
    }
}

/// One point of a consensus spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPoint {
    pub mz: f64,
    pub intensity: f32,
}

/// One pseudo-MS/MS spectrum: precursor summary + consensus point set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PseudoSpectrum {
    pub precursor_index: usize,
    pub precursor_mz: f64,
    pub precursor_charge: u8,
    pub neutral_mass: f64,
    pub rt_apex: f32,
    pub points: Vec<SpectrumPoint>,
}

#[inline]
fn sort_by_mz(edges: &mut [FragmentEdge]) {
    edges.sort_by(|a, b| a.mz.partial_cmp(&b.mz).unwrap_or(Ordering::Equal));
}

/// Best unconsumed, strictly-less-intense edge within `tol` of `expect`.
fn find_train_member(
    edges: &[FragmentEdge],
    removed: &[bool],
    expect: f64,
    tol: f64,
    seed_intensity: f32,
) -> Option<usize> {
    let lo = edges.partition_point(|e| e.mz < expect - tol);
    let mut best: Option<usize> = None;
    for j in lo..edges.len() {
        if edges[j].mz > expect + tol {
            break;
        }
        if removed[j] || edges[j].intensity >= seed_intensity {
            continue;
        }
        match best {
            Some(b) if edges[b].intensity >= edges[j].intensity => {}
            _ => best = Some(j),
        }
    }
    best
}

/// Collapse isotope trains in an m/z-sorted edge list (greedy, the most
/// intense edge of a run survives).
///
/// Probes +1..+4 isotope offsets under charge hypotheses 2 then 1; each
/// matched, strictly-less-intense neighbor is absorbed. A successful
/// charge-2 train rewrites the survivor to its charge-1-equivalent mass
/// and re-checks the precursor neutral-mass ceiling. The output is sorted
/// by m/z and running the pass on it again is a no-op.
pub fn deisotope(edges: &mut Vec<FragmentEdge>, neutral_mass: f64, opts: &AssembleOpts) {
    sort_by_mz(edges);
    let n = edges.len();
    let mut removed = vec![false; n];
    for i in 0..n {
        if removed[i] {
            continue;
        }
        let seed_mz = edges[i].mz;
        let seed_intensity = edges[i].intensity;
        let mut collapsed_charge = 0u8;
        for charge in [2u8, 1] {
            let mut absorbed: Vec<usize> = Vec::new();
            for iso in 1..=4u32 {
                let expect = seed_mz + iso as f64 * MASS_DIFF_C13_C12 / charge as f64;
                let tol = expect
                    * opts.ppm_tolerance as f64
                    * (opts.tol_widening as f64 * iso as f64 + 1.0)
                    * 1e-6;
                match find_train_member(edges, &removed, expect, tol, seed_intensity) {
                    Some(j) => absorbed.push(j),
                    None => break,
                }
            }
            if !absorbed.is_empty() {
                for j in absorbed {
                    removed[j] = true;
                }
                collapsed_charge = charge;
                break;
            }
        }
        if collapsed_charge == 2 {
            let z = collapsed_charge as f64;
            edges[i].mz = seed_mz * z - (z - 1.0) * MASS_PROTON;
            if edges[i].mz > neutral_mass {
                removed[i] = true;
            }
        }
    }
    let mut keep = removed.into_iter();
    edges.retain(|_| !keep.next().unwrap_or(false));
    // charge-2 rewrites moved m/z values around
    sort_by_mz(edges);
}

/// Complementary-ion boosting: two fragments whose masses sum to the
/// precursor mass (plus proton bookkeeping) are expected to co-elute
/// identically, so the group shares the strongest member's evidence.
///
/// For each ungrouped edge the complement
/// `neutral_mass - mz + 2 * proton` is searched among the m/z-sorted
/// neighbors within the ppm tolerance; on a match the group takes the
/// strongest member's correlation, apex delta, overlap, and rank fields,
/// and every member's intensity becomes the group maximum times
/// `boost_growth`.
pub fn boost_complementary(edges: &mut [FragmentEdge], neutral_mass: f64, opts: &AssembleOpts) {
    sort_by_mz(edges);
    let n = edges.len();
    let mut group = vec![usize::MAX; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        if group[i] != usize::MAX {
            continue;
        }
        let complement = neutral_mass - edges[i].mz + 2.0 * MASS_PROTON;
        if complement <= 0.0 {
            continue;
        }
        let tol = complement * opts.ppm_tolerance as f64 * 1e-6;
        let lo = edges.partition_point(|e| e.mz < complement - tol);
        let mut members: Vec<usize> = Vec::new();
        for j in lo..n {
            if edges[j].mz > complement + tol {
                break;
            }
            if j != i && group[j] == usize::MAX {
                members.push(j);
            }
        }
        if members.is_empty() {
            continue;
        }
        members.push(i);
        let g = groups.len();
        for &m in &members {
            group[m] = g;
        }
        groups.push(members);
    }
    for members in groups {
        let strongest = members
            .iter()
            .copied()
            .max_by(|&a, &b| {
                edges[a]
                    .intensity
                    .partial_cmp(&edges[b].intensity)
                    .unwrap_or(Ordering::Equal)
            })
            .expect("complementary group is never empty");
        let template = edges[strongest].clone();
        let boosted = template.intensity * opts.boost_growth;
        for m in members {
            let e = &mut edges[m];
            e.correlation = template.correlation;
            e.apex_delta = template.apex_delta;
            e.rt_overlap = template.rt_overlap;
            e.intensity_rank = template.intensity_rank;
            e.corr_rank = template.corr_rank;
            e.intensity = boosted;
            e.complementary = true;
        }
    }
}

/// Merge edges into one consensus (m/z, intensity) point set, collapsing
/// near-duplicate m/z within the ppm tolerance by keeping the maximum.
/// Sorts internally, so the result does not depend on input order.
pub fn consensus_points(edges: &[FragmentEdge], opts: &AssembleOpts) -> Vec<SpectrumPoint> {
    let mut points: Vec<SpectrumPoint> = edges
        .iter()
        .map(|e| {
            let weight = if opts.adjust_intensity {
                e.correlation * e.correlation
            } else {
                1.0
            };
            SpectrumPoint {
                mz: e.mz,
                intensity: e.intensity * weight,
            }
        })
        .collect();
    points.sort_by(|a, b| {
        a.mz.partial_cmp(&b.mz)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.intensity.partial_cmp(&b.intensity).unwrap_or(Ordering::Equal))
    });
    let mut out: Vec<SpectrumPoint> = Vec::with_capacity(points.len());
    for p in points {
        match out.last_mut() {
            Some(last) if (p.mz - last.mz).abs() <= last.mz * opts.ppm_tolerance as f64 * 1e-6 => {
                if p.intensity > last.intensity {
                    last.intensity = p.intensity;
                }
            }
            _ => out.push(p),
        }
    }
    out
}

/// Assign 1-based intensity and correlation ranks over the final list.
pub fn assign_ranks(edges: &mut [FragmentEdge]) {
    let n = edges.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        edges[b]
            .intensity
            .partial_cmp(&edges[a].intensity)
            .unwrap_or(Ordering::Equal)
    });
    for (rank, &i) in order.iter().enumerate() {
        edges[i].intensity_rank = rank as u32 + 1;
    }
    order.sort_by(|&a, &b| {
        edges[b]
            .correlation
            .partial_cmp(&edges[a].correlation)
            .unwrap_or(Ordering::Equal)
    });
    for (rank, &i) in order.iter().enumerate() {
        edges[i].corr_rank = rank as u32 + 1;
    }
}

/// Run the full assembly for one precursor: deisotope, optionally boost
/// complementary pairs, rank, and derive the consensus spectrum.
///
/// The edge list is mutated in place. Empty input yields an empty
/// spectrum; whether to keep a sparse spectrum is the caller's decision.
pub fn assemble(
    precursor: &PrecursorCluster,
    edges: &mut Vec<FragmentEdge>,
    opts: &AssembleOpts,
) -> PseudoSpectrum {
    if !edges.is_empty() {
        deisotope(edges, precursor.neutral_mass, opts);
        if opts.boost_complementary {
            boost_complementary(edges, precursor.neutral_mass, opts);
        }
        assign_ranks(edges);
    }
    PseudoSpectrum {
        precursor_index: precursor.index,
        precursor_mz: precursor.precursor_mz(),
        precursor_charge: precursor.charge,
        neutral_mass: precursor.neutral_mass,
        rt_apex: precursor.apex_rt(),
        points: consensus_points(edges, opts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::curve::Curve;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn edge(mz: f64, intensity: f32, correlation: f32) -> FragmentEdge {
        FragmentEdge {
            fragment_index: 0,
            mz,
            intensity,
            correlation,
            rt_overlap: 1.0,
            apex_delta: 0.0,
            complementary: false,
            intensity_rank: 0,
            corr_rank: 0,
        }
    }

    fn opts() -> AssembleOpts {
        AssembleOpts::default()
    }

    #[test]
    fn test_charge_two_train_collapses_to_singly_charged_mass() {
        let x = 400.0;
        let mut edges = vec![
            edge(x, 100.0, 0.9),
            edge(x + MASS_DIFF_C13_C12 / 2.0, 60.0, 0.85),
            edge(x + MASS_DIFF_C13_C12, 30.0, 0.8),
        ];
        deisotope(&mut edges, 1200.0, &opts());
        assert_eq!(edges.len(), 1);
        let expect = 2.0 * x - MASS_PROTON;
        assert!((edges[0].mz - expect).abs() < 1e-9);
        assert_eq!(edges[0].intensity, 100.0);
    }

    #[test]
    fn test_deisotope_is_idempotent() {
        let x = 400.0;
        let mut edges = vec![
            edge(x, 100.0, 0.9),
            edge(x + MASS_DIFF_C13_C12 / 2.0, 60.0, 0.85),
            edge(x + MASS_DIFF_C13_C12, 30.0, 0.8),
            edge(550.0, 20.0, 0.7),
        ];
        deisotope(&mut edges, 1200.0, &opts());
        let once = edges.clone();
        deisotope(&mut edges, 1200.0, &opts());
        assert_eq!(edges, once);
    }

    #[test]
    fn test_charge_one_train_keeps_mz() {
        let mut edges = vec![
            edge(500.0, 100.0, 0.9),
            edge(500.0 + MASS_DIFF_C13_C12, 40.0, 0.8),
        ];
        deisotope(&mut edges, 1200.0, &opts());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].mz, 500.0);
    }

    #[test]
    fn test_collapsed_edge_above_ceiling_is_dropped() {
        let x = 400.0;
        let mut edges = vec![
            edge(x, 100.0, 0.9),
            edge(x + MASS_DIFF_C13_C12 / 2.0, 60.0, 0.85),
        ];
        // charge-1-equivalent mass 798.99 exceeds the neutral mass
        deisotope(&mut edges, 700.0, &opts());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_more_intense_neighbor_is_not_absorbed() {
        let mut edges = vec![
            edge(500.0, 40.0, 0.9),
            edge(500.0 + MASS_DIFF_C13_C12, 100.0, 0.8),
        ];
        deisotope(&mut edges, 1200.0, &opts());
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_complementary_pair_shares_strongest_evidence() {
        let neutral_mass = 1000.0;
        let a_mz = 400.0;
        let b_mz = neutral_mass - a_mz + 2.0 * MASS_PROTON;
        let mut a = edge(a_mz, 50.0, 0.9);
        a.apex_delta = 0.01;
        a.rt_overlap = 0.8;
        let mut b = edge(b_mz, 80.0, 0.7);
        b.apex_delta = 0.03;
        b.rt_overlap = 0.9;
        let mut edges = vec![a, b];
        boost_complementary(&mut edges, neutral_mass, &opts());
        for e in &edges {
            // strongest member is b (intensity 80)
            assert_eq!(e.correlation, 0.7);
            assert_eq!(e.apex_delta, 0.03);
            assert_eq!(e.rt_overlap, 0.9);
            assert_eq!(e.intensity, 80.0);
            assert!(e.complementary);
        }
    }

    #[test]
    fn test_boost_growth_factor() {
        let neutral_mass = 1000.0;
        let b_mz = neutral_mass - 400.0 + 2.0 * MASS_PROTON;
        let mut edges = vec![edge(400.0, 50.0, 0.9), edge(b_mz, 80.0, 0.7)];
        let mut o = opts();
        o.boost_growth = 2.0;
        boost_complementary(&mut edges, neutral_mass, &o);
        assert_eq!(edges[0].intensity, 160.0);
        assert_eq!(edges[1].intensity, 160.0);
    }

    #[test]
    fn test_unpaired_edges_are_untouched() {
        let mut edges = vec![edge(400.0, 50.0, 0.9), edge(500.0, 80.0, 0.7)];
        boost_complementary(&mut edges, 1000.0, &opts());
        assert!(!edges[0].complementary);
        assert!(!edges[1].complementary);
        assert_eq!(edges[0].intensity, 50.0);
        assert_eq!(edges[1].intensity, 80.0);
    }

    #[test]
    fn test_consensus_collapses_near_duplicates() {
        let edges = vec![edge(500.0, 10.0, 0.9), edge(500.001, 20.0, 0.8)];
        let points = consensus_points(&edges, &opts());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].intensity, 20.0);
    }

    #[test]
    fn test_consensus_is_order_independent() {
        let mut edges = vec![
            edge(300.0, 5.0, 0.9),
            edge(300.002, 8.0, 0.8),
            edge(450.0, 20.0, 0.7),
            edge(450.004, 15.0, 0.6),
            edge(600.0, 1.0, 0.5),
            edge(750.0, 30.0, 0.9),
        ];
        let reference = consensus_points(&edges, &opts());
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..10 {
            edges.shuffle(&mut rng);
            assert_eq!(consensus_points(&edges, &opts()), reference);
        }
    }

    #[test]
    fn test_consensus_intensity_adjustment() {
        let edges = vec![edge(500.0, 100.0, 0.5)];
        let mut o = opts();
        o.adjust_intensity = true;
        let points = consensus_points(&edges, &o);
        assert_eq!(points.len(), 1);
        assert!((points[0].intensity - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_rank_assignment() {
        let mut edges = vec![edge(300.0, 10.0, 0.9), edge(400.0, 30.0, 0.6), edge(500.0, 20.0, 0.8)];
        assign_ranks(&mut edges);
        assert_eq!(edges[0].intensity_rank, 3);
        assert_eq!(edges[1].intensity_rank, 1);
        assert_eq!(edges[2].intensity_rank, 2);
        assert_eq!(edges[0].corr_rank, 1);
        assert_eq!(edges[1].corr_rank, 3);
        assert_eq!(edges[2].corr_rank, 2);
    }

    #[test]
    fn test_assemble_empty_input_yields_empty_spectrum() {
        let precursor = PrecursorCluster::new(
            3,
            2,
            1000.0,
            Curve {
                index: 3,
                target_mz: 501.0,
                rt_start: 9.5,
                rt_end: 10.6,
                rt_apex: 10.0,
                apex_intensity: 100.0,
                rt: Vec::new(),
                intensity: Vec::new(),
            },
        );
        let mut edges = Vec::new();
        let spectrum = assemble(&precursor, &mut edges, &opts());
        assert!(spectrum.points.is_empty());
        assert_eq!(spectrum.precursor_index, 3);
        assert_eq!(spectrum.precursor_charge, 2);
    }
}
