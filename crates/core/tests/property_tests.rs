//! Property-based tests for the HNSW components.
//!
//! These tests verify invariants that should hold regardless of input:
//! - Distance kinds order vectors consistently
//! - Neighbor selection stays within its cap and its candidate set
//! - Small builds respect degree caps and return well-formed results

use proptest::prelude::*;
use smallworld_core::hnsw::select::select_neighbors;
use smallworld_core::hnsw::{DistanceKind, Neighbor, NeighborSelectingPolicy, Space, VectorStore};
use smallworld_core::{HnswConfig, HnswIndex};

prop_compose! {
    fn arb_vector(dim: usize)(vec in prop::collection::vec(-10.0f32..10.0, dim)) -> Vec<f32> {
        vec
    }
}

fn arb_policy() -> impl Strategy<Value = NeighborSelectingPolicy> {
    prop_oneof![
        Just(NeighborSelectingPolicy::Naive),
        Just(NeighborSelectingPolicy::Heuristic),
        Just(NeighborSelectingPolicy::HeuristicSaveRemains),
    ]
}

fn arb_kind() -> impl Strategy<Value = DistanceKind> {
    prop_oneof![Just(DistanceKind::Angular), Just(DistanceKind::L2), Just(DistanceKind::Dot)]
}

mod distance_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn l2_is_symmetric_and_non_negative(a in arb_vector(16), b in arb_vector(16)) {
            let d_ab = DistanceKind::L2.distance(&a, &b);
            let d_ba = DistanceKind::L2.distance(&b, &a);
            prop_assert!(d_ab >= 0.0);
            prop_assert!((d_ab - d_ba).abs() <= 1e-3 * d_ab.max(1.0));
        }

        #[test]
        fn angular_stays_in_range(a in arb_vector(16), b in arb_vector(16)) {
            let pa = DistanceKind::Angular.prepare(&a);
            let pb = DistanceKind::Angular.prepare(&b);
            let d = DistanceKind::Angular.distance(&pa, &pb);
            prop_assert!((-1e-5..=2.0 + 1e-5).contains(&d), "angular distance out of range: {}", d);
        }

        #[test]
        fn angular_ignores_scale(a in arb_vector(8), scale in 0.1f32..100.0) {
            prop_assume!(a.iter().any(|x| x.abs() > 1e-3));
            let scaled: Vec<f32> = a.iter().map(|x| x * scale).collect();
            let pa = DistanceKind::Angular.prepare(&a);
            let ps = DistanceKind::Angular.prepare(&scaled);
            prop_assert!(DistanceKind::Angular.distance(&pa, &ps).abs() < 1e-4);
        }

        #[test]
        fn dot_is_negated_inner_product(a in arb_vector(8), b in arb_vector(8)) {
            let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
            let d = DistanceKind::Dot.distance(&a, &b);
            prop_assert!((d + dot).abs() <= 1e-3 * dot.abs().max(1.0));
        }
    }
}

mod select_props {
    use super::*;

    fn candidates(points: &[Vec<f32>]) -> (VectorStore, Vec<Neighbor>) {
        let mut store = VectorStore::new(2);
        store.push(&[0.0, 0.0]);
        for p in points {
            store.push(p);
        }
        let space = Space::new(&store, DistanceKind::L2);
        let mut c: Vec<Neighbor> = (1..store.len() as u32)
            .map(|id| Neighbor::new(id, space.between(0, id)))
            .collect();
        c.sort_unstable();
        (store, c)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn selection_is_a_capped_subset(
            points in prop::collection::vec(arb_vector(2), 1..30),
            cap in 1usize..10,
            policy in arb_policy(),
        ) {
            let (store, cands) = candidates(&points);
            let space = Space::new(&store, DistanceKind::L2);
            let picked = select_neighbors(policy, &cands, cap, &space);

            prop_assert!(picked.len() <= cap);
            prop_assert!(!picked.is_empty());
            prop_assert_eq!(picked[0], cands[0]);
            for n in &picked {
                prop_assert!(cands.contains(n));
            }
            if cands.len() <= cap {
                prop_assert_eq!(&picked, &cands);
            }
        }

        #[test]
        fn policies_agree_on_their_overlap(
            points in prop::collection::vec(arb_vector(2), 1..30),
            cap in 1usize..10,
        ) {
            let (store, cands) = candidates(&points);
            let space = Space::new(&store, DistanceKind::L2);
            let naive = select_neighbors(NeighborSelectingPolicy::Naive, &cands, cap, &space);
            let heuristic = select_neighbors(NeighborSelectingPolicy::Heuristic, &cands, cap, &space);
            let remains = select_neighbors(NeighborSelectingPolicy::HeuristicSaveRemains, &cands, cap, &space);

            prop_assert_eq!(naive.len(), cap.min(cands.len()));
            prop_assert_eq!(remains.len(), cap.min(cands.len()));
            prop_assert_eq!(&remains[..heuristic.len()], &heuristic[..]);
        }
    }
}

mod build_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn small_builds_are_well_formed(
            points in prop::collection::vec(arb_vector(3), 1..60),
            m in 2usize..6,
            policy in arb_policy(),
            kind in arb_kind(),
            query in arb_vector(3),
            k in 1usize..8,
        ) {
            let config = HnswConfig::default()
                .with_distance(kind)
                .with_m(m)
                .with_ef_construction(16)
                .with_neighbor_selecting(policy);
            let mut index = HnswIndex::new(3, config.clone());
            for (i, p) in points.iter().enumerate() {
                index.add(i as u64, p).unwrap();
            }
            index.build().unwrap();

            let graph = index.graph().unwrap();
            let ep = graph.entry_point().unwrap();
            let top = graph.nodes().iter().map(|n| n.level()).max().unwrap();
            prop_assert_eq!(ep.level, top);
            for (id, node) in graph.nodes().iter().enumerate() {
                for l in 0..=node.level() {
                    let links = node.neighbors(l);
                    prop_assert!(links.len() <= config.cap(l));
                    prop_assert!(!links.contains(&(id as u32)));
                    prop_assert!(links.iter().all(|&n| (n as usize) < points.len()));
                    prop_assert!(links.iter().all(|&n| graph.node(n).level() >= l));
                }
            }

            let hits = index.search(&query, k, 16).unwrap();
            prop_assert!(hits.len() <= k);
            prop_assert!(!hits.is_empty());
            prop_assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
            let prepared = kind.prepare(&query);
            for &(id, d) in &hits {
                let stored = index.get_vector(id).unwrap();
                prop_assert!((kind.distance(&prepared, stored) - d).abs() <= 1e-4 * d.abs().max(1.0));
            }
        }
    }
}
