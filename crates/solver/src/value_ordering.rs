use wsm_core::{Bitset, Graph, Rng, VertexId};

/// Solution-biased value ordering: bucket `Dom(pv)` by how far each target
/// vertex's degree falls short of the domain's maximum degree, then draw
/// one weighted towards the high-degree buckets.
///
/// Grounded on `ValueOrdering.cpp`. The bucket masses there are `2^(4-k)`
/// for excess `k` in `0..=4` (bucket 0, the highest-degree vertices, gets
/// the heaviest mass); vertices with excess `>= 5` are dropped entirely, per
/// the paper's observation (Archibald et al., CPAIOR 2019) that solution
/// counts in a subtree scale roughly with `2^deg`, so a bucket five below
/// the best contributes only a few percent of its mass.
pub fn choose_value(domain: &Bitset, target_graph: &Graph, rng: &mut Rng) -> VertexId {
    debug_assert!(!domain.is_empty());
    if let Some(only) = domain.singleton() {
        return only;
    }

    let max_degree = domain.iter().map(|tv| target_graph.degree(tv)).max().unwrap();

    const NUM_BUCKETS: usize = 5;
    let mut buckets: [Vec<VertexId>; NUM_BUCKETS] = Default::default();
    for tv in domain.iter() {
        let excess = max_degree - target_graph.degree(tv);
        if excess < NUM_BUCKETS {
            buckets[excess].push(tv);
        }
    }

    let mass = |bucket: usize| -> u64 { 1u64 << (NUM_BUCKETS - 1 - bucket) };

    let total_mass: u64 = buckets.iter().enumerate().map(|(k, b)| b.len() as u64 * mass(k)).sum();
    debug_assert!(total_mass > 0, "max-degree vertex is always in bucket 0");

    let mut draw = rng.next_below(total_mass);
    for (k, bucket) in buckets.iter().enumerate() {
        let bucket_mass = mass(k);
        let this_bucket_total = bucket.len() as u64 * bucket_mass;
        if draw < this_bucket_total {
            let index = (draw / bucket_mass) as usize;
            return bucket[index];
        }
        draw -= this_bucket_total;
    }
    unreachable!("draw was bounded by total_mass")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_returns_a_member_of_the_domain() {
        let t = Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (1, 3, 1), (1, 4, 1)]).unwrap();
        let mut dom = Bitset::with_capacity(5);
        for v in [0, 1, 2, 3, 4] {
            dom.insert(VertexId(v));
        }
        let mut rng = Rng::new(123);
        for _ in 0..200 {
            let chosen = choose_value(&dom, &t, &mut rng);
            assert!(dom.test(chosen));
        }
    }

    #[test]
    fn singleton_domain_is_deterministic() {
        let t = Graph::from_edges(&[(0, 1, 1)]).unwrap();
        let mut dom = Bitset::with_capacity(2);
        dom.insert(VertexId(1));
        let mut rng = Rng::new(1);
        assert_eq!(choose_value(&dom, &t, &mut rng), VertexId(1));
    }

    #[test]
    fn high_degree_vertices_are_chosen_more_often() {
        // tv1 has degree 4 (hub), tv2 has degree 1 (leaf).
        let t = Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (1, 3, 1), (1, 4, 1)]).unwrap();
        let mut dom = Bitset::with_capacity(5);
        dom.insert(VertexId(1));
        dom.insert(VertexId(2));
        let mut rng = Rng::new(99);
        let mut hub_count = 0;
        for _ in 0..500 {
            if choose_value(&dom, &t, &mut rng) == VertexId(1) {
                hub_count += 1;
            }
        }
        assert!(hub_count > 400, "hub should dominate the draws, got {hub_count}/500");
    }
}
