use std::collections::HashSet;

use wsm_core::{checked_add, checked_mul_add, Graph, VertexId, Weight};

use crate::nodes::DomainsAccessor;

/// Incremental scalar-product update for the new assignments appended to
/// the current node's log since index `n_already_processed`.
///
/// Grounded on `WeightCalculator.cpp`: every newly assigned pv contributes
/// the weighted edge to each pattern-neighbour that is *already* assigned,
/// skipping a neighbour that was *also* assigned earlier in this same batch
/// (that pairing will already have been counted, or will be counted when
/// the neighbour's own turn comes up in this loop -- `seen` disambiguates
/// which). Returns `None` (a nogood, not an overflow: callers only ever see
/// `Overflow` at `solve`'s boundary) on a missing target edge, on an
/// arithmetic overflow, or on exceeding `max_scalar_product`.
pub fn update_scalar_product(
    pattern_graph: &Graph,
    target_graph: &Graph,
    accessor: &DomainsAccessor<'_>,
    n_already_processed: usize,
    max_scalar_product: Weight,
) -> Option<(Weight, Weight)> {
    let assignments: Vec<(VertexId, VertexId)> = accessor.new_assignments()[n_already_processed..].to_vec();
    let mut seen: HashSet<VertexId> = HashSet::with_capacity(assignments.len());
    let mut scalar_product = accessor.scalar_product();
    let mut extra_p_weight: Weight = 0;

    for (pv, tv) in assignments {
        seen.insert(pv);
        for &(other_pv, w_p) in pattern_graph.neighbours_and_weights(pv) {
            if seen.contains(&other_pv) {
                continue;
            }
            let other_tv = match accessor.domain(other_pv).singleton() {
                Some(tv2) => tv2,
                None => continue,
            };
            let w_t = target_graph.edge_weight(tv, other_tv)?;
            scalar_product = checked_mul_add(scalar_product, w_p, w_t)?;
            if scalar_product > max_scalar_product {
                return None;
            }
            extra_p_weight = checked_add(extra_p_weight, w_p)?;
        }
    }

    Some((scalar_product, extra_p_weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodesRawData;
    use wsm_core::Bitset;

    fn singleton(len: usize, m: u32) -> Bitset {
        let mut b = Bitset::with_capacity(len);
        b.insert(VertexId(m));
        b
    }

    #[test]
    fn scores_a_newly_closed_edge_once() {
        let p = Graph::from_edges(&[(0, 1, 3)]).unwrap();
        let t = Graph::from_edges(&[(0, 1, 7)]).unwrap();
        let mut raw = NodesRawData::new(vec![singleton(2, 0), singleton(2, 1)]);
        let accessor = DomainsAccessor::new(&mut raw);
        let (sp, dw) = update_scalar_product(&p, &t, &accessor, 0, Weight::MAX).unwrap();
        assert_eq!(sp, 21);
        assert_eq!(dw, 3);
    }

    #[test]
    fn exceeding_the_cap_is_a_nogood() {
        let p = Graph::from_edges(&[(0, 1, 3)]).unwrap();
        let t = Graph::from_edges(&[(0, 1, 7)]).unwrap();
        let mut raw = NodesRawData::new(vec![singleton(2, 0), singleton(2, 1)]);
        let accessor = DomainsAccessor::new(&mut raw);
        assert!(update_scalar_product(&p, &t, &accessor, 0, 20).is_none());
    }

    #[test]
    fn missing_target_edge_is_a_nogood() {
        let p = Graph::from_edges(&[(0, 1, 0), (0, 2, 1)]).unwrap();
        // target has no edge between the two vertices pv0 and pv2 map to.
        let t = Graph::from_edges(&[(0, 1, 1), (1, 2, 1)]).unwrap();
        let mut raw = NodesRawData::new(vec![singleton(3, 0), singleton(3, 1), singleton(3, 2)]);
        let accessor = DomainsAccessor::new(&mut raw);
        assert!(update_scalar_product(&p, &t, &accessor, 0, Weight::MAX).is_none());
    }
}
