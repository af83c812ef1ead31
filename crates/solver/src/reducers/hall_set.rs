use wsm_core::VertexId;

use crate::nodes::{DomainsAccessor, ReductionResult};

/// Value-elimination reducer: whenever a group of `|S| <= 3` unassigned
/// pattern vertices has domains whose union also has exactly `|S|`
/// elements, those elements form a Hall set and cannot be used by any
/// pattern vertex outside the group.
///
/// Group size is capped at 3: larger groups grow combinatorially expensive
/// to detect for a benefit that falls off quickly in practice. Shares the
/// cascading-erasure shape already used by `alldiff_reduce_current_node`.
pub struct HallSetReducer;

impl HallSetReducer {
    pub fn new() -> Self {
        HallSetReducer
    }

    pub fn clear(&mut self) {}

    /// Runs once per reduction pass, over the *current* domain state rather
    /// than a processed-assignments cursor: Hall sets can appear without
    /// any single assignment being their direct cause.
    pub fn reduce(&mut self, accessor: &mut DomainsAccessor<'_>) -> ReductionResult {
        let candidates: Vec<VertexId> = accessor
            .get_unassigned_pattern_vertices_superset()
            .iter()
            .copied()
            .filter(|&pv| (2..=3).contains(&accessor.domain_size(pv)))
            .collect();

        let mut result = ReductionResult::Success;

        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                let group = [candidates[i], candidates[j]];
                let mut union = accessor.domain(group[0]).clone();
                union.union_assign(accessor.domain(group[1]));
                if union.count() == group.len() {
                    match erase_elsewhere(accessor, &union, &group) {
                        ReductionResult::NoGood => return ReductionResult::NoGood,
                        ReductionResult::NewAssignment => result = ReductionResult::NewAssignment,
                        ReductionResult::Success => {}
                    }
                }
            }
        }

        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                for k in (j + 1)..candidates.len() {
                    let group = [candidates[i], candidates[j], candidates[k]];
                    let mut union = accessor.domain(group[0]).clone();
                    union.union_assign(accessor.domain(group[1]));
                    union.union_assign(accessor.domain(group[2]));
                    if union.count() == group.len() {
                        match erase_elsewhere(accessor, &union, &group) {
                            ReductionResult::NoGood => return ReductionResult::NoGood,
                            ReductionResult::NewAssignment => result = ReductionResult::NewAssignment,
                            ReductionResult::Success => {}
                        }
                    }
                }
            }
        }

        result
    }
}

impl Default for HallSetReducer {
    fn default() -> Self {
        Self::new()
    }
}

fn erase_elsewhere(
    accessor: &mut DomainsAccessor<'_>,
    union: &wsm_core::Bitset,
    group: &[VertexId],
) -> ReductionResult {
    let mut result = ReductionResult::Success;
    for i in 0..accessor.num_pattern_vertices() {
        let pv = VertexId::from(i);
        if group.contains(&pv) {
            continue;
        }
        if accessor.domain(pv).is_disjoint(union) {
            continue;
        }
        match accessor.subtract_from_domain(pv, union).reduction_result {
            ReductionResult::NoGood => return ReductionResult::NoGood,
            ReductionResult::NewAssignment => result = ReductionResult::NewAssignment,
            ReductionResult::Success => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodesRawData;
    use wsm_core::Bitset;

    fn domain(len: usize, members: &[u32]) -> Bitset {
        let mut b = Bitset::with_capacity(len);
        for &m in members {
            b.insert(VertexId(m));
        }
        b
    }

    #[test]
    fn pair_hall_set_erases_its_values_elsewhere() {
        // pv0, pv1 both restricted to {0,1}; pv2 has {0,1,2}: the pair
        // (pv0,pv1) is a Hall set over {0,1}, so pv2 must lose both.
        let mut raw = NodesRawData::new(vec![domain(3, &[0, 1]), domain(3, &[0, 1]), domain(3, &[0, 1, 2])]);
        let mut accessor = DomainsAccessor::new(&mut raw);
        accessor
            .get_unassigned_pattern_vertices_superset_to_overwrite()
            .extend([VertexId(0), VertexId(1), VertexId(2)]);
        let mut r = HallSetReducer::new();
        let result = r.reduce(&mut accessor);
        assert_eq!(result, ReductionResult::NewAssignment);
        assert_eq!(accessor.domain(VertexId(2)).singleton(), Some(VertexId(2)));
    }

    #[test]
    fn no_hall_set_leaves_domains_untouched() {
        let mut raw = NodesRawData::new(vec![domain(3, &[0, 1, 2]), domain(3, &[0, 1, 2]), domain(3, &[0, 1, 2])]);
        let mut accessor = DomainsAccessor::new(&mut raw);
        accessor
            .get_unassigned_pattern_vertices_superset_to_overwrite()
            .extend([VertexId(0), VertexId(1), VertexId(2)]);
        let mut r = HallSetReducer::new();
        let result = r.reduce(&mut accessor);
        assert_eq!(result, ReductionResult::Success);
        assert_eq!(accessor.domain(VertexId(0)).count(), 3);
    }
}
