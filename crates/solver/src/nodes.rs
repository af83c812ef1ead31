use wsm_core::{Bitset, VertexId, Weight};

/// The outcome of tightening a domain or running a reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionResult {
    /// The domain changed (or stayed the same) but is still `> 1` in size.
    Success,
    /// The domain was narrowed down to exactly one target vertex.
    NewAssignment,
    /// The domain became empty: the current node is infeasible.
    NoGood,
}

/// Per-node bookkeeping: the running scalar product, the new assignments
/// made in this node, and a superset of the still-unassigned pattern
/// vertices.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub scalar_product: Weight,
    pub total_assigned_p_weight: Weight,
    pub new_assignments: Vec<(VertexId, VertexId)>,
    /// `None` until this node has its own list (either because branching
    /// filled one in, or a read fell through to the parent's).
    pub unassigned_superset: Option<Vec<VertexId>>,
}

/// The node stack plus, for each pattern vertex, an independent stack of
/// copy-on-write domain entries tagged with the node index at which they
/// were installed.
///
/// This is the sole owner of search state; [`crate::DomainsAccessor`] is the
/// only thing permitted to read or mutate it.
pub struct NodesRawData {
    num_pattern_vertices: usize,
    nodes: Vec<SearchNode>,
    /// `domain_stacks[pv]` is a `Vec<(node_index, domain)>`, strictly
    /// increasing in `node_index`, with the domain belonging to every node
    /// from its tagged index up to (but not including) the next entry's
    /// index.
    domain_stacks: Vec<Vec<(u32, Bitset)>>,
}

impl NodesRawData {
    /// Seed the root node from initial domains, splitting singleton domains
    /// into the root's `new_assignments` log (to be alldiff-propagated
    /// immediately) and the rest into its `unassigned_superset`.
    pub fn new(initial_domains: Vec<Bitset>) -> Self {
        let num_pattern_vertices = initial_domains.len();
        let mut domain_stacks = Vec::with_capacity(num_pattern_vertices);
        let mut new_assignments = Vec::new();
        let mut unassigned_superset = Vec::new();
        for (i, dom) in initial_domains.into_iter().enumerate() {
            let pv = VertexId::from(i);
            if let Some(tv) = dom.singleton() {
                new_assignments.push((pv, tv));
            } else {
                unassigned_superset.push(pv);
            }
            domain_stacks.push(vec![(0u32, dom)]);
        }
        let root = SearchNode {
            scalar_product: 0,
            total_assigned_p_weight: 0,
            new_assignments,
            unassigned_superset: Some(unassigned_superset),
        };
        NodesRawData {
            num_pattern_vertices,
            nodes: vec![root],
            domain_stacks,
        }
    }

    pub fn num_pattern_vertices(&self) -> usize {
        self.num_pattern_vertices
    }

    pub fn current_node_index(&self) -> u32 {
        (self.nodes.len() - 1) as u32
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    /// Push a new node inheriting the parent's running totals, with an
    /// optional forced assignment already logged.
    pub fn push_node(&mut self, forced_assignment: Option<(VertexId, VertexId)>) {
        let parent = self.nodes.last().expect("node stack never empty");
        let node = SearchNode {
            scalar_product: parent.scalar_product,
            total_assigned_p_weight: parent.total_assigned_p_weight,
            new_assignments: forced_assignment.into_iter().collect(),
            unassigned_superset: None,
        };
        self.nodes.push(node);
    }

    /// Pop the current node, discarding every domain entry tagged with its
    /// index. Returns `false` if the stack is now empty (search finished).
    pub fn pop_node(&mut self) -> bool {
        let popped_index = self.current_node_index();
        self.nodes.pop();
        for stack in &mut self.domain_stacks {
            if stack.last().is_some_and(|&(idx, _)| idx == popped_index) {
                stack.pop();
            }
        }
        !self.nodes.is_empty()
    }

    /// Permanently remove `tv` from `Dom(pv)` in every node currently on
    /// the stack: used when a reducer's `check` proves `(pv, tv)` is
    /// globally impossible, not just wrong in the current node.
    pub fn erase_impossible_assignment(&mut self, pv: VertexId, tv: VertexId) {
        for (_, bitset) in &mut self.domain_stacks[pv.index()] {
            bitset.remove(tv);
        }
    }

    /// Read-only access to `Dom(pv)` in the current node, without going
    /// through [`DomainsAccessor`]: used by callers that only ever read,
    /// such as checking whether the search is complete.
    pub fn domain(&self, pv: VertexId) -> &Bitset {
        &self.domain_stacks[pv.index()].last().expect("domain stack never empty").1
    }

    pub fn scalar_product(&self) -> Weight {
        self.nodes.last().expect("node stack never empty").scalar_product
    }

    pub fn total_p_edge_weights(&self) -> Weight {
        self.nodes.last().expect("node stack never empty").total_assigned_p_weight
    }
}

/// The single channel through which reducers, the weight calculator and
/// the search branch read or mutate [`NodesRawData`].
pub struct DomainsAccessor<'a> {
    raw: &'a mut NodesRawData,
}

/// Result of intersecting (or subtracting) a mask into a domain.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionResult {
    pub reduction_result: ReductionResult,
    pub new_domain_size: usize,
    pub changed: bool,
}

impl<'a> DomainsAccessor<'a> {
    pub fn new(raw: &'a mut NodesRawData) -> Self {
        DomainsAccessor { raw }
    }

    pub fn num_pattern_vertices(&self) -> usize {
        self.raw.num_pattern_vertices
    }

    fn node_idx(&self) -> usize {
        self.raw.nodes.len() - 1
    }

    /// A superset of the unassigned pattern vertices in the current node.
    /// Falls back to the node one level below the top if the current
    /// node's own list hasn't been filled in yet.
    pub fn get_unassigned_pattern_vertices_superset(&self) -> &[VertexId] {
        let idx = self.node_idx();
        if let Some(v) = &self.raw.nodes[idx].unassigned_superset {
            v
        } else {
            assert!(
                self.raw.nodes.len() > 1,
                "root node always has its superset filled in"
            );
            self.raw.nodes[idx - 1]
                .unassigned_superset
                .as_ref()
                .expect("parent node always has its superset filled in")
        }
    }

    pub fn get_unassigned_pattern_vertices_superset_to_overwrite(&mut self) -> &mut Vec<VertexId> {
        let idx = self.node_idx();
        if self.raw.nodes[idx].unassigned_superset.is_none() {
            self.raw.nodes[idx].unassigned_superset = Some(Vec::new());
        }
        self.raw.nodes[idx].unassigned_superset.as_mut().unwrap()
    }

    pub fn domain(&self, pv: VertexId) -> &Bitset {
        &self.raw.domain_stacks[pv.index()].last().expect("domain stack never empty").1
    }

    pub fn domain_size(&self, pv: VertexId) -> usize {
        self.domain(pv).count()
    }

    pub fn domain_created_in_current_node(&self, pv: VertexId) -> bool {
        self.raw.domain_stacks[pv.index()].last().unwrap().0 == self.raw.current_node_index()
    }

    /// Delegates to [`NodesRawData::erase_impossible_assignment`]: lets a
    /// reducer's `check` erase a globally-impossible assignment without the
    /// caller needing to drop its accessor first.
    pub fn erase_impossible_assignment(&mut self, pv: VertexId, tv: VertexId) {
        self.raw.erase_impossible_assignment(pv, tv);
    }

    pub fn new_assignments(&self) -> &[(VertexId, VertexId)] {
        &self.raw.nodes[self.node_idx()].new_assignments
    }

    pub fn clear_new_assignments(&mut self) {
        let idx = self.node_idx();
        self.raw.nodes[idx].new_assignments.clear();
    }

    pub fn scalar_product(&self) -> Weight {
        self.raw.nodes[self.node_idx()].scalar_product
    }

    pub fn set_scalar_product(&mut self, value: Weight) -> &mut Self {
        let idx = self.node_idx();
        self.raw.nodes[idx].scalar_product = value;
        self
    }

    pub fn total_p_edge_weights(&self) -> Weight {
        self.raw.nodes[self.node_idx()].total_assigned_p_weight
    }

    pub fn set_total_p_edge_weights(&mut self, value: Weight) -> &mut Self {
        let idx = self.node_idx();
        self.raw.nodes[idx].total_assigned_p_weight = value;
        self
    }

    fn ensure_current_entry(&mut self, pv: VertexId) -> &mut Bitset {
        let current_idx = self.raw.current_node_index();
        let stack = &mut self.raw.domain_stacks[pv.index()];
        if stack.last().unwrap().0 != current_idx {
            let cloned = stack.last().unwrap().1.clone();
            stack.push((current_idx, cloned));
        }
        &mut stack.last_mut().unwrap().1
    }

    /// Replace `Dom(pv)` with `Dom(pv) ∩ mask`.
    ///
    /// The C++ original swaps `mask` into place to avoid a bitset copy;
    /// `fixedbitset`'s in-place `intersect_assign` gets the same effect
    /// without needing the swap dance, so this takes `mask` by shared
    /// reference instead.
    pub fn intersect_domain(&mut self, pv: VertexId, mask: &Bitset) -> IntersectionResult {
        let old_size = self.domain_size(pv);
        let entry = self.ensure_current_entry(pv);
        entry.intersect_assign(mask);
        self.finish_domain_write(pv, old_size)
    }

    /// Remove every vertex in `set` from `Dom(pv)`.
    pub fn subtract_from_domain(&mut self, pv: VertexId, set: &Bitset) -> IntersectionResult {
        let old_size = self.domain_size(pv);
        let entry = self.ensure_current_entry(pv);
        entry.subtract_assign(set);
        self.finish_domain_write(pv, old_size)
    }

    fn finish_domain_write(&mut self, pv: VertexId, old_size: usize) -> IntersectionResult {
        let new_size = self.domain_size(pv);
        let changed = new_size != old_size;
        let reduction_result = match new_size {
            0 => ReductionResult::NoGood,
            1 => {
                let tv = self.domain(pv).singleton().unwrap();
                let idx = self.node_idx();
                self.raw.nodes[idx].new_assignments.push((pv, tv));
                ReductionResult::NewAssignment
            }
            _ => ReductionResult::Success,
        };
        IntersectionResult {
            reduction_result,
            new_domain_size: new_size,
            changed,
        }
    }

    /// Starting at index `n_already_processed` in the current node's
    /// `new_assignments`, propagate alldiff: every subsequent assignment
    /// `(pv*, tv*)` erases `tv*` from every other domain. Assignments
    /// appended during this pass (because a domain fell to size 1 or 2) are
    /// themselves processed before returning. An integer cursor is used
    /// (not an iterator) because `new_assignments` grows while we walk it.
    ///
    /// Returns `false` (a nogood) the moment some other pattern vertex is
    /// already forced onto the same target vertex.
    pub fn alldiff_reduce_current_node(&mut self, mut n_processed: usize) -> bool {
        loop {
            let len = self.new_assignments().len();
            if n_processed >= len {
                return true;
            }
            let (pv_star, tv_star) = self.new_assignments()[n_processed];
            n_processed += 1;

            for i in 0..self.num_pattern_vertices() {
                let pv = VertexId::from(i);
                if pv == pv_star {
                    continue;
                }
                if !self.domain(pv).test(tv_star) {
                    continue;
                }
                let size = self.domain_size(pv);
                if size == 1 {
                    return false;
                } else if size == 2 {
                    let other = self.domain(pv).iter().find(|&v| v != tv_star).unwrap();
                    let entry = self.ensure_current_entry(pv);
                    entry.remove(tv_star);
                    let idx = self.node_idx();
                    self.raw.nodes[idx].new_assignments.push((pv, other));
                } else {
                    let entry = self.ensure_current_entry(pv);
                    entry.remove(tv_star);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsm_core::VertexId as V;

    fn domain(len: usize, members: &[u32]) -> Bitset {
        let mut b = Bitset::with_capacity(len);
        for &m in members {
            b.insert(V(m));
        }
        b
    }

    #[test]
    fn singleton_initial_domains_seed_new_assignments() {
        let raw = NodesRawData::new(vec![domain(4, &[0]), domain(4, &[0, 1, 2])]);
        assert_eq!(raw.num_pattern_vertices(), 2);
    }

    #[test]
    fn alldiff_propagates_singletons_and_detects_conflicts() {
        // pv0 forced to tv0; pv1 still has {0,1}; pv2 has {0,1,2}.
        let mut raw = NodesRawData::new(vec![domain(3, &[0]), domain(3, &[0, 1]), domain(3, &[0, 1, 2])]);
        let mut accessor = DomainsAccessor::new(&mut raw);
        assert!(accessor.alldiff_reduce_current_node(0));
        // pv1's domain should have dropped to {1}, itself now a forced
        // assignment that alldiff also had to chase down for pv2.
        assert_eq!(accessor.domain(V(1)).singleton(), Some(V(1)));
        assert_eq!(accessor.domain(V(2)).iter().collect::<Vec<_>>(), vec![V(2)]);
    }

    #[test]
    fn alldiff_detects_a_direct_conflict() {
        let mut raw = NodesRawData::new(vec![domain(2, &[0]), domain(2, &[0])]);
        let mut accessor = DomainsAccessor::new(&mut raw);
        assert!(!accessor.alldiff_reduce_current_node(0));
    }

    #[test]
    fn push_and_pop_node_restores_parent_domain() {
        let mut raw = NodesRawData::new(vec![domain(4, &[0, 1, 2, 3])]);
        raw.push_node(None);
        {
            let mut accessor = DomainsAccessor::new(&mut raw);
            let mask = domain(4, &[0, 1]);
            accessor.intersect_domain(V(0), &mask);
            assert_eq!(accessor.domain(V(0)).count(), 2);
        }
        raw.pop_node();
        let accessor = DomainsAccessor::new(&mut raw);
        assert_eq!(accessor.domain(V(0)).count(), 4);
    }
}
