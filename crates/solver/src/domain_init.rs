use wsm_core::{Bitset, Graph, NearNeighbours, VertexId};

/// Two-stage domain seeding: degree-sequence compatibility, then distance
/// counts out to `max_path_length`. Returns `None` if any `Dom(pv)` ends up
/// empty (the problem is trivially infeasible).
pub fn initialise_domains(
    pattern_graph: &Graph,
    pattern_nn: &mut NearNeighbours,
    target_graph: &Graph,
    target_nn: &mut NearNeighbours,
    max_path_length: usize,
) -> Option<Vec<Bitset>> {
    let num_pv = pattern_graph.num_vertices();
    let num_tv = target_graph.num_vertices();
    let mut domains: Vec<Bitset> = Vec::with_capacity(num_pv);

    // Stage A: degree-sequence compatibility.
    for pv_idx in 0..num_pv {
        let pv = VertexId::from(pv_idx);
        let p_seq = pattern_graph.sorted_degree_sequence(pv);
        let mut dom = Bitset::with_capacity(num_tv);
        for tv_idx in 0..num_tv {
            let tv = VertexId::from(tv_idx);
            if pattern_graph.degree(pv) > target_graph.degree(tv) {
                continue;
            }
            let t_seq = target_graph.sorted_degree_sequence(tv);
            if sequence_dominated(&p_seq, &t_seq) {
                dom.insert(tv);
            }
        }
        if dom.is_empty() {
            return None;
        }
        domains.push(dom);
    }

    // Stage B: distance-count reduction.
    for d in 2..=max_path_length {
        for pv_idx in 0..num_pv {
            let pv = VertexId::from(pv_idx);
            let n_p = pattern_nn.at_distance(pv, d).count();
            if n_p == 0 {
                continue;
            }
            let survivors: Vec<VertexId> = domains[pv_idx]
                .iter()
                .filter(|&tv| {
                    let n_t = target_nn.up_to_distance(tv, d).count();
                    n_p <= n_t
                })
                .collect();
            let mut new_dom = Bitset::with_capacity(num_tv);
            for tv in survivors {
                new_dom.insert(tv);
            }
            if new_dom.is_empty() {
                return None;
            }
            domains[pv_idx] = new_dom;
        }
    }

    Some(domains)
}

/// Is the sorted sequence `p_seq` dominated by `t_seq`: is there a strictly
/// increasing index map `g` with `p_seq[i] <= t_seq[g(i)]` for all `i`?
///
/// Walked greedily: advance a pointer into `t_seq` to the next entry `>=`
/// the current pattern entry; fail as soon as the remaining target suffix
/// is shorter than the remaining pattern suffix (it cannot possibly supply
/// enough distinct slots).
pub fn sequence_dominated(p_seq: &[usize], t_seq: &[usize]) -> bool {
    if p_seq.len() > t_seq.len() {
        return false;
    }
    let mut t_pos = 0;
    for (i, &p_val) in p_seq.iter().enumerate() {
        let remaining_p = p_seq.len() - i;
        if t_seq.len() - t_pos < remaining_p {
            return false;
        }
        match t_seq[t_pos..].binary_search(&p_val) {
            Ok(offset) => t_pos += offset,
            Err(offset) => {
                if t_pos + offset >= t_seq.len() {
                    return false;
                }
                t_pos += offset;
            }
        }
        t_pos += 1;
    }
    true
}
