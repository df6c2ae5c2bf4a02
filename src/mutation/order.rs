//! Declaration ordering.
//!
//! Keeps every declaration after the declarations it depends on. Each block
//! is sorted on its own: an edge between two nodes becomes a constraint
//! between the two members of their lowest common block that contain
//! them. The sort is Kahn's algorithm with ties broken by current
//! position, so an order that already satisfies every constraint is left
//! alone and unrelated members keep their relative order. Members caught in
//! a reference cycle are collapsed first and move together.
//!
//! A path through a reference (`alias.k`) also puts the reference before
//! the origin. Edges between parts of one declaration, such as two
//! elements of the same list, add no constraint: moving elements would
//! change the value, so such an edge may point forward.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::graph::PropertyGraph;
use crate::model::*;

/// Sort every block of `file`. Returns true when anything moved.
pub(crate) fn reorder_file(graph: &mut PropertyGraph, file: FileId) -> bool {
    let constraints = collect_constraints(graph, file);
    let mut blocks: Vec<&BlockId> = constraints.keys().collect();
    blocks.sort();

    let mut changed = false;
    for &block in blocks {
        let Some(members) = graph.blocks.get(&block).map(|b| b.members.clone()) else { continue };
        let Some(pairs) = constraints.get(&block) else { continue };
        let sorted = stable_topological(&members, pairs, block);
        if sorted != members {
            if let Some(b) = graph.blocks.get_mut(&block) {
                b.members = sorted;
            }
            changed = true;
        }
    }

    if changed {
        graph.renumber(file);
        debug!(file = file.0, "declarations reordered");
    }
    changed
}

/// `(before, after)` member pairs per block.
fn collect_constraints(graph: &PropertyGraph, file: FileId) -> HashMap<BlockId, Vec<(Member, Member)>> {
    let mut out: HashMap<BlockId, Vec<(Member, Member)>> = HashMap::new();
    let mut edges: Vec<&DependencyEdge> = graph.edges.values().collect();
    edges.sort_by_key(|e| e.id);

    for edge in edges {
        let origin = edge.origin;
        for target in edge.bound_nodes() {
            if target == origin || graph.is_ancestor(target, origin) || graph.is_ancestor(origin, target) {
                continue;
            }
            let same_file = [origin, target].iter().all(|id| graph.nodes.get(id).is_some_and(|n| n.file == file));
            if !same_file {
                continue;
            }
            let (Some(from), Some(to)) = (member_chain(graph, origin), member_chain(graph, target)) else { continue };

            // First level where the two chains part. Both start at the file
            // root, so the block there is shared. Identical chains mean one
            // declaration holds both ends.
            if let Some((o, t)) = from.iter().zip(to.iter()).find(|(o, t)| o != t) {
                out.entry(o.0).or_default().push((t.1, o.1));
            }
        }
    }
    out
}

/// `(block, member)` pairs from the file root down to the member holding
/// `id`.
fn member_chain(graph: &PropertyGraph, id: NodeId) -> Option<Vec<(BlockId, Member)>> {
    let (mut block, top) = graph.top_member(id)?;
    let mut chain = vec![(block, Member::Node(top))];
    while let Some(parent) = graph.blocks.get(&block)?.parent {
        chain.push((parent, Member::Block(block)));
        block = parent;
    }
    chain.reverse();
    Some(chain)
}

fn stable_topological(members: &[Member], constraints: &[(Member, Member)], block: BlockId) -> Vec<Member> {
    let position: HashMap<Member, usize> = members.iter().enumerate().map(|(i, &m)| (m, i)).collect();
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); members.len()];
    let mut seen = HashSet::new();
    for &(before, after) in constraints {
        let (Some(&b), Some(&a)) = (position.get(&before), position.get(&after)) else { continue };
        if b != a && seen.insert((b, a)) {
            succ[b].push(a);
        }
    }

    // Members of one cycle move as a unit and keep their relative order.
    let comp = strongly_connected(&succ);
    let count = comp.iter().max().map_or(0, |&c| c + 1);
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, &c) in comp.iter().enumerate() {
        groups[c].push(i);
    }
    let cyclic = groups.iter().filter(|g| g.len() > 1).count();
    if cyclic > 0 {
        warn!(block = block.0, cycles = cyclic, "reference cycle, members keep their current order");
    }

    let mut in_degree = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut linked = HashSet::new();
    for (b, targets) in succ.iter().enumerate() {
        for &a in targets {
            let (cb, ca) = (comp[b], comp[a]);
            if cb != ca && linked.insert((cb, ca)) {
                in_degree[ca] += 1;
                dependents[cb].push(ca);
            }
        }
    }

    // Kahn, smallest current position first.
    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = (0..count)
        .filter(|&c| in_degree[c] == 0)
        .map(|c| Reverse((groups[c][0], c)))
        .collect();
    let mut order = Vec::with_capacity(members.len());
    while let Some(Reverse((_, c))) = ready.pop() {
        order.extend(groups[c].iter().copied());
        for &d in &dependents[c] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push(Reverse((groups[d][0], d)));
            }
        }
    }

    order.into_iter().map(|i| members[i]).collect()
}

/// Tarjan's algorithm. Returns a component number per vertex.
fn strongly_connected(succ: &[Vec<usize>]) -> Vec<usize> {
    struct Tarjan<'a> {
        succ: &'a [Vec<usize>],
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next: usize,
        comp: Vec<usize>,
        comps: usize,
    }

    fn visit(t: &mut Tarjan<'_>, v: usize) {
        t.index[v] = Some(t.next);
        t.low[v] = t.next;
        t.next += 1;
        t.stack.push(v);
        t.on_stack[v] = true;

        let succ = t.succ;
        for &w in &succ[v] {
            match t.index[w] {
                None => {
                    visit(t, w);
                    t.low[v] = t.low[v].min(t.low[w]);
                }
                Some(iw) if t.on_stack[w] => t.low[v] = t.low[v].min(iw),
                Some(_) => {}
            }
        }

        if t.index[v] == Some(t.low[v]) {
            while let Some(w) = t.stack.pop() {
                t.on_stack[w] = false;
                t.comp[w] = t.comps;
                if w == v {
                    break;
                }
            }
            t.comps += 1;
        }
    }

    let n = succ.len();
    let mut t = Tarjan {
        succ,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next: 0,
        comp: vec![0; n],
        comps: 0,
    };
    for v in 0..n {
        if t.index[v].is_none() {
            visit(&mut t, v);
        }
    }
    t.comp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::tree::{Declaration, ElementValue, FileTree};
    use pretty_assertions::assert_eq;

    fn names(g: &PropertyGraph, block: BlockId) -> Vec<String> {
        g.blocks[&block].members.iter().map(|&m| g.member_name(m).unwrap().to_string()).collect()
    }

    fn load(decls: Vec<Declaration>) -> PropertyGraph {
        PropertyGraph::load(vec![FileTree::build("build.gradle", decls)], ModelConfig::default()).unwrap()
    }

    #[test]
    fn test_forward_reference_moves_target_up() {
        let mut g = load(vec![
            Declaration::property("a", 1),
            Declaration::property("b", ElementValue::expr("d")),
            Declaration::property("c", 3),
            Declaration::property("d", 4),
        ]);
        let root = g.files[0].root;
        assert!(reorder_file(&mut g, FileId(0)));
        assert_eq!(names(&g, root), vec!["a", "c", "d", "b"]);
        assert!(!reorder_file(&mut g, FileId(0)));
    }

    #[test]
    fn test_satisfied_order_is_untouched() {
        let mut g = load(vec![
            Declaration::property("x", 1),
            Declaration::property("y", ElementValue::expr("x")),
            Declaration::property("z", "${y}"),
        ]);
        assert!(!reorder_file(&mut g, FileId(0)));
    }

    #[test]
    fn test_cross_block_constraint_uses_common_block() {
        let mut g = load(vec![
            Declaration::block("android", vec![Declaration::property("version", "${v}")]),
            Declaration::block("ext", vec![Declaration::property("v", "1.0")]),
        ]);
        let root = g.files[0].root;
        assert!(reorder_file(&mut g, FileId(0)));
        assert_eq!(names(&g, root), vec!["ext", "android"]);
    }

    #[test]
    fn test_reference_on_a_path_comes_first() {
        let mut g = load(vec![
            Declaration::property("b", ElementValue::expr("a.k")),
            Declaration::property("m", ElementValue::map([("k", 1)])),
            Declaration::property("a", ElementValue::expr("m")),
            Declaration::property("t", 0),
        ]);
        let root = g.files[0].root;
        assert!(reorder_file(&mut g, FileId(0)));
        assert_eq!(names(&g, root), vec!["m", "a", "b", "t"]);
    }

    #[test]
    fn test_elements_of_one_list_keep_their_positions() {
        let mut g = load(vec![
            Declaration::property("l", ElementValue::list(["${l[1]}", "x"])),
            Declaration::property("t", 0),
        ]);
        let root = g.files[0].root;
        let node = |g: &PropertyGraph, q: &str| g.nodes.keys().copied().find(|&id| g.qualified_name(id) == q).unwrap();
        let (first, second, t) = (node(&g, "l[0]"), node(&g, "l[1]"), node(&g, "t"));
        let edge = g.nodes[&first].dependencies[0];
        assert_eq!(g.edges[&edge].target, Some(second));

        g.set_value(t, ElementValue::from(1)).unwrap();
        assert_eq!(names(&g, root), vec!["l", "t"]);
        assert_eq!(g.nodes[&node(&g, "l")].children, vec![first, second]);
        assert!(g.nodes[&second].source_order_index > g.nodes[&first].source_order_index);
        assert_eq!(g.resolve(first), Value::String("x".into()));
    }

    #[test]
    fn test_cycle_keeps_order() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let mut g = load(vec![
            Declaration::property("p", "${q}"),
            Declaration::property("q", "${p}"),
            Declaration::property("r", 1),
        ]);
        assert!(!reorder_file(&mut g, FileId(0)));
    }

    #[test]
    fn test_cycle_moves_as_a_unit() {
        let m = |i: u64| Member::Node(NodeId(i));
        let members = vec![m(1), m(2), m(3), m(4)];
        // 2 <-> 4 form a cycle that must come after 3.
        let sorted = stable_topological(&members, &[(m(2), m(4)), (m(4), m(2)), (m(3), m(2))], BlockId(0));
        assert_eq!(sorted, vec![m(1), m(3), m(2), m(4)]);
    }

    #[test]
    fn test_stable_topological_ties_by_position() {
        let m = |i: u64| Member::Node(NodeId(i));
        let members = vec![m(1), m(2), m(3), m(4)];
        let sorted = stable_topological(&members, &[(m(4), m(1)), (m(3), m(2))], BlockId(0));
        assert_eq!(sorted, vec![m(3), m(2), m(4), m(1)]);
    }
}
