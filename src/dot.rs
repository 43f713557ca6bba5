use std::collections::HashMap;
use std::fmt::Write;

use crate::node::{NodeId, Nodes};

/// Render the node graph as Graphviz dot, for debugging.
///
/// Nodes are labelled in traversal order so the output is stable across runs
/// regardless of arena key assignment.
#[allow(unused)]
pub(crate) fn print_dot<O>(nodes: &Nodes<O>, root: NodeId) -> String {
    let mut buf = String::new();

    writeln!(buf, "digraph {{").unwrap();
    writeln!(buf, "node [shape=record];").unwrap();

    // Assign stable names in pre-order.
    let mut names: HashMap<NodeId, usize> = HashMap::new();
    let mut queue = vec![root];
    while let Some(id) = queue.pop() {
        let next = names.len();
        names.entry(id).or_insert(next);
        let mut children: Vec<_> = nodes[id]
            .entries()
            .iter()
            .filter_map(|e| e.child())
            .collect();
        children.reverse();
        queue.extend(children);
    }

    let mut ordered: Vec<_> = names.iter().map(|(&id, &name)| (name, id)).collect();
    ordered.sort_unstable();

    for (name, id) in ordered {
        let n = &nodes[id];
        writeln!(
            buf,
            r#"n{} [label="{} | entries: {} | lhv: {} | mbr: {:?}"];"#,
            name,
            if n.leaf() { "leaf" } else { "node" },
            n.entries().len(),
            n.lhv(),
            n.mbr().map(|r| (r.lo().0, r.hi().0)),
        )
        .unwrap();

        for child in n.entries().iter().filter_map(|e| e.child()) {
            writeln!(buf, "n{} -> n{};", name, names[&child]).unwrap();
        }
    }

    writeln!(buf, "}}").unwrap();

    buf
}
