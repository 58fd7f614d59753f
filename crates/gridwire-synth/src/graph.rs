use rustc_hash::FxHashMap;

use gridwire_common::Location;
use gridwire_parse::Formula;

use crate::error::SynthError;

/// Collect every location a formula references, resolving sheet-less
/// ranges against the cell holding the formula.
pub fn collect_refs(holder: &Location, ast: &Formula, out: &mut Vec<Location>) {
    match ast {
        Formula::Literal(_) => {}
        Formula::Range(range) => out.extend(range.locations(&holder.sheet)),
        Formula::Array(rows) => {
            for elem in rows.iter().flatten() {
                collect_refs(holder, elem, out);
            }
        }
        Formula::Binary { left, right, .. } => {
            collect_refs(holder, left, out);
            collect_refs(holder, right, out);
        }
        Formula::Call { args, .. } => {
            for arg in args {
                collect_refs(holder, arg, out);
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Formula-to-formula dependency edges for one compilation.
///
/// Every cell is a register, so a reference cycle would not deadlock the
/// hardware, but it would mean a reduction retriggers itself forever and
/// the sheet never settles. Cycles are rejected up front, before any
/// register is wired.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: FxHashMap<Location, Vec<Location>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn insert(&mut self, holder: Location, references: Vec<Location>) {
        self.edges.insert(holder, references);
    }

    /// Depth-first search over the formula nodes; cells without formulas
    /// are leaves and cannot extend a cycle. Returns the cycle path
    /// (first location repeated at the end) on failure.
    pub fn check_cycles(&self) -> Result<(), SynthError> {
        let mut marks: FxHashMap<&Location, Mark> = FxHashMap::default();
        let mut roots: Vec<&Location> = self.edges.keys().collect();
        roots.sort();

        for root in roots {
            if marks.contains_key(root) {
                continue;
            }
            // Explicit stack of (node, next-child index); the stack is also
            // the current path, which makes cycle reporting cheap.
            let mut stack: Vec<(&Location, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::Visiting);

            while let Some((node, child_idx)) = stack.last_mut() {
                let deps = &self.edges[*node];
                if *child_idx >= deps.len() {
                    marks.insert(*node, Mark::Done);
                    stack.pop();
                    continue;
                }
                let child = &deps[*child_idx];
                *child_idx += 1;

                if !self.edges.contains_key(child) {
                    continue; // leaf: a free cell, not a formula
                }
                match marks.get(child) {
                    Some(Mark::Visiting) => {
                        let start = stack
                            .iter()
                            .position(|(n, _)| *n == child)
                            .unwrap_or(0);
                        let mut path: Vec<Location> =
                            stack[start..].iter().map(|(n, _)| (*n).clone()).collect();
                        path.push(child.clone());
                        return Err(SynthError::CircularReference(path));
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, 0));
                    }
                }
            }
        }
        Ok(())
    }
}
