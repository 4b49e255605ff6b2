//! Upward and downward walks over a [`SystemForest`].
//!
//! Both directions are iterative. A walk that comes back to an identifier it has
//! already seen means the forest was corrupted behind the back of
//! [`SystemForest::add`]; it is reported as [`ForestError::InvariantViolation`]
//! instead of looping forever.

use std::collections::BTreeMap;

use ahash::AHashSet;
use tracing::error;

use super::{ForestError, SystemForest};
use crate::system::{System, SystemId};

// --- Ancestors Iterator ---

/// Iterates the stored ancestors of a system, nearest first.
///
/// Stops at the first identifier without a system (a root or virtual anchor).
/// Yields a single `Err` and then ends if an identifier repeats.
pub struct Ancestors<'a, D> {
    forest: &'a SystemForest<D>,
    origin: SystemId,
    next: Option<SystemId>,
    seen: AHashSet<SystemId>,
}

impl<'a, D> Ancestors<'a, D> {
    fn new(forest: &'a SystemForest<D>, origin: SystemId, first: SystemId) -> Self {
        let mut seen = AHashSet::new();
        seen.insert(origin);
        Ancestors {
            forest,
            origin,
            next: Some(first),
            seen,
        }
    }
}

impl<'a, D> Iterator for Ancestors<'a, D> {
    type Item = Result<&'a System<D>, ForestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        if !self.seen.insert(id) {
            return Some(Err(ForestError::InvariantViolation {
                start: self.origin,
                revisited: id,
            }));
        }
        let system = self.forest.nodes.get(&id)?;
        self.next = Some(system.parent);
        Some(Ok(system))
    }
}

// --- Bounded BFS ---

/// The systems reachable below a starting identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree<'a, D> {
    pub start: SystemId,
    pub systems: BTreeMap<SystemId, &'a System<D>>,
    /// Identifiers reached at each depth below `start`; `by_level[0]` are the
    /// direct children. Never contains an empty level.
    pub by_level: Vec<Vec<SystemId>>,
}

impl<D> Subtree<'_, D> {
    /// Number of levels actually traversed.
    pub fn levels(&self) -> usize {
        self.by_level.len()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.contains_key(&id)
    }
}

impl<D> SystemForest<D> {
    /// Stored ancestors of `id`, starting with its parent.
    ///
    /// Empty if `id` is not stored or its parent is a root.
    pub fn ancestors(&self, id: SystemId) -> Ancestors<'_, D> {
        let mut ancestors = Ancestors::new(self, id, id);
        ancestors.next = self.nodes.get(&id).map(|system| system.parent);
        ancestors
    }

    /// Ancestors a system with identifier `origin` would have below `first`.
    pub(crate) fn ancestors_from(&self, origin: SystemId, first: SystemId) -> Ancestors<'_, D> {
        Ancestors::new(self, origin, first)
    }

    /// Breadth-first walk below `start`, at most `max_depth` levels deep.
    ///
    /// A `max_depth` of `0` means unbounded.
    pub fn subtree(&self, start: SystemId, max_depth: usize) -> Result<Subtree<'_, D>, ForestError> {
        let max_depth = if max_depth == 0 {
            usize::MAX
        } else {
            max_depth
        };

        let mut systems = BTreeMap::new();
        let mut by_level: Vec<Vec<SystemId>> = Vec::new();
        let mut seen = AHashSet::new();
        let mut frontier = vec![start];

        while by_level.len() < max_depth {
            let mut next = Vec::new();
            for parent in &frontier {
                for &child in self.children.get(parent).into_iter().flatten() {
                    if child == start || !seen.insert(child) {
                        error!(start = %start, parent = %parent, child = %child, "cycle in child index");
                        return Err(ForestError::InvariantViolation {
                            start,
                            revisited: child,
                        });
                    }
                    if let Some(system) = self.nodes.get(&child) {
                        systems.insert(child, system);
                    }
                    next.push(child);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier.clone_from(&next);
            by_level.push(next);
        }

        Ok(Subtree {
            start,
            systems,
            by_level,
        })
    }

    /// Length of the path from `id` up to its root.
    ///
    /// A system whose parent is not stored has depth 1; a virtual anchor has depth
    /// 0. `None` if `id` is unknown.
    pub fn depth(&self, id: SystemId) -> Result<Option<usize>, ForestError> {
        if !self.nodes.contains_key(&id) {
            return Ok(self.children.contains_key(&id).then_some(0));
        }
        let mut depth = 1;
        for ancestor in self.ancestors(id) {
            if let Err(err) = ancestor {
                error!(system = %id, "{err}");
                return Err(err);
            }
            depth += 1;
        }
        Ok(Some(depth))
    }

    /// Length of the longest path from `id` down to a leaf. Leaves have height 0.
    pub fn height(&self, id: SystemId) -> Result<Option<usize>, ForestError> {
        if self.anchor(id).is_none() {
            return Ok(None);
        }
        Ok(Some(self.subtree(id, 0)?.levels()))
    }
}
