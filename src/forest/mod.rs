//! An index over [`System`] records that never contains a parent cycle.
//!
//! [`SystemForest`] keeps two views of the same set of systems:
//!
//! *   a flat map from [`SystemId`] to the owned [`System`], and
//! *   an adjacency map from a parent identifier to the identifiers of its direct
//!     children.
//!
//! A parent identifier may appear in the adjacency map without a system of its
//! own. Such an identifier is a *virtual anchor*: the root of whatever hangs below
//! it. [`Anchor`] makes the distinction explicit.
//!
//! Every mutation goes through [`SystemForest::add`] and [`SystemForest::delete`],
//! which keep both views consistent and reject any insertion that would close a
//! cycle. Forests built in bulk are validated by the global audit in [`audit`].
//!
//! Traversals ([`traversal`]) and diagnostics ([`describe`]) are read only.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::system::{System, SystemId};

pub mod audit;
pub mod describe;
pub mod traversal;


/// What [`SystemForest::add`] does with a system identical to the one already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Emit a warning and report [`AddOutcome::Unchanged`].
    #[default]
    Ignore,
    /// Fail with [`ForestError::Duplicate`].
    Reject,
}

/// Errors that can occur during forest operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError {
    #[error("adding system {system} closes a parent cycle at {through}")]
    Cycle { system: SystemId, through: SystemId },
    #[error("system {0} does not exist")]
    NotFound(SystemId),
    #[error("system {0} is already present with identical contents")]
    Duplicate(SystemId),
    #[error("forest is corrupted: traversal from {start} revisited {revisited}")]
    InvariantViolation {
        start: SystemId,
        revisited: SystemId,
    },
}

impl ForestError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, ForestError::Cycle { .. })
    }

    /// True when the forest itself is broken, as opposed to a rejected input.
    pub fn is_corruption(&self) -> bool {
        matches!(self, ForestError::InvariantViolation { .. })
    }
}

/// Result of a successful [`SystemForest::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome<D> {
    Inserted,
    /// A different system with the same id was removed first.
    Replaced(System<D>),
    /// An identical system was already present; nothing changed.
    Unchanged,
}

/// What an identifier names inside a forest.
#[derive(Debug, PartialEq, Eq)]
pub enum Anchor<'a, D> {
    System(&'a System<D>),
    /// Has children registered under it but no system of its own.
    Virtual(SystemId),
}

impl<D> Clone for Anchor<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Anchor<'_, D> {}

impl<'a, D> Anchor<'a, D> {
    pub fn id(&self) -> SystemId {
        match self {
            Anchor::System(system) => system.id,
            Anchor::Virtual(id) => *id,
        }
    }

    pub fn system(&self) -> Option<&'a System<D>> {
        match self {
            Anchor::System(system) => Some(system),
            Anchor::Virtual(_) => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Anchor::Virtual(_))
    }
}

/// An acyclic forest of systems.
///
/// The forest exclusively owns every system it stores. Callers only ever get
/// shared references back; replacing a system is done by adding a new one with
/// the same id.
#[derive(Debug, Clone)]
pub struct SystemForest<D> {
    pub(crate) nodes: AHashMap<SystemId, System<D>>,
    /// Parent id to direct children. Buckets are never removed once created.
    pub(crate) children: AHashMap<SystemId, BTreeSet<SystemId>>,
    duplicate_policy: DuplicatePolicy,
}

impl<D> Default for SystemForest<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> SystemForest<D> {
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    pub fn with_policy(duplicate_policy: DuplicatePolicy) -> Self {
        SystemForest {
            nodes: AHashMap::new(),
            children: AHashMap::new(),
            duplicate_policy,
        }
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    pub fn set_duplicate_policy(&mut self, duplicate_policy: DuplicatePolicy) {
        self.duplicate_policy = duplicate_policy;
    }

    /// Number of systems stored. Virtual anchors are not counted.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: SystemId) -> Option<&System<D>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All systems in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &System<D>> + '_ {
        self.nodes.values().sorted_by_key(|system| system.id)
    }

    /// Resolves `id` to a stored system or a virtual anchor.
    ///
    /// Returns `None` when `id` is neither stored nor has ever had children.
    pub fn anchor(&self, id: SystemId) -> Option<Anchor<'_, D>> {
        match self.nodes.get(&id) {
            Some(system) => Some(Anchor::System(system)),
            None if self.children.contains_key(&id) => Some(Anchor::Virtual(id)),
            None => None,
        }
    }

    /// Every virtual anchor, i.e. every root of the forest, in ascending id order.
    pub fn roots(&self) -> impl Iterator<Item = SystemId> + '_ {
        self.children
            .keys()
            .copied()
            .filter(|id| !self.nodes.contains_key(id))
            .sorted()
    }

    /// Direct children of `id`, empty if it has none.
    pub fn children(&self, id: SystemId) -> BTreeMap<SystemId, &System<D>> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.nodes.get(child).map(|system| (*child, system)))
            .collect()
    }

    /// Removes a system. Its children stay where they are, now hanging below the
    /// virtual anchor `id`.
    pub fn delete(&mut self, id: SystemId) -> Result<System<D>, ForestError> {
        let system = self.nodes.remove(&id).ok_or(ForestError::NotFound(id))?;
        if let Some(siblings) = self.children.get_mut(&system.parent) {
            siblings.remove(&id);
        }
        debug!(system = %id, parent = %system.parent, "deleted system");
        Ok(system)
    }

    /// Walks the ancestors `system` would have and fails if the walk comes back to
    /// `system.id` or repeats itself.
    fn check_ancestors(&self, system: &System<D>) -> Result<(), ForestError> {
        if !system.is_valid() {
            return Err(ForestError::Cycle {
                system: system.id,
                through: system.id,
            });
        }
        for ancestor in self.ancestors_from(system.id, system.parent) {
            if let Err(ForestError::InvariantViolation { revisited, .. }) = ancestor {
                return Err(ForestError::Cycle {
                    system: system.id,
                    through: revisited,
                });
            }
        }
        Ok(())
    }

    fn insert_unchecked(&mut self, system: System<D>) {
        self.children
            .entry(system.parent)
            .or_default()
            .insert(system.id);
        self.nodes.insert(system.id, system);
    }
}

impl<D: PartialEq> SystemForest<D> {
    /// Inserts `system`, replacing any different system with the same id.
    ///
    /// Fails with [`ForestError::Cycle`] if the new parent link would close a
    /// cycle; the forest is left untouched in that case, including any system it
    /// would have replaced.
    pub fn add(&mut self, system: System<D>) -> Result<AddOutcome<D>, ForestError> {
        if system.is_valid() && self.nodes.get(&system.id) == Some(&system) {
            return match self.duplicate_policy {
                DuplicatePolicy::Ignore => {
                    warn!(system = %system.id, parent = %system.parent, "re-added identical system");
                    Ok(AddOutcome::Unchanged)
                }
                DuplicatePolicy::Reject => Err(ForestError::Duplicate(system.id)),
            };
        }

        if let Err(err) = self.check_ancestors(&system) {
            debug!(system = %system.id, parent = %system.parent, "rejected system: {err}");
            return Err(err);
        }

        let outcome = match self.delete(system.id) {
            Ok(old) => AddOutcome::Replaced(old),
            Err(_) => AddOutcome::Inserted,
        };
        debug!(system = %system.id, parent = %system.parent, "added system");
        self.insert_unchecked(system);
        Ok(outcome)
    }
}
