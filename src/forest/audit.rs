//! Whole-forest validation and bulk construction.
//!
//! [`SystemForest::add`] checks one ancestor chain per insertion. When systems are
//! loaded in bulk that check is skipped, so the finished forest is audited in a
//! single pass instead. The audit remembers every identifier already proven to
//! sit on an acyclic chain, which keeps it linear in the number of systems.

use ahash::AHashSet;
use itertools::Itertools;
use tracing::debug;

use super::{ForestError, SystemForest};
use crate::system::System;

impl<D> SystemForest<D> {
    /// Builds a forest without any validation.
    ///
    /// Later systems overwrite earlier ones with the same id. The result may
    /// contain cycles; run [`SystemForest::check_cycles`] before trusting it, or
    /// use [`SystemForest::from_systems`].
    pub fn from_systems_unchecked(systems: impl IntoIterator<Item = System<D>>) -> Self {
        let mut forest = SystemForest::new();
        forest.nodes = systems
            .into_iter()
            .map(|system| (system.id, system))
            .collect();
        forest.rebuild_children();
        forest
    }

    /// Builds a forest in bulk and audits it.
    pub fn from_systems(systems: impl IntoIterator<Item = System<D>>) -> Result<Self, ForestError> {
        let forest = Self::from_systems_unchecked(systems);
        forest.check_cycles()?;
        Ok(forest)
    }

    /// Reconstructs the child index from the stored systems.
    pub fn rebuild_children(&mut self) {
        self.children.clear();
        for system in self.nodes.values() {
            self.children
                .entry(system.parent)
                .or_default()
                .insert(system.id);
        }
    }

    /// Checks every parent chain in the forest for cycles.
    ///
    /// Systems are visited in ascending id order, so the reported cycle is the
    /// same from run to run.
    pub fn check_cycles(&self) -> Result<(), ForestError> {
        let mut done = AHashSet::with_capacity(self.nodes.len());

        for id in self.nodes.keys().copied().sorted() {
            if done.contains(&id) {
                continue;
            }
            let Some(system) = self.nodes.get(&id) else {
                continue;
            };
            if !system.is_valid() {
                return Err(ForestError::Cycle {
                    system: id,
                    through: id,
                });
            }

            let mut history = AHashSet::new();
            history.insert(id);
            let mut parent = system.parent;
            if done.contains(&parent) {
                done.insert(id);
                continue;
            }
            history.insert(parent);

            let mut current = self.nodes.get(&parent);
            while let Some(ancestor) = current {
                parent = ancestor.parent;
                if done.contains(&parent) {
                    break;
                }
                if !history.insert(parent) {
                    debug!(system = %id, through = %parent, "audit found a cycle");
                    return Err(ForestError::Cycle {
                        system: id,
                        through: parent,
                    });
                }
                current = self.nodes.get(&parent);
            }

            done.extend(history);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        forest::{ForestError, SystemForest},
        system::{System, SystemId},
    };

    #[test]
    fn bulk_load_detects_three_cycle() {
        let systems = [
            System::from_raw(22, 11, "aaa"),
            System::from_raw(55, 11, "cccc"),
            System::from_raw(33, 22, "bbb"),
            System::from_raw(222, 111, "xxxx"),
            System::from_raw(333, 222, "yyyy"),
            System::from_raw(44, 22, "dddd"),
            System::from_raw(11, 33, "dddd"),
        ];
        let err = SystemForest::from_systems(systems.clone()).unwrap_err();
        assert_eq!(
            err,
            ForestError::Cycle {
                system: SystemId(11),
                through: SystemId(11),
            }
        );
        assert!(err.is_cycle());

        let forest = SystemForest::from_systems_unchecked(systems);
        assert!(forest.check_cycles().is_err());
        assert_eq!(forest.len(), 7);
    }

    #[test]
    fn bulk_load_accepts_a_forest() {
        let forest = SystemForest::from_systems([
            System::from_raw(11, 0, "ffff"),
            System::from_raw(22, 11, "aaa"),
            System::from_raw(33, 22, "bbb"),
            System::from_raw(44, 22, "dddd"),
            System::from_raw(333, 222, "yyyy"),
            System::from_raw(222, 111, "xxxx"),
        ])
        .unwrap();

        assert_eq!(forest.len(), 6);
        assert_eq!(forest.children(SystemId(22)).len(), 2);
        assert_eq!(forest.depth(SystemId(44)).unwrap(), Some(3));
        assert_eq!(forest.roots().collect::<Vec<_>>(), vec![SystemId(0), SystemId(111)]);
    }

    #[test]
    fn audit_rejects_self_parent() {
        let forest = SystemForest::from_systems_unchecked([
            System::from_raw(1, 0, ()),
            System::from_raw(5, 5, ()),
        ]);
        assert_eq!(
            forest.check_cycles(),
            Err(ForestError::Cycle {
                system: SystemId(5),
                through: SystemId(5),
            })
        );
    }

    #[test]
    fn audit_reuses_verified_chains() {
        let mut systems = vec![System::from_raw(1, 0, ())];
        systems.extend((2..200).map(|i| System::from_raw(i, i - 1, ())));
        systems.push(System::from_raw(500, 150, ()));
        let forest = SystemForest::from_systems(systems).unwrap();
        assert_eq!(forest.depth(SystemId(199)).unwrap(), Some(199));
        assert_eq!(forest.height(SystemId(0)).unwrap(), Some(199));
    }

    #[test]
    fn rebuild_children_restores_the_index() {
        let mut forest =
            SystemForest::from_systems([System::from_raw(2, 1, ()), System::from_raw(3, 1, ())])
                .unwrap();
        forest.children.clear();
        assert!(forest.children(SystemId(1)).is_empty());
        forest.rebuild_children();
        assert_eq!(forest.children(SystemId(1)).len(), 2);
    }
}
