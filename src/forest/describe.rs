//! Level-by-level rendering of a forest for diagnostics.
//!
//! [`SystemForest::describe`] returns plain data; [`fmt::Display`] turns it into
//! text such as
//!
//! ```text
//! 0(root):[11]
//! ___ 11:[22, 55]
//! ___ ___ 22:[33, 44]
//! ___ ___ 55:[]
//! ```
//!
//! where every `___ ` marks one level below the root.

use std::fmt;

use ahash::AHashSet;
use itertools::Itertools;
use serde::Serialize;

use super::SystemForest;
use crate::system::SystemId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelEntry {
    pub parent: SystemId,
    pub children: Vec<SystemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeDescription {
    pub root: SystemId,
    /// `levels[0]` holds the root's own entry.
    pub levels: Vec<Vec<LevelEntry>>,
    /// Set when rendering met an identifier twice and stopped early.
    pub corrupted: Option<SystemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ForestDescription {
    pub trees: Vec<TreeDescription>,
}

impl<D> SystemForest<D> {
    /// Describes every tree hanging below a virtual anchor.
    ///
    /// Never fails: a corrupted tree is described up to the point where the
    /// corruption was found.
    pub fn describe(&self) -> ForestDescription {
        ForestDescription {
            trees: self.roots().map(|root| self.describe_tree(root)).collect(),
        }
    }

    fn describe_tree(&self, root: SystemId) -> TreeDescription {
        let mut levels = Vec::new();
        let mut seen = AHashSet::new();
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            let mut entries = Vec::with_capacity(frontier.len());
            let mut next = Vec::new();
            for &parent in &frontier {
                let children = self
                    .children
                    .get(&parent)
                    .map(|c| c.iter().copied().collect_vec())
                    .unwrap_or_default();
                if let Some(&revisited) = children
                    .iter()
                    .find(|&&child| child == root || !seen.insert(child))
                {
                    levels.push(entries);
                    return TreeDescription {
                        root,
                        levels,
                        corrupted: Some(revisited),
                    };
                }
                next.extend_from_slice(&children);
                entries.push(LevelEntry { parent, children });
            }
            levels.push(entries);
            frontier = next;
        }

        TreeDescription {
            root,
            levels,
            corrupted: None,
        }
    }
}

impl fmt::Display for TreeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, level) in self.levels.iter().enumerate() {
            for entry in level {
                if depth == 0 {
                    write!(f, "{}(root)", entry.parent)?;
                } else {
                    write!(f, "{}{}", "___ ".repeat(depth), entry.parent)?;
                }
                writeln!(f, ":[{}]", entry.children.iter().join(", "))?;
            }
        }
        if let Some(revisited) = self.corrupted {
            writeln!(f, "!! cycle below {} at {}", self.root, revisited)?;
        }
        Ok(())
    }
}

impl fmt::Display for ForestDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tree in &self.trees {
            write!(f, "{tree}")?;
        }
        Ok(())
    }
}

impl<D> fmt::Display for SystemForest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
