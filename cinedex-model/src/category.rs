//! Category tree shared by the crawler and the read API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: i64,
    pub pid: i64,
    pub name: String,
    /// Hidden nodes are kept for id resolution but never listed.
    pub show: bool,
    #[serde(default)]
    pub children: Vec<CategoryNode>,
}

/// Two-level category tree as published by master sites. Refreshed on
/// every master collection, stored once under a fixed hot-store key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTree {
    pub categories: Vec<CategoryNode>,
}

impl CategoryTree {
    /// Build the tree from the flat `(id, pid, name)` class list the
    /// upstream probe returns. Entries with `pid == 0` become top-level
    /// categories; everything else hangs off its parent.
    pub fn from_entries(entries: &[(i64, i64, String)]) -> Self {
        let mut categories: Vec<CategoryNode> = entries
            .iter()
            .filter(|(_, pid, _)| *pid == 0)
            .map(|(id, pid, name)| CategoryNode {
                id: *id,
                pid: *pid,
                name: name.clone(),
                show: true,
                children: Vec::new(),
            })
            .collect();
        for (id, pid, name) in entries.iter().filter(|(_, pid, _)| *pid != 0) {
            if let Some(parent) = categories.iter_mut().find(|c| c.id == *pid) {
                parent.children.push(CategoryNode {
                    id: *id,
                    pid: *pid,
                    name: name.clone(),
                    show: true,
                    children: Vec::new(),
                });
            }
        }
        Self { categories }
    }

    pub fn find(&self, id: i64) -> Option<&CategoryNode> {
        for c in &self.categories {
            if c.id == id {
                return Some(c);
            }
            if let Some(sub) = c.children.iter().find(|s| s.id == id) {
                return Some(sub);
            }
        }
        None
    }

    /// Visible nodes in listing order: each shown parent followed by its
    /// shown children.
    pub fn shown(&self) -> Vec<&CategoryNode> {
        let mut out = Vec::new();
        for c in &self.categories {
            if !c.show {
                continue;
            }
            out.push(c);
            out.extend(c.children.iter().filter(|s| s.show));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
