//! Module loading service.
//!
//! The engine performs no I/O. A host supplies a [`ModuleLoader`] that
//! materializes already-parsed syntax trees for URI strings; the graph only
//! caches and derives facts from what the loader hands back.

use crate::graph::PklProjectId;
use dashmap::DashMap;
use pkla_syntax::SyntaxTree;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// Host-supplied URI resolution service.
///
/// `load` returns the parsed tree for one URI, or `None` when the URI does
/// not resolve under the given project context. `list_uris` enumerates the
/// URIs the loader could serve under a context; the graph matches glob
/// import patterns against this list.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, uri: &str, project: Option<PklProjectId>) -> Option<Arc<SyntaxTree>>;

    fn list_uris(&self, project: Option<PklProjectId>) -> Vec<String> {
        let _ = project;
        Vec::new()
    }
}

/// In-memory loader backed by a URI map.
///
/// Hosts that already hold parsed trees (and every test in this workspace)
/// register them here. Project-specific registrations shadow default ones,
/// modeling dependency pinning: the same URI can map to different trees in
/// different projects.
pub struct MemoryLoader {
    default: DashMap<String, Arc<SyntaxTree>, FxBuildHasher>,
    by_project: DashMap<(PklProjectId, String), Arc<SyntaxTree>, FxBuildHasher>,
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            default: DashMap::with_hasher(FxBuildHasher),
            by_project: DashMap::with_hasher(FxBuildHasher),
        }
    }

    pub fn register(&self, uri: impl Into<String>, tree: Arc<SyntaxTree>) {
        self.default.insert(uri.into(), tree);
    }

    pub fn register_for_project(
        &self,
        project: PklProjectId,
        uri: impl Into<String>,
        tree: Arc<SyntaxTree>,
    ) {
        self.by_project.insert((project, uri.into()), tree);
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, uri: &str, project: Option<PklProjectId>) -> Option<Arc<SyntaxTree>> {
        if let Some(project) = project {
            if let Some(tree) = self.by_project.get(&(project, uri.to_string())) {
                return Some(Arc::clone(&tree));
            }
        }
        self.default.get(uri).map(|t| Arc::clone(&t))
    }

    fn list_uris(&self, project: Option<PklProjectId>) -> Vec<String> {
        let mut uris: Vec<String> = self.default.iter().map(|e| e.key().clone()).collect();
        if let Some(project) = project {
            for entry in self.by_project.iter() {
                let (p, uri) = entry.key();
                if *p == project && !uris.contains(uri) {
                    uris.push(uri.clone());
                }
            }
        }
        uris.sort();
        uris
    }
}
