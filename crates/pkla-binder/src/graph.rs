//! Module registry, URI resolution and the `(module, context)` fact cache.

use crate::facts::{self, ModuleFacts};
use crate::loader::ModuleLoader;
use dashmap::DashMap;
use pkla_common::limits::MAX_GLOB_EXPANSION;
use pkla_common::Interner;
use pkla_syntax::SyntaxTree;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::ThreadId;
use tracing::trace;

/// Identity of one loaded module tree.
///
/// A `ModuleId` is allocated per `(uri, context)` resolution: the same URI
/// resolved under two different project contexts yields two distinct ids
/// when the loader serves different trees.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// Dependency-resolution scope key (a local project with pinned package
/// versions). `None` is the default, project-less context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PklProjectId(pub u32);

struct ModuleEntry {
    uri: Arc<str>,
    project: Option<PklProjectId>,
    tree: Arc<SyntaxTree>,
}

enum FactsSlot {
    /// Derivation in flight on the named thread. A second request from the
    /// same thread means reentrant derivation; a different thread simply
    /// recomputes (derivation is idempotent).
    Resolving(ThreadId),
    Resolved(Arc<ModuleFacts>),
}

/// The module graph.
///
/// Owns every cache derived from module resolution. Consumers receive
/// `Arc`s to immutable fact sets and never mutate cached results.
pub struct ModuleGraph {
    loader: Arc<dyn ModuleLoader>,
    interner: Arc<Interner>,
    resolutions: DashMap<(String, Option<PklProjectId>), Option<ModuleId>, FxBuildHasher>,
    entries: DashMap<ModuleId, Arc<ModuleEntry>, FxBuildHasher>,
    facts: DashMap<(ModuleId, Option<PklProjectId>), FactsSlot, FxBuildHasher>,
    next_id: AtomicU32,
    base_uri: RwLock<Option<String>>,
}

impl ModuleGraph {
    pub fn new(loader: Arc<dyn ModuleLoader>, interner: Arc<Interner>) -> Self {
        Self {
            loader,
            interner,
            resolutions: DashMap::with_hasher(FxBuildHasher),
            entries: DashMap::with_hasher(FxBuildHasher),
            facts: DashMap::with_hasher(FxBuildHasher),
            next_id: AtomicU32::new(0),
            base_uri: RwLock::new(None),
        }
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Designate the URI of the implicit base library module. It is loaded
    /// through the regular loader like any other module.
    pub fn set_base_module_uri(&self, uri: impl Into<String>) {
        *self.base_uri.write().unwrap_or_else(|e| e.into_inner()) = Some(uri.into());
    }

    pub fn base_module(&self, project: Option<PklProjectId>) -> Option<ModuleId> {
        let uri = self
            .base_uri
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()?;
        self.resolve_uri(&uri, project)
    }

    /// Resolve a module URI under a project context.
    ///
    /// Results (including misses) are cached per `(uri, context)`.
    pub fn resolve_uri(&self, uri: &str, project: Option<PklProjectId>) -> Option<ModuleId> {
        let key = (uri.to_string(), project);
        if let Some(cached) = self.resolutions.get(&key) {
            return *cached;
        }
        let resolved = self.loader.load(uri, project).map(|tree| {
            let id = ModuleId(self.next_id.fetch_add(1, Ordering::Relaxed));
            trace!(uri, module = id.0, "loaded module");
            self.entries.insert(
                id,
                Arc::new(ModuleEntry {
                    uri: Arc::from(uri),
                    project,
                    tree,
                }),
            );
            id
        });
        // Another thread may have resolved the same key concurrently; keep
        // the first id so identity stays stable.
        *self.resolutions.entry(key).or_insert(resolved)
    }

    /// Expand a glob URI pattern against the loader's URI universe.
    ///
    /// Returns the matched modules in sorted-URI order and whether the
    /// expansion was truncated by [`MAX_GLOB_EXPANSION`].
    pub fn resolve_glob(
        &self,
        pattern: &str,
        project: Option<PklProjectId>,
    ) -> (Vec<ModuleId>, bool) {
        let Ok(glob) = globset::Glob::new(pattern) else {
            return (Vec::new(), false);
        };
        let matcher = glob.compile_matcher();
        let mut uris: Vec<String> = self
            .loader
            .list_uris(project)
            .into_iter()
            .filter(|uri| matcher.is_match(uri.as_str()))
            .collect();
        uris.sort();
        let truncated = uris.len() > MAX_GLOB_EXPANSION;
        if truncated {
            uris.truncate(MAX_GLOB_EXPANSION);
        }
        let modules = uris
            .iter()
            .filter_map(|uri| self.resolve_uri(uri, project))
            .collect();
        (modules, truncated)
    }

    pub fn tree(&self, module: ModuleId) -> Option<Arc<SyntaxTree>> {
        self.entries.get(&module).map(|e| Arc::clone(&e.tree))
    }

    pub fn uri(&self, module: ModuleId) -> Option<Arc<str>> {
        self.entries.get(&module).map(|e| Arc::clone(&e.uri))
    }

    pub fn project_of(&self, module: ModuleId) -> Option<PklProjectId> {
        self.entries.get(&module).and_then(|e| e.project)
    }

    /// Derived facts for `(module, context)`, computing and caching them on
    /// first request. Total: an unknown module yields empty facts.
    pub fn facts(&self, module: ModuleId, project: Option<PklProjectId>) -> Arc<ModuleFacts> {
        let key = (module, project);
        if let Some(slot) = self.facts.get(&key) {
            match &*slot {
                FactsSlot::Resolved(facts) => return Arc::clone(facts),
                FactsSlot::Resolving(thread) if *thread == std::thread::current().id() => {
                    // Reentrant derivation on this thread; the chain walk in
                    // `facts::compute` reports the cycle itself, so return an
                    // empty sentinel rather than recursing forever.
                    return Arc::new(ModuleFacts::empty());
                }
                FactsSlot::Resolving(_) => {}
            }
        }
        self.facts
            .insert(key, FactsSlot::Resolving(std::thread::current().id()));
        let computed = Arc::new(facts::compute(self, module, project));
        self.facts
            .insert(key, FactsSlot::Resolved(Arc::clone(&computed)));
        computed
    }

    /// Drop every derived fact and resolution involving `module` (its tree
    /// changed). Dependents are dropped too: any fact set that recorded
    /// `module` in its dependency list is recomputed on next request.
    pub fn invalidate_module(&self, module: ModuleId) {
        self.facts.retain(|(subject, _), slot| {
            if *subject == module {
                return false;
            }
            match slot {
                FactsSlot::Resolved(f) => !f.dependencies.contains(&module),
                FactsSlot::Resolving(_) => true,
            }
        });
        if let Some((_, entry)) = self.entries.remove(&module) {
            self.resolutions
                .retain(|(uri, _), id| !(uri.as_str() == &*entry.uri && *id == Some(module)));
        }
    }

    /// Drop every cache entry keyed by `project` (its dependency pinning
    /// changed).
    pub fn invalidate_project(&self, project: PklProjectId) {
        self.facts.retain(|(_, ctx), _| *ctx != Some(project));
        self.resolutions.retain(|(_, ctx), _| *ctx != Some(project));
    }
}
