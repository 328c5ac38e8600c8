//! Declarative controllers loaded from `<root>/<controllers>/<name>.yaml`.
//!
//! A manifest declares routes, hooks and action names; the bodies of the
//! actions come from an [`ActionLibrary`] populated in code. Actions the
//! library does not know fall back to the echo action, so a manifest alone
//! is enough to stand up a working controller.
//!
//! ```yaml
//! routes:
//!   - { verb: any, pattern: "/ping/*/*/:id", action: ping }
//!   - { verb: get, pattern: "/feed.?:format?", action: index }
//! restful:
//!   except: destroy
//! before:
//!   - { hook: authenticate, except: [index, show] }
//! after:
//!   - { hook: audit }
//! actions: [index, show, ping]
//! helpers: [authenticate, audit]
//! ```
//!
//! Files are re-read when their modification time moves forward; each
//! read builds a brand-new [`ControllerDef`], so hooks and routes removed
//! from the file are gone after the reload.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use super::registry::ControllerRegistry;
use super::{ActionFn, Controller, ControllerBuilder, ControllerDef, HookScope};
use crate::echo::echo_action;
use crate::error::ActionResult;
use crate::router::{PatternError, Verb};

/// Extensions probed for a manifest, in order.
pub const MANIFEST_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// A single value or a list of values.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteEntry {
    #[serde(default = "default_verb")]
    pub verb: String,
    pub pattern: String,
    pub action: String,
}

fn default_verb() -> String {
    "any".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ScopeEntry {
    #[serde(default)]
    pub only: Option<OneOrMany>,
    #[serde(default)]
    pub except: Option<OneOrMany>,
}

impl ScopeEntry {
    fn to_scope(&self) -> HookScope {
        HookScope {
            only: self.only.clone().map(OneOrMany::into_vec),
            except: self.except.clone().map(OneOrMany::into_vec).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HookEntry {
    pub hook: String,
    #[serde(flatten)]
    pub scope: ScopeEntry,
}

/// Parsed manifest file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
    #[serde(default)]
    pub restful: Option<ScopeEntry>,
    #[serde(default)]
    pub before: Vec<HookEntry>,
    #[serde(default)]
    pub after: Vec<HookEntry>,
    /// Public actions.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Private actions, usable as named hooks only.
    #[serde(default)]
    pub helpers: Vec<String>,
}

impl Manifest {
    /// Parse YAML text.
    ///
    /// # Errors
    ///
    /// Returns the `serde_yaml` error for malformed documents.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// Action bodies available to manifests, keyed `controller#action` or
/// plain `action`.
#[derive(Default, Clone)]
pub struct ActionLibrary {
    actions: HashMap<String, ActionFn>,
}

impl ActionLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: impl Into<String>, handler: F)
    where
        F: Fn(&mut Controller) -> ActionResult + Send + Sync + 'static,
    {
        self.actions.insert(key.into(), Arc::new(handler));
    }

    /// `controller#action` first, then `action`.
    #[must_use]
    pub fn lookup(&self, controller: &str, action: &str) -> Option<ActionFn> {
        self.actions
            .get(&format!("{controller}#{action}"))
            .or_else(|| self.actions.get(action))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for ActionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.actions.keys().collect();
        keys.sort();
        f.debug_struct("ActionLibrary").field("actions", &keys).finish()
    }
}

#[derive(Debug)]
pub enum ManifestError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_yaml::Error },
    Pattern { path: PathBuf, source: PatternError },
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, source } => {
                write!(f, "cannot read manifest {}: {source}", path.display())
            }
            ManifestError::Parse { path, source } => {
                write!(f, "invalid manifest {}: {source}", path.display())
            }
            ManifestError::Pattern { path, source } => {
                write!(f, "invalid route in {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io { source, .. } => Some(source),
            ManifestError::Parse { source, .. } => Some(source),
            ManifestError::Pattern { source, .. } => Some(source),
        }
    }
}

/// Build a definition from a parsed manifest.
///
/// # Errors
///
/// [`PatternError`] for an unknown verb or a pattern that does not compile.
pub fn build_controller(
    name: &str,
    manifest: &Manifest,
    library: &ActionLibrary,
) -> Result<ControllerDef, PatternError> {
    let mut builder = ControllerBuilder::new(name);

    for route in &manifest.routes {
        let verb: Verb = route.verb.parse()?;
        builder = builder.route(verb, route.pattern.as_str(), route.action.as_str());
    }
    if let Some(scope) = &manifest.restful {
        builder = builder.restful(scope.to_scope());
    }
    for hook in &manifest.before {
        builder = builder.before(hook.hook.as_str(), hook.scope.to_scope());
    }
    for hook in &manifest.after {
        builder = builder.after(hook.hook.as_str(), hook.scope.to_scope());
    }

    let declared = manifest
        .actions
        .iter()
        .map(|a| (a, true))
        .chain(manifest.helpers.iter().map(|a| (a, false)));
    for (action, public) in declared {
        let handler = library.lookup(name, action).unwrap_or_else(|| {
            debug!(controller = %name, action = %action, "No library action, using echo");
            Arc::new(echo_action)
        });
        builder = builder.action_entry(action.as_str(), handler, public);
    }

    builder.build()
}

/// Loads manifests from one directory into a [`ControllerRegistry`],
/// re-reading a file only when its modification time has moved forward.
pub struct ManifestLoader {
    dir: PathBuf,
    library: Arc<ActionLibrary>,
    registry: Arc<ControllerRegistry>,
    // name -> mtime of the file last loaded; also serializes loads
    loaded: Mutex<HashMap<String, SystemTime>>,
}

impl ManifestLoader {
    pub fn new(
        dir: impl Into<PathBuf>,
        library: Arc<ActionLibrary>,
        registry: Arc<ControllerRegistry>,
    ) -> Self {
        Self {
            dir: dir.into(),
            library,
            registry,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First existing `<dir>/<name>.<ext>`.
    #[must_use]
    pub fn manifest_path(&self, name: &str) -> Option<PathBuf> {
        MANIFEST_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
    }

    /// Make sure the registry holds the current version of `name`.
    ///
    /// Returns `Ok(false)` when there is no manifest for `name` (the
    /// registry entry, if any, came from code and is left alone).
    ///
    /// # Errors
    ///
    /// [`ManifestError`] when the file cannot be read, parsed or compiled.
    /// The previously loaded definition stays registered in that case.
    pub fn refresh(&self, name: &str) -> Result<bool, ManifestError> {
        let Some(path) = self.manifest_path(name) else {
            return Ok(false);
        };
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|source| ManifestError::Io {
                path: path.clone(),
                source,
            })?;

        let mut loaded = self.loaded.lock();
        let fresh = loaded
            .get(name)
            .is_some_and(|seen| modified <= *seen && self.registry.get(name).is_some());
        if fresh {
            return Ok(true);
        }

        let reloading = loaded.contains_key(name);
        let def = self.load_file(name, &path)?;
        self.registry.register(def);
        loaded.insert(name.to_string(), modified);
        info!(
            controller = %name,
            path = %path.display(),
            reloaded = reloading,
            "Controller manifest loaded"
        );
        Ok(true)
    }

    /// Read, parse and build one manifest file.
    ///
    /// # Errors
    ///
    /// [`ManifestError`] on I/O, YAML or pattern failures.
    pub fn load_file(&self, name: &str, path: &Path) -> Result<ControllerDef, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Manifest::from_yaml(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        build_controller(name, &manifest, &self.library).map_err(|source| {
            ManifestError::Pattern {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Load every manifest in the directory. Broken files are logged and
    /// skipped; the names that loaded are returned.
    pub fn load_all(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Controllers directory not readable");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| is_manifest(p))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        names.dedup();

        names
            .into_iter()
            .filter(|name| match self.refresh(name) {
                Ok(found) => found,
                Err(e) => {
                    warn!(controller = %name, error = %e, "Controller manifest failed to load");
                    false
                }
            })
            .collect()
    }

    /// Controller name a changed path belongs to, if it is a manifest in
    /// this loader's directory.
    #[must_use]
    pub fn controller_for_path(&self, path: &Path) -> Option<String> {
        if !is_manifest(path) {
            return None;
        }
        let parent = path.parent()?;
        if parent != self.dir.as_path()
            && std::fs::canonicalize(parent).ok() != std::fs::canonicalize(&self.dir).ok()
        {
            return None;
        }
        path.file_stem()?.to_str().map(str::to_string)
    }

    /// Forget a manifest whose file went away.
    pub fn unload(&self, name: &str) -> bool {
        let mut loaded = self.loaded.lock();
        if loaded.remove(name).is_none() {
            return false;
        }
        self.registry.remove(name);
        info!(controller = %name, "Controller manifest unloaded");
        true
    }
}

impl fmt::Debug for ManifestLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestLoader")
            .field("dir", &self.dir)
            .field("library", &self.library)
            .finish_non_exhaustive()
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e))
}
