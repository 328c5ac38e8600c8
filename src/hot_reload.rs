//! # Hot Reload
//!
//! Requests already pick up edited manifests lazily (the loader compares
//! modification times on every lookup). The watcher here makes the change
//! visible before the next request arrives and reports broken files as
//! soon as they are saved.
//!
//! ```rust,ignore
//! let watcher = dio::hot_reload::watch_controllers(loader.clone())?;
//! // keep `watcher` alive for as long as reloading should happen
//! ```
//!
//! A file that fails to load is logged and the previous definition keeps
//! serving. Deleting a manifest unregisters its controller.

use notify::event::RemoveKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::controller::ManifestLoader;

/// Watch the loader's directory and refresh controllers whose manifest
/// changes.
///
/// # Errors
///
/// Any `notify` error creating the watcher or watching the directory.
pub fn watch_controllers(loader: Arc<ManifestLoader>) -> notify::Result<RecommendedWatcher> {
    let dir = loader.dir().to_path_buf();
    let watched = Arc::clone(&loader);

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => apply_event(&watched, &event),
            Err(e) => warn!(error = %e, "hot-reload: watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(dir = %dir.display(), "hot-reload: watching controller manifests");
    Ok(watcher)
}

fn apply_event(loader: &ManifestLoader, event: &Event) {
    let removed = matches!(event.kind, EventKind::Remove(RemoveKind::File | RemoveKind::Any));
    if !removed && !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return;
    }

    for path in &event.paths {
        let Some(name) = loader.controller_for_path(path) else {
            continue;
        };
        if removed || !path.exists() {
            // a rename away shows up as Modify(Name) on the old path
            if loader.manifest_path(&name).is_none() {
                loader.unload(&name);
            }
            continue;
        }
        match loader.refresh(&name) {
            Ok(_) => debug!(controller = %name, "hot-reload: controller up to date"),
            Err(e) => warn!(controller = %name, error = %e, "hot-reload: keeping previous definition"),
        }
    }
}
