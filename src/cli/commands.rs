use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::app::App;
use crate::config::Settings;
use crate::controller::ActionLibrary;
use crate::hot_reload::watch_controllers;
use crate::server::{HttpServer, ServerHandle};

/// Command-line interface for dio
#[derive(Parser, Debug)]
#[command(name = "dio")]
#[command(version, about = "Pattern router and controller dispatch server", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that loads an application.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AppArgs {
    /// Application root (views/, public/, controllers/)
    #[arg(short, long, env = "DIO_ROOT")]
    pub root: Option<PathBuf>,

    /// YAML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the application over HTTP
    Serve {
        #[command(flatten)]
        app: AppArgs,

        /// Listen address, `host:port`
        #[arg(long)]
        addr: Option<String>,

        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Reload controller manifests as soon as they change on disk
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
    /// Print the route table of a controller, in match order
    Routes {
        /// Controller name (manifest file stem)
        controller: String,

        #[command(flatten)]
        app: AppArgs,
    },
    /// Load every controller manifest and report the broken ones
    Check {
        #[command(flatten)]
        app: AppArgs,
    },
}

/// Run the parsed command line.
///
/// # Errors
///
/// Configuration, manifest and bind failures.
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            app,
            addr,
            workers,
            watch,
        } => {
            let mut settings = load_settings(&app)?;
            if let Some(addr) = addr {
                apply_addr(&mut settings, &addr)?;
            }
            if let Some(workers) = workers {
                settings.workers = workers.max(1);
            }
            serve(settings, watch)
        }
        Commands::Routes { controller, app } => {
            let app = manifest_app(load_settings(&app)?);
            let def = app
                .controller(&controller)
                .map_err(|e| anyhow!("{}: {}", e.kind(), e.message()))?;
            for line in def.router().describe_routes() {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Check { app } => {
            let app = manifest_app(load_settings(&app)?);
            let Some(loader) = app.loader() else {
                return Ok(());
            };
            let loaded = loader.load_all();
            let mut broken = 0usize;
            for entry in std::fs::read_dir(loader.dir())
                .with_context(|| format!("reading {}", loader.dir().display()))?
                .filter_map(Result::ok)
            {
                let Some(name) = loader.controller_for_path(&entry.path()) else {
                    continue;
                };
                if loaded.contains(&name) {
                    println!("ok      {name}");
                } else if let Err(e) = loader.refresh(&name) {
                    println!("broken  {name}: {e}");
                    broken += 1;
                }
            }
            if broken > 0 {
                bail!("{broken} controller manifest(s) failed to load");
            }
            Ok(())
        }
    }
}

fn load_settings(args: &AppArgs) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(root) = &args.root {
        settings.root.clone_from(root);
    }
    Ok(settings)
}

fn manifest_app(settings: Settings) -> App {
    App::new(settings).with_manifests(ActionLibrary::new())
}

/// Split `host:port` into the settings; a bare `:port` keeps the host.
fn apply_addr(settings: &mut Settings, addr: &str) -> Result<()> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("address must be host:port, got {addr:?}"))?;
    settings.port = port
        .parse()
        .with_context(|| format!("invalid port in {addr:?}"))?;
    if !host.is_empty() {
        settings.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    }
    Ok(())
}

fn serve(settings: Settings, watch: bool) -> Result<()> {
    let addr = settings.addr();
    let app = manifest_app(settings);
    let mut _watcher = None;
    if let Some(loader) = app.loader() {
        let loaded = loader.load_all();
        info!(controllers = ?loaded, "Controllers loaded");
        if watch {
            _watcher = Some(watch_controllers(Arc::clone(loader))?);
        }
    }
    for name in app.registry().names() {
        if let Some(def) = app.registry().get(&name) {
            def.router().dump_routes();
        }
    }

    let handle = HttpServer(Arc::new(app))
        .start(addr.as_str())
        .with_context(|| format!("binding {addr}"))?;
    wait_for_shutdown(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown requested");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|e| anyhow!("HTTP worker panicked: {e:?}"))
}

#[cfg(test)]
pub(super) fn addr_for_test(addr: &str) -> Result<Settings> {
    let mut s = Settings::default();
    apply_addr(&mut s, addr)?;
    Ok(s)
}
