//! Status command - pinned versions, active worker and cache generations

use crate::cache::{CacheStorage, DiskCacheStorage};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::CommandContext;
use crate::error::{StickyError, StickyResult};
use crate::store::{FileStore, VersionState, VersionStore};
use crate::ui::{self, UiContext};
use crate::worker::{Version, WorkerInstallation};
use serde::Serialize;
use std::sync::Arc;
use tokio::fs;

#[derive(Debug, Serialize)]
struct Status {
    state_dir: String,
    versions: VersionState,
    worker: Option<WorkerInstallation>,
    generations: Vec<String>,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, ctx: &CommandContext) -> StickyResult<()> {
    let store = Arc::new(FileStore::open(ctx.paths.storage_file())?);
    let versions = VersionStore::new(store, &ctx.config.proxy.key_prefix).state()?;

    let worker_file = ctx.paths.worker_file();
    let worker = if worker_file.exists() {
        let content = fs::read_to_string(&worker_file)
            .await
            .map_err(|e| StickyError::io("reading worker record", e))?;
        serde_json::from_str(&content)?
    } else {
        None
    };

    let generations = DiskCacheStorage::new(ctx.paths.caches_dir())
        .names()
        .await?
        .into_iter()
        .filter(|name| name.starts_with(&ctx.config.proxy.cache_prefix))
        .collect();

    let status = Status {
        state_dir: ctx.paths.root().display().to_string(),
        versions,
        worker,
        generations,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Table => print_table(&status),
    }
    Ok(())
}

fn version_or_dash(version: Option<&Version>) -> String {
    version.map_or_else(|| "-".to_string(), ToString::to_string)
}

fn print_table(status: &Status) {
    let ui = UiContext::detect();
    ui::intro(&ui, "Sticky Status");

    ui::key_value(&ui, "state", &status.state_dir);
    ui::key_value(
        &ui,
        "current version",
        &version_or_dash(status.versions.current_version.as_ref()),
    );
    ui::key_value(
        &ui,
        "pending version",
        &version_or_dash(status.versions.pending_version.as_ref()),
    );
    ui::key_value_status(
        &ui,
        "bricked",
        if status.versions.bricked { "yes" } else { "no" },
        !status.versions.bricked,
    );

    let worker = status
        .worker
        .as_ref()
        .map_or_else(|| "-".to_string(), |w| format!("{} ({})", w.script_url, w.state));
    ui::key_value(&ui, "worker", &worker);

    if status.generations.is_empty() {
        ui::key_value(&ui, "generations", "-");
    } else {
        ui::key_value(&ui, "generations", &status.generations.join(", "));
    }

    if status.versions.bricked {
        ui::step_error(
            &ui,
            "Tampering was detected; run `sticky reset --yes` once the origin is trusted",
        );
    }
}
