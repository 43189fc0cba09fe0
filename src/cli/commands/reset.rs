//! Reset command - clear persisted state

use crate::cache::{CacheStorage, DiskCacheStorage};
use crate::cli::args::ResetArgs;
use crate::cli::CommandContext;
use crate::error::{StickyError, StickyResult};
use crate::store::{FileStore, KeyValueStore};
use crate::ui::{self, UiContext};
use std::io::ErrorKind;
use tokio::fs;
use tracing::{debug, info};

/// Execute the reset command
pub async fn execute(args: ResetArgs, ctx: &CommandContext) -> StickyResult<()> {
    let ui = UiContext::detect().with_auto_yes(args.yes);

    let prompt = format!("Clear all sticky state in {}?", ctx.paths.root().display());
    if !ui::confirm(&ui, &prompt, false).await? {
        ui::outro_warn(&ui, "Reset cancelled (pass --yes to confirm)");
        return Ok(());
    }

    FileStore::open(ctx.paths.storage_file())?.clear()?;
    ui::step_ok(&ui, "Cleared pinned versions and brick flag");

    let worker_file = ctx.paths.worker_file();
    match fs::remove_file(&worker_file).await {
        Ok(()) => ui::step_ok(&ui, "Removed worker registration"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(StickyError::io(format!("removing {}", worker_file.display()), e)),
    }

    if args.caches {
        let storage = DiskCacheStorage::new(ctx.paths.caches_dir());
        let prefix = &ctx.config.proxy.cache_prefix;
        for name in storage.names().await? {
            if !name.starts_with(prefix.as_str()) {
                debug!("Keeping foreign cache {}", name);
                continue;
            }
            storage.delete(&name).await?;
            ui::step_ok(&ui, &format!("Deleted generation {}", name));
        }
    }

    ctx.audit()
        .log(
            "state.reset",
            &serde_json::json!({ "caches": args.caches }),
        )
        .await;
    info!("State in {} reset", ctx.paths.root().display());
    ui::outro_success(&ui, "Reset complete");
    Ok(())
}
