//! Precache command - fetch and verify a whole deployment

use crate::cli::args::PrecacheArgs;
use crate::cli::context::parse_url;
use crate::cli::CommandContext;
use crate::error::StickyResult;
use crate::ui::{self, PrecacheProgress, UiContext};

/// Execute the precache command
pub async fn execute(args: PrecacheArgs, ctx: &CommandContext) -> StickyResult<()> {
    let ui = UiContext::detect();
    let origin = parse_url(&args.origin)?;
    let proxy = ctx.proxy(origin, &args.manifest).await?;

    let progress = PrecacheProgress::new(&ui, proxy.generations().name(), proxy.manifest().len());
    let result = proxy.install(|path, ok| progress.entry(path, ok)).await;
    progress.finish();
    let report = result?;

    ui::step_ok_detail(
        &ui,
        &format!("Verified {} entries", report.entries),
        &report.generation,
    );

    if args.keep_stale {
        ui::remark(&ui, "Keeping older generations (--keep-stale)");
        return Ok(());
    }

    let deleted = proxy.activate().await?;
    for name in &deleted {
        ui::step_info(&ui, &format!("Deleted stale generation {}", name));
    }
    ui::outro_success(&ui, &format!("Generation {} is active", report.generation));
    Ok(())
}
