//! Update command - check for and apply a newer worker script

use crate::cli::args::UpdateArgs;
use crate::cli::CommandContext;
use crate::error::StickyResult;
use crate::ui::{self, UiContext};
use crate::worker::UpdateCoordinator;

/// Execute the update command
pub async fn execute(args: UpdateArgs, ctx: &CommandContext) -> StickyResult<()> {
    let ui = UiContext::detect().with_auto_yes(args.yes);
    let session = ctx.worker(&args.script).await?;

    let outcome = update(&args, &ui, &session.coordinator).await;
    session.finish().await?;
    outcome
}

async fn update(
    args: &UpdateArgs,
    ui: &UiContext,
    coordinator: &UpdateCoordinator,
) -> StickyResult<()> {
    let Some(update) = coordinator.check_for_update().await? else {
        ui::step_ok(ui, "Worker is up to date");
        return Ok(());
    };

    let summary = format!("{} -> {}", update.current, update.latest);
    if args.check {
        ui::step_warn_hint(
            ui,
            &format!("Update available: {}", summary),
            &format!("Run: sticky update {} --yes", args.script),
        );
        return Ok(());
    }

    if !ui::confirm(ui, &format!("Apply worker update {}?", summary), false).await? {
        ui::remark(ui, "Update not applied (pass --yes to apply)");
        return Ok(());
    }

    if coordinator.apply_update(&update).await? {
        ui::outro_success(ui, &format!("Worker updated {}", summary));
    } else {
        ui::step_info(ui, "Nothing to do: no active worker or already updated");
    }
    Ok(())
}
