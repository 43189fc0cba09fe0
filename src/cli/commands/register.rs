//! Register command - pin and register the worker script

use crate::cli::args::RegisterArgs;
use crate::cli::CommandContext;
use crate::error::StickyResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the register command
pub async fn execute(args: RegisterArgs, ctx: &CommandContext) -> StickyResult<()> {
    let ui = UiContext::detect();
    let mut config = ctx.config.clone();
    if args.no_update_check {
        config.proxy.check_updates = false;
    }
    let ctx = CommandContext::new(config, ctx.config_path.clone(), ctx.paths.clone());

    let session = ctx.worker(&args.script).await?;
    let mut spinner = TaskSpinner::new(&ui);
    spinner.start(&format!("Registering {}", args.script));

    let result = session.coordinator.register().await;
    session.finish().await?;
    let registration = match result {
        Ok(registration) => registration,
        Err(e) => {
            spinner.stop_error("Registration failed");
            return Err(e);
        }
    };

    match &registration.version {
        Some(version) => spinner.stop(&format!("Pinned version {}", version)),
        None => spinner.stop("Registered unpinned (development mode)"),
    }
    ui::key_value(&ui, "script", registration.script_url.as_str());

    if let Some(update) = &registration.update {
        ui::step_warn_hint(
            &ui,
            &format!("Update available: {} -> {}", update.current, update.latest),
            &format!("Run: sticky update {}", args.script),
        );
    }
    Ok(())
}
