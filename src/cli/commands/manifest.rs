//! Manifest command - hash a build directory

use crate::cli::args::{ManifestAction, ManifestArgs};
use crate::cli::CommandContext;
use crate::error::{StickyError, StickyResult};
use crate::integrity::DigestScheme;
use crate::manifest::Manifest;
use crate::ui::{self, UiContext};
use tokio::fs;

/// Execute the manifest command
pub async fn execute(args: ManifestArgs, ctx: &CommandContext) -> StickyResult<()> {
    match args.action {
        ManifestAction::Build {
            dir,
            output,
            scheme,
        } => {
            let scheme = scheme
                .map(DigestScheme::from)
                .unwrap_or(ctx.config.proxy.digest_scheme);
            let manifest = Manifest::build_from_dir(&dir, scheme)?;
            let json = manifest.to_json()?;

            match output {
                Some(path) => {
                    fs::write(&path, format!("{}\n", json))
                        .await
                        .map_err(|e| StickyError::io(format!("writing {}", path.display()), e))?;
                    let ui = UiContext::detect();
                    ui::step_ok_detail(
                        &ui,
                        &format!("Hashed {} files ({})", manifest.len(), scheme),
                        &path.display().to_string(),
                    );
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}
