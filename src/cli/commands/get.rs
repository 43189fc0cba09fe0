//! Get command - fetch one URL through the verifying cache

use crate::cli::args::GetArgs;
use crate::cli::context::parse_url;
use crate::cli::CommandContext;
use crate::error::{StickyError, StickyResult};
use crate::net::CacheMode;
use std::io::Write;
use tokio::fs;
use tracing::info;

/// Execute the get command
pub async fn execute(args: GetArgs, ctx: &CommandContext) -> StickyResult<()> {
    let url = parse_url(&args.url)?;
    let origin = parse_url(&url.origin().ascii_serialization())?;
    let proxy = ctx.proxy(origin, &args.manifest).await?;

    let mode = if args.reload {
        CacheMode::Reload
    } else {
        CacheMode::Default
    };

    let response = proxy.handle(&url, mode).await.ok_or_else(|| {
        StickyError::User(format!("{} is not listed in the manifest", url))
    })??;
    info!("{} verified ({} bytes)", url, response.body.len());

    match args.output {
        Some(path) => fs::write(&path, &response.body)
            .await
            .map_err(|e| StickyError::io(format!("writing {}", path.display()), e)),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|_| stdout.flush())
                .map_err(|e| StickyError::io("writing to stdout", e))
        }
    }
}
