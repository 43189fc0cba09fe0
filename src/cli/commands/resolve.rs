//! Resolve command - show which manifest entry serves a path

use crate::cli::args::ResolveArgs;
use crate::cli::CommandContext;
use crate::error::{StickyError, StickyResult};
use crate::resolve::Resolver;
use std::sync::Arc;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, ctx: &CommandContext) -> StickyResult<()> {
    let manifest = Arc::new(ctx.manifest(&args.manifest).await?);
    let resolver = Resolver::new(manifest, &ctx.config.proxy.fallback_rules);

    let candidates = resolver.candidates(&args.path);
    if candidates.is_empty() {
        return Err(StickyError::User(format!(
            "No manifest entry serves {}",
            args.path
        )));
    }

    let shown = if args.all { candidates.len() } else { 1 };
    for candidate in candidates.iter().take(shown) {
        println!(
            "{}\t{}\t{}",
            candidate.path,
            candidate.rule,
            candidate.integrity.token()
        );
    }
    Ok(())
}
