//! `contexture assemble`: Flatten a composition tree.

use std::path::Path;

use crate::AssembleArgs;

pub async fn run(config: Option<&Path>, args: AssembleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(depth) = args.max_depth {
        config.assembly.max_depth = depth;
    }
    if let Some(tokens) = args.max_tokens {
        config.assembly.max_tokens = tokens;
    }
    if args.required_only {
        config.assembly.include_optional = false;
    }
    if args.no_headers {
        config.assembly.include_headers = false;
    }

    let service = super::open_service(&args.snapshot, config)?;
    let assembly = service.assemble(&args.root).await?;

    super::report(&assembly.diagnostics);
    tracing::info!(root = %assembly.root_id, tokens = assembly.tokens, "Assembly complete");
    println!("{}", assembly.text);
    Ok(())
}
