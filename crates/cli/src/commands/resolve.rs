//! `contexture resolve`: Resolve dependencies and print the result as JSON.

use std::path::Path;

use crate::ResolveArgs;

pub async fn run(config: Option<&Path>, args: ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(depth) = args.max_depth {
        config.resolution.max_depth = depth;
    }
    if args.recommendations {
        config.resolution.include_recommendations = true;
    }
    if let Some(strength) = args.min_strength {
        if !(0.0..=1.0).contains(&strength) {
            return Err(format!("--min-strength must be between 0.0 and 1.0, got {strength}").into());
        }
        config.resolution.min_recommendation_strength = strength;
    }

    let service = super::open_service(&args.snapshot, config)?;
    let result = service.resolve(&args.seeds).await?;

    super::report(&result.diagnostics);
    for conflict in &result.conflicts {
        tracing::warn!(
            fragment = %conflict.fragment_id,
            with = ?conflict.conflicts_with,
            "Conflicting fragments resolved together"
        );
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
