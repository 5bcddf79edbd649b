use procgrid_model::ResolverConfig;
use procgrid_resolver::{ValidationInput, validate_input};

use super::load_snapshot;

pub fn validate(snapshot: &str, format: &str, config: &ResolverConfig) -> anyhow::Result<()> {
    let snapshot = load_snapshot(snapshot)?;
    let ctx = snapshot.context();

    let input = ValidationInput::new(ctx.process, config)
        .with_app(ctx.app)
        .with_package(ctx.latest_package())
        .with_scopes(snapshot.organization.as_ref(), snapshot.space.as_ref());
    let result = validate_input(&input);

    match format {
        "json" => {
            let violations = match &result {
                Ok(()) => serde_json::json!([]),
                Err(errors) => serde_json::to_value(errors)?,
            };
            let report = serde_json::json!({
                "process": ctx.process.guid,
                "valid": result.is_ok(),
                "violations": violations,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => match &result {
            Ok(()) => println!("✓ process {} is valid", ctx.process.guid),
            Err(errors) => {
                println!("✗ process {} is invalid", ctx.process.guid);
                for v in errors.violations() {
                    println!("  {}: {}", v.field, v.violation);
                }
            }
        },
    }

    if let Err(errors) = result {
        anyhow::bail!("{} violation(s)", errors.len());
    }
    Ok(())
}
