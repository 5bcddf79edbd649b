use super::load_snapshot;

pub fn ports(snapshot: &str, format: &str) -> anyhow::Result<()> {
    let snapshot = load_snapshot(snapshot)?;
    let ctx = snapshot.context();

    let declared = ctx.resolved_ports();
    let open = ctx.open_ports();
    let image = ctx.image_exposed_ports();

    match format {
        "json" => {
            let report = serde_json::json!({
                "process": ctx.process.guid,
                "type": ctx.process.process_type,
                "lifecycle": ctx.lifecycle_kind(),
                "package_state": ctx.package_state(),
                "declared": declared,
                "open": open,
                "image_exposed": image,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "process {} ({}, {} lifecycle, {})",
                ctx.process.guid,
                ctx.process.process_type,
                ctx.lifecycle_kind().as_str(),
                ctx.package_state().as_str()
            );
            println!("  declared:      {}", join(declared.as_deref().unwrap_or_default()));
            println!("  open:          {}", join(&open));
            println!("  image exposed: {}", join(&image));
        }
    }
    Ok(())
}

pub(crate) fn join(ports: &[u16]) -> String {
    if ports.is_empty() {
        return "-".to_string();
    }
    ports.iter().map(u16::to_string).collect::<Vec<_>>().join(", ")
}
