use procgrid_lifecycle::{ArtifactRef, build_desired_state, env_overrides};
use procgrid_model::ResolverConfig;

use super::load_snapshot;
use super::ports::join;

pub fn desire(snapshot: &str, format: &str, config: &ResolverConfig) -> anyhow::Result<()> {
    let snapshot = load_snapshot(snapshot)?;
    let desired = build_desired_state(&snapshot.context(), config)?;

    match format {
        "json" => println!("{}", desired.to_json_pretty()?),
        _ => {
            println!("lrp {} (version {})", desired.guid, snapshot.process.version);
            match &desired.artifact {
                Some(ArtifactRef::Image { image, .. }) => println!("  image:      {image}"),
                Some(ArtifactRef::Droplet { guid, .. }) => println!("  droplet:    {guid}"),
                None => println!("  artifact:   -"),
            }
            println!("  instances:  {}", desired.instances);
            println!("  ports:      {}", join(&desired.ports));
            println!("  user:       {}", desired.run_as_user);
            println!("  command:    {}", desired.start_command);
            for (name, value) in env_overrides(&desired) {
                println!("  env:        {name}={value}");
            }
        }
    }
    Ok(())
}
