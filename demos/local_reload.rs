//! Reloading a local YAML file, accepting one edit and rejecting another.
//!
//! Run with: cargo run --example local_reload
//! Set RUST_LOG=cloud_reload=debug for the library's own logging.

use cloud_reload::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, Serialize, Clone)]
struct AppConfig {
    name: String,
    level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cloud_reload=info")),
        )
        .init();

    println!("=== Local Reload Example ===\n");

    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("cfg.yaml");
    std::fs::write(&path, "name: svc1\nlevel: info\n")?;

    let request = ConfigurationRequest::builder()
        .with_local_file(&path)
        .with_policy(SourcePolicy::Local)
        .with_dynamic_reload(true)
        .build()?;
    let config: CloudConfig<AppConfig> = CloudConfig::init(request).await?;
    println!("Initial: {:?}", config.get_current_config());

    let (tx, mut rx) = mpsc::unbounded_channel();
    config
        .register_change_callback(move |cfg: &AppConfig| {
            let accept = cfg.level != "trace";
            let _ = tx.send((cfg.clone(), accept));
            accept
        })
        .await?;

    println!("\n--- Switching to debug ---");
    std::fs::write(&path, "name: svc1\nlevel: debug\n")?;
    if let Some((cfg, accepted)) = rx.recv().await {
        println!("Callback saw {:?}, accepted: {}", cfg, accepted);
    }
    println!("Current: {:?}", config.get_current_config());

    println!("\n--- Switching to trace (rejected) ---");
    std::fs::write(&path, "name: svc1\nlevel: trace\n")?;
    if let Some((cfg, accepted)) = rx.recv().await {
        println!("Callback saw {:?}, accepted: {}", cfg, accepted);
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("Current: {:?}", config.get_current_config());
    println!("File now reads:\n{}", std::fs::read_to_string(&path)?);
    println!("Still watching: {}", config.is_watching());

    println!("\n--- Debug view ---");
    let view = config.debug_view();
    println!("{} ({})", view.render_current()?, view.content_type());
    println!("level = {}", view.render_key("level")?);

    config.shutdown().await;
    Ok(())
}
