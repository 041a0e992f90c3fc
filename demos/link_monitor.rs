//! Studio link monitor
//!
//! Connects to every studio in a configuration file, prints decoded events
//! and meter payloads as they arrive, and periodically prints pool and
//! notify statistics.
//!
//! Run with: cargo run --example link_monitor [CONFIG_JSON] [COMMAND]
//!
//! Examples:
//!   cargo run --example link_monitor studios.json
//!   cargo run --example link_monitor studios.json stat
//!
//! The configuration file has the same shape the configuration store
//! supplies:
//!
//! ```json
//! {
//!   "studios": {
//!     "studio1": { "host": "10.0.0.5", "port": 9000, "minPoolSize": 1, "maxPoolSize": 4 }
//!   }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use studio_link::protocol::constants::{event_topic, meter_topic};
use studio_link::{
    CommandGateway, ExecuteOptions, RegistryConfig, StudioRegistry, StudiosConfig, TopicHub,
};
use tokio::sync::broadcast::error::RecvError;

const DEFAULT_CONFIG: &str = r#"{"studios": {"local": {"host": "127.0.0.1", "port": 9000}}}"#;

fn print_usage() {
    eprintln!("Usage: link_monitor [CONFIG_JSON] [COMMAND]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  CONFIG_JSON  Studios configuration file (default: one studio on 127.0.0.1:9000)");
    eprintln!("  COMMAND      Command sent to every studio once connected");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studio_link=info".parse()?)
                .add_directive("link_monitor=debug".parse()?),
        )
        .init();

    let json = match args.get(1) {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => DEFAULT_CONFIG.to_string(),
    };
    let config = StudiosConfig::from_json(&json)?;
    let names: Vec<String> = config.studios.keys().cloned().collect();

    let hub = Arc::new(TopicHub::new());
    let _cleanup = hub.spawn_cleanup_task();
    let registry = Arc::new(StudioRegistry::new(RegistryConfig::default(), hub.clone()));

    let summary = registry.configure(config).await?;
    println!("Studios live: {:?}", summary.added);
    if !summary.launch_failed.is_empty() {
        println!("Launch failed: {:?}", summary.launch_failed);
    }

    for name in &names {
        for topic in [event_topic(name), meter_topic(name)] {
            let mut rx = hub.subscribe(&topic).await;
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => println!("[{}] {}", event.topic, event.payload),
                        Err(RecvError::Lagged(n)) => println!("[{}] skipped {} events", topic, n),
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }
    }

    let gateway = CommandGateway::new(Arc::clone(&registry));
    if let Some(command) = args.get(2) {
        for name in &names {
            match gateway.execute(name, command.as_str(), ExecuteOptions::raw()).await {
                Ok(Some(response)) => println!("{} > {}\n{}", name, command, response),
                Ok(None) => {}
                Err(e) => eprintln!("{} > {} failed: {}", name, command, e),
            }
        }
    }

    let stats_loop = async {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        loop {
            ticker.tick().await;
            for name in registry.studios().await {
                if let Some(stats) = registry.stats(&name).await {
                    println!(
                        "{}: pool {}/{} idle={} waiting={} | notify connected={} packets={} dropped={} reconnects={}",
                        stats.name,
                        stats.pool.size,
                        stats.pool.max,
                        stats.pool.idle,
                        stats.pool.waiting,
                        stats.notify.connected,
                        stats.notify.packets_decoded,
                        stats.notify.packets_dropped,
                        stats.notify.reconnects,
                    );
                }
            }
        }
    };

    tokio::select! {
        _ = stats_loop => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    registry.shutdown().await;
    Ok(())
}
