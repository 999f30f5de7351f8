use anyhow::Context;
use cloud_providers::{Config, ProviderRegistry};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio::signal::unix::{signal, SignalKind};

fn print_providers(registry: &ProviderRegistry) {
    println!("Providers data");
    println!("--------------");
    for provider in registry.providers() {
        println!(
            "Name - {} Status - {}",
            provider.name().as_deref().unwrap_or("(unknown)"),
            provider.status()
        );
    }
    println!();
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    let registry = ProviderRegistry::instance_with_config(config)
        .await
        .context("Cannot start the cloud provider registry")?;

    registry.connect_changed(move || print_providers(registry));
    print_providers(registry);

    // same as most daemons: SIGHUP to reload
    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("Rescanning cloud providers");
                registry.rescan().await;
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    registry.shutdown().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("cloud-providers")
        .enable_all()
        .build()
        .context("Failed to initialize tokio runtime")?;

    rt.block_on(run())
}
