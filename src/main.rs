use rendezvous::config::Config;
use rendezvous::signaling::{SignalingServer, shutdown_signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr();

    println!("   Rendezvous Signaling Server");
    println!("   Binding to {}", bind_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::bind(&bind_addr).await?;
    server
        .run_until(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;

    Ok(())
}
