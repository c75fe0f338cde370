//! `pennywise gateway` — Start the HTTP API server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("💰 Pennywise Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Ledger:    {}", config.ledger.backend);
    println!("   Model:     {}/{}", config.default_provider, config.default_model);

    pennywise_gateway::start(config).await?;

    Ok(())
}
