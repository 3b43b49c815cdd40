use paypal_service::{config::get_configuration, startup::Application};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "paypal-service",
        &configuration.observability.log_level,
        configuration.observability.otlp_endpoint.as_deref(),
    );

    let application = Application::build(configuration).await?;
    application.run_until_stopped().await?;

    Ok(())
}
