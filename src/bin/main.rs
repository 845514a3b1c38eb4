use std::sync::Arc;
use std::time::Duration;
use tipster_bot::{
    providers::{HuggingFaceClient, SportsDbClient},
    Dispatcher, InboundMessage,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    dotenv::dotenv().ok();

    info!("Tipster Bot demo starting");

    // Without a token the generator fails fast and tips come from the local pool.
    let token = std::env::var("HUGGINGFACE_API_TOKEN").unwrap_or_default();
    let timeout = Duration::from_secs(15);

    let dispatcher = Dispatcher::builder()
        .data_provider(Arc::new(SportsDbClient::new(
            tipster_bot::providers::sportsdb::DEFAULT_BASE_URL,
            tipster_bot::providers::sportsdb::DEFAULT_API_KEY.to_string(),
            timeout,
        )?))
        .generation_provider(Arc::new(HuggingFaceClient::new(
            token,
            tipster_bot::providers::huggingface::DEFAULT_MODEL_URL.to_string(),
            timeout,
        )?))
        .fetch_timeout(timeout)
        .build()?;

    let script = [
        ("ana", Some("start"), "hola, qué bueno estar aquí"),
        ("ana", Some("tips"), "dame un pronóstico para el partido"),
        ("ana", None, "¿Quién gana hoy?"),
        ("ana", None, "me parece genial"),
        ("ben", Some("start"), "hello there"),
        ("ben", None, "Can you predict the match tonight?"),
        ("ben", Some("leaderboard"), "/leaderboard"),
    ];

    println!("\n=== CONVERSATION ===");
    for (user_id, command, text) in script {
        let message = InboundMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
            command: command.map(str::to_string),
        };
        let reply = dispatcher.handle(&message).await;
        println!("[{}] {}\n  -> {}", user_id, text, reply);
    }

    println!("\n=== REFRESH ===");
    let report = dispatcher.refresh().await;
    println!("{}", report.message);
    println!("Events: {}, expired entries purged: {}", report.event_count, report.purged_entries);

    Ok(())
}
