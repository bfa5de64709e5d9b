pub mod agent;
pub mod models;
pub mod server;
pub mod llm;
pub mod cli;
pub mod history;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("Chat API Key: {}", if args.has_api_key() { "set" } else { "not set" });
    info!("Provider Timeout: {}s", args.provider_timeout_secs);
    info!("History Store Type: {}", args.history_type);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::from_args(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent);
    server.run().await?;

    Ok(())
}
