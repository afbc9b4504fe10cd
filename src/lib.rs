pub mod bridge;
pub mod cli;
pub mod client;
pub mod llm;
pub mod normalize;
pub mod server;

use bridge::{ ChatBridge, EnvCredentials };
use cli::{ Args, Command, ServeArgs };
use llm::ProviderKind;
use log::{ info, warn };
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Chat(chat_args) => client::repl::run(chat_args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("OpenAI Model: {}", args.openai_model);
    info!("OpenAI Base URL: {}", args.openai_base_url);
    info!("Gemini Model: {}", args.gemini_model);
    info!("Gemini Base URL: {}", args.gemini_base_url);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let bridge = ChatBridge::from_configs(&args.llm_configs(), Arc::new(EnvCredentials))?;
    for provider in [ProviderKind::Gemini, ProviderKind::OpenAI] {
        if bridge.has_credential(provider) {
            info!("{} is set; {} is ready", provider.key_env(), provider.route());
        } else {
            warn!(
                "{} is not set; {} will answer 500 until it is",
                provider.key_env(),
                provider.route()
            );
        }
    }

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, Arc::new(bridge), args);
    server.run().await?;

    Ok(())
}
