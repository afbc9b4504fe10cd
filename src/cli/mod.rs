use clap::{ Args as ClapArgs, Parser, Subcommand };

use crate::llm::chat::{ gemini, openai };
use crate::llm::{ LlmConfig, ProviderKind };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP bridge in front of the OpenAI and Gemini chat APIs.
    Serve(ServeArgs),
    /// Chat with a running bridge from the terminal.
    Chat(ChatArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    // --- OpenAI-style provider (/api/chat-openai) ---
    /// Model name for OpenAI chat completions.
    #[arg(long, env = "OPENAI_MODEL", default_value = openai::DEFAULT_MODEL)]
    pub openai_model: String,

    /// Base URL of the OpenAI API (the `/chat/completions` route is appended).
    #[arg(long, env = "OPENAI_BASE_URL", default_value = openai::DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// System instruction prepended to every OpenAI request.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = openai::DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Sampling temperature for OpenAI requests.
    #[arg(long, env = "OPENAI_TEMPERATURE", default_value_t = openai::DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Token ceiling for OpenAI replies.
    #[arg(long, env = "OPENAI_MAX_TOKENS", default_value_t = openai::DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    // --- Gemini-style provider (/api/chat) ---
    /// Model name for Gemini generate calls.
    #[arg(long, env = "GEMINI_MODEL", default_value = gemini::DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Base URL of the Gemini API (`/models/<model>:generateContent` is appended).
    #[arg(long, env = "GEMINI_BASE_URL", default_value = gemini::DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl ServeArgs {
    pub fn llm_configs(&self) -> Vec<LlmConfig> {
        let mut openai_config = LlmConfig::new(ProviderKind::OpenAI);
        openai_config.completion_model = Some(self.openai_model.clone());
        openai_config.base_url = Some(self.openai_base_url.clone());
        openai_config.system_prompt = Some(self.system_prompt.clone());
        openai_config.temperature = Some(self.temperature);
        openai_config.max_tokens = Some(self.max_tokens);

        let mut gemini_config = LlmConfig::new(ProviderKind::Gemini);
        gemini_config.completion_model = Some(self.gemini_model.clone());
        gemini_config.base_url = Some(self.gemini_base_url.clone());

        vec![openai_config, gemini_config]
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of a running `duochat serve` instance.
    #[arg(long, env = "CHAT_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    pub server_url: String,

    /// Provider to start with (gemini, openai).
    #[arg(long, env = "CHAT_PROVIDER", default_value = "gemini")]
    pub provider: ProviderKind,
}
