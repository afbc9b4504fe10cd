pub mod api;

use crate::bridge::ChatBridge;
use crate::cli::ServeArgs;
use std::error::Error;
use std::sync::Arc;

pub use api::{ build_app, AppState };

pub struct Server {
    addr: String,
    bridge: Arc<ChatBridge>,
    args: ServeArgs,
}

impl Server {
    pub fn new(addr: String, bridge: Arc<ChatBridge>, args: ServeArgs) -> Self {
        Self { addr, bridge, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.addr, self.bridge.clone(), &self.args).await
    }
}
