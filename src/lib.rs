pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod relay;
pub mod server;
pub mod translate;
pub mod upstream;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use logging::SharedExchangeLog;
pub use relay::RequestShape;
pub use server::{build_router, AppState};
pub use upstream::{BedrockClient, ModelInvoker};
