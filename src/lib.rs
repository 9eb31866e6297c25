pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod translate;

pub use config::GatewayConfig;
pub use credentials::{ClientHandle, CredentialProvider, Credentials};
pub use error::{GatewayError, Result};
pub use logging::RequestLogger;
pub use server::{build_router, AppState};
