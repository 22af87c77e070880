// tedly-api: Async Rust client for the tedee smart lock cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod retry;
pub mod transport;

pub use auth::{Account, CredentialCache};
pub use client::{ClientConfig, TedeeClient};
pub use error::Error;
pub use models::{
    DeviceSettings, LockOperation, LockProperties, LockRecord, LockSync, OperationHandle,
    OperationStatus, SoftwareVersion,
};
pub use retry::RetryPolicy;
pub use transport::TransportConfig;
