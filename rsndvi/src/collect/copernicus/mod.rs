pub mod auth;
pub mod catalog;
pub mod process;

pub use auth::CdseCredentials;
pub use catalog::SentinelHubCatalog;
pub use process::SentinelHubProcess;
