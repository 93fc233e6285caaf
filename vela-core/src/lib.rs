pub mod notify;
pub mod provider;
pub mod registry;
pub mod repository;

pub use notify::SmsSender;
pub use provider::{DispatchOutcome, ProviderAdapter, StatusProbe};
pub use registry::ProviderRegistry;
pub use repository::{OrderRepository, RepositoryError};
