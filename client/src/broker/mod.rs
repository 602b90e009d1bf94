pub mod azure;
pub mod config;
pub mod errors;
pub mod factory;
mod feed;
pub mod provider;
pub mod types;

pub use azure::AzureRestProvider;
pub use config::BrokerConfig;
pub use errors::{ProviderError, ProviderResult};
pub use factory::{ProviderKind, create_provider};
pub use provider::{BrokerProvider, DEFAULT_LOCK_DURATION, DEFAULT_RECEIVE_TIMEOUT};
pub use types::{
    BrokerAddress, DEFAULT_TIME_TO_LIVE_SECS, LockHandle, OutgoingMessage, SubscriptionInfo,
    TopicInfo,
};
