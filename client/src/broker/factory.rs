use crate::broker::azure::AzureRestProvider;
use crate::broker::config::BrokerConfig;
use crate::broker::errors::{ProviderError, ProviderResult};
use crate::broker::provider::BrokerProvider;
use std::sync::Arc;

/// Backends a provider can be requested for.
///
/// `Aws` is enumerated for parity with deployment configuration but has no
/// backend yet; asking for it is an explicit error, never a null provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Azure,
    Aws,
}

/// Builds the provider backing `kind`, ready for shared use across tasks.
///
/// # Errors
///
/// Returns [`ProviderError::NoSuchBackend`] when `kind` has no backend,
/// and construction errors from the backend itself otherwise.
///
/// # Examples
///
/// ```no_run
/// use client::broker::{create_provider, BrokerConfig, ProviderKind};
///
/// let config = BrokerConfig::new("my-namespace", "RootManageSharedAccessKey", "key")?;
/// let provider = create_provider(ProviderKind::Azure, config)?;
/// ```
pub fn create_provider(
    kind: ProviderKind,
    config: BrokerConfig,
) -> ProviderResult<Arc<dyn BrokerProvider>> {
    match kind {
        ProviderKind::Azure => Ok(Arc::new(AzureRestProvider::new(config)?)),
        ProviderKind::Aws => Err(ProviderError::NoSuchBackend(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BrokerConfig {
        BrokerConfig::new("demo", "policy", "key").unwrap()
    }

    #[test]
    fn azure_kind_builds_a_provider() {
        assert!(create_provider(ProviderKind::Azure, config()).is_ok());
    }

    #[test]
    fn kinds_without_a_backend_are_an_explicit_error() {
        let err = create_provider(ProviderKind::Aws, config()).unwrap_err();
        assert!(matches!(err, ProviderError::NoSuchBackend(ProviderKind::Aws)));
    }
}
