use crate::auth::credentials::{ConnectionString, SasCredentials};
use crate::broker::errors::ProviderResult;
use crate::broker::types::BrokerAddress;

/// Everything a provider needs at construction time: where the broker
/// lives and the credentials to sign requests with.
///
/// The address and credentials are validated up front, so a `BrokerConfig`
/// in hand is always usable.
///
/// # Examples
///
/// ```no_run
/// use client::broker::BrokerConfig;
///
/// let config = BrokerConfig::from_connection_string(
///     "Endpoint=sb://demo.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=the-key",
/// )?;
/// assert_eq!(config.address().as_str(), "https://demo.servicebus.windows.net/");
/// ```
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    address: BrokerAddress,
    credentials: SasCredentials,
}

impl BrokerConfig {
    /// Builds a configuration for a public cloud namespace.
    ///
    /// # Errors
    ///
    /// Returns [`crate::broker::ProviderError::Configuration`] if the
    /// namespace or either credential part is invalid.
    pub fn new(
        namespace: &str,
        key_name: impl Into<String>,
        key: impl Into<String>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            address: BrokerAddress::from_namespace(namespace)?,
            credentials: SasCredentials::new(key_name, key)?,
        })
    }

    /// Builds a configuration from an
    /// `Endpoint=…;SharedAccessKeyName=…;SharedAccessKey=…` connection
    /// string. The namespace is derived from the endpoint host.
    pub fn from_connection_string(raw: &str) -> ProviderResult<Self> {
        let parsed = ConnectionString::parse(raw)?;
        let namespace = parsed.namespace()?;
        Ok(Self {
            address: BrokerAddress::from_namespace(&namespace)?,
            credentials: SasCredentials::new(parsed.key_name, parsed.key)?,
        })
    }

    /// Replaces the derived address with an explicit endpoint. Meant for
    /// emulators and test brokers; cloud namespaces should keep the
    /// derived HTTPS address.
    pub fn with_endpoint(mut self, endpoint: &str) -> ProviderResult<Self> {
        self.address = BrokerAddress::parse(endpoint)?;
        Ok(self)
    }

    /// The broker base address requests are built against.
    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }

    /// The credentials requests are signed with.
    pub fn credentials(&self) -> &SasCredentials {
        &self.credentials
    }

    pub(crate) fn into_parts(self) -> (BrokerAddress, SasCredentials) {
        (self.address, self.credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_the_cloud_address_from_the_namespace() {
        let config = BrokerConfig::new("demo", "policy", "key").unwrap();
        assert_eq!(config.address().as_str(), "https://demo.servicebus.windows.net/");
        assert_eq!(config.credentials().key_name(), "policy");
    }

    #[test]
    fn connection_strings_yield_the_same_address() {
        let config = BrokerConfig::from_connection_string(
            "Endpoint=sb://demo.servicebus.windows.net/;SharedAccessKeyName=policy;SharedAccessKey=key",
        )
        .unwrap();
        assert_eq!(config.address().as_str(), "https://demo.servicebus.windows.net/");
    }

    #[test]
    fn endpoint_override_wins_over_the_namespace() {
        let config = BrokerConfig::new("demo", "policy", "key")
            .and_then(|c| c.with_endpoint("http://127.0.0.1:5672"))
            .unwrap();
        assert_eq!(config.address().as_str(), "http://127.0.0.1:5672/");
    }

    #[test]
    fn invalid_settings_fail_construction() {
        assert!(BrokerConfig::new("bad namespace", "policy", "key").is_err());
        assert!(BrokerConfig::new("demo", "", "key").is_err());
        assert!(BrokerConfig::from_connection_string("SharedAccessKey=key").is_err());
    }
}
