use crate::broker::errors::{ProviderError, ProviderResult};
use std::fmt;
use zeroize::ZeroizeOnDrop;

/// Shared access signature credentials: a policy name and its signing key.
///
/// The key exists only to derive tokens. It is wiped from memory on drop,
/// redacted from `Debug` output, and never serialized or logged.
///
/// # Examples
///
/// ```no_run
/// use client::auth::SasCredentials;
///
/// let credentials = SasCredentials::new("RootManageSharedAccessKey", "the-key")?;
/// assert_eq!(credentials.key_name(), "RootManageSharedAccessKey");
/// ```
#[derive(Clone, ZeroizeOnDrop)]
pub struct SasCredentials {
    key_name: String,
    key: String,
}

impl SasCredentials {
    /// Creates a credential pair from a policy name and its key.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if either part is empty.
    pub fn new(
        key_name: impl Into<String>,
        key: impl Into<String>,
    ) -> ProviderResult<Self> {
        let key_name = key_name.into();
        let key = key.into();
        if key_name.is_empty() {
            return Err(ProviderError::Configuration(
                "SAS key name must not be empty".to_string(),
            ));
        }
        if key.is_empty() {
            return Err(ProviderError::Configuration(
                "SAS key must not be empty".to_string(),
            ));
        }
        Ok(Self { key_name, key })
    }

    /// The shared access policy name, sent as the token's `skn` field.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// The signing key. Crate-internal so the raw key never leaves the
    /// signing path.
    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for SasCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasCredentials")
            .field("key_name", &self.key_name)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Parsed form of a broker connection string:
/// `Endpoint=sb://{ns}.servicebus.windows.net/;SharedAccessKeyName={name};SharedAccessKey={key}`.
///
/// Unknown segments are ignored so strings copied from portal tooling, which
/// may append `EntityPath` or transport hints, still parse.
#[derive(Debug)]
pub(crate) struct ConnectionString {
    pub endpoint: String,
    pub key_name: String,
    pub key: String,
}

impl ConnectionString {
    /// Splits a connection string into its endpoint and credential parts.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] naming the first missing
    /// mandatory segment.
    pub fn parse(raw: &str) -> ProviderResult<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;

        for segment in raw.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if let Some(value) = segment.strip_prefix("Endpoint=") {
                endpoint = Some(value.to_string());
            } else if let Some(value) = segment.strip_prefix("SharedAccessKeyName=") {
                key_name = Some(value.to_string());
            } else if let Some(value) = segment.strip_prefix("SharedAccessKey=") {
                key = Some(value.to_string());
            }
        }

        let missing = |field: &str| {
            ProviderError::Configuration(format!("connection string is missing {field}"))
        };

        Ok(Self {
            endpoint: endpoint.ok_or_else(|| missing("Endpoint"))?,
            key_name: key_name.ok_or_else(|| missing("SharedAccessKeyName"))?,
            key: key.ok_or_else(|| missing("SharedAccessKey"))?,
        })
    }

    /// Extracts the namespace from the endpoint host, so
    /// `sb://demo.servicebus.windows.net/` yields `demo`.
    pub fn namespace(&self) -> ProviderResult<String> {
        let host = self
            .endpoint
            .trim_start_matches("sb://")
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let host = host.split('/').next().unwrap_or_default();
        let namespace = host.split('.').next().unwrap_or_default();
        if namespace.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "cannot derive a namespace from endpoint '{}'",
                self.endpoint
            )));
        }
        Ok(namespace.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_the_key() {
        let credentials = SasCredentials::new("policy", "super-secret-key").unwrap();
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("policy"));
        assert!(!rendered.contains("super-secret-key"));
    }

    #[test]
    fn rejects_empty_credential_parts() {
        assert!(SasCredentials::new("", "key").is_err());
        assert!(SasCredentials::new("policy", "").is_err());
    }

    #[test]
    fn parses_a_full_connection_string() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://demo.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=abc123=",
        )
        .unwrap();
        assert_eq!(parsed.endpoint, "sb://demo.servicebus.windows.net/");
        assert_eq!(parsed.key_name, "RootManageSharedAccessKey");
        assert_eq!(parsed.key, "abc123=");
        assert_eq!(parsed.namespace().unwrap(), "demo");
    }

    #[test]
    fn ignores_unknown_segments() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://demo.servicebus.windows.net/;SharedAccessKeyName=send;SharedAccessKey=k;EntityPath=orders",
        )
        .unwrap();
        assert_eq!(parsed.key_name, "send");
    }

    #[test]
    fn reports_the_missing_segment() {
        let err = ConnectionString::parse("Endpoint=sb://demo.servicebus.windows.net/")
            .unwrap_err();
        assert!(err.to_string().contains("SharedAccessKeyName"));
    }

    #[test]
    fn namespace_requires_a_host() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb:///;SharedAccessKeyName=n;SharedAccessKey=k",
        )
        .unwrap();
        assert!(parsed.namespace().is_err());
    }
}
