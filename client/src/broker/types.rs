use crate::broker::errors::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default message time-to-live: thirty days, in seconds.
pub const DEFAULT_TIME_TO_LIVE_SECS: u64 = 60 * 60 * 24 * 30;

/// Base address of a broker namespace.
///
/// The address is an absolute URL that always ends with a slash, so
/// resource paths can be appended without separator bookkeeping. Addresses
/// derived from a namespace name are always HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress(String);

impl BrokerAddress {
    /// Builds the public cloud address for a namespace:
    /// `https://{namespace}.servicebus.windows.net/`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the namespace is empty
    /// or contains characters outside `[A-Za-z0-9-]`.
    pub fn from_namespace(namespace: &str) -> ProviderResult<Self> {
        if namespace.is_empty() {
            return Err(ProviderError::Configuration(
                "namespace must not be empty".to_string(),
            ));
        }
        if !namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ProviderError::Configuration(format!(
                "namespace '{namespace}' contains characters outside [A-Za-z0-9-]"
            )));
        }
        Ok(Self(format!("https://{namespace}.servicebus.windows.net/")))
    }

    /// Accepts an explicit endpoint, for emulators and test brokers. The
    /// scheme is kept as given; the address is normalized to end with a
    /// slash.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the endpoint has no
    /// `http`/`https` scheme or no host.
    pub fn parse(endpoint: &str) -> ProviderResult<Self> {
        let rest = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"))
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "endpoint '{endpoint}' must start with http:// or https://"
                ))
            })?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(ProviderError::Configuration(format!(
                "endpoint '{endpoint}' is missing a host"
            )));
        }
        let mut address = endpoint.trim_end_matches('/').to_string();
        address.push('/');
        Ok(Self(address))
    }

    /// The address as a string slice, trailing slash included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a resource path to the base address.
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing record for a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    /// Resource id, taken from the feed entry title.
    pub id: String,
    /// Creation time as Unix seconds UTC, from the entry's `published`
    /// field.
    pub created_at: i64,
}

/// Listing record for a subscription under a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Resource id, taken from the feed entry title.
    pub id: String,
    /// Creation time as Unix seconds UTC, from the entry's `published`
    /// field.
    pub created_at: i64,
}

/// A message to publish, together with its broker-side metadata.
///
/// # Examples
///
/// ```no_run
/// use client::broker::OutgoingMessage;
///
/// let message = OutgoingMessage::new("order 42 accepted")
///     .with_label("order-events")
///     .with_time_to_live(3600)
///     .with_property("Priority", "high");
/// ```
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    body: String,
    time_to_live_secs: u64,
    label: Option<String>,
    properties: HashMap<String, String>,
}

impl OutgoingMessage {
    /// Creates a message with the default thirty-day time-to-live, no
    /// label, and no custom properties.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            time_to_live_secs: DEFAULT_TIME_TO_LIVE_SECS,
            label: None,
            properties: HashMap::new(),
        }
    }

    /// Overrides the broker-side time-to-live, in seconds.
    pub fn with_time_to_live(mut self, secs: u64) -> Self {
        self.time_to_live_secs = secs;
        self
    }

    /// Sets the label carried in the broker properties.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches a custom string property, transmitted as a plain HTTP
    /// header next to the message body.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// The message payload. The client treats it as opaque text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Broker-side time-to-live, in seconds.
    pub fn time_to_live_secs(&self) -> u64 {
        self.time_to_live_secs
    }

    /// The label, if one was set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Custom string properties in no particular order.
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Serializes the `BrokerProperties` header value.
    pub(crate) fn broker_properties_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&BrokerProperties {
            time_to_live: self.time_to_live_secs,
            label: self.label.as_deref(),
        })
    }
}

/// Wire form of the `BrokerProperties` request header.
#[derive(Serialize)]
struct BrokerProperties<'a> {
    #[serde(rename = "TimeToLive")]
    time_to_live: u64,
    #[serde(rename = "Label", skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
}

/// Address of a message lock acquired by a peek, taken from the response's
/// `Location` header.
///
/// The handle is consumed by value when the lock is released, so one lock
/// cannot be released twice.
#[derive(Debug, PartialEq, Eq)]
pub struct LockHandle(String);

impl LockHandle {
    /// Wraps a lock address advertised by the broker.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The absolute URL of the locked message instance.
    pub fn as_url(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_url(self) -> String {
        self.0
    }
}

/// Checks that a lock duration is shaped like an ISO 8601 duration, for
/// example `PT30S` or `PT1M30S`. The broker answers malformed durations
/// with an opaque 400, so bad input is rejected here before a request is
/// built. Designators must appear in order and a fraction is only allowed
/// on a trailing seconds component.
pub(crate) fn validate_lock_duration(value: &str) -> ProviderResult<()> {
    let invalid = || ProviderError::InvalidLockDuration(value.to_string());

    const DATE_UNITS: [char; 4] = ['Y', 'M', 'W', 'D'];
    const TIME_UNITS: [char; 3] = ['H', 'M', 'S'];

    let mut chars = value.chars().peekable();
    if chars.next() != Some('P') {
        return Err(invalid());
    }

    let mut in_time = false;
    let mut date_components = 0;
    let mut time_components = 0;
    let mut last_unit_index: i32 = -1;

    while let Some(&c) = chars.peek() {
        if c == 'T' {
            if in_time {
                return Err(invalid());
            }
            in_time = true;
            last_unit_index = -1;
            chars.next();
            continue;
        }

        let mut digits = 0;
        let mut fraction = false;
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                digits += 1;
                chars.next();
            } else if d == '.' && !fraction && digits > 0 {
                fraction = true;
                digits = 0;
                chars.next();
            } else {
                break;
            }
        }
        if digits == 0 {
            return Err(invalid());
        }

        let unit = chars.next().ok_or_else(invalid)?;
        let allowed: &[char] = if in_time { &TIME_UNITS } else { &DATE_UNITS };
        let index = allowed
            .iter()
            .position(|&u| u == unit)
            .map(|i| i as i32)
            .ok_or_else(invalid)?;
        if index <= last_unit_index {
            return Err(invalid());
        }
        last_unit_index = index;

        if fraction && (unit != 'S' || chars.peek().is_some()) {
            return Err(invalid());
        }

        if in_time {
            time_components += 1;
        } else {
            date_components += 1;
        }
    }

    if date_components + time_components == 0 {
        return Err(invalid());
    }
    // A trailing T with nothing after it is not a duration.
    if in_time && time_components == 0 {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_address_is_https_and_slash_terminated() {
        let address = BrokerAddress::from_namespace("demo").unwrap();
        assert_eq!(address.as_str(), "https://demo.servicebus.windows.net/");
        assert_eq!(
            address.join("orders/messages"),
            "https://demo.servicebus.windows.net/orders/messages"
        );
        assert_eq!(
            address.join("/orders"),
            "https://demo.servicebus.windows.net/orders"
        );
    }

    #[test]
    fn namespace_charset_is_enforced() {
        assert!(BrokerAddress::from_namespace("").is_err());
        assert!(BrokerAddress::from_namespace("bad namespace").is_err());
        assert!(BrokerAddress::from_namespace("demo.attacker.example").is_err());
        assert!(BrokerAddress::from_namespace("demo-2").is_ok());
    }

    #[test]
    fn explicit_endpoints_are_normalized() {
        let address = BrokerAddress::parse("http://127.0.0.1:5672").unwrap();
        assert_eq!(address.as_str(), "http://127.0.0.1:5672/");
        assert_eq!(
            BrokerAddress::parse("https://broker.local/").unwrap().as_str(),
            "https://broker.local/"
        );
        assert!(BrokerAddress::parse("ftp://broker.local").is_err());
        assert!(BrokerAddress::parse("https://").is_err());
    }

    #[test]
    fn message_defaults_and_builders() {
        let message = OutgoingMessage::new("hello");
        assert_eq!(message.time_to_live_secs(), DEFAULT_TIME_TO_LIVE_SECS);
        assert_eq!(message.label(), None);
        assert!(message.properties().is_empty());

        let message = message
            .with_time_to_live(120)
            .with_label("greeting")
            .with_property("Priority", "high");
        assert_eq!(message.time_to_live_secs(), 120);
        assert_eq!(message.label(), Some("greeting"));
        assert_eq!(
            message.properties().get("Priority").map(String::as_str),
            Some("high")
        );
    }

    #[test]
    fn broker_properties_skip_an_unset_label() {
        let labelled = OutgoingMessage::new("x")
            .with_time_to_live(120)
            .with_label("greeting");
        assert_eq!(
            labelled.broker_properties_json().unwrap(),
            r#"{"TimeToLive":120,"Label":"greeting"}"#
        );

        let unlabelled = OutgoingMessage::new("x").with_time_to_live(120);
        assert_eq!(
            unlabelled.broker_properties_json().unwrap(),
            r#"{"TimeToLive":120}"#
        );
    }

    #[test]
    fn lock_handles_expose_their_url() {
        let url = "https://demo.servicebus.windows.net/orders/messages/2/abc";
        let lock = LockHandle::new(url);
        assert_eq!(lock.as_url(), url);
        assert_eq!(lock.into_url(), url);
    }

    #[test]
    fn accepts_well_formed_lock_durations() {
        for duration in ["PT30S", "PT1M30S", "PT2H", "P1D", "P1DT2H3M4S", "PT0.5S", "P1Y2M3DT4H5M6S"] {
            assert!(validate_lock_duration(duration).is_ok(), "{duration}");
        }
    }

    #[test]
    fn rejects_malformed_lock_durations() {
        for duration in [
            "", "P", "PT", "30S", "pt30s", "PT30", "PTS", "PT30X", "PT30S30M",
            "P1DT", "PT.5S", "PT0.5M", "PT0.5S1M", "PT1MT1S", "P1S",
        ] {
            assert!(validate_lock_duration(duration).is_err(), "{duration}");
        }
    }
}
