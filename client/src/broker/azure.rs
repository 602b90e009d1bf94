use crate::auth::credentials::SasCredentials;
use crate::auth::sas_token::{SasToken, SasTokenGenerator};
use crate::broker::config::BrokerConfig;
use crate::broker::errors::{ProviderError, ProviderResult};
use crate::broker::feed;
use crate::broker::provider::BrokerProvider;
use crate::broker::types::{
    BrokerAddress, LockHandle, OutgoingMessage, SubscriptionInfo, TopicInfo,
    validate_lock_duration,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Method, Response, StatusCode};
use std::time::Duration;

const API_VERSION: &str = "2013-08";
const SEND_TIMEOUT_SECS: u64 = 60;
const MAX_DELIVERY_COUNT: u32 = 9_999_999;
const TOPIC_FEED_PATH: &str = "$Resources/Topics";
const AUTH_SCHEME: &str = "SharedAccessSignature";
const ATOM_CONTENT_TYPE: &str = "application/atom+xml;type=entry;charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain;charset=utf-8";
const BROKER_PROPERTIES_HEADER: &str = "BrokerProperties";

const QUEUE_DESCRIPTION: &str = r#"<QueueDescription xmlns:i="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect"/>"#;
const TOPIC_DESCRIPTION: &str = r#"<TopicDescription xmlns:i="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect"/>"#;

/// REST backend speaking the Azure Service Bus HTTP/Atom wire protocol.
///
/// Every operation is one authenticated exchange with exactly one expected
/// success status; any other answer fails the call with the target URL and
/// the observed code. The authorization token is derived once at
/// construction and shared immutably by all requests, so one instance can
/// serve concurrent calls without locking. When the broker starts
/// rejecting the token with 401, callers build a fresh provider.
///
/// # Examples
///
/// ```no_run
/// use client::broker::{AzureRestProvider, BrokerConfig, BrokerProvider};
///
/// let config = BrokerConfig::new("my-namespace", "RootManageSharedAccessKey", "key")?;
/// let provider = AzureRestProvider::new(config)?;
/// provider.create_topic("orders").await?;
/// ```
pub struct AzureRestProvider {
    address: BrokerAddress,
    credentials: SasCredentials,
    token: SasToken,
    client: reqwest::Client,
}

impl AzureRestProvider {
    /// Builds a provider from `config`, signing a fresh one-hour token for
    /// the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] if token derivation fails.
    pub fn new(config: BrokerConfig) -> ProviderResult<Self> {
        let (address, credentials) = config.into_parts();
        let token = SasTokenGenerator::new(credentials.clone()).generate(&address)?;
        log::info!(
            "broker provider ready for {address}, token valid until {}",
            token.expires_at()
        );
        Ok(Self {
            address,
            credentials,
            token,
            client: reqwest::Client::new(),
        })
    }

    /// The base address requests are built against.
    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }

    /// The shared access policy the provider signs with.
    pub fn key_name(&self) -> &str {
        self.credentials.key_name()
    }

    /// When the construction-time token stops being accepted.
    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at()
    }

    fn authorization_header(&self) -> String {
        format!("{AUTH_SCHEME} {}", self.token.value())
    }

    fn head_url(
        &self,
        resource_id: &str,
        subscription_id: Option<&str>,
        timeout: Duration,
    ) -> String {
        // Message-head paths use a lowercase "subscriptions" segment while
        // the management surface capitalizes it.
        let path = match subscription_id {
            Some(sub) => format!("{resource_id}/subscriptions/{sub}/messages/head"),
            None => format!("{resource_id}/messages/head"),
        };
        format!("{}?timeout={}", self.address.join(&path), timeout.as_secs())
    }

    fn create_entry_body(title: &str, description: &str) -> String {
        let title = escape(title);
        format!(
            r#"<entry xmlns="http://www.w3.org/2005/Atom"><title type="text">{title}</title><content type="application/xml">{description}</content></entry>"#
        )
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        build: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send,
    ) -> ProviderResult<Response> {
        log::debug!("{method} {url}");
        let request = build(
            self.client
                .request(method, url)
                .header(AUTHORIZATION, self.authorization_header()),
        );
        request
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        expected: StatusCode,
        build: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send,
    ) -> ProviderResult<Response> {
        let response = self.dispatch(method, url, build).await?;
        let status = response.status();
        if status != expected {
            return Err(ProviderError::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    /// Like [`execute`](Self::execute) but for the message-head calls,
    /// where `204 No Content` means the broker-side wait elapsed with no
    /// message to deliver.
    async fn execute_head(
        &self,
        method: Method,
        url: &str,
        expected: StatusCode,
    ) -> ProviderResult<Option<Response>> {
        let response = self.dispatch(method, url, |req| req).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status != expected {
            return Err(ProviderError::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(Some(response))
    }

    async fn read_body(response: Response, url: &str) -> ProviderResult<String> {
        response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                url: url.to_string(),
                reason: format!("failed to read response body: {e}"),
            })
    }
}

#[async_trait]
impl BrokerProvider for AzureRestProvider {
    async fn create_queue(&self, queue_id: &str) -> ProviderResult<()> {
        let url = self.address.join(queue_id);
        let body = Self::create_entry_body(queue_id, QUEUE_DESCRIPTION);
        self.execute(Method::PUT, &url, StatusCode::CREATED, move |req| {
            req.header(CONTENT_TYPE, ATOM_CONTENT_TYPE).body(body)
        })
        .await?;
        log::info!("created queue {queue_id}");
        Ok(())
    }

    async fn create_topic(&self, topic_id: &str) -> ProviderResult<()> {
        let url = self.address.join(topic_id);
        let body = Self::create_entry_body(topic_id, TOPIC_DESCRIPTION);
        self.execute(Method::PUT, &url, StatusCode::CREATED, move |req| {
            req.header(CONTENT_TYPE, ATOM_CONTENT_TYPE).body(body)
        })
        .await?;
        log::info!("created topic {topic_id}");
        Ok(())
    }

    async fn create_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
        lock_duration: &str,
    ) -> ProviderResult<()> {
        validate_lock_duration(lock_duration)?;
        let url = self
            .address
            .join(&format!("{topic_id}/Subscriptions/{subscription_id}"));
        let description = format!(
            r#"<SubscriptionDescription xmlns:i="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://schemas.microsoft.com/netservices/2010/10/servicebus/connect"><LockDuration>{lock_duration}</LockDuration><MaxDeliveryCount>{MAX_DELIVERY_COUNT}</MaxDeliveryCount></SubscriptionDescription>"#
        );
        let body = Self::create_entry_body(subscription_id, &description);
        self.execute(Method::PUT, &url, StatusCode::CREATED, move |req| {
            req.header(CONTENT_TYPE, ATOM_CONTENT_TYPE).body(body)
        })
        .await?;
        log::info!("created subscription {subscription_id} under topic {topic_id}");
        Ok(())
    }

    async fn delete_resource(&self, resource_id: &str) -> ProviderResult<()> {
        let url = self.address.join(resource_id);
        self.execute(Method::DELETE, &url, StatusCode::OK, |req| req)
            .await?;
        log::info!("deleted resource {resource_id}");
        Ok(())
    }

    async fn send_message(
        &self,
        resource_id: &str,
        message: OutgoingMessage,
    ) -> ProviderResult<()> {
        let url = format!(
            "{}?timeout={SEND_TIMEOUT_SECS}&api-version={API_VERSION}",
            self.address.join(&format!("{resource_id}/messages"))
        );
        let properties =
            message
                .broker_properties_json()
                .map_err(|e| ProviderError::RequestFailed {
                    url: url.clone(),
                    reason: format!("failed to encode broker properties: {e}"),
                })?;
        self.execute(Method::POST, &url, StatusCode::CREATED, move |mut req| {
            req = req
                .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
                .header(BROKER_PROPERTIES_HEADER, properties);
            for (name, value) in message.properties() {
                req = req.header(name.as_str(), value.as_str());
            }
            req.body(message.body().to_string())
        })
        .await?;
        log::debug!("sent message to {resource_id}");
        Ok(())
    }

    async fn receive_and_delete_message(
        &self,
        resource_id: &str,
        subscription_id: Option<&str>,
        timeout: Duration,
    ) -> ProviderResult<Option<String>> {
        let url = self.head_url(resource_id, subscription_id, timeout);
        let Some(response) = self
            .execute_head(Method::DELETE, &url, StatusCode::OK)
            .await?
        else {
            log::debug!("no message available on {resource_id}");
            return Ok(None);
        };
        Ok(Some(Self::read_body(response, &url).await?))
    }

    async fn peek_top_message(
        &self,
        resource_id: &str,
        subscription_id: Option<&str>,
        timeout: Duration,
    ) -> ProviderResult<Option<String>> {
        let url = self.head_url(resource_id, subscription_id, timeout);
        let Some(response) = self
            .execute_head(Method::POST, &url, StatusCode::CREATED)
            .await?
        else {
            log::debug!("no message available on {resource_id}");
            return Ok(None);
        };

        let lock = lock_handle_from(&response, &url)?;
        let body = Self::read_body(response, &url).await?;
        // Release the lock before handing the body back, so a peek leaves
        // the message available again.
        self.unlock_top_message(lock).await?;
        Ok(Some(body))
    }

    async fn unlock_top_message(&self, lock: LockHandle) -> ProviderResult<()> {
        let url = lock.into_url();
        self.execute(Method::PUT, &url, StatusCode::OK, |req| req)
            .await?;
        log::debug!("released message lock at {url}");
        Ok(())
    }

    async fn get_resources(&self, resource_address: &str) -> ProviderResult<String> {
        let url = self.address.join(resource_address);
        let response = self
            .execute(Method::GET, &url, StatusCode::OK, |req| req)
            .await?;
        Self::read_body(response, &url).await
    }

    async fn get_topics(&self) -> ProviderResult<Vec<TopicInfo>> {
        let raw = self.get_resources(TOPIC_FEED_PATH).await?;
        let topics = feed::parse_entries(&raw)?
            .into_iter()
            .map(|entry| TopicInfo {
                id: entry.id,
                created_at: entry.published_at.timestamp(),
            })
            .collect();
        Ok(topics)
    }

    async fn get_subscriptions(&self, topic_id: &str) -> ProviderResult<Vec<SubscriptionInfo>> {
        let raw = self
            .get_resources(&format!("{topic_id}/Subscriptions/"))
            .await?;
        let subscriptions = feed::parse_entries(&raw)?
            .into_iter()
            .map(|entry| SubscriptionInfo {
                id: entry.id,
                created_at: entry.published_at.timestamp(),
            })
            .collect();
        Ok(subscriptions)
    }
}

fn lock_handle_from(response: &Response, url: &str) -> ProviderResult<LockHandle> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ProviderError::MissingLockLocation {
            url: url.to_string(),
        })?;
    Ok(LockHandle::new(location))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AzureRestProvider {
        let config = BrokerConfig::new("demo", "policy", "key").unwrap();
        AzureRestProvider::new(config).unwrap()
    }

    #[test]
    fn head_url_targets_the_queue_head() {
        assert_eq!(
            provider().head_url("orders", None, Duration::from_secs(15)),
            "https://demo.servicebus.windows.net/orders/messages/head?timeout=15"
        );
    }

    #[test]
    fn head_url_targets_the_subscription_head() {
        assert_eq!(
            provider().head_url("orders", Some("audit"), Duration::from_secs(5)),
            "https://demo.servicebus.windows.net/orders/subscriptions/audit/messages/head?timeout=5"
        );
    }

    #[test]
    fn authorization_header_carries_the_sas_scheme() {
        let header = provider().authorization_header();
        assert!(header.starts_with("SharedAccessSignature sr="));
        assert!(header.contains("&skn=policy"));
    }

    #[test]
    fn entry_bodies_escape_markup_in_titles() {
        let body = AzureRestProvider::create_entry_body("a<b", QUEUE_DESCRIPTION);
        assert!(body.contains(r#"<title type="text">a&lt;b</title>"#));
        assert!(body.contains("<QueueDescription"));
    }

    #[test]
    fn token_window_is_an_hour_out() {
        let provider = provider();
        let remaining = provider.token_expires_at() - Utc::now();
        assert!(remaining.num_seconds() > 3590);
        assert!(remaining.num_seconds() <= 3600);
        assert_eq!(provider.key_name(), "policy");
    }
}
