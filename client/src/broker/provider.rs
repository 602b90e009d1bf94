use crate::broker::errors::ProviderResult;
use crate::broker::types::{LockHandle, OutgoingMessage, SubscriptionInfo, TopicInfo};
use async_trait::async_trait;
use std::time::Duration;

/// Default broker-side wait for receive and peek operations.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default lock duration requested for new subscriptions.
pub const DEFAULT_LOCK_DURATION: &str = "PT30S";

/// The operation set every broker backend provides.
///
/// A backend implements the whole contract or it is not a provider; there
/// is no partial implementation that fails some operations at runtime.
/// Every operation is a single authenticated exchange with the broker: it
/// succeeds per its status contract or fails as a whole, and nothing
/// retries on its own. Implementations are immutable after construction,
/// so one instance can serve concurrent calls.
///
/// Receive and peek take the broker-side wait as a [`Duration`]; it is a
/// hint forwarded to the broker, not a local deadline on the HTTP call.
#[async_trait]
pub trait BrokerProvider: Send + Sync {
    /// Creates a queue named `queue_id`.
    async fn create_queue(&self, queue_id: &str) -> ProviderResult<()>;

    /// Creates a topic named `topic_id`.
    async fn create_topic(&self, topic_id: &str) -> ProviderResult<()>;

    /// Creates a subscription under `topic_id` with the requested lock
    /// duration, an ISO 8601 duration such as [`DEFAULT_LOCK_DURATION`].
    async fn create_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
        lock_duration: &str,
    ) -> ProviderResult<()>;

    /// Deletes the resource at `resource_id`, which may be a nested path.
    async fn delete_resource(&self, resource_id: &str) -> ProviderResult<()>;

    /// Deletes a queue.
    async fn delete_queue(&self, queue_id: &str) -> ProviderResult<()> {
        self.delete_resource(queue_id).await
    }

    /// Deletes a topic.
    async fn delete_topic(&self, topic_id: &str) -> ProviderResult<()> {
        self.delete_resource(topic_id).await
    }

    /// Deletes a subscription under `topic_id`.
    async fn delete_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
    ) -> ProviderResult<()> {
        self.delete_resource(&format!("{topic_id}/Subscriptions/{subscription_id}"))
            .await
    }

    /// Publishes `message` to the queue or topic `resource_id`.
    async fn send_message(
        &self,
        resource_id: &str,
        message: OutgoingMessage,
    ) -> ProviderResult<()>;

    /// Destructively reads the head message of a queue, or of a topic
    /// subscription when `subscription_id` is given. `None` means the
    /// broker-side wait elapsed with nothing to deliver.
    async fn receive_and_delete_message(
        &self,
        resource_id: &str,
        subscription_id: Option<&str>,
        timeout: Duration,
    ) -> ProviderResult<Option<String>>;

    /// Reads the head message without removing it. The broker locks the
    /// message for the read; the lock is released again before this
    /// returns, so the message stays available.
    async fn peek_top_message(
        &self,
        resource_id: &str,
        subscription_id: Option<&str>,
        timeout: Duration,
    ) -> ProviderResult<Option<String>>;

    /// Releases a message lock. The handle is consumed, so a released
    /// lock cannot be released twice.
    async fn unlock_top_message(&self, lock: LockHandle) -> ProviderResult<()>;

    /// Fetches the raw listing feed under `resource_address`.
    async fn get_resources(&self, resource_address: &str) -> ProviderResult<String>;

    /// Lists the namespace's topics, in feed order.
    async fn get_topics(&self) -> ProviderResult<Vec<TopicInfo>>;

    /// Lists the subscriptions of `topic_id`, in feed order.
    async fn get_subscriptions(&self, topic_id: &str) -> ProviderResult<Vec<SubscriptionInfo>>;
}

impl std::fmt::Debug for dyn BrokerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn BrokerProvider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the resource paths handed to `delete_resource`.
    struct RecordingProvider {
        deleted: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn new() -> Self {
            Self {
                deleted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BrokerProvider for RecordingProvider {
        async fn create_queue(&self, _queue_id: &str) -> ProviderResult<()> {
            Ok(())
        }

        async fn create_topic(&self, _topic_id: &str) -> ProviderResult<()> {
            Ok(())
        }

        async fn create_subscription(
            &self,
            _topic_id: &str,
            _subscription_id: &str,
            _lock_duration: &str,
        ) -> ProviderResult<()> {
            Ok(())
        }

        async fn delete_resource(&self, resource_id: &str) -> ProviderResult<()> {
            self.deleted.lock().unwrap().push(resource_id.to_string());
            Ok(())
        }

        async fn send_message(
            &self,
            _resource_id: &str,
            _message: OutgoingMessage,
        ) -> ProviderResult<()> {
            Ok(())
        }

        async fn receive_and_delete_message(
            &self,
            _resource_id: &str,
            _subscription_id: Option<&str>,
            _timeout: Duration,
        ) -> ProviderResult<Option<String>> {
            Ok(None)
        }

        async fn peek_top_message(
            &self,
            _resource_id: &str,
            _subscription_id: Option<&str>,
            _timeout: Duration,
        ) -> ProviderResult<Option<String>> {
            Ok(None)
        }

        async fn unlock_top_message(&self, _lock: LockHandle) -> ProviderResult<()> {
            Ok(())
        }

        async fn get_resources(&self, _resource_address: &str) -> ProviderResult<String> {
            Ok(String::new())
        }

        async fn get_topics(&self) -> ProviderResult<Vec<TopicInfo>> {
            Ok(Vec::new())
        }

        async fn get_subscriptions(
            &self,
            _topic_id: &str,
        ) -> ProviderResult<Vec<SubscriptionInfo>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn delete_helpers_delegate_to_delete_resource() {
        let provider = RecordingProvider::new();

        provider.delete_queue("orders").await.unwrap();
        provider.delete_topic("events").await.unwrap();
        provider.delete_subscription("events", "audit").await.unwrap();

        let deleted = provider.deleted.lock().unwrap();
        assert_eq!(
            *deleted,
            vec![
                "orders".to_string(),
                "events".to_string(),
                "events/Subscriptions/audit".to_string(),
            ]
        );
    }
}
