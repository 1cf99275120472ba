//! Delivery Pipeline
//!
//! `submit` takes a validated draft through the full delivery
//! sequence: authorization, persistence, cache invalidation, local
//! hub fanout, and one relay publish.
//!
//! Failure semantics follow the fault taxonomy: authorization and
//! persistence failures abort the submission and surface to the
//! caller; cache and relay failures are logged and the message stays
//! durable and locally delivered.

use std::sync::Arc;

use crate::domain::{GroupRepository, Message, MessageDraft, MessageKind, MessageRepository};
use crate::infrastructure::cache::{Cache, MessageCacheService};
use crate::infrastructure::relay::RelayPublish;
use crate::presentation::websocket::HubHandle;
use crate::shared::error::AppError;

/// The delivery pipeline. One instance per submission site; all parts
/// are cheap handles over shared state.
pub struct DeliveryService<M, G, C>
where
    M: MessageRepository,
    G: GroupRepository,
    C: Cache,
{
    messages: Arc<M>,
    groups: Arc<G>,
    cache: Arc<MessageCacheService<C>>,
    hub: HubHandle,
    relay: Arc<dyn RelayPublish>,
}

impl<M, G, C> DeliveryService<M, G, C>
where
    M: MessageRepository,
    G: GroupRepository,
    C: Cache,
{
    pub fn new(
        messages: Arc<M>,
        groups: Arc<G>,
        cache: Arc<MessageCacheService<C>>,
        hub: HubHandle,
        relay: Arc<dyn RelayPublish>,
    ) -> Self {
        Self {
            messages,
            groups,
            cache,
            hub,
            relay,
        }
    }

    /// Submit a draft for delivery. Returns the persisted message.
    pub async fn submit(&self, draft: MessageDraft) -> Result<Arc<Message>, AppError> {
        self.authorize(&draft).await?;

        // Storage assigns id and created_at; failure aborts the whole
        // submission with no fanout and no invalidation.
        let message = self.messages.insert(&draft).await?;

        // Invalidation happens before success is reported. A failure
        // here leaves stale pages until their TTL expires.
        if let Err(e) = self.cache.invalidate_for(&message).await {
            tracing::warn!(
                error = %e,
                message_id = message.id,
                "Cache invalidation failed, stale pages persist until TTL expiry"
            );
        }

        let message = Arc::new(message);
        self.hub.dispatch(message.clone());

        if let Err(e) = self.relay.publish(&message).await {
            tracing::warn!(
                error = %e,
                message_id = message.id,
                "Relay publish failed, cross-instance delivery degraded"
            );
        }

        Ok(message)
    }

    async fn authorize(&self, draft: &MessageDraft) -> Result<(), AppError> {
        match draft.kind {
            MessageKind::Public => Ok(()),
            MessageKind::Private => {
                draft
                    .receiver_id
                    .ok_or_else(|| AppError::BadRequest("Private message requires a receiver".into()))?;
                Ok(())
            }
            MessageKind::Group => {
                let group_id = draft
                    .group_id
                    .ok_or_else(|| AppError::BadRequest("Group message requires a group".into()))?;
                if self.groups.is_member(group_id, draft.user_id).await? {
                    Ok(())
                } else {
                    Err(AppError::Forbidden("Sender is not a member of the group".into()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockGroupRepository, MockMessageRepository};
    use crate::infrastructure::cache::test_support::{FailingCache, MemoryCache};
    use crate::infrastructure::cache::keys;
    use crate::presentation::websocket::Hub;
    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;

    /// Relay double recording every published message.
    #[derive(Default)]
    struct RecordingRelay {
        published: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl RelayPublish for RecordingRelay {
        async fn publish(&self, message: &Message) -> Result<(), AppError> {
            self.published.lock().await.push(message.clone());
            Ok(())
        }
    }

    /// Relay double that always fails.
    struct FailingRelay;

    #[async_trait]
    impl RelayPublish for FailingRelay {
        async fn publish(&self, _message: &Message) -> Result<(), AppError> {
            Err(AppError::Internal("relay down".into()))
        }
    }

    fn persisted(draft: &MessageDraft) -> Message {
        Message {
            id: 42,
            kind: draft.kind,
            content: draft.content.clone(),
            user_id: draft.user_id,
            username: draft.username.clone(),
            receiver_id: draft.receiver_id,
            group_id: draft.group_id,
            created_at: Utc::now(),
        }
    }

    fn public_draft() -> MessageDraft {
        MessageDraft {
            kind: MessageKind::Public,
            content: "hi".into(),
            user_id: 1,
            username: "alice".into(),
            receiver_id: None,
            group_id: None,
        }
    }

    fn group_draft(group_id: i64) -> MessageDraft {
        MessageDraft {
            kind: MessageKind::Group,
            content: "hey group".into(),
            user_id: 1,
            username: "alice".into(),
            receiver_id: None,
            group_id: Some(group_id),
        }
    }

    struct Fixture {
        messages: MockMessageRepository,
        groups: MockGroupRepository,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                messages: MockMessageRepository::new(),
                groups: MockGroupRepository::new(),
            }
        }

        fn build_with(
            self,
            cache: Arc<MessageCacheService<MemoryCache>>,
            relay: Arc<dyn RelayPublish>,
        ) -> (
            DeliveryService<MockMessageRepository, MockGroupRepository, MemoryCache>,
            HubHandle,
        ) {
            let hub = Hub::spawn();
            let service = DeliveryService::new(
                Arc::new(self.messages),
                Arc::new(self.groups),
                cache,
                hub.clone(),
                relay,
            );
            (service, hub)
        }
    }

    fn memory_cache() -> Arc<MessageCacheService<MemoryCache>> {
        Arc::new(MessageCacheService::new(Arc::new(MemoryCache::default()), 300))
    }

    #[tokio::test]
    async fn public_submit_persists_invalidates_and_fans_out() {
        let mut fixture = Fixture::new();
        fixture
            .messages
            .expect_insert()
            .once()
            .returning(|draft| Ok(persisted(draft)));

        let cache = memory_cache();
        cache.store_page(&keys::public_page(50, 0), &[]).await.unwrap();

        let relay = Arc::new(RecordingRelay::default());
        let (service, _hub) = fixture.build_with(cache.clone(), relay.clone());

        let message = service.submit(public_draft()).await.unwrap();

        assert_eq!(message.id, 42);
        // Public feed pages were invalidated
        assert_eq!(cache.get_page(&keys::public_page(50, 0)).await.unwrap(), None);
        // Published exactly once on the relay
        assert_eq!(relay.published.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn non_member_group_submit_is_rejected_before_persistence() {
        let mut fixture = Fixture::new();
        fixture.messages.expect_insert().never();
        fixture
            .groups
            .expect_is_member()
            .once()
            .returning(|_, _| Ok(false));

        let relay = Arc::new(RecordingRelay::default());
        let (service, _hub) = fixture.build_with(memory_cache(), relay.clone());

        let err = service.submit(group_draft(5)).await.unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(relay.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn member_group_submit_is_delivered() {
        let mut fixture = Fixture::new();
        fixture
            .groups
            .expect_is_member()
            .once()
            .returning(|_, _| Ok(true));
        fixture
            .messages
            .expect_insert()
            .once()
            .returning(|draft| Ok(persisted(draft)));

        let relay = Arc::new(RecordingRelay::default());
        let (service, _hub) = fixture.build_with(memory_cache(), relay.clone());

        let message = service.submit(group_draft(5)).await.unwrap();
        assert_eq!(message.group_id, Some(5));
    }

    #[tokio::test]
    async fn persistence_failure_aborts_with_no_invalidation_and_no_fanout() {
        let mut fixture = Fixture::new();
        fixture
            .messages
            .expect_insert()
            .once()
            .returning(|_| Err(AppError::Internal("database down".into())));

        let cache = memory_cache();
        cache.store_page(&keys::public_page(50, 0), &[]).await.unwrap();

        let relay = Arc::new(RecordingRelay::default());
        let (service, _hub) = fixture.build_with(cache.clone(), relay.clone());

        let result = service.submit(public_draft()).await;

        assert!(result.is_err());
        // Cached page survived: no invalidation without a persist
        assert!(cache.get_page(&keys::public_page(50, 0)).await.unwrap().is_some());
        assert!(relay.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn private_submit_without_receiver_is_rejected() {
        let mut fixture = Fixture::new();
        fixture.messages.expect_insert().never();

        let (service, _hub) =
            fixture.build_with(memory_cache(), Arc::new(RecordingRelay::default()));

        let mut draft = public_draft();
        draft.kind = MessageKind::Private;

        let err = service.submit(draft).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn private_submit_to_absent_receiver_persists_and_invalidates_both_orderings() {
        let mut fixture = Fixture::new();
        fixture
            .messages
            .expect_insert()
            .once()
            .returning(|draft| Ok(persisted(draft)));

        let cache = memory_cache();
        cache.store_page(&keys::private_page(1, 7, 50, 0), &[]).await.unwrap();
        cache.store_page(&keys::private_page(7, 1, 50, 0), &[]).await.unwrap();

        let relay = Arc::new(RecordingRelay::default());
        // No connection is registered for the receiver; the message is
        // persisted and relayed regardless, for a later history read
        let (service, _hub) = fixture.build_with(cache.clone(), relay.clone());

        let mut draft = public_draft();
        draft.kind = MessageKind::Private;
        draft.receiver_id = Some(7);

        let message = service.submit(draft).await.unwrap();

        assert_eq!(message.receiver_id, Some(7));
        assert_eq!(cache.get_page(&keys::private_page(1, 7, 50, 0)).await.unwrap(), None);
        assert_eq!(cache.get_page(&keys::private_page(7, 1, 50, 0)).await.unwrap(), None);
        assert_eq!(relay.published.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn cache_failure_is_not_fatal() {
        let mut messages = MockMessageRepository::new();
        messages
            .expect_insert()
            .once()
            .returning(|draft| Ok(persisted(draft)));

        let relay = Arc::new(RecordingRelay::default());
        let service = DeliveryService::new(
            Arc::new(messages),
            Arc::new(MockGroupRepository::new()),
            Arc::new(MessageCacheService::new(Arc::new(FailingCache), 300)),
            Hub::spawn(),
            relay.clone(),
        );

        let message = service.submit(public_draft()).await.unwrap();

        assert_eq!(message.id, 42);
        assert_eq!(relay.published.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn relay_failure_is_not_fatal() {
        let mut fixture = Fixture::new();
        fixture
            .messages
            .expect_insert()
            .once()
            .returning(|draft| Ok(persisted(draft)));

        let (service, _hub) = fixture.build_with(memory_cache(), Arc::new(FailingRelay));

        assert!(service.submit(public_draft()).await.is_ok());
    }
}
