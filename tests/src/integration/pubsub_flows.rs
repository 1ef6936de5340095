//! # Publish/Subscribe Flows
//!
//! Broker-facing lifecycles: subscription registration with NOTIFY
//! delivery, publisher registration idempotency, publish preconditions,
//! and the decode-failure communication error path.

#[cfg(test)]
mod tests {
    use crate::harness::{Harness, RecordingListener, TestChannel, BROKER_URI, PROVIDER_URI};
    use mal_types::{stage, Blob, InteractionType, MalError, MessageBody};
    use std::time::Duration;
    use tokio::time::timeout;

    /// register -> REGISTER_ACK -> NOTIFY: the scope's listener receives
    /// broker deliveries through the update callback.
    #[tokio::test]
    async fn test_register_then_notify_delivery() {
        let h = Harness::new();
        let listener = RecordingListener::new();

        let task = {
            let h = h.clone();
            let listener = listener.clone();
            tokio::spawn(async move {
                h.send
                    .register(
                        &h.details(),
                        &h.operation(InteractionType::PubSub),
                        MessageBody::Data(Blob::new([0x5B])),
                        listener,
                    )
                    .await
            })
        };

        let init = h.next_sent().await;
        assert_eq!(init.header.stage, stage::REGISTER);
        assert_eq!(init.header.uri_to.as_str(), BROKER_URI);

        h.inject(&h.broker_reply_to(&init, stage::REGISTER_ACK, MessageBody::Empty))
            .await;
        timeout(Duration::from_secs(2), task)
            .await
            .expect("no hang")
            .expect("join")
            .expect("register ack");

        // Broker pushes an update for the registered scope.
        let notify = h.broker_reply_to(&init, stage::NOTIFY, MessageBody::Data(Blob::new([1, 2])));
        h.inject(&notify).await;

        assert_eq!(listener.events(), vec!["update"]);
    }

    /// After deregister the scope has no listener and NOTIFY deliveries
    /// are dropped.
    #[tokio::test]
    async fn test_deregister_stops_notify_delivery() {
        let h = Harness::new();
        let listener = RecordingListener::new();

        // Register.
        let task = {
            let h = h.clone();
            let listener = listener.clone();
            tokio::spawn(async move {
                h.send
                    .register(
                        &h.details(),
                        &h.operation(InteractionType::PubSub),
                        MessageBody::Empty,
                        listener,
                    )
                    .await
            })
        };
        let register_init = h.next_sent().await;
        h.inject(&h.broker_reply_to(&register_init, stage::REGISTER_ACK, MessageBody::Empty))
            .await;
        task.await.expect("join").expect("register");

        // Deregister.
        let task = {
            let h = h.clone();
            tokio::spawn(async move {
                h.send
                    .deregister(
                        &h.details(),
                        &h.operation(InteractionType::PubSub),
                        MessageBody::Empty,
                    )
                    .await
            })
        };
        let deregister_init = h.next_sent().await;
        assert_eq!(deregister_init.header.stage, stage::DEREGISTER);
        h.inject(&h.broker_reply_to(&deregister_init, stage::DEREGISTER_ACK, MessageBody::Empty))
            .await;
        task.await.expect("join").expect("deregister");

        // A late NOTIFY finds no listener; dropped without callbacks.
        h.inject(&h.broker_reply_to(&register_init, stage::NOTIFY, MessageBody::Empty))
            .await;
        assert!(listener.events().is_empty());
        assert_eq!(h.pmap.notify_listener_count(), 0);
    }

    /// Publish-register is idempotent per scope: the second registration
    /// keeps the first transaction id.
    #[tokio::test]
    async fn test_publish_register_idempotent_per_scope() {
        let h = Harness::new();

        let mut ids = Vec::new();
        for _ in 0..2 {
            let task = {
                let h = h.clone();
                tokio::spawn(async move {
                    h.send
                        .publish_register(
                            &h.details(),
                            &h.operation(InteractionType::PubSub),
                            MessageBody::Empty,
                        )
                        .await
                })
            };
            let init = h.next_sent().await;
            assert_eq!(init.header.stage, stage::PUBLISH_REGISTER);
            h.inject(&h.broker_reply_to(&init, stage::PUBLISH_REGISTER_ACK, MessageBody::Empty))
                .await;
            ids.push(
                timeout(Duration::from_secs(2), task)
                    .await
                    .expect("no hang")
                    .expect("join")
                    .expect("publish register"),
            );
        }

        assert_eq!(ids[0], ids[1], "second registration must keep the first id");
        assert_eq!(
            h.pmap.publish_transaction(&h.details().scope_key()),
            Some(ids[0])
        );
    }

    /// publish uses the registered transaction id; after
    /// publish-deregister the scope has no id and publish fails.
    #[tokio::test]
    async fn test_publish_lifecycle() {
        let h = Harness::new();
        let op = h.operation(InteractionType::PubSub);

        // Register as publisher.
        let task = {
            let h = h.clone();
            tokio::spawn(async move {
                h.send
                    .publish_register(
                        &h.details(),
                        &h.operation(InteractionType::PubSub),
                        MessageBody::Empty,
                    )
                    .await
            })
        };
        let init = h.next_sent().await;
        h.inject(&h.broker_reply_to(&init, stage::PUBLISH_REGISTER_ACK, MessageBody::Empty))
            .await;
        let id = task.await.expect("join").expect("publish register");

        // Publish goes out under the registered id, straight to the broker.
        h.send
            .publish(&h.details(), &op, MessageBody::Data(Blob::new([3, 1, 4])))
            .await
            .expect("publish");
        let published = h.next_sent().await;
        assert_eq!(published.header.stage, stage::PUBLISH);
        assert_eq!(published.header.transaction_id, id);
        assert_eq!(published.header.uri_to.as_str(), BROKER_URI);

        // Deregister as publisher.
        let task = {
            let h = h.clone();
            tokio::spawn(async move {
                h.send
                    .publish_deregister(&h.details(), &h.operation(InteractionType::PubSub))
                    .await
            })
        };
        let init = h.next_sent().await;
        assert_eq!(init.header.stage, stage::PUBLISH_DEREGISTER);
        h.inject(&h.broker_reply_to(&init, stage::PUBLISH_DEREGISTER_ACK, MessageBody::Empty))
            .await;
        task.await.expect("join").expect("publish deregister");

        // No registration left for the scope.
        let result = h.send.publish(&h.details(), &op, MessageBody::Empty).await;
        assert!(matches!(result, Err(MalError::PublishNotRegistered { .. })));
    }

    /// Scenario: an inbound delivery that fails to decode produces a
    /// communication error on the originating channel and delivers nothing
    /// to any transaction.
    #[tokio::test]
    async fn test_decode_failure_reports_channel_error_only() {
        let h = Harness::new();

        // A synchronous INVOKE is in flight.
        let task = {
            let h = h.clone();
            tokio::spawn(async move {
                h.send
                    .synchronous_interaction(
                        &h.details(),
                        &h.operation(InteractionType::Invoke),
                        stage::INVOKE,
                        MessageBody::Empty,
                    )
                    .await
            })
        };
        let init = h.next_sent().await;

        // Garbage arrives from the provider's channel.
        let channel = TestChannel::connected(PROVIDER_URI);
        h.inject_raw(&[0xDE, 0xAD, 0xBE], channel.clone()).await;
        assert!(channel.is_closed(), "undecodable channel must be torn down");

        // The in-flight transaction was not failed by the garbage...
        assert_eq!(h.imap.live_transactions(), 1);

        // ...and still completes normally.
        h.inject(&h.reply_to(&init, stage::INVOKE_ACK, MessageBody::Empty))
            .await;
        h.inject(&h.reply_to(&init, stage::INVOKE_RESPONSE, MessageBody::Empty))
            .await;
        let result = timeout(Duration::from_secs(2), task)
            .await
            .expect("no hang")
            .expect("join");
        assert!(result.is_ok());
    }

    /// A partial fragment is a no-op, not an error.
    #[tokio::test]
    async fn test_fragmented_delivery_is_not_an_error() {
        let h = Harness::new();
        let channel = TestChannel::connected(PROVIDER_URI);

        h.inject_raw(&[], channel.clone()).await;

        assert!(!channel.is_closed());
        assert_eq!(h.dispatcher.channel_count(), 0);
    }

    /// Asynchronous publisher registration delivers the control ack
    /// through the listener and still records the scope id.
    #[tokio::test]
    async fn test_publish_register_async_ack_callback() {
        let h = Harness::new();
        let listener = RecordingListener::new();

        let id = h
            .send
            .publish_register_async(
                &h.details(),
                &h.operation(InteractionType::PubSub),
                MessageBody::Empty,
                listener.clone(),
            )
            .await
            .expect("send");

        let init = h.next_sent().await;
        h.inject(&h.broker_reply_to(&init, stage::PUBLISH_REGISTER_ACK, MessageBody::Empty))
            .await;

        assert_eq!(listener.events(), vec!["ack"]);
        assert_eq!(
            h.pmap.publish_transaction(&h.details().scope_key()),
            Some(id)
        );
    }
}
