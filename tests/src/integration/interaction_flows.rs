//! # Interaction Pattern Flows
//!
//! End-to-end scenarios for SUBMIT, REQUEST, INVOKE and PROGRESS: the
//! consumer initiates through the send orchestrator, the "provider" is the
//! test crafting replies, and every reply travels through the real wire
//! codec and dispatch pipeline.

#[cfg(test)]
mod tests {
    use crate::harness::Harness;
    use mal_types::{
        errors::error_number, stage, Blob, InteractionType, MalError, MessageBody, StandardError,
    };
    use rand::seq::SliceRandom;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Scenario: INVOKE happy path, synchronous caller.
    ///
    /// The consumer sends INVOKE-init, the provider replies with a plain
    /// ack then a response; the blocked caller receives the response body.
    #[tokio::test]
    async fn test_invoke_sync_ack_then_response() {
        let h = Harness::new();
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
        assert_eq!(init.header.stage, stage::INVOKE);

        h.inject(&h.reply_to(&init, stage::INVOKE_ACK, MessageBody::Empty))
            .await;
        let response_body = MessageBody::Data(Blob::new([7, 7, 7]));
        h.inject(&h.reply_to(&init, stage::INVOKE_RESPONSE, response_body.clone()))
            .await;

        let result = timeout(Duration::from_secs(2), task)
            .await
            .expect("no hang")
            .expect("join")
            .expect("response");
        assert_eq!(result.header.stage, stage::INVOKE_RESPONSE);
        assert_eq!(result.body, response_body);
        assert_eq!(h.imap.live_transactions(), 0);

        // A duplicate response after the terminal stage is a silent drop.
        h.inject(&h.reply_to(&init, stage::INVOKE_RESPONSE, MessageBody::Empty))
            .await;
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// Scenario: INVOKE happy path, asynchronous caller.
    #[tokio::test]
    async fn test_invoke_async_ack_then_response_callbacks() {
        let h = Harness::new();
        let listener = crate::harness::RecordingListener::new();

        h.send
            .asynchronous_interaction(
                &h.details(),
                &h.operation(InteractionType::Invoke),
                stage::INVOKE,
                listener.clone(),
                MessageBody::Empty,
            )
            .await
            .expect("send");

        let init = h.next_sent().await;
        h.inject(&h.reply_to(&init, stage::INVOKE_ACK, MessageBody::Empty))
            .await;
        h.inject(&h.reply_to(&init, stage::INVOKE_RESPONSE, MessageBody::Empty))
            .await;

        assert_eq!(listener.events(), vec!["ack", "response"]);
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// Scenario: INVOKE terminated by an error ack.
    ///
    /// The interaction ends at the ack; no response is awaited and the
    /// synchronous caller's wait raises the ack error.
    #[tokio::test]
    async fn test_invoke_sync_error_ack_terminates() {
        let h = Harness::new();
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
        h.inject(&h.reply_to(
            &init,
            stage::INVOKE_ACK,
            MessageBody::Error(StandardError::new(error_number::INTERNAL)),
        ))
        .await;

        let result = timeout(Duration::from_secs(2), task)
            .await
            .expect("no hang")
            .expect("join");
        match result {
            Err(MalError::Interaction(err)) => {
                assert_eq!(err.error_number, error_number::INTERNAL);
            }
            other => panic!("expected interaction error, got {other:?}"),
        }
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// Scenario: PROGRESS with two updates, asynchronous caller.
    ///
    /// Exactly one ack, two updates and one response, in order.
    #[tokio::test]
    async fn test_progress_async_update_stream() {
        let h = Harness::new();
        let listener = crate::harness::RecordingListener::new();

        h.send
            .asynchronous_interaction(
                &h.details(),
                &h.operation(InteractionType::Progress),
                stage::PROGRESS,
                listener.clone(),
                MessageBody::Empty,
            )
            .await
            .expect("send");

        let init = h.next_sent().await;
        h.inject(&h.reply_to(&init, stage::PROGRESS_ACK, MessageBody::Empty))
            .await;
        h.inject(&h.reply_to(&init, stage::PROGRESS_UPDATE, MessageBody::Data(Blob::new([1]))))
            .await;
        h.inject(&h.reply_to(&init, stage::PROGRESS_UPDATE, MessageBody::Data(Blob::new([2]))))
            .await;
        h.inject(&h.reply_to(&init, stage::PROGRESS_RESPONSE, MessageBody::Empty))
            .await;

        assert_eq!(listener.events(), vec!["ack", "update", "update", "response"]);
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// SUBMIT round-trip: the ack is the terminal message.
    #[tokio::test]
    async fn test_submit_sync_ack() {
        let h = Harness::new();
        let task = {
            let h = h.clone();
            tokio::spawn(async move {
                h.send
                    .synchronous_interaction(
                        &h.details(),
                        &h.operation(InteractionType::Submit),
                        stage::SUBMIT,
                        MessageBody::Data(Blob::new([9])),
                    )
                    .await
            })
        };

        let init = h.next_sent().await;
        h.inject(&h.reply_to(&init, stage::SUBMIT_ACK, MessageBody::Empty))
            .await;

        let result = timeout(Duration::from_secs(2), task)
            .await
            .expect("no hang")
            .expect("join")
            .expect("ack");
        assert_eq!(result.header.stage, stage::SUBMIT_ACK);
    }

    /// An out-of-order stage always terminates with INCORRECT_STATE, never
    /// a silent acceptance.
    #[tokio::test]
    async fn test_response_without_ack_is_incorrect_state() {
        let h = Harness::new();
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
        // Response with no preceding ack.
        h.inject(&h.reply_to(&init, stage::INVOKE_RESPONSE, MessageBody::Empty))
            .await;

        let result = timeout(Duration::from_secs(2), task)
            .await
            .expect("no hang")
            .expect("join");
        match result {
            Err(MalError::Interaction(err)) => {
                assert_eq!(err.error_number, error_number::INCORRECT_STATE);
            }
            other => panic!("expected INCORRECT_STATE, got {other:?}"),
        }
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// A violation after the ack surfaces on the response-error side of an
    /// asynchronous listener.
    #[tokio::test]
    async fn test_double_ack_surfaces_response_error() {
        let h = Harness::new();
        let listener = crate::harness::RecordingListener::new();

        h.send
            .asynchronous_interaction(
                &h.details(),
                &h.operation(InteractionType::Progress),
                stage::PROGRESS,
                listener.clone(),
                MessageBody::Empty,
            )
            .await
            .expect("send");

        let init = h.next_sent().await;
        h.inject(&h.reply_to(&init, stage::PROGRESS_ACK, MessageBody::Empty))
            .await;
        h.inject(&h.reply_to(&init, stage::PROGRESS_ACK, MessageBody::Empty))
            .await;

        assert_eq!(
            listener.events(),
            vec![
                "ack".to_owned(),
                format!("response_error:{}", error_number::INCORRECT_STATE)
            ]
        );
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// Many synchronous callers in flight at once: every waiter gets its
    /// own response back.
    #[tokio::test]
    async fn test_concurrent_synchronous_requests() {
        let h = Harness::new();
        let mut tasks = Vec::new();

        for i in 0..16u8 {
            let h = h.clone();
            tasks.push(tokio::spawn(async move {
                let body = MessageBody::Data(Blob::new([i]));
                let result = h
                    .send
                    .synchronous_interaction(
                        &h.details(),
                        &h.operation(InteractionType::Request),
                        stage::REQUEST,
                        body.clone(),
                    )
                    .await;
                (body, result)
            }));
        }

        // The provider echoes each request body into its response, replying
        // in an order unrelated to the order the requests went out.
        let mut inits = Vec::new();
        for _ in 0..16 {
            inits.push(h.next_sent().await);
        }
        inits.shuffle(&mut rand::thread_rng());
        for init in &inits {
            let echo = init.body.clone();
            h.inject(&h.reply_to(init, stage::REQUEST_RESPONSE, echo))
                .await;
        }

        for task in tasks {
            let (sent_body, result) = timeout(Duration::from_secs(2), task)
                .await
                .expect("no hang")
                .expect("join");
            let response = result.expect("response");
            assert_eq!(response.body, sent_body);
        }
        assert_eq!(h.imap.live_transactions(), 0);
    }

    /// A caller that abandons its wait (timeout) leaves no stuck record:
    /// the late response is absorbed and the transaction reaped.
    #[tokio::test]
    async fn test_abandoned_wait_is_reaped_on_late_reply() {
        let h = Harness::new();

        let result = timeout(
            Duration::from_millis(50),
            h.send.synchronous_interaction(
                &h.details(),
                &h.operation(InteractionType::Request),
                stage::REQUEST,
                MessageBody::Empty,
            ),
        )
        .await;
        assert!(result.is_err(), "no reply was injected, the wait must time out");

        let init = h.next_sent().await;
        h.inject(&h.reply_to(&init, stage::REQUEST_RESPONSE, MessageBody::Empty))
            .await;
        assert_eq!(h.imap.live_transactions(), 0);
    }
}
