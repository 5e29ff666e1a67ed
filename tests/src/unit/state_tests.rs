use super::{crisis_reply, paused_runtime, test_runtime, v1_reply, Harness, DEBOUNCE_PASSED};
use mindbridge_core::api::mock::RequestGate;
use mindbridge_core::state::{MESSAGES_KEY, SESSION_ID_KEY};
use mindbridge_core::{LocalStore, Message, MessageRole};
use tempfile::TempDir;

#[test]
fn hello_exchange_records_user_and_assistant() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        h.transport
            .push_json(200, v1_reply("session_42", "안녕하세요, 무엇이 힘드셨나요?", "neutral"));

        h.chat.send_message("hello").await;

        let snapshot = h.chat.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].role, MessageRole::User);
        assert_eq!(snapshot.messages[0].content, "hello");
        assert_eq!(snapshot.messages[1].role, MessageRole::Assistant);
        assert_eq!(snapshot.messages[1].emotion.as_deref(), Some("neutral"));
        assert_eq!(snapshot.messages[1].is_crisis, Some(false));
        assert_eq!(snapshot.session_id.as_deref(), Some("session_42"));
        assert_eq!(snapshot.current_emotion.unwrap().label, "neutral");
        assert_eq!(snapshot.techniques, vec!["deep breathing".to_string()]);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.error, None);

        let request = h.transport.last_request().unwrap();
        let body = request.body.clone().unwrap();
        assert_eq!(body["user_id"], "user_test");
        assert!(body.get("session_id").is_none());
        assert_eq!(request.header("authorization"), Some("Bearer access-1"));
    });
}

#[test]
fn every_successful_send_adds_two_messages() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        for turn in 0..4 {
            h.transport
                .push_json(200, v1_reply("session_1", &format!("reply {turn}"), "calm"));
            h.chat.send_message(&format!("message {turn}")).await;
            assert_eq!(h.chat.snapshot().messages.len(), 2 * (turn + 1));
        }

        let requests = h.transport.requests();
        assert_eq!(requests[2].body.as_ref().unwrap()["session_id"], "session_1");
    });
}

#[test]
fn failed_send_leaves_history_untouched() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        h.transport.push_json(200, v1_reply("s", "first", "calm"));
        h.chat.send_message("first").await;
        let before = h.chat.snapshot().messages;

        h.transport.push_status(401);
        h.chat.send_message("second").await;

        let snapshot = h.chat.snapshot();
        assert_eq!(snapshot.messages, before);
        assert_eq!(snapshot.error.as_deref(), Some("인증이 필요합니다."));
        assert!(!snapshot.is_loading);

        h.chat.clear_error();
        assert_eq!(h.chat.snapshot().error, None);
    });
}

#[test]
fn transient_failures_are_retried_inside_one_send() {
    let runtime = paused_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        let auth_calls = h.transport.calls();
        h.transport.push_status(503);
        h.transport.push_status(503);
        h.transport.push_json(200, v1_reply("s", "made it", "hopeful"));

        h.chat.send_message("are you there?").await;

        assert_eq!(h.transport.calls() - auth_calls, 3);
        let snapshot = h.chat.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].content, "made it");
    });
}

#[test]
fn only_one_send_is_in_flight() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        let gate = RequestGate::new();
        h.transport.gate_next(gate.clone());
        h.transport.push_json(200, v1_reply("s", "slow reply", "calm"));
        let auth_calls = h.transport.calls();

        let chat = h.chat.clone();
        let first = tokio::spawn(async move { chat.send_message("first").await });
        gate.arrived().await;

        let during = h.chat.snapshot();
        assert!(during.is_loading);
        assert_eq!(during.messages.len(), 1);

        h.chat.send_message("second").await;
        assert_eq!(h.chat.snapshot().messages.len(), 1);
        assert_eq!(h.transport.calls() - auth_calls, 1);

        gate.release();
        first.await.expect("send task");

        let after = h.chat.snapshot();
        assert!(!after.is_loading);
        assert_eq!(after.messages.len(), 2);
        assert_eq!(after.messages[0].content, "first");
    });
}

#[test]
fn blank_input_and_missing_auth_are_no_ops() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::new(LocalStore::in_memory());
        h.chat.send_message("hello").await;
        assert!(h.chat.snapshot().messages.is_empty());
        assert_eq!(h.transport.calls(), 0);
        assert!(h.chat.restore().is_err());

        h.transport.push_status(500);
        h.auth.initialize().await;
        h.chat.send_message("   \n").await;
        assert!(h.chat.snapshot().messages.is_empty());
        assert_eq!(h.transport.calls(), 1);
    });
}

#[test]
fn crisis_replies_raise_the_alert() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        h.transport.push_json(200, crisis_reply("s-crisis"));

        h.chat.send_message("I can't go on").await;

        let snapshot = h.chat.snapshot();
        assert!(snapshot.show_crisis_alert);
        assert_eq!(snapshot.messages[1].is_crisis, Some(true));
        assert_eq!(snapshot.messages[1].emotion.as_deref(), Some("hopeless"));
        assert_eq!(snapshot.current_emotion.unwrap().label, "hopeless");
        assert_eq!(
            h.chat
                .safety_resources()
                .unwrap()
                .get("Counselling centre")
                .map(String::as_str),
            Some("1393")
        );

        h.chat.dismiss_crisis_alert();
        assert!(!h.chat.snapshot().show_crisis_alert);
    });
}

#[test]
fn clear_chat_after_five_exchanges_empties_everything() {
    let runtime = paused_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        for turn in 0..5 {
            h.transport
                .push_json(200, v1_reply("session_5", &format!("reply {turn}"), "sad"));
            h.chat.send_message(&format!("message {turn}")).await;
        }
        assert_eq!(h.chat.snapshot().messages.len(), 10);
        h.chat.flush().await;
        assert!(h.store.get_item(MESSAGES_KEY).unwrap().is_some());

        h.chat.clear_chat();
        tokio::time::sleep(DEBOUNCE_PASSED).await;
        h.chat.flush().await;

        let snapshot = h.chat.snapshot();
        assert!(snapshot.messages.is_empty());
        assert_eq!(snapshot.session_id, None);
        assert_eq!(snapshot.current_emotion, None);
        assert!(snapshot.techniques.is_empty());
        assert_eq!(h.store.get_item(MESSAGES_KEY).unwrap(), None);
        assert_eq!(h.store.get_item(SESSION_ID_KEY).unwrap(), None);
    });
}

#[test]
fn cleared_conversation_is_not_restored_after_a_crash() {
    let runtime = test_runtime();
    let dir = TempDir::new().unwrap();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::open(dir.path()).unwrap()).await;
        h.transport.push_json(200, v1_reply("session_c", "hi", "calm"));
        h.chat.send_message("hello").await;
        h.chat.flush().await;

        h.chat.clear_chat();
        assert_eq!(h.store.get_item(MESSAGES_KEY).unwrap(), None);
        assert_eq!(h.store.get_item(SESSION_ID_KEY).unwrap(), None);
    });
    drop(runtime);

    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::open(dir.path()).unwrap()).await;
        assert_eq!(h.chat.restore(), Ok(true));
        let snapshot = h.chat.snapshot();
        assert!(snapshot.messages.is_empty());
        assert_eq!(snapshot.session_id, None);
    });
}

#[test]
fn conversation_survives_a_restart() {
    let temp_dir = TempDir::new().expect("temp dir");
    let runtime = paused_runtime();

    let first_messages = runtime.block_on(async {
        let store = LocalStore::open(temp_dir.path()).expect("store");
        let h = Harness::signed_in(store).await;
        h.transport.push_json(200, v1_reply("session_disk", "saved reply", "calm"));
        h.chat.send_message("remember me").await;
        tokio::time::sleep(DEBOUNCE_PASSED).await;
        h.chat.snapshot().messages
    });

    runtime.block_on(async {
        let store = LocalStore::open(temp_dir.path()).expect("store");
        let h = Harness::new(store);
        h.auth.initialize().await;
        // Stored credentials mean no sign-in request.
        assert_eq!(h.transport.calls(), 0);

        assert_eq!(h.chat.restore(), Ok(true));
        let snapshot = h.chat.snapshot();
        assert_eq!(snapshot.session_id.as_deref(), Some("session_disk"));
        assert_eq!(snapshot.messages, first_messages);

        let stored: Vec<Message> =
            serde_json::from_str(&h.store.get_item(MESSAGES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 2);
    });
}

#[test]
fn unavailable_storage_does_not_break_chat() {
    let runtime = paused_runtime();
    runtime.block_on(async {
        let h = Harness::new(LocalStore::unavailable());
        h.transport.push_json(200, serde_json::json!({"access_token": "a"}));
        let auth = h.auth.initialize().await;
        assert!(auth.is_authenticated);

        h.transport.push_json(200, v1_reply("s", "still here", "calm"));
        h.chat.send_message("hello").await;
        tokio::time::sleep(DEBOUNCE_PASSED).await;
        h.chat.flush().await;

        let snapshot = h.chat.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.session_id.as_deref(), Some("s"));
    });
}
