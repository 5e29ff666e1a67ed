use super::{test_runtime, v1_reply, Harness};
use mindbridge_core::auth::{ANONYMOUS_ID_KEY, USER_ID_KEY};
use mindbridge_core::security::ACCESS_TOKEN;
use mindbridge_core::{AuthError, LocalStore};
use serde_json::json;

#[test]
fn degraded_sign_in_still_chats_without_a_bearer_token() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::new(LocalStore::in_memory());
        h.transport.push_network_error("connection refused");
        let state = h.auth.initialize().await;
        assert!(!state.is_authenticated);

        h.transport.push_json(200, v1_reply("s", "hi", "calm"));
        h.chat.send_message("hello").await;

        let request = h.transport.last_request().unwrap();
        assert_eq!(request.header("authorization"), None);
        assert_eq!(request.body.unwrap()["user_id"], state.user_id.as_str());
        assert_eq!(h.chat.snapshot().messages.len(), 2);
    });
}

#[test]
fn legacy_plain_tokens_are_picked_up_on_start() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let store = LocalStore::in_memory();
        store.set_item(ACCESS_TOKEN, "legacy-access").unwrap();
        store.set_item(USER_ID_KEY, "user_legacy").unwrap();
        let h = Harness::new(store.clone());

        let state = h.auth.initialize().await;

        assert!(state.is_authenticated);
        assert_eq!(state.user_id, "user_legacy");
        assert_eq!(h.auth.access_token().as_deref(), Some("legacy-access"));
        assert_eq!(store.get_item(ACCESS_TOKEN).unwrap(), None);
        assert_eq!(h.transport.calls(), 0);
    });
}

#[test]
fn logout_then_sign_in_again() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        h.store.set_item(ANONYMOUS_ID_KEY, "anon").unwrap();
        let user = h.auth.require().unwrap().user_id;

        h.auth.logout();
        assert_eq!(h.auth.access_token(), None);
        assert_eq!(h.store.get_item(ANONYMOUS_ID_KEY).unwrap(), None);

        h.transport
            .push_json(200, json!({"access_token": "access-2", "user_id": user.as_str()}));
        let again = h.auth.initialize().await;
        assert!(again.is_authenticated);
        assert_eq!(again.user_id, user);
        let body = h.transport.last_request().unwrap().body.unwrap();
        assert!(body["device_id"].as_str().unwrap().starts_with("device_"));
    });
}

#[test]
fn teardown_makes_accessors_fail() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let h = Harness::signed_in(LocalStore::in_memory()).await;
        assert!(h.auth.require().is_ok());

        h.auth.teardown();

        assert_eq!(h.auth.require(), Err(AuthError::NotInitialized));
        h.chat.send_message("anyone?").await;
        assert!(h.chat.snapshot().messages.is_empty());
    });
}
