use super::{crisis_reply, test_runtime, v1_reply};
use mindbridge::ui::CRISIS_HOTLINES;
use mindbridge::{ChatApp, LineOutcome, Services};
use mindbridge_core::api::mock::ScriptedTransport;
use mindbridge_core::{ClientSettings, Language, LocalStore};
use serde_json::json;
use std::sync::Arc;

async fn start(transport: &ScriptedTransport, store: LocalStore, language: Language) -> ChatApp {
    let settings = ClientSettings {
        language,
        ..ClientSettings::default()
    };
    transport.push_json(200, json!({"access_token": "t", "user_id": "user_r"}));
    let services = Services::new(&settings, store, Arc::new(transport.clone()));
    ChatApp::start(services, &settings).await
}

#[test]
fn crisis_alert_stays_until_dismissed() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let transport = ScriptedTransport::new();
        let app = start(&transport, LocalStore::in_memory(), Language::Ko).await;
        transport.push_json(200, crisis_reply("s"));
        transport.push_json(200, v1_reply("s", "조금 나아졌어요", "calm"));

        let LineOutcome::Continue(lines) = app.handle_line("너무 힘들어요").await else {
            panic!("chat line should not quit");
        };
        let alert = lines.last().expect("alert line");
        assert!(alert.contains("Counselling centre: 1393"));
        for hotline in &CRISIS_HOTLINES {
            assert!(alert.contains(hotline.number));
            assert!(alert.contains(hotline.name_ko));
        }

        assert_eq!(app.handle_line("/dismiss").await, LineOutcome::Continue(Vec::new()));
        let LineOutcome::Continue(lines) = app.handle_line("고마워요").await else {
            panic!("chat line should not quit");
        };
        assert!(lines.iter().all(|line| !line.contains("1577-0199")));
    });
}

#[test]
fn restored_transcript_is_printed_on_start() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let store = LocalStore::in_memory();
        {
            let transport = ScriptedTransport::new();
            let app = start(&transport, store.clone(), Language::En).await;
            transport.push_json(200, v1_reply("s", "Welcome back.", "happy"));
            app.exchange("hi").await;
            app.shutdown().await;
        }

        let transport = ScriptedTransport::new();
        let app = start(&transport, store, Language::En).await;
        assert_eq!(
            app.transcript(),
            vec![
                "You: hi".to_string(),
                "😊 MindBridge [happy]: Welcome back.".to_string(),
            ]
        );
    });
}

#[test]
fn clear_command_forgets_the_session() {
    let runtime = test_runtime();
    runtime.block_on(async {
        let transport = ScriptedTransport::new();
        let app = start(&transport, LocalStore::in_memory(), Language::En).await;
        transport.push_json(200, v1_reply("s", "ok", "neutral"));
        app.exchange("hello").await;

        assert_eq!(
            app.handle_line("/clear").await,
            LineOutcome::Continue(vec!["Conversation cleared.".to_string()])
        );
        assert!(app.coordinator().snapshot().messages.is_empty());
        assert_eq!(app.summary().await.unwrap(), None);
    });
}
