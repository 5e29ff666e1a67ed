//! Plain-text rendering for the terminal client.

use mindbridge_core::{ChatSnapshot, Language, Message, MessageRole};
use std::collections::BTreeMap;
use std::fmt::Write;

pub struct Hotline {
    pub number: &'static str,
    pub name_ko: &'static str,
    pub name_en: &'static str,
}

pub const CRISIS_HOTLINES: [Hotline; 4] = [
    Hotline {
        number: "1393",
        name_ko: "자살예방상담전화",
        name_en: "Suicide Prevention Hotline",
    },
    Hotline {
        number: "1577-0199",
        name_ko: "정신건강위기상담전화",
        name_en: "Mental Health Crisis Hotline",
    },
    Hotline {
        number: "112",
        name_ko: "아동학대신고",
        name_en: "Child Abuse Report",
    },
    Hotline {
        number: "1366",
        name_ko: "여성긴급전화",
        name_en: "Women's Emergency Hotline",
    },
];

const FALLBACK_EMOJI: &str = "💭";

pub fn emotion_emoji(label: &str) -> &'static str {
    match label.to_ascii_lowercase().as_str() {
        "happy" | "content" => "😊",
        "joy" => "😄",
        "excited" => "🤩",
        "grateful" => "🙏",
        "hopeful" => "🌟",
        "calm" => "😌",
        "peaceful" => "☮️",
        "relaxed" => "😴",
        "neutral" => "😐",
        "confused" => "😕",
        "sad" => "😢",
        "lonely" => "😔",
        "disappointed" => "😞",
        "anxious" => "😰",
        "worried" => "😟",
        "nervous" => "😬",
        "stressed" => "😫",
        "angry" => "😠",
        "frustrated" => "😤",
        "irritated" => "😑",
        "tired" => "😪",
        "exhausted" => "🥱",
        _ => FALLBACK_EMOJI,
    }
}

fn role_badge(role: MessageRole, language: Language) -> &'static str {
    match role {
        MessageRole::User => language.pick("나", "You"),
        MessageRole::Assistant => "MindBridge",
    }
}

pub fn render_message(message: &Message, language: Language) -> String {
    let badge = role_badge(message.role, language);
    match (message.role, message.emotion.as_deref()) {
        (MessageRole::Assistant, Some(emotion)) => {
            format!("{} {badge} [{emotion}]: {}", emotion_emoji(emotion), message.content)
        }
        _ => format!("{badge}: {}", message.content),
    }
}

pub fn render_techniques(techniques: &[String], language: Language) -> Option<String> {
    if techniques.is_empty() {
        return None;
    }
    Some(format!(
        "{} {}",
        language.pick("추천 기법:", "Suggested techniques:"),
        techniques.join(", ")
    ))
}

pub fn render_crisis_alert(
    resources: Option<&BTreeMap<String, String>>,
    language: Language,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "!! {}",
        language.pick("도움이 필요하신가요?", "Need help?")
    );
    let _ = writeln!(
        out,
        "   {}",
        language.pick(
            "혼자 감당하지 않으셔도 됩니다. 전문 상담사가 도움을 드릴 수 있어요.",
            "You don't have to face this alone. Professional counselors are here to help.",
        )
    );
    if let Some(resources) = resources.filter(|resources| !resources.is_empty()) {
        for (name, contact) in resources {
            let _ = writeln!(out, "   - {name}: {contact}");
        }
    }
    for hotline in &CRISIS_HOTLINES {
        let name = language.pick(hotline.name_ko, hotline.name_en);
        let _ = writeln!(out, "   - {name}: {}", hotline.number);
    }
    let _ = write!(
        out,
        "   {}",
        language.pick(
            "대화를 계속하려면 /dismiss 를 입력하세요.",
            "Type /dismiss to continue the conversation.",
        )
    );
    out
}

pub fn render_error(error: &str) -> String {
    format!("⚠ {error}")
}

pub fn help_text(language: Language) -> &'static str {
    language.pick(
        "/clear    대화 기록 지우기\n/logout   로그아웃\n/dismiss  위기 알림 닫기\n/help     도움말\n/quit     종료",
        "/clear    clear the conversation\n/logout   sign out\n/dismiss  close the crisis alert\n/help     show this help\n/quit     exit",
    )
}

/// Everything appended to the conversation since `seen` messages, plus the
/// alert, error and technique lines the snapshot carries.
pub fn render_update(snapshot: &ChatSnapshot, seen: usize, language: Language) -> Vec<String> {
    let mut lines: Vec<String> = snapshot
        .messages
        .iter()
        .skip(seen)
        .filter(|message| message.role == MessageRole::Assistant)
        .map(|message| render_message(message, language))
        .collect();
    if let Some(error) = &snapshot.error {
        lines.push(render_error(error));
    }
    if let Some(techniques) = render_techniques(&snapshot.techniques, language) {
        if seen < snapshot.messages.len() {
            lines.push(techniques);
        }
    }
    if snapshot.show_crisis_alert {
        lines.push(render_crisis_alert(
            snapshot.safety_resources.as_ref(),
            language,
        ));
    }
    lines
}
