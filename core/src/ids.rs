use chrono::Utc;
use uuid::Uuid;

const RANDOM_SUFFIX_LEN: usize = 9;

/// Opaque identifier made of the current epoch milliseconds and a random
/// suffix, e.g. `1718000000000_3f9a0c2de`.
pub fn time_random_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}",
        Utc::now().timestamp_millis(),
        &random[..RANDOM_SUFFIX_LEN]
    )
}

pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", time_random_id())
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
