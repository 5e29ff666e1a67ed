use crate::locale::Language;

#[derive(thiserror::Error, Debug, Clone)]
pub enum ApiError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
    },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { retryable, .. } => *retryable,
            Self::MalformedResponse(_) => false,
        }
    }

    /// Short message suitable for showing to the person chatting.
    pub fn user_message(&self, language: Language) -> &'static str {
        match self {
            Self::Http { status, .. } => match status {
                400 => language.pick(
                    "요청을 처리할 수 없습니다.",
                    "Unable to process your request.",
                ),
                401 => language.pick("인증이 필요합니다.", "Authentication required."),
                403 => language.pick("접근 권한이 없습니다.", "Access denied."),
                404 => language.pick("요청한 내용을 찾을 수 없습니다.", "Not found."),
                429 => language.pick(
                    "요청이 너무 많습니다. 잠시 후 다시 시도해 주세요.",
                    "Too many requests. Please try again later.",
                ),
                500 => language.pick(
                    "서버에 일시적인 문제가 발생했습니다.",
                    "A temporary server error occurred.",
                ),
                503 => language.pick(
                    "서비스가 일시적으로 사용 불가능합니다.",
                    "Service temporarily unavailable.",
                ),
                _ => generic_message(language),
            },
            Self::Network(_) => language.pick(
                "네트워크 연결을 확인해 주세요.",
                "Please check your network connection.",
            ),
            Self::MalformedResponse(_) => generic_message(language),
        }
    }
}

fn generic_message(language: Language) -> &'static str {
    language.pick(
        "오류가 발생했습니다. 다시 시도해 주세요.",
        "An error occurred. Please try again.",
    )
}
