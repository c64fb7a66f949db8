use regex::Regex;
use rig::completion::{CompletionError, PromptError};
use std::sync::LazyLock;

use crate::llm::client::LlmError;

/// 上游临时故障的特征文本
const TRANSIENT_MARKERS: [&str; 14] = [
    "rate limit",
    "rate_limit",
    "too many requests",
    "overloaded",
    "timed out",
    "timeout",
    "temporarily unavailable",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
    "internal server error",
    "error sending request",
    "connection refused",
    "connection reset",
];

/// 紧跟在 status/HTTP/code 之后的 429 或 5xx 状态码
static STATUS_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:status(?:\s+code)?|http(?:/[\d.]+)?|code)\b[\s:=]*(?:429|5\d\d)\b").ok()
});

/// 判断错误描述是否对应可重试的临时故障
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return true;
    }
    STATUS_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(message))
}

/// 将rig的调用错误归类为统一的LlmError
pub fn classify_prompt_error(err: PromptError) -> LlmError {
    let message = err.to_string();
    let retryable = match &err {
        // 传输层错误一律可重试
        PromptError::CompletionError(CompletionError::HttpError(_)) => true,
        PromptError::CompletionError(CompletionError::ProviderError(detail)) => {
            is_transient_message(detail)
        }
        _ => is_transient_message(&message),
    };

    LlmError::GenerationFailed { retryable, message }
}

/// 去掉模型输出外层的markdown代码块标记
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // 跳过语言标记，例如 ```json
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_messages() {
        assert!(is_transient_message("HTTP 429 Too Many Requests"));
        assert!(is_transient_message("Anthropic API is Overloaded"));
        assert!(is_transient_message("upstream returned status 503"));
        assert!(is_transient_message("HTTP/1.1 502"));
        assert!(is_transient_message("error code: 500"));
        assert!(is_transient_message("request timed out"));
        assert!(!is_transient_message("invalid x-api-key"));
        assert!(!is_transient_message("model not found"));
        assert!(!is_transient_message("failed to connect tool schema"));
        assert!(!is_transient_message("prompt has 5000 tokens, limit is 4096"));
    }

    #[test]
    fn test_provider_error_classification() {
        let err = PromptError::CompletionError(CompletionError::ProviderError(
            "rate limit exceeded".to_string(),
        ));
        assert!(classify_prompt_error(err).is_retryable());

        let err = PromptError::CompletionError(CompletionError::ProviderError(
            "invalid api key".to_string(),
        ));
        let classified = classify_prompt_error(err);
        assert!(!classified.is_retryable());
        assert!(matches!(classified, LlmError::GenerationFailed { .. }));
    }

    #[test]
    fn test_context_length_overflow_is_not_retryable() {
        let message = "This model's maximum context length is 128000 tokens. \
                       However, you requested 135000 tokens.";
        assert!(!is_transient_message(message));

        let err = PromptError::CompletionError(CompletionError::ProviderError(message.to_string()));
        let classified = classify_prompt_error(err);
        assert!(!classified.is_retryable());
        assert!(matches!(
            classified,
            LlmError::GenerationFailed {
                retryable: false,
                ..
            }
        ));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[1, 2]\n```  "), "[1, 2]");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"open\": true}"), "{\"open\": true}");
    }
}
