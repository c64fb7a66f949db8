use regex::Regex;
use std::sync::LazyLock;

/// 转换时整体丢弃的标签
const SKIPPED_TAGS: [&str; 10] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "iframe", "svg", "form",
];

static LINE_MARKER_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]+|[*+-][ \t]+|>[ \t]?|```.*$|(?:[-*_][ \t]*){3,}$)").ok()
});
static LINK_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").ok());
static STRONG_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\*\*|__").ok());
static EMPHASIS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*|\b_([^_\n]+)_\b").ok());
static CODE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"`+").ok());
static ESCAPE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!>|~])").ok());
static TAG_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());
static BLOCK_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|nav|header|footer)\b.*?</(script|style|noscript|nav|header|footer)>").ok()
});

/// 是否为HTML内容类型
pub fn is_html(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml")
}

/// 将HTML页面转换为可读文本：去掉脚本、样式与导航，压缩空白
pub fn html_to_text(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    let text = match converter.convert(html) {
        Ok(markdown) => markdown_to_plain(&markdown),
        Err(e) => {
            tracing::debug!(error = %e, "html conversion failed, falling back to tag stripping");
            strip_tags(html)
        }
    };

    collapse_whitespace(&text)
}

/// 去掉Markdown标记：链接只保留文字，删除标题、列表、强调与代码标记
fn markdown_to_plain(markdown: &str) -> String {
    let text = replace_with(&LINE_MARKER_PATTERN, markdown, "");
    let text = replace_with(&LINK_PATTERN, &text, "${1}");
    let text = replace_with(&STRONG_PATTERN, &text, "");
    let text = replace_with(&EMPHASIS_PATTERN, &text, "${1}${2}");
    let text = replace_with(&CODE_PATTERN, &text, "");
    replace_with(&ESCAPE_PATTERN, &text, "${1}")
}

fn replace_with(pattern: &LazyLock<Option<Regex>>, text: &str, replacement: &str) -> String {
    match pattern.as_ref() {
        Some(pattern) => pattern.replace_all(text, replacement).into_owned(),
        None => text.to_string(),
    }
}

/// 粗粒度的标签剥离
fn strip_tags(html: &str) -> String {
    let without_blocks = replace_with(&BLOCK_PATTERN, html, " ");
    replace_with(&TAG_PATTERN, &without_blocks, " ")
}

/// 把所有连续空白压缩为单个空格
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 按字符数截断，返回截断后的文本以及是否发生了截断
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}
