//! 调研流程使用的提示词与模型输出解析

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generator::state::{Source, SourceCandidate};
use crate::llm::client::utils::strip_code_fence;

/// 提示词模板
pub struct PromptTemplate {
    pub system_prompt: String,
    pub opening_instruction: String,
    pub closing_instruction: String,
}

impl PromptTemplate {
    /// 拼接用户提示词
    pub fn render(&self, body: &str) -> String {
        format!(
            "{}\n\n{}\n{}",
            self.opening_instruction.trim_end(),
            body.trim(),
            self.closing_instruction
        )
    }
}

/// 来源推荐的期望输出结构
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProposalResponse {
    /// 推荐的来源列表
    pub results: Vec<SourceCandidate>,
}

fn framework_section(framework: &str) -> String {
    if framework.trim().is_empty() {
        String::new()
    } else {
        format!("\n\nRESEARCH FRAMEWORK:\n{}", framework.trim())
    }
}

pub fn proposal_template(max_sources: usize) -> PromptTemplate {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(ProposalResponse))
        .unwrap_or_default();

    PromptTemplate {
        system_prompt: "You are a meticulous research librarian. You recommend authoritative, publicly \
                        reachable web pages and answer with JSON only."
            .to_string(),
        opening_instruction: format!(
            "Find the {} most relevant web sources for the research question below.",
            max_sources
        ),
        closing_instruction: format!(
            r#"
For each source return the page title, its full URL (absolute http or https) and a brief summary
(2-3 sentences) of why it is relevant.

Your answer must be ONLY valid JSON matching this schema, without markdown or explanations:
{}"#,
            schema
        ),
    }
}

/// 生成来源推荐提示词，返回 (system_prompt, prompt)
pub fn build_proposal_prompt(query: &str, framework: &str, max_sources: usize) -> (String, String) {
    let template = proposal_template(max_sources);
    let body = format!("RESEARCH QUESTION: {}{}", query, framework_section(framework));
    (template.system_prompt.clone(), template.render(&body))
}

pub fn synthesis_template() -> PromptTemplate {
    PromptTemplate {
        system_prompt: "You are a research analyst. You write evidence-based reports and cite every claim."
            .to_string(),
        opening_instruction: "Analyze the following sources to answer the research question.".to_string(),
        closing_instruction: r#"
Based on these sources, provide a comprehensive research report with:
1. Executive Summary
2. Key Findings (bullet points)
3. Detailed Analysis (themes, patterns, data)
4. Source Reliability Assessment
5. Conclusion

FORMATTING RULES:
- Use clean formatting with clear section headings.
- CITATIONS: you MUST use standard Markdown links: [Source N](URL).
  - CORRECT: "Capacity doubled [Source 1](https://example.org)".
  - WRONG: "Source 1 (https://example.org)".
  - WRONG: "[Source 1]" without a link.
- When citing several sources, comma-separate them: ([Source 1](URL), [Source 2](URL)).
- If the sources do not answer part of the question, say so explicitly instead of guessing."#
            .to_string(),
    }
}

/// 生成结论合成提示词，返回 (system_prompt, prompt)
pub fn build_synthesis_prompt<'a>(
    query: &str,
    framework: &str,
    sources: impl IntoIterator<Item = &'a Source>,
) -> (String, String) {
    let sources_text = sources
        .into_iter()
        .enumerate()
        .map(|(i, source)| {
            format!(
                "SOURCE {}: {}\nURL: {}\nCONTENT: {}",
                i + 1,
                source.candidate.title,
                source.candidate.url,
                source.content
            )
        })
        .collect::<Vec<_>>();

    let sources_block = if sources_text.is_empty() {
        "(no source content could be retrieved; answer from general knowledge and state that no \
         sources were available)"
            .to_string()
    } else {
        sources_text.join("\n\n")
    };

    let template = synthesis_template();
    let body = format!(
        "RESEARCH QUESTION: {}{}\n\nSOURCES:\n{}",
        query,
        framework_section(framework),
        sources_block
    );
    (template.system_prompt.clone(), template.render(&body))
}

/// 来源推荐的解析结果
#[derive(Debug, Default)]
pub struct ParsedProposal {
    pub candidates: Vec<SourceCandidate>,
    /// 被跳过的条目说明
    pub issues: Vec<String>,
}

/// 宽松解析模型推荐的来源。支持 {"results": [...]}、裸数组、以及包了一层results的单元素数组。
pub fn parse_candidates(response: &str) -> Result<ParsedProposal, String> {
    let value = parse_json_value(response)?;

    let items = match value {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'results' is not a list".to_string()),
            None => return Err("response object has no 'results' field".to_string()),
        },
        Value::Array(items) => unwrap_nested_results(items),
        other => return Err(format!("unexpected JSON value: {}", type_name(&other))),
    };

    let mut parsed = ParsedProposal::default();
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<SourceCandidate>(item) {
            Ok(candidate) => parsed.candidates.push(candidate),
            Err(e) => parsed.issues.push(format!("result {} skipped: {}", i + 1, e)),
        }
    }
    Ok(parsed)
}

fn unwrap_nested_results(items: Vec<Value>) -> Vec<Value> {
    if let [Value::Object(only)] = items.as_slice()
        && !only.contains_key("url")
        && let Some(Value::Array(nested)) = only.get("results")
    {
        return nested.clone();
    }
    items
}

fn parse_json_value(response: &str) -> Result<Value, String> {
    let content = strip_code_fence(response);
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Ok(value);
    }

    // 模型可能在JSON前后附带说明文字
    let start = content.find(['{', '[']);
    let end = content.rfind(['}', ']']);
    if let (Some(start), Some(end)) = (start, end)
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&content[start..=end])
    {
        return Ok(value);
    }

    let preview: String = content.chars().take(200).collect();
    Err(format!("response is not valid JSON: {}", preview))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchStatus;

    #[test]
    fn test_parse_results_object_in_fence() {
        let response = "```json\n{\"results\": [{\"title\": \"IEA\", \"url\": \"https://iea.org\", \"summary\": \"Outlook\"}]}\n```";
        let parsed = parse_candidates(response).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].rationale, "Outlook");
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_parse_bare_list() {
        let response = r#"[{"title": "A", "url": "https://a.org", "rationale": "r"},
                           {"title": "B", "url": "https://b.org"}]"#;
        let parsed = parse_candidates(response).unwrap();
        assert_eq!(parsed.candidates.len(), 2);
        assert_eq!(parsed.candidates[1].rationale, "");
    }

    #[test]
    fn test_parse_single_element_wrapping_results() {
        let response = r#"[{"results": [{"title": "A", "url": "https://a.org", "summary": "s"}]}]"#;
        let parsed = parse_candidates(response).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].url, "https://a.org");
    }

    #[test]
    fn test_parse_json_surrounded_by_prose() {
        let response = "Here are the sources:\n{\"results\": [{\"title\": \"A\", \"url\": \"https://a.org\"}]}\nHope this helps.";
        assert_eq!(parse_candidates(response).unwrap().candidates.len(), 1);
    }

    #[test]
    fn test_parse_skips_malformed_items() {
        let response = r#"{"results": [{"title": "A", "url": "https://a.org"}, {"name": "missing url"}]}"#;
        let parsed = parse_candidates(response).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_candidates("I cannot browse the web.").is_err());
        assert!(parse_candidates("{\"sources\": []}").is_err());
    }

    #[test]
    fn test_proposal_prompt_contains_query_framework_and_schema() {
        let (system, prompt) =
            build_proposal_prompt("renewable energy trends", "Focus on Africa", 5);
        assert!(!system.is_empty());
        assert!(prompt.contains("renewable energy trends"));
        assert!(prompt.contains("Focus on Africa"));
        assert!(prompt.contains("\"results\""));
        assert!(prompt.contains("5 most relevant"));
    }

    #[test]
    fn test_synthesis_prompt_numbers_sources() {
        let sources = vec![Source {
            candidate: SourceCandidate {
                title: "IEA".to_string(),
                url: "https://iea.org".to_string(),
                rationale: String::new(),
            },
            content: "Solar doubled".to_string(),
            fetch_status: FetchStatus::Success,
            fetch_error: None,
        }];
        let (_, prompt) = build_synthesis_prompt("q", "", &sources);
        assert!(prompt.contains("SOURCE 1: IEA"));
        assert!(prompt.contains("CONTENT: Solar doubled"));
        assert!(!prompt.contains("RESEARCH FRAMEWORK"));

        let (_, empty) = build_synthesis_prompt("q", "", &Vec::<Source>::new());
        assert!(empty.contains("no source content"));
    }
}
