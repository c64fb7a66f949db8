//! 结果质量评估：来源相关性与结论质量，仅作参考，不影响流程结果

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

use crate::generator::state::{ResearchState, SourceCandidate};

const STOP_WORDS: [&str; 16] = [
    "the", "a", "an", "and", "or", "is", "are", "to", "in", "on", "of", "for", "with", "by",
    "this", "that",
];

const BLOCKED_DOMAINS: [&str; 5] = ["facebook", "instagram", "twitter", "pinterest", "tiktok"];

const VAGUE_QUALIFIERS: [&str; 9] = [
    "it seems",
    "maybe",
    "probably",
    "might be",
    "could be",
    "apparently",
    "i think",
    "in my opinion",
    "one could argue",
];

const CONTRADICTION_PAIRS: [(&str, &str); 5] = [
    ("yes", "no"),
    ("true", "false"),
    ("proven", "unproven"),
    ("exists", "does not exist"),
    ("found", "not found"),
];

/// 成对词语首次出现的间距小于该字符数时视为可能矛盾
const CONTRADICTION_WINDOW: usize = 200;

const STRUCTURE_MARKERS: [&str; 5] = ["##", "###", "**Key", "1.", "-"];

const CONCLUSION_MARKERS: [&str; 3] = ["conclusion", "summary", "overall"];

static CITATION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\[Source\s*\d+\]|\(Source\s*\d+\)").ok());

/// 单个来源的相关性评估
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceAssessment {
    pub title: String,
    pub url: String,
    pub accepted: bool,
    pub relevance_score: f64,
    pub reason: String,
}

/// 结论质量评估
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FindingsAssessment {
    pub is_valid: bool,
    pub quality_score: f64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QaReport {
    pub sources_validated: usize,
    pub sources_accepted: usize,
    pub sources: Vec<SourceAssessment>,
    pub findings: FindingsAssessment,
    /// 被接受来源的占比
    pub source_quality: f64,
    pub passed: bool,
}

impl QaReport {
    /// 基于最终状态生成报告，只读
    pub fn evaluate(state: &ResearchState) -> Self {
        let validator = SourceValidator::new(state.query());

        let candidates: Vec<&SourceCandidate> = if state.fetched_sources().is_empty() {
            state.proposed_sources().iter().collect()
        } else {
            state.fetched_sources().iter().map(|s| &s.candidate).collect()
        };

        let sources = candidates
            .into_iter()
            .map(|candidate| validator.assess(candidate))
            .collect::<Vec<_>>();
        let sources_accepted = sources.iter().filter(|s| s.accepted).count();

        let findings = assess_findings(
            state.findings().unwrap_or(""),
            state.usable_sources().count(),
        );

        Self {
            sources_validated: sources.len(),
            sources_accepted,
            source_quality: sources_accepted as f64 / sources.len().max(1) as f64,
            passed: sources_accepted > 0 && findings.is_valid,
            sources,
            findings,
        }
    }
}

/// 来源相关性校验
pub struct SourceValidator {
    keywords: Vec<String>,
}

impl SourceValidator {
    pub fn new(query: &str) -> Self {
        Self {
            keywords: extract_keywords(query),
        }
    }

    pub fn assess(&self, candidate: &SourceCandidate) -> SourceAssessment {
        let reject = |score: f64, reason: String| SourceAssessment {
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            accepted: false,
            relevance_score: score,
            reason,
        };

        let host = Url::parse(&candidate.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_lowercase))
            .unwrap_or_default();
        if !is_credible_domain(&host) {
            return reject(0.0, format!("domain '{}' is not credible", host));
        }

        let text = format!("{} {}", candidate.title, candidate.rationale).to_lowercase();
        let matches = self
            .keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .count();

        let score = if self.keywords.is_empty() {
            0.5
        } else {
            (matches as f64 / (self.keywords.len() as f64 * 0.5).max(1.0)).min(1.0)
        };

        if matches == 0 && !self.keywords.is_empty() {
            let expected = self.keywords.iter().take(3).cloned().collect::<Vec<_>>();
            return reject(score, format!("no query keywords found, expected: {}", expected.join(", ")));
        }

        let reason = if score < 0.2 {
            format!("low keyword match ({}/{})", matches, self.keywords.len())
        } else {
            "relevant to the query".to_string()
        };

        SourceAssessment {
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            accepted: true,
            relevance_score: score,
            reason,
        }
    }
}

/// 提取查询关键词：小写、去掉停用词与标点，只保留长度大于2的词
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(|word| {
            word.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
                .to_string()
        })
        .filter(|word| word.chars().count() > 2)
        .collect()
}

fn is_credible_domain(host: &str) -> bool {
    !host.is_empty() && !BLOCKED_DOMAINS.iter().any(|blocked| host.contains(blocked))
}

/// 统计 [Source N] / (Source N) 形式的引用
pub fn count_citations(text: &str) -> usize {
    CITATION_PATTERN
        .as_ref()
        .map(|pattern| pattern.find_iter(text).count())
        .unwrap_or(0)
}

/// 粗略检测相互矛盾的表述
pub fn has_contradictions(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONTRADICTION_PAIRS.iter().any(|(positive, negative)| {
        match (find_word(&lower, positive), find_word(&lower, negative)) {
            (Some(p), Some(n)) => p.abs_diff(n) < CONTRADICTION_WINDOW,
            _ => false,
        }
    })
}

/// 按整词查找首次出现的位置（字符下标）
fn find_word(text: &str, word: &str) -> Option<usize> {
    text.match_indices(word)
        .map(|(idx, _)| idx)
        .find(|&idx| {
            let before = text[..idx].chars().next_back();
            let after = text[idx + word.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .map(|idx| text[..idx].chars().count())
}

/// 评估结论质量：从1.0起按问题扣分
pub fn assess_findings(findings: &str, source_count: usize) -> FindingsAssessment {
    let mut issues = Vec::new();
    let mut score: f64 = 1.0;
    let lower = findings.to_lowercase();

    if findings.chars().count() < 200 {
        issues.push("findings are too brief".to_string());
        score -= 0.3;
    }

    let citations = count_citations(findings);
    if citations == 0 {
        issues.push("no sources cited".to_string());
        score -= 0.4;
    } else if (citations as f64) < source_count as f64 * 0.3 {
        issues.push(format!("low citation rate: {}/{} sources cited", citations, source_count));
        score -= 0.2;
    }

    let vague = VAGUE_QUALIFIERS
        .iter()
        .map(|phrase| lower.matches(phrase).count())
        .sum::<usize>();
    if vague > 3 {
        issues.push(format!("{} vague qualifiers found", vague));
        score -= 0.2;
    }

    if has_contradictions(findings) {
        issues.push("potential contradictions in reasoning".to_string());
        score -= 0.25;
    }

    if !STRUCTURE_MARKERS.iter().any(|marker| findings.contains(marker)) {
        issues.push("findings lack structure".to_string());
        score -= 0.15;
    }

    if !CONCLUSION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        issues.push("no conclusion or summary".to_string());
        score -= 0.1;
    }

    let quality_score = score.clamp(0.0, 1.0);
    FindingsAssessment {
        is_valid: quality_score >= 0.5 && issues.len() <= 2,
        quality_score,
        issues,
    }
}
