//! 搜索语句生成服务 - 业务能力层
//!
//! 只负责"为一条记录生成搜索语句"，不关心流程

use async_trait::async_trait;
use tracing::debug;

use crate::clients::LlmClient;
use crate::error::{AppResult, LlmError};
use crate::models::CitationRecord;
use crate::services::QueryGenerator;

const SYSTEM_PROMPT: &str = "You are a research librarian who writes web search queries \
that locate authoritative online copies of cited works and scholarly discussions of them.";

/// 基于 LLM 的搜索语句生成
pub struct LlmQueryGenerator {
    llm: LlmClient,
    max_queries: usize,
}

impl LlmQueryGenerator {
    pub fn new(llm: LlmClient, max_queries: usize) -> Self {
        Self { llm, max_queries }
    }

    fn build_prompt(&self, record: &CitationRecord) -> String {
        let relevance = record.relevance.as_deref().unwrap_or("(none)");
        format!(
            r#"Generate up to {max} Google search queries for this reference.

Citation: {citation}
Relevance: {relevance}

Aim for two kinds of results:
- PRIMARY: the work itself (publisher page, full text, archive.org, Google Books, DOI landing page)
- SECONDARY: a review, summary or scholarly discussion of the work

Mix exact-title queries in quotes with author/year queries.
Return one query per line, with no numbering and no commentary."#,
            max = self.max_queries,
            citation = record.citation_text(),
            relevance = relevance,
        )
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(&self, record: &CitationRecord) -> AppResult<Vec<String>> {
        let response = self
            .llm
            .chat(SYSTEM_PROMPT, &self.build_prompt(record), 512)
            .await?;
        let queries = parse_queries(&response, self.max_queries);
        debug!("[RID {}] 生成 {} 条搜索语句", record.id, queries.len());
        if queries.is_empty() {
            return Err(LlmError::UnparsableResponse {
                reason: format!("没有解析出任何搜索语句: {}", response),
            }
            .into());
        }
        Ok(queries)
    }
}

/// 每行一条，去掉编号、项目符号和包裹整行的引号，重复的只保留一次
pub fn parse_queries(response: &str, max_queries: usize) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in response.lines() {
        let query = clean_query_line(line);
        if query.is_empty() || query.ends_with(':') {
            continue;
        }
        if queries.iter().any(|q| q.eq_ignore_ascii_case(&query)) {
            continue;
        }
        queries.push(query);
        if queries.len() >= max_queries {
            break;
        }
    }
    queries
}

fn clean_query_line(line: &str) -> String {
    let mut text = line.trim();

    // "1." / "2)" / "-" / "*" / "•"
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &text[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            text = stripped.trim_start();
        }
    }
    text = text
        .trim_start_matches(['-', '*', '•'])
        .trim();

    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') {
        text = text.trim_matches('`').trim();
    }
    // 较长的整行被引号包裹时去掉引号；短的视为精确标题搜索，保留
    if text.len() >= 2
        && text.starts_with('"')
        && text.ends_with('"')
        && !text[1..text.len() - 1].contains('"')
        && text.split_whitespace().count() > 6
    {
        text = &text[1..text.len() - 1];
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queries_strips_numbering() {
        let response = "Here are the queries:\n1. \"Listening In\" Douglas 1999\n2) Douglas Listening In radio review\n- \"Listening In\" archive.org\n\n* Douglas 1999 radio imagination pdf";
        let queries = parse_queries(response, 10);
        assert_eq!(
            queries,
            vec![
                "\"Listening In\" Douglas 1999",
                "Douglas Listening In radio review",
                "\"Listening In\" archive.org",
                "Douglas 1999 radio imagination pdf",
            ]
        );
    }

    #[test]
    fn test_parse_queries_caps_and_dedups() {
        let response = "a b\nA B\nc d\ne f\ng h";
        assert_eq!(parse_queries(response, 3), vec!["a b", "c d", "e f"]);
    }

    #[test]
    fn test_exact_phrase_query_keeps_quotes() {
        let response = "\"The Attention Merchants\"";
        assert_eq!(parse_queries(response, 5), vec!["\"The Attention Merchants\""]);
    }
}
