//! decisions.txt 文档模型
//!
//! 文件结构：
//!
//! ```text
//! (可选的文件头部)
//!
//! [1] 记录行 ...
//! Q: 搜索语句 1
//! Q: 搜索语句 2
//! 其他备注行
//!
//! [2] 记录行 ...
//! ```
//!
//! 空行只作分隔；记录行之后的非 `Q:` 行原样保留为该记录的备注。

pub mod formatter;
pub mod parser;

use std::collections::BTreeSet;

use crate::models::{CitationRecord, ParseIssue, RecordIssues};

pub use formatter::{format_clean, format_record};
pub use parser::{invalid_record_id, parse_record, ParseOptions, ParsedRecord};

const QUERY_PREFIX: &str = "Q:";

/// 整个 decisions 文件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionsDocument {
    /// 第一条记录之前的行
    pub preamble: Vec<String>,
    pub records: Vec<CitationRecord>,
}

/// 文档解析结果
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: DecisionsDocument,
    pub issues: Vec<RecordIssues>,
}

impl ParsedDocument {
    /// 出现重复 ID 的记录
    pub fn duplicate_ids(&self) -> Vec<u32> {
        self.issues
            .iter()
            .filter(|ri| ri.issues.contains(&ParseIssue::DuplicateId))
            .filter_map(|ri| ri.id)
            .collect()
    }
}

impl DecisionsDocument {
    pub fn get(&self, id: u32) -> Option<&CitationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut CitationRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// 用处理后的记录替换同 ID 的记录，返回是否找到
    pub fn replace(&mut self, record: CitationRecord) -> bool {
        match self.get_mut(record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }
}

/// 解析整个文件
pub fn parse_document(content: &str, options: &ParseOptions) -> ParsedDocument {
    let mut document = DecisionsDocument::default();
    let mut issues: Vec<RecordIssues> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut preamble_issues = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(parsed) = parse_record(line, options) {
            let mut record_issues = parsed.issues;
            if !seen.insert(parsed.record.id) {
                record_issues.push(ParseIssue::DuplicateId);
            }
            if !record_issues.is_empty() {
                issues.push(RecordIssues {
                    id: Some(parsed.record.id),
                    issues: record_issues,
                });
            }
            document.records.push(parsed.record);
            continue;
        }

        // 行本身照常保留，只额外上报
        let invalid_id = invalid_record_id(line).map(|raw| ParseIssue::InvalidId {
            line_no: line_no + 1,
            raw: raw.to_string(),
        });
        if let Some(issue) = &invalid_id {
            issues.push(RecordIssues {
                id: None,
                issues: vec![issue.clone()],
            });
        }

        match document.records.last_mut() {
            Some(record) => match trimmed.strip_prefix(QUERY_PREFIX) {
                Some(query) => {
                    let query = query.trim();
                    if !query.is_empty() {
                        record.queries.push(query.to_string());
                    }
                }
                None => record.notes.push(line.trim_end().to_string()),
            },
            None => {
                document.preamble.push(line.trim_end().to_string());
                if invalid_id.is_none() {
                    preamble_issues.push(ParseIssue::StrayLine {
                        line_no: line_no + 1,
                    });
                }
            }
        }
    }

    if !preamble_issues.is_empty() {
        issues.insert(
            0,
            RecordIssues {
                id: None,
                issues: preamble_issues,
            },
        );
    }

    ParsedDocument { document, issues }
}

/// 输出整个文件
///
/// 记录之间以空行分隔，文件以换行结尾。
pub fn format_document(document: &DecisionsDocument) -> String {
    let mut blocks = Vec::new();

    if !document.preamble.is_empty() {
        blocks.push(document.preamble.join("\n"));
    }

    for record in &document.records {
        let mut block = format_record(record);
        for query in &record.queries {
            block.push('\n');
            block.push_str(QUERY_PREFIX);
            block.push(' ');
            block.push_str(query);
        }
        for note in &record.notes {
            block.push('\n');
            block.push_str(note);
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        return String::new();
    }
    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Reference decisions

[1] Smith, J. (2020). Untitled Work. Acme Press. Relevance: test. PRIMARY_URL[https://acme.example/untitled]
Q: Smith Untitled Work 2020
Q:   \"Untitled Work\" Acme Press
reviewer note: check publisher

[2] Lee, K. (2022). Title Here. Press.
[3] Wu, T. (2017). The Attention Merchants. Vintage. Relevance: Ads. FLAGS[FINALIZED] PRIMARY_URL[https://example.org/am]
";

    fn parse(content: &str) -> ParsedDocument {
        parse_document(content, &ParseOptions::default())
    }

    #[test]
    fn test_parse_document_structure() {
        let parsed = parse(SAMPLE);
        let doc = &parsed.document;

        assert_eq!(doc.preamble, vec!["# Reference decisions"]);
        assert_eq!(doc.records.len(), 3);

        let first = &doc.records[0];
        assert_eq!(
            first.queries,
            vec!["Smith Untitled Work 2020", "\"Untitled Work\" Acme Press"]
        );
        assert_eq!(first.notes, vec!["reviewer note: check publisher"]);
        assert!(doc.records[1].queries.is_empty());
        assert!(doc.get(3).is_some_and(|r| r.is_finalized()));
    }

    #[test]
    fn test_issues_are_reported_per_record() {
        let parsed = parse(SAMPLE);

        let preamble = &parsed.issues[0];
        assert_eq!(preamble.id, None);
        assert_eq!(preamble.issues, vec![ParseIssue::StrayLine { line_no: 1 }]);

        let second = parsed.issues.iter().find(|ri| ri.id == Some(2)).unwrap();
        assert_eq!(second.issues, vec![ParseIssue::MissingRelevance]);
        assert!(parsed.duplicate_ids().is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_detected() {
        let parsed = parse("[4] A, B. (2000). T. P. Relevance: r.\n[4] C, D. (2001). U. Q. Relevance: s.\n");
        assert_eq!(parsed.duplicate_ids(), vec![4]);
        assert_eq!(parsed.document.records.len(), 2);
    }

    #[test]
    fn test_out_of_range_id_is_reported_and_kept() {
        let content = "[1] A, B. (2000). T. P. Relevance: r.\n[99999999999] C, D. (2001). U. Q. Relevance: s.\n";
        let parsed = parse(content);

        assert_eq!(parsed.document.records.len(), 1);
        assert_eq!(
            parsed.document.records[0].notes,
            vec!["[99999999999] C, D. (2001). U. Q. Relevance: s."]
        );
        let invalid = parsed.issues.iter().find(|ri| ri.id.is_none()).unwrap();
        assert_eq!(
            invalid.issues,
            vec![ParseIssue::InvalidId {
                line_no: 2,
                raw: "99999999999".to_string()
            }]
        );

        // 在文件头部时不再重复报无法归属
        let parsed = parse("[99999999999] C, D. (2001). U. Q.\n");
        assert_eq!(parsed.issues.len(), 1);
        assert!(matches!(parsed.issues[0].issues[0], ParseIssue::InvalidId { line_no: 1, .. }));
    }

    #[test]
    fn test_document_round_trip() {
        let first = parse(SAMPLE).document;
        let formatted = format_document(&first);
        let second = parse(&formatted).document;

        assert_eq!(first, second);
        assert_eq!(format_document(&second), formatted);
        assert!(formatted.ends_with('\n'));
        assert!(formatted.contains("\nQ: Smith Untitled Work 2020\n"));
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut doc = parse(SAMPLE).document;
        let mut updated = doc.get(2).cloned().unwrap();
        updated.primary_url = Some("https://press.example/title".to_string());

        assert!(doc.replace(updated));
        assert_eq!(
            doc.records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(doc.get(2).unwrap().has_primary_url());
        assert!(!doc.replace(CitationRecord::new(99)));
    }

    #[test]
    fn test_empty_document() {
        let parsed = parse("\n\n");
        assert!(parsed.document.records.is_empty());
        assert_eq!(format_document(&parsed.document), "");
    }
}
