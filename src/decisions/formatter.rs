//! 记录格式化
//!
//! 把 [`CitationRecord`] 写回单行文本，字段顺序固定：
//!
//! ```text
//! [id] authors (year). title. other. Relevance: text FLAGS[...] PRIMARY_URL[...] SECONDARY_URL[...] TERTIARY_URL[...]
//! ```
//!
//! 缺失的字段直接省略，不会出现连续的句点或空标签。
//! 对解析器产生的任意记录 `r`，`parse(format(r)) == r`。

use crate::models::record::{ends_with_terminal, push_sentence};
use crate::models::CitationRecord;

/// 格式化为一行（不含换行）
pub fn format_record(record: &CitationRecord) -> String {
    let mut line = format!("[{}]", record.id);

    let bibliographic = format_bibliographic(record);
    if !bibliographic.is_empty() {
        push_part(&mut line, &bibliographic);
    }

    if let Some(relevance) = non_empty(record.relevance.as_deref()) {
        push_part(&mut line, &format!("Relevance: {}", relevance));
    }

    if !record.flags.is_empty() {
        push_part(&mut line, &format!("FLAGS[{}]", record.flags));
    }

    let urls = [
        ("PRIMARY_URL", &record.primary_url),
        ("SECONDARY_URL", &record.secondary_url),
        ("TERTIARY_URL", &record.tertiary_url),
    ];
    for (label, url) in urls {
        if let Some(url) = non_empty(url.as_deref()) {
            push_part(&mut line, &format!("{}[{}]", label, url));
        }
    }

    line
}

/// 不带链接和标记的引用格式（用于终稿导出）
pub fn format_clean(record: &CitationRecord) -> String {
    let mut line = format!("[{}]", record.id);
    let bibliographic = format_bibliographic(record);
    if !bibliographic.is_empty() {
        push_part(&mut line, &bibliographic);
    }
    if let Some(relevance) = non_empty(record.relevance.as_deref()) {
        push_part(&mut line, &format!("Relevance: {}", relevance));
    }
    line
}

fn format_bibliographic(record: &CitationRecord) -> String {
    let mut text = single_line(&record.authors);
    if let Some(year) = record.year {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&format!("({})", year));
    }
    push_sentence(&mut text, &single_line(&record.title));
    push_sentence(&mut text, &single_line(&record.other_info));
    if !text.is_empty() && !ends_with_terminal(&text) {
        text.push('.');
    }
    text
}

fn push_part(line: &mut String, part: &str) {
    line.push(' ');
    line.push_str(part);
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(single_line)
        .filter(|v| !v.is_empty())
}

/// 手工编辑的字段可能带换行，输出前合并为单行
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::parser::{parse_record, ParseOptions};
    use crate::models::FlagSet;

    fn roundtrip(line: &str) -> String {
        let parsed = parse_record(line, &ParseOptions::default()).unwrap();
        format_record(&parsed.record)
    }

    #[test]
    fn test_well_formed_lines_are_reproduced() {
        for line in [
            "[1] Smith, J. (2020). Untitled Work. Acme Press. Relevance: test.",
            "[3] Smith, J. Untitled Work. Acme Press. Relevance: test.",
            "[12] Douglas, S. J. (1999). Listening In. Times Books. Relevance: Radio. FLAGS[FINALIZED BATCH_v20.0] PRIMARY_URL[https://archive.org/details/x] SECONDARY_URL[https://example.org/review]",
            "[14] World Health Organization (2019). Report on Screens. Geneva. TERTIARY_URL[https://who.int/x]",
            "[15] Postman, N. (2005). Amusing Ourselves to Death. 20th anniversary ed. Penguin.",
        ] {
            assert_eq!(roundtrip(line), line);
        }
    }

    #[test]
    fn test_format_then_parse_is_identity() {
        for line in [
            "[7] Douglas, S. (1999). November 10) Radio: The Internet of the 1930s. Publisher.................",
            "[9] Postman, N. (2005). Amusing Ourselves to Death (20th anniversary ed.). Penguin.",
            "[30]   Lee, K.   (2022).  Title   Here.  Press. FLAGS[B A B]",
            "[31] (2001). Only Year.",
            "[32] Anonymous. Who Killed Radio? Acme.",
        ] {
            let first = parse_record(line, &ParseOptions::default()).unwrap().record;
            let formatted = format_record(&first);
            let second = parse_record(&formatted, &ParseOptions::default())
                .unwrap()
                .record;
            assert_eq!(first, second, "line: {line}");
            assert_eq!(format_record(&second), formatted);
        }
    }

    #[test]
    fn test_absent_fields_leave_no_empty_labels() {
        let mut record = CitationRecord::new(5);
        record.title = "Only Title".to_string();
        record.relevance = Some(String::new());
        record.primary_url = Some(String::new());
        record.flags = FlagSet::new();

        let line = format_record(&record);
        assert_eq!(line, "[5] Only Title.");
        assert!(!line.contains("Relevance:"));
        assert!(!line.contains("PRIMARY_URL"));
        assert!(!line.contains(".."));
    }

    #[test]
    fn test_format_clean_drops_flags_and_urls() {
        let line = "[12] Douglas, S. J. (1999). Listening In. Times Books. Relevance: Radio. FLAGS[FINALIZED] PRIMARY_URL[https://archive.org/details/x]";
        let record = parse_record(line, &ParseOptions::default()).unwrap().record;
        assert_eq!(
            format_clean(&record),
            "[12] Douglas, S. J. (1999). Listening In. Times Books. Relevance: Radio."
        );
    }
}
