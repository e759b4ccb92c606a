//! 记录解析器
//!
//! 把 decisions.txt 中的一行解析为 [`CitationRecord`]。
//!
//! 解析是一条有序的纯函数流水线，每一步从剩余文本中取出一个字段，
//! 返回 `(取出的值, 剩余文本)`。字段之间容易互相误认，顺序不能随意调整：
//!
//! 1. `[N]` 编号
//! 2. `FLAGS[...]` 和各类 `*_URL[...]`（链接里的 `.` 会干扰分句）
//! 3. `Relevance:` 标签之后的文本
//! 4. 括号中的四位年份，以及年份之前的作者
//! 5. 按句末标点分句：第一句是标题，其余是出版信息
//! 6. 清洗标题（版次、日期残留、填充点）
//! 7. 没有显式 `Relevance:` 时，对过长的出版信息做保守的拆分

use std::sync::LazyLock;

use regex::Regex;

use crate::models::flags::FlagSet;
use crate::models::record::push_sentence;
use crate::models::{CitationRecord, ParseIssue};

/// 出版信息超过该长度才尝试拆出相关性说明
pub const DEFAULT_RELEVANCE_SPLIT_THRESHOLD: usize = 150;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\[(\d+)\]").unwrap());

static FLAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFLAGS\[([^\]]*)\]").unwrap());
static PRIMARY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPRIMARY_URL\[([^\]]*)\]").unwrap());
static SECONDARY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSECONDARY_URL\[([^\]]*)\]").unwrap());
static TERTIARY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTERTIARY_URL\[([^\]]*)\]").unwrap());

static RELEVANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brelevance:\s*").unwrap());

/// `(1999)` 或 `(1999, November 10)`
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})(?:[,;][^)]*)?\)").unwrap());

/// 没有年份时识别 "Smith, J., & Doe, K. A." 形式的作者块
static AUTHOR_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^,.()]+,\s*(?:[A-Z][a-z]?\.\s*)+(?:(?:,\s*)?(?:&|and)\s+|,\s*)?)+").unwrap()
});

static EDITION_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\(([^()]*\b(?:ed\.|eds\.|edition)[^()]*)\)").unwrap()
});

static EDITION_TRAILING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[,:;]?\s+(\d+(?:st|nd|rd|th)\s+(?:[a-z]+\s+)?(?:edition|ed\.?))$").unwrap()
});

/// 上游导出遗留的 "November 10) " 前缀；必须有右括号，
/// 否则 "January 6th Misinformation" 这样的正常标题会被破坏
static DATE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\.?\s+\d{1,2}(?:st|nd|rd|th)?\)\s*",
    )
    .unwrap()
});

static FILLER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\.{3,}\s*$").unwrap());

/// 句点前出现这些词时不视为句末
const ABBREVIATIONS: &[&str] = &[
    "al", "cf", "ch", "co", "corp", "dr", "ed", "eds", "etc", "fig", "inc", "jr", "ltd", "mr",
    "mrs", "ms", "no", "nos", "p", "pp", "repr", "rev", "sr", "st", "trans", "vol", "vols", "vs",
];

/// 解析选项
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub relevance_split_threshold: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            relevance_split_threshold: DEFAULT_RELEVANCE_SPLIT_THRESHOLD,
        }
    }
}

/// 单行解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub record: CitationRecord,
    pub issues: Vec<ParseIssue>,
}

/// 解析一行记录
///
/// 只有行首没有 `[N]` 时返回 `None`；其余情况总会返回一条记录，
/// 缺失的字段记为 issue。
pub fn parse_record(line: &str, options: &ParseOptions) -> Option<ParsedRecord> {
    let (id, rest) = take_id(line)?;
    let mut record = CitationRecord::new(id);

    let (flags, rest) = take_bracket_field(&FLAGS_RE, rest);
    let (primary_url, rest) = take_bracket_field(&PRIMARY_URL_RE, &rest);
    let (secondary_url, rest) = take_bracket_field(&SECONDARY_URL_RE, &rest);
    let (tertiary_url, rest) = take_bracket_field(&TERTIARY_URL_RE, &rest);
    record.flags = flags.map(|f| FlagSet::parse(&f)).unwrap_or_default();
    record.primary_url = primary_url.filter(|u| !u.is_empty());
    record.secondary_url = secondary_url.filter(|u| !u.is_empty());
    record.tertiary_url = tertiary_url.filter(|u| !u.is_empty());

    let rest = collapse_whitespace(&rest);
    let (relevance, bibliographic) = take_relevance(&rest);
    let bibliographic = FILLER_RE.replace(&bibliographic, "").into_owned();

    let (year, authors, body) = take_year_and_authors(&bibliographic);
    let (title, other_info) = take_title(&body);
    let (title, edition) = take_edition(&title);
    let title = strip_date_marker(&title);
    let title = strip_filler(&title);

    let mut other = edition.unwrap_or_default();
    push_sentence(&mut other, &other_info);

    let (other, relevance) = match relevance {
        Some(relevance) => (other, Some(relevance)),
        None => split_unlabeled_relevance(&other, options.relevance_split_threshold),
    };

    record.authors = authors;
    record.year = year;
    record.title = title;
    record.other_info = other;
    record.relevance = relevance;

    let issues = collect_issues(&record);
    Some(ParsedRecord { record, issues })
}

/// 行首是 `[数字]` 但数字无法作为 ID 时，返回原始数字
pub fn invalid_record_id(line: &str) -> Option<&str> {
    let digits = ID_RE.captures(line)?.get(1)?.as_str();
    match digits.parse::<u32>() {
        Ok(_) => None,
        Err(_) => Some(digits),
    }
}

// ========== 流水线步骤 ==========

fn take_id(line: &str) -> Option<(u32, &str)> {
    let caps = ID_RE.captures(line)?;
    let id = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let end = caps.get(0)?.end();
    Some((id, &line[end..]))
}

/// 取出第一个匹配的 `NAME[...]`，并删除所有同名字段
fn take_bracket_field(re: &Regex, text: &str) -> (Option<String>, String) {
    let value = re
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());
    let rest = re.replace_all(text, " ").into_owned();
    (value, rest)
}

fn take_relevance(text: &str) -> (Option<String>, String) {
    match RELEVANCE_RE.find(text) {
        Some(m) => {
            let relevance = text[m.end()..].trim().to_string();
            let rest = text[..m.start()].trim().to_string();
            ((!relevance.is_empty()).then_some(relevance), rest)
        }
        None => (None, text.trim().to_string()),
    }
}

/// 返回 `(年份, 作者, 剩余文本)`
fn take_year_and_authors(text: &str) -> (Option<u16>, String, String) {
    if let Some(caps) = YEAR_RE.captures(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end()));
        let year = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok());
        if let (Some((start, end)), Some(year)) = (whole, year) {
            let authors = text[..start].trim().trim_end_matches(',').trim().to_string();
            let body = text[end..]
                .trim_start_matches(|c: char| c == '.' || c == ',' || c == ':' || c.is_whitespace())
                .to_string();
            return (Some(year), authors, body);
        }
    }

    if let Some(m) = AUTHOR_BLOCK_RE.find(text) {
        let authors = m
            .as_str()
            .trim_end_matches(|c: char| c == ',' || c == '&' || c.is_whitespace())
            .to_string();
        let body = text[m.end()..].trim().to_string();
        if !authors.is_empty() && !body.is_empty() {
            return (None, authors, body);
        }
    }

    let spans = sentence_spans(text);
    match spans.first() {
        Some(&(start, end)) => {
            let authors = text[start..end].to_string();
            let body = spans
                .get(1)
                .map(|&(next, _)| text[next..].to_string())
                .unwrap_or_default();
            (None, authors, body)
        }
        None => (None, String::new(), String::new()),
    }
}

/// 返回 `(标题, 出版信息)`
fn take_title(text: &str) -> (String, String) {
    let spans = sentence_spans(text);
    let Some(&(start, end)) = spans.first() else {
        return (String::new(), String::new());
    };
    let title = text[start..end].to_string();
    let other = match (spans.get(1), spans.last()) {
        (Some(&(other_start, _)), Some(&(_, other_end))) => text[other_start..other_end].to_string(),
        _ => String::new(),
    };
    (title, other)
}

/// 把版次信息从标题中移出，返回 `(标题, 版次)`
fn take_edition(title: &str) -> (String, Option<String>) {
    let mut editions = Vec::new();

    let title = match EDITION_PAREN_RE.captures(title) {
        Some(caps) => {
            if let Some(m) = caps.get(1) {
                editions.push(m.as_str().trim().to_string());
            }
            EDITION_PAREN_RE.replace(title, "").trim().to_string()
        }
        None => title.to_string(),
    };

    let base = strip_filler(&title);
    let title = match EDITION_TRAILING_RE.captures(&base) {
        Some(caps) => {
            if let Some(m) = caps.get(1) {
                editions.push(m.as_str().trim().to_string());
            }
            EDITION_TRAILING_RE.replace(&base, "").trim().to_string()
        }
        None => title,
    };

    if editions.is_empty() {
        return (title, None);
    }
    let mut edition = String::new();
    for part in &editions {
        push_sentence(&mut edition, part);
    }
    (title, Some(edition))
}

fn strip_date_marker(title: &str) -> String {
    DATE_MARKER_RE.replace(title, "").trim().to_string()
}

fn strip_filler(title: &str) -> String {
    FILLER_RE.replace(title, "").trim().to_string()
}

/// 没有 `Relevance:` 标签时的保守拆分
///
/// 只有出版信息超过阈值并且至少有两句时才拆：第一句保留为出版信息，
/// 其余作为相关性说明。
fn split_unlabeled_relevance(other: &str, threshold: usize) -> (String, Option<String>) {
    if other.chars().count() <= threshold {
        return (other.to_string(), None);
    }
    let spans = sentence_spans(other);
    match (spans.first(), spans.get(1)) {
        (Some(&(start, end)), Some(&(next, _))) => {
            let relevance = other[next..].trim().to_string();
            (other[start..end].to_string(), Some(relevance))
        }
        _ => (other.to_string(), None),
    }
}

fn collect_issues(record: &CitationRecord) -> Vec<ParseIssue> {
    let mut issues = Vec::new();
    if record.authors.is_empty() {
        issues.push(ParseIssue::MissingAuthors);
    }
    if record.year.is_none() {
        issues.push(ParseIssue::MissingYear);
    }
    if record.title.is_empty() {
        issues.push(ParseIssue::MissingTitle);
    }
    if record.relevance.is_none() {
        issues.push(ParseIssue::MissingRelevance);
    }
    if record.is_finalized() && !record.has_primary_url() {
        issues.push(ParseIssue::FinalizedWithoutPrimary);
    }
    issues
}

// ========== 分句 ==========

/// 按句末标点切分，返回每个句子的字节区间（已去除首尾空白）
///
/// 句点（含连续的填充点）后跟空白或文本结尾时断句，句点不计入句子；
/// `?` 和 `!` 同样断句但保留在句子中。缩写和姓名首字母后的单个句点不断句。
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c != b'.' && c != b'?' && c != b'!' {
            i += 1;
            continue;
        }

        let mut j = i;
        while j < bytes.len() && bytes[j] == c {
            j += 1;
        }
        let at_boundary = j == bytes.len() || bytes[j].is_ascii_whitespace();
        let single_period = c == b'.' && j - i == 1;

        if at_boundary && !(single_period && ends_with_abbreviation(&text[start..i])) {
            let end = if c == b'.' { i } else { j };
            push_trimmed_span(text, start, end, &mut spans);
            start = j;
        }
        i = j;
    }

    push_trimmed_span(text, start, bytes.len(), &mut spans);
    spans
}

fn push_trimmed_span(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    if start >= end {
        return;
    }
    let segment = &text[start..end];
    let trimmed_start = start + (segment.len() - segment.trim_start().len());
    let trimmed_end = end - (segment.len() - segment.trim_end().len());
    if trimmed_start < trimmed_end {
        spans.push((trimmed_start, trimmed_end));
    }
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    // "ed.)." 这类句点前是括号的情况照常断句
    if !prefix.chars().last().is_some_and(char::is_alphabetic) {
        return false;
    }
    let Some(word) = prefix.split_whitespace().last() else {
        return false;
    };
    let word = word.trim_start_matches(['(', '"', '\'']);

    // 姓名首字母: "J."
    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true;
    }
    // 带内部句点的缩写: "U.S." / "e.g."
    if word.contains('.') && word.split('.').all(|p| p.chars().count() <= 2) {
        return true;
    }
    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
