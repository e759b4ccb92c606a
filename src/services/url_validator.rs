//! 链接校验服务 - 业务能力层
//!
//! 真正抓取页面内容（最多 100KB），按模式识别访问障碍：
//!
//! | 检测结果 | 分数 |
//! |---------|------|
//! | 软 404 / HTTP 错误 / 无法连接 | 0 |
//! | 仅预览 | 40 |
//! | 付费墙 | 50 |
//! | 需要登录 | 60 |
//! | 可访问 | 90，内容与引用吻合时 100 |
//!
//! 检测按 软404 > 付费墙 > 登录 > 预览 的顺序进行，命中一类即停止。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::ValidationResult;
use crate::services::UrlValidator;

/// 最多读取的字节数
pub const MAX_CONTENT_BYTES: usize = 100_000;
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; reference-refinement/0.1)";

/// 可访问内容的基础分
const ACCESSIBLE_SCORE: u8 = 90;

/// 已知的付费数据库域名（自动终稿时计为警告）
pub const PAYWALL_DOMAINS: &[&str] = &[
    "jstor.org",
    "sciencedirect.com",
    "springer.com",
    "wiley.com",
    "tandfonline.com",
    "sagepub.com",
    "cambridge.org",
    "oxfordjournals.org",
    "journals.uchicago.edu",
];

type PatternSet = Vec<(Regex, &'static str)>;

fn compile(patterns: &[(&str, &'static str)]) -> PatternSet {
    patterns
        .iter()
        .map(|(p, name)| (Regex::new(&format!("(?i){}", p)).unwrap(), *name))
        .collect()
}

static SOFT_404_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    compile(&[
        (r"404.*not\s*found|not\s*found.*404", "404 not found"),
        (r"page\s*not\s*found|cannot\s*find.*page", "page not found"),
        (r"sorry.*couldn't\s*find|we\s*couldn't\s*locate", "apology for not found"),
        (r"oops.*nothing\s*here|there's\s*nothing\s*here", "nothing here"),
        (r"doi\s*not\s*found|doi.*not\s*available", "DOI not found"),
        (r"document\s*not\s*found|article\s*not\s*available", "document unavailable"),
        (r"item\s*not\s*found|handle\s*not\s*found", "item/handle not found"),
        (r"<title>[^<]*(404|not\s*found|error)[^<]*</title>", "error in title"),
    ])
});

static PAYWALL_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    compile(&[
        (r"subscribe.*continue|subscription.*required", "subscription required"),
        (r"\$\d+(\.\d{2})?\s*(to\s*)?(access|view|read|download)", "price to access"),
        (r"purchase.*access|buy.*article|pay.*view", "purchase required"),
        (r"paywall|payment.*required", "paywall detected"),
        (r"login.*subscribe|sign\s*in.*subscribe", "login to subscribe"),
        (r"members?\s*only|members?\s*exclusive", "members only"),
        (r"become\s*a\s*(member|subscriber)", "subscription prompt"),
        (r"free\s*trial.*then\s*\$", "trial then paid"),
        (r"upgrade\s*to\s*(premium|pro|plus)", "upgrade required"),
        (r"limited\s*access.*subscribe", "limited without subscription"),
        (r"full\s*text.*\$|complete\s*article.*\$", "paid full text"),
        (r"price.*download|cost.*access", "paid download"),
    ])
});

static LOGIN_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    compile(&[
        (r"sign\s*in.*continue|log\s*in.*continue", "login to continue"),
        (r"authentication.*required|login.*required", "authentication required"),
        (r"institutional.*access|institution.*login", "institutional access"),
        (r"access.*through.*library", "library access"),
        (r"credentials.*required|authorized.*users?\s*only", "credentials required"),
        (r"please\s*(log\s*in|sign\s*in)", "login prompt"),
        (r"restricted.*access|access.*restricted", "restricted access"),
        (r"account.*required|create.*account", "account required"),
        (r"university.*access|academic.*access", "academic access"),
        (r"licensed.*content|license.*required", "licensed content"),
    ])
});

static PREVIEW_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    compile(&[
        (r"limited\s*preview|preview\s*only", "limited preview"),
        (r"first\s*\d+\s*pages?|sample\s*pages?", "sample pages"),
        (r"excerpt|selected\s*pages?", "excerpt only"),
        (r"table\s*of\s*contents\s*only", "TOC only"),
        (r"abstract\s*only|summary\s*only", "abstract only"),
        (r"partial\s*view|incomplete\s*view", "partial view"),
        (r"preview\s*unavailable|full\s*view\s*not\s*available", "no full view"),
        (r"\d+%?\s*visible|\d+\s*of\s*\d+\s*pages", "percentage visible"),
        (r"sample\s*content|limited\s*content", "sample content"),
    ])
});

const STOP_WORDS: &[&str] = &["the", "and", "of", "in", "a", "an", "to", "for", "on", "with", "by"];

/// 访问障碍
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    Soft404(&'static str),
    Paywall(&'static str),
    Login(&'static str),
    Preview(&'static str),
}

/// 按优先级检测页面内容中的访问障碍
pub fn detect_barrier(content: &str) -> Option<Barrier> {
    let first_match = |set: &PatternSet| {
        set.iter()
            .find(|(re, _)| re.is_match(content))
            .map(|(_, name)| *name)
    };

    first_match(&SOFT_404_PATTERNS)
        .map(Barrier::Soft404)
        .or_else(|| first_match(&PAYWALL_PATTERNS).map(Barrier::Paywall))
        .or_else(|| first_match(&LOGIN_PATTERNS).map(Barrier::Login))
        .or_else(|| first_match(&PREVIEW_PATTERNS).map(Barrier::Preview))
}

/// 引用中的关键词（前 10 个）在页面中出现 4 个及以上视为吻合
pub fn content_matches_citation(content: &str, citation: &str) -> bool {
    let content = content.to_lowercase();
    let citation = citation.to_lowercase();
    let matched = citation
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w))
        .take(10)
        .filter(|w| content.contains(*w))
        .count();
    matched >= 4
}

/// 根据 HTTP 状态和页面内容给出校验结果
pub fn assess_content(status: u16, content: &str, citation: &str) -> ValidationResult {
    if status >= 400 {
        return ValidationResult {
            soft_404: status == 404,
            reason: format!("HTTP {} error", status),
            ..Default::default()
        };
    }

    let mut result = ValidationResult::default();
    match detect_barrier(content) {
        Some(Barrier::Soft404(name)) => {
            result.soft_404 = true;
            result.reason = format!("Soft 404 detected: {}", name);
        }
        Some(Barrier::Paywall(name)) => {
            result.paywall = true;
            result.score = 50;
            result.reason = format!("Paywall: {}", name);
        }
        Some(Barrier::Login(name)) => {
            result.login_required = true;
            result.score = 60;
            result.reason = format!("Login required: {}", name);
        }
        Some(Barrier::Preview(name)) => {
            result.preview_only = true;
            result.score = 40;
            result.reason = format!("Preview only: {}", name);
        }
        None => {
            result.score = ACCESSIBLE_SCORE;
            result.reason = "Accessible content".to_string();
            if content_matches_citation(content, citation) {
                result.content_matches = true;
                result.score = 100;
                result.reason = "Accessible content matching the citation".to_string();
            }
        }
    }
    result.accessible = result.score >= ACCESSIBLE_SCORE;
    result
}

/// 链接所在域名是否是已知付费数据库
pub fn is_paywall_domain(url: &str) -> bool {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_lowercase();
    PAYWALL_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

/// 基于 HTTP 抓取的链接校验
pub struct HttpUrlValidator {
    http: reqwest::Client,
}

impl HttpUrlValidator {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.validation_timeout_secs))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| AppError::api_request_failed("url-validator", e))?;
        Ok(Self { http })
    }

    /// 读取状态码和前 [`MAX_CONTENT_BYTES`] 字节
    async fn fetch(&self, url: &str) -> Result<(u16, String), reqwest::Error> {
        let mut response = self.http.get(url).send().await?;
        let status = response.status().as_u16();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_CONTENT_BYTES {
                body.truncate(MAX_CONTENT_BYTES);
                break;
            }
        }
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }
}

#[async_trait]
impl UrlValidator for HttpUrlValidator {
    async fn validate(&self, url: &str, citation: &str) -> ValidationResult {
        match self.fetch(url).await {
            Ok((status, content)) => {
                let result = assess_content(status, &content, citation);
                debug!("🔎 {} → {} ({})", url, result.score, result.reason);
                result
            }
            Err(e) => {
                debug!("🔎 {} → 无法访问: {}", url, e);
                ValidationResult::unreachable(format!("Connection failed: {}", e))
            }
        }
    }
}
