/// Google Custom Search 客户端
///
/// 封装 Custom Search JSON API 的调用和响应解析
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::SearchCandidate;

const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// 搜索 API 响应（只取用到的字段）
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google 搜索客户端
#[derive(Clone)]
pub struct GoogleSearchClient {
    http: reqwest::Client,
    api_key: String,
    cx: String,
    num: u8,
}

impl GoogleSearchClient {
    /// 创建新的搜索客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;

        Ok(Self {
            http,
            api_key: config.google_api_key.clone(),
            cx: config.google_cx.clone(),
            num: config.search_results_per_query.clamp(1, 10),
        })
    }

    /// 执行一次搜索
    ///
    /// # 返回
    /// 返回候选列表（可能为空）
    pub async fn search(&self, query: &str) -> AppResult<Vec<SearchCandidate>> {
        debug!("🔍 Google 搜索: {}", query);

        let num = self.num.to_string();
        let response = self
            .http
            .get(ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                endpoint: ENDPOINT.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::BadResponse {
                endpoint: ENDPOINT.to_string(),
                status: status.as_u16(),
                message: crate::utils::logging::truncate_text(&message, 200),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;
        let candidates = parse_search_response(&body)?;
        debug!("✓ 搜索返回 {} 条结果", candidates.len());
        Ok(candidates)
    }
}

/// 解析搜索响应
///
/// 没有 `items` 字段表示无结果，不是错误。
pub fn parse_search_response(body: &str) -> AppResult<Vec<SearchCandidate>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse {
            endpoint: ENDPOINT.to_string(),
            reason: e.to_string(),
        })?;

    Ok(response
        .items
        .into_iter()
        .filter(|item| !item.link.trim().is_empty())
        .map(|item| SearchCandidate {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let body = r#"{
            "kind": "customsearch#search",
            "items": [
                {"title": "Listening In - Internet Archive", "link": "https://archive.org/details/listeningin", "snippet": "Radio and the American imagination"},
                {"title": "No snippet", "link": "https://example.org/x"}
            ]
        }"#;

        let candidates = parse_search_response(body).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].url, "https://archive.org/details/listeningin");
        assert_eq!(candidates[1].snippet, "");
    }

    #[test]
    fn test_no_items_means_no_results() {
        let body = r#"{"kind": "customsearch#search", "searchInformation": {"totalResults": "0"}}"#;
        assert!(parse_search_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_is_not_retryable() {
        let err = parse_search_response("<html>oops</html>").unwrap_err();
        assert!(!err.is_retryable());
    }
}
