/// 网页搜索服务
///
/// 负责调用搜索 API，以及候选链接的去重
use async_trait::async_trait;

use crate::clients::GoogleSearchClient;
use crate::error::AppResult;
use crate::models::SearchCandidate;
use crate::services::WebSearch;

/// Google 搜索
pub struct GoogleWebSearch {
    client: GoogleSearchClient,
}

impl GoogleWebSearch {
    pub fn new(client: GoogleSearchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebSearch for GoogleWebSearch {
    async fn search(&self, query: &str) -> AppResult<Vec<SearchCandidate>> {
        self.client.search(query).await
    }
}

/// 用于比较的链接形式：去掉协议、`www.`、fragment 和末尾的 `/`
///
/// 只把协议和主机名转成小写，路径和查询参数区分大小写。
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split('#').next().unwrap_or(url);
    let lower = url.to_ascii_lowercase();
    let rest = if lower.starts_with("https://") {
        &url["https://".len()..]
    } else if lower.starts_with("http://") {
        &url["http://".len()..]
    } else {
        url
    };
    let (host, path) = match rest.find(['/', '?']) {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    format!("{}{}", host, path).trim_end_matches('/').to_string()
}

/// 追加候选，按链接去重（保留先出现的）
pub fn merge_candidates(into: &mut Vec<SearchCandidate>, new: impl IntoIterator<Item = SearchCandidate>) {
    for candidate in new {
        if candidate.url.trim().is_empty() {
            continue;
        }
        let key = normalize_url(&candidate.url);
        if !into.iter().any(|c| normalize_url(&c.url) == key) {
            into.push(candidate);
        }
    }
}
