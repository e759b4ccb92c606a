pub mod google_search_client;
pub mod llm_client;

pub use google_search_client::GoogleSearchClient;
pub use llm_client::LlmClient;
