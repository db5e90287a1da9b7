//! 会话拉取接口及其 HTTP 实现
//!
//! 会话存储只依赖 [`ConversationFetcher`]，测试时可注入任意实现

use crate::im::conversation::models::Conversation;
use crate::im::conversation::types::AllConversationsResp;
use crate::im::types::handle_http_response;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

/// 服务器端会话拉取服务
#[async_trait]
pub trait ConversationFetcher: Send + Sync {
    /// 拉取用户的全部会话（含消息）
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// 拉取单个会话（含消息）
    async fn get_conversation(&self, user_id: &str, conversation_id: &str)
        -> Result<Conversation>;
}

/// 会话相关的 HTTP API 客户端
pub struct ConversationApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl ConversationApi {
    /// 创建新的会话 API 客户端
    ///
    /// `client` 应该已经在外部配置好认证拦截器
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 创建带认证头的客户端（token 通过 default_headers 自动添加）
    pub fn with_token(api_base_url: String, token: &str) -> Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::HeaderName::from_static("token"),
                    reqwest::header::HeaderValue::from_str(token).context("无效的 token")?,
                );
                headers
            })
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self::new(http_client, api_base_url))
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        operation_name: &str,
    ) -> Result<T> {
        let operation_id = Uuid::new_v4().to_string();
        let url = format!("{}{}", self.api_base_url, path);
        debug!(
            "[ConvAPI]   请求URL: {}, 操作ID: {}",
            url, operation_id
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("operationID", &operation_id)
            .json(&body)
            .send()
            .await
            .context("请求失败")?;

        handle_http_response(response, operation_name).await
    }
}

#[async_trait]
impl ConversationFetcher for ConversationApi {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        info!("[ConvAPI] 📡 请求全量会话列表，用户ID: {}", user_id);
        let resp: AllConversationsResp = self
            .post(
                "/conversation/list",
                serde_json::json!({ "userID": user_id }),
                "全量会话",
            )
            .await?;
        info!(
            "[ConvAPI] ✅ 全量会话拉取完成，共 {} 个会话",
            resp.conversations.len()
        );
        Ok(resp.conversations)
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation> {
        info!(
            "[ConvAPI] 📡 请求单个会话: conversationID={}",
            conversation_id
        );
        self.post(
            "/conversation/get",
            serde_json::json!({
                "userID": user_id,
                "conversationID": conversation_id,
            }),
            "单个会话",
        )
        .await
    }
}
