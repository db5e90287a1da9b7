//! 通用 HTTP 响应结构与处理函数

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

/// 统一的 API 响应包装结构体（errCode、errMsg、data）
///
/// data 字段可能为 null 或缺失，serde 会自动反序列化为 None
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(rename = "errCode")]
    pub err_code: i32,
    #[serde(rename = "errMsg", default)]
    pub err_msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 检查错误码并取出 data 字段
    pub fn into_data(self, operation_name: &str) -> Result<T> {
        if self.err_code != 0 {
            error!(
                "[HTTP] {}服务器错误，错误码: {}, 错误信息: {}",
                operation_name, self.err_code, self.err_msg
            );
            return Err(anyhow::anyhow!(
                "服务器错误 {}: {}",
                self.err_code,
                self.err_msg
            ));
        }
        self.data
            .ok_or_else(|| anyhow::anyhow!("{}响应中缺少 data 字段", operation_name))
    }
}

/// 解析响应体：先反序列化为 `ApiResponse<T>`，再检查错误码并取出 data
pub fn parse_api_body<T: DeserializeOwned>(body: &[u8], operation_name: &str) -> Result<T> {
    let api_resp: ApiResponse<T> = serde_json::from_slice(body).map_err(|e| {
        error!(
            "[HTTP] {}反序列化失败: {:?}\n原始响应: {}",
            operation_name,
            e,
            String::from_utf8_lossy(body)
        );
        anyhow::anyhow!("反序列化响应失败: {:?}", e)
    })?;
    api_resp.into_data(operation_name)
}

/// 通用 HTTP 响应处理函数，所有 API 共用
pub async fn handle_http_response<T: DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> Result<T> {
    let status = response.status();

    // body 只能读取一次
    let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
    let body_str = String::from_utf8_lossy(&body_bytes);
    debug!("[HTTP] {}响应 Body: {}", operation_name, body_str);

    if !status.is_success() {
        error!(
            "[HTTP] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name, status, body_str
        );
        return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, body_str));
    }
    debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);

    parse_api_body(&body_bytes, operation_name)
}
