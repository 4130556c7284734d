use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::Dispatcher;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::types::BackendTarget;

/// 后端配置 描述一个可调用的 endpoint 不负责读取文件或环境变量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// 自定义句柄 例如 `glm-default`
    pub handle: String,
    pub endpoint: String,
    pub model: String,
    pub credential: Credential,
    /// 仅 prompt 风格使用的鉴权 header 名称
    #[serde(default)]
    pub api_key_header: Option<String>,
    /// 超时秒数 留空时使用默认值
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// 鉴权信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// 简单 API Key
    ApiKey { key: String },
    /// Bearer Token
    Bearer { token: String },
    /// 未配置
    None,
}

impl BackendConfig {
    /// 校验配置并转换为 BackendTarget 空 endpoint/model、缺少凭证或超时为 0 时返回 InvalidConfig
    pub fn to_target(&self) -> Result<BackendTarget, LLMError> {
        if self.endpoint.trim().is_empty() {
            return Err(LLMError::invalid_config(
                format!("{}.endpoint", self.handle),
                "endpoint must not be empty",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(LLMError::invalid_config(
                format!("{}.model", self.handle),
                "model must not be empty",
            ));
        }

        let api_key = match &self.credential {
            Credential::ApiKey { key } => key.clone(),
            Credential::Bearer { token } => token.clone(),
            Credential::None => {
                return Err(LLMError::invalid_config(
                    format!("{}.credential", self.handle),
                    "backend requires a credential",
                ));
            }
        };

        let mut target = BackendTarget::new(&self.endpoint, api_key, &self.model);
        if let Some(header) = &self.api_key_header {
            target = target.with_api_key_header(header.clone());
        }
        match self.timeout_secs {
            Some(0) => {
                return Err(LLMError::invalid_config(
                    format!("{}.timeout_secs", self.handle),
                    "timeout must be at least one second",
                ));
            }
            Some(secs) => target = target.with_timeout(Duration::from_secs(secs)),
            None => {}
        }
        Ok(target)
    }
}

/// 根据一组后端配置构建 Dispatcher 使用内置路由表
pub fn build_dispatcher_from_configs(
    configs: &[BackendConfig],
    transport: DynHttpTransport,
) -> Result<Dispatcher, LLMError> {
    let mut builder = Dispatcher::builder(transport).default_routes();

    for config in configs {
        builder = builder.register_target(config.handle.clone(), config.to_target()?);
    }

    Ok(builder.build())
}
