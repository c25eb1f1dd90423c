use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::RegradePolicy;

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "EXAM_GRADER_CONFIG";

/// 程序配置文件
///
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 上传文件的临时目录
    pub upload_dir: String,
    /// CSV 导出目录
    pub export_dir: String,
    /// 上传大小上限（MB）
    pub max_upload_mb: usize,
    /// 页面渲染分辨率
    pub render_dpi: u32,
    /// pdfium 动态库所在目录（为空时使用系统库）
    pub pdfium_library_path: Option<String>,
    /// 同时进行的 LLM 请求数量（1 表示严格顺序）
    pub max_concurrent_requests: usize,
    /// 会话空闲多久后清理（秒，0 表示永不清理）
    pub session_ttl_secs: u64,
    /// 重新评分时如何处理已人工确认的成绩
    pub regrade_policy: RegradePolicy,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 单次 LLM 调用超时（秒）
    pub llm_timeout_secs: u64,
}

/// 渲染分辨率上限
pub const MAX_RENDER_DPI: u32 = 300;

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            upload_dir: "temp_uploads".to_string(),
            export_dir: "exports".to_string(),
            max_upload_mb: 200,
            render_dpi: 150,
            pdfium_library_path: None,
            max_concurrent_requests: 1,
            session_ttl_secs: 0,
            regrade_policy: RegradePolicy::Overwrite,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-1.5-flash".to_string(),
            llm_timeout_secs: 120,
        }
    }
}

impl Config {
    /// 加载完整配置
    ///
    /// 若设置了 `EXAM_GRADER_CONFIG`，先读取该 TOML 文件，再用环境变量覆盖。
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(&path))?,
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖当前配置
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("UPLOAD_DIR") {
            self.upload_dir = v;
        }
        if let Some(v) = lookup("EXPORT_DIR") {
            self.export_dir = v;
        }
        if let Some(v) = lookup("PDFIUM_LIBRARY_PATH") {
            self.pdfium_library_path = Some(v);
        }
        // GEMINI_API_KEY 兼容旧的部署方式，LLM_API_KEY 优先
        if let Some(v) = lookup("LLM_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.llm_api_key = v;
        }
        if let Some(v) = lookup("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }

        parse_into(&lookup, "MAX_UPLOAD_MB", "usize", &mut self.max_upload_mb)?;
        parse_into(&lookup, "RENDER_DPI", "u32", &mut self.render_dpi)?;
        parse_into(&lookup, "MAX_CONCURRENT_REQUESTS", "usize", &mut self.max_concurrent_requests)?;
        parse_into(&lookup, "SESSION_TTL_SECS", "u64", &mut self.session_ttl_secs)?;
        parse_into(&lookup, "LLM_TIMEOUT_SECS", "u64", &mut self.llm_timeout_secs)?;
        parse_into(&lookup, "VERBOSE_LOGGING", "bool", &mut self.verbose_logging)?;
        parse_into(
            &lookup,
            "REGRADE_POLICY",
            "overwrite | keep_verified | reject",
            &mut self.regrade_policy,
        )?;

        Ok(self.normalized())
    }

    /// 修正越界的数值
    fn normalized(mut self) -> Self {
        self.render_dpi = self.render_dpi.clamp(1, MAX_RENDER_DPI);
        self.max_concurrent_requests = self.max_concurrent_requests.max(1);
        self
    }

    /// 会话清理周期，`None` 表示不清理
    pub fn session_ttl(&self) -> Option<std::time::Duration> {
        (self.session_ttl_secs > 0).then(|| std::time::Duration::from_secs(self.session_ttl_secs))
    }
}

fn parse_into<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    expected_type: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(var_name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: raw.clone(),
                expected_type: expected_type.to_string(),
            })?;
    }
    Ok(())
}
