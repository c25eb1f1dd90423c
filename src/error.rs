use thiserror::Error;

/// 应用程序错误类型
///
/// 只有"致命"错误才会以 `AppError` 的形式向上传播；
/// 单个学生的识别 / 评分失败见 [`IdentificationFailure`] 与 [`GradingFailure`]。
#[derive(Debug, Error)]
pub enum AppError {
    /// 参数错误（分组参数、表单字段等）
    #[error("参数错误: {0}")]
    InvalidInput(String),

    /// 上传的文档无法打开或渲染
    #[error("文档解析失败: {0}")]
    DocumentParse(String),

    /// 花名册 CSV 解析失败
    #[error("花名册解析失败: {0}")]
    Roster(String),

    /// 会话不存在
    #[error("会话不存在: {0}")]
    SessionNotFound(String),

    /// 会话中没有该学号的学生
    #[error("学生不存在: {0}")]
    StudentNotFound(String),

    /// 重新评分被策略拒绝
    #[error("部分 '{section}' 已有 {verified} 条人工确认的成绩，拒绝重新评分")]
    RegradeBlocked { section: String, verified: usize },

    /// 导出失败
    #[error("导出失败 ({path}): {message}")]
    Export { path: String, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 文件操作错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),

    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// LLM 调用错误
///
/// 识别和评分共用同一套错误，区别只在于出错后的兜底方式。
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },

    /// 调用超时
    #[error("LLM 调用超时 (模型: {model}, {secs} 秒)")]
    Timeout { model: String, secs: u64 },

    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },

    /// 返回内容不是期望的 JSON
    #[error("无法解析LLM返回的JSON (响应: {response}): {source}")]
    ResponseParseFailed {
        response: String,
        #[source]
        source: serde_json::Error,
    },

    /// 存储的页面图片无法还原
    #[error("页面图片无效: {0}")]
    InvalidImage(String),
}

/// 单个分组的身份识别失败
#[derive(Debug, Error)]
#[error("第 {} 组学生身份识别失败: {source}", .chunk_index + 1)]
pub struct IdentificationFailure {
    pub chunk_index: usize,
    #[source]
    pub source: LlmError,
}

/// 单个学生的评分失败
#[derive(Debug, Error)]
#[error("学生 {student_id} 评分失败: {source}")]
pub struct GradingFailure {
    pub student_id: String,
    #[source]
    pub source: LlmError,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Roster(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Other(format!("后台任务执行失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建参数错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// 创建文档解析错误
    pub fn document_parse(message: impl Into<String>) -> Self {
        AppError::DocumentParse(message.into())
    }
}

impl LlmError {
    /// 创建LLM API调用错误
    pub fn api_call_failed(model: impl Into<String>, source: impl std::fmt::Display) -> Self {
        LlmError::ApiCallFailed {
            model: model.into(),
            message: source.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
