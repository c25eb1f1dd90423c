//! 模型输出的宽松解析
//!
//! 模型经常把 JSON 包在 ```json 代码块里，先去掉围栏再解析。

use serde::de::DeserializeOwned;

use crate::error::LlmError;
use crate::utils::logging::truncate_text;

/// 日志 / 错误信息里保留的响应长度
const RESPONSE_PREVIEW_CHARS: usize = 200;

/// 去掉代码块围栏标记
pub fn strip_code_fences(response: &str) -> String {
    response
        .trim()
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// 去围栏后按 JSON 解析为 `T`
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T, LlmError> {
    let cleaned = strip_code_fences(response);
    serde_json::from_str(&cleaned).map_err(|source| LlmError::ResponseParseFailed {
        response: truncate_text(&cleaned, RESPONSE_PREVIEW_CHARS),
        source,
    })
}
