//! 日志工具模块
//!
//! 提供日志初始化以及批处理过程中的格式化输出

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 debug / info 级别
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 阅卷服务启动 - {}", config.bind_addr);
    info!("🤖 模型: {} ({})", config.llm_model_name, config.llm_api_base_url);
    info!(
        "📊 最大并发请求数: {} | 渲染 DPI: {} | 重新评分策略: {}",
        config.max_concurrent_requests, config.render_dpi, config.regrade_policy
    );
    if config.llm_api_key.is_empty() {
        warn!("⚠️ 未设置 LLM_API_KEY，所有识别和评分都会失败");
    }
    info!("{}", "=".repeat(60));
}

/// 记录一次批处理的开始
///
/// # 参数
/// - `label`: 批处理名称（如"入库"、"评分 Part 1"）
/// - `total`: 待处理数量
pub fn log_batch_start(label: &str, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始{}，共 {} 项", label, total);
    info!("{}", "=".repeat(60));
}

/// 打印批处理统计信息
///
/// # 参数
/// - `label`: 批处理名称
/// - `success`: 成功数量
/// - `failed`: 失败（已兜底）数量
pub fn log_batch_complete(label: &str, success: usize, failed: usize) {
    info!("\n{}", "─".repeat(60));
    info!("📊 {}完成", label);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 成功: {}/{}", success, success + failed);
    info!("❌ 失败: {}", failed);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
