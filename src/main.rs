use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use exam_grader::utils::logging;
use exam_grader::{
    start_server, AppState, Config, InMemorySessionStore, LlmService, PdfiumLoader, SessionStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let model = Arc::new(LlmService::new(&config));
    let loader = Arc::new(PdfiumLoader::new(
        config.pdfium_library_path.as_ref().map(PathBuf::from),
    ));

    // 定期清理空闲会话
    if let Some(ttl) = config.session_ttl() {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl.min(std::time::Duration::from_secs(60)));
            loop {
                interval.tick().await;
                let expired = store.expire_idle(ttl);
                if expired > 0 {
                    info!("🧹 清理了 {} 个空闲会话", expired);
                }
            }
        });
    }

    let addr = config.bind_addr.clone();
    let state = AppState::new(config, store, model, loader);
    start_server(&addr, state).await?;

    Ok(())
}
