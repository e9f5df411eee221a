use anyhow::Context;
use pollcast_core::subscribers::ImportSummary;
use pollcast_db::DbPool;
use std::path::Path;

/// Loads a legacy `chatList.json` into the subscriber table.
pub async fn import_chat_list_file(pool: &DbPool, path: &Path) -> anyhow::Result<ImportSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading chat list {}", path.display()))?;
    let summary = pollcast_core::subscribers::import_chat_list(pool, &raw).await?;
    Ok(summary)
}
