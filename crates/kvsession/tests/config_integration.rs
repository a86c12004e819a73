//! Building a session manager from discovered configuration.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use kvsession::{MemoryBucket, SessionAccess, SessionManager, load_config_with_options};
use tempfile::TempDir;

#[tokio::test]
async fn test_manager_from_layered_config() -> Result<()> {
    let user = TempDir::new()?;
    let project = TempDir::new()?;
    fs::write(
        user.path().join("config.toml"),
        "[store]\nkey_prefix = \"user::\"\n\n[cache]\nmax_sessions = 1\n",
    )?;
    fs::write(
        project.path().join("kvsession.toml"),
        "[store]\nkey_prefix = \"prod::shop::session::\"\nmax_inactive_interval_secs = 120\ncontext_path = \"/shop\"\n",
    )?;

    let loaded = load_config_with_options(Some(project.path()), Some(user.path()))?;
    assert!(loaded.warnings.is_empty());

    let bucket = Arc::new(MemoryBucket::new());
    let manager = SessionManager::from_config(Arc::clone(&bucket), &loaded.config);

    let session = manager
        .session("abc", SessionAccess::default())
        .await?
        .expect("created");
    assert_eq!(session.read().context_path(), "/shop");
    assert_eq!(session.read().max_inactive_ms(), 120_000);
    drop(session);

    // Capacity of one: opening a second session passivates the first.
    manager.session("def", SessionAccess::default()).await?;

    assert!(bucket.document("prod::shop::session::abc").is_some());
    assert_eq!(
        manager.store().config().max_inactive_interval,
        Duration::from_secs(120)
    );

    Ok(())
}

#[tokio::test]
async fn test_empty_prefix_is_warned() -> Result<()> {
    let user = TempDir::new()?;
    let project = TempDir::new()?;
    fs::write(project.path().join("kvsession.toml"), "[store]\n")?;

    let loaded = load_config_with_options(Some(project.path()), Some(user.path()))?;

    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].contains("key_prefix"));

    Ok(())
}
