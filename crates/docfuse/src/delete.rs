//! `docfuse delete`: remove a document from the store, both indexes and
//! the database.

use anyhow::{bail, Result};
use docfuse_core::models::DocId;

use crate::config::Config;
use crate::workspace::Workspace;

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let workspace = Workspace::open(config).await?;
    let found = workspace.delete(&DocId::from(id)).await;
    workspace.close().await;

    if !found? {
        bail!("document not found: {}", id);
    }
    println!("deleted {}", id);
    Ok(())
}
