//! Ad-hoc query command handler

use crate::config::Config;
use crate::services::{AccessChainUserService, UserService};
use crate::state::SharedState;

pub async fn cmd_query(config: &Config, sql: &str) -> anyhow::Result<()> {
    // Opening the store runs migrations before the chain connects.
    let shared = SharedState::new(config.clone()).await?;
    let service = AccessChainUserService::new(shared.chain.clone());

    let rows = service.query(sql).await?;
    println!("{}", serde_json::to_string_pretty(rows.as_ref())?);
    println!("({} rows)", rows.len());

    Ok(())
}
