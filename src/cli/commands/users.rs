//! User command handlers

use crate::cli::UserCommands;
use crate::config::Config;
use crate::services::{AccessChainUserService, UserService};
use crate::state::SharedState;

pub async fn cmd_users(config: &Config, command: UserCommands) -> anyhow::Result<()> {
    let shared = SharedState::new(config.clone()).await?;
    let service = AccessChainUserService::new(shared.chain.clone());

    match command {
        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users.");
                return Ok(());
            }
            println!("Users ({} total)", users.len());
            println!("{:-<70}", "");
            for user in users.iter() {
                println!(
                    "{} {} <{}> [{}]",
                    field(user, "id"),
                    field(user, "username"),
                    field(user, "email"),
                    field(user, "role"),
                );
            }
        }
        UserCommands::Get { id } => {
            let user = service.get_user(&id).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserCommands::Summary { min_age } => {
            let min_age = min_age.unwrap_or(config.access.older_than_age);
            let summary = service.summary(min_age).await?;
            println!("Users:            {}", summary.total);
            println!("Older than {:>3}:   {}", summary.min_age, summary.older_count);
            for user in &summary.older_users {
                println!("  {} ({})", field(user, "username"), field(user, "age"));
            }
        }
        UserCommands::SetEmail { id, email } => {
            service.update_email(&id, &email).await?;
            println!("✓ Email for {id} set to {email}");
        }
    }

    Ok(())
}

fn field(row: &serde_json::Value, key: &str) -> String {
    match row.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}
