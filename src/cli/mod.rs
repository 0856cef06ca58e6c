//! Command-line interface for Missive.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::{cmd_query, cmd_users};

/// Missive - messaging service with guarded database access
#[derive(Parser)]
#[command(name = "missive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    #[command(alias = "serve", alias = "-d", alias = "--daemon")]
    Daemon,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Inspect and edit users through the access chain
    #[command(alias = "u")]
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Run a read-only SQL query through the cached access chain
    #[command(alias = "q")]
    Query {
        /// SQL text
        #[arg(required = true)]
        sql: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users
    #[command(alias = "ls")]
    List,

    /// Show a single user
    Get {
        /// User ID
        id: String,
    },

    /// Everyone plus the users older than an age, fetched concurrently
    Summary {
        /// Age threshold (defaults to access.older_than_age)
        #[arg(long)]
        min_age: Option<i32>,
    },

    /// Change a user's email address
    SetEmail {
        /// User ID
        id: String,
        /// New email address
        email: String,
    },
}
