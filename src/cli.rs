use clap::{Parser, Subcommand};

/// M&E Registry: beneficiary, program and activity approval service
#[derive(Parser)]
#[command(name = "mne", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind (defaults to MNE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Review items from the command line
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Manage bearer tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// List items awaiting approval, oldest first
    Pending {
        /// beneficiary | program | activity
        variant: String,
    },
    /// Approve a pending item
    Approve {
        variant: String,
        id: String,
        /// User id recorded as the decider
        #[arg(long)]
        actor: String,
        #[arg(long, default_value = "Admin")]
        role: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Reject a pending item
    Reject {
        variant: String,
        id: String,
        #[arg(long)]
        actor: String,
        #[arg(long, default_value = "Admin")]
        role: String,
        /// Reason for the rejection (required)
        #[arg(long)]
        notes: String,
    },
    /// Show the status history of an item
    History { variant: String, id: String },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a development bearer token
    Issue {
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: String,
        #[arg(long, default_value = "12")]
        ttl_hours: i64,
    },
}
