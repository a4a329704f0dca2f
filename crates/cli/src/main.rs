//! Mercato CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! mercato-cli migrate
//!
//! # Print an order as JSON
//! mercato-cli orders show 0b5c7f0e-4d1c-4a8e-9a43-3f2d7c1b9e10
//!
//! # Advance an order's fulfillment status
//! mercato-cli orders set-status 0b5c7f0e-4d1c-4a8e-9a43-3f2d7c1b9e10 processing
//!
//! # Sign an event body the way the checkout provider does
//! mercato-cli webhook sign event.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mercato-cli")]
#[command(author, version, about = "Mercato operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect and maintain orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Local webhook testing
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Print an order as JSON
    Show {
        /// Order id
        id: String,
    },
    /// Apply an administrative status update
    SetStatus {
        /// Order id
        id: String,
        /// Target status (`processing`, `out_for_delivery`, `delivered`, `cancelled`, ...)
        status: String,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Print a signature header for a payload file
    Sign {
        /// File holding the raw event body
        file: PathBuf,

        /// Unix timestamp to sign with (defaults to now)
        #[arg(short, long)]
        timestamp: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Orders { action } => match action {
            OrderAction::Show { id } => commands::orders::show(&id).await?,
            OrderAction::SetStatus { id, status } => {
                commands::orders::set_status(&id, &status).await?;
            }
        },
        Commands::Webhook { action } => match action {
            WebhookAction::Sign { file, timestamp } => {
                commands::webhook::sign_file(&file, timestamp)?;
            }
        },
    }
    Ok(())
}
