//! SILVERTAPE CLI - Order inspection and payment reconciliation.
//!
//! # Usage
//!
//! ```bash
//! # Print one order as JSON
//! st-cli orders show HO-1718000000000-3fa9c2d1
//!
//! # List orders, optionally by status
//! st-cli orders list --status pending
//!
//! # Pending orders older than 30 minutes
//! st-cli orders stale --minutes 30
//!
//! # Settle stale pending orders against the payment gateway
//! st-cli orders reconcile --minutes 30
//! st-cli orders reconcile --order-id HO-1718000000000-3fa9c2d1
//! ```
//!
//! # Environment Variables
//!
//! - `ORDER_STORAGE_DIR` - Order record directory (default `data/orders`)
//! - `STALE_ORDER_MINUTES` - Default staleness threshold for `stale`/`reconcile`
//! - `STOREFRONT_BASE_URL`, `TOSS_CLIENT_KEY`, `TOSS_SECRET_KEY` - Required by
//!   `reconcile`, which talks to the gateway

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "st-cli")]
#[command(author, version, about = "SILVERTAPE operations CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and reconcile orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Print one order as pretty JSON
    Show {
        /// Order ID (e.g. HO-1718000000000-3fa9c2d1)
        order_id: String,
    },
    /// List stored orders
    List {
        /// Only orders in this status (`pending`, `paid`, `failed`, ...)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// List pending orders older than a threshold
    Stale {
        /// Age threshold in minutes (default: `STALE_ORDER_MINUTES` or 30)
        #[arg(short, long)]
        minutes: Option<u64>,
    },
    /// Ask the gateway about pending orders and settle them
    Reconcile {
        /// Age threshold in minutes (default: `STALE_ORDER_MINUTES` or 30)
        #[arg(short, long)]
        minutes: Option<u64>,

        /// Reconcile only this order, regardless of age
        #[arg(long)]
        order_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Orders { action } => match action {
            OrdersAction::Show { order_id } => commands::orders::show(&order_id).await?,
            OrdersAction::List { status } => commands::orders::list(status.as_deref()).await?,
            OrdersAction::Stale { minutes } => commands::orders::stale(minutes).await?,
            OrdersAction::Reconcile { minutes, order_id } => {
                commands::reconcile::run(minutes, order_id.as_deref()).await?;
            }
        },
    }
    Ok(())
}
