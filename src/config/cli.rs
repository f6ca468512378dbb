use crate::app::jobs::ScheduledJob;
use crate::core::account::LabelFormat;
use crate::core::returns::ReturnMode;
use crate::domain::model::{CartId, OrderId};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "shipbridge")]
#[command(about = "Carrier integration: shipping quotes, AWBs, returns and pickup points")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "shipbridge.toml", global = true)]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Quote shipping for a parcel
    Quote {
        #[arg(long)]
        weight: f64,
        /// Deliver to a pickup point instead of an address
        #[arg(long)]
        locker: bool,
        #[arg(long)]
        oversized: bool,
    },
    /// Quote shipping for the lines of a stored order
    QuoteOrder {
        order_id: OrderId,
        #[arg(long)]
        locker: bool,
    },
    /// Compare one parcel against a standard + oversized split
    Split { order_id: OrderId },
    /// Load orders from a JSON array into the local store
    ImportOrders { file: String },
    /// Generate the outbound AWB for an order
    GenerateAwb {
        order_id: OrderId,
        #[arg(long)]
        parcels: Option<u32>,
        /// Override the weight computed from the order lines (kg)
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Generate a return AWB
    ReturnAwb {
        order_id: OrderId,
        #[arg(long, default_value = "address")]
        pickup: ReturnMode,
        #[arg(long, default_value = "address")]
        delivery: ReturnMode,
        #[arg(long)]
        pickup_pudo: Option<String>,
        #[arg(long)]
        delivery_pudo: Option<String>,
    },
    /// List return AWBs of an order
    Returns { order_id: OrderId },
    /// Poll tracking and advance order states
    Reconcile,
    /// Refresh the pickup point cache from the carrier
    SyncPudos,
    /// Search active pickup points by city
    SearchPudos { city: String },
    /// Refresh the carrier locality cache
    SyncLocalities,
    /// Look up a city in the locality cache
    Locality {
        city: String,
        #[arg(long)]
        county: Option<String>,
    },
    /// Record the pickup point chosen for a cart
    SelectPudo { cart_id: CartId, pudo_id: String },
    /// Download the AWB label as PDF
    PrintAwb {
        awb: String,
        #[arg(long, default_value = "a6")]
        format: LabelFormat,
        /// Output file, defaults to awb_<number>.pdf
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List the account's pickup locations
    Locations,
    /// List the account's price tables
    PriceTables,
    /// List the account's services
    Services,
    /// Run a scheduled job behind the cron token
    Cron {
        job: ScheduledJob,
        #[arg(long)]
        token: String,
    },
}
