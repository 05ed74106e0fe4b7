//! brined - brine gossip-averaging node
//!
//! Joins the local network's gossip group and keeps a shared estimate in
//! step with its peers until interrupted.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    brine_cli::run().await
}
