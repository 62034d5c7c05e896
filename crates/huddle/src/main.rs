//! `huddle-server`: the relay backed by an in-memory store.
//!
//! ```bash
//! # Listen on 0.0.0.0:9100 with one generated guest user
//! cargo run --bin huddle-server
//!
//! # Seed users from a config file
//! cargo run --bin huddle-server -- --config huddle.toml
//!
//! # Or override via environment
//! HUDDLE_ADDR=127.0.0.1:9200 HUDDLE_LOG=debug cargo run --bin huddle-server
//! ```

use std::sync::Arc;

use clap::Parser;
use huddle::prelude::*;

#[tokio::main]
async fn main() {
    let cli = HuddleCliArgs::parse();

    let config = match HuddleConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = Arc::new(MemoryStore::new());
    for user in &config.users {
        let identity = store
            .add_user_with_token(&user.username, &user.session_id)
            .await;
        tracing::info!(user_id = %identity.id, username = %identity.username, "seeded user");
    }
    if config.users.is_empty() {
        let (guest, token) = store.add_user("guest").await;
        tracing::warn!(
            user_id = %guest.id,
            session_id = %token,
            "no users configured, created a guest session"
        );
    }

    tracing::info!(addr = %config.bind_addr, "starting huddle relay");

    let server = match HuddleServerBuilder::new()
        .bind(&config.bind_addr)
        .server_config(config.server_config())
        .call_config(config.call_config())
        .build(StoreAuthenticator::new(Arc::clone(&store)), store)
        .await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "relay stopped");
        std::process::exit(1);
    }
}
