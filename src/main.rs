// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use fabstir_image_classifier::{
    api::{start_server, AppState},
    config::AppConfig,
    pipeline::ClassificationPipeline,
    telegram::TelegramBot,
    version,
    vision::ClassificationModel,
};
use std::{env, sync::Arc};
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Fabstir Image Classifier...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 {}", version::get_version_string());
    println!();

    let config = AppConfig::parse();
    config.validate()?;

    // The model is loaded exactly once, before any front end accepts work
    println!("🧠 Loading classification model...");
    let model = Arc::new(ClassificationModel::load(config.model_load_config()).await?);
    println!(
        "✅ Model ready: {} ({}), {} classes",
        model.spec().name,
        model.spec().version,
        model.num_classes()
    );

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    if let Some(addr) = config.api_addr() {
        let fetcher = config.http_fetcher()?;
        let pipeline =
            ClassificationPipeline::new(Arc::clone(&model), Arc::new(fetcher), config.pipeline_config());
        let token = shutdown.clone();
        tasks.spawn(async move { start_server(addr, AppState::new(pipeline), token).await });
    }

    if let Some(token) = config.telegram_token() {
        let bot = TelegramBot::new(
            token,
            Arc::clone(&model),
            config.fetch_config(),
            config.pipeline_config(),
        )?;
        let shutdown_token = shutdown.clone();
        tasks.spawn(async move { bot.run(shutdown_token).await });
    }

    println!("🛑 Press Ctrl+C to stop");
    println!("{}", "-".repeat(50));

    tokio::select! {
        _ = signal::ctrl_c() => {
            println!("\n🛑 Shutting down...");
        }
        Some(result) = tasks.join_next() => {
            // A front end stopping on its own is fatal for the node
            match result {
                Ok(Ok(())) => tracing::warn!("A front end exited unexpectedly"),
                Ok(Err(e)) => tracing::error!("Front end failed: {}", e),
                Err(e) => tracing::error!("Front end task panicked: {}", e),
            }
        }
    }

    shutdown.cancel();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Err(e)) = result {
            tracing::error!("Error during shutdown: {}", e);
        }
    }

    println!("👋 Goodbye");
    Ok(())
}
