//! Long-polling mode: no HTTP server; updates come from getUpdates.

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::app::App;
use crate::channels::{ChatGateway, TelegramUpdate};
use crate::config::Config;
use crate::gateway::shutdown_signal;

/// Run the bot with getUpdates until SIGINT/SIGTERM. Any registered webhook is removed
/// first since Telegram refuses getUpdates while one is set.
pub async fn run_polling(config: Config, config_path: PathBuf) -> Result<()> {
    let app = App::build(&config, &config_path)?;
    match app.telegram.delete_webhook().await {
        Ok(_) => log::debug!("telegram: webhook removed before polling"),
        Err(e) => log::warn!("telegram: deleteWebhook failed, getUpdates may be refused: {}", e),
    }

    let worker = tokio::spawn(app.worker.run());
    let (updates_tx, mut updates_rx) = mpsc::channel::<TelegramUpdate>(64);
    let poller = app.telegram.clone().start_polling(updates_tx);

    let dispatcher = app.dispatcher.clone();
    let router = tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let request_id = uuid::Uuid::new_v4().to_string();
                dispatcher.feed_update(update, Some(request_id)).await;
            });
        }
    });

    shutdown_signal().await;
    app.telegram.stop();
    if let Err(e) = poller.await {
        log::warn!("telegram: poll loop ended abnormally: {}", e);
    }
    router.abort();
    worker.abort();
    log::info!("polling stopped");
    Ok(())
}
