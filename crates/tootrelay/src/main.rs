use std::sync::Arc;

use anyhow::Context;

use tootrelay_core::{
    config::Settings,
    dispatch::Dispatcher,
    ports::{NotificationSink, StreamingTransport},
};
use tootrelay_mastodon::MastodonClient;
use tootrelay_slack::SlackWebhook;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // No settings file: nothing to relay, exit quietly.
    let Some(settings) = Settings::load().context("failed to load settings")? else {
        return Ok(());
    };

    tootrelay_core::logging::init("tootrelay")?;

    let sink: Arc<dyn NotificationSink> = Arc::new(
        SlackWebhook::new(settings.slack_webhook_url.clone(), settings.relay.clone())
            .context("failed to build webhook client")?,
    );

    let dispatcher = Dispatcher::from_settings(&settings, sink, |server| {
        let client = MastodonClient::new(server.clone())?;
        Ok(Arc::new(client) as Arc<dyn StreamingTransport>)
    })
    .context("failed to start server supervisors")?;

    tracing::info!(servers = dispatcher.len(), "relay started");

    dispatcher.run().await?;
    Ok(())
}
