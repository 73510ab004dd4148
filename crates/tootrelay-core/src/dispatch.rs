//! Runs one supervisor task per configured server.

use std::{convert::Infallible, sync::Arc};

use tokio::task::JoinSet;

use crate::{
    config::{ServerConfig, Settings},
    errors::Error,
    ports::{NotificationSink, StreamingTransport},
    supervisor::{ConnectionSupervisor, SupervisorOptions},
    Result,
};

#[derive(Default)]
pub struct Dispatcher {
    tasks: JoinSet<(String, Result<Infallible>)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and spawn a supervisor for every server in `settings`.
    ///
    /// `connect` creates the transport bound to one server.
    pub fn from_settings<F>(
        settings: &Settings,
        sink: Arc<dyn NotificationSink>,
        mut connect: F,
    ) -> Result<Self>
    where
        F: FnMut(&ServerConfig) -> Result<Arc<dyn StreamingTransport>>,
    {
        let opts = SupervisorOptions::from_settings(settings);
        let mut dispatcher = Self::new();
        for server in &settings.server_confs {
            let transport = connect(server)?;
            dispatcher.spawn(ConnectionSupervisor::new(
                server.clone(),
                transport,
                sink.clone(),
                opts,
            ));
        }
        Ok(dispatcher)
    }

    pub fn spawn(&mut self, supervisor: ConnectionSupervisor) {
        let server = supervisor.server().server_url.clone();
        tracing::info!(server = %server, "starting supervisor");
        self.tasks
            .spawn(async move { (server, supervisor.run().await) });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Block while any supervisor is alive.
    ///
    /// A stopped supervisor is logged and the rest keep running. Returns an
    /// error once every supervisor has stopped, or `Ok` right away when there
    /// are none.
    pub async fn run(mut self) -> Result<()> {
        if self.tasks.is_empty() {
            tracing::warn!("no servers configured; nothing to relay");
            return Ok(());
        }

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(never))) => match never {},
                Ok((server, Err(e))) => {
                    tracing::error!(server = %server, error = %e, "server degraded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "supervisor task aborted");
                }
            }
        }

        Err(Error::External(
            "every server supervisor has stopped".to_string(),
        ))
    }
}
