// ── Orchestrator ──
//
// Owns the store, the notification task and the command router, and wires
// them to the remote link and the chat channels.

use std::sync::Arc;

use belabot_api::RemoteLink;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatMessage;
use crate::command::CommandRouter;
use crate::config::BotConfig;
use crate::notify::NotificationEngine;
use crate::store::{StateDiff, StateStore};

pub struct Bot {
    config: BotConfig,
    link: RemoteLink,
    outbound: mpsc::Sender<String>,
    store: Arc<StateStore>,
    router: Arc<CommandRouter<RemoteLink>>,
}

impl Bot {
    /// `outbound` carries every line the bot wants posted in chat.
    pub fn new(config: BotConfig, link: RemoteLink, outbound: mpsc::Sender<String>) -> Self {
        let store = Arc::new(StateStore::new(config.monitor.ups_plugged_in));
        let router = Arc::new(CommandRouter::new(
            link.clone(),
            Arc::clone(&store),
            &config,
            outbound.clone(),
        ));

        Self {
            config,
            link,
            outbound,
            store,
            router,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn link(&self) -> &RemoteLink {
        &self.link
    }

    /// Run until `cancel` fires or the chat input closes.
    pub async fn run(self, mut chat: mpsc::Receiver<ChatMessage>, cancel: CancellationToken) {
        let (diff_tx, diff_rx) = mpsc::unbounded_channel::<StateDiff>();

        let store = Arc::clone(&self.store);
        self.link.on_push(move |push| {
            let diff = store.apply(push);
            if !diff.is_empty() {
                let _ = diff_tx.send(diff);
            }
        });

        let engine = NotificationEngine::new(
            self.config.monitor.clone(),
            self.config.interface_names.clone(),
        );
        let monitor = tokio::spawn(monitor_loop(
            engine,
            diff_rx,
            Arc::clone(&self.router),
            self.outbound.clone(),
            cancel.clone(),
        ));

        match self.link.connect().await {
            Ok(()) => tracing::info!("connected to BELABOX Cloud"),
            Err(e) => tracing::warn!(error = %e, "first connection attempt failed, retrying in background"),
        }

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "command task failed");
                    }
                }
                message = chat.recv() => {
                    let Some(message) = message else {
                        tracing::info!("chat input closed");
                        break;
                    };
                    let router = Arc::clone(&self.router);
                    let outbound = self.outbound.clone();
                    tasks.spawn(async move {
                        if let Some(reply) = router.handle(&message).await {
                            let _ = outbound.send(reply).await;
                        }
                    });
                }
            }
        }

        tracing::debug!(pending = tasks.len(), "waiting for in-flight commands");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "command task failed");
            }
        }

        cancel.cancel();
        self.link.shutdown();
        let _ = monitor.await;
        tracing::info!("bot stopped");
    }
}

async fn monitor_loop(
    mut engine: NotificationEngine,
    mut diffs: mpsc::UnboundedReceiver<StateDiff>,
    router: Arc<CommandRouter<RemoteLink>>,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    loop {
        let diff = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            diff = diffs.recv() => match diff {
                Some(diff) => diff,
                None => break,
            },
        };

        for line in engine.evaluate(&diff, Instant::now()) {
            tracing::debug!(%line, "notification");
            if outbound.send(line).await.is_err() {
                return;
            }
        }

        // Starting the stream waits on a relay response; keep it off the loop.
        if let Some(progress) = router.observe(&diff).await {
            let router = Arc::clone(&router);
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let line = router.finish_reboot(progress).await;
                let _ = outbound.send(line).await;
            });
        }
    }
}
