//! Agent event loop
//!
//! Single-threaded dispatch of typed events. The loop suspends only
//! while waiting for the next event; every handler runs to completion
//! before another event is looked at, so controller state needs no
//! locking and actuation stays strictly ordered behind the log
//! observation that triggered it.

use crate::config::GuardConfig;
use crate::error::Result;
use crate::failover::FailoverController;
use crate::log_tail::LogTailer;
use crate::status::{StatusSink, KEY_AGENT_STATE};
use crate::syslog::OperStatusChange;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Events driving the agent
#[derive(Debug)]
pub enum AgentEvent {
    /// The watched log file changed; tail it
    FileChanged,
    /// An interface line-protocol transition was observed in the log
    InterfaceOperChanged(OperStatusChange),
    /// Runtime options may have changed; reload them
    OptionChanged,
    /// Stop the event loop after the current handler
    ShutdownRequested,
}

/// Owns the event loop and everything it drives
pub struct Agent {
    tailer: LogTailer,
    controller: FailoverController,
    status: Arc<dyn StatusSink>,
    config_path: PathBuf,
    wake_tx: UnboundedSender<()>,
    wake_rx: UnboundedReceiver<()>,
    event_tx: UnboundedSender<AgentEvent>,
    event_rx: UnboundedReceiver<AgentEvent>,
}

impl Agent {
    pub fn new(
        tailer: LogTailer,
        controller: FailoverController,
        status: Arc<dyn StatusSink>,
        config_path: PathBuf,
    ) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            tailer,
            controller,
            status,
            config_path,
            wake_tx,
            wake_rx,
            event_tx,
            event_rx,
        }
    }

    /// Sender for file-change wake-ups, handed to the log watcher
    pub fn wake_sender(&self) -> UnboundedSender<()> {
        self.wake_tx.clone()
    }

    /// Sender for control events
    pub fn event_sender(&self) -> UnboundedSender<AgentEvent> {
        self.event_tx.clone()
    }

    /// Run until shutdown is requested.
    ///
    /// Performs initial discovery, marks the agent running, then
    /// dispatches events. On exit the published agent state is set to
    /// stopped so operators can distinguish a clean stop from a crash.
    pub async fn run(&mut self) -> Result<()> {
        self.spawn_signal_tasks()?;

        self.controller.init().await;
        self.status.set(KEY_AGENT_STATE, "running");
        info!("evpnguardd running");

        loop {
            let event = self.next_event().await;
            debug!(event = ?event, "Dispatching event");

            match event {
                AgentEvent::FileChanged => self.on_file_changed().await,
                AgentEvent::InterfaceOperChanged(change) => self.on_oper_changed(change),
                AgentEvent::OptionChanged => self.on_option_changed(),
                AgentEvent::ShutdownRequested => break,
            }
        }

        info!("Shutting down");
        self.status.set(KEY_AGENT_STATE, "stopped");
        Ok(())
    }

    async fn next_event(&mut self) -> AgentEvent {
        // Control events take priority over file processing so a burst
        // of log appends cannot starve shutdown or option reloads.
        tokio::select! {
            biased;
            event = self.event_rx.recv() => event.unwrap_or(AgentEvent::ShutdownRequested),
            wake = self.wake_rx.recv() => match wake {
                Some(()) => AgentEvent::FileChanged,
                None => AgentEvent::ShutdownRequested,
            },
        }
    }

    async fn on_file_changed(&mut self) {
        // Coalesce queued wake-ups from an append burst into one pass
        while self.wake_rx.try_recv().is_ok() {}

        let outcome = self.tailer.tail();

        for change in outcome.oper_changes {
            let _ = self.event_tx.send(AgentEvent::InterfaceOperChanged(change));
        }

        if outcome.adjacency_change {
            self.controller.evaluate().await;
        }
    }

    fn on_oper_changed(&self, change: OperStatusChange) {
        let state = if change.up { "up" } else { "down" };
        info!(interface = %change.interface, state, "Interface line protocol changed");
    }

    fn on_option_changed(&mut self) {
        match GuardConfig::load_or_default(&self.config_path) {
            Ok(config) => {
                self.controller
                    .set_rediscover_on_transition(config.failover.rediscover_on_transition);
                info!("Runtime options reloaded");
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload configuration, keeping current options");
            }
        }
    }

    fn spawn_signal_tasks(&self) -> Result<()> {
        let tx = self.event_tx.clone();
        let mut term = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            info!("Received shutdown signal");
            let _ = tx.send(AgentEvent::ShutdownRequested);
        });

        let tx = self.event_tx.clone();
        let mut hup = signal(SignalKind::hangup())?;
        tokio::spawn(async move {
            while hup.recv().await.is_some() {
                let _ = tx.send(AgentEvent::OptionChanged);
            }
        });

        Ok(())
    }
}
