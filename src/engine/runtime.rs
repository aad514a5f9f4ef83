// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::display::DisplaySink;
use crate::errors::Result;
use crate::registry::TaskRegistry;

use super::channel::{channel, SupervisorHandle, SupervisorMessage, SupervisorQuery};
use super::core::CoreSupervisor;
use super::{SupervisorEvent, SupervisorOptions};

/// Build a supervisor from `options`, spawn its loop on the current Tokio
/// runtime and return the handle workers and the display talk to.
pub fn spawn_supervisor<D>(
    options: SupervisorOptions,
    display: D,
) -> (SupervisorHandle, JoinHandle<Result<D>>)
where
    D: DisplaySink + 'static,
{
    spawn_supervisor_with_clock(options, display, Arc::new(SystemClock))
}

/// [`spawn_supervisor`] with an explicit clock.
pub fn spawn_supervisor_with_clock<D>(
    options: SupervisorOptions,
    display: D,
    clock: Arc<dyn Clock>,
) -> (SupervisorHandle, JoinHandle<Result<D>>)
where
    D: DisplaySink + 'static,
{
    let (handle, rx) = channel();
    let registry = TaskRegistry::with_clock(options.registry, clock);
    let core = CoreSupervisor::new(registry, options.exit_when_idle);
    let supervisor = Supervisor::new(core, rx, display, options.refresh_interval);
    (handle, tokio::spawn(supervisor.run()))
}

/// Drives the core supervisor in response to channel messages and refresh
/// ticks, and forwards the resulting row changes to a `DisplaySink`.
///
/// This is a pure IO shell around `CoreSupervisor`, which contains all the
/// supervision semantics. It is the single owner of the registry: every
/// mutation happens on the task running [`Supervisor::run`].
pub struct Supervisor<D: DisplaySink> {
    core: CoreSupervisor,
    rx: mpsc::UnboundedReceiver<SupervisorMessage>,
    display: D,
    refresh_interval: Duration,
}

impl<D: DisplaySink> fmt::Debug for Supervisor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

impl<D: DisplaySink> Supervisor<D> {
    pub fn new(
        core: CoreSupervisor,
        rx: mpsc::UnboundedReceiver<SupervisorMessage>,
        display: D,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            core,
            rx,
            display,
            refresh_interval,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes messages from the channel in order.
    /// - Feeds events into the core and forwards its notices to the display.
    /// - Answers queries from the current registry state.
    /// - Emits a `Tick` every `refresh_interval` so stale estimates update.
    ///
    /// Returns the display sink once the loop ends.
    pub async fn run(mut self) -> Result<D> {
        info!("rendertrack supervisor started");

        let mut ticker = interval(self.refresh_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                message = self.rx.recv() => match message {
                    Some(SupervisorMessage::Event(event)) => event,
                    Some(SupervisorMessage::Query(query)) => {
                        self.answer(query);
                        continue;
                    }
                    None => {
                        info!("supervisor channel closed; exiting");
                        break;
                    }
                },
                _ = ticker.tick() => SupervisorEvent::Tick,
            };

            if !matches!(event, SupervisorEvent::Tick) {
                debug!(event = event.name(), "supervisor received event");
            }

            let step = self.core.step(event);

            for notice in &step.notices {
                self.display.apply(notice);
            }

            if !step.keep_running {
                info!("core requested exit; stopping supervisor");
                break;
            }
        }

        info!("supervisor exiting");
        Ok(self.display)
    }

    fn answer(&self, query: SupervisorQuery) {
        let registry = self.core.registry();
        // A dropped receiver only means the asker stopped waiting.
        match query {
            SupervisorQuery::Controls(reply) => {
                let _ = reply.send(registry.controls());
            }
            SupervisorQuery::Selected(reply) => {
                let _ = reply.send(registry.selected_tasks());
            }
            SupervisorQuery::Snapshot(reply) => {
                let _ = reply.send(registry.rows());
            }
        }
    }
}
