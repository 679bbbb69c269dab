use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::CoordinatorError;

use super::protocol::{Command, Event};
use super::session::{Flow, Session};

/// Snapshots the worker may queue ahead of the caller. Once full the worker
/// blocks before its next tick, so a slow consumer throttles the simulation
/// instead of losing snapshots.
pub const EVENT_BUFFER: usize = 64;

pub type WorkerJob = Box<dyn FnOnce() + Send + 'static>;

/// Creates the isolated execution context the simulation runs in.
pub trait WorkerSpawner: Send {
    fn spawn(&self, name: &str, job: WorkerJob) -> io::Result<JoinHandle<()>>;
}

/// Runs the worker on a named OS thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSpawner;

impl WorkerSpawner for ThreadSpawner {
    fn spawn(&self, name: &str, job: WorkerJob) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name.to_owned()).spawn(job)
    }
}

pub(crate) struct WorkerHandle {
    commands: Sender<Command>,
    events: Receiver<Event>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn spawn(
        spawner: &dyn WorkerSpawner,
        name: &str,
        snapshot_every: usize,
    ) -> io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::sync_channel(EVENT_BUFFER);
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_cancel = Arc::clone(&cancel);
        let thread = spawner.spawn(
            name,
            Box::new(move || run(command_rx, event_tx, worker_cancel, snapshot_every)),
        )?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            cancel,
            thread: Some(thread),
        })
    }

    pub(crate) fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .map_err(|_| CoordinatorError::WorkerDisconnected)
    }

    pub(crate) fn try_recv(&self) -> Result<Option<Event>, CoordinatorError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CoordinatorError::WorkerDisconnected),
        }
    }

    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Option<Event>, CoordinatorError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CoordinatorError::WorkerDisconnected),
        }
    }

    /// Cancels the worker and waits for it to exit. Events it queued are
    /// discarded with the handle.
    pub(crate) fn shutdown(self) {
        let Self {
            commands,
            events,
            cancel,
            thread,
        } = self;
        cancel.store(true, Ordering::Release);
        let _ = commands.send(Command::Stop);
        // Unblocks a worker waiting on a full event buffer.
        drop(events);
        if let Some(thread) = thread
            && thread.join().is_err()
        {
            warn!("simulation worker panicked");
        }
        debug!("simulation worker joined");
    }
}

fn run(
    commands: Receiver<Command>,
    events: SyncSender<Event>,
    cancel: Arc<AtomicBool>,
    snapshot_every: usize,
) {
    let mut session = Session::new(snapshot_every);
    let mut emit = |event: Event| {
        if !cancel.load(Ordering::Acquire) {
            let _ = events.send(event);
        }
    };

    while !cancel.load(Ordering::Acquire) {
        // Pending commands are applied between ticks, never during one.
        let next = if session.is_active() {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match next {
            Some(command) => {
                if session.handle(command, &mut emit) == Flow::Stop {
                    break;
                }
            }
            None => session.step(&mut emit),
        }
    }
}
