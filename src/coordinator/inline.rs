use std::collections::VecDeque;

use super::protocol::{Command, Event};
use super::session::{Flow, Session};

/// Runs the session on the caller's thread, a batch of ticks per frame.
pub(crate) struct InlineRunner {
    session: Session,
    pending: VecDeque<Event>,
    ticks_per_frame: usize,
    stopped: bool,
}

impl InlineRunner {
    pub(crate) fn new(snapshot_every: usize, ticks_per_frame: usize) -> Self {
        Self {
            session: Session::new(snapshot_every),
            pending: VecDeque::new(),
            ticks_per_frame: ticks_per_frame.max(1),
            stopped: false,
        }
    }

    pub(crate) fn send(&mut self, command: Command) {
        if self.stopped {
            return;
        }
        let pending = &mut self.pending;
        if self.session.handle(command, &mut |event| pending.push_back(event)) == Flow::Stop {
            self.stopped = true;
            self.pending.clear();
        }
    }

    pub(crate) fn run_frame(&mut self) {
        for _ in 0..self.ticks_per_frame {
            if !self.tick() {
                break;
            }
        }
    }

    fn tick(&mut self) -> bool {
        if self.stopped || !self.session.is_active() {
            return false;
        }
        let pending = &mut self.pending;
        self.session.step(&mut |event| pending.push_back(event));
        true
    }

    pub(crate) fn drain(&mut self) -> Vec<Event> {
        self.pending.drain(..).collect()
    }

    /// Next event, ticking synchronously until one is produced or the
    /// session goes idle.
    pub(crate) fn next_event(&mut self) -> Option<Event> {
        while self.pending.is_empty() {
            if !self.tick() {
                break;
            }
        }
        self.pending.pop_front()
    }
}
