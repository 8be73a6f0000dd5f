//! The pair of single-value slots backing a promise.
//!
//! Each slot is a `bounded(1)` channel. The pair owns both ends of both channels for as long as it
//! lives, so a slot never closes while its promise is reachable. At most one outcome sits in the
//! two slots at any time; outcomes written while one is still undrained wait in a queue, in the
//! order they were written, and the next one is moved into its slot when the current one is
//! drained. Nothing that writes to the pair ever blocks.
//!
//! Once the pair is dropped, every waiter still holding [`Receivers`] observes the disconnect and
//! knows that no value will ever arrive.

use std::{collections::VecDeque, sync::Mutex};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};

use crate::{sync::lock, Rejection, State};

pub(crate) struct OutcomePair<T> {
    success_tx: Sender<T>,
    success_rx: Receiver<T>,
    failure_tx: Sender<Rejection>,
    failure_rx: Receiver<Rejection>,
    cycle: Mutex<Cycle<T>>,
}

/// Bookkeeping for the current resolution cycle.
struct Cycle<T> {
    state: State,
    /// Whether one of the two slots currently holds an outcome.
    occupied: bool,
    /// Outcomes written while a slot was occupied, oldest first.
    queue: VecDeque<Result<T, Rejection>>,
    /// Number of writers (producer, adopted receivers) that may still settle the pair.
    writers: usize,
    /// Whether any outcome has been drained so far.
    drained_once: bool,
}

impl<T> OutcomePair<T> {
    pub(crate) fn new() -> Self {
        let (success_tx, success_rx) = bounded(1);
        let (failure_tx, failure_rx) = bounded(1);
        Self {
            success_tx,
            success_rx,
            failure_tx,
            failure_rx,
            cycle: Mutex::new(Cycle {
                state: State::Empty,
                occupied: false,
                queue: VecDeque::new(),
                writers: 0,
                drained_once: false,
            }),
        }
    }

    pub(crate) fn state(&self) -> State {
        lock(&self.cycle).state
    }

    /// Registers a writer (producer or adopted receiver) that may settle the pair later.
    ///
    /// Every call must be balanced by a call to [`OutcomePair::detach`] once the writer is done.
    pub(crate) fn arm(&self) {
        let mut cycle = lock(&self.cycle);
        cycle.writers += 1;
        if matches!(cycle.state, State::Empty | State::Drained) {
            cycle.state = State::Pending;
        }
    }

    /// Unregisters a writer added by [`OutcomePair::arm`].
    ///
    /// If this was the last writer and nothing was settled meanwhile, the pair falls back to the
    /// state it had before any writer was attached.
    pub(crate) fn detach(&self) {
        let mut cycle = lock(&self.cycle);
        cycle.writers = cycle.writers.saturating_sub(1);
        if cycle.writers == 0 && cycle.state == State::Pending {
            cycle.state = if cycle.drained_once {
                State::Drained
            } else {
                State::Empty
            };
        }
    }

    /// Settles the pair with `outcome`, without blocking.
    ///
    /// If an outcome is still waiting to be drained, `outcome` is queued behind it.
    pub(crate) fn settle(&self, outcome: Result<T, Rejection>) {
        let mut cycle = lock(&self.cycle);
        if cycle.occupied {
            log::debug!("previous outcome not drained yet, queueing");
            cycle.queue.push_back(outcome);
        } else {
            self.fill(&mut cycle, outcome);
        }
    }

    /// Records that a reader has taken the outcome out of its slot, and moves the next queued
    /// outcome (if any) into its slot.
    pub(crate) fn drained(&self) {
        let mut cycle = lock(&self.cycle);
        cycle.occupied = false;
        cycle.drained_once = true;
        match cycle.queue.pop_front() {
            Some(next) => self.fill(&mut cycle, next),
            None => cycle.state = State::Drained,
        }
    }

    fn fill(&self, cycle: &mut Cycle<T>, outcome: Result<T, Rejection>) {
        // Both slots are empty whenever `occupied` is false, so this cannot fail. Should it fail
        // anyway, keep the outcome at the head of the queue rather than losing it.
        let res = match outcome {
            Ok(value) => self.success_tx.try_send(value).map_err(|e| Ok(into_inner(e))),
            Err(reason) => self.failure_tx.try_send(reason).map_err(|e| Err(into_inner(e))),
        };
        match res {
            Ok(()) => {
                cycle.occupied = true;
                cycle.state = State::Settled;
            }
            Err(outcome) => cycle.queue.push_front(outcome),
        }
    }

    /// Returns the reading ends of both slots.
    ///
    /// The returned [`Receivers`] do not keep the slots open: once `self` is dropped, they only
    /// yield whatever is still buffered.
    pub(crate) fn receivers(&self) -> Receivers<T> {
        Receivers {
            success: self.success_rx.clone(),
            failure: self.failure_rx.clone(),
        }
    }
}

fn into_inner<T>(e: TrySendError<T>) -> T {
    match e {
        TrySendError::Full(value) | TrySendError::Disconnected(value) => value,
    }
}

/// The reading ends of a success/failure slot pair.
pub(crate) struct Receivers<T> {
    pub(crate) success: Receiver<T>,
    pub(crate) failure: Receiver<Rejection>,
}

impl<T> Receivers<T> {
    /// Blocks until either slot yields a value.
    ///
    /// Only one outcome is taken; the other slot is left untouched. Returns [`None`] once both
    /// slots are closed and empty.
    pub(crate) fn recv(&self) -> Option<Result<T, Rejection>> {
        select! {
            recv(self.success) -> msg => if let Ok(value) = msg {
                return Some(Ok(value));
            },
            recv(self.failure) -> msg => if let Ok(reason) = msg {
                return Some(Err(reason));
            },
        }

        // A closed slot is always ready, so `select!` may have picked it even though the other
        // slot still has a buffered value.
        match self.success.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(_) => self.failure.try_recv().ok().map(Err),
        }
    }
}
