use std::{
    fmt, io, mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
};

use crossbeam_channel::{bounded, Receiver};

use crate::{
    slot::{OutcomePair, Receivers},
    sync::lock,
    task, BoxError, Rejection,
};

/// Callback invoked with the value of a fulfilled [`Promise`].
pub type OnSuccess<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Callback invoked with the [`Rejection`] of a rejected [`Promise`].
pub type OnFailure = Box<dyn FnOnce(Rejection) + Send + 'static>;

/// Anything that exposes a chainable `then` operation.
///
/// [`Promise`] is the only implementor in this crate. Code that only needs to observe outcomes can
/// be written against this trait instead.
pub trait Thenable<T> {
    /// Registers callbacks that observe the next outcome, returning `self` for chaining.
    ///
    /// If `on_failure` is [`None`], a rejection delivered to this registration is discarded.
    fn then_with(&self, on_success: OnSuccess<T>, on_failure: Option<OnFailure>) -> &Self;
}

/// The lifecycle state of a [`Promise`], as returned by [`Promise::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing is attached that could settle the promise.
    Empty,
    /// A producer or adopted receiver is attached, but hasn't delivered an outcome yet.
    Pending,
    /// An outcome has been written and is waiting for a `then` registration to take it.
    Settled,
    /// The last outcome was taken. Only [`Promise::resolve`], [`Promise::reject`] or
    /// [`Promise::attach`] can settle the promise again.
    Drained,
}

/// A single-assignment container for a value that will exist later.
///
/// A [`Promise`] either gets fulfilled with a `T` or rejected with a [`Rejection`]. The outcome is
/// observed by registering callbacks with [`Promise::then`] or [`Promise::then_or_else`], which
/// wait for it on their own thread, so registering never blocks the caller.
///
/// [`Promise`] is a handle: cloning it is cheap, and all clones refer to the same promise.
///
/// # Pipeline semantics
///
/// Every outcome is delivered to *exactly one* registration. Registrations on the same promise
/// (including those made through clones, [`Promise::to`] and [`Promise::block`]) form a pipeline
/// and run strictly one after another, in the order they were made: a registration only starts
/// waiting for an outcome once the previous one has finished running its callback.
///
/// Once an outcome has been consumed, the promise is *drained*. Any further registration waits
/// until the promise is settled again, typically by a preceding callback calling
/// [`Promise::resolve`] or [`Promise::reject`]. This allows staging a computation:
///
/// ```
/// use thenable::Promise;
///
/// let promise = Promise::new(|| Ok::<_, &str>(20));
/// let next = promise.clone();
/// promise.then(move |value| {
///     next.resolve(value + 1);
/// });
/// let next = promise.clone();
/// promise.then(move |value| {
///     next.resolve(value * 2);
/// });
///
/// assert_eq!(promise.block().unwrap(), 42);
/// ```
///
/// A registration that is never given an outcome waits until every handle to the promise has been
/// dropped, and then exits without invoking its callbacks.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    pair: OutcomePair<T>,
    name: Option<String>,
    /// Closed when the most recently registered pipeline stage has finished.
    last_stage: Mutex<Option<Receiver<()>>>,
}

impl<T> Shared<T> {
    fn task_name(&self, role: &str) -> Option<String> {
        self.name.as_ref().map(|name| format!("{name}-{role}"))
    }

    fn spawn<F>(&self, role: &str, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = task::spawn(self.task_name(role), f) {
            panic!("failed to spawn promise {role} thread: {e}");
        }
    }
}

/// A builder object that can be used to configure and create a [`Promise`].
#[derive(Clone, Default)]
pub struct PromiseBuilder {
    name: Option<String>,
}

impl PromiseBuilder {
    /// Sets the base name of the threads spawned on behalf of the [`Promise`].
    ///
    /// Each thread is named after this base name and its role, for example `fetch-producer` or
    /// `fetch-then`.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Creates an empty [`Promise`] that is settled by [`Promise::attach`], [`Promise::resolve`]
    /// or [`Promise::reject`].
    pub fn empty<T: Send + 'static>(self) -> Promise<T> {
        Promise {
            shared: Arc::new(Shared {
                pair: OutcomePair::new(),
                name: self.name,
                last_stage: Mutex::new(None),
            }),
        }
    }

    /// Spawns a thread running `producer`, and returns a [`Promise`] for its outcome.
    ///
    /// The producer starts running immediately, before any callbacks are registered. If it
    /// returns `Ok`, the promise is fulfilled with the value; if it returns `Err`, the promise is
    /// rejected with the error converted to a [`Rejection`]. If it panics, the promise is rejected
    /// with [`Rejection::Panicked`].
    ///
    /// An error is returned if the thread could not be spawned.
    pub fn spawn<T, E, F>(self, producer: F) -> io::Result<Promise<T>>
    where
        T: Send + 'static,
        E: Into<Rejection>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let promise = self.empty();
        let shared = promise.shared.clone();
        shared.pair.arm();
        task::spawn(promise.shared.task_name("producer"), move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(producer)) {
                Ok(res) => res.map_err(Into::into),
                Err(payload) => {
                    let reason = Rejection::from_panic(payload);
                    log::warn!("rejecting promise: {reason}");
                    Err(reason)
                }
            };
            shared.pair.settle(outcome);
            shared.pair.detach();
        })?;
        Ok(promise)
    }
}

impl Promise<()> {
    /// Returns a builder that can be used to configure and create a [`Promise`].
    #[inline]
    pub fn builder() -> PromiseBuilder {
        PromiseBuilder { name: None }
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Runs `producer` on a new thread and returns a [`Promise`] for its outcome.
    ///
    /// This returns immediately; see [`PromiseBuilder::spawn`] for the details.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread; use [`PromiseBuilder::spawn`] to recover from
    /// such errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use thenable::Promise;
    ///
    /// let promise = Promise::new(|| Ok::<_, &str>("hello"));
    /// assert_eq!(promise.block().unwrap(), "hello");
    ///
    /// let promise = Promise::new(|| Err::<(), _>("Too bad"));
    /// assert_eq!(promise.block().unwrap_err().to_string(), "Too bad");
    /// ```
    ///
    /// The error type has to convert into a [`Rejection`], which strings and [`Rejection`] itself
    /// do. For producers failing with an arbitrary [`std::error::Error`], use
    /// [`Promise::try_new`].
    pub fn new<E, F>(producer: F) -> Self
    where
        E: Into<Rejection>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        match Promise::builder().spawn(producer) {
            Ok(promise) => promise,
            Err(e) => panic!("failed to spawn promise producer thread: {e}"),
        }
    }

    /// Like [`Promise::new`], but for producers that fail with any error type.
    ///
    /// An error returned by `producer` rejects the promise with [`Rejection::Error`], from which
    /// it can be recovered with [`Rejection::downcast_ref`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::ParseIntError;
    /// use thenable::Promise;
    ///
    /// let promise = Promise::try_new(|| "x".parse::<u32>());
    /// let reason = promise.block().unwrap_err();
    /// assert!(reason.downcast_ref::<ParseIntError>().is_some());
    /// ```
    pub fn try_new<E, F>(producer: F) -> Self
    where
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Self::new(move || producer().map_err(Rejection::new))
    }

    /// Creates an empty [`Promise`].
    ///
    /// Callbacks can be registered right away, but they will only run once the promise is
    /// settled by [`Promise::attach`], [`Promise::resolve`] or [`Promise::reject`].
    pub fn empty() -> Self {
        Promise::builder().empty()
    }

    /// Creates a [`Promise`] that adopts externally supplied receivers.
    ///
    /// This is the inverse of [`Promise::to`]; see [`Promise::attach`] for details.
    pub fn from_receivers(success: Receiver<T>, failure: Option<Receiver<Rejection>>) -> Self {
        let promise = Self::empty();
        promise.attach(success, failure);
        promise
    }

    /// Adopts externally supplied receivers as sources of outcomes for this promise.
    ///
    /// Every value received on `success` fulfills the promise and every [`Rejection`] received on
    /// `failure` rejects it, in the same way as [`Promise::resolve`] and [`Promise::reject`] do.
    /// Forwarding stops once the sending side of a receiver is dropped, so external code should
    /// drop its [`Sender`] once it is done.
    ///
    /// Without a `failure` receiver, the adopted source can never reject the promise.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread.
    ///
    /// [`Sender`]: crossbeam_channel::Sender
    pub fn attach(&self, success: Receiver<T>, failure: Option<Receiver<Rejection>>) -> &Self {
        self.shared.pair.arm();
        let shared = self.shared.clone();
        self.shared.spawn("from", move || {
            for value in success {
                shared.pair.settle(Ok(value));
            }
            shared.pair.detach();
        });

        if let Some(failure) = failure {
            self.shared.pair.arm();
            let shared = self.shared.clone();
            self.shared.spawn("from", move || {
                for reason in failure {
                    shared.pair.settle(Err(reason));
                }
                shared.pair.detach();
            });
        }
        self
    }

    /// Registers a callback that is invoked with the value this promise is fulfilled with.
    ///
    /// If the promise is rejected instead, the rejection is discarded and `on_success` is dropped
    /// without being invoked. Use [`Promise::then_or_else`] to observe rejections.
    ///
    /// This returns immediately. Returns `self`, so that further stages can be chained.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread. A panic inside `on_success` only unwinds the
    /// thread that runs it; the next stage of the pipeline still runs.
    pub fn then<F>(&self, on_success: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.register(Box::new(on_success), None);
        self
    }

    /// Registers a pair of callbacks, one of which is invoked with the outcome of this promise.
    ///
    /// Behaves like [`Promise::then`], but rejections are passed to `on_failure`.
    pub fn then_or_else<F, R>(&self, on_success: F, on_failure: R) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
        R: FnOnce(Rejection) + Send + 'static,
    {
        self.register(Box::new(on_success), Some(Box::new(on_failure)));
        self
    }

    /// Fulfills the promise with `value`.
    ///
    /// This settles an empty or pending promise, or re-arms a drained one so that the next
    /// pipeline stage observes `value`.
    ///
    /// This never blocks. If the previous outcome hasn't been taken yet, `value` is queued behind
    /// it, and outcomes are delivered in the order they were settled.
    pub fn resolve(&self, value: T) -> &Self {
        self.shared.pair.settle(Ok(value));
        self
    }

    /// Rejects the promise with `reason`.
    ///
    /// Settling works exactly like [`Promise::resolve`]. To build a reason from a format string,
    /// use the [`reject!`][crate::reject] macro.
    pub fn reject<R: Into<Rejection>>(&self, reason: R) -> &Self {
        self.shared.pair.settle(Err(reason.into()));
        self
    }

    /// Returns a pair of receivers that yield the next outcome of this promise.
    ///
    /// This registers a pipeline stage like [`Promise::then_or_else`] does. The matching receiver
    /// yields the outcome; once it has been delivered, both receivers are disconnected. This lets
    /// code that only knows about channels observe the promise.
    ///
    /// # Examples
    ///
    /// ```
    /// use thenable::Promise;
    /// use crossbeam_channel::select;
    ///
    /// let promise = Promise::new(|| Ok::<_, &str>("hello"));
    /// let (success, failure) = promise.to();
    /// select! {
    ///     recv(success) -> msg => assert_eq!(msg.unwrap(), "hello"),
    ///     recv(failure) -> _ => unreachable!(),
    /// }
    /// ```
    pub fn to(&self) -> (Receiver<T>, Receiver<Rejection>) {
        let (success_tx, success_rx) = bounded(1);
        let (failure_tx, failure_rx) = bounded(1);
        self.then_or_else(
            move |value| {
                let _ = success_tx.send(value);
            },
            move |reason| {
                let _ = failure_tx.send(reason);
            },
        );
        (success_rx, failure_rx)
    }

    /// Blocks the calling thread until this promise delivers an outcome to it.
    ///
    /// This registers a pipeline stage, so it waits for all previously registered stages to run
    /// first, and consumes the outcome it returns.
    ///
    /// Calling this from inside a callback registered on the same promise will deadlock, since the
    /// callback's stage has to finish before this one can start.
    pub fn block(&self) -> Result<T, Rejection> {
        let (success, failure) = self.to();
        match (Receivers { success, failure }).recv() {
            Some(outcome) => outcome,
            // The stage drops its senders only after delivering, and `self` keeps the promise
            // alive, so the stage cannot exit without an outcome.
            None => unreachable!("promise stage exited without an outcome"),
        }
    }

    /// Returns the current lifecycle [`State`] of the promise.
    ///
    /// The state may change concurrently, so the result is only a snapshot.
    pub fn state(&self) -> State {
        self.shared.pair.state()
    }

    fn register(&self, on_success: OnSuccess<T>, on_failure: Option<OnFailure>) {
        let (done, stage_done) = bounded::<()>(0);
        let previous = mem::replace(&mut *lock(&self.shared.last_stage), Some(stage_done));
        let receivers = self.shared.pair.receivers();
        // The stage must not keep the slots open, or it would never notice that the promise
        // became unreachable.
        let shared = Arc::downgrade(&self.shared);

        self.shared.spawn("then", move || {
            // Dropped when this stage exits, which releases the next one.
            let _done = done;
            if let Some(previous) = previous {
                // Nothing is ever sent; this returns once the previous stage has exited.
                let _ = previous.recv();
            }

            let Some(outcome) = receivers.recv() else {
                log::trace!("promise dropped before delivering an outcome");
                return;
            };
            if let Some(shared) = shared.upgrade() {
                shared.pair.drained();
            }

            match (outcome, on_failure) {
                (Ok(value), _) => on_success(value),
                (Err(reason), Some(on_failure)) => on_failure(reason),
                (Err(_), None) => {}
            }
        });
    }
}

impl<T: Send + 'static> Thenable<T> for Promise<T> {
    fn then_with(&self, on_success: OnSuccess<T>, on_failure: Option<OnFailure>) -> &Self {
        self.register(on_success, on_failure);
        self
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Send + 'static> From<Receiver<T>> for Promise<T> {
    fn from(success: Receiver<T>) -> Self {
        Self::from_receivers(success, None)
    }
}

impl<T: Send + 'static> From<(Receiver<T>, Receiver<Rejection>)> for Promise<T> {
    fn from((success, failure): (Receiver<T>, Receiver<Rejection>)) -> Self {
        Self::from_receivers(success, Some(failure))
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("name", &self.shared.name)
            .field("state", &self.shared.pair.state())
            .finish_non_exhaustive()
    }
}
