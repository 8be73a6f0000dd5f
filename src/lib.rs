//! Single-assignment promises backed by threads.
//!
//! A [`Promise`] is a handle to a value that will exist later: it is eventually fulfilled with a
//! value or rejected with a [`Rejection`]. The outcome is produced concurrently (by a producer
//! closure, by external code writing into a channel, or by an explicit [`Promise::resolve`] or
//! [`Promise::reject`]) and observed by registering callbacks with [`Promise::then`].
//!
//! (if you're running large numbers of I/O tasks concurrently, you're probably better served by
//! an `async` runtime; every producer and every registered callback here runs on its own OS
//! thread)
//!
//! # Overview
//!
//! - [`Promise::new`] runs a producer closure on a new thread right away. Whatever it returns
//!   settles the promise; a panic rejects it with [`Rejection::Panicked`].
//! - [`Promise::then`] and [`Promise::then_or_else`] register callbacks without blocking. Each
//!   outcome is delivered to exactly one registration, and registrations run one after another,
//!   in the order they were made.
//! - [`Promise::resolve`] and [`Promise::reject`] settle the promise by hand. After a registration
//!   has consumed an outcome, they *re-arm* the promise, so that the next registration observes
//!   a new outcome. This is how a chain of `then` calls becomes a pipeline of stages.
//! - [`Promise::to`] and [`Promise::from_receivers`] convert between promises and plain
//!   [`crossbeam_channel`] receivers, for interop with code that only speaks channels.
//!
//! # Usage
//!
//! Observing the outcome of a producer:
//!
//! ```
//! use thenable::Promise;
//! use crossbeam_channel::bounded;
//!
//! let (tx, rx) = bounded(1);
//! Promise::new(|| {
//!     println!("Doing heavy task...");
//!     Ok::<_, &str>(1 + 1)
//! })
//! .then_or_else(
//!     move |value| tx.send(value).unwrap(),
//!     |reason| panic!("unexpected rejection: {reason}"),
//! );
//!
//! // <do other work concurrently>
//!
//! assert_eq!(rx.recv().unwrap(), 2);
//! ```
//!
//! Chaining stages that each re-arm the promise:
//!
//! ```
//! use thenable::{reject, Promise};
//!
//! let promise = Promise::try_new(|| "17".parse::<u32>());
//!
//! let next = promise.clone();
//! promise.then(move |n| {
//!     if n % 2 == 0 {
//!         next.resolve(n / 2);
//!     } else {
//!         reject!(next, "{n} is odd");
//!     }
//! });
//!
//! assert_eq!(promise.block().unwrap_err().to_string(), "17 is odd");
//! ```
//!
//! Adopting a channel written by code that knows nothing about promises:
//!
//! ```
//! use std::thread;
//! use thenable::Promise;
//! use crossbeam_channel::bounded;
//!
//! let (tx, rx) = bounded(1);
//! let promise = Promise::from(rx);
//! thread::spawn(move || tx.send("hello").unwrap());
//! assert_eq!(promise.block().unwrap(), "hello");
//! ```

mod promise;
mod rejection;
mod slot;
mod sync;
mod task;
#[cfg(test)]
mod test;

pub use promise::{OnFailure, OnSuccess, Promise, PromiseBuilder, State, Thenable};
pub use rejection::{BoxError, Rejection};
