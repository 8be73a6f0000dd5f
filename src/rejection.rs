//! The failure side of a [`Promise`][crate::Promise].

use std::{any::Any, error::Error as StdError, fmt};

use thiserror::Error;

/// A boxed, thread-safe error value.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The reason a [`Promise`][crate::Promise] was rejected.
///
/// The library never inspects, wraps, or retries a [`Rejection`]. It is moved verbatim from the
/// producer (or [`Promise::reject`][crate::Promise::reject]) to the failure callback that
/// observes it. Any classification of failures (transient, fatal, ...) has to be encoded in the
/// value itself.
#[derive(Debug, Error)]
pub enum Rejection {
    /// A free-form reason, typically built by the [`reject!`][crate::reject] macro.
    #[error("{0}")]
    Reason(String),
    /// An error value returned by a producer.
    #[error(transparent)]
    Error(#[from] BoxError),
    /// The producer panicked before it could return an outcome.
    #[error("producer panicked: {0}")]
    Panicked(String),
}

impl Rejection {
    /// Wraps an arbitrary error value.
    pub fn new<E: Into<BoxError>>(error: E) -> Self {
        Self::Error(error.into())
    }

    /// Creates a [`Rejection::Reason`] from preformatted arguments.
    ///
    /// This is what [`reject!`][crate::reject] expands to, so `reject!(promise, "too {}", "bad")`
    /// rejects with a reason that displays as `too bad`.
    pub fn format(args: fmt::Arguments<'_>) -> Self {
        // Avoids an allocation for the argument-less case.
        match args.as_str() {
            Some(s) => Self::Reason(s.to_owned()),
            None => Self::Reason(args.to_string()),
        }
    }

    /// Returns a reference to the wrapped error if it is of type `E`.
    ///
    /// Only [`Rejection::Error`] carries a typed error; the other variants always return [`None`].
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Error(e) => e.downcast_ref(),
            Self::Reason(_) | Self::Panicked(_) => None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("<non-string panic payload>")
        };
        Self::Panicked(msg)
    }
}

impl From<&str> for Rejection {
    fn from(reason: &str) -> Self {
        Self::Reason(reason.to_owned())
    }
}

impl From<String> for Rejection {
    fn from(reason: String) -> Self {
        Self::Reason(reason)
    }
}

/// Rejects a [`Promise`][crate::Promise] with a reason built from a format string.
///
/// `reject!(promise, "too {}", "bad")` is shorthand for
/// `promise.reject(Rejection::format(format_args!("too {}", "bad")))` and evaluates to the
/// promise handle, so it can be chained like [`Promise::reject`][crate::Promise::reject].
///
/// # Examples
///
/// ```
/// use thenable::{reject, Promise};
///
/// let promise = Promise::<i32>::empty();
/// reject!(promise, "too {}", "bad");
/// assert_eq!(promise.block().unwrap_err().to_string(), "too bad");
/// ```
#[macro_export]
macro_rules! reject {
    ($promise:expr, $($arg:tt)+) => {
        $promise.reject($crate::Rejection::format(::std::format_args!($($arg)+)))
    };
}
