//! Synchronous two-variant outcome with accumulated bindings.
//!
//! An [`Outcome`] is either a `Success` holding a value plus the bindings
//! collected so far, or a `Failure` holding an error. Every operation
//! consumes `self` and returns a new outcome; nothing is mutated in place.
//!
//! Bindings are an explicit accumulator declared by the pipeline author.
//! The `*_as` variants of the chaining operations take a binder closure that
//! writes the produced value into that accumulator, so later steps can read
//! it by field name:
//!
//! ```
//! use outcome::Outcome;
//!
//! struct Seen {
//!     a: i32,
//! }
//!
//! let r = Outcome::<i32, String>::success(5)
//!     .chain_as(|x, _| x + 1, |_, a| Seen { a: *a })
//!     .chain(|x, seen| seen.a + x);
//! assert_eq!(r.value(), Some(&12));
//! ```

use std::convert::Infallible;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::combine::OutcomeTuple;
use crate::result_async::OutcomeAsync;

/// Success or failure of a synchronous step.
///
/// A failure carries no bindings: once a pipeline has failed, the values
/// bound by earlier steps are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<A, E, B = ()> {
    Success { value: A, binds: B },
    Failure { error: E },
}

impl<A, E> Outcome<A, E> {
    /// Success with empty bindings. The error type is left to inference.
    pub fn success(value: A) -> Self {
        Outcome::Success { value, binds: () }
    }

    pub fn failure(error: E) -> Self {
        Outcome::Failure { error }
    }

    /// `Success(value)` when present, `Failure(error)` otherwise.
    pub fn from_nullable(value: Option<A>, error: E) -> Self {
        match value {
            Some(value) => Outcome::success(value),
            None => Outcome::failure(error),
        }
    }

    /// Runs a fallible call and converts its error through `on_err`.
    ///
    /// This is the boundary where `std::result::Result` (and anything `?`
    /// produces) enters a pipeline as a typed error value.
    pub fn from_exceptionable<X, F, H>(thunk: F, on_err: H) -> Self
    where
        F: FnOnce() -> Result<A, X>,
        H: FnOnce(X) -> E,
    {
        match thunk() {
            Ok(value) => Outcome::success(value),
            Err(caught) => Outcome::failure(on_err(caught)),
        }
    }
}

impl<A, E> From<Result<A, E>> for Outcome<A, E> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Outcome::success(value),
            Err(error) => Outcome::failure(error),
        }
    }
}

impl<A, E, B> Outcome<A, E, B> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&A> {
        match self {
            Outcome::Success { value, .. } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error } => Some(error),
        }
    }

    pub fn binds(&self) -> Option<&B> {
        match self {
            Outcome::Success { binds, .. } => Some(binds),
            Outcome::Failure { .. } => None,
        }
    }

    /// Drops the bindings and converts into a plain `Result`.
    pub fn into_result(self) -> Result<A, E> {
        match self {
            Outcome::Success { value, .. } => Ok(value),
            Outcome::Failure { error } => Err(error),
        }
    }

    /// Exhaustive dispatch on the variant.
    pub fn match_with<T, S, F>(self, on_success: S, on_failure: F) -> T
    where
        S: FnOnce(A, B) -> T,
        F: FnOnce(E) -> T,
    {
        match self {
            Outcome::Success { value, binds } => on_success(value, binds),
            Outcome::Failure { error } => on_failure(error),
        }
    }

    /// Maps the success value; bindings carry forward unchanged.
    pub fn chain<A2, F>(self, transform: F) -> Outcome<A2, E, B>
    where
        F: FnOnce(A, &B) -> A2,
    {
        match self {
            Outcome::Success { value, binds } => Outcome::Success {
                value: transform(value, &binds),
                binds,
            },
            Outcome::Failure { error } => Outcome::Failure { error },
        }
    }

    /// Like [`chain`](Self::chain), then records the new value with `bind`.
    pub fn chain_as<A2, B2, F, K>(self, transform: F, bind: K) -> Outcome<A2, E, B2>
    where
        F: FnOnce(A, &B) -> A2,
        K: FnOnce(B, &A2) -> B2,
    {
        match self {
            Outcome::Success { value, binds } => {
                let value = transform(value, &binds);
                let binds = bind(binds, &value);
                Outcome::Success { value, binds }
            }
            Outcome::Failure { error } => Outcome::Failure { error },
        }
    }

    /// Chains a step that can itself fail. Its error converts into `E`.
    pub fn chain_r<A2, E2, F>(self, transform: F) -> Outcome<A2, E, B>
    where
        F: FnOnce(A, &B) -> Outcome<A2, E2>,
        E2: Into<E>,
    {
        match self {
            Outcome::Success { value, binds } => match transform(value, &binds) {
                Outcome::Success { value, .. } => Outcome::Success { value, binds },
                Outcome::Failure { error } => Outcome::Failure {
                    error: error.into(),
                },
            },
            Outcome::Failure { error } => Outcome::Failure { error },
        }
    }

    pub fn chain_r_as<A2, E2, B2, F, K>(self, transform: F, bind: K) -> Outcome<A2, E, B2>
    where
        F: FnOnce(A, &B) -> Outcome<A2, E2>,
        K: FnOnce(B, &A2) -> B2,
        E2: Into<E>,
    {
        match self {
            Outcome::Success { value, binds } => match transform(value, &binds) {
                Outcome::Success { value, .. } => {
                    let binds = bind(binds, &value);
                    Outcome::Success { value, binds }
                }
                Outcome::Failure { error } => Outcome::Failure {
                    error: error.into(),
                },
            },
            Outcome::Failure { error } => Outcome::Failure { error },
        }
    }

    /// Maps the error; a success passes through untouched.
    pub fn chain_error<E2, F>(self, transform: F) -> Outcome<A, E2, B>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Outcome::Success { value, binds } => Outcome::Success { value, binds },
            Outcome::Failure { error } => Outcome::Failure {
                error: transform(error),
            },
        }
    }

    /// Replaces a failure with whatever `transform` returns, enabling
    /// fallback and recovery paths.
    pub fn chain_error_r<E2, F>(self, transform: F) -> Outcome<A, E2, B>
    where
        F: FnOnce(E) -> Outcome<A, E2, B>,
    {
        match self {
            Outcome::Success { value, binds } => Outcome::Success { value, binds },
            Outcome::Failure { error } => transform(error),
        }
    }

    /// Turns a success into `Failure(error)` when `predicate` holds.
    pub fn fail_if<P>(self, predicate: P, error: E) -> Self
    where
        P: FnOnce(&A, &B) -> bool,
    {
        match self {
            Outcome::Success { value, binds } => {
                if predicate(&value, &binds) {
                    Outcome::Failure { error }
                } else {
                    Outcome::Success { value, binds }
                }
            }
            failure => failure,
        }
    }
}

impl<A, B> Outcome<A, Infallible, B> {
    /// Re-types an outcome that cannot fail into any pipeline error.
    pub fn lift_error<E>(self) -> Outcome<A, E, B> {
        match self {
            Outcome::Success { value, binds } => Outcome::Success { value, binds },
            Outcome::Failure { error } => match error {},
        }
    }
}

impl<A, E, B> Outcome<A, E, B>
where
    A: Send + 'static,
    E: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Chains a step that returns an [`OutcomeAsync`].
    ///
    /// `transform` is called once, right away. A failure still lifts into
    /// an `OutcomeAsync` that replays the known error and schedules no work.
    pub fn chain_ra<A2, E2, F>(self, transform: F) -> OutcomeAsync<A2, E, B>
    where
        A2: Send + 'static,
        E2: Into<E> + Send + 'static,
        F: FnOnce(A, &B) -> OutcomeAsync<A2, E2>,
    {
        self.chain_ra_as(transform, |binds, _| binds)
    }

    pub fn chain_ra_as<A2, E2, B2, F, K>(self, transform: F, bind: K) -> OutcomeAsync<A2, E, B2>
    where
        A2: Send + 'static,
        E2: Into<E> + Send + 'static,
        B2: Send + 'static,
        F: FnOnce(A, &B) -> OutcomeAsync<A2, E2>,
        K: Fn(B, &A2) -> B2 + Send + Sync + 'static,
    {
        match self {
            Outcome::Success { value, binds } => {
                let inner = transform(value, &binds);
                let bind = Arc::new(bind);
                OutcomeAsync::new(move || {
                    let pending = inner.run();
                    let binds = binds.clone();
                    let bind = Arc::clone(&bind);
                    async move {
                        match pending.await {
                            Outcome::Success { value, .. } => {
                                let binds = bind(binds, &value);
                                Outcome::Success { value, binds }
                            }
                            Outcome::Failure { error } => Outcome::Failure {
                                error: error.into(),
                            },
                        }
                    }
                })
            }
            Outcome::Failure { error } => OutcomeAsync::replay_failure(error),
        }
    }
}

impl<A, E, B> Outcome<A, E, B>
where
    A: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Runs an async step whose future may reject, converting the rejection
    /// through `on_err`.
    ///
    /// The returned `OutcomeAsync` calls `transform` anew on every run.
    pub fn chain_p<A2, X, F, Fut, H>(self, transform: F, on_err: H) -> OutcomeAsync<A2, E, B>
    where
        A2: Send + 'static,
        F: Fn(A, &B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A2, X>> + Send + 'static,
        H: Fn(X) -> E + Send + Sync + 'static,
    {
        self.chain_p_as(transform, on_err, |binds, _| binds)
    }

    pub fn chain_p_as<A2, B2, X, F, Fut, H, K>(
        self,
        transform: F,
        on_err: H,
        bind: K,
    ) -> OutcomeAsync<A2, E, B2>
    where
        A2: Send + 'static,
        B2: Send + 'static,
        F: Fn(A, &B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A2, X>> + Send + 'static,
        H: Fn(X) -> E + Send + Sync + 'static,
        K: Fn(B, &A2) -> B2 + Send + Sync + 'static,
    {
        match self {
            Outcome::Success { value, binds } => {
                let steps = Arc::new((transform, on_err, bind));
                OutcomeAsync::new(move || {
                    let steps = Arc::clone(&steps);
                    let value = value.clone();
                    let binds = binds.clone();
                    async move {
                        let (transform, on_err, bind) = &*steps;
                        let pending = transform(value, &binds);
                        match pending.await {
                            Ok(value) => {
                                let binds = bind(binds, &value);
                                Outcome::Success { value, binds }
                            }
                            Err(caught) => Outcome::Failure {
                                error: on_err(caught),
                            },
                        }
                    }
                })
            }
            Outcome::Failure { error } => OutcomeAsync::replay_failure(error),
        }
    }
}

impl<A, E, B> Outcome<A, E, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Async recovery: on failure, defer to the `OutcomeAsync` built from the
    /// error. A success replays itself.
    pub fn chain_error_ra<E2, F>(self, transform: F) -> OutcomeAsync<A, E2, B>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> OutcomeAsync<A, E2, B>,
    {
        match self {
            Outcome::Success { value, binds } => OutcomeAsync::replay_success(value, binds),
            Outcome::Failure { error } => transform(error),
        }
    }
}

/// Scans left to right and stops at the first failure.
pub fn combine_seq<T: OutcomeTuple>(outcomes: T) -> Outcome<T::Values, T::Error> {
    outcomes.combine_seq()
}

/// Succeeds only when every operand succeeded; otherwise fails with every
/// error, in argument order.
pub fn combine_par<T: OutcomeTuple>(outcomes: T) -> Outcome<T::Values, Vec<T::Error>> {
    outcomes.combine_par()
}

/// Operands after the first failure are not even pulled from the iterator.
pub fn combine_array_seq<A, E, B, I>(outcomes: I) -> Outcome<Vec<A>, E>
where
    I: IntoIterator<Item = Outcome<A, E, B>>,
{
    let mut values = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Success { value, .. } => values.push(value),
            Outcome::Failure { error } => return Outcome::failure(error),
        }
    }
    Outcome::success(values)
}

pub fn combine_array_par<A, E, B, I>(outcomes: I) -> Outcome<Vec<A>, Vec<E>>
where
    I: IntoIterator<Item = Outcome<A, E, B>>,
{
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Success { value, .. } => values.push(value),
            Outcome::Failure { error } => errors.push(error),
        }
    }
    if errors.is_empty() {
        Outcome::success(values)
    } else {
        Outcome::failure(errors)
    }
}

/// Keeps the successes; each dropped failure is logged at `warn`.
pub fn combine_array_par_ignore_failures<A, E, B, I>(outcomes: I) -> Outcome<Vec<A>, Infallible>
where
    E: Debug,
    I: IntoIterator<Item = Outcome<A, E, B>>,
{
    let mut values = Vec::new();
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Outcome::Success { value, .. } => values.push(value),
            Outcome::Failure { error } => {
                log::warn!("dropping failed operand #{index}: {error:?}");
            }
        }
    }
    Outcome::success(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum FormError {
        Missing(&'static str),
        TooBig,
        Parse(String),
    }

    impl From<std::num::ParseIntError> for FormError {
        fn from(e: std::num::ParseIntError) -> Self {
            FormError::Parse(e.to_string())
        }
    }

    #[test]
    fn variants_are_exclusive() {
        let ok = Outcome::<_, FormError>::success(1);
        let err = Outcome::<i32, _>::failure(FormError::TooBig);
        assert!(ok.is_success() && !ok.is_failure());
        assert!(err.is_failure() && !err.is_success());
    }

    #[test]
    fn chain_composes_like_function_composition() {
        let f = |x: i32| x * 3;
        let g = |x: i32| x - 4;

        let composed = Outcome::<_, FormError>::success(7).chain(|x, _| f(g(x)));
        let stepped = Outcome::<_, FormError>::success(7)
            .chain(|x, _| g(x))
            .chain(|x, _| f(x));
        assert_eq!(composed, stepped);

        let failed = Outcome::<i32, _>::failure(FormError::TooBig)
            .chain(|x, _| g(x))
            .chain(|x, _| f(x));
        assert_eq!(failed.error(), Some(&FormError::TooBig));
    }

    #[test]
    fn chain_r_on_failure_never_calls_transform() {
        let calls = Cell::new(0);
        let out = Outcome::<i32, _>::failure(FormError::Missing("amount")).chain_r(|x, _| {
            calls.set(calls.get() + 1);
            Outcome::<_, FormError>::success(x + 1)
        });
        assert_eq!(calls.get(), 0);
        assert_eq!(out.error(), Some(&FormError::Missing("amount")));
    }

    #[test]
    fn chain_r_widens_step_error() {
        let out: Outcome<i32, FormError> =
            Outcome::success("4o").chain_r(|s, _| Outcome::from(s.parse::<i32>()));
        assert!(matches!(out.error(), Some(FormError::Parse(_))));
    }

    #[test]
    fn bindings_thread_through_named_steps() {
        struct A {
            a: i32,
        }
        struct Ab {
            a: i32,
            b: i32,
        }

        let out = Outcome::<_, FormError>::success(5)
            .chain_as(|x, _| x + 1, |_, a| A { a: *a })
            .chain_as(|x, binds| binds.a + x, |binds, b| Ab { a: binds.a, b: *b });
        assert_eq!(out.value(), Some(&12));
        let binds = out.binds().unwrap();
        assert_eq!((binds.a, binds.b), (6, 12));
    }

    #[test]
    fn from_exceptionable_catches_at_the_boundary() {
        let caught = Outcome::<i32, _>::from_exceptionable(
            || Err(anyhow::anyhow!("x")),
            |e| format!("caught:{e}"),
        );
        assert_eq!(caught.error().map(String::as_str), Some("caught:x"));

        let fine = Outcome::<_, String>::from_exceptionable(
            || Ok::<_, anyhow::Error>(42),
            |_| "unused".to_string(),
        );
        assert_eq!(fine.value(), Some(&42));
    }

    #[test]
    fn from_nullable_picks_variant() {
        assert_eq!(
            Outcome::from_nullable(Some(3), FormError::Missing("lot")).value(),
            Some(&3)
        );
        assert_eq!(
            Outcome::<i32, _>::from_nullable(None, FormError::Missing("lot")).error(),
            Some(&FormError::Missing("lot"))
        );
    }

    #[test]
    fn fail_if_checks_success_value() {
        assert_eq!(
            Outcome::success(10).fail_if(|x, _| *x > 5, "too big").error(),
            Some(&"too big")
        );
        assert_eq!(
            Outcome::success(3).fail_if(|x, _| *x > 5, "too big").value(),
            Some(&3)
        );
    }

    #[test]
    fn chain_error_r_recovers_and_success_passes_through() {
        let recovered = Outcome::<i32, _>::failure(FormError::TooBig)
            .chain_error_r(|_| Outcome::<_, String>::success(0));
        assert_eq!(recovered.value(), Some(&0));

        let untouched = Outcome::<_, FormError>::success(9)
            .chain_error(|e| format!("{e:?}"))
            .chain_error_r(|_| Outcome::<_, String>::success(0));
        assert_eq!(untouched.value(), Some(&9));
    }

    #[test]
    fn match_with_dispatches() {
        let alert = Outcome::<u64, _>::failure(FormError::TooBig)
            .match_with(|v, _| format!("confirmed {v}"), |e| format!("error {e:?}"));
        assert_eq!(alert, "error TooBig");
    }

    #[test]
    fn combine_seq_returns_first_failure() {
        let out = combine_seq((
            Outcome::<i32, _>::success(1),
            Outcome::<&str, _>::failure(FormError::TooBig),
            Outcome::<u8, _>::failure(FormError::Missing("c")),
        ));
        assert_eq!(out.error(), Some(&FormError::TooBig));
    }

    #[test]
    fn combine_par_accumulates_every_error() {
        let out = combine_par((
            Outcome::<i32, _>::failure("e1"),
            Outcome::success("ok"),
            Outcome::<u8, _>::failure("e3"),
        ));
        assert_eq!(out.error(), Some(&vec!["e1", "e3"]));

        let all = combine_par((
            Outcome::<_, &str>::success(1),
            Outcome::success(2),
            Outcome::success(3),
        ));
        assert_eq!(all.into_result(), Ok((1, 2, 3)));
    }

    #[test]
    fn combine_array_seq_stops_pulling_after_failure() {
        let pulled = Cell::new(0);
        let out = combine_array_seq((0..5).map(|i| {
            pulled.set(pulled.get() + 1);
            Outcome::success(i).fail_if(|x, _| *x == 1, i)
        }));
        assert_eq!(out.error(), Some(&1));
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn array_combinators() {
        let mixed = || {
            vec![
                Outcome::success(1),
                Outcome::failure("bad"),
                Outcome::success(3),
            ]
        };
        assert_eq!(combine_array_par(mixed()).error(), Some(&vec!["bad"]));
        assert_eq!(
            combine_array_par_ignore_failures(mixed()).into_result(),
            Ok(vec![1, 3])
        );
    }

    #[test]
    fn lift_error_retypes_infallible() {
        let never_fails = combine_array_par_ignore_failures(Vec::<Outcome<i32, ()>>::new());
        let lifted: Outcome<Vec<i32>, FormError> = never_fails.lift_error();
        assert_eq!(lifted.value(), Some(&vec![]));
    }

    #[test]
    fn serializes_with_status_tag() {
        let ok = Outcome::<_, String>::success(7);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "success", "value": 7, "binds": null})
        );
        let err = Outcome::<i32, _>::failure("nope".to_string());
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"status": "failure", "error": "nope"})
        );
    }

    #[tokio::test]
    async fn async_lifts_from_failure_schedule_no_work() {
        let calls = Arc::new(AtomicUsize::new(0));

        let spy = Arc::clone(&calls);
        let lifted = Outcome::<i32, _>::failure(FormError::TooBig).chain_ra(move |x, _| {
            spy.fetch_add(1, Ordering::SeqCst);
            OutcomeAsync::<_, FormError>::success(x + 1)
        });
        assert_eq!(lifted.run().await.error(), Some(&FormError::TooBig));

        let spy = Arc::clone(&calls);
        let promised = Outcome::<i32, _>::failure(FormError::TooBig).chain_p(
            move |x, _| {
                spy.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(x + 1) }
            },
            FormError::Parse,
        );
        assert_eq!(promised.run().await.error(), Some(&FormError::TooBig));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_p_converts_rejection_and_reruns_transform() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = Arc::clone(&calls);
        let op = Outcome::<_, FormError>::success("12x").chain_p(
            move |s, _| {
                spy.fetch_add(1, Ordering::SeqCst);
                async move { s.parse::<i32>() }
            },
            FormError::from,
        );

        assert!(matches!(op.run().await.error(), Some(FormError::Parse(_))));
        assert!(op.run().await.is_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chain_ra_as_binds_inner_value_and_reruns_it() {
        struct Quoted {
            price: u32,
        }

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let inner = OutcomeAsync::<_, FormError>::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            async move { Outcome::success(n * 100) }
        });
        let op = Outcome::<_, FormError>::success("lot-1")
            .chain_ra_as(move |_, _| inner, |_, price| Quoted { price: *price });

        let first = op.run().await;
        assert_eq!(first.binds().map(|q| q.price), Some(100));
        let second = op.run().await;
        assert_eq!(second.value(), Some(&200));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chain_error_ra_replays_success_and_recovers_failure() {
        let kept = Outcome::<_, FormError>::success(7)
            .chain_error_ra(|_| OutcomeAsync::<_, String>::failure("recovery ran".to_string()));
        assert_eq!(kept.run().await.value(), Some(&7));
        assert_eq!(kept.run().await.value(), Some(&7));

        let recovered = Outcome::<i32, _>::failure(FormError::Missing("amount"))
            .chain_error_ra(|_| OutcomeAsync::<_, String>::success(0));
        assert_eq!(recovered.run().await.value(), Some(&0));
    }
}
