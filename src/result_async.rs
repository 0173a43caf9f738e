//! Lazy, restartable asynchronous outcome.
//!
//! An [`OutcomeAsync`] wraps a future factory. Building one performs no
//! work; [`OutcomeAsync::run`] calls the factory and returns a fresh future
//! every time, so running twice repeats every side effect. Nothing is
//! memoized: store the resolved [`Outcome`] if you need it again.
//!
//! The operation vocabulary mirrors [`Outcome`]. Each step waits for the
//! previous one to settle before it starts.

use std::convert::Infallible;
use std::fmt;
use std::fmt::Debug;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::combine::{resume, settle_run, AsyncTuple, ReifyTuple};
use crate::result::{self, Outcome};

pub use crate::looping::{iterate_until, loop_until, loop_until_simpler};

type Thunk<A, E, B> = dyn Fn() -> BoxFuture<'static, Outcome<A, E, B>> + Send + Sync;

/// Deferred computation producing an [`Outcome`] each time it is run.
pub struct OutcomeAsync<A, E, B = ()> {
    thunk: Arc<Thunk<A, E, B>>,
}

impl<A, E, B> Clone for OutcomeAsync<A, E, B> {
    fn clone(&self) -> Self {
        OutcomeAsync {
            thunk: Arc::clone(&self.thunk),
        }
    }
}

impl<A, E, B> fmt::Debug for OutcomeAsync<A, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeAsync").finish_non_exhaustive()
    }
}

impl<A, E> OutcomeAsync<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    pub fn success(value: A) -> Self
    where
        A: Clone + Sync,
    {
        Self::replay_success(value, ())
    }

    pub fn failure(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::replay_failure(error)
    }

    pub fn from_nullable(value: Option<A>, error: E) -> Self
    where
        A: Clone + Sync,
        E: Clone + Sync,
    {
        Self::from_outcome(Outcome::from_nullable(value, error))
    }

    /// Lazy counterpart of [`Outcome::from_exceptionable`]: `thunk` runs on
    /// every `run`, not at construction.
    pub fn from_exceptionable<X, F, H>(thunk: F, on_err: H) -> Self
    where
        F: Fn() -> Result<A, X> + Send + Sync + 'static,
        H: Fn(X) -> E + Send + Sync + 'static,
    {
        let steps = Arc::new((thunk, on_err));
        OutcomeAsync::new(move || {
            let steps = Arc::clone(&steps);
            async move {
                let (thunk, on_err) = &*steps;
                Outcome::from_exceptionable(thunk, on_err)
            }
        })
    }

    /// Awaits a fresh future from `make` on each run. A rejected future
    /// (`Err`) becomes a failure through `on_err`.
    pub fn from_future<X, F, Fut, H>(make: F, on_err: H) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, X>> + Send + 'static,
        H: Fn(X) -> E + Send + Sync + 'static,
    {
        let steps = Arc::new((make, on_err));
        OutcomeAsync::new(move || {
            let steps = Arc::clone(&steps);
            async move {
                let (make, on_err) = &*steps;
                match make().await {
                    Ok(value) => Outcome::success(value),
                    Err(caught) => Outcome::failure(on_err(caught)),
                }
            }
        })
    }
}

impl<A, E, B> OutcomeAsync<A, E, B>
where
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
{
    pub fn new<F, Fut>(thunk: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<A, E, B>> + Send + 'static,
    {
        let thunk: Arc<Thunk<A, E, B>> = Arc::new(move || thunk().boxed());
        OutcomeAsync { thunk }
    }

    /// Lifts an already computed outcome; each run replays a clone of it.
    pub fn from_outcome(outcome: Outcome<A, E, B>) -> Self
    where
        Outcome<A, E, B>: Clone + Sync,
    {
        OutcomeAsync::new(move || {
            let outcome = outcome.clone();
            async move { outcome }
        })
    }

    pub(crate) fn replay_success(value: A, binds: B) -> Self
    where
        A: Clone + Sync,
        B: Clone + Sync,
    {
        OutcomeAsync::new(move || {
            let settled = Outcome::Success {
                value: value.clone(),
                binds: binds.clone(),
            };
            async move { settled }
        })
    }

    pub(crate) fn replay_failure(error: E) -> Self
    where
        E: Clone + Sync,
    {
        OutcomeAsync::new(move || {
            let settled = Outcome::Failure {
                error: error.clone(),
            };
            async move { settled }
        })
    }

    /// Starts the computation from scratch.
    pub fn run(&self) -> BoxFuture<'static, Outcome<A, E, B>> {
        (self.thunk)()
    }

    pub async fn is_success(&self) -> bool {
        self.run().await.is_success()
    }

    pub async fn is_failure(&self) -> bool {
        self.run().await.is_failure()
    }

    /// Runs once and dispatches on the variant.
    pub async fn match_with<T, S, F>(&self, on_success: S, on_failure: F) -> T
    where
        S: FnOnce(A, B) -> T,
        F: FnOnce(E) -> T,
    {
        self.run().await.match_with(on_success, on_failure)
    }

    pub fn chain<A2, F>(self, transform: F) -> OutcomeAsync<A2, E, B>
    where
        A2: Send + 'static,
        F: Fn(A, &B) -> A2 + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        OutcomeAsync::new(move || {
            let pending = self.run();
            let transform = Arc::clone(&transform);
            async move { pending.await.chain(|value, binds| transform(value, binds)) }
        })
    }

    pub fn chain_as<A2, B2, F, K>(self, transform: F, bind: K) -> OutcomeAsync<A2, E, B2>
    where
        A2: Send + 'static,
        B2: Send + 'static,
        F: Fn(A, &B) -> A2 + Send + Sync + 'static,
        K: Fn(B, &A2) -> B2 + Send + Sync + 'static,
    {
        let steps = Arc::new((transform, bind));
        OutcomeAsync::new(move || {
            let pending = self.run();
            let steps = Arc::clone(&steps);
            async move {
                let (transform, bind) = &*steps;
                pending.await.chain_as(transform, bind)
            }
        })
    }

    pub fn chain_r<A2, E2, F>(self, transform: F) -> OutcomeAsync<A2, E, B>
    where
        A2: Send + 'static,
        E2: Into<E>,
        F: Fn(A, &B) -> Outcome<A2, E2> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        OutcomeAsync::new(move || {
            let pending = self.run();
            let transform = Arc::clone(&transform);
            async move { pending.await.chain_r(&*transform) }
        })
    }

    pub fn chain_r_as<A2, E2, B2, F, K>(self, transform: F, bind: K) -> OutcomeAsync<A2, E, B2>
    where
        A2: Send + 'static,
        B2: Send + 'static,
        E2: Into<E>,
        F: Fn(A, &B) -> Outcome<A2, E2> + Send + Sync + 'static,
        K: Fn(B, &A2) -> B2 + Send + Sync + 'static,
    {
        let steps = Arc::new((transform, bind));
        OutcomeAsync::new(move || {
            let pending = self.run();
            let steps = Arc::clone(&steps);
            async move {
                let (transform, bind) = &*steps;
                pending.await.chain_r_as(transform, bind)
            }
        })
    }

    /// Chains an async step and flattens it into a single run.
    pub fn chain_ra<A2, E2, F>(self, transform: F) -> OutcomeAsync<A2, E, B>
    where
        A2: Send + 'static,
        E2: Into<E> + Send + 'static,
        F: Fn(A, &B) -> OutcomeAsync<A2, E2> + Send + Sync + 'static,
    {
        self.chain_ra_as(transform, |binds, _| binds)
    }

    pub fn chain_ra_as<A2, E2, B2, F, K>(self, transform: F, bind: K) -> OutcomeAsync<A2, E, B2>
    where
        A2: Send + 'static,
        E2: Into<E> + Send + 'static,
        B2: Send + 'static,
        F: Fn(A, &B) -> OutcomeAsync<A2, E2> + Send + Sync + 'static,
        K: Fn(B, &A2) -> B2 + Send + Sync + 'static,
    {
        let steps = Arc::new((transform, bind));
        OutcomeAsync::new(move || {
            let pending = self.run();
            let steps = Arc::clone(&steps);
            async move {
                let (transform, bind) = &*steps;
                match pending.await {
                    Outcome::Success { value, binds } => {
                        let step = transform(value, &binds).run();
                        match step.await {
                            Outcome::Success { value, .. } => {
                                let binds = bind(binds, &value);
                                Outcome::Success { value, binds }
                            }
                            Outcome::Failure { error } => Outcome::Failure {
                                error: error.into(),
                            },
                        }
                    }
                    Outcome::Failure { error } => Outcome::Failure { error },
                }
            }
        })
    }

    /// Chains a step returning a plain future; `Err` goes through `on_err`.
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
        let steps = Arc::new((transform, on_err, bind));
        OutcomeAsync::new(move || {
            let pending = self.run();
            let steps = Arc::clone(&steps);
            async move {
                let (transform, on_err, bind) = &*steps;
                match pending.await {
                    Outcome::Success { value, binds } => {
                        let step = transform(value, &binds);
                        match step.await {
                            Ok(value) => {
                                let binds = bind(binds, &value);
                                Outcome::Success { value, binds }
                            }
                            Err(caught) => Outcome::Failure {
                                error: on_err(caught),
                            },
                        }
                    }
                    Outcome::Failure { error } => Outcome::Failure { error },
                }
            }
        })
    }

    pub fn chain_error<E2, F>(self, transform: F) -> OutcomeAsync<A, E2, B>
    where
        E2: Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        OutcomeAsync::new(move || {
            let pending = self.run();
            let transform = Arc::clone(&transform);
            async move { pending.await.chain_error(&*transform) }
        })
    }

    pub fn chain_error_r<E2, F>(self, transform: F) -> OutcomeAsync<A, E2, B>
    where
        E2: Send + 'static,
        F: Fn(E) -> Outcome<A, E2, B> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        OutcomeAsync::new(move || {
            let pending = self.run();
            let transform = Arc::clone(&transform);
            async move { pending.await.chain_error_r(&*transform) }
        })
    }

    /// On failure, runs the recovery computation built from the error.
    pub fn chain_error_ra<E2, F>(self, transform: F) -> OutcomeAsync<A, E2, B>
    where
        E2: Send + 'static,
        F: Fn(E) -> OutcomeAsync<A, E2, B> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        OutcomeAsync::new(move || {
            let pending = self.run();
            let transform = Arc::clone(&transform);
            async move {
                match pending.await {
                    Outcome::Success { value, binds } => Outcome::Success { value, binds },
                    Outcome::Failure { error } => transform(error).run().await,
                }
            }
        })
    }

    pub fn fail_if<P>(self, predicate: P, error: E) -> Self
    where
        E: Clone + Sync,
        P: Fn(&A, &B) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        OutcomeAsync::new(move || {
            let pending = self.run();
            let predicate = Arc::clone(&predicate);
            let error = error.clone();
            async move { pending.await.fail_if(&*predicate, error) }
        })
    }
}

impl<A, B> OutcomeAsync<A, Infallible, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    pub fn lift_error<E>(self) -> OutcomeAsync<A, E, B>
    where
        E: Send + 'static,
    {
        self.chain_error(|never| match never {})
    }
}

impl<A, E, B> IntoFuture for OutcomeAsync<A, E, B>
where
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
{
    type Output = Outcome<A, E, B>;
    type IntoFuture = BoxFuture<'static, Outcome<A, E, B>>;

    fn into_future(self) -> Self::IntoFuture {
        self.run()
    }
}

/// Runs each operand only after the previous one settled. The first failure
/// stops the scan: later operands are never started.
pub fn combine_seq<T: AsyncTuple>(operands: T) -> OutcomeAsync<T::Values, T::Error> {
    operands.combine_seq()
}

/// Starts every operand at once and collects every error in argument order.
///
/// # Panics
///
/// Resumes the first operand panic, in argument order, once all operands
/// have settled.
pub fn combine_par<T: AsyncTuple>(operands: T) -> OutcomeAsync<T::Values, Vec<T::Error>> {
    operands.combine_par()
}

/// Starts every operand at once and hands back each operand's outcome.
pub fn combine_par_reify<T: ReifyTuple>(operands: T) -> OutcomeAsync<T::Settled, Infallible> {
    operands.combine_par_reify()
}

pub fn combine_array_seq<A, E, B, I>(operands: I) -> OutcomeAsync<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
    I: IntoIterator<Item = OutcomeAsync<A, E, B>>,
{
    let operands: Arc<[OutcomeAsync<A, E, B>]> = operands.into_iter().collect();
    OutcomeAsync::new(move || {
        let operands = Arc::clone(&operands);
        async move {
            let mut values = Vec::with_capacity(operands.len());
            for operand in operands.iter() {
                match operand.run().await {
                    Outcome::Success { value, .. } => values.push(value),
                    Outcome::Failure { error } => return Outcome::failure(error),
                }
            }
            Outcome::success(values)
        }
    })
}

/// # Panics
///
/// Resumes the first operand panic once all operands have settled.
pub fn combine_array_par<A, E, B, I>(operands: I) -> OutcomeAsync<Vec<A>, Vec<E>>
where
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
    I: IntoIterator<Item = OutcomeAsync<A, E, B>>,
{
    let operands: Arc<[OutcomeAsync<A, E, B>]> = operands.into_iter().collect();
    OutcomeAsync::new(move || {
        let pending = join_all(operands.iter().map(settle_run));
        async move { result::combine_array_par(pending.await.into_iter().map(resume)) }
    })
}

/// Parallel run that keeps the successes and logs the failures it drops.
pub fn combine_array_par_ignore_failures<A, E, B, I>(operands: I) -> OutcomeAsync<Vec<A>, Infallible>
where
    A: Send + 'static,
    E: Debug + Send + 'static,
    B: Send + 'static,
    I: IntoIterator<Item = OutcomeAsync<A, E, B>>,
{
    let operands: Arc<[OutcomeAsync<A, E, B>]> = operands.into_iter().collect();
    OutcomeAsync::new(move || {
        let pending = join_all(operands.iter().map(settle_run));
        async move {
            result::combine_array_par_ignore_failures(pending.await.into_iter().map(resume))
        }
    })
}

/// Builds exactly one of the two branches.
///
/// Both branches share the declared value, error and bindings types, so no
/// unification happens here; the function only keeps call sites flat.
pub fn if_then_else<A, E, B, T, F>(condition: bool, then: T, otherwise: F) -> OutcomeAsync<A, E, B>
where
    T: FnOnce() -> OutcomeAsync<A, E, B>,
    F: FnOnce() -> OutcomeAsync<A, E, B>,
{
    if condition {
        then()
    } else {
        otherwise()
    }
}
