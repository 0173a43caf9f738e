//! Unbounded async loops driven by [`OutcomeAsync`] steps.
//!
//! There is no iteration cap; the step functions decide when to stop. Each
//! loop is a plain `loop` inside one future, so the stack stays flat no
//! matter how many iterations run.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::result::Outcome;
use crate::result_async::OutcomeAsync;

/// Feeds each `Continue(state)` back into `step` until it yields
/// `Break(done)`; a failed step ends the loop with its error.
pub fn iterate_until<S, T, E, B, F>(initial: S, step: F) -> OutcomeAsync<T, E>
where
    S: Clone + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
    F: Fn(S) -> OutcomeAsync<ControlFlow<T, S>, E, B> + Send + Sync + 'static,
{
    let step = Arc::new(step);
    OutcomeAsync::new(move || {
        let state = initial.clone();
        let step = Arc::clone(&step);
        async move {
            let mut state = state;
            let mut iteration = 0usize;
            loop {
                iteration += 1;
                log::trace!("iterate_until: iteration {iteration}");
                match step(state).run().await {
                    Outcome::Success {
                        value: ControlFlow::Continue(next),
                        ..
                    } => state = next,
                    Outcome::Success {
                        value: ControlFlow::Break(done),
                        ..
                    } => {
                        log::debug!("iterate_until: finished after {iteration} iterations");
                        return Outcome::success(done);
                    }
                    Outcome::Failure { error } => {
                        log::debug!("iterate_until: step {iteration} failed");
                        return Outcome::failure(error);
                    }
                }
            }
        }
    })
}

/// Runs `body` on the current state and collects one value per iteration.
///
/// After each success `next` sees the state and the fresh value and either
/// continues with a new state or stops. The first failure aborts the loop.
pub fn loop_until_simpler<S, A, E, B, F, N>(
    initial: S,
    body: F,
    next: N,
) -> OutcomeAsync<Vec<A>, E>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
    F: Fn(&S) -> OutcomeAsync<A, E, B> + Send + Sync + 'static,
    N: Fn(S, &A) -> ControlFlow<(), S> + Send + Sync + 'static,
{
    loop_until(initial, body, next, |_, error| ControlFlow::Break(error))
}

/// Like [`loop_until_simpler`], with a separate continuation for failed
/// iterations.
///
/// `on_failure` gets the state and the error. `Continue(state)` retries with
/// that state and records nothing for the failed iteration; `Break(error)`
/// ends the whole loop with `error`.
///
/// A `Break(error)` discards every value collected by earlier successful
/// iterations. Callers that need partial progress should carry it in the
/// state or in the error.
pub fn loop_until<S, A, E, B, F, N, R>(
    initial: S,
    body: F,
    on_success: N,
    on_failure: R,
) -> OutcomeAsync<Vec<A>, E>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
    F: Fn(&S) -> OutcomeAsync<A, E, B> + Send + Sync + 'static,
    N: Fn(S, &A) -> ControlFlow<(), S> + Send + Sync + 'static,
    R: Fn(S, E) -> ControlFlow<E, S> + Send + Sync + 'static,
{
    let steps = Arc::new((body, on_success, on_failure));
    OutcomeAsync::new(move || {
        let state = initial.clone();
        let steps = Arc::clone(&steps);
        async move {
            let (body, on_success, on_failure) = &*steps;
            let mut state = state;
            let mut collected = Vec::new();
            loop {
                log::trace!("loop_until: iteration {}", collected.len() + 1);
                let settled = body(&state).run().await;
                let flow = match settled {
                    Outcome::Success { value, .. } => {
                        let flow = on_success(state, &value);
                        collected.push(value);
                        match flow {
                            ControlFlow::Continue(next) => ControlFlow::Continue(next),
                            ControlFlow::Break(()) => {
                                log::debug!("loop_until: done with {} values", collected.len());
                                return Outcome::success(collected);
                            }
                        }
                    }
                    Outcome::Failure { error } => on_failure(state, error),
                };
                match flow {
                    ControlFlow::Continue(next) => state = next,
                    ControlFlow::Break(error) => {
                        log::debug!("loop_until: aborted after {} values", collected.len());
                        return Outcome::failure(error);
                    }
                }
            }
        }
    })
}
