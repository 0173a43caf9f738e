//! Tuple plumbing behind the heterogeneous `combine_*` functions.
//!
//! Each operand of a tuple may carry its own value and bindings type. The
//! sequential and parallel combinators share one error type `E`; the
//! reifying combinator lets every operand keep its own.
//!
//! Implemented for tuples of one to eight operands.

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;

use crate::result::Outcome;
use crate::result_async::OutcomeAsync;

/// Tuple of synchronous outcomes sharing one error type.
pub trait OutcomeTuple {
    type Values;
    type Error;

    /// First failure in argument order, or every value.
    fn combine_seq(self) -> Outcome<Self::Values, Self::Error>;

    /// Every value, or every error in argument order.
    fn combine_par(self) -> Outcome<Self::Values, Vec<Self::Error>>;
}

/// Tuple of async outcomes sharing one error type.
pub trait AsyncTuple {
    type Values;
    type Error;

    fn combine_seq(self) -> OutcomeAsync<Self::Values, Self::Error>;

    fn combine_par(self) -> OutcomeAsync<Self::Values, Vec<Self::Error>>;
}

/// Tuple of async outcomes settled side by side into plain outcomes.
pub trait ReifyTuple {
    type Settled;

    fn combine_par_reify(self) -> OutcomeAsync<Self::Settled, Infallible>;
}

/// Wraps an operand so a panic is captured instead of tearing down the join.
pub(crate) fn settle<F>(pending: F) -> impl Future<Output = Result<F::Output, Box<dyn Any + Send>>>
where
    F: Future,
{
    AssertUnwindSafe(pending).catch_unwind()
}

/// Settles one run of `operand`, including the synchronous work its factory
/// does before the first poll.
pub(crate) fn settle_run<A, E, B>(
    operand: &OutcomeAsync<A, E, B>,
) -> impl Future<Output = Result<Outcome<A, E, B>, Box<dyn Any + Send>>> + Send
where
    A: Send + 'static,
    E: Send + 'static,
    B: Send + 'static,
{
    let operand = operand.clone();
    settle(async move { operand.run().await })
}

/// Unwraps a settled operand, resuming its panic.
///
/// A panicking operand is a bug: legitimate failures are `Failure` values.
pub(crate) fn resume<T>(settled: Result<T, Box<dyn Any + Send>>) -> T {
    match settled {
        Ok(outcome) => outcome,
        Err(payload) => {
            log::error!("operand panicked while running in parallel; resuming the panic");
            panic::resume_unwind(payload)
        }
    }
}

macro_rules! outcome_tuple {
    ($($A:ident $B:ident $r:ident),+) => {
        impl<E, $($A, $B),+> OutcomeTuple for ($(Outcome<$A, E, $B>,)+) {
            type Values = ($($A,)+);
            type Error = E;

            fn combine_seq(self) -> Outcome<Self::Values, E> {
                let ($($r,)+) = self;
                Outcome::success(($(
                    match $r {
                        Outcome::Success { value, .. } => value,
                        Outcome::Failure { error } => return Outcome::failure(error),
                    },
                )+))
            }

            fn combine_par(self) -> Outcome<Self::Values, Vec<E>> {
                let ($($r,)+) = self;
                let mut errors = Vec::new();
                $(
                    let $r = match $r {
                        Outcome::Success { value, .. } => Some(value),
                        Outcome::Failure { error } => {
                            errors.push(error);
                            None
                        }
                    };
                )+
                match ($($r,)+) {
                    ($(Some($r),)+) => Outcome::success(($($r,)+)),
                    _ => Outcome::failure(errors),
                }
            }
        }
    };
}

macro_rules! async_tuple {
    ($($A:ident $B:ident $r:ident),+) => {
        impl<E, $($A, $B),+> AsyncTuple for ($(OutcomeAsync<$A, E, $B>,)+)
        where
            E: Send + 'static,
            $($A: Send + 'static, $B: Send + 'static,)+
        {
            type Values = ($($A,)+);
            type Error = E;

            fn combine_seq(self) -> OutcomeAsync<Self::Values, E> {
                let ($($r,)+) = self;
                OutcomeAsync::new(move || {
                    $(let $r = $r.clone();)+
                    async move {
                        Outcome::success(($(
                            match $r.run().await {
                                Outcome::Success { value, .. } => value,
                                Outcome::Failure { error } => return Outcome::failure(error),
                            },
                        )+))
                    }
                })
            }

            fn combine_par(self) -> OutcomeAsync<Self::Values, Vec<E>> {
                let ($($r,)+) = self;
                OutcomeAsync::new(move || {
                    $(let $r = settle_run(&$r);)+
                    async move {
                        let ($($r,)+) = futures::join!($($r),+);
                        OutcomeTuple::combine_par(($(resume($r),)+))
                    }
                })
            }
        }
    };
}

macro_rules! reify_tuple {
    ($($A:ident $E:ident $B:ident $r:ident),+) => {
        impl<$($A, $E, $B),+> ReifyTuple for ($(OutcomeAsync<$A, $E, $B>,)+)
        where
            $($A: Send + 'static, $E: Send + 'static, $B: Send + 'static,)+
        {
            type Settled = ($(Outcome<$A, $E, $B>,)+);

            fn combine_par_reify(self) -> OutcomeAsync<Self::Settled, Infallible> {
                let ($($r,)+) = self;
                OutcomeAsync::new(move || {
                    $(let $r = settle_run(&$r);)+
                    async move {
                        let ($($r,)+) = futures::join!($($r),+);
                        Outcome::success(($(resume($r),)+))
                    }
                })
            }
        }
    };
}

outcome_tuple!(A1 B1 r1);
outcome_tuple!(A1 B1 r1, A2 B2 r2);
outcome_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3);
outcome_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4);
outcome_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5);
outcome_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5, A6 B6 r6);
outcome_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5, A6 B6 r6, A7 B7 r7);
outcome_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5, A6 B6 r6, A7 B7 r7, A8 B8 r8);

async_tuple!(A1 B1 r1);
async_tuple!(A1 B1 r1, A2 B2 r2);
async_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3);
async_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4);
async_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5);
async_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5, A6 B6 r6);
async_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5, A6 B6 r6, A7 B7 r7);
async_tuple!(A1 B1 r1, A2 B2 r2, A3 B3 r3, A4 B4 r4, A5 B5 r5, A6 B6 r6, A7 B7 r7, A8 B8 r8);

reify_tuple!(A1 E1 B1 r1);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2, A3 E3 B3 r3);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2, A3 E3 B3 r3, A4 E4 B4 r4);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2, A3 E3 B3 r3, A4 E4 B4 r4, A5 E5 B5 r5);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2, A3 E3 B3 r3, A4 E4 B4 r4, A5 E5 B5 r5, A6 E6 B6 r6);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2, A3 E3 B3 r3, A4 E4 B4 r4, A5 E5 B5 r5, A6 E6 B6 r6, A7 E7 B7 r7);
reify_tuple!(A1 E1 B1 r1, A2 E2 B2 r2, A3 E3 B3 r3, A4 E4 B4 r4, A5 E5 B5 r5, A6 E6 B6 r6, A7 E7 B7 r7, A8 E8 B8 r8);
