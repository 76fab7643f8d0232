//! ioqueue: blocking I/O byte queues for small real-time kernels
//!
//! Serial-style device drivers have a lower side (usually an interrupt
//! service routine) and an upper side (application threads). This crate is
//! the queue layer between them:
//! - [`InputQueue`]: the lower side writes, the upper side blocks to read
//! - [`OutputQueue`]: the upper side blocks to write, the lower side reads
//! - Bounded, owned ring storage; no heap for the data path
//! - Per-byte blocking with immediate/bounded/infinite [`Timeout`]
//! - [`reset`](input::InputGuard::reset) discards data and aborts every
//!   blocked waiter deterministically
//!
//! Every operation exists in one of two tiers. The locked-context tier is
//! a guard type ([`input::InputGuard`] / [`output::OutputGuard`]): the lock
//! is held, nothing can suspend, safe for interrupt-class code. The
//! thread-context tier ([`InputQueue::get`]/[`read`](InputQueue::read),
//! [`OutputQueue::put`]/[`write`](OutputQueue::write)) takes the lock
//! itself and parks the caller on the queue's wait list when the transfer
//! cannot proceed.
//!
//! Without the default `std` feature only the unsynchronized ring cores
//! and [`Timeout`] are built, for reuse under a different suspension
//! substrate.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod ring;
pub mod time;

#[cfg(feature = "std")]
pub mod input;
#[cfg(feature = "std")]
pub mod output;
#[cfg(feature = "std")]
pub mod wait;

pub use ring::{InputCore, OutputCore, Ring};
pub use time::Timeout;

#[cfg(feature = "std")]
pub use input::{InputGuard, InputNotify, InputQueue};
#[cfg(feature = "std")]
pub use output::{OutputGuard, OutputNotify, OutputQueue};
#[cfg(feature = "std")]
pub use wait::{WaitError, WaitList, WaitQueue, WakeReason};
