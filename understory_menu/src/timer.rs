// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-driven timers and frame callbacks.
//!
//! ## Overview
//!
//! Menus and triggers never sleep or spawn. Everything that waits (the
//! long-press hold, submenu hover intent, and the "next paint" deferral used
//! before placing a menu) goes through a [`Timers`] queue that the host
//! advances from its own event loop.
//!
//! - [`Timers::schedule`] runs a task once `delay` time units have passed.
//! - [`Timers::request_frame`] runs a task on the next [`Timers::run_frame`].
//!   A queue built with [`Timers::without_frames`] turns frame requests into
//!   zero-delay timers.
//! - [`Timers::cancel`] drops a pending task.
//!
//! Time is an abstract `u64` counter; hosts typically feed milliseconds.
//!
//! Tasks run with no internal borrow held, so they may schedule or cancel.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_menu::timer::Timers;
//!
//! let timers = Timers::new();
//! let fired = Rc::new(Cell::new(false));
//! let flag = fired.clone();
//! timers.schedule(100, move || flag.set(true));
//! timers.advance(99);
//! assert!(!fired.get());
//! timers.advance(1);
//! assert!(fired.get());
//! ```

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

/// Handle to a scheduled task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

type Task = Box<dyn FnOnce()>;

struct Pending {
    id: TimerId,
    deadline: u64,
    task: Task,
}

struct Queue {
    now: u64,
    next_id: u64,
    frames_supported: bool,
    timers: Vec<Pending>,
    frames: Vec<(TimerId, Task)>,
}

impl Queue {
    fn alloc_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    // Earliest deadline first; ids are monotonic so ties keep scheduling order.
    fn pop_due(&mut self, until: u64) -> Option<Pending> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.deadline <= until)
            .min_by_key(|(_, p)| (p.deadline, p.id))
            .map(|(i, _)| i)?;
        Some(self.timers.swap_remove(idx))
    }
}

/// Cloneable handle to a shared timer queue.
#[derive(Clone)]
pub struct Timers {
    inner: Rc<RefCell<Queue>>,
}

impl core::fmt::Debug for Timers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.inner.try_borrow() {
            Ok(q) => f
                .debug_struct("Timers")
                .field("now", &q.now)
                .field("timers", &q.timers.len())
                .field("frames", &q.frames.len())
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("Timers").finish_non_exhaustive(),
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    /// Create a queue whose host delivers frame callbacks via [`Timers::run_frame`].
    pub fn new() -> Self {
        Self::with_frames(true)
    }

    /// Create a queue for hosts without frame scheduling.
    ///
    /// Frame requests fall back to zero-delay timers.
    pub fn without_frames() -> Self {
        Self::with_frames(false)
    }

    fn with_frames(frames_supported: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Queue {
                now: 0,
                next_id: 1,
                frames_supported,
                timers: Vec::new(),
                frames: Vec::new(),
            })),
        }
    }

    /// Current time.
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Run `task` once `delay` time units have elapsed.
    pub fn schedule(&self, delay: u64, task: impl FnOnce() + 'static) -> TimerId {
        let mut q = self.inner.borrow_mut();
        let id = q.alloc_id();
        let deadline = q.now.saturating_add(delay);
        q.timers.push(Pending {
            id,
            deadline,
            task: Box::new(task),
        });
        id
    }

    /// Run `task` before the next paint.
    pub fn request_frame(&self, task: impl FnOnce() + 'static) -> TimerId {
        if !self.inner.borrow().frames_supported {
            return self.schedule(0, task);
        }
        let mut q = self.inner.borrow_mut();
        let id = q.alloc_id();
        q.frames.push((id, Box::new(task)));
        id
    }

    /// Drop a pending task. Returns false if it already ran or was cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut q = self.inner.borrow_mut();
        if let Some(idx) = q.timers.iter().position(|p| p.id == id) {
            drop(q.timers.swap_remove(idx));
            return true;
        }
        if let Some(idx) = q.frames.iter().position(|(fid, _)| *fid == id) {
            drop(q.frames.remove(idx));
            return true;
        }
        false
    }

    /// Returns true if `id` has neither run nor been cancelled.
    pub fn is_pending(&self, id: TimerId) -> bool {
        let q = self.inner.borrow();
        q.timers.iter().any(|p| p.id == id) || q.frames.iter().any(|(fid, _)| *fid == id)
    }

    /// Number of pending timers and frame callbacks.
    pub fn pending(&self) -> usize {
        let q = self.inner.borrow();
        q.timers.len() + q.frames.len()
    }

    /// Move time forward by `by` units, running every task that becomes due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: u64) -> usize {
        let target = self.now().saturating_add(by);
        self.advance_to(target)
    }

    /// Move time forward to `target`, running every task due at or before it.
    ///
    /// Tasks scheduled by running tasks also run if they fall due in time.
    /// Time never moves backwards.
    pub fn advance_to(&self, target: u64) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut q = self.inner.borrow_mut();
                let due = q.pop_due(target);
                if let Some(p) = &due {
                    q.now = q.now.max(p.deadline);
                }
                due
            };
            let Some(pending) = next else { break };
            (pending.task)();
            ran += 1;
        }
        let mut q = self.inner.borrow_mut();
        q.now = q.now.max(target);
        ran
    }

    /// Run the frame callbacks requested before this call.
    ///
    /// Callbacks requested while the frame runs wait for the next frame.
    /// Returns the number of callbacks run.
    pub fn run_frame(&self) -> usize {
        let batch: Vec<TimerId> = self.inner.borrow().frames.iter().map(|(id, _)| *id).collect();
        let mut ran = 0;
        for id in batch {
            let task = {
                let mut q = self.inner.borrow_mut();
                match q.frames.iter().position(|(fid, _)| *fid == id) {
                    Some(idx) => q.frames.remove(idx).1,
                    // Cancelled by an earlier callback in this frame.
                    None => continue,
                }
            };
            task();
            ran += 1;
        }
        ran
    }
}
