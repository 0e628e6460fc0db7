//! Private instance state behind an opaque handle
//!
//! An instance handle owns its state directly: the owning type, the data
//! snapshot and the frozen flag live in one `Arc` allocation that is freed
//! when the last handle is dropped. Nothing outside this crate can reach the
//! state except through the family APIs.
//!
//! ## Cycles
//!
//! Nested instances are held by strong handles, so an instance that reaches
//! itself through its own data (a sequence holding a sequence that holds the
//! first) is never freed: the handles in the ring keep each other alive after
//! every outside handle is dropped. Traversal terminates on such graphs, but
//! the memory stays allocated for the life of the process. Build acyclic
//! graphs where that matters.
//!
//! ## Mutation protocol
//!
//! User validators may read other instances, including (through nested
//! values) this one, so they never run under this handle's lock:
//!
//! 1. Under the write lock: refuse if frozen, apply the change, take a snapshot.
//! 2. Without the lock: run the owner's cross-field check on the snapshot.
//! 3. On rejection, re-take the write lock and undo the single change.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_core::{StrataError, StrataResult};
use tracing::{debug, trace};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Something that owns instances and can name itself in messages
pub(crate) trait Owner {
    fn display_name(&self) -> &str;
}

struct State<D> {
    data: D,
    frozen: bool,
}

struct Cell<T, D> {
    id: u64,
    owner: T,
    state: RwLock<State<D>>,
}

/// Shared handle to one instance's private state
pub(crate) struct Handle<T, D> {
    cell: Arc<Cell<T, D>>,
}

impl<T, D> Clone for Handle<T, D> {
    fn clone(&self) -> Self {
        Handle {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Owner, D: Clone> Handle<T, D> {
    pub(crate) fn new(owner: T, data: D, frozen: bool) -> Self {
        Handle {
            cell: Arc::new(Cell {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                owner,
                state: RwLock::new(State { data, frozen }),
            }),
        }
    }

    /// Process-unique id of this instance
    pub(crate) fn id(&self) -> u64 {
        self.cell.id
    }

    pub(crate) fn owner(&self) -> &T {
        &self.cell.owner
    }

    /// Handle identity
    pub(crate) fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.cell.state.read().frozen
    }

    /// Irreversibly mark frozen. Returns false if it already was.
    pub(crate) fn mark_frozen(&self) -> bool {
        let mut state = self.cell.state.write();
        let changed = !state.frozen;
        state.frozen = true;
        changed
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.cell.state.read().data)
    }

    pub(crate) fn snapshot(&self) -> D {
        self.read(D::clone)
    }

    pub(crate) fn frozen_error(&self) -> StrataError {
        StrataError::frozen(format!(
            "{} instance #{} is frozen",
            self.cell.owner.display_name(),
            self.cell.id
        ))
    }

    /// Refuse early when frozen, before any validation work.
    pub(crate) fn ensure_mutable(&self) -> StrataResult<()> {
        if self.is_frozen() {
            return Err(self.frozen_error());
        }
        Ok(())
    }

    /// Apply one change, cross-check it, and undo it on rejection.
    ///
    /// `apply` returns the undo token handed to `rollback` on rejection and
    /// returned to the caller on success. A cross-check rejection becomes a
    /// validation error prefixed with `context`.
    pub(crate) fn mutate<U>(
        &self,
        context: &str,
        apply: impl FnOnce(&mut D) -> StrataResult<U>,
        check: impl FnOnce(&D) -> Option<String>,
        rollback: impl FnOnce(&mut D, U),
    ) -> StrataResult<U> {
        let (undo, staged) = {
            let mut state = self.cell.state.write();
            if state.frozen {
                drop(state);
                return Err(self.frozen_error());
            }
            let undo = apply(&mut state.data)?;
            (undo, state.data.clone())
        };

        match check(&staged) {
            None => {
                trace!(target: "strata::schema", handle = self.cell.id, context, "mutation accepted");
                Ok(undo)
            }
            Some(reason) => {
                rollback(&mut self.cell.state.write().data, undo);
                debug!(
                    target: "strata::schema",
                    handle = self.cell.id,
                    context,
                    reason = %reason,
                    "mutation rolled back"
                );
                Err(StrataError::validation_at(context, reason))
            }
        }
    }
}
