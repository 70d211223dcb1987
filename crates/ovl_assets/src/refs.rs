//! Reference-counted lifetime of the native resource set.
//!
//! A manager holds one counter covering itself and every outstanding open
//! handle (asset streams, compiled-XML blocks, theme handles). Each open
//! acquires a disambiguating id; each close releases it exactly once — the
//! handle types guard double-close with a nulled slot, so a second close
//! never double-decrements. When the counter reaches zero the caller must
//! tear down the engine; teardown is irreversible.

/// What the caller must do after a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub(crate) enum RefAction {
    /// Other holders remain; nothing to do.
    Keep,
    /// The last reference is gone: tear down the native resource set now.
    Teardown,
}

/// Id reserved for the reference the manager itself holds from construction.
pub(crate) const MANAGER_REF: u64 = 0;

#[derive(Debug)]
pub(crate) struct RefTable {
    count: u32,
    next_id: u64,
}

impl RefTable {
    /// Starts at one: the manager's own reference ([`MANAGER_REF`]).
    pub fn new() -> Self {
        Self { count: 1, next_id: 1 }
    }

    /// Register a new holder and return its id.
    pub fn acquire(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.count += 1;
        tracing::trace!("ref {} acquired (count={})", id, self.count);
        id
    }

    /// Release a holder. Returns [`RefAction::Teardown`] exactly once, on
    /// the release that drives the count to zero.
    pub fn release(&mut self, id: u64) -> RefAction {
        debug_assert!(self.count > 0, "release of ref {id} after teardown");
        self.count -= 1;
        tracing::trace!("ref {} released (count={})", id, self.count);
        if self.count == 0 {
            RefAction::Teardown
        } else {
            RefAction::Keep
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
