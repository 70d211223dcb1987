//! Per-cookie string block cache.
//!
//! Each attached package owns an interned string pool; the manager caches one
//! immutable [`StringBlock`] per cookie (block index = cookie − 1). The cache
//! is rebuilt from scratch whenever the package stack changes — stale indices
//! from a prior layout must never be served, so the whole table is discarded
//! and lazily rebuilt on the next access rather than patched in place.
//!
//! Blocks may be seeded from the process-wide system manager's cache to avoid
//! loading the default packages' pools twice. Seeding is by slot index, not
//! by cookie, since the seed and live stacks can differ in length; seeded
//! blocks are shared (`Arc`), never mutated.

use crate::error::{Error, Result};
use crate::registry::{Cookie, CookieRegistry};
use crate::table::ResourceTable;
use std::sync::Arc;

/// Immutable interned-string table for one package's resource table.
#[derive(Debug)]
pub struct StringBlock {
    strings: Vec<String>,
}

impl StringBlock {
    pub fn new(strings: Vec<String>) -> Self {
        Self { strings }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// One cached block per registry slot; `None` marks a cleared slot.
pub(crate) type BlockTable = Vec<Option<Arc<StringBlock>>>;

/// Build the block table for the current package stack.
///
/// Slot `i` serves cookie `i + 1`. Live slots covered by the seed reuse the
/// seed's block; the remainder are loaded fresh from the engine.
pub(crate) fn make_blocks(
    table: &dyn ResourceTable,
    registry: &CookieRegistry,
    seed: Option<&BlockTable>,
) -> Result<BlockTable> {
    let slot_count = registry.slot_count();
    let seed_len = seed.map_or(0, |s| s.len());
    tracing::debug!("Building {slot_count} string blocks (seeded: {seed_len})");

    let mut blocks = Vec::with_capacity(slot_count);
    for slot in 0..slot_count {
        let cookie = slot as Cookie + 1;
        if !registry.is_live(cookie) {
            blocks.push(None);
            continue;
        }
        if let Some(seeded) = seed.and_then(|s| s.get(slot)).and_then(Option::as_ref) {
            blocks.push(Some(Arc::clone(seeded)));
            continue;
        }
        let pool = table.string_pool(cookie)?;
        blocks.push(Some(Arc::new(StringBlock::new(pool))));
    }
    Ok(blocks)
}

/// Look up one pooled string. Cookies map to blocks starting at 1.
pub(crate) fn pooled_string(blocks: &BlockTable, cookie: Cookie, index: usize) -> Result<String> {
    let block = cookie
        .checked_sub(1)
        .and_then(|slot| blocks.get(slot as usize))
        .and_then(Option::as_ref)
        .ok_or(Error::InvalidCookie(cookie))?;
    block
        .get(index)
        .map(str::to_string)
        .ok_or(Error::StringIndex {
            cookie,
            index,
        })
}
