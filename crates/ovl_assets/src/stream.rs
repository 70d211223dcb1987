//! Handles a manager gives out: asset streams, compiled-XML blocks and theme
//! handles.
//!
//! Each handle holds one reference in the owning manager's handle table; the
//! engine stays alive until the manager *and* every outstanding handle have
//! closed. Close is idempotent, and dropping a handle closes it.

use crate::manager::Shared;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

struct StreamState {
    ref_id: u64,
    data: Vec<u8>,
    pos: u64,
}

/// A readable, seekable view of one raw asset entry.
pub struct AssetStream {
    shared: Arc<Shared>,
    state: Option<StreamState>,
}

impl AssetStream {
    pub(crate) fn new(shared: Arc<Shared>, ref_id: u64, data: Vec<u8>) -> Self {
        Self {
            shared,
            state: Some(StreamState {
                ref_id,
                data,
                pos: 0,
            }),
        }
    }

    /// Total length of the entry in bytes.
    pub fn len(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.data.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left between the cursor and the end of the entry.
    pub fn remaining(&self) -> u64 {
        self.state
            .as_ref()
            .map_or(0, |s| (s.data.len() as u64).saturating_sub(s.pos))
    }

    /// Release this stream's reference. Further reads fail; calling close
    /// again does nothing.
    pub fn close(&mut self) {
        if let Some(state) = self.state.take() {
            self.shared.release_handle(state.ref_id);
        }
    }

    fn state_mut(&mut self) -> io::Result<&mut StreamState> {
        self.state
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "asset stream is closed"))
    }
}

impl Read for AssetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.state_mut()?;
        let pos = state.pos.min(state.data.len() as u64) as usize;
        let n = (&state.data[pos..]).read(buf)?;
        state.pos += n as u64;
        Ok(n)
    }
}

impl Seek for AssetStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let state = self.state_mut()?;
        let len = state.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => state.pos as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of asset",
            ));
        }
        state.pos = target as u64;
        Ok(state.pos)
    }
}

impl Drop for AssetStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// A compiled-XML entry held as an opaque block.
pub struct XmlBlock {
    shared: Arc<Shared>,
    ref_id: Option<u64>,
    data: Vec<u8>,
}

impl XmlBlock {
    pub(crate) fn new(shared: Arc<Shared>, ref_id: u64, data: Vec<u8>) -> Self {
        Self {
            shared,
            ref_id: Some(ref_id),
            data,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn close(&mut self) {
        if let Some(ref_id) = self.ref_id.take() {
            self.shared.release_handle(ref_id);
        }
    }
}

impl Drop for XmlBlock {
    fn drop(&mut self) {
        self.close();
    }
}

/// A theme created by a manager, against which styles are applied and
/// attributes resolved.
pub struct ThemeHandle {
    shared: Arc<Shared>,
    raw: u64,
    ref_id: Option<u64>,
}

impl ThemeHandle {
    pub(crate) fn new(shared: Arc<Shared>, raw: u64, ref_id: u64) -> Self {
        Self {
            shared,
            raw,
            ref_id: Some(ref_id),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn raw(&self) -> u64 {
        self.raw
    }
}

impl Drop for ThemeHandle {
    fn drop(&mut self) {
        if let Some(ref_id) = self.ref_id.take() {
            self.shared.destroy_theme(self.raw, ref_id);
        }
    }
}
