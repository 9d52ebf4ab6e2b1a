//! Guest linear-memory access and allocation.
//!
//! All reads and writes into the guest's memory go through [`MemoryManager`]:
//! - bounds-checked copy-in/copy-out for every pointer the guest hands us
//! - guest-side allocation, preferring the module's own exported allocator
//!   (`proxy_on_memory_allocate` or `malloc`) and falling back to a host-managed
//!   arena that grows the guest memory in whole 64 KiB pages
//! - the ptr/len out-parameter pattern used by nearly every ABI accessor
//! - capture of POSIX-style vectored writes (the guest runtime's stdout path)

use std::ops::Range;

use thiserror::Error;
use tracing::{debug, warn};
use wasmtime::{AsContext, AsContextMut, Func, Memory};

/// WebAssembly page size; the arena grows guest memory in these units.
pub const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Custom error type for guest memory operations
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("guest memory access out of bounds: ptr={ptr}, len={len}, memory size={size}")]
    OutOfBounds { ptr: u32, len: u32, size: usize },

    #[error("failed to allocate {0} bytes in guest memory: memory cannot grow")]
    AllocationFailed(usize),
}

fn checked_range(ptr: u32, len: u32, size: usize) -> Result<Range<usize>, MemoryError> {
    let start = ptr as u64;
    let end = start + len as u64;
    if end > size as u64 {
        return Err(MemoryError::OutOfBounds { ptr, len, size });
    }
    Ok(start as usize..end as usize)
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Owns all traffic into one guest instance's linear memory.
///
/// Cheap to copy: the wasmtime handles are indices into the store, and the only
/// mutable state is the arena cursor. Host functions copy the manager out of the
/// store data, use it, and write it back so arena allocations persist.
#[derive(Clone, Copy)]
pub struct MemoryManager {
    memory: Memory,
    guest_alloc: Option<Func>,
    /// Next free byte for host-side allocations; 0 until the first fallback
    /// allocation pins it to the then-current end of memory. Never rewinds.
    arena_next: usize,
}

impl MemoryManager {
    /// Bind to a guest's exported memory and optional exported allocator.
    pub fn bind(memory: Memory, guest_alloc: Option<Func>) -> Self {
        Self {
            memory,
            guest_alloc,
            arena_next: 0,
        }
    }

    /// Bounds-checked copy-out of `len` bytes starting at `ptr`.
    pub fn read_bytes(
        &self,
        store: impl AsContext,
        ptr: u32,
        len: u32,
    ) -> Result<Vec<u8>, MemoryError> {
        let data = self.memory.data(store.as_context());
        let range = checked_range(ptr, len, data.len())?;
        Ok(data[range].to_vec())
    }

    /// Bounds-checked copy-out decoded as UTF-8 text (invalid sequences replaced).
    pub fn read_string(
        &self,
        store: impl AsContext,
        ptr: u32,
        len: u32,
    ) -> Result<String, MemoryError> {
        Ok(String::from_utf8_lossy(&self.read_bytes(store, ptr, len)?).into_owned())
    }

    /// Scan a NUL-terminated guest string starting at `ptr`.
    ///
    /// Returns `None` for a NULL pointer (the guest opted out) or a pointer past
    /// the end of memory. An unterminated string runs to the end of memory.
    pub fn read_optional_string(&self, store: impl AsContext, ptr: u32) -> Option<String> {
        if ptr == 0 {
            return None;
        }
        let data = self.memory.data(store.as_context());
        let start = ptr as usize;
        if start >= data.len() {
            return None;
        }
        let end = data[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| start + i)
            .unwrap_or(data.len());
        Some(String::from_utf8_lossy(&data[start..end]).into_owned())
    }

    /// Little-endian 4-byte write at `ptr`; no-op if `ptr` is zero (the guest
    /// opted out of the out-parameter).
    pub fn write_u32(
        &self,
        mut store: impl AsContextMut,
        ptr: u32,
        value: u32,
    ) -> Result<(), MemoryError> {
        if ptr == 0 {
            return Ok(());
        }
        let data = self.memory.data_mut(store.as_context_mut());
        let range = checked_range(ptr, 4, data.len())?;
        data[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Allocate room for `bytes` inside the guest and copy them in, returning
    /// the guest pointer.
    ///
    /// The guest's own allocator gets first refusal; if it is absent, refuses
    /// (returns 0), traps, or has an unexpected signature, the host arena takes
    /// over and grows the guest memory as needed.
    pub fn write_to_wasm(
        &mut self,
        mut store: impl AsContextMut,
        bytes: &[u8],
    ) -> Result<u32, MemoryError> {
        if let Some(alloc) = self.guest_alloc {
            match alloc.typed::<i32, i32>(store.as_context()) {
                Ok(typed) => match typed.call(store.as_context_mut(), bytes.len() as i32) {
                    Ok(ptr) if ptr != 0 => {
                        let ptr = ptr as u32;
                        let data = self.memory.data_mut(store.as_context_mut());
                        let range = checked_range(ptr, bytes.len() as u32, data.len())?;
                        data[range].copy_from_slice(bytes);
                        return Ok(ptr);
                    }
                    Ok(_) => {
                        debug!(
                            "guest allocator refused {} bytes, using host arena",
                            bytes.len()
                        );
                    }
                    Err(e) => {
                        warn!("guest allocator trapped, using host arena: {e}");
                    }
                },
                Err(_) => {
                    warn!("guest allocator has an unexpected signature, using host arena");
                }
            }
        }
        self.arena_write(store, bytes)
    }

    /// Write `bytes` into freshly allocated guest memory and populate the
    /// guest's ptr/len out-parameters. An empty payload writes a NULL pointer
    /// and zero length without allocating.
    pub fn write_bytes_result(
        &mut self,
        mut store: impl AsContextMut,
        bytes: &[u8],
        out_ptr_ptr: u32,
        out_len_ptr: u32,
    ) -> Result<(), MemoryError> {
        let ptr = if bytes.is_empty() {
            0
        } else {
            self.write_to_wasm(store.as_context_mut(), bytes)?
        };
        self.write_u32(store.as_context_mut(), out_ptr_ptr, ptr)?;
        self.write_u32(store, out_len_ptr, bytes.len() as u32)
    }

    pub fn write_string_result(
        &mut self,
        store: impl AsContextMut,
        value: &str,
        out_ptr_ptr: u32,
        out_len_ptr: u32,
    ) -> Result<(), MemoryError> {
        self.write_bytes_result(store, value.as_bytes(), out_ptr_ptr, out_len_ptr)
    }

    /// Intercept a POSIX-style vectored write: sum the iovec lengths, decode the
    /// concatenated bytes as text, and report the total back through `nwritten`.
    /// The caller turns the text into a debug-level log entry.
    pub fn capture_fd_write(
        &self,
        mut store: impl AsContextMut,
        iovs_ptr: u32,
        iovs_len: u32,
        nwritten_ptr: u32,
    ) -> Result<(String, u32), MemoryError> {
        let mut collected = Vec::new();
        let mut total: u32 = 0;
        {
            let data = self.memory.data(store.as_context());
            for i in 0..iovs_len {
                let entry = checked_range(iovs_ptr + i * 8, 8, data.len())?;
                let buf_ptr = u32_at(data, entry.start);
                let buf_len = u32_at(data, entry.start + 4);
                let buf = checked_range(buf_ptr, buf_len, data.len())?;
                collected.extend_from_slice(&data[buf]);
                total = total.saturating_add(buf_len);
            }
        }
        self.write_u32(store, nwritten_ptr, total)?;
        Ok((String::from_utf8_lossy(&collected).into_owned(), total))
    }

    fn arena_write(
        &mut self,
        mut store: impl AsContextMut,
        bytes: &[u8],
    ) -> Result<u32, MemoryError> {
        let size = self.memory.data_size(store.as_context());
        if self.arena_next == 0 {
            // First fallback allocation: start past everything the guest owns.
            self.arena_next = size;
        }
        self.arena_next = (self.arena_next + 7) & !7;
        let ptr = self.arena_next;
        let end = ptr + bytes.len();
        if end > size {
            let pages = (end - size).div_ceil(WASM_PAGE_SIZE);
            self.memory
                .grow(store.as_context_mut(), pages as u64)
                .map_err(|_| MemoryError::AllocationFailed(bytes.len()))?;
        }
        let data = self.memory.data_mut(store.as_context_mut());
        data[ptr..end].copy_from_slice(bytes);
        self.arena_next = end;
        Ok(ptr as u32)
    }
}
