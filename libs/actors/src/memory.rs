//! Guest memory and fuel
//!
//! Each process gets a bounded, zero-initialised linear memory that the
//! host boundary reads pointer+length pairs from. Accesses outside the
//! current size trap; growth past the configured maximum traps.

use crate::error::Trap;
use runtime_config::protocol::memory::{INITIAL_PAGES, PAGE_SIZE};

#[derive(Debug, Clone)]
pub struct GuestMemory {
    bytes: Vec<u8>,
    limit: u64,
}

impl GuestMemory {
    /// Memory capped at `limit` bytes, starting with up to one page
    pub fn new(limit: u64) -> Self {
        let pages = INITIAL_PAGES.min(limit / PAGE_SIZE);
        Self {
            bytes: vec![0; (pages * PAGE_SIZE) as usize],
            limit,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn pages(&self) -> u64 {
        self.size() / PAGE_SIZE
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Grow by `delta` pages, returning the previous page count
    pub fn grow(&mut self, delta: u64) -> Result<u64, Trap> {
        let previous = self.pages();
        let new_size = previous
            .checked_add(delta)
            .and_then(|pages| pages.checked_mul(PAGE_SIZE))
            .filter(|size| *size <= self.limit)
            .ok_or(Trap::MemoryLimitExceeded { limit: self.limit })?;
        let new_size =
            usize::try_from(new_size).map_err(|_| Trap::MemoryLimitExceeded { limit: self.limit })?;
        self.bytes.resize(new_size, 0);
        Ok(previous)
    }

    fn range(&self, offset: u64, len: u64) -> Result<std::ops::Range<usize>, Trap> {
        let out_of_bounds = Trap::MemoryOutOfBounds {
            offset,
            len,
            size: self.size(),
        };
        let end = offset.checked_add(len).ok_or(out_of_bounds.clone())?;
        if end > self.size() {
            return Err(out_of_bounds);
        }
        Ok(offset as usize..end as usize)
    }

    pub fn read(&self, offset: u64, len: u64) -> Result<&[u8], Trap> {
        let range = self.range(offset, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, offset: u64, len: u64) -> Result<&mut [u8], Trap> {
        let range = self.range(offset, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), Trap> {
        self.slice_mut(offset, data.len() as u64)?
            .copy_from_slice(data);
        Ok(())
    }

    pub fn read_str(&self, offset: u64, len: u64) -> Result<&str, Trap> {
        std::str::from_utf8(self.read(offset, len)?).map_err(|_| Trap::InvalidUtf8)
    }

    pub fn read_u64(&self, offset: u64) -> Result<u64, Trap> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read(offset, 8)?);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_i64(&self, offset: u64) -> Result<i64, Trap> {
        self.read_u64(offset).map(|v| v as i64)
    }

    pub fn write_u64(&mut self, offset: u64, value: u64) -> Result<(), Trap> {
        self.write(offset, &value.to_le_bytes())
    }

    pub fn write_u32(&mut self, offset: u64, value: u32) -> Result<(), Trap> {
        self.write(offset, &value.to_le_bytes())
    }
}

/// Cooperative execution budget
#[derive(Debug, Clone, Default)]
pub struct FuelMeter {
    limit: Option<u64>,
    consumed: u64,
}

impl FuelMeter {
    /// `None` means unlimited
    pub fn new(limit: Option<u64>) -> Self {
        Self { limit, consumed: 0 }
    }

    pub fn is_limited(&self) -> bool {
        self.limit.is_some()
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.consumed))
    }

    pub fn consume(&mut self, units: u64) -> Result<(), Trap> {
        self.consumed = self.consumed.saturating_add(units);
        match self.limit {
            Some(limit) if self.consumed > limit => Err(Trap::OutOfFuel { limit }),
            _ => Ok(()),
        }
    }
}
