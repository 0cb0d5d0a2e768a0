//! Host port allocator
//!
//! Exclusive in-memory leases of host ports in a fixed range. Leases are
//! released explicitly; nothing here watches container lifetime.

use std::collections::BTreeSet;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PortError {
    #[error("no available ports in {min}-{max}")]
    Exhausted { min: u16, max: u16 },

    #[error("port {0} out of range")]
    OutOfRange(u16),

    #[error("port {0} was not in use")]
    NotInUse(u16),
}

/// Mutex-protected port lease table
pub struct PortAllocator {
    min_port: u16,
    max_port: u16,
    used: Mutex<BTreeSet<u16>>,
}

impl PortAllocator {
    pub fn new(min_port: u16, max_port: u16) -> Self {
        Self {
            min_port,
            max_port,
            used: Mutex::new(BTreeSet::new()),
        }
    }

    /// Lease the lowest free port in the range.
    ///
    /// O(range) scan; the range is small and requests are rare.
    pub fn acquire(&self) -> Result<u16, PortError> {
        let mut used = self.used.lock().expect("port table poisoned");

        for port in self.min_port..=self.max_port {
            if used.insert(port) {
                return Ok(port);
            }
        }
        Err(PortError::Exhausted {
            min: self.min_port,
            max: self.max_port,
        })
    }

    /// Return a leased port to the pool
    pub fn release(&self, port: u16) -> Result<(), PortError> {
        if port < self.min_port || port > self.max_port {
            return Err(PortError::OutOfRange(port));
        }

        let mut used = self.used.lock().expect("port table poisoned");
        if !used.remove(&port) {
            return Err(PortError::NotInUse(port));
        }
        Ok(())
    }
}
