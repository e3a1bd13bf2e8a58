//! Owned device memory and the per-queue allocation ledger

use crate::error::{Error, Result};
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Where an allocation lives and who may touch it directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Pinned host memory, visible to the device
    Host,
    /// Device-only memory
    Device,
    /// Unified memory, visible to host and device
    Shared,
}

impl MemoryKind {
    /// Whether the host may read and write the allocation directly
    #[inline]
    pub fn is_host_accessible(self) -> bool {
        !matches!(self, MemoryKind::Device)
    }
}

/// Allocation ledger statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Total allocations
    pub allocations: u64,
    /// Total frees
    pub frees: u64,
    /// Allocations not yet freed
    pub live_allocations: usize,
    /// Bytes not yet freed
    pub live_bytes: usize,
    /// High-water mark of live bytes
    pub peak_bytes: usize,
    /// Capacity limit, if any
    pub capacity: Option<usize>,
}

/// Tracks every live allocation of one queue
pub(crate) struct MemoryLedger {
    device: String,
    capacity: Option<usize>,
    next_id: AtomicU64,
    used: AtomicUsize,
    live: DashMap<u64, (MemoryKind, usize)>,
    stats: RwLock<MemoryStats>,
}

impl MemoryLedger {
    pub(crate) fn new(device: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            device: device.into(),
            capacity,
            next_id: AtomicU64::new(1),
            used: AtomicUsize::new(0),
            live: DashMap::new(),
            stats: RwLock::new(MemoryStats {
                capacity,
                ..MemoryStats::default()
            }),
        }
    }

    fn reserve(&self, len: usize) -> Result<()> {
        let capacity = self.capacity.unwrap_or(usize::MAX);
        let mut current = self.used.load(Ordering::Acquire);
        loop {
            let available = capacity.saturating_sub(current);
            let next = current
                .checked_add(len)
                .filter(|&next| next <= capacity)
                .ok_or_else(|| Error::out_of_memory(&self.device, len, available))?;
            match self.used.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn allocate(self: &Arc<Self>, kind: MemoryKind, len: usize) -> Result<DeviceMemory> {
        if len == 0 {
            return Err(Error::InvalidOperation("Cannot allocate 0 bytes".into()));
        }
        self.reserve(len)?;

        let region = match DeviceView::try_zeroed(len) {
            Some(region) => region,
            None => {
                let used = self.used.fetch_sub(len, Ordering::AcqRel) - len;
                let available = self.capacity.unwrap_or(usize::MAX).saturating_sub(used);
                warn!(device = %self.device, len, "device allocation failed");
                return Err(Error::out_of_memory(&self.device, len, available));
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.insert(id, (kind, len));
        {
            let mut stats = self.stats.write();
            stats.allocations += 1;
            stats.live_allocations = self.live.len();
            stats.live_bytes += len;
            stats.peak_bytes = stats.peak_bytes.max(stats.live_bytes);
        }
        trace!(device = %self.device, id, ?kind, len, "device allocation");

        Ok(DeviceMemory {
            id,
            kind,
            len,
            region,
            ledger: Arc::clone(self),
            released: false,
        })
    }

    fn free(&self, id: u64) -> Result<()> {
        let Some((_, (kind, len))) = self.live.remove(&id) else {
            return Err(Error::InvalidOperation(format!(
                "free of unknown allocation {} on {}",
                id, self.device
            )));
        };
        self.used.fetch_sub(len, Ordering::AcqRel);
        {
            let mut stats = self.stats.write();
            stats.frees += 1;
            stats.live_allocations = self.live.len();
            stats.live_bytes -= len;
        }
        trace!(device = %self.device, id, ?kind, len, "device free");
        Ok(())
    }

    pub(crate) fn stats(&self) -> MemoryStats {
        self.stats.read().clone()
    }
}

/// Device-side view of an allocation, usable from inside device tasks
///
/// Views are what kernels and copies capture; they never free anything.
#[derive(Clone)]
pub struct DeviceView {
    region: Arc<RwLock<Vec<u8>>>,
}

impl DeviceView {
    /// Zero-filled region, `None` if the host cannot back it
    fn try_zeroed(len: usize) -> Option<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).ok()?;
        bytes.resize(len, 0);
        Some(Self {
            region: Arc::new(RwLock::new(bytes)),
        })
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.region.read().len()
    }

    /// Check if the view is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared access to the bytes
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.region.read()
    }

    /// Exclusive access to the bytes
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.region.write()
    }

    /// Whether two views alias the same allocation
    pub fn same_region(&self, other: &DeviceView) -> bool {
        Arc::ptr_eq(&self.region, &other.region)
    }
}

/// Exclusive owner of one device allocation
///
/// Not `Clone`. The allocation is returned to the owning queue exactly once,
/// either through [`DeviceMemory::release`] or on drop.
pub struct DeviceMemory {
    id: u64,
    kind: MemoryKind,
    len: usize,
    region: DeviceView,
    ledger: Arc<MemoryLedger>,
    released: bool,
}

impl DeviceMemory {
    /// Allocation id, unique per queue
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Allocation kind
    #[inline]
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the allocation is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the allocation has been returned to the queue
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Device-side view for use inside device tasks
    pub fn view(&self) -> DeviceView {
        self.region.clone()
    }

    fn check_host_access(&self, op: &str) -> Result<()> {
        if self.released {
            return Err(Error::InvalidOperation(format!(
                "{} on released allocation {}",
                op, self.id
            )));
        }
        if !self.kind.is_host_accessible() {
            return Err(Error::InvalidOperation(format!(
                "{} requires host-accessible memory, allocation {} is {:?}",
                op, self.id, self.kind
            )));
        }
        Ok(())
    }

    /// Copy `src` into the allocation at `offset` from the host
    ///
    /// # Errors
    /// Fails for device-only or released memory and for out-of-range writes.
    pub fn copy_from_host(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.check_host_access("copy_from_host")?;
        let end = offset
            .checked_add(src.len())
            .filter(|&end| end <= self.len)
            .ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "write of {} bytes at {} exceeds allocation of {} bytes",
                    src.len(),
                    offset,
                    self.len
                ))
            })?;
        self.region.write()[offset..end].copy_from_slice(src);
        Ok(())
    }

    /// Read the whole allocation back to the host
    ///
    /// # Errors
    /// Fails for device-only or released memory.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.check_host_access("to_vec")?;
        Ok(self.region.read().clone())
    }

    /// Return the allocation to the owning queue
    ///
    /// Idempotent: releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.ledger.free(self.id)
    }
}

impl fmt::Debug for DeviceMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("len", &self.len)
            .field("device", &self.ledger.device)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(id = self.id, error = %e, "failed to release device memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(capacity: Option<usize>) -> Arc<MemoryLedger> {
        Arc::new(MemoryLedger::new("test0", capacity))
    }

    #[test]
    fn test_allocate_and_release() {
        let ledger = ledger(None);
        let mut mem = ledger.allocate(MemoryKind::Device, 128).unwrap();
        assert_eq!(mem.len(), 128);
        assert_eq!(ledger.stats().live_allocations, 1);
        assert_eq!(ledger.stats().live_bytes, 128);

        mem.release().unwrap();
        mem.release().unwrap();
        let stats = ledger.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.live_allocations, 0);
        assert_eq!(stats.peak_bytes, 128);
    }

    #[test]
    fn test_drop_releases() {
        let ledger = ledger(None);
        {
            let _a = ledger.allocate(MemoryKind::Shared, 16).unwrap();
            let _b = ledger.allocate(MemoryKind::Host, 32).unwrap();
            assert_eq!(ledger.stats().live_bytes, 48);
        }
        let stats = ledger.stats();
        assert_eq!(stats.frees, 2);
        assert_eq!(stats.live_bytes, 0);
    }

    #[test]
    fn test_zero_allocation_rejected() {
        let ledger = ledger(None);
        let err = ledger.allocate(MemoryKind::Device, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_capacity_limit() {
        let ledger = ledger(Some(100));
        let _a = ledger.allocate(MemoryKind::Device, 60).unwrap();
        let err = ledger.allocate(MemoryKind::Device, 60).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            Error::OutOfDeviceMemory { requested: 60, available: 40, .. }
        ));
        let _b = ledger.allocate(MemoryKind::Device, 40).unwrap();
    }

    #[test]
    fn test_unbackable_allocation_leaves_ledger_untouched() {
        let ledger = ledger(None);
        let _a = ledger.allocate(MemoryKind::Device, 64).unwrap();

        let err = ledger
            .allocate(MemoryKind::Device, usize::MAX / 2 + 1)
            .unwrap_err();
        assert!(matches!(err, Error::OutOfDeviceMemory { .. }));

        // Running total would overflow
        let err = ledger.allocate(MemoryKind::Device, usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfDeviceMemory { requested: usize::MAX, .. }
        ));

        let stats = ledger.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.live_allocations, 1);
        assert_eq!(stats.live_bytes, 64);
        assert_eq!(ledger.used.load(Ordering::Acquire), 64);

        let _b = ledger.allocate(MemoryKind::Device, 32).unwrap();
        assert_eq!(ledger.stats().live_bytes, 96);
    }

    #[test]
    fn test_host_access() {
        let ledger = ledger(None);
        let mut shared = ledger.allocate(MemoryKind::Shared, 4).unwrap();
        shared.copy_from_host(1, &[7, 8]).unwrap();
        assert_eq!(shared.to_vec().unwrap(), vec![0, 7, 8, 0]);
        assert!(shared.copy_from_host(3, &[1, 2]).is_err());

        let mut device = ledger.allocate(MemoryKind::Device, 4).unwrap();
        assert!(device.copy_from_host(0, &[1]).is_err());
        assert!(device.to_vec().is_err());
    }

    #[test]
    fn test_view_aliasing() {
        let ledger = ledger(None);
        let a = ledger.allocate(MemoryKind::Device, 8).unwrap();
        let b = ledger.allocate(MemoryKind::Device, 8).unwrap();
        assert!(a.view().same_region(&a.view()));
        assert!(!a.view().same_region(&b.view()));
        a.view().write()[0] = 9;
        assert_eq!(a.view().read()[0], 9);
    }
}
