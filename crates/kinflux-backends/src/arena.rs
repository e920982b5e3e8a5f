//! Buffer arena shared by both backend implementations.
//!
//! Owns every device-visible allocation behind opaque handles. Allocations
//! are boxed slices, so base addresses stay stable for the life of a buffer
//! regardless of how the handle map grows.

use std::collections::HashMap;

use crate::backend::BufferHandle;
use crate::error::{BackendError, Result};
use crate::strided::{copy_rect, CopyRegion, RectOrigin, RectPitch};

#[derive(Debug, Default)]
pub(crate) struct BufferArena {
    buffers: HashMap<u64, Box<[u8]>>,
    next_id: u64,
}

impl BufferArena {
    pub(crate) fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 1,
        }
    }

    pub(crate) fn allocate(&mut self, bytes: usize) -> Result<BufferHandle> {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, vec![0u8; bytes].into_boxed_slice());
        Ok(BufferHandle::new(id))
    }

    pub(crate) fn release(&mut self, handle: BufferHandle) -> Result<()> {
        if self.buffers.remove(&handle.id()).is_none() {
            return Err(BackendError::InvalidBufferHandle(handle.id()));
        }
        Ok(())
    }

    /// Free every buffer; returns how many were live.
    pub(crate) fn release_all(&mut self) -> usize {
        let count = self.buffers.len();
        self.buffers.clear();
        count
    }

    pub(crate) fn len(&self, handle: BufferHandle) -> Result<usize> {
        self.buffers
            .get(&handle.id())
            .map(|b| b.len())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Stable base address of a buffer, for kernel argument marshalling.
    pub(crate) fn base_ptr(&self, handle: BufferHandle) -> Result<*const u8> {
        self.buffers
            .get(&handle.id())
            .map(|b| b.as_ptr())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    pub(crate) fn write_rect(
        &mut self,
        dst: BufferHandle,
        host: &[u8],
        host_origin: RectOrigin,
        host_pitch: RectPitch,
        device_pitch: RectPitch,
        region: CopyRegion,
    ) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(&dst.id())
            .ok_or(BackendError::InvalidBufferHandle(dst.id()))?;
        copy_rect(
            host,
            host_origin,
            host_pitch,
            buffer,
            RectOrigin::default(),
            device_pitch,
            region,
        )
    }

    pub(crate) fn read_rect(
        &self,
        src: BufferHandle,
        host: &mut [u8],
        host_origin: RectOrigin,
        host_pitch: RectPitch,
        device_pitch: RectPitch,
        region: CopyRegion,
    ) -> Result<()> {
        let buffer = self
            .buffers
            .get(&src.id())
            .ok_or(BackendError::InvalidBufferHandle(src.id()))?;
        copy_rect(
            buffer,
            RectOrigin::default(),
            device_pitch,
            host,
            host_origin,
            host_pitch,
            region,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_release_cycle() {
        let mut arena = BufferArena::new();
        let buf = arena.allocate(128).unwrap();
        assert_eq!(arena.len(buf).unwrap(), 128);

        arena.release(buf).unwrap();
        assert!(matches!(
            arena.len(buf),
            Err(BackendError::InvalidBufferHandle(_))
        ));
        // double release is a lookup failure, not a crash
        assert!(arena.release(buf).is_err());
    }

    #[test]
    fn release_all_counts_live_buffers() {
        let mut arena = BufferArena::new();
        let a = arena.allocate(8).unwrap();
        let _b = arena.allocate(8).unwrap();
        arena.release(a).unwrap();
        assert_eq!(arena.release_all(), 1);
        assert_eq!(arena.release_all(), 0);
    }

    #[test]
    fn rect_write_then_read_round_trips() {
        let mut arena = BufferArena::new();
        let buf = arena.allocate(12).unwrap();

        // 3 fields x 4 conditions host array, move conditions 1..3
        let host: Vec<u8> = (0..12).collect();
        let region = CopyRegion {
            bytes_per_row: 2,
            rows: 3,
            slices: 1,
        };
        let host_pitch = RectPitch { row: 4, slice: 12 };
        let dev_pitch = RectPitch::packed(&region);

        arena
            .write_rect(buf, &host, RectOrigin::at_byte(1), host_pitch, dev_pitch, region)
            .unwrap();

        let mut back = vec![0u8; 12];
        arena
            .read_rect(buf, &mut back, RectOrigin::at_byte(1), host_pitch, dev_pitch, region)
            .unwrap();

        assert_eq!(back, vec![0, 1, 2, 0, 0, 5, 6, 0, 0, 9, 10, 0]);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut arena = BufferArena::new();
        let a = arena.allocate(4).unwrap();
        arena.release(a).unwrap();
        let b = arena.allocate(4).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
