//! Growable sub-allocator for buffer memory.
//!
//! A [`DynamicBuffer`] hands out variable-sized, independently freed byte ranges from
//! one or more backing buffers ("chunks"), each bound to its own device memory block.
//! It grows by adding chunks on demand and reuses space as ranges are freed.
//!
//! # Placement
//!
//! Requests are placed first-fit: chunks are probed in index order, and inside a
//! chunk the gaps between live ranges are probed in address order. The first gap
//! that holds the request wins.
//!
//! # Growth
//!
//! When no chunk has room, a new chunk is created in the first empty slot (or a new
//! slot at the end). It is sized to the total number of bytes currently allocated,
//! including the request, so that steadily growing workloads need fewer chunks over
//! time. If the device cannot back a chunk that large, the chunk is sized to the
//! request alone. Only if that fails too does [`DynamicBuffer::allocate`] return an
//! error, and in that case nothing has changed.
//!
//! # Reclamation
//!
//! A chunk whose last range is freed releases its buffer and memory immediately and
//! becomes an empty slot for later growth. When that chunk is the last one in the
//! list, it is removed instead.
//!
//! ```no_run
//! # use magma::{Device, ash::vk, dynamic_buffer::{DynamicBuffer, DynamicBufferInfo}};
//! # fn run(device: Device) -> Result<(), magma::memory::MemoryError> {
//! let mut vertices = DynamicBuffer::new(
//!     device,
//!     DynamicBufferInfo::new(
//!         vk::BufferUsageFlags::VERTEX_BUFFER,
//!         vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
//!     ),
//! );
//! let id = vertices.allocate(1024)?;
//! vertices.memory::<f32>(id)?.fill(0.0);
//! let binding = vertices.descriptor_info(id);
//! # let _ = binding;
//! vertices.free(id);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! A `DynamicBuffer` is a plain single-owner structure. Share one between threads
//! behind a mutex, or give each thread its own.

mod chunk;

use ash::vk;

use crate::{
    Device, HasDevice,
    buffer::Buffer,
    memory::{DeviceMemory, MappedMemory, MemoryError},
    utils::{AsVkHandle, SharingMode},
};
use chunk::Chunk;
pub use chunk::Range;

/// Handle to one live allocation of a [`DynamicBuffer`]: the chunk index and the
/// begin offset of the range inside that chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId {
    pub chunk: u32,
    pub begin: u32,
}

impl RangeId {
    /// Names no allocation. Freeing it is a no-op.
    pub const NULL: Self = Self {
        chunk: 0,
        begin: u32::MAX,
    };

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Default for RangeId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Creation parameters shared by every chunk of a [`DynamicBuffer`].
#[derive(Debug, Clone, Default)]
pub struct DynamicBufferInfo {
    pub flags: vk::BufferCreateFlags,
    pub usage: vk::BufferUsageFlags,
    /// Property flags the backing memory type must have.
    pub memory_flags: vk::MemoryPropertyFlags,
    pub sharing: SharingMode<Vec<u32>>,
}

impl DynamicBufferInfo {
    pub fn new(usage: vk::BufferUsageFlags, memory_flags: vk::MemoryPropertyFlags) -> Self {
        Self {
            usage,
            memory_flags,
            ..Default::default()
        }
    }

    /// Shares the chunk buffers between the given queue families.
    pub fn queue_families(mut self, queue_family_indices: Vec<u32>) -> Self {
        self.sharing = SharingMode::Concurrent {
            queue_family_indices,
        };
        self
    }
}

/// Creates the backing storage of a chunk.
pub trait ChunkBackend {
    /// Buffer and memory realizing one chunk. Dropping it releases both.
    type Storage;

    /// Creates storage for a chunk of `size` bytes.
    fn create_storage(
        &self,
        info: &DynamicBufferInfo,
        size: u32,
    ) -> Result<Self::Storage, MemoryError>;
}

/// A buffer bound at offset 0 to a memory block of its own.
#[derive(Debug)]
pub struct ChunkStorage {
    // Declared before `memory` so the buffer is destroyed before its memory is freed.
    buffer: Buffer,
    memory: DeviceMemory,
}

impl ChunkStorage {
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn memory(&self) -> &DeviceMemory {
        &self.memory
    }
}

impl ChunkBackend for Device {
    type Storage = ChunkStorage;

    fn create_storage(
        &self,
        info: &DynamicBufferInfo,
        size: u32,
    ) -> Result<ChunkStorage, MemoryError> {
        let mut buffer = Buffer::new(
            self.clone(),
            info.flags,
            size as vk::DeviceSize,
            info.usage,
            &info.sharing,
        )?;
        let requirements = buffer.memory_requirements();
        let memory = DeviceMemory::select_and_allocate(
            self.clone(),
            requirements.size,
            info.memory_flags,
            requirements.memory_type_bits,
        )?;
        buffer.bind_memory(&memory, 0)?;
        Ok(ChunkStorage { buffer, memory })
    }
}

/// Growable sub-allocator over buffer memory. See the [module docs](self).
pub struct DynamicBuffer<B: ChunkBackend = Device> {
    backend: B,
    info: DynamicBufferInfo,
    /// Sum of the widths of all live ranges. Sizes the next chunk.
    allocated_size: u32,
    /// Indices are stable: chunks are emptied in place, and only the last one is ever removed.
    chunks: Vec<Chunk<B::Storage>>,
}

impl<B: ChunkBackend> DynamicBuffer<B> {
    pub fn new(backend: B, info: DynamicBufferInfo) -> Self {
        Self {
            backend,
            info,
            allocated_size: 0,
            chunks: Vec::new(),
        }
    }

    pub fn info(&self) -> &DynamicBufferInfo {
        &self.info
    }

    /// Total bytes held by live allocations.
    pub fn allocated_size(&self) -> u32 {
        self.allocated_size
    }

    /// Number of chunk slots, empty ones included.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Capacity of the chunk at `index`; 0 for an empty slot.
    pub fn chunk_capacity(&self, index: usize) -> Option<u32> {
        self.chunks.get(index).map(|chunk| chunk.size)
    }

    /// Live ranges of the chunk at `index`, sorted by begin offset.
    pub fn chunk_ranges(&self, index: usize) -> Option<&[Range]> {
        self.chunks.get(index).map(|chunk| chunk.ranges.as_slice())
    }

    /// Allocates `size` bytes.
    ///
    /// # Errors
    /// [`MemoryError::ZeroSized`] for an empty request. Otherwise fails only if a new
    /// chunk was needed and the backend could not create one, neither sized for all
    /// outstanding allocations nor sized for this request alone. A failed call leaves
    /// the allocator unchanged.
    pub fn allocate(&mut self, size: u32) -> Result<RangeId, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ZeroSized);
        }
        self.allocated_size = self
            .allocated_size
            .checked_add(size)
            .ok_or(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)?;
        let result = self.place(size);
        if result.is_err() {
            self.allocated_size -= size;
        }
        result
    }

    fn place(&mut self, size: u32) -> Result<RangeId, MemoryError> {
        for (index, chunk) in self.chunks.iter_mut().enumerate() {
            if let Some(begin) = chunk.allocate(size) {
                return Ok(RangeId {
                    chunk: index as u32,
                    begin,
                });
            }
        }

        let (index, appended) = self.available_chunk();
        let capacity = self.allocated_size;
        let (storage, capacity) = match self.backend.create_storage(&self.info, capacity) {
            Ok(storage) => (storage, capacity),
            Err(err) => {
                tracing::warn!(
                    %err,
                    capacity,
                    size,
                    "Could not create dynamic buffer chunk, retrying with the requested size"
                );
                match self.backend.create_storage(&self.info, size) {
                    Ok(storage) => (storage, size),
                    Err(err) => {
                        if appended {
                            self.chunks.pop();
                        }
                        return Err(err);
                    }
                }
            }
        };
        tracing::info!(index, capacity, "Allocating new dynamic buffer chunk");

        let chunk = &mut self.chunks[index];
        chunk.activate(storage, capacity);
        let begin = chunk
            .allocate(size)
            .expect("a fresh chunk always holds the request that sized it");
        Ok(RangeId {
            chunk: index as u32,
            begin,
        })
    }

    /// Returns the index of the first empty slot, appending one if there is none,
    /// and whether it was appended.
    fn available_chunk(&mut self) -> (usize, bool) {
        if let Some(index) = self.chunks.iter().position(Chunk::is_empty) {
            return (index, false);
        }
        self.chunks.push(Chunk::default());
        (self.chunks.len() - 1, true)
    }

    /// Returns the chunk holding `id`, panicking unless `id` names a live allocation.
    fn live_chunk(&self, id: RangeId) -> &Chunk<B::Storage> {
        match self.chunks.get(id.chunk as usize) {
            Some(chunk) if chunk.contains(id.begin) => chunk,
            _ => panic!("{id:?} does not name a live allocation"),
        }
    }

    /// Frees an allocation. Freeing [`RangeId::NULL`] does nothing.
    ///
    /// # Panics
    /// Panics if `id` does not name a live allocation.
    pub fn free(&mut self, id: RangeId) {
        if id.is_null() {
            return;
        }
        let width = self.range(id).len();
        let index = id.chunk as usize;
        if index == self.chunks.len() - 1 && self.chunks[index].ranges.len() <= 1 {
            self.chunks.pop();
            tracing::debug!(index, "Releasing last dynamic buffer chunk");
        } else {
            self.chunks[index].remove_range(id.begin);
            if self.chunks[index].is_empty() {
                tracing::debug!(index, "Dynamic buffer chunk emptied");
            }
        }
        self.allocated_size -= width;
    }

    /// Resizes an allocation in place, keeping its begin offset.
    ///
    /// The range may grow into free space up to the next live range of its chunk, or
    /// up to the chunk capacity. It never moves.
    ///
    /// # Errors
    /// [`MemoryError::RangeOverflow`] if the new extent does not fit in place, and
    /// [`MemoryError::ZeroSized`] for a zero size. The allocation is unchanged then.
    ///
    /// # Panics
    /// Panics if `id` does not name a live allocation.
    pub fn resize(&mut self, id: RangeId, size: u32) -> Result<(), MemoryError> {
        let current = self.range(id).len();
        let allocated_size = (self.allocated_size - current)
            .checked_add(size)
            .ok_or(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)?;
        self.chunks[id.chunk as usize].resize_range(id.begin, size)?;
        self.allocated_size = allocated_size;
        Ok(())
    }

    /// Returns the byte range of an allocation inside its chunk's buffer.
    ///
    /// # Panics
    /// Panics if `id` does not name a live allocation.
    pub fn range(&self, id: RangeId) -> Range {
        self.live_chunk(id).range(id.begin)
    }

    /// Returns the storage backing an allocation.
    ///
    /// # Panics
    /// Panics if `id` does not name a live allocation.
    pub fn storage(&self, id: RangeId) -> &B::Storage {
        self.live_chunk(id)
            .storage
            .as_ref()
            .expect("chunks with live ranges always have storage")
    }
}

impl DynamicBuffer<Device> {
    /// Returns the buffer an allocation lives in.
    ///
    /// The allocation starts at [`range(id).begin`](Self::range) within this buffer.
    pub fn buffer(&self, id: RangeId) -> &Buffer {
        self.storage(id).buffer()
    }

    /// Returns the buffer, offset and length of an allocation, ready for a descriptor write.
    pub fn descriptor_info(&self, id: RangeId) -> vk::DescriptorBufferInfo {
        let range = self.range(id);
        vk::DescriptorBufferInfo {
            buffer: self.buffer(id).vk_handle(),
            offset: range.begin as vk::DeviceSize,
            range: range.len() as vk::DeviceSize,
        }
    }

    /// Maps exactly the bytes of an allocation into host memory.
    ///
    /// The memory type must be `HOST_VISIBLE`. The mapping is released when the
    /// returned guard is dropped; while it is alive the buffer cannot be used.
    ///
    /// # Errors
    /// Ranges are placed at arbitrary byte offsets, so [`MemoryError::Misaligned`] is
    /// returned when the range does not begin on a `T` boundary. Map it as `u8` instead.
    pub fn memory<T: bytemuck::Pod>(
        &mut self,
        id: RangeId,
    ) -> Result<MappedMemory<'_, T>, MemoryError> {
        let range = self.range(id);
        let storage = self.chunks[id.chunk as usize]
            .storage
            .as_mut()
            .expect("chunks with live ranges always have storage");
        storage
            .memory
            .map(range.begin as vk::DeviceSize, range.len() as vk::DeviceSize)
    }
}

impl HasDevice for DynamicBuffer<Device> {
    fn device(&self) -> &Device {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, cell::RefCell, rc::Rc};

    /// Backend that records chunk sizes and rejects sizes above a limit.
    #[derive(Default)]
    struct FakeBackend {
        max_size: Cell<Option<u32>>,
        fail_all: Cell<bool>,
        created: RefCell<Vec<u32>>,
        live: Rc<Cell<u32>>,
    }

    struct FakeStorage {
        size: u32,
        live: Rc<Cell<u32>>,
    }

    impl Drop for FakeStorage {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl ChunkBackend for FakeBackend {
        type Storage = FakeStorage;

        fn create_storage(
            &self,
            info: &DynamicBufferInfo,
            size: u32,
        ) -> Result<FakeStorage, MemoryError> {
            if self.fail_all.get() {
                return Err(MemoryError::NoSuitableMemoryType {
                    size: size as u64,
                    flags: info.memory_flags,
                    type_bits: 0,
                });
            }
            if self.max_size.get().is_some_and(|max| size > max) {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into());
            }
            self.created.borrow_mut().push(size);
            self.live.set(self.live.get() + 1);
            Ok(FakeStorage {
                size,
                live: self.live.clone(),
            })
        }
    }

    fn dynamic_buffer() -> DynamicBuffer<FakeBackend> {
        DynamicBuffer::new(
            FakeBackend::default(),
            DynamicBufferInfo::new(
                vk::BufferUsageFlags::STORAGE_BUFFER,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            ),
        )
    }

    fn id(chunk: u32, begin: u32) -> RangeId {
        RangeId { chunk, begin }
    }

    /// Checks every structural invariant of the allocator.
    fn check_invariants(buffer: &DynamicBuffer<FakeBackend>) {
        let mut total = 0;
        for (index, chunk) in buffer.chunks.iter().enumerate() {
            if chunk.is_empty() {
                assert!(chunk.ranges.is_empty(), "empty chunk {index} has ranges");
                assert!(chunk.storage.is_none(), "empty chunk {index} kept storage");
                continue;
            }
            let storage = chunk.storage.as_ref().expect("active chunk without storage");
            assert!(storage.size >= chunk.size);
            assert!(!chunk.ranges.is_empty(), "active chunk {index} has no ranges");
            for range in &chunk.ranges {
                assert!(range.begin < range.end, "degenerate range {range:?}");
                assert!(range.end <= chunk.size, "{range:?} exceeds chunk {index}");
                total += range.len();
            }
            for pair in chunk.ranges.windows(2) {
                assert!(
                    pair[0].end <= pair[1].begin,
                    "unsorted or overlapping ranges {pair:?} in chunk {index}"
                );
            }
        }
        assert_eq!(total, buffer.allocated_size(), "allocated size drifted");
        let active = buffer.chunks.iter().filter(|chunk| !chunk.is_empty()).count() as u32;
        assert_eq!(buffer.backend.live.get(), active, "storage leaked or double freed");
    }

    #[test]
    fn grows_from_nothing() {
        let mut buffer = dynamic_buffer();
        assert_eq!(buffer.allocate(100), Ok(id(0, 0)));
        assert_eq!(buffer.chunk_count(), 1);
        assert_eq!(buffer.chunk_capacity(0), Some(100));
        assert_eq!(buffer.allocated_size(), 100);
        assert_eq!(buffer.range(id(0, 0)), Range { begin: 0, end: 100 });
        check_invariants(&buffer);
    }

    #[test]
    fn new_chunk_is_sized_for_all_outstanding_allocations() {
        let mut buffer = dynamic_buffer();
        assert_eq!(buffer.allocate(50), Ok(id(0, 0)));
        assert_eq!(buffer.allocate(70), Ok(id(1, 0)));
        assert_eq!(buffer.chunk_capacity(1), Some(120));
        assert_eq!(*buffer.backend.created.borrow(), [50, 120]);
        check_invariants(&buffer);
    }

    #[test]
    fn first_fit_across_chunks() {
        let mut buffer = dynamic_buffer();
        let a = buffer.allocate(100).unwrap();
        let b = buffer.allocate(50).unwrap();
        assert_eq!(b, id(1, 0));
        assert_eq!(buffer.chunk_capacity(1), Some(150));

        // Chunk 1 has a 100-byte tail; chunk 0 is full, so chunk 1 is the first fit.
        assert_eq!(buffer.allocate(30), Ok(id(1, 50)));
        buffer.free(a);
        // Chunk 0 is now an empty slot, which never satisfies a probe.
        assert_eq!(buffer.allocate(10), Ok(id(1, 80)));
        check_invariants(&buffer);
    }

    #[test]
    fn scenario_growth_reclaim_and_reuse() {
        let mut buffer = dynamic_buffer();
        assert_eq!(buffer.allocate(100), Ok(id(0, 0)));
        assert_eq!(buffer.chunk_capacity(0), Some(100));

        assert_eq!(buffer.allocate(50), Ok(id(1, 0)));
        assert_eq!(buffer.chunk_capacity(1), Some(150));

        buffer.free(id(0, 0));
        assert_eq!(buffer.chunk_count(), 2, "a chunk that is not last stays as a slot");
        assert_eq!(buffer.chunk_capacity(0), Some(0));
        assert_eq!(buffer.allocated_size(), 50);
        check_invariants(&buffer);

        // 80 bytes still fit in the tail of chunk 1, which is probed before growing.
        assert_eq!(buffer.allocate(80), Ok(id(1, 50)));
        assert_eq!(buffer.allocated_size(), 130);

        // 120 bytes fit nowhere: the empty slot 0 is reused, sized for everything.
        assert_eq!(buffer.allocate(120), Ok(id(0, 0)));
        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.chunk_capacity(0), Some(250));
        assert_eq!(*buffer.backend.created.borrow(), [100, 150, 250]);
        check_invariants(&buffer);
    }

    #[test]
    fn empty_slot_is_reused_before_appending() {
        let mut buffer = dynamic_buffer();
        let a = buffer.allocate(40).unwrap();
        let _b = buffer.allocate(40).unwrap();
        buffer.free(a);
        assert_eq!(buffer.allocated_size(), 40);

        // Fits in neither the slot (empty) nor chunk 1 (80 bytes, 40 used, strict tail).
        assert_eq!(buffer.allocate(40), Ok(id(0, 0)));
        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.chunk_capacity(0), Some(80));
        check_invariants(&buffer);
    }

    #[test]
    fn freeing_the_only_range_of_the_last_chunk_shrinks_the_list() {
        let mut buffer = dynamic_buffer();
        let a = buffer.allocate(10).unwrap();
        let b = buffer.allocate(20).unwrap();
        assert_eq!(buffer.chunk_count(), 2);

        buffer.free(b);
        assert_eq!(buffer.chunk_count(), 1);
        assert_eq!(buffer.allocated_size(), 10);
        check_invariants(&buffer);

        buffer.free(a);
        assert_eq!(buffer.chunk_count(), 0);
        assert_eq!(buffer.allocated_size(), 0);
        check_invariants(&buffer);
    }

    #[test]
    fn last_chunk_with_several_ranges_is_kept() {
        let mut buffer = dynamic_buffer();
        let a = buffer.allocate(10).unwrap();
        let b = buffer.allocate(20).unwrap();
        let c = buffer.allocate(5).unwrap();
        assert_eq!(c, id(1, 20));

        buffer.free(b);
        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.chunk_ranges(1), Some(&[Range { begin: 20, end: 25 }][..]));
        buffer.free(c);
        buffer.free(a);
        assert_eq!(buffer.chunk_count(), 0);
        check_invariants(&buffer);
    }

    #[test]
    fn allocate_then_free_round_trips() {
        let mut buffer = dynamic_buffer();
        let _a = buffer.allocate(64).unwrap();
        let _b = buffer.allocate(64).unwrap();
        let before = buffer.allocated_size();
        let chunks = buffer.chunk_count();

        for size in [1, 8, 63, 200] {
            let id = buffer.allocate(size).unwrap();
            buffer.free(id);
            assert_eq!(buffer.allocated_size(), before);
            assert_eq!(buffer.chunk_count(), chunks, "request of {size} bytes");
            check_invariants(&buffer);
        }
    }

    #[test]
    fn free_null_is_a_no_op() {
        let mut buffer = dynamic_buffer();
        buffer.free(RangeId::NULL);
        buffer.allocate(10).unwrap();
        buffer.free(RangeId::default());
        assert_eq!(buffer.allocated_size(), 10);
        assert_eq!(buffer.chunk_count(), 1);
    }

    #[test]
    #[should_panic(expected = "does not name a live allocation")]
    fn storage_of_freed_range_panics() {
        let mut buffer = dynamic_buffer();
        let _a = buffer.allocate(10).unwrap();
        let _b = buffer.allocate(10).unwrap();
        let c = buffer.allocate(5).unwrap();
        assert_eq!(buffer.storage(c).size, 20);
        buffer.free(c);
        buffer.storage(c);
    }

    #[test]
    fn ranges_begin_at_arbitrary_byte_offsets() {
        let mut buffer = dynamic_buffer();
        buffer.allocate(3).unwrap();
        buffer.allocate(8).unwrap();
        buffer.allocate(1).unwrap();
        let id = buffer.allocate(1).unwrap();
        assert_eq!(id, RangeId { chunk: 1, begin: 9 });
        assert_eq!(buffer.range(id).begin % 4, 1, "typed mapping must check alignment");
    }

    #[test]
    #[should_panic]
    fn free_unknown_range_panics() {
        let mut buffer = dynamic_buffer();
        buffer.allocate(10).unwrap();
        buffer.allocate(10).unwrap();
        buffer.free(id(1, 3));
    }

    #[test]
    fn falls_back_to_request_size() {
        let mut buffer = dynamic_buffer();
        buffer.backend.max_size.set(Some(100));
        assert_eq!(buffer.allocate(80), Ok(id(0, 0)));

        // 140 cumulative bytes are too many for the backend; 60 are fine.
        assert_eq!(buffer.allocate(60), Ok(id(1, 0)));
        assert_eq!(buffer.chunk_capacity(1), Some(60));
        assert_eq!(buffer.allocated_size(), 140);
        assert_eq!(*buffer.backend.created.borrow(), [80, 60]);
        check_invariants(&buffer);
    }

    #[test]
    fn failed_growth_changes_nothing() {
        let mut buffer = dynamic_buffer();
        buffer.allocate(100).unwrap();
        buffer.backend.fail_all.set(true);

        let err = buffer.allocate(10).unwrap_err();
        assert!(matches!(err, MemoryError::NoSuitableMemoryType { size: 10, .. }));
        assert_eq!(buffer.allocated_size(), 100);
        assert_eq!(buffer.chunk_count(), 1, "the slot appended for growth is removed");
        check_invariants(&buffer);

        buffer.backend.fail_all.set(false);
        assert_eq!(buffer.allocate(10), Ok(id(1, 0)));
        check_invariants(&buffer);
    }

    #[test]
    fn failed_growth_keeps_reused_slot_empty() {
        let mut buffer = dynamic_buffer();
        let a = buffer.allocate(10).unwrap();
        let _b = buffer.allocate(10).unwrap();
        buffer.free(a);
        buffer.backend.fail_all.set(true);

        assert!(buffer.allocate(50).is_err());
        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.chunk_capacity(0), Some(0));
        assert_eq!(buffer.allocated_size(), 10);
        check_invariants(&buffer);
    }

    #[test]
    fn zero_sized_requests_are_rejected() {
        let mut buffer = dynamic_buffer();
        assert_eq!(buffer.allocate(0), Err(MemoryError::ZeroSized));
        assert_eq!(buffer.chunk_count(), 0);
        assert_eq!(buffer.allocated_size(), 0);
    }

    #[test]
    fn resize_tracks_allocated_size() {
        let mut buffer = dynamic_buffer();
        let a = buffer.allocate(100).unwrap();
        let b = buffer.allocate(50).unwrap();
        assert_eq!(buffer.chunk_capacity(1), Some(150));

        buffer.resize(b, 120).unwrap();
        assert_eq!(buffer.range(b), Range { begin: 0, end: 120 });
        assert_eq!(buffer.allocated_size(), 220);

        buffer.resize(a, 40).unwrap();
        assert_eq!(buffer.allocated_size(), 160);
        check_invariants(&buffer);
    }

    #[test]
    fn resize_past_neighbor_is_rejected() {
        let mut buffer = dynamic_buffer();
        let _a = buffer.allocate(100).unwrap();
        let b = buffer.allocate(50).unwrap();
        let c = buffer.allocate(10).unwrap();
        assert_eq!(c, id(1, 50));

        assert_eq!(
            buffer.resize(b, 51),
            Err(MemoryError::RangeOverflow {
                begin: 0,
                end: 51,
                limit: 50
            })
        );
        assert_eq!(buffer.range(b).len(), 50);
        assert_eq!(buffer.allocated_size(), 160);
        check_invariants(&buffer);
    }

    #[test]
    fn random_operations_keep_invariants() {
        let mut buffer = dynamic_buffer();
        buffer.backend.max_size.set(Some(512));
        let mut live = Vec::new();
        let mut state = 0x2545_f491_u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for _ in 0..2000 {
            match next() % 4 {
                0 | 1 => {
                    let size = next() % 96 + 1;
                    let id = buffer.allocate(size).unwrap();
                    assert!(!live.contains(&id), "{id:?} handed out twice");
                    live.push(id);
                }
                2 if !live.is_empty() => {
                    let id = live.swap_remove(next() as usize % live.len());
                    buffer.free(id);
                }
                3 if !live.is_empty() => {
                    let id = live[next() as usize % live.len()];
                    let before = buffer.range(id);
                    let size = next() % 96 + 1;
                    if buffer.resize(id, size).is_err() {
                        assert_eq!(buffer.range(id), before);
                    }
                }
                _ => {}
            }
            check_invariants(&buffer);
        }

        for id in live {
            buffer.free(id);
        }
        check_invariants(&buffer);
        assert_eq!(buffer.allocated_size(), 0);
    }
}
