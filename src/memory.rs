//! Device memory blocks and host mappings.
//!
//! [`DeviceMemory`] owns one `vkAllocateMemory` block. [`DeviceMemory::select_and_allocate`]
//! picks a memory type from the device's cached
//! [`MemoryProperties`](crate::physical_device::MemoryProperties) before allocating.
//!
//! Host access goes through [`MappedMemory`], a scoped guard returned by
//! [`DeviceMemory::map`]. The guard mutably borrows the memory block, so at most one
//! mapping of a block can exist at a time, and it unmaps the block when dropped.

use std::{fmt::Debug, marker::PhantomData, ops::Deref, ops::DerefMut, ptr::NonNull};

use ash::{prelude::VkResult, vk};

use crate::{Device, HasDevice, utils::AsVkHandle};

/// Errors from device memory allocation and sub-allocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// No memory type matches the requested property flags, the compatible-type mask,
    /// and has a heap large enough for the request.
    #[error("no memory type with {flags:?} in mask {type_bits:#b} can hold {size} bytes")]
    NoSuitableMemoryType {
        size: vk::DeviceSize,
        flags: vk::MemoryPropertyFlags,
        type_bits: u32,
    },
    /// Zero-sized allocations are not representable as a range.
    #[error("zero-sized allocation")]
    ZeroSized,
    /// A range could not be extended in place.
    #[error("range starting at {begin} cannot grow to {end}: limit is {limit}")]
    RangeOverflow { begin: u32, end: u64, limit: u32 },
    /// A host mapping would reach past the end of its memory block.
    #[error("cannot map {size} bytes at offset {offset} of a {limit}-byte memory block")]
    MapOutOfBounds {
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        limit: vk::DeviceSize,
    },
    /// A host mapping does not start on an element boundary of the requested type.
    #[error("mapped offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: vk::DeviceSize, align: usize },
    #[error(transparent)]
    Vk(#[from] vk::Result),
}

/// An owned block of device memory.
pub struct DeviceMemory {
    device: Device,
    handle: vk::DeviceMemory,
    size: vk::DeviceSize,
    memory_type_index: u32,
}
impl Debug for DeviceMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("memory_type_index", &self.memory_type_index)
            .finish()
    }
}
impl HasDevice for DeviceMemory {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for DeviceMemory {
    type Handle = vk::DeviceMemory;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

impl DeviceMemory {
    /// Allocates `size` bytes from the memory type at `memory_type_index`.
    pub fn new(device: Device, size: vk::DeviceSize, memory_type_index: u32) -> VkResult<Self> {
        let handle = unsafe {
            device.allocate_memory(
                &vk::MemoryAllocateInfo {
                    allocation_size: size,
                    memory_type_index,
                    ..Default::default()
                },
                None,
            )
        }?;
        Ok(Self {
            device,
            handle,
            size,
            memory_type_index,
        })
    }

    /// Selects a memory type and allocates `size` bytes from it.
    ///
    /// The selected type is the first one in `type_bits` whose property flags contain
    /// `flags` and whose heap can hold `size` bytes.
    ///
    /// # Errors
    /// [`MemoryError::NoSuitableMemoryType`] if no such memory type exists, or the
    /// Vulkan error returned by the allocation itself.
    pub fn select_and_allocate(
        device: Device,
        size: vk::DeviceSize,
        flags: vk::MemoryPropertyFlags,
        type_bits: u32,
    ) -> Result<Self, MemoryError> {
        let memory_type_index = device
            .memory_properties()
            .select_memory_type(size, flags, type_bits)
            .ok_or(MemoryError::NoSuitableMemoryType {
                size,
                flags,
                type_bits,
            })?;
        Ok(Self::new(device, size, memory_type_index)?)
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Returns the property flags of the memory type this block was allocated from.
    pub fn property_flags(&self) -> vk::MemoryPropertyFlags {
        self.device
            .memory_properties()
            .property_flags(self.memory_type_index)
    }

    /// Maps `size` bytes starting at `offset` into host address space.
    ///
    /// The memory must have been allocated from a `HOST_VISIBLE` memory type. The
    /// returned guard unmaps the memory when dropped.
    ///
    /// # Errors
    /// [`MemoryError::MapOutOfBounds`] if the span does not lie within the block
    /// (`vk::WHOLE_SIZE` is rejected too), [`MemoryError::Misaligned`] if the mapped
    /// pointer is not aligned for `T`, or the Vulkan error from `vkMapMemory`.
    pub fn map<T: bytemuck::Pod>(
        &mut self,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<MappedMemory<'_, T>, MemoryError> {
        debug_assert!(
            self.property_flags()
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
            "Trying to map memory that isn't HOST_VISIBLE"
        );
        check_map_span::<T>(offset, size, self.size)?;
        let ptr = unsafe {
            self.device
                .map_memory(self.handle, offset, size, vk::MemoryMapFlags::empty())
        }?;
        let ptr = match NonNull::new(ptr as *mut T) {
            Some(ptr) if ptr.is_aligned() => ptr,
            ptr => {
                unsafe { self.device.unmap_memory(self.handle) };
                return Err(match ptr {
                    Some(_) => MemoryError::Misaligned {
                        offset,
                        align: std::mem::align_of::<T>(),
                    },
                    None => vk::Result::ERROR_MEMORY_MAP_FAILED.into(),
                });
            }
        };
        Ok(MappedMemory {
            memory: self,
            ptr,
            len: size as usize / std::mem::size_of::<T>().max(1),
            _marker: PhantomData,
        })
    }
}

/// Checks that `[offset, offset + size)` lies within a block of `limit` bytes and
/// starts on a `T` boundary, assuming the block itself maps to an aligned address.
fn check_map_span<T>(
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    limit: vk::DeviceSize,
) -> Result<(), MemoryError> {
    if !offset
        .checked_add(size)
        .is_some_and(|end| end <= limit)
    {
        return Err(MemoryError::MapOutOfBounds {
            offset,
            size,
            limit,
        });
    }
    let align = std::mem::align_of::<T>();
    if !offset.is_multiple_of(align as vk::DeviceSize) {
        return Err(MemoryError::Misaligned { offset, align });
    }
    Ok(())
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        unsafe { self.device.free_memory(self.handle, None) }
    }
}

/// A host mapping of a [`DeviceMemory`] range, unmapped on drop.
///
/// Derefs to a slice of `T` covering the mapped bytes. Trailing bytes that do not
/// make up a whole `T` are not reachable through the slice.
pub struct MappedMemory<'a, T> {
    memory: &'a mut DeviceMemory,
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<T> MappedMemory<'_, T> {
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns the memory block this mapping belongs to.
    pub fn memory(&self) -> &DeviceMemory {
        self.memory
    }
}

impl<T> Deref for MappedMemory<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for MappedMemory<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> Drop for MappedMemory<'_, T> {
    fn drop(&mut self) {
        unsafe { self.memory.device.unmap_memory(self.memory.handle) }
    }
}
