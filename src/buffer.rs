//! Vulkan buffer and buffer view wrappers.
//!
//! A [`Buffer`] owns a `vk::Buffer` and nothing else: memory is allocated separately
//! as a [`DeviceMemory`] and attached with [`Buffer::bind_memory`]. Applications that
//! need many small buffers should sub-allocate from a
//! [`DynamicBuffer`](crate::dynamic_buffer::DynamicBuffer) instead of creating one
//! buffer per object.

use std::fmt::Debug;

use ash::{prelude::VkResult, vk};

use crate::{Device, HasDevice, memory::DeviceMemory, utils::AsVkHandle, utils::SharingMode};

/// An owned Vulkan buffer.
pub struct Buffer {
    device: Device,
    handle: vk::Buffer,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
}
impl HasDevice for Buffer {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}
impl AsVkHandle for Buffer {
    type Handle = vk::Buffer;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

impl Buffer {
    /// Creates a buffer of `size` bytes. The buffer has no memory bound yet.
    pub fn new<T>(
        device: Device,
        flags: vk::BufferCreateFlags,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        sharing: &SharingMode<T>,
    ) -> VkResult<Self>
    where
        T: std::ops::Deref<Target = [u32]>,
    {
        let info = vk::BufferCreateInfo::default()
            .flags(flags)
            .size(size)
            .usage(usage)
            .sharing_mode(sharing.as_raw())
            .queue_family_indices(sharing.queue_family_indices());
        let handle = unsafe { device.create_buffer(&info, None) }?;
        Ok(Self {
            device,
            handle,
            size,
            usage,
        })
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Returns the size, alignment and compatible memory types the buffer needs.
    pub fn memory_requirements(&self) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(self.handle) }
    }

    /// Binds `memory` to this buffer at `offset`.
    ///
    /// A buffer can be bound only once. The caller must keep `memory` alive for as long
    /// as the buffer is used by the device.
    pub fn bind_memory(&mut self, memory: &DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        debug_assert_eq!(self.device, *memory.device());
        unsafe {
            self.device
                .bind_buffer_memory(self.handle, memory.vk_handle(), offset)
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_buffer(self.handle, None) }
    }
}

/// A typed view into a region of a [`Buffer`], used for texel buffers.
pub struct BufferView {
    device: Device,
    handle: vk::BufferView,
    format: vk::Format,
}
impl Debug for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .finish()
    }
}
impl HasDevice for BufferView {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for BufferView {
    type Handle = vk::BufferView;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

impl BufferView {
    /// Creates a view of `range` bytes of `buffer` starting at `offset`.
    pub fn new(
        buffer: &Buffer,
        format: vk::Format,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> VkResult<Self> {
        let device = buffer.device().clone();
        let info = vk::BufferViewCreateInfo::default()
            .buffer(buffer.vk_handle())
            .format(format)
            .offset(offset)
            .range(range);
        let handle = unsafe { device.create_buffer_view(&info, None) }?;
        Ok(Self {
            device,
            handle,
            format,
        })
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        unsafe { self.device.destroy_buffer_view(self.handle, None) }
    }
}
