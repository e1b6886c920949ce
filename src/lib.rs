//! # Magma
//!
//! Lightweight ownership wrappers over Vulkan objects, and a growable buffer
//! sub-allocator built on them.
//!
//! Every wrapper owns exactly one Vulkan handle, keeps a clone of the [`Device`] it
//! was created from, and destroys the handle when dropped. Creation parameters are
//! the usual `vk::*CreateInfo` structs from [`ash`], and failures are returned as
//! [`ash::vk::Result`] codes.
//!
//! ## Overview
//!
//! ### Device
//!
//! Magma does not create instances or devices. Adopt an [`ash::Device`] with
//! [`Device::from_raw`]; the device is destroyed once the last resource created
//! from it is gone.
//!
//! ```no_run
//! # fn run(instance: &ash::Instance, pdevice: ash::vk::PhysicalDevice, raw: ash::Device) {
//! let device = unsafe { magma::Device::from_raw(instance, pdevice, raw) };
//! # let _ = device;
//! # }
//! ```
//!
//! ### Resources
//!
//! - [`Buffer`](buffer::Buffer) and [`BufferView`](buffer::BufferView)
//! - [`Image`](image::Image) and [`ImageView`](image::ImageView)
//! - [`Sampler`]
//! - [`DeviceMemory`](memory::DeviceMemory), with scoped host mapping through
//!   [`MappedMemory`](memory::MappedMemory)
//! - [`Fence`](sync::Fence), [`Semaphore`](sync::Semaphore) and [`Event`](sync::Event)
//!
//! Buffers and images are created without memory. Allocate a
//! [`DeviceMemory`](memory::DeviceMemory) of a suitable type and bind it:
//!
//! ```no_run
//! # use magma::{Device, ash::vk, buffer::Buffer, memory::{DeviceMemory, MemoryError}, utils::SharingMode};
//! # fn run(device: Device) -> Result<(), MemoryError> {
//! let mut buffer = Buffer::new(
//!     device.clone(),
//!     vk::BufferCreateFlags::empty(),
//!     4096,
//!     vk::BufferUsageFlags::UNIFORM_BUFFER,
//!     &SharingMode::<Vec<u32>>::Exclusive,
//! )?;
//! let requirements = buffer.memory_requirements();
//! let memory = DeviceMemory::select_and_allocate(
//!     device,
//!     requirements.size,
//!     vk::MemoryPropertyFlags::HOST_VISIBLE,
//!     requirements.memory_type_bits,
//! )?;
//! buffer.bind_memory(&memory, 0)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Sub-allocation
//!
//! [`DynamicBuffer`](dynamic_buffer::DynamicBuffer) hands out byte ranges from a
//! growing set of buffers, so that many small objects can share a few large
//! allocations.
//!
//! ## Logging
//!
//! Magma logs through [`tracing`]: chunk growth at `info`, fallback paths at `warn`,
//! and chunk reclamation at `debug`. Install any subscriber to see them.

pub mod buffer;
pub mod device;
pub mod dynamic_buffer;
pub mod image;
pub mod memory;
pub mod physical_device;
mod sampler;
pub mod sync;
pub mod utils;

pub use device::{Device, HasDevice};
pub use sampler::Sampler;

pub use ash;

pub mod prelude {
    pub use crate::{
        Device, HasDevice, Sampler, ash,
        ash::vk,
        buffer::{Buffer, BufferView},
        dynamic_buffer::{DynamicBuffer, DynamicBufferInfo, RangeId},
        image::{Image, ImageLike, ImageView, ImageViewLike},
        memory::{DeviceMemory, MappedMemory, MemoryError},
        sync::{Event, Fence, Semaphore},
        utils::{AsVkHandle, SharingMode},
    };
}
