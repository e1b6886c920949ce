//! Synchronization primitives.
//!
//! - [`Fence`]: device-to-host signal, waited on from the CPU.
//! - [`Semaphore`]: binary or timeline semaphore for queue-to-queue ordering. Timeline
//!   semaphores can also be signaled and waited on from the host.
//! - [`Event`]: fine-grained signal set and reset from the host or a command buffer.
//!
//! All of them are plain owned handles destroyed on drop. The caller must make sure
//! the device is no longer using a primitive before dropping it.

use std::{fmt::Debug, sync::atomic::AtomicU64, sync::atomic::Ordering};

use ash::{prelude::VkResult, vk};

use crate::{Device, HasDevice, utils::AsVkHandle};

/// A Vulkan fence.
pub struct Fence {
    device: Device,
    handle: vk::Fence,
}
impl Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Fence").field(&self.handle).finish()
    }
}

impl Fence {
    /// Creates a fence, optionally in the signaled state.
    pub fn new(device: Device, signaled: bool) -> VkResult<Self> {
        let info = vk::FenceCreateInfo {
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        let handle = unsafe { device.create_fence(&info, None) }?;
        Ok(Self { device, handle })
    }

    pub fn is_signaled(&self) -> VkResult<bool> {
        unsafe { self.device.get_fence_status(self.handle) }
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds have passed.
    pub fn wait(&self, timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[self.handle], true, timeout) }
    }

    pub fn reset(&self) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[self.handle]) }
    }
}
impl HasDevice for Fence {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for Fence {
    type Handle = vk::Fence;
    fn vk_handle(&self) -> vk::Fence {
        self.handle
    }
}
impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.handle, None) }
    }
}

/// A Vulkan semaphore, either binary or timeline.
///
/// For timeline semaphores, the last observed counter value is cached in an
/// [`AtomicU64`] so that waits on already-reached values skip the API call.
pub struct Semaphore {
    device: Device,
    handle: vk::Semaphore,
    /// Cached counter value. Always 0 for binary semaphores.
    value: AtomicU64,
    timeline: bool,
}
impl Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(if self.timeline {
            "TimelineSemaphore"
        } else {
            "BinarySemaphore"
        })
        .field(&self.handle)
        .finish()
    }
}

impl Semaphore {
    /// Creates a binary semaphore.
    pub fn new(device: Device) -> VkResult<Self> {
        let handle = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }?;
        Ok(Self {
            device,
            handle,
            value: AtomicU64::new(0),
            timeline: false,
        })
    }

    /// Creates a timeline semaphore with the given initial value.
    pub fn new_timeline(device: Device, initial_value: u64) -> VkResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let handle = unsafe { device.create_semaphore(&info, None) }?;
        Ok(Self {
            device,
            handle,
            value: AtomicU64::new(initial_value),
            timeline: true,
        })
    }

    pub fn is_timeline(&self) -> bool {
        self.timeline
    }

    /// Returns the current counter value (timeline semaphores only).
    ///
    /// Queries the device and updates the cached value.
    pub fn value(&self) -> VkResult<u64> {
        assert!(self.timeline, "binary semaphores have no counter");
        let new_value = unsafe { self.device.get_semaphore_counter_value(self.handle) }?;
        self.value.fetch_max(new_value, Ordering::Relaxed);
        Ok(new_value)
    }

    /// Signals the semaphore to `value` from the host (timeline semaphores only).
    ///
    /// No-op if the semaphore is already known to be at or past `value`.
    pub fn signal(&self, value: u64) -> VkResult<()> {
        assert!(self.timeline, "binary semaphores cannot be signaled from the host");
        if self.value.load(Ordering::Relaxed) >= value {
            return Ok(());
        }
        unsafe {
            self.device.signal_semaphore(&vk::SemaphoreSignalInfo {
                semaphore: self.handle,
                value,
                ..Default::default()
            })
        }?;
        self.value.fetch_max(value, Ordering::Relaxed);
        Ok(())
    }

    /// Blocks until the counter reaches `value` (timeline semaphores only).
    pub fn wait_blocked(&self, value: u64, timeout: u64) -> VkResult<()> {
        assert!(self.timeline, "binary semaphores cannot be waited on from the host");
        if self.value.load(Ordering::Relaxed) >= value {
            return Ok(());
        }
        unsafe {
            self.device.wait_semaphores(
                &vk::SemaphoreWaitInfo::default()
                    .semaphores(std::slice::from_ref(&self.handle))
                    .values(std::slice::from_ref(&value)),
                timeout,
            )
        }?;
        self.value.fetch_max(value, Ordering::Relaxed);
        Ok(())
    }
}
impl HasDevice for Semaphore {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for Semaphore {
    type Handle = vk::Semaphore;
    fn vk_handle(&self) -> vk::Semaphore {
        self.handle
    }
}
impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.handle, None) }
    }
}

/// A Vulkan event.
pub struct Event {
    device: Device,
    handle: vk::Event,
}
impl Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Event").field(&self.handle).finish()
    }
}

impl Event {
    /// Creates an event in the unsignaled state.
    pub fn new(device: Device) -> VkResult<Self> {
        let handle = unsafe { device.create_event(&vk::EventCreateInfo::default(), None) }?;
        Ok(Self { device, handle })
    }

    pub fn is_set(&self) -> VkResult<bool> {
        unsafe { self.device.get_event_status(self.handle) }
    }

    pub fn set(&self) -> VkResult<()> {
        unsafe { self.device.set_event(self.handle) }
    }

    pub fn reset(&self) -> VkResult<()> {
        unsafe { self.device.reset_event(self.handle) }
    }
}
impl HasDevice for Event {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for Event {
    type Handle = vk::Event;
    fn vk_handle(&self) -> vk::Event {
        self.handle
    }
}
impl Drop for Event {
    fn drop(&mut self) {
        unsafe { self.device.destroy_event(self.handle, None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_operations_take_shared_references() {
        let _: [fn(&Fence) -> VkResult<()>; 1] = [Fence::reset];
        let _: [fn(&Event) -> VkResult<()>; 2] = [Event::set, Event::reset];
        let _: fn(&Semaphore, u64) -> VkResult<()> = Semaphore::signal;
    }
}
