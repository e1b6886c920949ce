//! Logical device handle.
//!
//! This module provides the core [`Device`] type and the [`HasDevice`] trait.
//!
//! # Overview
//!
//! A Vulkan logical device represents a connection to the driver of a physical GPU
//! with a specific configuration of extensions, features and queues. Creating one is
//! left to the application (or to a bootstrap library); magma adopts an existing
//! [`ash::Device`] through [`Device::from_raw`] and takes over its lifetime.
//!
//! Every resource wrapper in this crate stores its own clone of [`Device`]. Cloning is
//! a reference count increment, and the logical device is destroyed only after the
//! last resource created from it has been dropped.

use crate::{physical_device::MemoryProperties, utils::AsVkHandle};
use ash::vk;

use std::{fmt::Debug, ops::Deref, sync::Arc};

/// A trait for types created from a Vulkan device.
pub trait HasDevice {
    /// Returns a reference to the Vulkan device.
    fn device(&self) -> &Device;
}

/// A Vulkan logical device wrapper.
///
/// This struct is reference-counted using [`Arc`] for cheap shared access. It derefs
/// to [`ash::Device`], so any device-level Vulkan command can be called directly.
#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);
impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Device {}
impl Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Device")
            .field(&self.0.device.handle())
            .finish()
    }
}

struct DeviceInner {
    physical_device: vk::PhysicalDevice,
    /// Memory types and heaps of `physical_device`, used for memory type selection
    memory_properties: MemoryProperties,
    device: ash::Device,
}
unsafe impl Send for DeviceInner {}
unsafe impl Sync for DeviceInner {}

impl Device {
    /// Adopts a logical device created elsewhere.
    ///
    /// The memory properties of `physical_device` are queried once here and cached
    /// for the lifetime of the device.
    ///
    /// # Safety
    /// - `device` must have been created from `physical_device`, which must have been
    ///   enumerated from `instance`.
    /// - Ownership of `device` moves into the returned handle: it is destroyed when
    ///   the last clone is dropped, and must not be destroyed by the caller.
    /// - `instance` must outlive the returned handle and all its clones.
    pub unsafe fn from_raw(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
    ) -> Self {
        let memory_properties = unsafe { MemoryProperties::query(instance, physical_device) };
        Self(Arc::new(DeviceInner {
            physical_device,
            memory_properties,
            device,
        }))
    }

    /// Returns the raw physical device this logical device was created from.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.0.physical_device
    }

    /// Returns the cached memory properties of the physical device.
    pub fn memory_properties(&self) -> &MemoryProperties {
        &self.0.memory_properties
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.0.device
    }
}
impl AsVkHandle for Device {
    type Handle = vk::Device;

    fn vk_handle(&self) -> Self::Handle {
        self.0.device.handle()
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        tracing::info!(device = ?self.device.handle(), "drop device");
        // Every resource holds a Device clone, so none of them can outlive this point.
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
