use crate::{Device, HasDevice, utils::AsVkHandle};
use ash::{prelude::VkResult, vk};
use std::fmt::Debug;

/// An owned Vulkan sampler.
///
/// Samplers control how image data is read in shaders: filtering, address mode,
/// mipmap selection and border color. They are immutable after creation.
pub struct Sampler {
    device: Device,
    handle: vk::Sampler,
}
impl Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.handle.fmt(f)
    }
}
impl HasDevice for Sampler {
    fn device(&self) -> &Device {
        &self.device
    }
}

impl Sampler {
    /// Creates a new sampler.
    pub fn new(device: Device, info: &vk::SamplerCreateInfo) -> VkResult<Self> {
        let handle = unsafe { device.create_sampler(info, None) }?;
        Ok(Self { device, handle })
    }

    /// Creates a trilinear sampler with the same address mode on every axis.
    pub fn linear(device: Device, address_mode: vk::SamplerAddressMode) -> VkResult<Self> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(vk::LOD_CLAMP_NONE);
        Self::new(device, &info)
    }
}

impl AsVkHandle for Sampler {
    type Handle = vk::Sampler;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.handle, None) }
    }
}
