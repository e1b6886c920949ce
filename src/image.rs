//! Image and image view wrappers.
//!
//! Like [`Buffer`](crate::buffer::Buffer), an [`Image`] owns only its `vk::Image`;
//! memory is allocated as a [`DeviceMemory`] and attached with [`Image::bind_memory`].

use std::fmt::Debug;

use ash::{prelude::VkResult, vk};
use glam::{UVec2, UVec3};

use crate::{Device, HasDevice, memory::DeviceMemory, utils::AsVkHandle, utils::SharingMode};

/// Common interface for Vulkan image types.
pub trait ImageLike: AsVkHandle<Handle = vk::Image> {
    /// Returns the image aspect flags based on the image format.
    fn aspects(&self) -> vk::ImageAspectFlags {
        format_aspects(self.format())
    }

    /// Returns the number of array layers in the image.
    fn array_layer_count(&self) -> u32;

    /// Returns the number of mip levels in the image.
    fn mip_level_count(&self) -> u32;

    /// Returns the image extent as a 3D vector (width, height, depth).
    fn extent(&self) -> UVec3;

    /// Returns the image format.
    fn format(&self) -> vk::Format;

    /// Returns the image type (1D, 2D, or 3D).
    fn ty(&self) -> vk::ImageType;
}

/// Common interface for Vulkan image view types.
pub trait ImageViewLike: AsVkHandle<Handle = vk::ImageView> {
    /// Returns the image view type (1D, 2D, 3D, Cube, etc.).
    fn ty(&self) -> vk::ImageViewType;

    /// Returns the number of array layers visible through this view.
    fn array_layer_count(&self) -> u32;

    /// Returns the number of mip levels visible through this view.
    fn mip_level_count(&self) -> u32;
}

/// Returns the aspects an image of `format` has.
pub fn format_aspects(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::G8_B8_R8_3PLANE_420_UNORM
        | vk::Format::G8_B8_R8_3PLANE_422_UNORM
        | vk::Format::G8_B8_R8_3PLANE_444_UNORM
        | vk::Format::G16_B16_R16_3PLANE_420_UNORM
        | vk::Format::G16_B16_R16_3PLANE_422_UNORM
        | vk::Format::G16_B16_R16_3PLANE_444_UNORM => {
            vk::ImageAspectFlags::PLANE_0
                | vk::ImageAspectFlags::PLANE_1
                | vk::ImageAspectFlags::PLANE_2
        }
        vk::Format::G8_B8R8_2PLANE_420_UNORM
        | vk::Format::G8_B8R8_2PLANE_422_UNORM
        | vk::Format::G8_B8R8_2PLANE_444_UNORM
        | vk::Format::G16_B16R16_2PLANE_420_UNORM
        | vk::Format::G16_B16R16_2PLANE_422_UNORM
        | vk::Format::G16_B16R16_2PLANE_444_UNORM => {
            vk::ImageAspectFlags::PLANE_0 | vk::ImageAspectFlags::PLANE_1
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// An owned Vulkan image.
pub struct Image {
    device: Device,
    handle: vk::Image,
    extent: UVec3,
    array_layer_count: u32,
    mip_level_count: u32,
    format: vk::Format,
    ty: vk::ImageType,
}
impl Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("handle", &self.handle)
            .field("extent", &self.extent)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
impl Drop for Image {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image(self.handle, None) }
    }
}
impl HasDevice for Image {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for Image {
    type Handle = vk::Image;
    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

impl Image {
    /// Creates an image. The image has no memory bound yet.
    pub fn new(device: Device, info: &vk::ImageCreateInfo) -> VkResult<Self> {
        let handle = unsafe { device.create_image(info, None) }?;
        Ok(Self {
            device,
            handle,
            extent: UVec3::new(info.extent.width, info.extent.height, info.extent.depth),
            array_layer_count: info.array_layers,
            mip_level_count: info.mip_levels,
            format: info.format,
            ty: info.image_type,
        })
    }

    /// Creates a single-layer, single-mip 2D image.
    pub fn new_2d<T>(
        device: Device,
        format: vk::Format,
        extent: UVec2,
        usage: vk::ImageUsageFlags,
        tiling: vk::ImageTiling,
        sharing: &SharingMode<T>,
    ) -> VkResult<Self>
    where
        T: std::ops::Deref<Target = [u32]>,
    {
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.x,
                height: extent.y,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(tiling)
            .usage(usage)
            .sharing_mode(sharing.as_raw())
            .queue_family_indices(sharing.queue_family_indices())
            .initial_layout(vk::ImageLayout::UNDEFINED);
        Self::new(device, &info)
    }

    /// Returns the size, alignment and compatible memory types the image needs.
    pub fn memory_requirements(&self) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(self.handle) }
    }

    /// Binds `memory` to this image at `offset`.
    ///
    /// The caller must keep `memory` alive for as long as the image is used by the device.
    pub fn bind_memory(&mut self, memory: &DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe {
            self.device
                .bind_image_memory(self.handle, memory.vk_handle(), offset)
        }
    }
}

impl ImageLike for Image {
    fn extent(&self) -> UVec3 {
        self.extent
    }
    fn format(&self) -> vk::Format {
        self.format
    }
    fn array_layer_count(&self) -> u32 {
        self.array_layer_count
    }
    fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }
    fn ty(&self) -> vk::ImageType {
        self.ty
    }
}

/// An owned Vulkan image view.
///
/// The view does not keep its image alive; the caller must drop the view first.
pub struct ImageView {
    device: Device,
    handle: vk::ImageView,
    ty: vk::ImageViewType,
    array_layer_count: u32,
    mip_level_count: u32,
}
impl Debug for ImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageView")
            .field("handle", &self.handle)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}
impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image_view(self.handle, None) }
    }
}
impl HasDevice for ImageView {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl AsVkHandle for ImageView {
    type Handle = vk::ImageView;
    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl ImageViewLike for ImageView {
    fn ty(&self) -> vk::ImageViewType {
        self.ty
    }
    fn array_layer_count(&self) -> u32 {
        self.array_layer_count
    }
    fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }
}

impl ImageView {
    pub fn new(device: Device, info: &vk::ImageViewCreateInfo) -> VkResult<Self> {
        let handle = unsafe { device.create_image_view(info, None) }?;
        Ok(Self {
            device,
            handle,
            ty: info.view_type,
            array_layer_count: info.subresource_range.layer_count,
            mip_level_count: info.subresource_range.level_count,
        })
    }

    /// Creates a view covering every mip level and array layer of `image`.
    pub fn full<T: ImageLike + HasDevice>(image: &T) -> VkResult<Self> {
        let view_type = match image.ty() {
            vk::ImageType::TYPE_1D => vk::ImageViewType::TYPE_1D,
            vk::ImageType::TYPE_2D => vk::ImageViewType::TYPE_2D,
            vk::ImageType::TYPE_3D => vk::ImageViewType::TYPE_3D,
            _ => unreachable!(),
        };
        let info = vk::ImageViewCreateInfo {
            image: image.vk_handle(),
            view_type,
            format: image.format(),
            components: vk::ComponentMapping::default(),
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: image.aspects(),
                base_mip_level: 0,
                base_array_layer: 0,
                level_count: image.mip_level_count(),
                layer_count: image.array_layer_count(),
            },
            ..Default::default()
        };
        Self::new(image.device().clone(), &info)
    }
}
