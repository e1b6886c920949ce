//! Physical device memory properties.
//!
//! This module caches the memory types and heaps reported by a physical device and
//! answers the one question every allocation path asks: which memory type index can
//! back an object with a given size, property flags and compatible-type mask.

use ash::vk;

/// Memory types and heaps of a physical device, queried once at device creation.
#[derive(Clone)]
pub struct MemoryProperties {
    inner: vk::PhysicalDeviceMemoryProperties,
}

impl std::fmt::Debug for MemoryProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProperties")
            .field("memory_types", &self.memory_types())
            .field("memory_heaps", &self.memory_heaps())
            .finish()
    }
}

impl MemoryProperties {
    /// Queries the memory properties of `pdevice`.
    ///
    /// # Safety
    /// `pdevice` must be a valid physical device enumerated from `instance`.
    pub unsafe fn query(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> Self {
        let inner = unsafe { instance.get_physical_device_memory_properties(pdevice) };
        Self { inner }
    }

    /// Builds memory properties from explicit type and heap lists.
    ///
    /// # Panics
    /// Panics if there are more types or heaps than Vulkan can report.
    pub fn from_parts(memory_types: &[vk::MemoryType], memory_heaps: &[vk::MemoryHeap]) -> Self {
        let mut inner = vk::PhysicalDeviceMemoryProperties::default();
        assert!(memory_types.len() <= vk::MAX_MEMORY_TYPES);
        assert!(memory_heaps.len() <= vk::MAX_MEMORY_HEAPS);
        inner.memory_types[..memory_types.len()].copy_from_slice(memory_types);
        inner.memory_heaps[..memory_heaps.len()].copy_from_slice(memory_heaps);
        inner.memory_type_count = memory_types.len() as u32;
        inner.memory_heap_count = memory_heaps.len() as u32;
        Self { inner }
    }

    /// Returns the available memory types.
    pub fn memory_types(&self) -> &[vk::MemoryType] {
        &self.inner.memory_types[0..self.inner.memory_type_count as usize]
    }

    /// Returns the available memory heaps.
    pub fn memory_heaps(&self) -> &[vk::MemoryHeap] {
        &self.inner.memory_heaps[0..self.inner.memory_heap_count as usize]
    }

    /// Selects the first memory type that can back an allocation of `size` bytes.
    ///
    /// A memory type qualifies when its bit is set in `type_bits` (usually
    /// [`vk::MemoryRequirements::memory_type_bits`]), its property flags contain every
    /// flag in `flags`, and its heap is at least `size` bytes large. Types are scanned
    /// in ascending index order, which is the driver's preference order.
    ///
    /// Returns `None` if no memory type qualifies.
    pub fn select_memory_type(
        &self,
        size: vk::DeviceSize,
        flags: vk::MemoryPropertyFlags,
        type_bits: u32,
    ) -> Option<u32> {
        let heaps = self.memory_heaps();
        self.memory_types()
            .iter()
            .enumerate()
            .filter(|(i, _)| type_bits & (1u32 << *i) != 0)
            .filter(|(_, mt)| mt.property_flags.contains(flags))
            .find(|(_, mt)| {
                heaps
                    .get(mt.heap_index as usize)
                    .is_some_and(|heap| heap.size >= size)
            })
            .map(|(i, _)| i as u32)
    }

    /// Returns the property flags of the memory type at `index`.
    pub fn property_flags(&self, index: u32) -> vk::MemoryPropertyFlags {
        self.memory_types()[index as usize].property_flags
    }
}
