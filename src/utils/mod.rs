use ash::vk;
use std::ops::Deref;

/// Sharing mode of a buffer or image across queue families.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SharingMode<T>
where
    T: Deref<Target = [u32]>,
{
    #[default]
    Exclusive,
    Concurrent { queue_family_indices: T },
}

impl<T: Deref<Target = [u32]>> SharingMode<T> {
    pub fn as_raw(&self) -> vk::SharingMode {
        match self {
            Self::Exclusive => vk::SharingMode::EXCLUSIVE,
            Self::Concurrent { .. } => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent {
                queue_family_indices,
            } => queue_family_indices.deref(),
        }
    }
}

impl From<Option<Vec<u32>>> for SharingMode<Vec<u32>> {
    /// An explicit queue family list means the resource is shared across those families.
    fn from(queue_families: Option<Vec<u32>>) -> Self {
        match queue_families {
            Some(queue_family_indices) => Self::Concurrent {
                queue_family_indices,
            },
            None => Self::Exclusive,
        }
    }
}

/// Types that wrap a raw Vulkan handle.
pub trait AsVkHandle {
    type Handle: vk::Handle + Copy;
    fn vk_handle(&self) -> Self::Handle;
}
impl<T> AsVkHandle for &'_ T
where
    T: AsVkHandle,
{
    type Handle = T::Handle;
    fn vk_handle(&self) -> Self::Handle {
        (*self).vk_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_has_no_families() {
        let mode: SharingMode<Vec<u32>> = SharingMode::Exclusive;
        assert_eq!(mode.as_raw(), vk::SharingMode::EXCLUSIVE);
        assert!(mode.queue_family_indices().is_empty());
    }

    #[test]
    fn explicit_family_list_is_concurrent() {
        let mode = SharingMode::from(Some(vec![0, 2]));
        assert_eq!(mode.as_raw(), vk::SharingMode::CONCURRENT);
        assert_eq!(mode.queue_family_indices(), &[0, 2]);

        assert_eq!(SharingMode::from(None), SharingMode::<Vec<u32>>::Exclusive);
    }
}
