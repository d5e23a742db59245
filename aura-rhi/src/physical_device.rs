//! Physical device enumeration, scoring and selection.

use std::ffi::CStr;

use ash::vk;
use aura_core::log;

use crate::driver::InstanceDriver;
use crate::error::{RhiError, RhiResult};

/// Device extensions every candidate must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Scoring weights for physical device selection.
const SCORE_DISCRETE_GPU: u32 = 1000;
const SCORE_INTEGRATED_GPU: u32 = 100;

/// Queue family slots the RHI needs. Slots may share the same index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
    pub compute_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some() && self.compute_family.is_some()
    }

    /// Scans the families once, keeping the first index found for each capability.
    ///
    /// `present_support` is queried per index, and only while no present family has been found.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut present_support: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if indices.graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics_family = Some(index);
            }

            if indices.compute_family.is_none() && family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                indices.compute_family = Some(index);
            }

            if indices.present_family.is_none() && present_support(index) {
                indices.present_family = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        indices
    }

    /// Distinct family indices in ascending order.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families: Vec<u32> = [self.graphics_family, self.present_family, self.compute_family]
            .into_iter()
            .flatten()
            .collect();
        families.sort_unstable();
        families.dedup();
        families
    }
}

/// Surface support of one physical device. Queried on demand, never cached.
#[derive(Debug, Clone, Default)]
pub struct SwapChainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainSupportDetails {
    pub fn query(
        instance: &dyn InstanceDriver,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, vk::Result> {
        Ok(Self {
            capabilities: instance.surface_capabilities(physical_device, surface)?,
            formats: instance.surface_formats(physical_device, surface)?,
            present_modes: instance.surface_present_modes(physical_device, surface)?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The selected physical device and what was learned about it during selection.
#[derive(Clone, Debug)]
pub struct PhysicalDevice {
    handle: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilyIndices,
}

impl PhysicalDevice {
    /// Get the physical device.
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Get the physical device properties.
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    /// Get the physical device memory properties.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Complete by construction.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn name(&self) -> String {
        device_name(&self.properties)
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "<unnamed>".to_owned())
}

/// Device type score; higher is preferred.
pub fn score_physical_device(properties: &vk::PhysicalDeviceProperties) -> u32 {
    match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => SCORE_DISCRETE_GPU,
        vk::PhysicalDeviceType::INTEGRATED_GPU => SCORE_INTEGRATED_GPU,
        _ => 0,
    }
}

/// Orders candidates by descending score. Ties keep enumeration order.
pub fn rank_by_score<T>(candidates: &mut [(u32, T)]) {
    candidates.sort_by(|(a, _), (b, _)| b.cmp(a));
}

fn check_device_extension_support(instance: &dyn InstanceDriver, physical_device: vk::PhysicalDevice) -> bool {
    let available = match instance.device_extension_properties(physical_device) {
        Ok(available) => available,
        Err(e) => {
            log::warn!("Failed to enumerate device extensions: {}", e);
            return false;
        }
    };

    REQUIRED_DEVICE_EXTENSIONS.iter().all(|&required| {
        available
            .iter()
            .any(|extension| extension.extension_name_as_c_str().is_ok_and(|name| name == required))
    })
}

/// Finds the queue families of `physical_device`, testing presentation against `surface`.
pub fn find_queue_families(
    instance: &dyn InstanceDriver,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> QueueFamilyIndices {
    let families = instance.queue_family_properties(physical_device);

    QueueFamilyIndices::find(&families, |index| {
        instance
            .surface_support(physical_device, index, surface)
            .unwrap_or_else(|e| {
                log::warn!("Surface support query failed for queue family {}: {}", index, e);
                false
            })
    })
}

/// Suitability test. Returns the complete queue family indices of a suitable device.
fn is_device_suitable(
    instance: &dyn InstanceDriver,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    features: &vk::PhysicalDeviceFeatures,
) -> Option<QueueFamilyIndices> {
    let indices = find_queue_families(instance, physical_device, surface);
    if !indices.is_complete() {
        log::debug!("Rejected: incomplete queue families {:?}", indices);
        return None;
    }

    if !check_device_extension_support(instance, physical_device) {
        log::debug!("Rejected: missing required device extensions");
        return None;
    }

    let swapchain_adequate = match SwapChainSupportDetails::query(instance, physical_device, surface) {
        Ok(support) => support.is_adequate(),
        Err(e) => {
            log::warn!("Swapchain support query failed: {}", e);
            false
        }
    };
    if !swapchain_adequate {
        log::debug!("Rejected: no surface formats or present modes");
        return None;
    }

    if features.sampler_anisotropy == vk::FALSE {
        log::debug!("Rejected: sampler anisotropy unsupported");
        return None;
    }

    Some(indices)
}

/// Select the best physical device: highest score first, first suitable wins.
#[profiling::function]
pub fn select_physical_device(instance: &dyn InstanceDriver, surface: vk::SurfaceKHR) -> RhiResult<PhysicalDevice> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(RhiError::PhysicalDeviceQueryFailed)?;

    if physical_devices.is_empty() {
        log::error!("No Vulkan-capable GPU found");
        return Err(RhiError::NoPhysicalDevice);
    }

    let mut candidates: Vec<(u32, vk::PhysicalDevice)> = physical_devices
        .into_iter()
        .map(|device| (score_physical_device(&instance.physical_device_properties(device)), device))
        .collect();
    rank_by_score(&mut candidates);

    for (score, device) in candidates {
        let properties = instance.physical_device_properties(device);
        let features = instance.physical_device_features(device);

        log::info!(
            "Found GPU: {} (score: {}, type: {:?})",
            device_name(&properties),
            score,
            properties.device_type
        );

        if let Some(queue_families) = is_device_suitable(instance, device, surface, &features) {
            let selected = PhysicalDevice {
                handle: device,
                properties,
                features,
                memory_properties: instance.physical_device_memory_properties(device),
                queue_families,
            };
            log::info!("Selected GPU: {} ({:?})", selected.name(), queue_families);
            return Ok(selected);
        }
    }

    log::error!("No suitable GPU found");
    Err(RhiError::NoSuitablePhysicalDevice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGpu, MockInstance};
    use ash::vk::Handle;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn queue_families_complete_on_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::find(&families, |_| true);
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn queue_families_pick_first_match_per_capability() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let indices = QueueFamilyIndices::find(&families, |index| index >= 2);
        assert_eq!(indices.graphics_family, Some(2));
        assert_eq!(indices.compute_family, Some(1));
        assert_eq!(indices.present_family, Some(2));
        assert_eq!(indices.unique_families(), vec![1, 2]);
    }

    #[test]
    fn queue_families_incomplete_without_present() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::find(&families, |_| false);
        assert!(!indices.is_complete());
        assert_eq!(indices.present_family, None);
    }

    #[test]
    fn queue_families_incomplete_without_compute() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let indices = QueueFamilyIndices::find(&families, |_| true);
        assert!(!indices.is_complete());
        assert_eq!(indices.graphics_family, Some(0));
    }

    #[test]
    fn present_query_stops_once_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        let indices = QueueFamilyIndices::find(&families, |index| {
            queried.push(index);
            true
        });
        assert!(indices.is_complete());
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn rank_keeps_enumeration_order_on_ties() {
        let mut candidates = vec![(100, 'a'), (1000, 'b'), (100, 'c'), (0, 'd')];
        rank_by_score(&mut candidates);
        let order: String = candidates.iter().map(|(_, c)| *c).collect();
        assert_eq!(order, "bacd");
    }

    #[test]
    fn discrete_gpu_wins_when_both_suitable() {
        let instance = MockInstance::new(vec![
            MockGpu::integrated(),
            MockGpu::discrete(),
        ]);
        let selected = select_physical_device(&instance, vk::SurfaceKHR::from_raw(1)).unwrap();
        assert_eq!(selected.properties().device_type, vk::PhysicalDeviceType::DISCRETE_GPU);
        assert!(selected.queue_families().is_complete());
    }

    #[test]
    fn integrated_gpu_selected_when_discrete_unsuitable() {
        let mut discrete = MockGpu::discrete();
        discrete.features.sampler_anisotropy = vk::FALSE;
        let instance = MockInstance::new(vec![discrete, MockGpu::integrated()]);
        let selected = select_physical_device(&instance, vk::SurfaceKHR::from_raw(1)).unwrap();
        assert_eq!(selected.properties().device_type, vk::PhysicalDeviceType::INTEGRATED_GPU);
    }

    #[test]
    fn missing_swapchain_extension_rejects_device() {
        let mut gpu = MockGpu::discrete();
        gpu.extensions.clear();
        let instance = MockInstance::new(vec![gpu]);
        let result = select_physical_device(&instance, vk::SurfaceKHR::from_raw(1));
        assert!(matches!(result, Err(RhiError::NoSuitablePhysicalDevice)));
    }

    #[test]
    fn empty_present_modes_reject_device() {
        let mut gpu = MockGpu::discrete();
        gpu.present_modes.clear();
        let instance = MockInstance::new(vec![gpu]);
        let result = select_physical_device(&instance, vk::SurfaceKHR::from_raw(1));
        assert!(matches!(result, Err(RhiError::NoSuitablePhysicalDevice)));
    }

    #[test]
    fn zero_devices_is_fatal() {
        let instance = MockInstance::new(Vec::new());
        let error = select_physical_device(&instance, vk::SurfaceKHR::from_raw(1)).unwrap_err();
        assert!(matches!(error, RhiError::NoPhysicalDevice));
        assert!(error.is_fatal());
    }

    #[test]
    fn scores_follow_device_type() {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = vk::PhysicalDeviceType::CPU;
        assert_eq!(score_physical_device(&properties), 0);
        properties.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        assert_eq!(score_physical_device(&properties), 100);
        properties.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        assert_eq!(score_physical_device(&properties), 1000);
    }
}
