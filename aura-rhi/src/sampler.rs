//! Sampler creation from a plain configuration value.

use ash::vk;
use aura_core::log;

use crate::driver::DeviceDriver;
use crate::error::{RhiError, RhiResult};
use crate::resource::Sampler;

/// Sampler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode: [vk::SamplerAddressMode; 3],
    pub mip_lod_bias: f32,
    /// `None` disables anisotropic filtering.
    pub max_anisotropy: Option<f32>,
    pub compare_op: Option<vk::CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: vk::BorderColor,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode: [vk::SamplerAddressMode::REPEAT; 3],
            mip_lod_bias: 0.0,
            max_anisotropy: None,
            compare_op: None,
            min_lod: 0.0,
            max_lod: vk::LOD_CLAMP_NONE,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        }
    }
}

impl SamplerConfig {
    pub fn linear() -> Self {
        Self::default()
    }

    /// Point filtering on every axis and between mips.
    pub fn nearest() -> Self {
        Self {
            mag_filter: vk::Filter::NEAREST,
            min_filter: vk::Filter::NEAREST,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            ..Default::default()
        }
    }

    /// Linear filtering with anisotropy; the level is clamped to the device limit at creation.
    pub fn anisotropic(max_anisotropy: f32) -> Self {
        Self {
            max_anisotropy: Some(max_anisotropy),
            ..Default::default()
        }
    }

    pub fn with_address_mode(mut self, mode: vk::SamplerAddressMode) -> Self {
        self.address_mode = [mode; 3];
        self
    }

    fn create_info(&self, device_limit: f32) -> vk::SamplerCreateInfo<'static> {
        let anisotropy = self.max_anisotropy.map(|level| level.clamp(1.0, device_limit.max(1.0)));

        vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .mipmap_mode(self.mipmap_mode)
            .address_mode_u(self.address_mode[0])
            .address_mode_v(self.address_mode[1])
            .address_mode_w(self.address_mode[2])
            .mip_lod_bias(self.mip_lod_bias)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .compare_enable(self.compare_op.is_some())
            .compare_op(self.compare_op.unwrap_or(vk::CompareOp::ALWAYS))
            .min_lod(self.min_lod)
            .max_lod(self.max_lod)
            .border_color(self.border_color)
            .unnormalized_coordinates(false)
    }
}

pub(crate) fn create_sampler(
    device: &dyn DeviceDriver,
    config: &SamplerConfig,
    limits: &vk::PhysicalDeviceLimits,
) -> RhiResult<Sampler> {
    let create_info = config.create_info(limits.max_sampler_anisotropy);

    device.create_sampler(&create_info).map(Sampler::new).map_err(|e| {
        log::error!("Failed to create sampler: {}", e);
        RhiError::SamplerCreationFailed(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anisotropy_is_clamped_to_the_device_limit() {
        let info = SamplerConfig::anisotropic(16.0).create_info(8.0);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 8.0);
    }

    #[test]
    fn linear_sampler_disables_anisotropy_and_compare() {
        let info = SamplerConfig::linear().create_info(16.0);
        assert_eq!(info.anisotropy_enable, vk::FALSE);
        assert_eq!(info.compare_enable, vk::FALSE);
        assert_eq!(info.mag_filter, vk::Filter::LINEAR);
    }

    #[test]
    fn address_mode_applies_to_all_axes() {
        let info = SamplerConfig::nearest()
            .with_address_mode(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .create_info(1.0);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.min_filter, vk::Filter::NEAREST);
    }
}
