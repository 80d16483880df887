//! Shader modules compiled from WGSL at startup.
//!
//! Sources are parsed and validated with naga and translated to SPIR-V 1.3
//! for one entry point at a time; no offline shader build step is needed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vulkanisch_rhi::device::Device;
//! use vulkanisch_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>, source: &str) -> vulkanisch_rhi::RhiResult<()> {
//! let vs = Shader::from_wgsl(device, "fullscreen", source, ShaderStage::Vertex, "vs_main")?;
//! let _stage_info = vs.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Pipeline stage of an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Translate one WGSL entry point to SPIR-V words.
///
/// # Errors
///
/// [`RhiError::ShaderError`] naming `label` when parsing, validation or
/// SPIR-V generation fails, or the entry point does not exist for `stage`.
pub fn compile_wgsl(
    label: &str,
    source: &str,
    stage: ShaderStage,
    entry_point: &str,
) -> RhiResult<Vec<u32>> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        RhiError::ShaderError(format!("{label}: WGSL parse error: {}", e.emit_to_string(source)))
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| RhiError::ShaderError(format!("{label}: validation error: {e}")))?;

    let naga_stage = stage.to_naga();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == naga_stage)
    {
        return Err(RhiError::ShaderError(format!(
            "{label}: no {stage} entry point named '{entry_point}'"
        )));
    }

    let options = naga::back::spv::Options {
        lang_version: (1, 3),
        flags: naga::back::spv::WriterFlags::empty(),
        capabilities: None,
        bounds_check_policies: naga::proc::BoundsCheckPolicies::default(),
        binding_map: Default::default(),
        debug_info: None,
        zero_initialize_workgroup_memory: naga::back::spv::ZeroInitializeWorkgroupMemoryMode::None,
    };
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: naga_stage,
        entry_point: entry_point.to_string(),
    };

    naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .map_err(|e| RhiError::ShaderError(format!("{label}: SPIR-V generation error: {e}")))
}

/// A VkShaderModule holding one entry point.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    pub fn from_wgsl(
        device: Arc<Device>,
        label: &str,
        source: &str,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = compile_wgsl(label, source, stage, entry_point)?;
        let entry_point_cstring = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("{label}: invalid entry point: {e}")))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        debug!(
            "Created {} shader '{}' ({} words, entry '{}')",
            stage,
            label,
            code.len(),
            entry_point
        );
        Ok(Self {
            device,
            module,
            stage,
            entry_point: entry_point_cstring,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
    }
}
