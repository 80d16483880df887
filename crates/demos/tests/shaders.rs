//! Every WGSL entry point the demos build pipelines from compiles to SPIR-V.

use rstest::rstest;
use vulkanisch_demos::{bloom, hello_cube, post, shadowed, texturing};
use vulkanisch_rhi::shader::{ShaderStage, compile_wgsl};

const SCENE: &str = include_str!("../shaders/scene.wgsl");

#[rstest]
#[case::cube_vertex("hello cube", hello_cube::SHADER, ShaderStage::Vertex, "vs_main")]
#[case::cube_fragment("hello cube", hello_cube::SHADER, ShaderStage::Fragment, "fs_main")]
#[case::textured_vertex("textured", texturing::SHADER, ShaderStage::Vertex, "vs_main")]
#[case::textured_fragment("textured", texturing::SHADER, ShaderStage::Fragment, "fs_main")]
#[case::hdr_cube_vertex("hdr cube", bloom::SHADER, ShaderStage::Vertex, "vs_main")]
#[case::hdr_cube_fragment("hdr cube", bloom::SHADER, ShaderStage::Fragment, "fs_main")]
#[case::shadow_caster("shadowed", shadowed::SHADER, ShaderStage::Vertex, "vs_shadow")]
#[case::shadowed_vertex("shadowed", shadowed::SHADER, ShaderStage::Vertex, "vs_main")]
#[case::shadowed_fragment("shadowed", shadowed::SHADER, ShaderStage::Fragment, "fs_main")]
#[case::fullscreen("post", post::SHADER, ShaderStage::Vertex, "vs_fullscreen")]
#[case::threshold("post", post::SHADER, ShaderStage::Fragment, "fs_threshold")]
#[case::blur_horizontal("post", post::SHADER, ShaderStage::Fragment, "fs_blur_horizontal")]
#[case::blur_vertical("post", post::SHADER, ShaderStage::Fragment, "fs_blur_vertical")]
#[case::tonemap("post", post::SHADER, ShaderStage::Fragment, "fs_tonemap")]
fn test_entry_point_compiles(
    #[case] label: &str,
    #[case] source: &str,
    #[case] stage: ShaderStage,
    #[case] entry_point: &str,
) {
    let words = compile_wgsl(label, source, stage, entry_point)
        .unwrap_or_else(|err| panic!("{label}/{entry_point}: {err}"));
    // SPIR-V magic number
    assert_eq!(words.first(), Some(&0x0723_0203));
}

#[test]
fn test_scene_prelude_validates_alone() {
    let module = naga::front::wgsl::parse_str(SCENE).unwrap();
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .unwrap();
    assert!(module.entry_points.is_empty());
}

#[test]
fn test_stage_mismatch_is_reported() {
    let err = compile_wgsl("shadowed", shadowed::SHADER, ShaderStage::Fragment, "vs_shadow")
        .unwrap_err();
    assert!(err.to_string().contains("vs_shadow"));
}
