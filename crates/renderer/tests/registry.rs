//! Renderer registry lookups.

mod common;

use common::{MockBackend, ScriptedRenderer, new_log, single_pass_graph};
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::{HostedRenderer, Registry};

fn scripted() -> Result<Box<dyn HostedRenderer<MockBackend>>> {
    Ok(Box::new(ScriptedRenderer::new(single_pass_graph(), new_log())))
}

fn broken() -> Result<Box<dyn HostedRenderer<MockBackend>>> {
    Err(Error::resource("shader failed to compile"))
}

#[test]
fn test_create_registered_renderer() {
    let mut registry = Registry::<MockBackend>::new();
    registry.register("HelloCube", scripted);
    let renderer = registry.create("HelloCube").unwrap();
    assert_eq!(renderer.render_graph().passes().len(), 1);
}

#[test]
fn test_unknown_name_is_configuration_failure() {
    let mut registry = Registry::<MockBackend>::new();
    registry.register("HelloCube", scripted);
    let err = registry.create("Missing").err().unwrap();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("Missing"));
}

#[test]
fn test_names_are_sorted() {
    let mut registry = Registry::<MockBackend>::new();
    registry.register("ShadowMap", scripted);
    registry.register("Bloom", scripted);
    registry.register("HelloCube", scripted);
    let names: Vec<_> = registry.names().collect();
    assert_eq!(names, ["Bloom", "HelloCube", "ShadowMap"]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_factory_errors_propagate() {
    let mut registry = Registry::<MockBackend>::new();
    registry.register("Broken", broken);
    assert!(registry.contains("Broken"));
    assert!(matches!(
        registry.create("Broken").err(),
        Some(Error::ResourceCreation(_))
    ));
}
