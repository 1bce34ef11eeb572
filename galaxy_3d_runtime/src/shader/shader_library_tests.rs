//! Unit tests for ShaderLibrary

use super::*;
use std::path::PathBuf;
use crate::error::Error;

// ============================================================================
// Helpers
// ============================================================================

fn spirv(words: usize) -> Vec<u8> {
    let mut code = SPIRV_MAGIC.to_le_bytes().to_vec();
    code.resize(words * 4, 0);
    code
}

/// Fresh scratch directory under the system temp dir
fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("galaxy3d_shader_{}_{}", test, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// BLOBS
// ============================================================================

#[test]
fn test_from_spirv_accepts_valid_module() {
    let blob = ShaderBlob::from_spirv("triangle.vs", ShaderStage::Vertex, spirv(5)).unwrap();
    assert_eq!(blob.name(), "triangle.vs");
    assert_eq!(blob.stage(), ShaderStage::Vertex);
    assert_eq!(blob.code().len(), 20);
    assert_eq!(blob.entry_point(), "main");
}

#[test]
fn test_from_spirv_rejects_bad_input() {
    assert!(matches!(
        ShaderBlob::from_spirv("empty", ShaderStage::Pixel, vec![]),
        Err(Error::InvalidResource(_))
    ));
    assert!(ShaderBlob::from_spirv("odd", ShaderStage::Pixel, vec![3, 2, 35, 7, 0]).is_err());
    assert!(ShaderBlob::from_spirv("dxil", ShaderStage::Pixel, b"DXBC".to_vec()).is_err());
}

#[test]
fn test_classify_file_names() {
    assert_eq!(classify("triangle.vs.spv"), Some((ShaderStage::Vertex, "triangle.vs")));
    assert_eq!(classify("triangle.ps.spv"), Some((ShaderStage::Pixel, "triangle.ps")));
    assert_eq!(classify("triangle.cs.spv"), None);
    assert_eq!(classify("triangle.vs"), None);
}

// ============================================================================
// LIBRARY
// ============================================================================

#[test]
fn test_missing_shader_is_configuration_error() {
    let library = ShaderLibrary::new();
    assert!(matches!(library.get("triangle.vs"), Err(Error::Configuration(_))));
}

#[test]
fn test_insert_and_replace() {
    let mut library = ShaderLibrary::new();
    library.insert(ShaderBlob::new("quad.vs", ShaderStage::Vertex, spirv(2)));
    library.insert(ShaderBlob::new("quad.vs", ShaderStage::Vertex, spirv(8)));

    assert_eq!(library.len(), 1);
    assert_eq!(library.get("quad.vs").unwrap().code().len(), 32);
}

#[test]
fn test_load_dir() {
    let dir = scratch_dir("load_dir");
    std::fs::write(dir.join("triangle.vs.spv"), spirv(4)).unwrap();
    std::fs::write(dir.join("triangle.ps.spv"), spirv(4)).unwrap();
    std::fs::write(dir.join("readme.txt"), b"not a shader").unwrap();

    let mut library = ShaderLibrary::new();
    assert_eq!(library.load_dir(&dir).unwrap(), 2);
    assert_eq!(library.names(), vec!["triangle.ps", "triangle.vs"]);
    assert_eq!(library.get("triangle.ps").unwrap().stage(), ShaderStage::Pixel);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_load_dir_rejects_corrupt_shader() {
    let dir = scratch_dir("corrupt");
    std::fs::write(dir.join("broken.vs.spv"), b"abc").unwrap();

    let mut library = ShaderLibrary::new();
    assert!(library.load_dir(&dir).is_err());
    assert!(library.is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_load_missing_dir() {
    let mut library = ShaderLibrary::new();
    let result = library.load_dir("/nonexistent/galaxy3d/shaders");
    assert!(matches!(result, Err(Error::Configuration(_))));
}
