/// Shader library - compiled shader bytecode keyed by name
///
/// Bytecode is loaded from `*.vs.spv` (vertex) and `*.ps.spv` (pixel) files.
/// A shader is named after its file without the `.spv` extension, so
/// `shaders/triangle.vs.spv` is looked up as `"triangle.vs"`.

use std::path::Path;
use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::ShaderStage;
use crate::{engine_bail_warn, engine_debug, engine_info, engine_warn};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Compiled shader bytecode for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBlob {
    name: String,
    stage: ShaderStage,
    code: Vec<u8>,
    entry_point: String,
}

impl ShaderBlob {
    /// Wrap bytecode as is (entry point `main`)
    pub fn new(name: &str, stage: ShaderStage, code: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            stage,
            code,
            entry_point: "main".to_string(),
        }
    }

    /// Wrap SPIR-V bytecode, checking its size and magic number
    pub fn from_spirv(name: &str, stage: ShaderStage, code: Vec<u8>) -> Result<Self> {
        if code.len() < 4 || code.len() % 4 != 0 {
            engine_bail_warn!(InvalidResource; "galaxy3d::ShaderLibrary",
                "Shader '{}': {} bytes is not a whole number of SPIR-V words", name, code.len());
        }
        let magic = u32::from_le_bytes([code[0], code[1], code[2], code[3]]);
        if magic != SPIRV_MAGIC {
            engine_bail_warn!(InvalidResource; "galaxy3d::ShaderLibrary",
                "Shader '{}' is not SPIR-V (magic {:#010x})", name, magic);
        }
        Ok(Self::new(name, stage, code))
    }

    pub fn with_entry_point(mut self, entry_point: &str) -> Self {
        self.entry_point = entry_point.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Stage and shader name for a bytecode file name
fn classify(file_name: &str) -> Option<(ShaderStage, &str)> {
    let name = file_name.strip_suffix(".spv")?;
    if name.ends_with(".vs") {
        Some((ShaderStage::Vertex, name))
    } else if name.ends_with(".ps") {
        Some((ShaderStage::Pixel, name))
    } else {
        None
    }
}

#[derive(Default)]
pub struct ShaderLibrary {
    shaders: FxHashMap<String, Arc<ShaderBlob>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.vs.spv` / `*.ps.spv` file of `dir`
    ///
    /// Other files are ignored. Returns the number of shaders loaded.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                engine_bail_warn!(Configuration; "galaxy3d::ShaderLibrary",
                    "Cannot read shader directory '{}': {}", dir.display(), err);
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let is_shader = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| classify(n).is_some());
            if is_shader {
                self.load_file(&path)?;
                loaded += 1;
            }
        }

        engine_info!("galaxy3d::ShaderLibrary", "Loaded {} shader(s) from '{}'", loaded, dir.display());
        Ok(loaded)
    }

    /// Load one bytecode file, its stage taken from the `.vs.spv` / `.ps.spv` suffix
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Arc<ShaderBlob>> {
        let path = path.as_ref();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let Some((stage, name)) = classify(file_name) else {
            engine_bail_warn!(Configuration; "galaxy3d::ShaderLibrary",
                "'{}' is neither a .vs.spv nor a .ps.spv file", path.display());
        };

        let code = match std::fs::read(path) {
            Ok(code) => code,
            Err(err) => {
                engine_bail_warn!(Configuration; "galaxy3d::ShaderLibrary",
                    "Cannot read shader '{}': {}", path.display(), err);
            }
        };

        let blob = ShaderBlob::from_spirv(name, stage, code)?;
        engine_debug!("galaxy3d::ShaderLibrary", "Loaded {:?} shader '{}'", stage, name);
        Ok(self.insert(blob))
    }

    /// Add a shader, replacing any shader of the same name
    pub fn insert(&mut self, blob: ShaderBlob) -> Arc<ShaderBlob> {
        let blob = Arc::new(blob);
        if self.shaders.insert(blob.name().to_string(), Arc::clone(&blob)).is_some() {
            engine_warn!("galaxy3d::ShaderLibrary", "Shader '{}' replaced", blob.name());
        }
        blob
    }

    /// Shader named `name`, `Error::Configuration` when missing
    pub fn get(&self, name: &str) -> Result<Arc<ShaderBlob>> {
        match self.shaders.get(name) {
            Some(blob) => Ok(Arc::clone(blob)),
            None => {
                engine_bail_warn!(Configuration; "galaxy3d::ShaderLibrary", "Shader '{}' not found", name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Shader names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.shaders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
#[path = "shader_library_tests.rs"]
mod tests;
