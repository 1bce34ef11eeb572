/// Pipeline registry - named pipelines kept in creation order
///
/// Pipelines are drawn in the order they were first created. Re-creating a
/// name replaces the pipeline but keeps its position.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::engine_warn;

#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: Vec<Pipeline>,
    index: FxHashMap<String, usize>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an Unbuilt pipeline, replacing any pipeline with the same name
    ///
    /// Invalid options leave the registry (and any existing pipeline) untouched.
    pub fn create(&mut self, name: &str, options: PipelineOptions) -> Result<&mut Pipeline> {
        let pipeline = Pipeline::new(name, options)?;
        let position = match self.index.get(name) {
            Some(&position) => {
                engine_warn!("galaxy3d::PipelineRegistry",
                    "Pipeline '{}' re-created, previous definition replaced", name);
                self.pipelines[position] = pipeline;
                position
            }
            None => {
                self.pipelines.push(pipeline);
                let position = self.pipelines.len() - 1;
                self.index.insert(name.to_string(), position);
                position
            }
        };
        Ok(&mut self.pipelines[position])
    }

    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.index.get(name).map(|&i| &self.pipelines[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Pipeline> {
        self.index.get(name).map(|&i| &mut self.pipelines[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Remove a pipeline; later pipelines move up one position
    pub fn remove(&mut self, name: &str) -> Option<Pipeline> {
        let position = self.index.remove(name)?;
        let pipeline = self.pipelines.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(pipeline)
    }

    /// Pipelines in draw order
    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pipeline> {
        self.pipelines.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(Pipeline::name).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
#[path = "pipeline_registry_tests.rs"]
mod tests;
