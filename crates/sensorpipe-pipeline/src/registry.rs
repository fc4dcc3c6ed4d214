use std::collections::BTreeMap;

use futures_util::future::join_all;

use crate::error::{PipelineError, Result};
use crate::executor::PipelineExecutor;
use crate::status::{PipelineState, PipelineStatus};

/// Owns independent pipelines, keyed by id.
///
/// Pipelines share nothing; the registry only fans lifecycle calls out to
/// them. Bulk operations report per-pipeline failures instead of stopping
/// at the first one.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, PipelineExecutor>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pipeline: PipelineExecutor) -> Result<()> {
        let id = pipeline.id().to_string();
        if self.pipelines.contains_key(&id) {
            return Err(PipelineError::DuplicatePipeline(id));
        }
        tracing::debug!(pipeline = %id, "registered pipeline");
        self.pipelines.insert(id, pipeline);
        Ok(())
    }

    /// Remove a pipeline that is not running.
    pub fn remove(&mut self, id: &str) -> Result<PipelineExecutor> {
        let pipeline = self
            .pipelines
            .get(id)
            .ok_or_else(|| PipelineError::UnknownPipeline(id.to_string()))?;
        if matches!(
            pipeline.state(),
            PipelineState::Running | PipelineState::Stopping
        ) {
            return Err(PipelineError::StillRunning(id.to_string()));
        }
        self.pipelines
            .remove(id)
            .ok_or_else(|| PipelineError::UnknownPipeline(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&PipelineExecutor> {
        self.pipelines.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PipelineExecutor> {
        self.pipelines.get_mut(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn start(&mut self, id: &str) -> Result<()> {
        self.lookup(id)?.start()
    }

    pub async fn stop(&mut self, id: &str) -> Result<()> {
        self.lookup(id)?.stop().await
    }

    /// Start every pipeline that has not been started yet.
    pub fn start_all(&mut self) -> Vec<(String, PipelineError)> {
        let mut failures = Vec::new();
        for (id, pipeline) in &mut self.pipelines {
            if pipeline.state() != PipelineState::Created {
                continue;
            }
            if let Err(err) = pipeline.start() {
                failures.push((id.clone(), err));
            }
        }
        failures
    }

    /// Stop every started pipeline concurrently.
    pub async fn stop_all(&mut self) -> Vec<(String, PipelineError)> {
        let stops = self
            .pipelines
            .iter_mut()
            .filter(|(_, p)| p.state() != PipelineState::Created)
            .map(|(id, p)| async move { (id.clone(), p.stop().await) });
        collect_failures(join_all(stops).await)
    }

    /// Wait for every started pipeline to finish on its own.
    pub async fn wait_all(&mut self) -> Vec<(String, PipelineError)> {
        let waits = self
            .pipelines
            .iter_mut()
            .filter(|(_, p)| p.state() != PipelineState::Created)
            .map(|(id, p)| async move { (id.clone(), p.wait().await) });
        collect_failures(join_all(waits).await)
    }

    pub fn statuses(&self) -> Vec<PipelineStatus> {
        self.pipelines.values().map(PipelineExecutor::status).collect()
    }

    fn lookup(&mut self, id: &str) -> Result<&mut PipelineExecutor> {
        self.pipelines
            .get_mut(id)
            .ok_or_else(|| PipelineError::UnknownPipeline(id.to_string()))
    }
}

fn collect_failures(results: Vec<(String, Result<()>)>) -> Vec<(String, PipelineError)> {
    results
        .into_iter()
        .filter_map(|(id, result)| result.err().map(|err| (id, err)))
        .collect()
}

#[cfg(test)]
mod tests {
    use sensorpipe_decode::{Decoder, DecoderConfig};

    use super::*;
    use crate::stage::ChannelSource;

    fn pipeline(
        id: &str,
    ) -> (tokio::sync::mpsc::Sender<sensorpipe_decode::Input>, PipelineExecutor) {
        let (tx, source) = ChannelSource::channel(4);
        let decoder = Decoder::from_config(DecoderConfig::default()).unwrap();
        (tx, PipelineExecutor::new(id, source, decoder))
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let mut registry = PipelineRegistry::new();
        let (_a, first) = pipeline("imu-1");
        let (_b, second) = pipeline("imu-1");

        registry.register(first).unwrap();
        assert!(matches!(
            registry.register(second),
            Err(PipelineError::DuplicatePipeline(id)) if id == "imu-1"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_only_when_not_running() {
        let mut registry = PipelineRegistry::new();
        let (_tx, p) = pipeline("imu-1");
        registry.register(p).unwrap();
        registry.start("imu-1").unwrap();

        assert!(matches!(
            registry.remove("imu-1"),
            Err(PipelineError::StillRunning(_))
        ));

        registry.stop("imu-1").await.unwrap();
        let removed = registry.remove("imu-1").unwrap();
        assert_eq!(removed.state(), PipelineState::Stopped);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let mut registry = PipelineRegistry::new();
        assert!(matches!(
            registry.start("nope"),
            Err(PipelineError::UnknownPipeline(_))
        ));
        assert!(matches!(
            registry.remove("nope"),
            Err(PipelineError::UnknownPipeline(_))
        ));
        assert!(registry.get("nope").is_none());
    }

    #[tokio::test]
    async fn test_start_all_and_stop_all() {
        let mut registry = PipelineRegistry::new();
        let mut senders = Vec::new();
        for id in ["a", "b", "c"] {
            let (tx, p) = pipeline(id);
            senders.push(tx);
            registry.register(p).unwrap();
        }

        assert!(registry.start_all().is_empty());
        assert!(registry
            .statuses()
            .iter()
            .all(|s| s.state == PipelineState::Running));

        assert!(registry.stop_all().await.is_empty());
        assert!(registry
            .statuses()
            .iter()
            .all(|s| s.state == PipelineState::Stopped));
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
