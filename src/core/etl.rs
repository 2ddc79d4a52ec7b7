use crate::core::{LoadResponse, Pipeline, PipelineOutcome};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use tokio::sync::Mutex;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: Mutex<RunMonitor>,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: Mutex::new(RunMonitor::new(monitor_enabled)),
        }
    }

    pub async fn run(&self) -> Result<LoadResponse> {
        let record_type = self.pipeline.record_type();
        tracing::info!("🚀 Starting {} load", record_type);

        // Extract
        let data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} {} records", data.records.len(), record_type);
        self.monitor.lock().await.mark("extract");

        // Transform
        let outcome = self.pipeline.transform(data).await?;
        match &outcome {
            PipelineOutcome::Table(table) => tracing::info!(
                "Transformed into {} rows x {} columns",
                table.row_count(),
                table.column_count()
            ),
            PipelineOutcome::NoData => tracing::info!("Nothing to write for {}", record_type),
            PipelineOutcome::SchemaMismatch(_) => {
                tracing::warn!("⚠️ {} data did not match the expected shape", record_type)
            }
        }
        self.monitor.lock().await.mark("transform");

        // Load
        let response = self.pipeline.load(outcome).await?;
        let mut monitor = self.monitor.lock().await;
        monitor.mark("load");
        monitor.log_final_stats();

        Ok(response)
    }
}
