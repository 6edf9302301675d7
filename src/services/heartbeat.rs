//! Pool membership for a running instance: register once, then report a
//! load sample on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::System;
use tokio::time::MissedTickBehavior;

use crate::{clients::RegistryClient, error::AppError};

/// How often an instance reports its load.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Source of the load figure an instance reports.
pub trait LoadSampler: Send {
    fn sample(&mut self) -> Result<f64, AppError>;
}

/// Global CPU utilisation in percent (0-100).
///
/// sysinfo needs two refreshes to compute usage, so the first sample after
/// construction may read low.
pub struct CpuLoadSampler {
    system: System,
}

impl Default for CpuLoadSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuLoadSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl LoadSampler for CpuLoadSampler {
    fn sample(&mut self) -> Result<f64, AppError> {
        self.system.refresh_cpu_usage();
        let usage = self.system.global_cpu_usage();
        if !usage.is_finite() {
            return Err(AppError::Io(std::io::Error::other(
                "CPU usage unavailable",
            )));
        }
        Ok(f64::from(usage))
    }
}

/// Register `address` with the pool registry.
pub async fn register_instance(
    registry: &dyn RegistryClient,
    address: &str,
) -> Result<(), AppError> {
    registry.register(address).await?;
    tracing::info!(address, "Registered with pool registry");
    Ok(())
}

/// Report a load sample every `interval`, forever.
///
/// A failed sample or report is logged and the loop waits for the next tick.
pub async fn report_load_periodically<S: LoadSampler>(
    registry: Arc<dyn RegistryClient>,
    address: String,
    mut sampler: S,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match report_once(registry.as_ref(), &address, &mut sampler).await {
            Ok(sample) => tracing::debug!(address = %address, sample, "Reported load"),
            Err(e) => tracing::warn!(address = %address, error = %e, "Load report failed"),
        }
    }
}

async fn report_once<S: LoadSampler>(
    registry: &dyn RegistryClient,
    address: &str,
    sampler: &mut S,
) -> Result<f64, AppError> {
    let sample = sampler.sample()?;
    registry.report_load(address, sample).await?;
    Ok(sample)
}
