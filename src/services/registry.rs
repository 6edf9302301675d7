//! Service registry and least-load selection for one replicated pool.
//!
//! A registry keeps every instance that ever registered, in registration
//! order, together with its latest load sample. Selection picks the smallest
//! sample; ties go to the instance that registered first. All operations take
//! the same lock, so selection never races a concurrent registration.

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use crate::{clients::RegistryClient, error::AppError, models::registry::ServiceInstance};

/// Per-pool routing policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryPolicy {
    /// Load sample a freshly registered instance starts with
    pub initial_load: f64,

    /// Whether each selection adds one unit to the chosen instance's sample
    pub count_selections: bool,
}

impl RegistryPolicy {
    /// Ledger participants: new instances start idle and take traffic at once;
    /// every selection counts as one request until the next heartbeat.
    pub fn participants() -> Self {
        Self {
            initial_load: 0.0,
            count_selections: true,
        }
    }

    /// Auth and front-door instances: new instances start saturated and are
    /// preferred only after their first heartbeat. Selection is read-only.
    pub fn auth_services() -> Self {
        Self {
            initial_load: 100.0,
            count_selections: false,
        }
    }
}

/// Live directory of instances in one service pool.
pub struct Registry {
    policy: RegistryPolicy,
    instances: Mutex<Vec<ServiceInstance>>,
}

impl Registry {
    pub fn new(policy: RegistryPolicy) -> Self {
        Self {
            policy,
            instances: Mutex::new(Vec::new()),
        }
    }

    /// Register an instance.
    ///
    /// Idempotent by address: re-registering keeps the existing sample.
    /// Returns `true` when the address was new.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: address is not an http(s) URL with a host
    pub async fn register(&self, address: &str) -> Result<bool, AppError> {
        validate_address(address)?;

        let mut instances = self.instances.lock().await;
        if instances.iter().any(|i| i.address == address) {
            tracing::debug!(address, "Instance already registered");
            return Ok(false);
        }

        instances.push(ServiceInstance {
            address: address.to_string(),
            load_sample: self.policy.initial_load,
        });
        tracing::info!(address, load = self.policy.initial_load, "Registered instance");
        Ok(true)
    }

    /// Replace the load sample of a registered instance.
    ///
    /// # Errors
    ///
    /// - `InstanceNotFound`: the address never registered
    pub async fn report_load(&self, address: &str, sample: f64) -> Result<(), AppError> {
        let mut instances = self.instances.lock().await;
        let instance = instances
            .iter_mut()
            .find(|i| i.address == address)
            .ok_or(AppError::InstanceNotFound)?;

        instance.load_sample = sample;
        tracing::debug!(address, sample, "Updated load sample");
        Ok(())
    }

    /// Pick the least-loaded instance.
    ///
    /// # Errors
    ///
    /// - `NoInstanceAvailable`: nothing has registered yet
    pub async fn select(&self) -> Result<String, AppError> {
        let mut instances = self.instances.lock().await;

        let mut best: Option<usize> = None;
        for (index, instance) in instances.iter().enumerate() {
            match best {
                // strict comparison keeps the earliest of equal samples
                Some(b) if instance.load_sample >= instances[b].load_sample => {}
                _ => best = Some(index),
            }
        }

        let index = best.ok_or(AppError::NoInstanceAvailable)?;
        if self.policy.count_selections {
            instances[index].load_sample += 1.0;
        }

        let address = instances[index].address.clone();
        tracing::info!(address = %address, "Forwarding to instance");
        Ok(address)
    }

    /// Every registered address, in registration order.
    pub async fn list(&self) -> Vec<String> {
        self.instances
            .lock()
            .await
            .iter()
            .map(|i| i.address.clone())
            .collect()
    }

    /// Snapshot of all instances with their samples.
    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<ServiceInstance> {
        self.instances.lock().await.clone()
    }
}

/// In-process discovery, for services sharing a process with their registry.
#[async_trait]
impl RegistryClient for Registry {
    async fn register(&self, address: &str) -> Result<(), AppError> {
        Registry::register(self, address).await.map(|_| ())
    }

    async fn report_load(&self, address: &str, sample: f64) -> Result<(), AppError> {
        Registry::report_load(self, address, sample).await
    }

    async fn select(&self) -> Result<String, AppError> {
        Registry::select(self).await
    }

    async fn list(&self) -> Result<Vec<String>, AppError> {
        Ok(Registry::list(self).await)
    }
}

/// Accept only absolute http(s) URLs with a host.
fn validate_address(address: &str) -> Result<(), AppError> {
    let parsed = Url::parse(address)
        .map_err(|_| AppError::InvalidRequest(format!("Invalid instance address: {}", address)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(AppError::InvalidRequest(
            "Instance address must be an http(s) URL with a host".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "http://127.0.0.1:4001";
    const B: &str = "http://127.0.0.1:4002";
    const C: &str = "http://127.0.0.1:4003";

    #[tokio::test]
    async fn test_select_on_empty_registry_fails() {
        for policy in [RegistryPolicy::participants(), RegistryPolicy::auth_services()] {
            let registry = Registry::new(policy);
            assert!(matches!(
                registry.select().await,
                Err(AppError::NoInstanceAvailable)
            ));
        }
    }

    #[tokio::test]
    async fn test_single_registration_is_selected() {
        for policy in [RegistryPolicy::participants(), RegistryPolicy::auth_services()] {
            let registry = Registry::new(policy);
            registry.register(A).await.unwrap();
            assert_eq!(registry.select().await.unwrap(), A);
        }
    }

    #[tokio::test]
    async fn test_select_returns_minimum_sample() {
        let registry = Registry::new(RegistryPolicy::auth_services());
        registry.register(A).await.unwrap();
        registry.register(B).await.unwrap();
        registry.register(C).await.unwrap();

        registry.report_load(A, 55.0).await.unwrap();
        registry.report_load(B, 12.5).await.unwrap();
        registry.report_load(C, 30.0).await.unwrap();

        assert_eq!(registry.select().await.unwrap(), B);
        // read-only policy: still B
        assert_eq!(registry.select().await.unwrap(), B);
    }

    #[tokio::test]
    async fn test_ties_go_to_earliest_registered() {
        let registry = Registry::new(RegistryPolicy::auth_services());
        registry.register(C).await.unwrap();
        registry.register(A).await.unwrap();
        registry.register(B).await.unwrap();

        registry.report_load(C, 40.0).await.unwrap();
        registry.report_load(A, 10.0).await.unwrap();
        registry.report_load(B, 10.0).await.unwrap();

        assert_eq!(registry.select().await.unwrap(), A);
    }

    #[tokio::test]
    async fn test_counting_policy_spreads_selections() {
        let registry = Registry::new(RegistryPolicy::participants());
        registry.register(A).await.unwrap();
        registry.register(B).await.unwrap();

        assert_eq!(registry.select().await.unwrap(), A);
        assert_eq!(registry.select().await.unwrap(), B);
        assert_eq!(registry.select().await.unwrap(), A);

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot[0].load_sample, 2.0);
        assert_eq!(snapshot[1].load_sample, 1.0);
    }

    #[tokio::test]
    async fn test_initial_load_follows_policy() {
        let registry = Registry::new(RegistryPolicy::auth_services());
        registry.register(A).await.unwrap();
        registry.register(B).await.unwrap();
        registry.report_load(B, 99.0).await.unwrap();

        // A has not reported yet and still sits at the high sentinel
        assert_eq!(registry.select().await.unwrap(), B);
    }

    #[tokio::test]
    async fn test_report_for_unknown_address_fails() {
        let registry = Registry::new(RegistryPolicy::participants());
        assert!(matches!(
            registry.report_load(A, 1.0).await,
            Err(AppError::InstanceNotFound)
        ));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = Registry::new(RegistryPolicy::participants());
        assert!(registry.register(A).await.unwrap());
        registry.report_load(A, 7.0).await.unwrap();
        assert!(!registry.register(A).await.unwrap());

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].load_sample, 7.0);
    }

    #[tokio::test]
    async fn test_list_preserves_registration_order() {
        let registry = Registry::new(RegistryPolicy::participants());
        registry.register(B).await.unwrap();
        registry.register(A).await.unwrap();
        registry.register(C).await.unwrap();

        assert_eq!(registry.list().await, vec![B, A, C]);
    }

    #[tokio::test]
    async fn test_rejects_malformed_address() {
        let registry = Registry::new(RegistryPolicy::participants());
        assert!(matches!(
            registry.register("localhost-4001").await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            registry.register("ftp://files.example.com").await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(registry.list().await.is_empty());
    }
}
