use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::PaymentProviderPort,
    domain::entities::payment_provider::PaymentProvider,
};

/// Enabled payment provider adapters, keyed by provider.
///
/// Populated once at startup from configuration. A provider without an
/// adapter is treated as disabled.
#[derive(Default, Clone)]
pub struct PaymentProviderRegistry {
    adapters: HashMap<PaymentProvider, Arc<dyn PaymentProviderPort>>,
}

impl PaymentProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the provider it reports. Replaces any previous one.
    pub fn with_adapter(mut self, adapter: Arc<dyn PaymentProviderPort>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    /// Get the adapter for `provider`.
    ///
    /// # Errors
    /// `ProviderNotConfigured` when the provider is disabled or lacks credentials.
    pub fn get(&self, provider: PaymentProvider) -> AppResult<Arc<dyn PaymentProviderPort>> {
        self.adapters.get(&provider).cloned().ok_or_else(|| {
            AppError::ProviderNotConfigured(format!("{} is not enabled", provider.display_name()))
        })
    }

    pub fn is_enabled(&self, provider: PaymentProvider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Enabled providers in a stable order
    pub fn enabled(&self) -> Vec<PaymentProvider> {
        PaymentProvider::all()
            .iter()
            .copied()
            .filter(|p| self.is_enabled(*p))
            .collect()
    }
}
