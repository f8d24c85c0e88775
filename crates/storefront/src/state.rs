//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::payments::PaymentGateway;
use crate::services::{CheckoutService, TokenVerifier, WebhookReconciler};
use crate::store::{OrderStore, ProductCatalog};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// order store, catalog, payment gateway, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    tokens: TokenVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `orders` - Order persistence
    /// * `catalog` - Product catalog
    /// * `gateway` - Payment provider
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let tokens = TokenVerifier::new(&config.jwt_secret);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                orders,
                catalog,
                gateway,
                tokens,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the order store.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }

    /// Get the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.inner.catalog.as_ref()
    }

    /// Get the payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get the bearer token verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenVerifier {
        &self.inner.tokens
    }

    /// A checkout service borrowing this state.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self.orders(), self.gateway(), self.config().checkout)
    }

    /// A webhook reconciler borrowing this state.
    #[must_use]
    pub fn reconciler(&self) -> WebhookReconciler<'_> {
        WebhookReconciler::new(self.orders(), self.gateway())
    }
}
