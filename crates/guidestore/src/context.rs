//! StoreContext — everything a request handler needs, behind one `Arc`.

use std::sync::Arc;

use guidestore_core::counter::{MemoryRateLimitStore, RateLimitStore};
use guidestore_core::db::adapter::Adapter;
use guidestore_core::options::StoreOptions;

use crate::access::AccessValidator;
use crate::admin::AdminAuth;
use crate::catalog::Catalog;
use crate::identity::{IdentityProvider, JwtIdentityProvider};
use crate::mailer::Mailer;
use crate::reconcile::Reconciler;
use crate::store::StoreRepo;
use crate::stripe::StripeClient;

/// Shared application state. Constructed once at startup and threaded through
/// every handler as `Arc<StoreContext>`.
#[derive(Debug)]
pub struct StoreContext {
    pub options: Arc<StoreOptions>,
    pub adapter: Arc<dyn Adapter>,
    pub repo: StoreRepo,
    pub catalog: Catalog,
    pub stripe: Arc<StripeClient>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub admin: AdminAuth,
    pub webhook_secret: String,
}

impl StoreContext {
    pub fn new(
        options: StoreOptions,
        adapter: Arc<dyn Adapter>,
        stripe: Arc<StripeClient>,
        mailer: Arc<dyn Mailer>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        let options = Arc::new(options);
        let repo = StoreRepo::new(adapter.clone());
        let catalog = Catalog::new(adapter.clone());
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(JwtIdentityProvider::new(options.secret.clone()));
        let admin = AdminAuth::standard(&options.secret, &options.admin);

        Self {
            repo,
            catalog,
            identity,
            admin,
            adapter,
            stripe,
            mailer,
            rate_limits: Arc::new(MemoryRateLimitStore::new()),
            webhook_secret: webhook_secret.into(),
            options,
        }
    }

    /// Swap the rate-limit backend (e.g. a shared store in multi-instance
    /// deployments).
    pub fn with_rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limits = store;
        self
    }

    /// Swap the identity provider.
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = provider;
        self
    }

    pub fn app_name(&self) -> &str {
        self.options.app_name.as_deref().unwrap_or("Guidestore")
    }

    pub fn base_url(&self) -> &str {
        self.options.base_url.as_deref().unwrap_or("")
    }

    /// The webhook reconciler over this context's collaborators.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.repo.clone(),
            self.catalog.clone(),
            self.stripe.clone(),
            self.mailer.clone(),
            self.options.clone(),
        )
    }

    /// The access validator over this context's collaborators.
    pub fn access_validator(&self) -> AccessValidator {
        AccessValidator::new(self.repo.clone(), self.identity.clone())
    }
}
