//! Integration tests for the Marbelle client SDK.
//!
//! Every test spins up its own in-process stub backend (see [`stub`]) on an
//! ephemeral port and drives the real client stack against it: session
//! client, domain services, and cart manager, over real HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marbelle-integration-tests
//! ```

use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;

use marbelle_client::cart::CartManager;
use marbelle_client::config::ClientConfig;
use marbelle_client::services::{AuthService, CartService, CatalogService, DashboardService};
use marbelle_client::session::{CredentialPair, CredentialStore, MemoryCredentialStore, SessionClient};
use marbelle_core::UserProfile;

pub mod stub;

pub use stub::{GUEST_SESSION_ID, StubState, TEST_EMAIL, TEST_PASSWORD};

/// One stub backend plus a real client wired to it.
pub struct TestContext {
    /// The session client under test.
    pub session: SessionClient,
    /// The injected credential store, for direct observation.
    pub store: Arc<MemoryCredentialStore>,
    /// Handle to the stub backend's knobs and counters.
    pub backend: StubState,
}

impl TestContext {
    /// Start a fresh stub backend and build a client against it.
    pub async fn new() -> Self {
        init_tracing();

        let backend = StubState::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener address");

        let app = stub::router(backend.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve stub backend");
        });

        let config = ClientConfig::new(
            format!("http://{addr}")
                .parse()
                .expect("stub base url parses"),
        );
        let store = Arc::new(MemoryCredentialStore::new());
        let dyn_store: Arc<dyn CredentialStore> = Arc::clone(&store) as Arc<dyn CredentialStore>;
        let session = SessionClient::new(&config, dyn_store);

        Self {
            session,
            store,
            backend,
        }
    }

    /// Auth service over the shared session client.
    #[must_use]
    pub fn auth(&self) -> AuthService {
        AuthService::new(self.session.clone())
    }

    /// Dashboard service over the shared session client.
    #[must_use]
    pub fn dashboard(&self) -> DashboardService {
        DashboardService::new(self.session.clone())
    }

    /// Catalog service over the shared session client.
    #[must_use]
    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.session.clone())
    }

    /// A fresh cart manager over the shared session client.
    #[must_use]
    pub fn cart_manager(&self) -> CartManager {
        CartManager::new(CartService::new(self.session.clone()))
    }

    /// The stored credential pair; panics when logged out.
    #[must_use]
    pub fn store_pair(&self) -> CredentialPair {
        self.store.credentials().expect("credential pair stored")
    }

    /// Log in with the stub's seeded account.
    pub async fn login(&self) -> UserProfile {
        self.auth()
            .login(TEST_EMAIL, TEST_PASSWORD)
            .await
            .expect("login with seeded account")
    }
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "marbelle_client=debug".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
