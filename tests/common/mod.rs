//! Common test utilities and helpers for integration tests.
//!
//! Spins up the full router against the in-memory record store and a
//! capturing mailer, so suites can exercise the HTTP surface end to end and
//! then assert directly on persisted rows, audit entries and sent mail.

#![allow(dead_code)]

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

use convoy::auth::JwtConfig;
use convoy::mailer::RecordingMailer;
use convoy::models::{NewIdentity, NewOrgMembership};
use convoy::store::memory::MemoryStore;
use convoy::store::RecordStore;
use convoy::{create_router, AppState, Config};

/// Pre-generated Ed25519 key pair shared by every test app.
static TEST_JWT_PRIVATE_KEY: Lazy<String> = Lazy::new(|| JwtConfig::generate_key_pair().0);

/// A test application instance with its own HTTP client and base URL.
pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub mailer: RecordingMailer,
    pub jwt: JwtConfig,
}

/// A seeded identity with a freshly minted access token.
#[derive(Debug, Clone)]
pub struct TestActor {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestApp {
    /// Spawns a new test application on a random port.
    pub async fn spawn() -> Self {
        Self::spawn_with_config(Config::default_for_testing()).await
    }

    /// Spawns with a customized configuration, e.g. rate limiting enabled.
    pub async fn spawn_with_config(config: Config) -> Self {
        std::env::set_var("JWT_PRIVATE_KEY", TEST_JWT_PRIVATE_KEY.as_str());

        let store = Arc::new(MemoryStore::new());
        let mailer = RecordingMailer::new();
        let jwt = JwtConfig::from_env();

        let state = AppState::with_components(
            store.clone(),
            Arc::new(mailer.clone()),
            jwt.clone(),
            &config,
        );
        let app = create_router(state, &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{}", addr),
            store,
            mailer,
            jwt,
        }
    }

    /// Generates a unique email for testing.
    pub fn unique_email() -> String {
        format!("test_{}@example.com", Uuid::new_v4())
    }

    /// Seeds an identity with the given role in an organization and mints
    /// an access token for it.
    pub fn seed_member(&self, organization_id: Uuid, role: &str) -> TestActor {
        let email = Self::unique_email();
        let identity = self
            .store
            .insert_identity(NewIdentity {
                email: email.clone(),
                display_name: "Test Member".to_string(),
                credential_hash: "not-a-real-hash".to_string(),
            })
            .expect("Failed to seed identity");

        self.store
            .insert_membership(NewOrgMembership {
                identity_id: identity.id,
                organization_id,
                role: role.to_string(),
            })
            .expect("Failed to seed membership");

        let token = self
            .jwt
            .generate_access_token(identity.id, &email)
            .expect("Failed to mint token");

        TestActor {
            id: identity.id,
            email,
            token,
        }
    }

    /// Seeds an organization admin.
    pub fn seed_admin(&self, organization_id: Uuid) -> TestActor {
        self.seed_member(organization_id, "admin")
    }

    /// A well-formed invitation payload for the given organization.
    pub fn invite_payload(organization_id: Uuid) -> Value {
        json!({
            "organization_id": organization_id,
            "email": Self::unique_email(),
            "first_name": "Jo",
            "last_name": "Driver",
            "phone": "+44 7700 900123",
            "hourly_rate": 14.5,
            "per_drop_rate": 1.2
        })
    }

    /// Makes an authenticated GET request.
    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send GET request")
    }

    /// Makes an authenticated POST request with JSON body.
    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    /// Makes an authenticated DELETE request.
    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send DELETE request")
    }

    /// Makes an unauthenticated GET request.
    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    /// Makes an unauthenticated POST request with JSON body.
    pub async fn post_public(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }
}

/// Asserts that a response has a specific status code.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $expected:expr) => {
        assert_eq!(
            $response.status().as_u16(),
            $expected,
            "Expected status {}, got {}",
            $expected,
            $response.status()
        );
    };
}

/// Asserts that a response is successful (2xx).
#[macro_export]
macro_rules! assert_success {
    ($response:expr) => {
        assert!(
            $response.status().is_success(),
            "Expected success, got status {}",
            $response.status()
        );
    };
}
