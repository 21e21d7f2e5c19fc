//! Application state shared across all request handlers.

use crate::config::file::FileConfig;
use compact_str::CompactString;
use pollbus_core::dispatch::PollDispatcher;
use pollbus_core::publish::NotificationPublisher;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc
/// or already a handle).
#[derive(Clone)]
pub struct AppState {
    /// The long-poll dispatcher.
    pub dispatcher: Arc<PollDispatcher>,
    /// The publisher behind the admin send endpoint.
    pub publisher: NotificationPublisher,
    /// Token and secret material for the extractors.
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<PollDispatcher>,
        publisher: NotificationPublisher,
        auth: AuthConfig,
    ) -> Self {
        Self {
            dispatcher,
            publisher,
            auth: Arc::new(auth),
        }
    }
}

/// Secrets and the token → tenant table, fixed at startup.
pub struct AuthConfig {
    admin_secret: String,
    /// (token, tenant) pairs.
    tenant_tokens: Vec<(String, CompactString)>,
}

impl AuthConfig {
    pub fn from_file(config: &FileConfig) -> Self {
        let tenant_tokens = config
            .tenants
            .iter()
            .flat_map(|tenant| {
                let name = CompactString::from(tenant.name.as_str());
                tenant
                    .tokens
                    .iter()
                    .map(move |token| (token.clone(), name.clone()))
            })
            .collect();
        Self {
            admin_secret: config.admin.secret.clone(),
            tenant_tokens,
        }
    }

    /// Constant-time admin secret check.
    pub fn verify_admin(&self, candidate: &str) -> bool {
        constant_time_eq(self.admin_secret.as_bytes(), candidate.as_bytes())
    }

    /// Resolve a bearer token to its tenant, comparing constant-time.
    pub fn tenant_for_token(&self, token: &str) -> Option<CompactString> {
        self.tenant_tokens
            .iter()
            .find(|(stored, _)| constant_time_eq(stored.as_bytes(), token.as_bytes()))
            .map(|(_, tenant)| tenant.clone())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::{AdminConfig, BusSection, ServerConfig, TenantConfig};

    fn auth() -> AuthConfig {
        AuthConfig::from_file(&FileConfig {
            server: ServerConfig {
                listen: std::net::SocketAddr::from(([127, 0, 0, 1], 8080)),
            },
            admin: AdminConfig {
                secret: "top-secret".into(),
            },
            bus: BusSection::default(),
            tenants: vec![TenantConfig {
                name: "acme".into(),
                tokens: vec!["tok-acme".into()],
            }],
        })
    }

    #[test]
    fn admin_secret_must_match_exactly() {
        let auth = auth();
        assert!(auth.verify_admin("top-secret"));
        assert!(!auth.verify_admin("top-secre"));
        assert!(!auth.verify_admin(""));
    }

    #[test]
    fn tokens_resolve_to_their_tenant() {
        let auth = auth();
        assert_eq!(auth.tenant_for_token("tok-acme").as_deref(), Some("acme"));
        assert_eq!(auth.tenant_for_token("tok-unknown"), None);
    }
}
