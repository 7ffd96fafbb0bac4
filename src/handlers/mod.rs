//! HTTP handlers. Each handler delegates to the request pipeline, which owns
//! authentication, profile resolution, authorization and error-to-status
//! translation; handlers only wire extractors to business functions.

pub mod invitations;
pub mod organizations;
pub mod permissions;
pub mod profile;
pub mod session;

use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::mailer::Mailer;
use crate::pipeline::Pipeline;
use crate::session::SettingsStore;
use crate::store::OrgStore;

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrgStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.auth.clone(), self.store.clone())
    }
}
