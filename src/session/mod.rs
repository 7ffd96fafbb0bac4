pub mod org_session;
pub mod settings;

pub use org_session::{OrgSession, SessionError};
pub use settings::{
    settings_key, MemorySettingsStore, OrgSettings, PgSettingsStore, SettingsError, SettingsStore,
};
