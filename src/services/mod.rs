pub mod invitation_service;
pub mod org_service;
pub mod profile_service;
