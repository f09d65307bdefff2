use coachgate_auth::{Principal, Role};
use coachgate_core::UserId;

/// Principal context for a request.
///
/// Inserted by the access middleware only after every stage allowed the
/// request, so its presence means the principal was live and active at
/// admission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal_id(&self) -> UserId {
        self.principal.id
    }

    pub fn is_admin(&self) -> bool {
        self.principal.role == Role::Admin
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
