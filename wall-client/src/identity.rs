//! Delegated identity provider interface.
//!
//! The provider owns the interactive delegation flow and the stored
//! delegation. The client only ever sees the resulting caller principal.

use async_trait::async_trait;
use wall_core::{IdentityError, Principal};

/// Caller identity obtained from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedIdentity {
    principal: Principal,
}

impl DelegatedIdentity {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    /// Identity used when no delegation is held.
    pub fn anonymous() -> Self {
        Self::new(Principal::anonymous())
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal.is_anonymous()
    }
}

/// Options handed to the provider when creating or renewing a delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOptions {
    /// Where the interactive login flow is served.
    pub provider_url: String,
    /// Keep the delegation alive while the user is idle.
    pub disable_idle_logout: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stored delegation from a previous login, or a fresh anonymous identity.
    async fn restore(&self, options: &IdentityOptions) -> Result<DelegatedIdentity, IdentityError>;

    /// Run the interactive delegation flow.
    ///
    /// Returns [`IdentityError::Cancelled`] when the user abandons the flow.
    async fn login(&self, options: &IdentityOptions) -> Result<DelegatedIdentity, IdentityError>;

    /// Drop the stored delegation.
    async fn logout(&self) -> Result<(), IdentityError>;
}
