use serde::{Deserialize, Serialize};

use talentverify_core::{CompanyId, UserId};

use crate::roles::UserRole;

/// A resolved actor for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: UserRole,
    /// Company the user belongs to (company roles only).
    pub company_id: Option<CompanyId>,
}

impl Principal {
    pub fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            role: UserRole::TalentVerifyStaff,
            company_id: None,
        }
    }

    pub fn company_user(user_id: UserId, role: UserRole, company_id: CompanyId) -> Self {
        Self {
            user_id,
            role,
            company_id: Some(company_id),
        }
    }

    /// Company the principal is confined to, if any.
    ///
    /// Verification staff are never confined, even if a company is attached.
    pub fn company_scope(&self) -> Option<CompanyId> {
        if self.role.is_verification_staff() {
            None
        } else {
            self.company_id
        }
    }
}
