use thiserror::Error;

use talentverify_core::CompanyId;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// A company role without a company cannot act on anything.
    #[error("company user is not attached to a company")]
    MissingCompany,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),

    #[error("company mismatch: principal may not act on company {0}")]
    CompanyMismatch(CompanyId),
}

/// Check that the principal's role grants `required`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: Permission) -> Result<(), AuthzError> {
    if principal.role.is_company_role() && principal.company_id.is_none() {
        return Err(AuthzError::MissingCompany);
    }

    if principal.role.permissions().contains(&required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Check that the principal may act on records of `company_id`.
pub fn ensure_company_access(principal: &Principal, company_id: CompanyId) -> Result<(), AuthzError> {
    match principal.company_scope() {
        None if principal.role.is_verification_staff() => Ok(()),
        None => Err(AuthzError::MissingCompany),
        Some(own) if own == company_id => Ok(()),
        Some(_) => Err(AuthzError::CompanyMismatch(company_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserRole;
    use talentverify_core::UserId;

    #[test]
    fn staff_may_bulk_load_companies() {
        let principal = Principal::staff(UserId::new());
        assert_eq!(authorize(&principal, Permission::COMPANIES_BULK), Ok(()));
    }

    #[test]
    fn company_admin_may_not_bulk_load_companies() {
        let principal = Principal::company_user(UserId::new(), UserRole::CompanyAdmin, CompanyId::new());
        assert_eq!(
            authorize(&principal, Permission::COMPANIES_BULK),
            Err(AuthzError::Forbidden(Permission::COMPANIES_BULK))
        );
        assert_eq!(authorize(&principal, Permission::EMPLOYEES_BULK), Ok(()));
    }

    #[test]
    fn company_staff_is_read_only() {
        let principal = Principal::company_user(UserId::new(), UserRole::CompanyStaff, CompanyId::new());
        assert!(authorize(&principal, Permission::EMPLOYEES_READ).is_ok());
        assert!(authorize(&principal, Permission::EMPLOYEES_BULK).is_err());
    }

    #[test]
    fn company_role_without_company_is_rejected() {
        let principal = Principal {
            user_id: UserId::new(),
            role: UserRole::CompanyAdmin,
            company_id: None,
        };
        assert_eq!(
            authorize(&principal, Permission::EMPLOYEES_READ),
            Err(AuthzError::MissingCompany)
        );
        assert_eq!(
            ensure_company_access(&principal, CompanyId::new()),
            Err(AuthzError::MissingCompany)
        );
    }

    #[test]
    fn company_users_are_confined_to_their_company() {
        let own = CompanyId::new();
        let other = CompanyId::new();
        let principal = Principal::company_user(UserId::new(), UserRole::CompanyAdmin, own);

        assert_eq!(ensure_company_access(&principal, own), Ok(()));
        assert_eq!(
            ensure_company_access(&principal, other),
            Err(AuthzError::CompanyMismatch(other))
        );
    }

    #[test]
    fn staff_reach_every_company() {
        let mut principal = Principal::staff(UserId::new());
        principal.company_id = Some(CompanyId::new());
        assert_eq!(ensure_company_access(&principal, CompanyId::new()), Ok(()));
    }

    #[test]
    fn role_names_round_trip() {
        for role in [
            UserRole::Admin,
            UserRole::TalentVerifyStaff,
            UserRole::CompanyAdmin,
            UserRole::CompanyStaff,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
