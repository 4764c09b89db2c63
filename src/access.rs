use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{AccessError, ApiError, ValidationError};
use crate::models::{AccessGrant, Bank, Branch, Employee, Profile, TemporaryGrant};
use crate::session::Role;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TEMPORARY_DAYS: i64 = 30;

/// Employees keyed by id, built once per fetch.
pub struct EmployeeDirectory {
    employees: HashMap<String, Employee>,
    branches: HashMap<String, Branch>,
    banks: HashMap<String, Bank>,
}

impl EmployeeDirectory {
    pub fn new(employees: Vec<Employee>, branches: Vec<Branch>, banks: Vec<Bank>) -> Self {
        Self {
            employees: employees.into_iter().map(|e| (e.id.clone(), e)).collect(),
            branches: branches.into_iter().map(|b| (b.id.clone(), b)).collect(),
            banks: banks.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }

    pub async fn fetch(client: &ApiClient) -> Result<Self, ApiError> {
        let (employees, branches, banks) =
            tokio::try_join!(client.employees(), client.branches(), client.banks())?;
        Ok(Self::new(employees, branches, banks))
    }

    pub fn lookup(&self, employee_id: &str) -> Result<&Employee, ApiError> {
        self.employees
            .get(employee_id.trim())
            .ok_or_else(|| ApiError::NotFound("Employee ID".to_string()))
    }

    /// The employee's bank id, directly or through their branch.
    pub fn bank_id_of(&self, employee: &Employee) -> Option<String> {
        employee.bank_id.clone().or_else(|| {
            employee
                .branch_id
                .as_ref()
                .and_then(|id| self.branches.get(id))
                .and_then(|branch| branch.bank_id.clone())
        })
    }

    pub fn bank_name_of(&self, employee: &Employee) -> Option<&str> {
        let bank_id = self.bank_id_of(employee)?;
        self.banks.get(&bank_id).map(|bank| bank.name.as_str())
    }
}

/// Role-based mailbox convention: `first.last.<role>@<bank>.com`.
pub fn generated_email(full_name: &str, role: Role, bank_name: Option<&str>) -> String {
    let parts: Vec<String> = full_name
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect();

    let local = match parts.as_slice() {
        [] => "staff".to_string(),
        [only] => only.clone(),
        [first, .., last] => format!("{first}.{last}"),
    };

    let domain: String = bank_name
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    let domain = if domain.is_empty() { "bank".to_string() } else { domain };

    format!("{local}.{}@{domain}.com", role.slug())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required("Password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    let upper = password.chars().any(|c| c.is_uppercase());
    let lower = password.chars().any(|c| c.is_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if upper && lower && digit && symbol {
        Ok(())
    } else {
        Err(ValidationError::PasswordTooWeak)
    }
}

fn ensure_promotion(employee: &Employee, target: Role) -> Result<(), ValidationError> {
    let current = Role::parse(employee.role.as_deref().unwrap_or_default());
    if target <= current {
        return Err(ValidationError::WrongRole {
            current: current.label().to_string(),
        });
    }
    Ok(())
}

/// Permanent privilege escalation, which also provisions the account for a new employee.
#[derive(Debug, Clone)]
pub struct PrivilegeEscalation {
    pub employee_id: String,
    pub role: Role,
    pub password: String,
    pub confirm_password: String,
}

impl PrivilegeEscalation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.employee_id.trim().is_empty() {
            return Err(ValidationError::Required("Employee ID"));
        }
        validate_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }

    /// Validates the form against the looked-up employee and fills in the derived fields.
    pub fn prepare(&self, directory: &EmployeeDirectory) -> Result<AccessGrant, AccessError> {
        self.validate()?;
        let employee = directory.lookup(&self.employee_id)?;
        ensure_promotion(employee, self.role)?;

        Ok(AccessGrant {
            employee_id: employee.id.clone(),
            full_name: employee.full_name.clone(),
            role: self.role.label().to_string(),
            email: generated_email(
                &employee.full_name,
                self.role,
                directory.bank_name_of(employee),
            ),
            password: self.password.clone(),
            bank_id: directory.bank_id_of(employee),
            branch_id: employee.branch_id.clone(),
        })
    }
}

pub async fn escalate(
    client: &ApiClient,
    form: &PrivilegeEscalation,
) -> Result<String, AccessError> {
    form.validate()?;
    let directory = EmployeeDirectory::fetch(client).await?;
    let grant = form.prepare(&directory)?;

    let message = client.grant_access(&grant).await?;
    info!(
        employee = %grant.employee_id,
        role = %grant.role,
        email = %grant.email,
        "access granted"
    );
    Ok(message)
}

/// Time-boxed role elevation; the acting admin re-enters their own password.
#[derive(Debug, Clone)]
pub struct TemporaryAccess {
    pub employee_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub reason: String,
    pub admin_password: String,
}

impl TemporaryAccess {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.employee_id.trim().is_empty() {
            return Err(ValidationError::Required("Employee ID"));
        }
        if self.reason.trim().is_empty() {
            return Err(ValidationError::Required("Reason"));
        }
        if self.admin_password.is_empty() {
            return Err(ValidationError::Required("Admin password"));
        }
        if self.expires_at <= now {
            return Err(ValidationError::ExpiryInPast);
        }
        if self.expires_at - now > Duration::days(MAX_TEMPORARY_DAYS) {
            return Err(ValidationError::ExpiryTooFar(MAX_TEMPORARY_DAYS));
        }
        Ok(())
    }

    pub fn prepare(
        &self,
        directory: &EmployeeDirectory,
        admin: &Profile,
        now: DateTime<Utc>,
    ) -> Result<TemporaryGrant, AccessError> {
        self.validate(now)?;
        let employee = directory.lookup(&self.employee_id)?;
        ensure_promotion(employee, self.role)?;

        Ok(TemporaryGrant {
            employee_id: employee.id.clone(),
            role: self.role.label().to_string(),
            email: generated_email(
                &employee.full_name,
                self.role,
                directory.bank_name_of(employee),
            ),
            expires_at: self.expires_at,
            reason: self.reason.trim().to_string(),
            granted_by: admin.id.clone(),
            bank_id: directory.bank_id_of(employee),
            branch_id: employee.branch_id.clone(),
        })
    }
}

pub async fn grant_temporary(
    client: &ApiClient,
    admin: &Profile,
    form: &TemporaryAccess,
    now: DateTime<Utc>,
) -> Result<String, AccessError> {
    form.validate(now)?;
    let directory = EmployeeDirectory::fetch(client).await?;
    let grant = form.prepare(&directory, admin, now)?;

    match client.verify_password(&form.admin_password).await {
        Ok(()) => {}
        Err(ApiError::Rejected(message)) => {
            warn!(admin = %admin.email, %message, "second factor rejected");
            return Err(AccessError::SecondFactorFailed);
        }
        Err(err) => return Err(err.into()),
    }

    let message = client.grant_temporary_access(&grant).await?;
    info!(
        employee = %grant.employee_id,
        role = %grant.role,
        expires_at = %grant.expires_at,
        "temporary access granted"
    );
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn directory() -> EmployeeDirectory {
        EmployeeDirectory::new(
            vec![
                Employee {
                    id: "e-1".into(),
                    full_name: "Dana  Marie Cho".into(),
                    role: Some("Employee".into()),
                    branch_id: Some("b-1".into()),
                    ..Default::default()
                },
                Employee {
                    id: "e-2".into(),
                    full_name: "Luis Ortega".into(),
                    role: Some("Bank Manager".into()),
                    bank_id: Some("k-1".into()),
                    ..Default::default()
                },
            ],
            vec![Branch {
                id: "b-1".into(),
                name: "Downtown".into(),
                bank_id: Some("k-1".into()),
            }],
            vec![Bank {
                id: "k-1".into(),
                name: "First City Bank".into(),
            }],
        )
    }

    fn admin() -> Profile {
        Profile {
            id: "u-1".into(),
            full_name: "Ria Sen".into(),
            email: "ria@bank.com".into(),
            role: "admin".into(),
            ..Default::default()
        }
    }

    fn escalation(employee_id: &str, role: Role) -> PrivilegeEscalation {
        PrivilegeEscalation {
            employee_id: employee_id.into(),
            role,
            password: "Str0ng!pass".into(),
            confirm_password: "Str0ng!pass".into(),
        }
    }

    #[test]
    fn generated_email_follows_role_convention() {
        assert_eq!(
            generated_email("Dana  Marie Cho", Role::BranchManager, Some("First City Bank")),
            "dana.cho.branchmanager@firstcitybank.com"
        );
        assert_eq!(generated_email("Prince", Role::Admin, None), "prince.admin@bank.com");
        assert_eq!(generated_email("", Role::Employee, None), "staff.employee@bank.com");
    }

    #[test]
    fn password_rules() {
        assert_eq!(validate_password(""), Err(ValidationError::Required("Password")));
        assert_eq!(validate_password("Ab1!"), Err(ValidationError::PasswordTooShort(8)));
        assert_eq!(validate_password("alllowercase1!"), Err(ValidationError::PasswordTooWeak));
        assert_eq!(validate_password("NoDigits!!"), Err(ValidationError::PasswordTooWeak));
        assert!(validate_password("Str0ng!pass").is_ok());
    }

    #[test]
    fn escalation_populates_derived_fields() {
        let grant = escalation("e-1", Role::BranchManager).prepare(&directory()).unwrap();
        assert_eq!(grant.email, "dana.cho.branchmanager@firstcitybank.com");
        assert_eq!(grant.bank_id.as_deref(), Some("k-1"));
        assert_eq!(grant.branch_id.as_deref(), Some("b-1"));
        assert_eq!(grant.role, "Branch Manager");
    }

    #[test]
    fn escalation_rejects_unknown_employee_and_demotion() {
        match escalation("e-404", Role::Admin).prepare(&directory()) {
            Err(AccessError::Api(ApiError::NotFound(what))) => assert_eq!(what, "Employee ID"),
            other => panic!("expected not found, got {other:?}"),
        }

        match escalation("e-2", Role::BranchManager).prepare(&directory()) {
            Err(AccessError::Invalid(ValidationError::WrongRole { current })) => {
                assert_eq!(current, "Bank Manager")
            }
            other => panic!("expected wrong role, got {other:?}"),
        }
    }

    #[test]
    fn escalation_requires_matching_confirmation() {
        let mut form = escalation("e-1", Role::Admin);
        form.confirm_password = "Str0ng!pasS".into();
        assert_eq!(form.validate(), Err(ValidationError::PasswordMismatch));
    }

    #[test]
    fn temporary_access_bounds_expiry() {
        let mut form = TemporaryAccess {
            employee_id: "e-1".into(),
            role: Role::BranchManager,
            expires_at: now() - Duration::hours(1),
            reason: "holiday cover".into(),
            admin_password: "Adm1n!pass".into(),
        };
        assert_eq!(form.validate(now()), Err(ValidationError::ExpiryInPast));

        form.expires_at = now() + Duration::days(31);
        assert_eq!(form.validate(now()), Err(ValidationError::ExpiryTooFar(30)));

        form.expires_at = now() + Duration::days(7);
        let grant = form.prepare(&directory(), &admin(), now()).unwrap();
        assert_eq!(grant.granted_by, "u-1");
        assert_eq!(grant.expires_at, now() + Duration::days(7));
    }

    fn directory_routes(router: Router) -> Router {
        router
            .route(
                "/api/employee",
                get(|| async {
                    Json(json!({ "data": { "employees": [
                        {
                            "_id": "e-1",
                            "fullName": "Dana Cho",
                            "role": "Employee",
                            "branchId": "b-1"
                        }
                    ] } }))
                }),
            )
            .route(
                "/api/branch",
                get(|| async {
                    Json(json!({ "data": { "branches": [
                        { "_id": "b-1", "name": "Downtown", "bankId": "k-1" }
                    ] } }))
                }),
            )
            .route(
                "/api/bank",
                get(|| async {
                    Json(json!({ "data": { "banks": [{ "_id": "k-1", "name": "First City" }] } }))
                }),
            )
    }

    #[tokio::test]
    async fn temporary_grant_is_not_sent_when_second_factor_fails() {
        let grants = Arc::new(AtomicUsize::new(0));
        let counter = grants.clone();
        let router = directory_routes(Router::new())
            .route(
                "/api/user/verify-password",
                post(|| async {
                    Json(json!({ "success": false, "message": "incorrect password" }))
                }),
            )
            .route(
                "/api/temporary-access",
                post(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!({ "success": true, "message": "granted" }))
                    }
                }),
            );
        let client = stub::client_for(router).await;
        let form = TemporaryAccess {
            employee_id: "e-1".into(),
            role: Role::BranchManager,
            expires_at: Utc::now() + Duration::days(2),
            reason: "holiday cover".into(),
            admin_password: "wrong".into(),
        };

        let result = grant_temporary(&client, &admin(), &form, Utc::now()).await;
        assert!(matches!(result, Err(AccessError::SecondFactorFailed)));
        assert_eq!(grants.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn temporary_grant_posts_after_verification() {
        let router = directory_routes(Router::new())
            .route(
                "/api/user/verify-password",
                post(|| async { Json(json!({ "success": true, "message": "verified" })) }),
            )
            .route(
                "/api/temporary-access",
                post(|Json(body): Json<serde_json::Value>| async move {
                    let email = body["email"].as_str().unwrap_or_default().to_string();
                    Json(json!({ "success": true, "message": format!("granted to {email}") }))
                }),
            );
        let client = stub::client_for(router).await;
        let form = TemporaryAccess {
            employee_id: "e-1".into(),
            role: Role::BranchManager,
            expires_at: Utc::now() + Duration::days(2),
            reason: "holiday cover".into(),
            admin_password: "Adm1n!pass".into(),
        };

        let message = grant_temporary(&client, &admin(), &form, Utc::now()).await.unwrap();
        assert_eq!(message, "granted to dana.cho.branchmanager@firstcity.com");
    }
}
