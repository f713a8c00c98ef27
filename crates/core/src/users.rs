//! Staff profiles and privileged role assignment.

use crate::auth::{Caller, Claims, CredentialProvider};
use crate::store::DocumentStore;
use crate::{StudyError, StudyResult};
use radtrack_types::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrador,
    Enfermero,
    Tecnologo,
    Transcriptora,
}

/// Service area a staff member is assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignedService {
    General,
    #[serde(rename = "URG")]
    Urg,
    #[serde(rename = "HOSP")]
    Hosp,
    #[serde(rename = "UCI")]
    Uci,
    #[serde(rename = "C.EXT")]
    CExt,
    #[serde(rename = "TAC")]
    Tac,
    #[serde(rename = "RX")]
    Rx,
    #[serde(rename = "ECO")]
    Eco,
    #[serde(rename = "MAMO")]
    Mamo,
    #[serde(rename = "DENSITOMETRIA")]
    Densitometria,
    #[serde(rename = "RMN")]
    Rmn,
}

const ADMIN_SERVICES: &[AssignedService] = &[AssignedService::General];
const NURSING_SERVICES: &[AssignedService] = &[
    AssignedService::Urg,
    AssignedService::Hosp,
    AssignedService::Uci,
    AssignedService::CExt,
];
const MODALITY_SERVICES: &[AssignedService] = &[
    AssignedService::Tac,
    AssignedService::Rx,
    AssignedService::Eco,
    AssignedService::Mamo,
    AssignedService::Densitometria,
    AssignedService::Rmn,
];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrador => "administrador",
            Role::Enfermero => "enfermero",
            Role::Tecnologo => "tecnologo",
            Role::Transcriptora => "transcriptora",
        }
    }

    /// Services this role may be assigned to.
    pub fn allowed_services(self) -> &'static [AssignedService] {
        match self {
            Role::Administrador => ADMIN_SERVICES,
            Role::Enfermero => NURSING_SERVICES,
            Role::Tecnologo | Role::Transcriptora => MODALITY_SERVICES,
        }
    }

    pub fn allows(self, service: AssignedService) -> bool {
        self.allowed_services().contains(&service)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "administrador" => Ok(Role::Administrador),
            "enfermero" => Ok(Role::Enfermero),
            "tecnologo" | "tecnólogo" => Ok(Role::Tecnologo),
            "transcriptora" => Ok(Role::Transcriptora),
            _ => Err(StudyError::InvalidInput(format!("unknown role '{s}'"))),
        }
    }
}

impl AssignedService {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignedService::General => "General",
            AssignedService::Urg => "URG",
            AssignedService::Hosp => "HOSP",
            AssignedService::Uci => "UCI",
            AssignedService::CExt => "C.EXT",
            AssignedService::Tac => "TAC",
            AssignedService::Rx => "RX",
            AssignedService::Eco => "ECO",
            AssignedService::Mamo => "MAMO",
            AssignedService::Densitometria => "DENSITOMETRIA",
            AssignedService::Rmn => "RMN",
        }
    }
}

impl fmt::Display for AssignedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignedService {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        let wanted = if wanted == "C. EXT" { "C.EXT".to_string() } else { wanted };
        [ADMIN_SERVICES, NURSING_SERVICES, MODALITY_SERVICES]
            .concat()
            .into_iter()
            .find(|svc| svc.as_str().to_uppercase() == wanted)
            .ok_or_else(|| StudyError::InvalidInput(format!("unknown service '{s}'")))
    }
}

/// A staff member's profile document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: EmailAddress,
    pub nombre: String,
    #[serde(alias = "role")]
    pub rol: Role,
    pub servicio_asignado: AssignedService,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_general: Option<String>,
    pub activo: bool,
}

impl UserProfile {
    pub fn check_invariants(&self) -> Result<(), String> {
        if !self.rol.allows(self.servicio_asignado) {
            return Err(format!(
                "service '{}' is not valid for role '{}'",
                self.servicio_asignado, self.rol
            ));
        }
        if self.nombre.trim().is_empty() {
            return Err("nombre cannot be empty".into());
        }
        Ok(())
    }
}

fn checked_service(role: Role, service: &str) -> StudyResult<AssignedService> {
    let parsed: AssignedService = service.parse()?;
    if !role.allows(parsed) {
        return Err(StudyError::ServiceNotAllowed {
            role: role.to_string(),
            service: parsed.to_string(),
        });
    }
    Ok(parsed)
}

/// Profile data a signed-in account submits for itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub nombre: Option<String>,
    pub rol: Option<String>,
    pub servicio_asignado: Option<String>,
}

/// Input of the privileged role-assignment operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RoleAssignment {
    pub email: Option<String>,
    pub role: Option<String>,
    pub service: Option<String>,
    pub area: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleAssignmentOutcome {
    pub uid: String,
    pub message: String,
}

fn required(value: Option<String>, name: &str) -> StudyResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StudyError::InvalidInput(format!("'{name}' is required")))
}

/// Profile and role operations.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    credentials: Arc<dyn CredentialProvider>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self { store, credentials }
    }

    /// Creates the caller's own profile at signup.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::ProfileExists`] if the caller already has a profile, or an input
    /// error if the role/service pair is not allowed.
    pub async fn register_profile(
        &self,
        caller: &Caller,
        request: ProfileRequest,
    ) -> StudyResult<UserProfile> {
        let role: Role = required(request.rol, "rol")?.parse()?;
        let service = match request.servicio_asignado {
            Some(s) if !s.trim().is_empty() => checked_service(role, &s)?,
            _ if role == Role::Administrador => AssignedService::General,
            _ => return Err(StudyError::InvalidInput("'servicioAsignado' is required".into())),
        };

        if self.store.get_user(&caller.uid).await?.is_some() {
            return Err(StudyError::ProfileExists(caller.uid.clone()));
        }

        let nombre = request
            .nombre
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| caller.email.local_part().to_string());

        let profile = UserProfile {
            uid: caller.uid.clone(),
            email: caller.email.clone(),
            nombre,
            rol: role,
            servicio_asignado: service,
            area_general: None,
            activo: true,
        };
        self.store.put_user(&profile).await?;
        tracing::info!(uid = %profile.uid, role = %profile.rol, "registered profile");
        Ok(profile)
    }

    /// The caller's profile.
    pub async fn profile(&self, uid: &str) -> StudyResult<UserProfile> {
        self.store
            .get_user(uid)
            .await?
            .ok_or_else(|| StudyError::ProfileNotFound(uid.to_string()))
    }

    /// Assigns a role to the account with the given email.
    ///
    /// Two writes happen in order: the custom claims on the credential (the authorization
    /// source of truth), then the profile projection. If the second write fails the claims
    /// stay applied and [`StudyError::ProfileProjectionFailed`] is returned; running the same
    /// assignment again is idempotent and repairs the profile.
    ///
    /// # Errors
    ///
    /// - [`StudyError::PermissionDenied`] if the caller lacks the `admin` claim
    /// - [`StudyError::InvalidInput`] if email or role are absent or malformed
    /// - [`StudyError::Credential`] if the account cannot be resolved or updated
    /// - [`StudyError::Store`] if the existing profile cannot be read; nothing is written
    pub async fn set_user_role(
        &self,
        caller: &Caller,
        request: RoleAssignment,
    ) -> StudyResult<RoleAssignmentOutcome> {
        if !caller.is_admin() {
            tracing::warn!(uid = %caller.uid, "setUserRole called by non-admin user");
            return Err(StudyError::PermissionDenied);
        }

        let (email, role) = match (request.email, request.role) {
            (Some(e), Some(r)) if !e.trim().is_empty() && !r.trim().is_empty() => (e, r),
            _ => {
                tracing::error!(uid = %caller.uid, "setUserRole called without email or role");
                return Err(StudyError::InvalidInput(
                    "the operation requires 'email' and 'role'".into(),
                ));
            }
        };
        let email = EmailAddress::parse(&email)
            .map_err(|e| StudyError::InvalidInput(e.to_string()))?;
        let role: Role = role.parse()?;
        let service = match request.service.filter(|s| !s.trim().is_empty()) {
            Some(s) => checked_service(role, &s)?,
            None if role == Role::Administrador => AssignedService::General,
            None => return Err(StudyError::InvalidInput("'service' is required".into())),
        };
        let area = request
            .area
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let account = self.credentials.get_user_by_email(&email).await?;
        let existing = self.store.get_user(&account.uid).await?;

        let claims = Claims {
            admin: role == Role::Administrador,
            role: Some(role.to_string()),
            extra: account.claims.extra.clone(),
        };
        self.credentials
            .set_custom_claims(&account.uid, claims)
            .await?;

        let nombre = account
            .display_name
            .clone()
            .or_else(|| existing.as_ref().map(|p| p.nombre.clone()))
            .unwrap_or_else(|| email.local_part().to_string());
        let profile = UserProfile {
            uid: account.uid.clone(),
            email: account.email.clone(),
            nombre,
            rol: role,
            servicio_asignado: service,
            area_general: area.or_else(|| existing.and_then(|p| p.area_general)),
            activo: true,
        };

        if let Err(source) = self.store.put_user(&profile).await {
            tracing::error!(
                uid = %account.uid,
                admin_uid = %caller.uid,
                "claims applied but profile write failed: {}",
                source
            );
            return Err(StudyError::ProfileProjectionFailed {
                uid: account.uid,
                source,
            });
        }

        tracing::info!(admin_uid = %caller.uid, "successfully set role for {} to {}", email, role);
        Ok(RoleAssignmentOutcome {
            uid: account.uid,
            message: format!("Success! {email} has been made a {role}."),
        })
    }
}
