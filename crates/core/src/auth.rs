//! Credential verification and custom claims.
//!
//! The credential provider is the source of truth for authorization: the `admin` and `role`
//! claims live on the account itself so that checks need no profile read. Profiles in the
//! document store are a read-optimised projection of the same data.

use crate::error::{CredentialError, CredentialResult};
use async_trait::async_trait;
use radtrack_types::EmailAddress;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

/// Custom claims carried by an account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Claims set by other tooling, preserved on merge.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An account known to the credential provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    pub uid: String,
    pub email: EmailAddress,
    pub display_name: Option<String>,
    pub claims: Claims,
}

/// The verified identity behind a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Caller {
    pub uid: String,
    pub email: EmailAddress,
    pub claims: Claims,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.claims.admin
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolves a bearer token to the caller it was issued to.
    async fn verify_token(&self, token: &str) -> CredentialResult<Caller>;

    async fn get_user_by_email(&self, email: &EmailAddress) -> CredentialResult<Account>;

    /// Replaces the custom claims of an account.
    async fn set_custom_claims(&self, uid: &str, claims: Claims) -> CredentialResult<()>;
}

/// One account entry of the accounts file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSeed {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub token: String,
    #[serde(default)]
    pub claims: Claims,
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
    accounts: Vec<AccountSeed>,
}

/// Credential issuer backed by a static list of accounts.
///
/// Tokens are fixed per account. Claims set at runtime are kept in memory for the lifetime of
/// the process.
#[derive(Debug)]
pub struct LocalCredentialProvider {
    tokens: HashMap<String, String>,
    accounts: RwLock<HashMap<String, Account>>,
}

impl LocalCredentialProvider {
    /// Builds a provider from account seeds.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidSeed`] for a malformed email, an unsafe uid, a blank
    /// token, or a duplicated uid, email or token.
    pub fn new(seeds: Vec<AccountSeed>) -> CredentialResult<Self> {
        let mut tokens = HashMap::new();
        let mut accounts = HashMap::new();
        let mut emails = HashMap::new();

        for seed in seeds {
            crate::validation::validate_uid(&seed.uid)
                .map_err(|e| CredentialError::InvalidSeed(e.to_string()))?;
            let email = EmailAddress::parse(&seed.email)
                .map_err(|e| CredentialError::InvalidSeed(e.to_string()))?;
            let token = seed.token.trim().to_string();
            if token.is_empty() {
                return Err(CredentialError::InvalidSeed(format!(
                    "account {} has an empty token",
                    seed.uid
                )));
            }
            if tokens.insert(token, seed.uid.clone()).is_some() {
                return Err(CredentialError::InvalidSeed(format!(
                    "duplicate token for account {}",
                    seed.uid
                )));
            }
            if emails.insert(email.clone(), seed.uid.clone()).is_some() {
                return Err(CredentialError::InvalidSeed(format!(
                    "duplicate email {email}"
                )));
            }
            let account = Account {
                uid: seed.uid.clone(),
                email,
                display_name: seed.display_name.filter(|n| !n.trim().is_empty()),
                claims: seed.claims,
            };
            if accounts.insert(seed.uid.clone(), account).is_some() {
                return Err(CredentialError::InvalidSeed(format!(
                    "duplicate uid {}",
                    seed.uid
                )));
            }
        }

        Ok(Self {
            tokens,
            accounts: RwLock::new(accounts),
        })
    }

    /// Parses an accounts document of the form `accounts: [{uid, email, displayName, token, claims}]`.
    pub fn from_yaml_str(yaml: &str) -> CredentialResult<Self> {
        let file: AccountsFile =
            serde_yaml::from_str(yaml).map_err(|e| CredentialError::InvalidSeed(e.to_string()))?;
        Self::new(file.accounts)
    }

    pub fn from_file(path: &Path) -> CredentialResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|source| CredentialError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }
}

#[async_trait]
impl CredentialProvider for LocalCredentialProvider {
    async fn verify_token(&self, token: &str) -> CredentialResult<Caller> {
        let uid = self
            .tokens
            .get(token.trim())
            .ok_or(CredentialError::InvalidToken)?;
        let accounts = self.accounts.read().await;
        let account = accounts.get(uid).ok_or(CredentialError::InvalidToken)?;
        Ok(Caller {
            uid: account.uid.clone(),
            email: account.email.clone(),
            claims: account.claims.clone(),
        })
    }

    async fn get_user_by_email(&self, email: &EmailAddress) -> CredentialResult<Account> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| &a.email == email)
            .cloned()
            .ok_or_else(|| CredentialError::UserNotFound(email.to_string()))
    }

    async fn set_custom_claims(&self, uid: &str, claims: Claims) -> CredentialResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(uid)
            .ok_or_else(|| CredentialError::UnknownUid(uid.to_string()))?;
        account.claims = claims;
        Ok(())
    }
}
