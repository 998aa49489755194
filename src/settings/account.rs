//! Service logon accounts

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Security context the service runs under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceAccount {
    /// Non-privileged local account, anonymous credentials on the network
    LocalService,
    /// Non-privileged local account, computer credentials on the network
    NetworkService,
    /// Extensive local privileges, acts as the computer on the network
    #[default]
    LocalSystem,
    /// A specific (domain) user
    User { username: String, password: String },
}

impl ServiceAccount {
    /// Create a named user account
    pub fn user(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let account = Self::User {
            username: username.into(),
            password: password.into(),
        };
        account.validate()?;
        Ok(account)
    }

    /// Resolve the `install [account|domain\user] [password]` arguments
    ///
    /// Returns `None` when no account was given on the command line.
    pub fn from_cli(account: Option<&str>, password: Option<&str>) -> Result<Option<Self>> {
        match (account, password) {
            (None, _) => Ok(None),
            (Some(user), Some(password)) => Self::user(user, password).map(Some),
            (Some(name), None) => name.parse().map(Some),
        }
    }

    /// Account name handed to the registry (`None` = LocalSystem)
    pub fn account_name(&self) -> Option<String> {
        match self {
            ServiceAccount::LocalService => Some(r"NT AUTHORITY\LocalService".to_string()),
            ServiceAccount::NetworkService => Some(r"NT AUTHORITY\NetworkService".to_string()),
            ServiceAccount::LocalSystem => None,
            ServiceAccount::User { username, .. } => Some(username.clone()),
        }
    }

    /// Password handed to the registry, only set for user accounts
    pub fn password(&self) -> Option<&str> {
        match self {
            ServiceAccount::User { password, .. } => Some(password),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let ServiceAccount::User { username, password } = self {
            if username.is_empty() {
                return Err(ServiceError::InvalidSettings(
                    "user account requires a username".into(),
                ));
            }
            if password.is_empty() {
                return Err(ServiceError::InvalidSettings(format!(
                    "user account '{}' requires a password",
                    username
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for ServiceAccount {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "localservice" => Ok(ServiceAccount::LocalService),
            "networkservice" => Ok(ServiceAccount::NetworkService),
            "localsystem" => Ok(ServiceAccount::LocalSystem),
            _ => Err(ServiceError::InvalidAccount(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builtin_accounts() {
        assert_eq!(
            "LocalService".parse::<ServiceAccount>().unwrap(),
            ServiceAccount::LocalService
        );
        assert_eq!(
            "networkservice".parse::<ServiceAccount>().unwrap(),
            ServiceAccount::NetworkService
        );
        assert!(matches!(
            "Guest".parse::<ServiceAccount>(),
            Err(ServiceError::InvalidAccount(_))
        ));
    }

    #[test]
    fn test_from_cli() {
        assert_eq!(ServiceAccount::from_cli(None, None).unwrap(), None);
        assert_eq!(
            ServiceAccount::from_cli(Some("LocalSystem"), None).unwrap(),
            Some(ServiceAccount::LocalSystem)
        );

        let user = ServiceAccount::from_cli(Some(r"CORP\svc"), Some("secret"))
            .unwrap()
            .unwrap();
        assert_eq!(user.account_name().as_deref(), Some(r"CORP\svc"));
        assert_eq!(user.password(), Some("secret"));

        assert!(ServiceAccount::from_cli(Some(r"CORP\svc"), Some("")).is_err());
    }

    #[test]
    fn test_account_names() {
        assert_eq!(ServiceAccount::LocalSystem.account_name(), None);
        assert_eq!(
            ServiceAccount::NetworkService.account_name().as_deref(),
            Some(r"NT AUTHORITY\NetworkService")
        );
        assert_eq!(ServiceAccount::LocalService.password(), None);
    }
}
