//! Account store for the static SSO authentication plugin.

use std::collections::HashMap;

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sso_sdk::{FailureKind, HandlerError, Principal};
use subtle::ConstantTimeEq;

use crate::config::{AccountStatus, PasswordEncoding, StaticSsoAuthnPluginConfig, UserAccount};

/// Static account service.
///
/// Holds the configured accounts and the outstanding one-time codes:
/// - passwords are compared in constant time, after hashing when stored as SHA-256
/// - account status is only revealed once the password matched
/// - a one-time code is removed the first time it is redeemed
pub struct Service {
    encoding: PasswordEncoding,
    users: HashMap<String, UserAccount>,
    codes: Mutex<HashMap<String, Vec<SecretString>>>,
}

impl Service {
    /// Create a service from plugin configuration.
    #[must_use]
    pub fn from_config(cfg: &StaticSsoAuthnPluginConfig) -> Self {
        let codes = cfg
            .one_time_code
            .iter()
            .flat_map(|otp| otp.codes.iter())
            .map(|(user, codes)| (user.clone(), codes.clone()))
            .collect();

        Self {
            encoding: cfg.password.encoding,
            users: cfg
                .users
                .iter()
                .map(|(name, account)| (name.clone(), account.clone()))
                .collect(),
            codes: Mutex::new(codes),
        }
    }

    /// Check a username/password pair and return the account's principal.
    ///
    /// # Errors
    /// [`FailureKind::AccountNotFound`] for unknown users,
    /// [`FailureKind::BadCredentials`] for a wrong password, and the kind
    /// matching the account status for accounts that are not active.
    pub fn check_password(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Principal, HandlerError> {
        if username.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(HandlerError::bad_credentials("blank username or password"));
        }
        let account = self.users.get(username).ok_or_else(|| {
            HandlerError::new(FailureKind::AccountNotFound, "no such account")
        })?;
        if !password_matches(self.encoding, &account.password, password) {
            return Err(HandlerError::bad_credentials("password does not match"));
        }

        let refused = match account.status {
            AccountStatus::Active => {
                return Ok(Principal::new(username, account.attributes.clone()));
            }
            AccountStatus::Disabled => FailureKind::AccountDisabled,
            AccountStatus::Locked => FailureKind::AccountLocked,
            AccountStatus::Expired => FailureKind::CredentialsExpired,
            AccountStatus::MustChangePassword => FailureKind::AccountPasswordMustChange,
        };
        Err(HandlerError::new(refused, format!("account is {}", refused.as_str())))
    }

    /// Redeem a one-time code. A code is accepted once.
    ///
    /// # Errors
    /// [`FailureKind::AccountNotFound`] when the user has no outstanding
    /// codes, [`FailureKind::BadCredentials`] when the code is not one of them.
    pub fn redeem_code(&self, username: &str, code: &SecretString) -> Result<Principal, HandlerError> {
        let mut codes = self.codes.lock();
        let outstanding = codes
            .get_mut(username)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| HandlerError::new(FailureKind::AccountNotFound, "no codes issued"))?;

        let presented = code.expose_secret().as_bytes();
        let position = outstanding
            .iter()
            .position(|c| constant_time_eq(c.expose_secret().as_bytes(), presented))
            .ok_or_else(|| HandlerError::bad_credentials("code does not match"))?;
        outstanding.swap_remove(position);

        Ok(Principal::with_id(username))
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Codes not yet redeemed by `username`.
    #[must_use]
    pub fn outstanding_codes(&self, username: &str) -> usize {
        self.codes.lock().get(username).map_or(0, Vec::len)
    }
}

fn password_matches(
    encoding: PasswordEncoding,
    stored: &SecretString,
    presented: &SecretString,
) -> bool {
    match encoding {
        PasswordEncoding::Plain => constant_time_eq(
            stored.expose_secret().as_bytes(),
            presented.expose_secret().as_bytes(),
        ),
        PasswordEncoding::Sha256 => {
            let Ok(expected) = hex::decode(stored.expose_secret().trim()) else {
                return false;
            };
            let actual = Sha256::digest(presented.expose_secret().as_bytes());
            constant_time_eq(&expected, actual.as_slice())
        }
    }
}

/// Whether a stored SHA-256 password is a well-formed hex digest.
#[must_use]
pub fn is_sha256_digest(stored: &SecretString) -> bool {
    hex::decode(stored.expose_secret().trim()).is_ok_and(|bytes| bytes.len() == 32)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
