use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::Service;

/// Discriminant of a [`Credential`], used by handlers to declare support and
/// recorded in authentication metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    UsernamePassword,
    OneTimeCode,
    Certificate,
    HttpBasedService,
    Token,
}

impl CredentialKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsernamePassword => "UsernamePasswordCredential",
            Self::OneTimeCode => "OneTimeCodeCredential",
            Self::Certificate => "CertificateCredential",
            Self::HttpBasedService => "HttpBasedServiceCredential",
            Self::Token => "TokenCredential",
        }
    }
}

/// Protocol-specific proof of identity.
///
/// Credentials live only for the duration of one authentication transaction:
/// they are deliberately not `Serialize`, and secret parts are wrapped in
/// [`SecretString`] so `Debug` output redacts them.
#[derive(Debug, Clone)]
pub enum Credential {
    UsernamePassword {
        username: String,
        password: SecretString,
    },
    OneTimeCode {
        username: String,
        code: SecretString,
    },
    Certificate {
        subject_dn: String,
        fingerprint: String,
    },
    /// Proof of control over a proxy callback endpoint.
    HttpBasedService { callback_url: String },
    /// Opaque signed assertion or bearer token issued to `subject`.
    Token {
        subject: String,
        token: SecretString,
    },
}

impl Credential {
    #[must_use]
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    #[must_use]
    pub fn one_time_code(username: impl Into<String>, code: impl Into<String>) -> Self {
        Self::OneTimeCode {
            username: username.into(),
            code: SecretString::from(code.into()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::UsernamePassword { .. } => CredentialKind::UsernamePassword,
            Self::OneTimeCode { .. } => CredentialKind::OneTimeCode,
            Self::Certificate { .. } => CredentialKind::Certificate,
            Self::HttpBasedService { .. } => CredentialKind::HttpBasedService,
            Self::Token { .. } => CredentialKind::Token,
        }
    }

    /// Non-secret identifier of the credential (username, subject, callback URL).
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::UsernamePassword { username, .. } | Self::OneTimeCode { username, .. } => {
                username
            }
            Self::Certificate { subject_dn, .. } => subject_dn,
            Self::HttpBasedService { callback_url } => callback_url,
            Self::Token { subject, .. } => subject,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> CredentialMetadata {
        CredentialMetadata {
            id: self.id().to_owned(),
            kind: self.kind(),
        }
    }
}

/// The part of a credential that may outlive the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMetadata {
    pub id: String,
    pub kind: CredentialKind,
}

/// One or more credentials presented together, plus the target service.
#[derive(Debug, Clone)]
pub struct AuthenticationTransaction {
    credentials: Vec<Credential>,
    service: Option<Service>,
    remember_me: bool,
}

impl AuthenticationTransaction {
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials,
            service: None,
            remember_me: false,
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    /// Request a long-term session.
    #[must_use]
    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    #[must_use]
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    #[must_use]
    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    #[must_use]
    pub fn is_remember_me(&self) -> bool {
        self.remember_me
    }

    /// Whether any credential of the given kind is present.
    #[must_use]
    pub fn has_credential_of(&self, kind: CredentialKind) -> bool {
        self.credentials.iter().any(|c| c.kind() == kind)
    }
}
