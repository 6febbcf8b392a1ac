//! Authentication of proxy callback endpoints.

use async_trait::async_trait;
use sso_sdk::{
    AuthenticationHandler, Credential, FailureKind, HandlerError, HandlerResult, Principal,
    Service,
};

pub const PROXY_CALLBACK_HANDLER: &str = "proxy_callback";

/// Accepts an absolute https callback URL as proof of the proxying
/// service's identity. The principal is the callback URL itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyCallbackHandler;

#[async_trait]
impl AuthenticationHandler for ProxyCallbackHandler {
    fn name(&self) -> &str {
        PROXY_CALLBACK_HANDLER
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::HttpBasedService { .. })
    }

    async fn authenticate(
        &self,
        credential: &Credential,
        _service: Option<&Service>,
    ) -> Result<HandlerResult, HandlerError> {
        let Credential::HttpBasedService { callback_url } = credential else {
            return Err(HandlerError::new(
                FailureKind::UnsupportedCredential,
                "not a callback credential",
            ));
        };
        let url = url::Url::parse(callback_url)
            .map_err(|e| HandlerError::bad_credentials(format!("invalid callback url: {e}")))?;
        if url.scheme() != "https" || url.host().is_none() {
            return Err(HandlerError::bad_credentials(
                "callback url must be an absolute https url",
            ));
        }
        Ok(HandlerResult {
            handler_name: PROXY_CALLBACK_HANDLER.to_owned(),
            credential: credential.metadata(),
            principal: Principal::with_id(callback_url.clone()),
            warnings: Vec::new(),
        })
    }
}
