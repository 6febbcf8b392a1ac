#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the authentication chain
//!
//! These tests verify that:
//! 1. Failures of every handler are reported together
//! 2. Handler names only leave the module when configured to
//! 3. Slow or unavailable handlers surface as retryable failures
//! 4. Policies and service requirements decide which handlers must succeed

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{APP, PasswordHandler, config, harness, harness_with, login};
use sso::config::AuthenticationPolicyConfig;
use sso_sdk::{
    AuthenticationHandler, AuthenticationTransaction, Credential, ExpirationPolicy, FailureKind,
    PolicyDenialReason, RegisteredService, Service, SsoError,
};

const SECURE: &str = "https://secure.example.org";

fn handlers(list: Vec<PasswordHandler>) -> Vec<Arc<dyn AuthenticationHandler>> {
    list.into_iter()
        .map(|h| Arc::new(h) as Arc<dyn AuthenticationHandler>)
        .collect()
}

fn failure(err: SsoError) -> sso_sdk::AuthenticationFailure {
    match err {
        SsoError::Authentication(failure) => failure,
        other => panic!("expected an authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn failures_of_every_handler_are_aggregated() {
    let h = harness_with(
        config(),
        handlers(vec![
            PasswordHandler::new("ldap", &[]),
            PasswordHandler::new("ad", &[])
                .with_order(1)
                .failing_with(FailureKind::AccountLocked),
        ]),
    );
    let err = h
        .module
        .client()
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap_err();

    let failure = failure(err);
    assert_eq!(failure.entries().len(), 2);
    assert!(failure.contains(FailureKind::BadCredentials));
    assert!(failure.contains(FailureKind::AccountLocked));
    assert!(failure.entries().iter().all(|e| e.handler.is_none()));
    assert!(!failure.is_system_failure());
}

#[tokio::test]
async fn handler_names_are_exposed_when_configured() {
    let mut cfg = config();
    cfg.authentication.expose_handler_names = true;
    let h = harness_with(
        cfg,
        handlers(vec![
            PasswordHandler::new("ldap", &[]),
            PasswordHandler::new("ad", &[]).with_order(1),
        ]),
    );
    let err = h
        .module
        .client()
        .create_ticket_granting_ticket(login("casuser", "wrong"))
        .await
        .unwrap_err();

    let names: Vec<_> = failure(err)
        .entries()
        .iter()
        .filter_map(|e| e.handler.clone())
        .collect();
    assert_eq!(names, vec!["ad", "ldap"]);
}

#[tokio::test(start_paused = true)]
async fn slow_handler_is_reported_unavailable() {
    let h = harness_with(
        config(),
        handlers(vec![
            PasswordHandler::new("ldap", &[("casuser", "Mellon")]).delayed(Duration::from_secs(5)),
        ]),
    );
    let err = h
        .module
        .client()
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(failure(err).contains(FailureKind::HandlerUnavailable));
}

#[tokio::test]
async fn chain_falls_through_to_the_next_handler() {
    let h = harness_with(
        config(),
        handlers(vec![
            PasswordHandler::new("ldap", &[]).failing_with(FailureKind::HandlerUnavailable),
            PasswordHandler::new("static", &[("casuser", "Mellon")]).with_order(1),
        ]),
    );
    let tgt = h
        .module
        .client()
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();

    let authentication = &tgt.granting_state().unwrap().authentication;
    assert!(authentication.has_successful_handler("static"));
    assert_eq!(
        authentication.failures().get("ldap"),
        Some(&FailureKind::HandlerUnavailable)
    );
    assert_eq!(authentication.principal().attributes().len(), 2);
}

#[tokio::test]
async fn not_prevented_policy_stops_on_outage() {
    let mut cfg = config();
    cfg.authentication.policy = AuthenticationPolicyConfig::NotPrevented;
    cfg.authentication.expose_handler_names = true;
    let h = harness_with(
        cfg,
        handlers(vec![
            PasswordHandler::new("ldap", &[]).failing_with(FailureKind::HandlerUnavailable),
            PasswordHandler::new("static", &[("casuser", "Mellon")]).with_order(1),
        ]),
    );
    let err = h
        .module
        .client()
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap_err();

    let failure = failure(err);
    assert_eq!(failure.entries().len(), 1);
    assert_eq!(failure.entries()[0].handler.as_deref(), Some("ldap"));
    assert!(failure.is_system_failure());
}

#[tokio::test]
async fn service_required_handler_runs_on_renew() {
    let mut cfg = config();
    let mut secure = RegisteredService::exact(7, SECURE);
    secure.access_strategy.required_handlers = vec!["otp".to_owned()];
    cfg.services.definitions.push(secure);
    let h = harness_with(
        cfg,
        handlers(vec![
            PasswordHandler::new("static", &[("casuser", "Mellon")]),
            PasswordHandler::new("otp", &[("casuser", "Mellon")])
                .with_order(1)
                .standby(),
        ]),
    );
    let cas = h.module.client();
    let service = Service::new(SECURE);

    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();
    assert!(
        !tgt.granting_state()
            .unwrap()
            .authentication
            .has_successful_handler("otp"),
        "standby handler stays out of plain logins"
    );
    let err = cas.grant_service_ticket(tgt.id(), &service, None).await.unwrap_err();
    assert_eq!(
        err,
        SsoError::PolicyDenied {
            service: SECURE.to_owned(),
            reason: PolicyDenialReason::RequiredHandlerNotSatisfied,
        }
    );

    let st = cas
        .grant_service_ticket(tgt.id(), &service, Some(login("casuser", "Mellon")))
        .await
        .unwrap();
    let assertion = cas.validate_service_ticket(st.id(), &service).await.unwrap();
    assert!(assertion.from_new_login);
    assert!(
        assertion.chained_authentications[0].has_successful_handler("otp"),
        "renewed authentication replaces the session's"
    );

    // The upgraded session now satisfies the service without credentials.
    assert!(cas.grant_service_ticket(tgt.id(), &service, None).await.is_ok());
}

#[tokio::test]
async fn unsupported_credentials_are_rejected() {
    let h = harness();
    let err = h
        .module
        .client()
        .create_ticket_granting_ticket(AuthenticationTransaction::new(vec![
            Credential::one_time_code("casuser", "123456"),
        ]))
        .await
        .unwrap_err();
    assert!(failure(err).contains(FailureKind::UnsupportedCredential));

    let err = h
        .module
        .client()
        .create_ticket_granting_ticket(AuthenticationTransaction::new(Vec::new()))
        .await
        .unwrap_err();
    assert!(failure(err).contains(FailureKind::UnsupportedCredential));
}

#[tokio::test]
async fn remember_me_outlives_the_idle_timeout() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);

    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon").remember_me(true))
        .await
        .unwrap();
    assert!(matches!(
        tgt.meta.expiration_policy,
        ExpirationPolicy::TimeToLive { .. }
    ));

    h.clock.advance(Duration::from_secs(3 * 60 * 60));
    assert!(cas.grant_service_ticket(tgt.id(), &app, None).await.is_ok());
}
