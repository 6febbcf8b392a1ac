#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the ticket lifecycle
//!
//! These tests verify that:
//! 1. A login session issues service tickets that validate exactly once
//! 2. Concurrent validations of one ticket have a single winner
//! 3. Tickets are bound to the service they were issued for
//! 4. Logout revokes the whole session tree and reports relying parties
//! 5. Expired tickets are rejected and reclaimed by the cleaner

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{APP, MAIL, STRICT, harness, login};
use futures::future::join_all;
use serde_json::json;
use sso_sdk::{
    InvalidTicketReason, LogoutType, Service, SessionState, SsoError, TicketType,
    UnauthorizedServiceReason,
};

#[tokio::test]
async fn login_grant_validate_logout() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);

    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();
    assert_eq!(tgt.ticket_type(), TicketType::TicketGranting);
    assert!(tgt.id().as_str().starts_with("TGT-"));

    let st = cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();
    assert!(st.id().as_str().starts_with("ST-"));
    assert_eq!(st.service(), Some(&app));

    let assertion = cas.validate_service_ticket(st.id(), &app).await.unwrap();
    assert_eq!(assertion.principal.id(), "casuser");
    assert!(!assertion.from_new_login);
    assert!(!assertion.is_proxied());
    // Only `mail` is released to the app.
    assert_eq!(assertion.principal.attributes().len(), 1);
    assert_eq!(
        assertion.principal.attributes()["mail"],
        vec![json!("casuser@example.org")]
    );
    assert_eq!(
        assertion
            .primary_authentication()
            .unwrap()
            .principal()
            .attributes()
            .len(),
        2
    );

    let again = cas.validate_service_ticket(st.id(), &app).await.unwrap_err();
    assert!(matches!(again, SsoError::TicketAlreadyConsumed { .. }));

    let requests = cas.destroy_ticket_granting_ticket(tgt.id()).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].service, app);

    let after = cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap_err();
    assert_eq!(
        after,
        SsoError::InvalidTicket {
            ticket_id: tgt.id().abbreviated(),
            reason: InvalidTicketReason::Absent,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_validations_have_one_winner() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();
    let st = cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();

    let attempts = (0..32).map(|_| {
        let cas = Arc::clone(&cas);
        let id = st.id().clone();
        let app = app.clone();
        tokio::spawn(async move { cas.validate_service_ticket(&id, &app).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let consumed = results
        .iter()
        .filter(|r| matches!(r, Err(SsoError::TicketAlreadyConsumed { .. })))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(consumed, 31);
}

#[tokio::test]
async fn ticket_presented_by_another_service_is_burned() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);
    let mail = Service::new(MAIL);
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();
    let st = cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();

    let err = cas.validate_service_ticket(st.id(), &mail).await.unwrap_err();
    assert_eq!(
        err,
        SsoError::ServiceMismatch {
            service: MAIL.to_owned()
        }
    );
    let err = cas.validate_service_ticket(st.id(), &app).await.unwrap_err();
    assert!(matches!(err, SsoError::TicketAlreadyConsumed { .. }));
}

#[tokio::test]
async fn logout_reports_each_service_once_in_issuance_order() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);
    let inbox = Service::new(format!("{MAIL}/inbox"));
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();

    let first = cas.grant_service_ticket(tgt.id(), &inbox, None).await.unwrap();
    cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();
    cas.grant_service_ticket(tgt.id(), &inbox, None).await.unwrap();
    assert_eq!(
        cas.session_state(tgt.id()).await.unwrap(),
        SessionState::ServiceGranted
    );
    assert_eq!(cas.statistics().await.unwrap().service_tickets, 3);

    let requests = cas.destroy_ticket_granting_ticket(tgt.id()).await.unwrap();
    let services: Vec<_> = requests.iter().map(|r| r.service.id()).collect();
    assert_eq!(services, vec![inbox.id(), APP]);
    assert_eq!(requests[0].ticket_id, *first.id());
    assert_eq!(requests[0].logout_type, LogoutType::FrontChannel);
    assert_eq!(requests[1].logout_type, LogoutType::BackChannel);

    let stats = cas.statistics().await.unwrap();
    assert_eq!((stats.sessions, stats.service_tickets), (0, 0));
    assert!(
        cas.destroy_ticket_granting_ticket(tgt.id())
            .await
            .unwrap()
            .is_empty(),
        "logout is idempotent"
    );
    assert_eq!(
        cas.session_state(tgt.id()).await.unwrap(),
        SessionState::NoSession
    );
}

#[tokio::test]
async fn expired_tickets_are_rejected_then_reclaimed() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();
    let st = cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();

    h.clock.advance(Duration::from_secs(11));
    let err = cas.validate_service_ticket(st.id(), &app).await.unwrap_err();
    assert_eq!(
        err,
        SsoError::InvalidTicket {
            ticket_id: st.id().abbreviated(),
            reason: InvalidTicketReason::Expired,
        }
    );

    // Using the session keeps it alive within the idle window.
    cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();
    h.clock.advance(Duration::from_secs(3 * 60 * 60));
    let err = cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap_err();
    assert!(matches!(
        err,
        SsoError::InvalidTicket {
            reason: InvalidTicketReason::Expired,
            ..
        }
    ));
    assert_eq!(
        cas.session_state(tgt.id()).await.unwrap(),
        SessionState::Terminated
    );

    let report = h.module.cleaner().run_once().await.unwrap().unwrap();
    assert_eq!(report.sessions_expired, 1);
    assert_eq!(report.tickets_deleted, 3);
    assert_eq!(report.logout_requests.len(), 1);
    assert_eq!(cas.statistics().await.unwrap().sessions, 0);
}

#[tokio::test]
async fn services_opting_out_of_sso_need_credentials() {
    let h = harness();
    let cas = h.module.client();
    let strict = Service::new(STRICT);
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();

    let err = cas.grant_service_ticket(tgt.id(), &strict, None).await.unwrap_err();
    assert_eq!(
        err,
        SsoError::UnauthorizedService {
            service: STRICT.to_owned(),
            reason: UnauthorizedServiceReason::SsoNotAllowed,
        }
    );

    let st = cas
        .grant_service_ticket(tgt.id(), &strict, Some(login("casuser", "Mellon")))
        .await
        .unwrap();
    let assertion = cas.validate_service_ticket(st.id(), &strict).await.unwrap();
    assert!(assertion.from_new_login);
}

#[tokio::test]
async fn renew_for_another_user_is_refused() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();

    let err = cas
        .grant_service_ticket(tgt.id(), &app, Some(login("other", "Mellon")))
        .await
        .unwrap_err();
    assert_eq!(err, SsoError::MixedPrincipal);
    assert_eq!(
        cas.session_state(tgt.id()).await.unwrap(),
        SessionState::Authenticated,
        "session is untouched"
    );
}

#[tokio::test]
async fn unknown_services_get_nothing() {
    let h = harness();
    let cas = h.module.client();
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();

    let err = cas
        .grant_service_ticket(tgt.id(), &Service::new("https://evil.example.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SsoError::UnauthorizedService {
            reason: UnauthorizedServiceReason::NotRegistered,
            ..
        }
    ));
}

#[tokio::test]
async fn administrative_queries() {
    let h = harness();
    let cas = h.module.client();
    let app = Service::new(APP);
    let tgt = cas
        .create_ticket_granting_ticket(login("casuser", "Mellon"))
        .await
        .unwrap();
    cas.grant_service_ticket(tgt.id(), &app, None).await.unwrap();
    cas.create_ticket_granting_ticket(login("other", "Mellon"))
        .await
        .unwrap();

    assert_eq!(cas.tickets_for_principal("casuser").await.unwrap().len(), 2);
    let issued = cas.tickets_for_service(&app).await.unwrap();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].principal_id(), "casuser");
    assert!(cas.tickets_for_service(&Service::new(MAIL)).await.unwrap().is_empty());

    let requests = cas.revoke_principal_sessions("casuser").await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(cas.tickets_for_principal("casuser").await.unwrap().is_empty());
    assert_eq!(cas.tickets_for_principal("other").await.unwrap().len(), 1);
    assert!(cas.tickets_for_service(&app).await.unwrap().is_empty());
}
