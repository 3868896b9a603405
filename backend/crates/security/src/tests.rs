//! Scenario tests for the security crate
//! HTTP flows are driven through the assembled router with `oneshot`.

#[cfg(test)]
mod support {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::{Extension, Router};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, Response};
    use kernel::clock::ManualClock;
    use kernel::principal::{Principal, UserRole};
    use platform::client::TrustedProxies;
    use platform::password::ClearTextPassword;
    use platform::token::{HmacTokenService, TokenConfig};
    use tower::ServiceExt;

    use crate::{
        AbuseTracker, AlertLog, InMemoryCredentialRepository, SecurityAppState, SecurityConfig,
        TracingAlertNotifier, auth_router, guard_api, security_router,
    };

    pub const PEER: [u8; 4] = [1, 2, 3, 4];
    pub const USER_EMAIL: &str = "x@y.com";
    pub const USER_PASSWORD: &str = "Corr3ct#Horse";
    pub const ADMIN_EMAIL: &str = "admin@y.com";
    pub const ADMIN_PASSWORD: &str = "Adm1n#Battery";

    pub struct TestApp {
        pub router: Router,
        pub tracker: Arc<AbuseTracker>,
        pub clock: Arc<ManualClock>,
        pub tokens: Arc<HmacTokenService>,
    }

    impl TestApp {
        pub fn new() -> Self {
            Self::with_config(SecurityConfig::default())
        }

        pub fn with_config(config: SecurityConfig) -> Self {
            Self::build(config, TrustedProxies::default())
        }

        /// Peer is a trusted reverse proxy, so `X-Forwarded-For` is honoured
        pub fn behind_proxy() -> Self {
            Self::build(SecurityConfig::default(), TrustedProxies::new([PEER.into()]))
        }

        fn build(config: SecurityConfig, trusted: TrustedProxies) -> Self {
            let clock = Arc::new(ManualClock::new(1_700_000_000_000));
            let alerts = Arc::new(AlertLog::new(
                config.alert_capacity,
                clock.clone(),
                Arc::new(TracingAlertNotifier),
            ));
            let tracker = Arc::new(AbuseTracker::new(Arc::new(config), clock.clone(), alerts));
            let tokens = Arc::new(HmacTokenService::new(TokenConfig::development(), clock.clone()));

            let credentials = Arc::new(InMemoryCredentialRepository::new());
            credentials
                .insert(
                    USER_EMAIL,
                    &ClearTextPassword::new(USER_PASSWORD).unwrap(),
                    Principal::new("user-1", UserRole::User),
                )
                .unwrap();
            credentials
                .insert(
                    ADMIN_EMAIL,
                    &ClearTextPassword::new(ADMIN_PASSWORD).unwrap(),
                    Principal::new("admin-1", UserRole::Admin),
                )
                .unwrap();

            let state = SecurityAppState::new(tracker.clone(), tokens.clone());
            let api = Router::new()
                .nest("/auth", auth_router(credentials, tracker.clone(), tokens.clone()))
                .nest("/security", security_router(state.clone()));
            let router = Router::new()
                .nest("/api", guard_api(api, state))
                .layer(Extension(trusted))
                .layer(MockConnectInfo(SocketAddr::from((PEER, 40000))));

            Self {
                router,
                tracker,
                clock,
                tokens,
            }
        }

        pub fn token_for(&self, id: &str, role: UserRole) -> String {
            self.tokens.issue(&Principal::new(id, role)).unwrap().token
        }

        pub async fn send(&self, req: Request<Body>) -> (Response<Body>, serde_json::Value) {
            let resp = self.router.clone().oneshot(req).await.unwrap();
            let (parts, body) = resp.into_parts();
            let bytes = to_bytes(body, usize::MAX).await.unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            (Response::from_parts(parts, Body::empty()), json)
        }
    }

    pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn admin_post(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        let mut req = post_json(uri, body);
        req.headers_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());
        req
    }

    pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    pub fn login(email: &str, password: &str) -> Request<Body> {
        post_json(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
    }
}

#[cfg(test)]
mod login_tests {
    use super::support::*;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[tokio::test]
    async fn test_login_success_returns_token() {
        let app = TestApp::new();
        let (resp, body) = app.send(login(USER_EMAIL, USER_PASSWORD)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body["userId"], "user-1");
        assert_eq!(body["role"], "user");
        assert!(body["token"].as_str().is_some_and(|t| t.contains('.')));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let app = TestApp::new();
        let (wrong, wrong_body) = app.send(login(USER_EMAIL, "Wr0ng#Password")).await;
        let (unknown, unknown_body) = app.send(login("nobody@y.com", USER_PASSWORD)).await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_body["detail"], unknown_body["detail"]);
    }

    #[tokio::test]
    async fn test_five_failures_block_even_correct_credentials_until_expiry() {
        let app = TestApp::new();
        for _ in 0..5 {
            let (resp, _) = app.send(login(USER_EMAIL, "Wr0ng#Password")).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        assert!(app.tracker.is_blocked("1.2.3.4"));

        let (resp, body) = app.send(login(USER_EMAIL, USER_PASSWORD)).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Access denied");

        app.clock.advance(Duration::from_secs(60 * 60));
        let (resp, _) = app.send(login(USER_EMAIL, USER_PASSWORD)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    fn spoofed(mut req: axum::http::Request<axum::body::Body>, ip: &str) -> axum::http::Request<axum::body::Body> {
        req.headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        req
    }

    #[tokio::test]
    async fn test_forwarded_header_cannot_escape_block() {
        let app = TestApp::new();
        for _ in 0..5 {
            app.send(login(USER_EMAIL, "Wr0ng#Password")).await;
        }
        assert!(app.tracker.is_blocked("1.2.3.4"));

        let (resp, _) = app
            .send(spoofed(login(USER_EMAIL, USER_PASSWORD), "9.9.9.9"))
            .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_forwarded_header_cannot_redirect_block() {
        let app = TestApp::new();
        for _ in 0..5 {
            app.send(spoofed(login(USER_EMAIL, "Wr0ng#Password"), "8.8.8.8"))
                .await;
        }
        assert!(!app.tracker.is_blocked("8.8.8.8"));
        assert!(app.tracker.is_blocked("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_still_locks_out() {
        let app = TestApp::new();
        for i in 0..5 {
            let (resp, _) = app
                .send(spoofed(login(USER_EMAIL, "Wr0ng#Password"), &format!("9.9.9.{i}")))
                .await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        let (resp, _) = app
            .send(spoofed(login(USER_EMAIL, "Wr0ng#Password"), "9.9.9.99"))
            .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_trusted_proxy_keys_on_forwarded_client() {
        let app = TestApp::behind_proxy();
        for _ in 0..5 {
            app.send(spoofed(login(USER_EMAIL, "Wr0ng#Password"), "203.0.113.5"))
                .await;
        }
        assert!(app.tracker.is_blocked("203.0.113.5"));
        assert!(!app.tracker.is_blocked("1.2.3.4"));

        // A forged left-most entry does not hide the real client
        let (resp, _) = app
            .send(spoofed(login(USER_EMAIL, USER_PASSWORD), "6.6.6.6, 203.0.113.5"))
            .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let (resp, _) = app
            .send(spoofed(login(USER_EMAIL, USER_PASSWORD), "198.51.100.7"))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_success_forgives_earlier_failures() {
        let app = TestApp::new();
        for _ in 0..3 {
            app.send(login(USER_EMAIL, "Wr0ng#Password")).await;
        }
        let (resp, _) = app.send(login(USER_EMAIL, USER_PASSWORD)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(app.tracker.failure_count("1.2.3.4", USER_EMAIL), 0);
    }
}

#[cfg(test)]
mod admin_tests {
    use super::support::*;
    use axum::http::StatusCode;
    use kernel::principal::UserRole;
    use serde_json::json;

    use crate::{AlertFilter, AlertKind};

    #[tokio::test]
    async fn test_admin_endpoint_requires_token() {
        let app = TestApp::new();
        let (resp, _) = app.send(get("/api/security/stats", None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let (resp, _) = app.send(get("/api/security/stats", Some("garbage.token"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden_and_alerted() {
        let app = TestApp::new();
        let token = app.token_for("user-1", UserRole::User);
        let (resp, _) = app.send(get("/api/security/blocked-ips", Some(&token))).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let alerts = app
            .tracker
            .alerts()
            .query(&AlertFilter::kind(AlertKind::UnauthorizedAccess));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].identifier.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_admin_reads_stats() {
        let app = TestApp::new();
        app.tracker.block_ip("9.9.9.9", "test");
        let token = app.token_for("admin-1", UserRole::SuperAdmin);

        let (resp, body) = app.send(get("/api/security/stats", Some(&token))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body["blockedIps"], 1);
        assert_eq!(body["alerts"]["total"], 1);
    }

    #[tokio::test]
    async fn test_block_and_unblock_via_api() {
        let app = TestApp::behind_proxy();
        let token = app.token_for("admin-1", UserRole::Admin);

        let (resp, body) = app
            .send(admin_post("/api/security/block", &token, json!({ "ip": "9.9.9.9" })))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body["ip"], "9.9.9.9");

        let mut blocked_req = get("/api/security/stats", Some(&token));
        blocked_req
            .headers_mut()
            .insert("x-forwarded-for", "9.9.9.9".parse().unwrap());
        let (resp, _) = app.send(blocked_req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let (resp, _) = app.send(get("/api/security/blocked-ips", Some(&token))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let (_, body) = app
            .send(admin_post("/api/security/unblock", &token, json!({ "ip": "9.9.9.9" })))
            .await;
        assert_eq!(body["unblocked"], true);
        assert!(!app.tracker.is_blocked("9.9.9.9"));
    }

    #[tokio::test]
    async fn test_block_rejects_invalid_ip() {
        let app = TestApp::new();
        let token = app.token_for("admin-1", UserRole::Admin);
        let (resp, _) = app
            .send(admin_post("/api/security/block", &token, json!({ "ip": "not-an-ip" })))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_attempts_listing_and_clear() {
        let app = TestApp::new();
        app.tracker.record_failed_attempt("5.5.5.5", "a@y.com");
        app.tracker.record_failed_attempt("5.5.5.5", "b@y.com");
        let token = app.token_for("admin-1", UserRole::Admin);

        let (_, body) = app.send(get("/api/security/failed-attempts", Some(&token))).await;
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (_, body) = app
            .send(admin_post(
                "/api/security/failed-attempts/clear",
                &token,
                json!({ "ip": "5.5.5.5", "identifier": "a@y.com" }),
            ))
            .await;
        assert_eq!(body["cleared"], 1);
    }

    #[tokio::test]
    async fn test_alerts_filter_by_severity() {
        let app = TestApp::new();
        for _ in 0..5 {
            app.tracker.record_failed_attempt("5.5.5.5", "a@y.com");
        }
        let token = app.token_for("admin-1", UserRole::Admin);

        let (resp, body) = app
            .send(get("/api/security/alerts?severity=high&limit=10", Some(&token)))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let alerts = body.as_array().cloned().unwrap_or_default();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["type"], "repeated_failed_logins");

        let (resp, _) = app
            .send(get("/api/security/alerts?severity=extreme", Some(&token)))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod guard_tests {
    use super::support::*;
    use axum::http::{StatusCode, header};
    use kernel::principal::UserRole;
    use platform::rate_limit::RateLimitConfig;
    use serde_json::json;
    use std::time::Duration;

    use crate::SecurityConfig;

    #[tokio::test]
    async fn test_password_strength_feedback() {
        let app = TestApp::new();
        let (resp, body) = app
            .send(post_json("/api/security/password-strength", json!({ "password": "abc" })))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body["isStrong"], false);
        let feedback = body["feedback"].as_array().cloned().unwrap_or_default();
        assert!(feedback.iter().any(|f| f == "Password must be at least 8 characters long"));

        let (_, body) = app
            .send(post_json(
                "/api/security/password-strength",
                json!({ "password": "Sup3r#Secret" }),
            ))
            .await;
        assert_eq!(body["isStrong"], true);
    }

    #[tokio::test]
    async fn test_suspicious_query_is_rejected_and_recorded() {
        let app = TestApp::new();
        let req = post_json(
            "/api/security/password-strength?q=%3Cscript%3Ealert(1)",
            json!({ "password": "whatever" }),
        );
        let (resp, _) = app.send(req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let token = app.token_for("admin-1", UserRole::Admin);
        let (_, body) = app.send(get("/api/security/suspicious", Some(&token))).await;
        let alerts = body.as_array().cloned().unwrap_or_default();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["context"]["category"], "cross_site_scripting");
    }

    #[tokio::test]
    async fn test_suspicious_body_is_rejected() {
        let app = TestApp::new();
        let token = app.token_for("admin-1", UserRole::Admin);
        let req = admin_post(
            "/api/security/block",
            &token,
            json!({ "ip": "9.9.9.9", "reason": "1' UNION SELECT * FROM users" }),
        );
        let (resp, _) = app.send(req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!app.tracker.is_blocked("9.9.9.9"));
    }

    #[tokio::test]
    async fn test_symbols_in_password_are_not_flagged() {
        let app = TestApp::new();
        let (resp, _) = app
            .send(post_json(
                "/api/security/password-strength",
                json!({ "password": "a'; --$(B1" }),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_generic_rate_limit_sets_retry_after() {
        let app = TestApp::with_config(SecurityConfig {
            api_rate_limit: RateLimitConfig::new(2, Duration::from_secs(60)),
            ..Default::default()
        });
        let body = json!({ "password": "abc" });
        for _ in 0..2 {
            let (resp, _) = app
                .send(post_json("/api/security/password-strength", body.clone()))
                .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let (resp, _) = app
            .send(post_json("/api/security/password-strength", body.clone()))
            .await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            resp.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("60")
        );

        app.clock.advance(Duration::from_secs(60));
        let (resp, _) = app
            .send(post_json("/api/security/password-strength", body))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

#[cfg(test)]
mod credential_tests {
    use kernel::principal::{Principal, UserRole};
    use platform::password::ClearTextPassword;

    use crate::InMemoryCredentialRepository;
    use crate::domain::repository::CredentialRepository;

    #[test]
    fn test_identifier_lookup_is_case_insensitive() {
        let repo = InMemoryCredentialRepository::new();
        let password = ClearTextPassword::new("Sup3r#Secret").unwrap();
        repo.insert(" Mixed@Case.com", &password, Principal::new("u1", UserRole::Moderator))
            .unwrap();

        let found = tokio_test::block_on(repo.verify("mixed@case.COM", &password)).unwrap();
        assert_eq!(found.map(|p| p.role), Some(UserRole::Moderator));
    }
}
