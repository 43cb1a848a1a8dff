// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, password change, portfolio and payouts.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{
    body_json, create_test_app, doc, empty_request, file_request, json_request, token_for,
    TEST_PASSWORD,
};
use serde_json::json;
use taskilo_api::db::collections;
use taskilo_api::middleware::SESSION_COOKIE;
use tower::ServiceExt;

// ─── Session ─────────────────────────────────────────────────

#[tokio::test]
async fn login_sets_a_usable_session_cookie() {
    let app = create_test_app();
    app.store.insert(
        collections::USERS,
        "user-1",
        doc(json!({"firstName": "Max", "user_type": "kunde"})),
    );

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "max@example.com", "password": TEST_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE}=")));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/profile")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["step1"]["firstName"], "Max");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "max@example.com", "password": "falsch"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::COOKIE, format!("{SESSION_COOKIE}=stale-token"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE}=;")));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn password_change_reauthenticates_first() {
    let app = create_test_app();
    let token = token_for("user-1", "max@example.com");

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/password",
            Some(&token),
            json!({"currentPassword": "falsch", "newPassword": "neuesPasswort"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.identity.password_updates.lock().unwrap().is_empty());

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/password",
            Some(&token),
            json!({"currentPassword": TEST_PASSWORD, "newPassword": "neuesPasswort"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.identity.password_updates.lock().unwrap().len(), 1);
}

// ─── Portfolio ───────────────────────────────────────────────

#[tokio::test]
async fn portfolio_add_with_staged_image_and_remove() {
    let app = create_test_app();
    app.store
        .insert(collections::COMPANIES, "user-1", doc(json!({"companyName": "Muster"})));
    let token = token_for("user-1", "max@example.com");

    let response = app
        .router
        .clone()
        .oneshot(file_request(
            "PUT",
            "/api/profile/files/portfolioImage",
            Some(&token),
            "bad.jpg",
            "image/jpeg",
            b"jpeg",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/portfolio",
            Some(&token),
            json!({"title": "Badsanierung", "description": "Komplett neu"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let item = body_json(response).await;
    let item_id = item["id"].as_str().unwrap().to_string();
    assert!(item["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("memory://portfolio/user-1/"));

    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/api/portfolio/files", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(empty_request(
            "DELETE",
            &format!("/api/portfolio/{item_id}"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.blobs.is_empty());

    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/api/portfolio", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!([]));
}

// ─── Payouts ─────────────────────────────────────────────────

#[tokio::test]
async fn quote_shows_fee_on_available_balance() {
    let app = create_test_app();
    let token = token_for("user-1", "max@example.com");
    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/api/payouts/quote", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"amount": 10000, "fee": 450, "netAmount": 9550, "currency": "eur"})
    );
}

#[tokio::test]
async fn payout_is_bounded_by_available_balance() {
    let app = create_test_app();
    let token = token_for("user-1", "max@example.com");

    for (amount, expected) in [
        (0, StatusCode::BAD_REQUEST),
        (10_001, StatusCode::CONFLICT),
        (10_000, StatusCode::OK),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/payouts",
                Some(&token),
                json!({"amount": amount}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "amount {amount}");
    }
    assert_eq!(*app.payments.payouts.lock().unwrap(), vec![10_000]);
}
