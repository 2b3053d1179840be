mod common;

use common::*;
use forum_identity::identity::{IdentityConfig, IdentityError, IdentityService};
use forum_identity::jwt::{AppKeys, Claims, now_secs, parse_and_verify};
use std::time::Duration;

#[tokio::test]
async fn test_login_issues_claims_for_the_app() {
    let (service, _db) = identity_service().await;
    let user_id = service.register("alice@example.com", PASSWORD).await.unwrap();

    let pair = service
        .login("alice@example.com", PASSWORD, APP_ID)
        .await
        .unwrap();
    let now = now_secs().unwrap();

    match parse_and_verify(&pair.access_token, APP_SECRET.as_bytes()).unwrap() {
        Claims::Access(claims) => {
            assert_eq!(claims.uid, user_id);
            assert_eq!(claims.email, "alice@example.com");
            assert_eq!(claims.app_id, APP_ID);
            let expected = now + service.config().access_ttl.as_secs();
            assert!(claims.exp.abs_diff(expected) <= 1);
        }
        other => panic!("expected access claims, got {:?}", other.token_type()),
    }

    match parse_and_verify(&pair.refresh_token, APP_SECRET.as_bytes()).unwrap() {
        Claims::Refresh(claims) => {
            assert_eq!(claims.uid, user_id);
            let expected = now + service.config().refresh_ttl.as_secs();
            assert!(claims.exp.abs_diff(expected) <= 1);
        }
        other => panic!("expected refresh claims, got {:?}", other.token_type()),
    }
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (service, _db) = identity_service().await;
    service.register("alice@example.com", PASSWORD).await.unwrap();

    assert_eq!(
        service.register("alice@example.com", "other").await.unwrap_err(),
        IdentityError::AlreadyExists
    );
    assert_eq!(
        service.register("ALICE@example.com", "other").await.unwrap_err(),
        IdentityError::AlreadyExists
    );
}

#[tokio::test]
async fn test_login_failures() {
    let (service, _db) = identity_service().await;
    service.register("alice@example.com", PASSWORD).await.unwrap();

    assert_eq!(
        service
            .login("alice@example.com", "wrong", APP_ID)
            .await
            .unwrap_err(),
        IdentityError::InvalidCredentials
    );
    assert_eq!(
        service
            .login("nobody@example.com", PASSWORD, APP_ID)
            .await
            .unwrap_err(),
        IdentityError::InvalidCredentials
    );
    assert_eq!(
        service
            .login("alice@example.com", PASSWORD, 99)
            .await
            .unwrap_err(),
        IdentityError::InvalidAppId
    );
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let (service, db) = identity_service().await;
    let (user_id, pair) = register_and_login(&service, "alice@example.com").await;

    let rotated = service
        .refresh_tokens(&pair.refresh_token, APP_ID)
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, pair.refresh_token);

    // The old token is revoked, the new one is live
    assert!(!db
        .tokens()
        .is_valid(user_id, APP_ID, &pair.refresh_token)
        .await
        .unwrap());
    assert!(db
        .tokens()
        .is_valid(user_id, APP_ID, &rotated.refresh_token)
        .await
        .unwrap());

    assert_eq!(
        service
            .refresh_tokens(&pair.refresh_token, APP_ID)
            .await
            .unwrap_err(),
        IdentityError::TokenNotValid
    );

    let user = service
        .validate_token(&rotated.access_token, APP_ID)
        .await
        .unwrap();
    assert_eq!(user.user_id, user_id);
}

#[tokio::test]
async fn test_refresh_rejects_access_token_and_other_app() {
    let (service, _db) = identity_service().await;
    let (_, pair) = register_and_login(&service, "alice@example.com").await;

    assert_eq!(
        service
            .refresh_tokens(&pair.access_token, APP_ID)
            .await
            .unwrap_err(),
        IdentityError::InvalidTokenType
    );
    assert_eq!(
        service
            .refresh_tokens(&pair.refresh_token, OTHER_APP_ID)
            .await
            .unwrap_err(),
        IdentityError::InvalidToken
    );
    assert_eq!(
        service.refresh_tokens("garbage", APP_ID).await.unwrap_err(),
        IdentityError::InvalidToken
    );
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let (service, _db) = identity_service().await;
    let (_, laptop) = register_and_login(&service, "alice@example.com").await;
    let phone = service
        .login("alice@example.com", PASSWORD, APP_ID)
        .await
        .unwrap();

    service.logout(&laptop.refresh_token, APP_ID).await.unwrap();

    assert!(service.refresh_tokens(&phone.refresh_token, APP_ID).await.is_ok());
    assert_eq!(
        service
            .refresh_tokens(&laptop.refresh_token, APP_ID)
            .await
            .unwrap_err(),
        IdentityError::TokenNotValid
    );
}

#[tokio::test]
async fn test_validate_rejects_wrong_secret() {
    let (service, _db) = identity_service().await;
    let (_, pair) = register_and_login(&service, "alice@example.com").await;

    assert_eq!(
        service
            .validate_token(&pair.access_token, OTHER_APP_ID)
            .await
            .unwrap_err(),
        IdentityError::InvalidSignature
    );
}

#[tokio::test]
async fn test_validate_rejects_expired_token() {
    let (service, db) = identity_service().await;
    register_and_login(&service, "alice@example.com").await;
    let user = db
        .users()
        .get_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();

    let keys = AppKeys::new(APP_SECRET.as_bytes()).unwrap();
    let issued = keys
        .issue_pair_at(
            &user,
            APP_ID,
            Duration::from_secs(60),
            Duration::from_secs(600),
            now_secs().unwrap() - 3600,
        )
        .unwrap();

    assert_eq!(
        service
            .validate_token(&issued.pair.access_token, APP_ID)
            .await
            .unwrap_err(),
        IdentityError::Expired
    );
}

#[tokio::test]
async fn test_validate_rejects_refresh_token() {
    let (service, _db) = identity_service().await;
    let (_, pair) = register_and_login(&service, "alice@example.com").await;

    assert_eq!(
        service
            .validate_token(&pair.refresh_token, APP_ID)
            .await
            .unwrap_err(),
        IdentityError::InvalidTokenType
    );
    assert!(
        service
            .validate_token("not.a.token", APP_ID)
            .await
            .unwrap_err()
            .is_unauthenticated()
    );
}

#[tokio::test]
async fn test_access_token_outlives_logout() {
    let (service, _db) = identity_service().await;
    let (_, pair) = register_and_login(&service, "alice@example.com").await;

    service.logout(&pair.refresh_token, APP_ID).await.unwrap();
    // Logging out twice is fine
    service.logout(&pair.refresh_token, APP_ID).await.unwrap();

    assert!(service.validate_token(&pair.access_token, APP_ID).await.is_ok());
}

#[tokio::test]
async fn test_logout_rejects_bad_tokens() {
    let (service, _db) = identity_service().await;
    let (_, pair) = register_and_login(&service, "alice@example.com").await;

    assert_eq!(
        service.logout(&pair.access_token, APP_ID).await.unwrap_err(),
        IdentityError::InvalidTokenType
    );
    assert_eq!(
        service.logout("garbage", APP_ID).await.unwrap_err(),
        IdentityError::InvalidToken
    );
    assert_eq!(
        service.logout(&pair.refresh_token, 99).await.unwrap_err(),
        IdentityError::InvalidAppId
    );
}

#[tokio::test]
async fn test_is_admin() {
    let (service, db) = identity_service().await;
    let admin_id = service.register("root@example.com", PASSWORD).await.unwrap();
    let user_id = service.register("bob@example.com", PASSWORD).await.unwrap();
    db.users().set_admin("root@example.com", true).await.unwrap();

    assert!(service.is_admin(admin_id).await.unwrap());
    assert!(!service.is_admin(user_id).await.unwrap());
    assert_eq!(
        service.is_admin(12345).await.unwrap_err(),
        IdentityError::InvalidAppId
    );
}

#[tokio::test]
async fn test_custom_ttls() {
    let db = identity_db().await;
    let config = IdentityConfig {
        access_ttl: Duration::from_secs(30),
        refresh_ttl: Duration::from_secs(120),
    };
    let service = IdentityService::with_database(db, config);
    let (_, pair) = register_and_login(&service, "alice@example.com").await;
    let now = now_secs().unwrap();

    let exp = parse_and_verify(&pair.access_token, APP_SECRET.as_bytes())
        .unwrap()
        .expires_at();
    assert!(exp.abs_diff(now + 30) <= 1);
}
