use amplify_todo_auth::{Auth, AuthError, AuthOptions, UserAttributes};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn access_token(sub: &str, username: &str, exp: i64) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": sub, "username": username, "token_use": "access", "exp": exp }),
        &EncodingKey::from_secret(b"test"),
    )
    .unwrap()
}

fn auth_for(server: &MockServer) -> Auth {
    Auth::new(
        &server.uri(),
        "test-client-id",
        Client::new(),
        AuthOptions::default(),
    )
}

async fn mount_sign_in(server: &MockServer, expires_in: i64) {
    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AWSCognitoIdentityProviderService.InitiateAuth",
        ))
        .and(body_partial_json(json!({ "AuthFlow": "USER_PASSWORD_AUTH" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": {
                "AccessToken": access_token("sub-1", "sub-1", 1_900_000_000),
                "IdToken": "id-token",
                "RefreshToken": "refresh-token",
                "ExpiresIn": expires_in,
                "TokenType": "Bearer"
            },
            "ChallengeParameters": {}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sign_up_sends_nickname_attribute() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AWSCognitoIdentityProviderService.SignUp"))
        .and(header("Content-Type", "application/x-amz-json-1.1"))
        .and(body_partial_json(json!({
            "ClientId": "test-client-id",
            "Username": "user@example.com",
            "UserAttributes": [
                {"Name": "email", "Value": "user@example.com"},
                {"Name": "nickname", "Value": "투두왕"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "UserConfirmed": false,
            "UserSub": "new-sub",
            "CodeDeliveryDetails": {
                "Destination": "u***@e***",
                "DeliveryMedium": "EMAIL",
                "AttributeName": "email"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    let attributes = UserAttributes::new()
        .with("email", "user@example.com")
        .with("nickname", "투두왕");

    let result = auth
        .sign_up("user@example.com", "Passw0rd!", &attributes)
        .await
        .expect("sign up failed");

    assert!(!result.user_confirmed);
    assert_eq!(result.user_sub, "new-sub");
    assert_eq!(
        result.code_delivery_details.unwrap().delivery_medium.as_deref(),
        Some("EMAIL")
    );
}

#[tokio::test]
async fn test_sign_up_existing_user_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "UsernameExistsException",
            "message": "An account with the given email already exists."
        })))
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    let err = auth
        .sign_up("user@example.com", "Passw0rd!", &UserAttributes::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some("UsernameExistsException"));
}

#[tokio::test]
async fn test_confirm_sign_up() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AWSCognitoIdentityProviderService.ConfirmSignUp",
        ))
        .and(body_partial_json(json!({ "ConfirmationCode": "123456" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    auth.confirm_sign_up("user@example.com", "123456")
        .await
        .expect("confirm failed");
}

#[tokio::test]
async fn test_sign_in_stores_session() {
    let mock_server = MockServer::start().await;
    mount_sign_in(&mock_server, 3600).await;

    let auth = auth_for(&mock_server);
    assert!(auth.get_session().is_none());

    let session = auth
        .sign_in("user@example.com", "Passw0rd!")
        .await
        .expect("sign in failed");

    assert_eq!(session.refresh_token.as_deref(), Some("refresh-token"));
    assert_eq!(session.owner(), "sub-1::sub-1");
    assert_eq!(
        auth.get_session().map(|s| s.access_token),
        Some(session.access_token)
    );
}

#[tokio::test]
async fn test_sign_in_wrong_password() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "NotAuthorizedException",
            "message": "Incorrect username or password."
        })))
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    let err = auth.sign_in("user@example.com", "nope").await.unwrap_err();

    assert!(matches!(err, AuthError::NotAuthorized(_)));
    assert!(auth.get_session().is_none());
}

#[tokio::test]
async fn test_sign_in_challenge_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ChallengeName": "NEW_PASSWORD_REQUIRED",
            "Session": "opaque",
            "ChallengeParameters": {}
        })))
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    let err = auth.sign_in("user@example.com", "temp").await.unwrap_err();

    match err {
        AuthError::ChallengeRequired(name) => assert_eq!(name, "NEW_PASSWORD_REQUIRED"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_session_is_refreshed() {
    let mock_server = MockServer::start().await;
    // An already-expired session forces the refresh path.
    mount_sign_in(&mock_server, -10).await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "AuthParameters": { "REFRESH_TOKEN": "refresh-token" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": {
                "AccessToken": access_token("sub-1", "sub-1", 1_900_000_500),
                "IdToken": "new-id-token",
                "ExpiresIn": 3600,
                "TokenType": "Bearer"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    auth.sign_in("user@example.com", "Passw0rd!").await.unwrap();

    let session = auth.valid_session().await.expect("refresh failed");
    assert_eq!(session.id_token, "new-id-token");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-token"));
    assert!(!session.is_expired());
}

#[tokio::test]
async fn test_fetch_user_attributes() {
    let mock_server = MockServer::start().await;
    mount_sign_in(&mock_server, 3600).await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AWSCognitoIdentityProviderService.GetUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Username": "sub-1",
            "UserAttributes": [
                {"Name": "sub", "Value": "sub-1"},
                {"Name": "email", "Value": "user@example.com"},
                {"Name": "nickname", "Value": "투두왕"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    auth.sign_in("user@example.com", "Passw0rd!").await.unwrap();

    let attrs = auth.fetch_user_attributes().await.expect("get user failed");
    assert_eq!(attrs.get("nickname"), Some("투두왕"));
    assert_eq!(attrs.get("email"), Some("user@example.com"));
}

#[tokio::test]
async fn test_fetch_user_attributes_requires_session() {
    let mock_server = MockServer::start().await;
    let auth = auth_for(&mock_server);

    let err = auth.fetch_user_attributes().await.unwrap_err();
    assert!(matches!(err, AuthError::MissingSession));
}

#[tokio::test]
async fn test_update_user_attributes_sends_nickname() {
    let mock_server = MockServer::start().await;
    mount_sign_in(&mock_server, 3600).await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AWSCognitoIdentityProviderService.UpdateUserAttributes",
        ))
        .and(body_partial_json(json!({
            "AccessToken": access_token("sub-1", "sub-1", 1_900_000_000),
            "UserAttributes": [{"Name": "nickname", "Value": "새이름"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "CodeDeliveryDetailsList": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    auth.sign_in("user@example.com", "Passw0rd!").await.unwrap();

    auth.update_user_attributes(&UserAttributes::new().with("nickname", "새이름"))
        .await
        .expect("update attributes failed");
}

#[tokio::test]
async fn test_update_user_attributes_requires_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    let err = auth
        .update_user_attributes(&UserAttributes::new().with("nickname", "새이름"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingSession));
}

#[tokio::test]
async fn test_sign_out_clears_session_even_on_failure() {
    let mock_server = MockServer::start().await;
    mount_sign_in(&mock_server, 3600).await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AWSCognitoIdentityProviderService.GlobalSignOut",
        ))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let auth = auth_for(&mock_server);
    auth.sign_in("user@example.com", "Passw0rd!").await.unwrap();

    let result = auth.sign_out().await;
    assert!(result.is_err());
    assert!(auth.get_session().is_none());
}
