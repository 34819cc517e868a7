use super::*;

fn cfg(ttl_seconds: i64) -> SessionConfig {
    SessionConfig {
        admin_password: "open-sesame".into(),
        secret: "devsecret".into(),
        ttl_seconds,
    }
}

#[test]
fn wrong_password_is_rejected() {
    let err = issue_session(&cfg(60), "guess").expect_err("wrong password");
    assert!(matches!(err, SessionError::WrongPassword));
}

#[test]
fn password_check_ignores_length_and_prefix_matches() {
    assert!(password_matches("open-sesame", "open-sesame"));
    assert!(!password_matches("open", "open-sesame"));
    assert!(!password_matches("open-sesame-please", "open-sesame"));
    assert!(!password_matches("", "open-sesame"));
    assert!(matches!(
        issue_session(&cfg(60), "open-sesam"),
        Err(SessionError::WrongPassword)
    ));
}

#[test]
fn issued_token_carries_admin_subject() {
    let cfg = cfg(60);
    let issued = issue_session(&cfg, "open-sesame").expect("token");
    assert!(issued.expires_at > Utc::now());

    let decoded = decode::<serde_json::Value>(
        &issued.token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )
    .expect("decode");
    assert_eq!(decoded.claims["sub"], "admin");

    validate_session(&cfg, &issued.token).expect("valid");
}

#[test]
fn expired_token_fails_validation() {
    let cfg = cfg(-120);
    let issued = issue_session(&cfg, "open-sesame").expect("token");
    let err = validate_session(&cfg, &issued.token).expect_err("expired");
    assert!(matches!(err, SessionError::InvalidToken(_)));
}

#[test]
fn token_signed_with_other_secret_fails_validation() {
    let issued = issue_session(&cfg(60), "open-sesame").expect("token");
    let other = SessionConfig {
        secret: "rotated".into(),
        ..cfg(60)
    };
    assert!(validate_session(&other, &issued.token).is_err());
}
