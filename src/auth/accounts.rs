//! Account registration, login, and email verification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::jwt;
use crate::db::models::UserView;
use crate::state::AppState;

// --- Request/response types ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

// --- Input sanitization ---

/// Remove control characters and trim surrounding whitespace.
fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Usernames: alphanumeric, underscore, hyphen; 3–20 chars after
/// stripping everything else.
fn sanitize_username(username: &str) -> Result<String, String> {
    let sanitized: String = sanitize_input(username)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if sanitized.len() < 3 || sanitized.len() > 20 {
        return Err("username length must be between 3 and 20 characters".to_string());
    }
    Ok(sanitized)
}

/// Emails are lowercased; only a basic shape check, the verification
/// mail is the real test.
fn sanitize_email(email: &str) -> Result<String, String> {
    let sanitized = sanitize_input(&email.to_lowercase());
    if !sanitized.contains('@') || !sanitized.contains('.') {
        return Err("invalid email format".to_string());
    }
    Ok(sanitized)
}

// --- Password hashing ---

/// Salted SHA-256, stored as `salt$digest` with both halves hex-encoded.
fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    let salt_hex = hex::encode(salt);
    let digest = digest_with_salt(&salt_hex, password);
    format!("{salt_hex}${digest}")
}

fn digest_with_salt(salt_hex: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a password against a stored `salt$digest` value.
fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt_hex, digest)) => digest_with_salt(salt_hex, password) == digest,
        None => false,
    }
}

/// Random token for the verification mail link.
fn generate_verification_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

// --- Handlers ---

/// POST /auth/register — create an unverified account and send the
/// verification mail. Rate-limited per IP at the router.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, String)> {
    let username =
        sanitize_username(&req.username).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let email = sanitize_email(&req.email).map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let password = sanitize_input(&req.password);
    if password.len() < 6 || password.len() > 32 {
        return Err((
            StatusCode::BAD_REQUEST,
            "password length must be between 6 and 32 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&password);
    let verification_token = generate_verification_token();

    let db = state.db.clone();
    let (user_id, token_for_mail) = {
        let username = username.clone();
        let email = email.clone();
        let verification_token = verification_token.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;

            let username_taken: bool = conn
                .query_row(
                    "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
                    [&username],
                    |row| row.get(0),
                )
                .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()))?;
            if username_taken {
                return Err((StatusCode::CONFLICT, "Username already taken".to_string()));
            }

            let email_taken: bool = conn
                .query_row(
                    "SELECT EXISTS (SELECT 1 FROM users WHERE email = ?1)",
                    [&email],
                    |row| row.get(0),
                )
                .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()))?;
            if email_taken {
                return Err((StatusCode::CONFLICT, "Email already taken".to_string()));
            }

            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO users (username, email, password_hash, verified, verification_token, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                rusqlite::params![username, email, password_hash, verification_token, now],
            )
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string()))?;

            Ok::<_, (StatusCode, String)>((conn.last_insert_rowid(), verification_token))
        })
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??
    };

    tracing::info!(user_id, username = %username, "User registered");

    let verify_url = format!(
        "{}/auth/verify-email?token={}",
        state.public_base_url, token_for_mail
    );
    state.mailer.send_verification(&email, &username, &verify_url).await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id,
        }),
    ))
}

/// GET /auth/verify-email?token= — flip the account to verified and
/// burn the token.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let token = sanitize_input(&params.token);
    if token.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing verification token".to_string()));
    }

    let db = state.db.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        conn.execute(
            "UPDATE users SET verified = 1, verification_token = NULL WHERE verification_token = ?1",
            [&token],
        )
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    if updated == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid or expired verification token".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "message": "Email verified successfully" })))
}

/// POST /auth/login — verify credentials and hand out an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let email = sanitize_email(&req.email).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let password = sanitize_input(&req.password);

    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        let result = conn.query_row(
            "SELECT id, username, email, password_hash, verified FROM users WHERE email = ?1",
            [&email],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, bool>(4)?,
                ))
            },
        );
        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(_) => Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())),
        }
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    // Same response for unknown email and wrong password
    let (user_id, username, email, password_hash, verified) = row.ok_or((
        StatusCode::UNAUTHORIZED,
        "Invalid email or password".to_string(),
    ))?;

    if !verify_password(&password, &password_hash) {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ));
    }

    if !verified {
        return Err((StatusCode::FORBIDDEN, "Email not verified".to_string()));
    }

    let access_token = jwt::issue_access_token(&state.jwt_secret, user_id, &username)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to issue token".to_string()))?;

    tracing::info!(user_id, username = %username, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        user: UserView {
            user_id,
            username,
            email,
        },
    }))
}
