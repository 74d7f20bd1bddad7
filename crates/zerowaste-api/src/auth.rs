use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use zerowaste_db::Database;
use zerowaste_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use zerowaste_types::models::{Profile, UserRole};

use crate::error::{ApiError, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Who a set of credentials belongs to. The role always comes from the
/// stored profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

pub trait Authenticator {
    fn authenticate(&self, credentials: &LoginRequest) -> Result<Identity, ApiError>;
}

impl Authenticator for Database {
    fn authenticate(&self, credentials: &LoginRequest) -> Result<Identity, ApiError> {
        let rejected = || ApiError::Auth("invalid email or password".into());

        let user = self
            .get_user_by_email(credentials.email.trim())
            .map_err(ApiError::RemoteRead)?
            .ok_or_else(rejected)?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(format!("stored password hash is invalid: {}", e)))?;
        Argon2::default()
            .verify_password(credentials.password.as_bytes(), &parsed_hash)
            .map_err(|_| rejected())?;

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|e| ApiError::Internal(format!("stored user id is invalid: {}", e)))?;
        let profile = self
            .get_profile(user_id)
            .map_err(ApiError::RemoteRead)?
            .ok_or_else(|| ApiError::Internal(format!("user {} has no profile", user_id)))?;

        Ok(Identity {
            user_id,
            email: user.email,
            role: profile.role,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_registration(&req)?;

    let ttl = state.token_ttl;
    let secret = state.jwt_secret.clone();
    let (user_id, role, token) = blocking(&state, move |db| {
        if db.get_user_by_email(&email).map_err(ApiError::RemoteRead)?.is_some() {
            return Err(ApiError::Conflict("an account with this email already exists".into()));
        }

        let password_hash = hash_password(&req.password)?;
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            email,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            avatar_url: None,
            role: req.role,
            organization_name: req.organization_name,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        // A concurrent registration can still take the email after the check above.
        if !db
            .create_account(&profile, &password_hash)
            .map_err(ApiError::RemoteWrite)?
        {
            return Err(ApiError::Conflict("an account with this email already exists".into()));
        }

        let identity = Identity {
            user_id: profile.id,
            email: profile.email,
            role: profile.role,
        };
        let token = create_token(&secret, &identity, ttl)?;
        Ok((identity.user_id, identity.role, token))
    })
    .await?;

    info!("Registered {} account {}", role, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            role,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ttl = state.token_ttl;
    let secret = state.jwt_secret.clone();
    let (identity, token) = blocking(&state, move |db| {
        let identity = db.authenticate(&req)?;
        let token = create_token(&secret, &identity, ttl)?;
        Ok((identity, token))
    })
    .await?;

    Ok(Json(LoginResponse {
        user_id: identity.user_id,
        email: identity.email,
        role: identity.role,
        token,
    }))
}

/// Checks a registration form and returns the normalised email.
fn validate_registration(req: &RegisterRequest) -> Result<String, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::Validation("email address is invalid".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation("passwords do not match".into()));
    }
    if req.role == UserRole::Admin {
        return Err(ApiError::Validation("admin accounts cannot be self-registered".into()));
    }
    if req.first_name.trim().is_empty() {
        return Err(ApiError::Validation("first name is required".into()));
    }
    Ok(email)
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

pub fn create_token(
    secret: &str,
    identity: &Identity,
    ttl: chrono::Duration,
) -> Result<String, ApiError> {
    let exp = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| ApiError::Internal(format!("token lifetime {} is out of range", ttl)))?;
    let claims = Claims {
        sub: identity.user_id,
        email: identity.email.clone(),
        role: identity.role,
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}

/// Create the configured admin account if no account uses that email yet.
/// Returns true when an account was created.
pub fn seed_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<bool> {
    let email = email.trim().to_lowercase();
    if db.get_user_by_email(&email)?.is_some() {
        return Ok(false);
    }

    let password_hash = hash_password(password)?;
    let now = Utc::now();
    let profile = Profile {
        id: Uuid::new_v4(),
        email,
        first_name: "Admin".to_string(),
        last_name: String::new(),
        avatar_url: None,
        role: UserRole::Admin,
        organization_name: None,
        is_verified: true,
        created_at: now,
        updated_at: now,
    };
    if !db.create_account(&profile, &password_hash)? {
        return Ok(false);
    }
    info!("Seeded admin account {}", profile.email);
    Ok(true)
}
