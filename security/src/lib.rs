// security/src/lib.rs
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use chrono::Utc;
use std::fmt;
use uuid::Uuid;

use models::medical::{User, UserRole};

pub mod middleware;
pub mod roles;

pub use middleware::{authorize, bearer_token, require_permission};
pub use roles::{permissions, RolesConfig};

/// User login data transfer object (DTO).
#[derive(Debug, Deserialize, Serialize)]
pub struct UserLogin {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims for JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // Subject (user id)
    pub username: String,
    pub role: UserRole,
    pub role_id: u32,
    pub tenant_id: Option<Uuid>,
    pub token_type: TokenType,
    pub iat: u64, // Issued at
    pub exp: u64, // Expiration time
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Custom authentication errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    InvalidToken(String),
    TokenExpired,
    WrongTokenType,
    PermissionDenied(String),
    InternalError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::MissingToken => write!(f, "Missing or malformed Authorization header"),
            AuthError::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::WrongTokenType => write!(f, "Token type not accepted here"),
            AuthError::PermissionDenied(perm) => write!(f, "Permission denied: requires '{}'", perm),
            AuthError::InternalError(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Signing material and token lifetimes.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

fn now_secs() -> Result<u64, AuthError> {
    u64::try_from(Utc::now().timestamp()).map_err(|_| AuthError::InternalError("system clock is before 1970".into()))
}

impl JwtKeys {
    pub fn new(secret: &[u8], access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    fn claims_for(&self, user: &User, role_id: u32, token_type: TokenType) -> Result<Claims, AuthError> {
        let now = now_secs()?;
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        Ok(Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            role_id,
            tenant_id: user.tenant_id,
            token_type,
            iat: now,
            exp: now + ttl,
        })
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("Failed to encode JWT: {}", e)))
    }

    /// Issues an access/refresh pair for `user`.
    pub fn issue_pair(&self, user: &User, role_id: u32) -> Result<TokenPair, AuthError> {
        let access = self.claims_for(user, role_id, TokenType::Access)?;
        let refresh = self.claims_for(user, role_id, TokenType::Refresh)?;
        Ok(TokenPair {
            access_token: self.encode(&access)?,
            refresh_token: self.encode(&refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl_secs,
        })
    }

    /// Decodes and validates a JWT, insisting on the expected token type.
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;
        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }
}
