//! Identity & access gate (component A): password verification, JWT
//! issuance/verification, role/permission authorization. Rate limiting lives
//! in [`crate::middleware::auth`], which reads the same [`AuthConfig`].
//!
//! Time is injected via [`JwtClock`] rather than read from the system clock
//! directly inside token validation, so tests can exercise expiry/skew
//! behavior deterministically and so validation never panics on a clock
//! that has drifted before the epoch.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use logintel_core::{AuthError, Role, SessionToken, TokenKind, User, UserId, UserView};

/// PBKDF2 iteration count. The spec requires at least 100,000; this sits
/// comfortably above that floor.
pub const PBKDF2_ITERATIONS: u32 = 120_000;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

/// Abstraction over "now" so JWT expiry/skew validation is deterministic in
/// tests and never depends on the system clock having moved forward.
pub trait JwtClock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}


/// Wraps the bearer-token signing secret so it never prints in full via
/// `Debug` or logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, String> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err("jwt secret must not be empty".to_string());
        }
        Ok(Self(SecretString::from(secret)))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

/// Access tokens expire in 30 minutes; refresh tokens in a longer window
/// (configured in days).
pub const DEFAULT_ACCESS_TOKEN_SECS: i64 = 30 * 60;
pub const DEFAULT_REFRESH_TOKEN_SECS: i64 = 14 * 24 * 60 * 60;
/// Industry-standard tolerance for clock drift between issuer and verifier.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,
    pub jwt_algorithm: Algorithm,
    pub access_token_secs: i64,
    pub refresh_token_secs: i64,
    pub clock_skew_secs: i64,
    pub clock: Arc<dyn JwtClock>,
    pub environment: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("access_token_secs", &self.access_token_secs)
            .field("refresh_token_secs", &self.refresh_token_secs)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("environment", &self.environment)
            .finish()
    }
}

impl AuthConfig {
    /// Environment variables:
    /// - `LOGINTEL_JWT_SECRET` (default: an insecure sentinel, rejected by
    ///   `validate_for_production`)
    /// - `LOGINTEL_ACCESS_TOKEN_SECS` (default `1800`)
    /// - `LOGINTEL_REFRESH_TOKEN_SECS` (default 14 days)
    /// - `LOGINTEL_JWT_CLOCK_SKEW_SECS` (default `60`)
    /// - `LOGINTEL_ENVIRONMENT` (default `development`)
    pub fn from_env() -> Self {
        let secret = std::env::var("LOGINTEL_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());
        Self {
            jwt_secret: JwtSecret::new(secret).expect("jwt secret must not be empty"),
            jwt_algorithm: Algorithm::HS256,
            access_token_secs: std::env::var("LOGINTEL_ACCESS_TOKEN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ACCESS_TOKEN_SECS),
            refresh_token_secs: std::env::var("LOGINTEL_REFRESH_TOKEN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REFRESH_TOKEN_SECS),
            clock_skew_secs: std::env::var("LOGINTEL_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CLOCK_SKEW_SECS),
            clock: Arc::new(SystemClock),
            environment: std::env::var("LOGINTEL_ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Rejects an insecure-default or too-short secret when running in
    /// production; only warns in development.
    pub fn validate_for_production(&self) -> Result<(), String> {
        let is_production = self.environment == "production";
        if self.jwt_secret.is_insecure_default() || self.jwt_secret.len() < 32 {
            let msg = "jwt secret is missing, default, or shorter than 32 characters";
            if is_production {
                return Err(msg.to_string());
            }
            tracing::warn!(msg);
        }
        Ok(())
    }
}

/// JWT claim set. Compact by design - the access context carried on the
/// wire, not the full `User` record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub token_kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, token_kind: TokenKind, ttl_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now();
        Self {
            sub: user.user_id.to_string(),
            role: user.role,
            permissions: user.effective_permissions().into_iter().collect(),
            token_kind,
            iat: now,
            exp: now + ttl_secs,
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        clock.now() >= self.exp
    }
}

/// Authenticated request context, extracted from a verified JWT and
/// injected into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: HashSet<String>,
    pub token_kind: TokenKind,
}

impl AuthContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn require_role(&self, role: Role) -> Result<(), AuthError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole {
                required: format!("{role:?}"),
            })
        }
    }

    pub fn require_permission(&self, permission: &str) -> Result<(), AuthError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions {
                required: permission.to_string(),
            })
        }
    }
}

/// Hashes a plaintext password with PBKDF2-HMAC-SHA256, at least 100,000
/// iterations, salted per-hash. Never transported or logged.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let params = pbkdf2::Params {
        rounds: PBKDF2_ITERATIONS,
        output_length: 32,
    };
    Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InvalidToken(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Issues a signed access/refresh token pair for a user. Callers check
/// `user.is_active` before calling this - an inactive user's existing
/// tokens remain valid until expiry (revocation is out of scope), but new
/// issuance is refused.
pub fn issue_token_pair(config: &AuthConfig, user: &User) -> Result<(String, String), AuthError> {
    if !user.is_active {
        return Err(AuthError::AuthenticationFailed);
    }
    let access = encode_claims(
        config,
        &Claims::new(user, TokenKind::Access, config.access_token_secs, config.clock.as_ref()),
    )?;
    let refresh = encode_claims(
        config,
        &Claims::new(user, TokenKind::Refresh, config.refresh_token_secs, config.clock.as_ref()),
    )?;
    Ok((access, refresh))
}

fn encode_claims(config: &AuthConfig, claims: &Claims) -> Result<String, AuthError> {
    let header = Header::new(config.jwt_algorithm);
    let key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    jsonwebtoken::encode(&header, claims, &key)
        .map_err(|e| AuthError::InvalidToken(format!("failed to sign token: {e}")))
}

/// Verifies a bearer token's signature, then validates `exp`/`iat` against
/// the injected clock (not `jsonwebtoken`'s own wall-clock check) so expiry
/// is deterministic under test clocks and tolerant of configured skew.
pub fn validate_token(config: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    let key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    let claims = data.claims;

    let now = config.clock.now();
    if now >= claims.exp + config.clock_skew_secs {
        return Err(AuthError::InvalidToken("token expired".to_string()));
    }
    if now + config.clock_skew_secs < claims.iat {
        return Err(AuthError::InvalidToken("token issued in the future".to_string()));
    }

    Ok(claims)
}

/// Bearer-token form: `Authorization: Bearer <token>`. Missing header ->
/// `auth_required`; present but invalid -> `invalid_token`.
pub fn authenticate(config: &AuthConfig, authorization_header: Option<&str>) -> Result<AuthContext, AuthError> {
    let header = authorization_header.ok_or(AuthError::AuthRequired)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidToken("missing Bearer prefix".to_string()))?;

    let claims = validate_token(config, token)?;
    let user_id: UserId = claims
        .sub
        .parse()
        .map_err(|_| AuthError::InvalidToken("malformed subject".to_string()))?;

    Ok(AuthContext {
        user_id,
        role: claims.role,
        permissions: claims.permissions.into_iter().collect(),
        token_kind: claims.token_kind,
    })
}

pub fn to_user_view(user: &User) -> UserView {
    UserView::from(user)
}

/// Short-lived, narrowly-scoped password reset claims. Deliberately not a
/// `TokenKind` variant: it authorizes exactly one action (setting a new
/// password for `sub`), never an access/refresh session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    purpose: String,
    iat: i64,
    exp: i64,
}

const RESET_TOKEN_PURPOSE: &str = "password_reset";
pub const PASSWORD_RESET_TTL_SECS: i64 = 15 * 60;

pub fn issue_password_reset_token(config: &AuthConfig, user: &User) -> Result<String, AuthError> {
    let now = config.clock.now();
    let claims = ResetClaims {
        sub: user.user_id.to_string(),
        purpose: RESET_TOKEN_PURPOSE.to_string(),
        iat: now,
        exp: now + PASSWORD_RESET_TTL_SECS,
    };
    let header = Header::new(config.jwt_algorithm);
    let key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| AuthError::InvalidToken(format!("failed to sign reset token: {e}")))
}

pub fn validate_password_reset_token(config: &AuthConfig, token: &str) -> Result<UserId, AuthError> {
    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    let key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let data = jsonwebtoken::decode::<ResetClaims>(token, &key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    let claims = data.claims;

    if claims.purpose != RESET_TOKEN_PURPOSE {
        return Err(AuthError::InvalidToken("not a password reset token".to_string()));
    }
    if config.clock.now() >= claims.exp + config.clock_skew_secs {
        return Err(AuthError::InvalidToken("reset token expired".to_string()));
    }

    claims
        .sub
        .parse()
        .map_err(|_| AuthError::InvalidToken("malformed subject".to_string()))
}

/// `SessionToken` equivalent of an issued access token, used only for the
/// `GET /auth/me`-adjacent bookkeeping a caller may want; not persisted.
pub fn session_token(user: &User, kind: TokenKind, ttl_secs: i64, now: DateTime<Utc>) -> SessionToken {
    SessionToken {
        user_id: user.user_id,
        role: user.role,
        permissions: user.effective_permissions(),
        issued_at: now,
        expires_at: now + chrono::Duration::seconds(ttl_secs),
        token_kind: kind,
    }
}
