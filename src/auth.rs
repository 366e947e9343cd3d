//! Session auth: signed cookies and role assignment.
//!
//! Sessions are stateless HMAC-SHA256 tokens: a base64url JSON payload of
//! claims plus a hex signature, verified on every request. Roles are derived
//! from the email domain at login time — staff addresses on the configured
//! domain are admins, everyone else is a regular user.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "akb_session";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub uid: String,
    pub email: String,
    pub role: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl SessionClaims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Role for an email address: the configured staff domain gets admin.
pub fn role_for_email(email: &str, admin_domain: &str) -> &'static str {
    let suffix = format!("@{}", admin_domain);
    if email.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        ROLE_ADMIN
    } else {
        ROLE_USER
    }
}

#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl_days: i64,
}

impl SessionSigner {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.session_secret.as_bytes().to_vec(),
            ttl_days: config.session_ttl_days,
        }
    }

    /// Issue a signed session token for a verified user.
    pub fn issue(&self, uid: &str, email: &str, role: &str) -> String {
        let claims = SessionClaims {
            uid: uid.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: (Utc::now() + Duration::days(self.ttl_days)).timestamp(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &SessionClaims) -> String {
        // Serializing a plain struct of strings and an i64 cannot fail.
        let payload = serde_json::to_vec(claims).unwrap_or_default();
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        format!("{}.{}", payload_b64, self.sign(payload_b64.as_bytes()))
    }

    fn sign(&self, data: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a token's signature and expiry; `None` for anything invalid.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        let (payload_b64, signature_hex) = token.split_once('.')?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(payload_b64.as_bytes());
        let signature = hex::decode(signature_hex).ok()?;
        mac.verify_slice(&signature).ok()?;

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let claims: SessionClaims = serde_json::from_slice(&payload).ok()?;

        if claims.exp <= Utc::now().timestamp() {
            return None;
        }
        Some(claims)
    }

    /// `Set-Cookie` value establishing the session.
    pub fn cookie(&self, token: &str) -> String {
        let max_age = self.ttl_days * 24 * 60 * 60;
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE, token, max_age
        )
    }

    /// `Set-Cookie` value clearing the session.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
    }
}

/// Pull the session token out of a `Cookie` request header.
pub fn session_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new(&AuthConfig {
            session_secret: "0123456789abcdef0123456789abcdef".to_string(),
            admin_domain: "dreamcollegepath.com".to_string(),
            session_ttl_days: 14,
        })
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let s = signer();
        let token = s.issue("u1", "staff@dreamcollegepath.com", ROLE_ADMIN);
        let claims = s.verify(&token).expect("valid token");
        assert_eq!(claims.uid, "u1");
        assert_eq!(claims.email, "staff@dreamcollegepath.com");
        assert!(claims.is_admin());
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let s = signer();
        let token = s.issue("u1", "student@example.com", ROLE_USER);
        let (payload, sig) = token.split_once('.').unwrap();

        let mut claims: SessionClaims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        claims.role = ROLE_ADMIN.to_string();
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());

        assert!(s.verify(&format!("{}.{}", forged_payload, sig)).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let s = signer();
        let token = s.issue("u1", "a@b.com", ROLE_USER);

        let other = SessionSigner::new(&AuthConfig {
            session_secret: "another-secret-another-secret".to_string(),
            admin_domain: "dreamcollegepath.com".to_string(),
            session_ttl_days: 14,
        });
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let s = signer();
        let claims = SessionClaims {
            uid: "u1".to_string(),
            email: "a@b.com".to_string(),
            role: ROLE_USER.to_string(),
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let token = s.encode(&claims);
        assert!(s.verify(&token).is_none());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let s = signer();
        assert!(s.verify("").is_none());
        assert!(s.verify("no-dot-here").is_none());
        assert!(s.verify("abc.nothex!").is_none());
    }

    #[test]
    fn role_assignment_by_domain() {
        assert_eq!(
            role_for_email("counselor@dreamcollegepath.com", "dreamcollegepath.com"),
            ROLE_ADMIN
        );
        assert_eq!(
            role_for_email("Counselor@DreamCollegePath.com", "dreamcollegepath.com"),
            ROLE_ADMIN
        );
        assert_eq!(
            role_for_email("student@gmail.com", "dreamcollegepath.com"),
            ROLE_USER
        );
        // Domain must match the full suffix after '@'.
        assert_eq!(
            role_for_email("x@notdreamcollegepath.com.evil.com", "dreamcollegepath.com"),
            ROLE_USER
        );
    }

    #[test]
    fn cookie_parsing() {
        let header = format!("theme=dark; {}=tok123; lang=en", SESSION_COOKIE);
        assert_eq!(session_from_cookie_header(&header), Some("tok123"));
        assert_eq!(session_from_cookie_header("theme=dark"), None);
    }
}
