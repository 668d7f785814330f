//! Stand-in identity provider.
//!
//! Signs ID tokens shaped like the ones the real provider issues at login
//! (RS256, `kid` header, `iss`/`aud` derived from a project id) and publishes
//! the matching JWKS document. Keys are fixed 2048-bit RSA test keys checked
//! into `keys/`; they protect nothing.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

pub const TEST_PROJECT_ID: &str = "ebook-store-test";

pub const PRIMARY_KID: &str = "test-key-primary";
pub const ROTATED_KID: &str = "test-key-rotated";

const PRIMARY_PEM: &str = include_str!("../keys/primary.pem");
const ROTATED_PEM: &str = include_str!("../keys/rotated.pem");
const ROGUE_PEM: &str = include_str!("../keys/rogue.pem");

const PRIMARY_N: &str = "o9kLSlIH2mwGkhNwfljwaj7GhURkuP7X8BYszT9KrQVq2RPZSyG1OXpdXWYIRjrDS8Z0keEf-ebIt6pOkqUKNTj-Tf79P_q5nFOt3sjRyDJjO1A29M6QyfMlGanDYi4bBie8uQ7MIhaSavNUMZN_YIA4lsbFAMA5kCceBmjNLO5cqmGbXVAZoa6r4JU9D-dEC8vK5XBg19VhRrPnH_s_lmDRXoyj0uj1TF__-g80mOMDMiN3nViUqTyZPQf2F7BzKO7feJFwY-OmngeMelZUVF4JEb_jgg5odlnf4aeXkq2wQPjR_d7aPq94FuXuvzqyyjDvx99FTebKjbD89WroKw";
const ROTATED_N: &str = "3UG3ooNLTJMRCfdJPAclEv3yKek8XlrjiWfwYGiH13OKyV3r_BLu0p3YvHk_sN8I_-R4TwxyNI0iQqSQfuJUuX4Yh_Wu109ruP5vHHFnmqAJ6GBkN5H0zhhN6ZVkTi0nsvkrFj4VN-QbTecQ6DTm2FPmZymFscLgoUamiN3erexH6JJzzH7ENOOvZYNUFCYjjnhYDo0uwhNFzTI7TYHDLof0zdOhvw5u9KQrp8894SAdz1s8QsBrNfBIFPR4FTh2fPDuEEO3oEsTMyQaEtv2Mkoz2wXKFzRqQXFEI5IktViZkn-LIwvMQln-annqPpuG4rVg2bPiisjpqJb1M1R4Ww";
const ROGUE_N: &str = "pv4NwxsguuDn7yPXgFy0fTabFqyfNybMDYmM9T75EmlWy4gy5vnq0UcgW3PiDrUlwmIin2bkE40iM9Lr9HACYobzCTH5OMmEu6BmiRvIsn5ipemJ4hRwK0_xADHGiDvfjTdSLHbSKVH3cXXAemSKYMRc2UtzGQcka1vuSKuL3kWG94unaXx4tksdI3rFco3gUSBWJ0X7drWTeFCayzha4UVoOF2XE6MKDNcK9IIjBDmz6Qzl2F2GU_utQnaexXTa7HrVcJHk6OGeL4sdhykQjfSPRb7k6Nx3mcehx17A8Cixypx9UbXaNsSiYU54tgRO1jkg_4J3TvL8gXscqJ3C6w";
const RSA_E: &str = "AQAB";

/// Which private key signs a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningKey {
    /// Published under `PRIMARY_KID`
    Primary,
    /// Published under `ROTATED_KID`, only after a rotation
    Rotated,
    /// Never published; claims the primary kid to forge signatures
    Rogue,
}

impl SigningKey {
    pub fn kid(self) -> &'static str {
        match self {
            SigningKey::Primary | SigningKey::Rogue => PRIMARY_KID,
            SigningKey::Rotated => ROTATED_KID,
        }
    }

    fn pem(self) -> &'static str {
        match self {
            SigningKey::Primary => PRIMARY_PEM,
            SigningKey::Rotated => ROTATED_PEM,
            SigningKey::Rogue => ROGUE_PEM,
        }
    }

    fn modulus(self) -> &'static str {
        match self {
            SigningKey::Primary => PRIMARY_N,
            SigningKey::Rotated => ROTATED_N,
            SigningKey::Rogue => ROGUE_N,
        }
    }

    /// Public half as a JWK, the way the provider publishes it.
    pub fn jwk(self) -> Value {
        json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": self.kid(),
            "n": self.modulus(),
            "e": RSA_E,
        })
    }
}

/// JWKS document listing the given keys.
pub fn jwks(keys: &[SigningKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}

/// JWKS document serialized to bytes.
pub fn jwks_bytes(keys: &[SigningKey]) -> Vec<u8> {
    serde_json::to_vec(&jwks(keys)).expect("JWKS serializes")
}

pub fn test_issuer() -> String {
    format!("https://securetoken.google.com/{TEST_PROJECT_ID}")
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}

/// Builder for provider-style ID tokens.
///
/// Defaults describe a healthy token: signed with the primary key, issued ten
/// seconds ago, valid for an hour, with an email.
#[derive(Debug, Clone)]
pub struct IdTokenBuilder {
    key: SigningKey,
    kid: Option<String>,
    claims: Map<String, Value>,
}

impl IdTokenBuilder {
    pub fn new(uid: &str) -> Self {
        let now = now_secs();
        let mut claims = Map::new();
        claims.insert("iss".into(), json!(test_issuer()));
        claims.insert("aud".into(), json!(TEST_PROJECT_ID));
        claims.insert("sub".into(), json!(uid));
        claims.insert("user_id".into(), json!(uid));
        claims.insert("iat".into(), json!(now - 10));
        claims.insert("auth_time".into(), json!(now - 10));
        claims.insert("exp".into(), json!(now + 3600));
        claims.insert("email".into(), json!(format!("{uid}@example.com")));
        claims.insert("email_verified".into(), json!(true));

        Self {
            key: SigningKey::Primary,
            kid: Some(SigningKey::Primary.kid().to_string()),
            claims,
        }
    }

    pub fn signed_with(mut self, key: SigningKey) -> Self {
        self.key = key;
        self.kid = Some(key.kid().to_string());
        self
    }

    /// Override the `kid` header; `None` omits it.
    pub fn kid(mut self, kid: Option<&str>) -> Self {
        self.kid = kid.map(str::to_string);
        self
    }

    pub fn email(self, email: &str) -> Self {
        self.claim("email", json!(email))
    }

    pub fn without_email(self) -> Self {
        self.without_claim("email").without_claim("email_verified")
    }

    pub fn issued_at(self, iat: i64) -> Self {
        self.claim("iat", json!(iat))
    }

    pub fn auth_time(self, auth_time: i64) -> Self {
        self.claim("auth_time", json!(auth_time))
    }

    pub fn expires_at(self, exp: i64) -> Self {
        self.claim("exp", json!(exp))
    }

    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", json!(aud))
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", json!(iss))
    }

    pub fn subject(self, sub: &str) -> Self {
        self.claim("sub", json!(sub))
    }

    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sign with RS256 using the selected key.
    pub fn sign(&self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid.clone();
        let key = EncodingKey::from_rsa_pem(self.key.pem().as_bytes()).expect("test key parses");
        encode(&header, &self.claims, &key).expect("test token encodes")
    }

    /// Sign with HS256 instead, for algorithm-confusion checks.
    pub fn sign_hs256(&self, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.kid.clone();
        encode(&header, &self.claims, &EncodingKey::from_secret(secret))
            .expect("test token encodes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_lists_requested_keys() {
        let doc = jwks(&[SigningKey::Primary, SigningKey::Rotated]);
        let kids: Vec<&str> = doc["keys"]
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k["kid"].as_str().unwrap())
            .collect();
        assert_eq!(kids, vec![PRIMARY_KID, ROTATED_KID]);
    }

    #[test]
    fn rogue_key_impersonates_primary_kid() {
        assert_eq!(SigningKey::Rogue.kid(), PRIMARY_KID);
        assert_ne!(SigningKey::Rogue.modulus(), SigningKey::Primary.modulus());
    }

    #[test]
    fn signed_token_has_three_segments() {
        let token = IdTokenBuilder::new("uid-1").sign();
        assert_eq!(token.split('.').count(), 3);
    }
}
