//! HTTP Digest authentication (RFC 2617, `qop=auth`, MD5).
//!
//! Only what the recorder needs: one challenge at a time, refreshed whenever a
//! `401` carries a new one, and a nonce-count that restarts with each
//! challenge.

use tracing::debug;

/// Server challenge from a `WWW-Authenticate: Digest ...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub algorithm: Option<String>,
}

/// Digest credential state for one device
#[derive(Debug)]
pub struct DigestAuth {
    username: String,
    password: String,
    challenge: Option<DigestChallenge>,
    nonce_count: u32,
}

impl DigestAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            challenge: None,
            nonce_count: 0,
        }
    }

    /// Current challenge, if one has been seen
    pub fn challenge(&self) -> Option<&DigestChallenge> {
        self.challenge.as_ref()
    }

    /// Nonce-count used by the last authorization
    pub fn nonce_count(&self) -> u32 {
        self.nonce_count
    }

    /// Absorb a `WWW-Authenticate` header value.
    ///
    /// Returns `true` when the header held a usable digest challenge, which
    /// then replaces the previous one and restarts the nonce-count. Anything
    /// else leaves the state untouched.
    pub fn update_challenge(&mut self, header: &str) -> bool {
        let header = header.trim();
        let (scheme, params) = header
            .split_once(char::is_whitespace)
            .unwrap_or((header, ""));
        if !scheme.eq_ignore_ascii_case("digest") {
            return false;
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop = None;
        let mut algorithm = None;
        for (key, value) in parse_params(params) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop = Some(value),
                "algorithm" => algorithm = Some(value),
                _ => {}
            }
        }

        let (Some(realm), Some(nonce)) = (realm, nonce) else {
            debug!("Ignoring digest challenge without realm/nonce");
            return false;
        };

        if let Some(alg) = algorithm.as_deref() {
            if !alg.eq_ignore_ascii_case("md5") {
                debug!("Digest algorithm {} requested, using MD5", alg);
            }
        }

        self.challenge = Some(DigestChallenge {
            realm,
            nonce,
            opaque,
            qop,
            algorithm,
        });
        self.nonce_count = 0;
        true
    }

    /// Build an `Authorization` header value for `method` on `uri`, or `None`
    /// before any challenge has been received.
    pub fn build_authorization(&mut self, method: &str, uri: &str) -> Option<String> {
        let cnonce = new_cnonce();
        self.authorization_with_cnonce(method, uri, &cnonce)
    }

    fn authorization_with_cnonce(&mut self, method: &str, uri: &str, cnonce: &str) -> Option<String> {
        let challenge = self.challenge.as_ref()?;
        self.nonce_count = self.nonce_count.wrapping_add(1);
        let nc = format!("{:08x}", self.nonce_count);

        let ha1 = md5_hex(&format!("{}:{}:{}", self.username, challenge.realm, self.password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let response = md5_hex(&format!("{}:{}:{}:{}:auth:{}", ha1, challenge.nonce, nc, cnonce, ha2));

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm=MD5, \
             response=\"{}\", qop=auth, nc={}, cnonce=\"{}\"",
            self.username, challenge.realm, challenge.nonce, uri, response, nc, cnonce
        );
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        Some(header)
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn new_cnonce() -> String {
    let mut cnonce = md5_hex(&uuid::Uuid::new_v4().to_string());
    cnonce.truncate(16);
    cnonce
}

/// Split `key=value, key="quoted, value"` pairs. Keys are lower-cased, values
/// trimmed. Tolerates missing commas, extra whitespace and any field order.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            if chars.peek().is_none() {
                break;
            }
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => value.extend(chars.next()),
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
        }

        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.push((key, value.trim().to_string()));
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RFC_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn test_rfc2617_response() {
        let mut auth = DigestAuth::new("Mufasa", "Circle Of Life");
        assert!(auth.update_challenge(RFC_CHALLENGE));

        let header = auth
            .authorization_with_cnonce("GET", "/dir/index.html", "0a4f113b")
            .unwrap();

        assert_eq!(
            header,
            "Digest username=\"Mufasa\", realm=\"testrealm@host.com\", \
             nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", uri=\"/dir/index.html\", \
             algorithm=MD5, response=\"6629fae49393a05397450978507c4ef1\", qop=auth, \
             nc=00000001, cnonce=\"0a4f113b\", opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""
        );
    }

    #[test]
    fn test_no_authorization_without_challenge() {
        let mut auth = DigestAuth::new("admin", "secret");
        assert_eq!(auth.build_authorization("GET", "/ISAPI/System/deviceInfo"), None);
        assert_eq!(auth.nonce_count(), 0);
    }

    #[test]
    fn test_successive_authorizations() {
        let mut auth = DigestAuth::new("admin", "secret");
        auth.update_challenge(r#"Digest realm="DS-7608", nonce="abc""#);

        let first = auth.build_authorization("GET", "/a").unwrap();
        let second = auth.build_authorization("GET", "/a").unwrap();

        assert!(first.contains("nc=00000001"));
        assert!(second.contains("nc=00000002"));
        assert_ne!(cnonce_of(&first), cnonce_of(&second));
        assert_eq!(cnonce_of(&first).len(), 16);
        assert!(!first.contains("opaque"));
    }

    #[test]
    fn test_new_challenge_resets_nonce_count() {
        let mut auth = DigestAuth::new("admin", "secret");
        auth.update_challenge(r#"Digest realm="r", nonce="one""#);
        auth.build_authorization("GET", "/a");
        auth.build_authorization("GET", "/a");
        assert_eq!(auth.nonce_count(), 2);

        assert!(auth.update_challenge(r#"Digest realm="r", nonce="two""#));
        assert_eq!(auth.nonce_count(), 0);
        let header = auth.build_authorization("GET", "/a").unwrap();
        assert!(header.contains("nonce=\"two\""));
        assert!(header.contains("nc=00000001"));
    }

    #[rstest]
    #[case::basic(r#"Basic realm="DS-7608""#)]
    #[case::empty("")]
    #[case::missing_nonce(r#"Digest realm="r""#)]
    #[case::missing_realm(r#"Digest nonce="n""#)]
    fn test_ignored_challenges(#[case] header: &str) {
        let mut auth = DigestAuth::new("admin", "secret");
        auth.update_challenge(r#"Digest realm="kept", nonce="kept""#);
        auth.build_authorization("GET", "/a");

        assert!(!auth.update_challenge(header));
        assert_eq!(auth.challenge().unwrap().realm, "kept");
        assert_eq!(auth.nonce_count(), 1);
    }

    #[test]
    fn test_tolerant_challenge_parsing() {
        let mut auth = DigestAuth::new("admin", "secret");
        assert!(auth.update_challenge(
            r#"DIGEST  QOP="auth" ,Nonce = "4e6a4d" , algorithm=MD5,realm="IP Camera(12345)",stale=FALSE"#
        ));

        let challenge = auth.challenge().unwrap();
        assert_eq!(challenge.realm, "IP Camera(12345)");
        assert_eq!(challenge.nonce, "4e6a4d");
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert_eq!(challenge.algorithm.as_deref(), Some("MD5"));
    }

    #[test]
    fn test_quoted_value_with_comma() {
        let params = parse_params(r#"qop="auth,auth-int", realm="a \"b\"""#);
        assert_eq!(
            params,
            vec![
                ("qop".to_string(), "auth,auth-int".to_string()),
                ("realm".to_string(), "a \"b\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_md5_algorithm_still_uses_md5() {
        let mut auth = DigestAuth::new("admin", "secret");
        assert!(auth.update_challenge(r#"Digest realm="r", nonce="n", algorithm=SHA-256"#));
        let header = auth.build_authorization("GET", "/a").unwrap();
        assert!(header.contains("algorithm=MD5"));
    }

    fn cnonce_of(header: &str) -> String {
        header
            .split("cnonce=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap()
            .to_string()
    }
}
