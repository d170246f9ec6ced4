use hmac::{Hmac, Mac};
use sha2::Sha256;

use toolgate_common::types::{ApiKeyLocation, AuthConfig, SignedHeaderAlgorithm};

type HmacSha256 = Hmac<Sha256>;

/// Apply a decrypted credential to an outgoing request. `path` is the
/// resolved request path (query excluded) and `body` the exact bytes
/// that will be sent, since `SignedHeader` signs over both.
pub fn apply_auth(
    builder: reqwest::RequestBuilder,
    credential: &AuthConfig,
    method: &str,
    path: &str,
    body: &[u8],
) -> reqwest::RequestBuilder {
    match credential {
        AuthConfig::None => builder,
        AuthConfig::Bearer { token } => builder.bearer_auth(token),
        AuthConfig::Basic { username, password } => builder.basic_auth(username, Some(password)),
        AuthConfig::ApiKey {
            location,
            name,
            token,
            prefix,
        } => {
            let value = match prefix {
                Some(p) => format!("{p}{token}"),
                None => token.clone(),
            };
            match location {
                ApiKeyLocation::Header => builder.header(name, value),
                ApiKeyLocation::Query => builder.query(&[(name.as_str(), value.as_str())]),
            }
        }
        AuthConfig::SignedHeader {
            algorithm,
            header_name,
            prefix,
            secret,
        } => {
            let timestamp = chrono::Utc::now().timestamp().to_string();
            let signature = sign(*algorithm, secret, method, path, &timestamp, body);
            let value = match prefix {
                Some(p) => format!("{p}{signature}"),
                None => signature,
            };
            builder
                .header(header_name, value)
                .header("x-toolgate-timestamp", timestamp)
        }
    }
}

/// Canonical message is `METHOD\nPATH\nTIMESTAMP\nBODY`, HMAC'd with the
/// tool's configured secret. There's no OpenAPI equivalent for this
/// scheme — it's only ever supplied directly by the operator at
/// registration, never derived from a spec document.
fn sign(
    algorithm: SignedHeaderAlgorithm,
    secret: &str,
    method: &str,
    path: &str,
    timestamp: &str,
    body: &[u8],
) -> String {
    match algorithm {
        SignedHeaderAlgorithm::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts a key of any length");
            mac.update(method.as_bytes());
            mac.update(b"\n");
            mac.update(path.as_bytes());
            mac.update(b"\n");
            mac.update(timestamp.as_bytes());
            mac.update(b"\n");
            mac.update(body);
            to_hex(&mac.finalize().into_bytes())
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_is_stable_for_same_inputs() {
        let a = sign(
            SignedHeaderAlgorithm::HmacSha256,
            "secret",
            "POST",
            "/widgets",
            "12345",
            b"{}",
        );
        let b = sign(
            SignedHeaderAlgorithm::HmacSha256,
            "secret",
            "POST",
            "/widgets",
            "12345",
            b"{}",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn hmac_signature_changes_with_body() {
        let a = sign(
            SignedHeaderAlgorithm::HmacSha256,
            "secret",
            "POST",
            "/widgets",
            "12345",
            b"{}",
        );
        let b = sign(
            SignedHeaderAlgorithm::HmacSha256,
            "secret",
            "POST",
            "/widgets",
            "12345",
            b"{\"a\":1}",
        );
        assert_ne!(a, b);
    }
}
