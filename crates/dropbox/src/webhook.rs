use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the `X-Dropbox-Signature` header: a hex HMAC-SHA256 of the raw
/// request body under the app secret. Comparison is constant-time; anything
/// malformed (bad hex, wrong length) is simply invalid.
pub fn verify_signature(app_secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Compute the signature a sender would attach. Test/tooling helper.
pub fn sign(app_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Webhook notification envelope. Carries no file detail, only which
/// accounts have pending changes.
#[derive(Debug, serde::Deserialize)]
pub struct Notification {
    pub list_folder: ListFolderAccounts,
}

#[derive(Debug, serde::Deserialize)]
pub struct ListFolderAccounts {
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "app-secret-123";

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"list_folder":{"accounts":["dbid:AAA"]}}"#;
        let signature = sign(SECRET, body);
        assert!(verify_signature(SECRET, body, &signature));
    }

    #[test]
    fn invalid_signatures_are_rejected() {
        let body = b"payload";
        let good = sign(SECRET, body);

        let cases: &[(&str, &[u8], String)] = &[
            ("wrong secret", body, sign("other-secret", body)),
            ("tampered body", b"payload2", good.clone()),
            ("not hex", body, "zzzz".to_string()),
            ("truncated", body, good[..10].to_string()),
            ("empty", body, String::new()),
        ];

        for (label, body, signature) in cases {
            assert!(
                !verify_signature(SECRET, body, signature),
                "accepted: {label}"
            );
        }
    }

    #[test]
    fn signature_whitespace_is_tolerated() {
        let body = b"x";
        let signature = format!(" {} ", sign(SECRET, body));
        assert!(verify_signature(SECRET, body, &signature));
    }

    #[test]
    fn notification_envelope_parses() {
        let payload = r#"{"list_folder":{"accounts":["dbid:AAA","dbid:BBB"]},"delta":{"users":[1]}}"#;
        let notification: Notification = serde_json::from_str(payload).unwrap();
        assert_eq!(notification.list_folder.accounts.len(), 2);
    }
}
