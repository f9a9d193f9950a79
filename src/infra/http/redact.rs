//! Masking of secret-looking values before they reach the logs.
//!
//! Values of fields whose name contains `password`, `token`, `secret`,
//! `key`, `auth`, `credential` or `bearer` are replaced, as are bearer
//! credentials anywhere in the text.

use once_cell::sync::Lazy;
use regex::Regex;

const MASK: &str = "***";

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)("?[a-z0-9_\-]*(?:password|token|secret|key|auth|credential|bearer)[a-z0-9_\-]*"?\s*[:=]\s*)("[^"]*"|[^\s&,;"}]+)"#,
    )
    .expect("invalid key/value mask regex")
});

static BEARER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbearer\s+[a-z0-9._~+/=\-]+")
        .expect("invalid bearer mask regex")
});

/// Mask `name=value` / `"name": value` pairs and bearer credentials inside
/// free text such as query strings and error details.
pub fn mask_text(text: &str) -> String {
    let masked = BEARER.replace_all(text, format!("Bearer {MASK}"));
    KEY_VALUE
        .replace_all(&masked, |caps: &regex::Captures<'_>| {
            let quoted = caps[2].starts_with('"');
            if quoted {
                format!("{}\"{MASK}\"", &caps[1])
            } else {
                format!("{}{MASK}", &caps[1])
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_strings_and_details_are_masked() {
        assert_eq!(mask_text("token=abc&range=A1"), "token=***&range=A1");
        assert_eq!(
            mask_text(r#"{"client_secret":"xyz","range":"A1"}"#),
            r#"{"client_secret":"***","range":"A1"}"#
        );
        assert_eq!(
            mask_text("upstream said: Bearer ya29.abc-def"),
            "upstream said: Bearer ***"
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        let text = "Requested entity was not found.";
        assert_eq!(mask_text(text), text);
    }
}
