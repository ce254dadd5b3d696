//! Strips likely PII from user input before it's kept around for batch
//! analysis: known entity names, account-number-shaped digit runs,
//! emails, phone numbers.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static ACCOUNT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{8,12}\b").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\+?[\d\s\-()]{10,}\b").unwrap());

/// Returns `(sanitized_text, hash_of_original)`. The hash is computed over
/// the *original* text so near-duplicate interactions still dedup even
/// after sanitization rewrites them differently.
pub fn sanitize_input(input: &str, known_entities: &[&str]) -> (String, String) {
    let mut sanitized = input.to_string();

    for entity in known_entities {
        if entity.len() < 3 {
            continue;
        }
        let pattern = regex::escape(entity);
        if let Ok(re) = Regex::new(&format!(r"(?i)\b{pattern}\b")) {
            sanitized = re.replace_all(&sanitized, "[ENTITY]").to_string();
        }
    }

    sanitized = ACCOUNT_NUMBER.replace_all(&sanitized, "[ACCOUNT]").to_string();
    sanitized = EMAIL.replace_all(&sanitized, "[EMAIL]").to_string();
    sanitized = PHONE.replace_all(&sanitized, "[PHONE]").to_string();

    (sanitized, hash_original(input))
}

fn hash_original(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
