//! Username generation for new credentials.
//!
//! Templates use `{{display_name}}`, `{{role_name}}`, `{{random}}` and
//! `{{unix_time}}` placeholders. Display and role names are cut to 64
//! characters before substitution; the rendered name is cut to 128 and
//! upper-cased.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

use super::requests::UsernameMetadata;
use crate::errors::{Error, Result};

pub const DEFAULT_USERNAME_TEMPLATE: &str =
    "V_{{display_name}}_{{role_name}}_{{random}}_{{unix_time}}";

const NAME_PART_MAX: usize = 64;
const USERNAME_MAX: usize = 128;
const RANDOM_LEN: usize = 20;

const PLACEHOLDERS: [&str; 4] = ["display_name", "role_name", "random", "unix_time"];

#[derive(Debug, Clone)]
pub struct UsernameProducer {
    template: String,
}

impl Default for UsernameProducer {
    fn default() -> Self {
        Self { template: DEFAULT_USERNAME_TEMPLATE.to_string() }
    }
}

impl UsernameProducer {
    /// Parse a template; empty means the default.
    pub fn new(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                Error::validation_field("unterminated placeholder in username_template", "username_template")
            })?;
            let name = after[..end].trim();
            if !PLACEHOLDERS.contains(&name) {
                return Err(Error::validation_field(
                    format!("unknown placeholder '{}' in username_template", name),
                    "username_template",
                ));
            }
            rest = &after[end + 2..];
        }

        Ok(Self { template: template.to_string() })
    }

    pub fn generate(&self, metadata: &UsernameMetadata) -> String {
        let random: String = OsRng.sample_iter(&Alphanumeric).take(RANDOM_LEN).map(char::from).collect();
        let unix_time = chrono::Utc::now().timestamp().to_string();

        let mut rendered = String::with_capacity(USERNAME_MAX);
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find("{{") {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else { break };
            match after[..end].trim() {
                "display_name" => rendered.push_str(truncate(&metadata.display_name, NAME_PART_MAX)),
                "role_name" => rendered.push_str(truncate(&metadata.role_name, NAME_PART_MAX)),
                "random" => rendered.push_str(&random),
                "unix_time" => rendered.push_str(&unix_time),
                _ => {}
            }
            rest = &after[end + 2..];
        }
        rendered.push_str(rest);

        truncate(&rendered, USERNAME_MAX).to_uppercase()
    }
}

/// First `max` characters of `s`.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
