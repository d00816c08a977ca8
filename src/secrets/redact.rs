//! Secret scrubbing for error messages.

/// Replaces known secret values with fixed markers.
///
/// Built once per operation from the values in play (configured secret key,
/// the password being set) and applied to every string that might be shown
/// to the host: remote response bodies, echoed payloads, error messages.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    replacements: Vec<(String, &'static str)>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value to hide. Empty values are ignored.
    pub fn secret(mut self, value: impl Into<String>, marker: &'static str) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.replacements.push((value, marker));
            // longest first so a secret that contains another is replaced whole
            self.replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }
        self
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (value, marker) in &self.replacements {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), marker);
            }
        }
        out
    }
}
