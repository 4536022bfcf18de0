use rand::Rng;

/// Maximum length of an explicitly requested session code.
pub const MAX_CODE_LEN: usize = 8;

/// Cap on concurrent sessions. Stays well below the 9000 generated codes
/// so a random draw finds a free code quickly.
pub const MAX_SESSIONS: usize = 8000;

/// Generate a random 4-digit session code in `1000..=9999`.
pub fn generate_session_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(1000..=9999u32).to_string()
}

/// Normalize a caller-supplied session code: trimmed, control characters
/// stripped, truncated to [`MAX_CODE_LEN`]. Returns `None` if nothing is left.
pub fn normalize_session_code(raw: &str) -> Option<String> {
    let code: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .take(MAX_CODE_LEN)
        .collect();
    (!code.is_empty()).then_some(code)
}
