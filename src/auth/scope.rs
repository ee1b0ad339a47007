//! Scope normalization.

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Return `scopes` with `openid` appended when it is missing.
///
/// Blank entries are dropped and order is otherwise preserved.
pub fn ensure_openid_scope<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = scopes
        .into_iter()
        .map(Into::into)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !out.iter().any(|s| s == SCOPE_OPENID) {
        out.push(SCOPE_OPENID.to_string());
    }
    out
}

/// Space-delimited form used on the wire.
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}
