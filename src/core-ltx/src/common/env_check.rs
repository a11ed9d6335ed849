/// True if the variable is set to a non-empty value.
pub fn is_env_set(var_name: &str) -> bool {
    std::env::var(var_name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Reads a boolean flag: `1`, `true`, `yes` and `on` are true (case-insensitive).
pub fn env_flag(var_name: &str, default: bool) -> bool {
    match std::env::var(var_name) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variables() {
        assert!(!is_env_set("LTX_TEST_UNSET_FLAG"));
        assert!(env_flag("LTX_TEST_UNSET_FLAG", true));
        assert!(!env_flag("LTX_TEST_UNSET_FLAG", false));
    }
}
