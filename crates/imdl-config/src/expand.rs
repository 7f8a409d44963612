//! `~` and environment variable expansion for configured paths.

use crate::ConfigError;

/// Expand a leading `~` and `$VAR` / `${VAR}` references.
///
/// Unset variables are an error naming the config field.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains('$') && !value.starts_with('~') {
        return Ok(value.to_owned());
    }

    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(expand_path("views", "templates.dir").unwrap(), "views");
    }

    #[test]
    fn test_expands_var() {
        // SAFETY: unique variable name, not read by other tests
        unsafe {
            std::env::set_var("IMDL_TEST_EXPAND_ROOT", "/srv/site");
        }
        let result = expand_path("${IMDL_TEST_EXPAND_ROOT}/views", "templates.dir").unwrap();
        assert_eq!(result, "/srv/site/views");
        unsafe {
            std::env::remove_var("IMDL_TEST_EXPAND_ROOT");
        }
    }

    #[test]
    fn test_unset_var_names_field() {
        let err = expand_path("$IMDL_TEST_SURELY_UNSET/views", "templates.dir").unwrap_err();

        assert_eq!(
            err.to_string(),
            "Environment variable error in templates.dir: ${IMDL_TEST_SURELY_UNSET} not set"
        );
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let result = expand_path("~/views", "templates.dir").unwrap();

        assert!(!result.starts_with('~'));
        assert!(result.ends_with("/views"));
    }
}
