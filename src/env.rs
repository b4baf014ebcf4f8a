//! Configuration read from environment variables.

use std::env;

/// Parse a boolean setting such as "1" or "no".
///
/// Returns `None` if the value is not recognized.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Return the value of a boolean setting controlled by the environment
/// variable `name`, or `default` if it is unset or invalid.
pub fn env_flag(name: &str, default: bool) -> bool {
    let Ok(value) = env::var(name) else {
        return default;
    };
    parse_bool(&value).unwrap_or_else(|| {
        tracing::warn!(name, value = %value, "unrecognized boolean value, using {}", default);
        default
    })
}

/// Return a positive count controlled by the environment variable `name`.
///
/// Returns `None` if the variable is unset, or is not a positive integer.
pub fn env_count(name: &str) -> Option<usize> {
    let value = env::var_os(name)?;
    let value = value.to_string_lossy();
    match value.trim().parse::<usize>() {
        Ok(count) if count > 0 => Some(count),
        _ => {
            tracing::warn!(name, value = %value, "expected a positive integer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use rten_testing::TestCases;

    use super::{env_count, env_flag, parse_bool};

    #[test]
    fn test_parse_bool() {
        #[derive(Debug)]
        struct Case {
            value: &'static str,
            expected: Option<bool>,
        }

        let cases = [
            ("1", Some(true)),
            ("true", Some(true)),
            ("T", Some(true)),
            (" yes ", Some(true)),
            ("y", Some(true)),
            ("0", Some(false)),
            ("False", Some(false)),
            ("f", Some(false)),
            ("no", Some(false)),
            ("n", Some(false)),
            ("", None),
            ("maybe", None),
        ]
        .map(|(value, expected)| Case { value, expected });

        cases.test_each(|case| {
            assert_eq!(parse_bool(case.value), case.expected);
        })
    }

    // Each test uses its own variable names, since tests run concurrently
    // within the same process.
    #[test]
    fn test_env_flag() {
        assert!(!env_flag("RTEN_BLOCKS_TEST_UNSET_FLAG", false));
        assert!(env_flag("RTEN_BLOCKS_TEST_UNSET_FLAG", true));

        std::env::set_var("RTEN_BLOCKS_TEST_FLAG_ON", "yes");
        assert!(env_flag("RTEN_BLOCKS_TEST_FLAG_ON", false));

        std::env::set_var("RTEN_BLOCKS_TEST_FLAG_BAD", "sometimes");
        assert!(env_flag("RTEN_BLOCKS_TEST_FLAG_BAD", true));
        assert!(!env_flag("RTEN_BLOCKS_TEST_FLAG_BAD", false));
    }

    #[test]
    fn test_env_count() {
        assert_eq!(env_count("RTEN_BLOCKS_TEST_UNSET_COUNT"), None);

        std::env::set_var("RTEN_BLOCKS_TEST_COUNT", "3");
        assert_eq!(env_count("RTEN_BLOCKS_TEST_COUNT"), Some(3));

        std::env::set_var("RTEN_BLOCKS_TEST_COUNT_ZERO", "0");
        assert_eq!(env_count("RTEN_BLOCKS_TEST_COUNT_ZERO"), None);

        std::env::set_var("RTEN_BLOCKS_TEST_COUNT_BAD", "many");
        assert_eq!(env_count("RTEN_BLOCKS_TEST_COUNT_BAD"), None);
    }
}
