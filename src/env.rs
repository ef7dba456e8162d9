use std::path::Path;

use crate::config::Environment;

/// Load .env and optional .env.<environment> from the project root into the
/// process environment, then run a few passes of ${VAR} and ${VAR:-default}
/// expansion. Returns the file names that were actually loaded.
pub fn load_env(root: &Path, environment: Option<Environment>) -> Vec<String> {
    let mut loaded = Vec::new();

    let base = root.join(".env");
    if base.exists() {
        dotenvy::from_path(&base).ok();
        loaded.push(".env".to_string());
    }

    if let Some(environment) = environment {
        let name = format!(".env.{}", environment.as_str());
        let layered = root.join(&name);
        if layered.exists() {
            // The environment file wins over base values.
            dotenvy::from_path_override(&layered).ok();
            loaded.push(name);
        }
    }

    // A few passes so references to just-expanded values settle.
    for _ in 0..5 {
        let mut changes = 0;
        for (key, value) in std::env::vars() {
            if !value.contains("${") {
                continue;
            }
            let expanded = expand_value(&key, &value);
            if expanded != value {
                std::env::set_var(&key, expanded);
                changes += 1;
            }
        }
        if changes == 0 {
            break;
        }
    }

    loaded
}

/// Replace ${NAME} and ${NAME:-default} with values from the process
/// environment. Self-references are left unresolved so a key can't expand
/// into itself.
fn expand_value(current_key: &str, input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            // Unterminated reference, keep it literal.
            out.push_str(&rest[start..]);
            return out;
        };

        let inner = &after[..end];
        let (name, default) = match inner.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (inner, None),
        };

        let resolved = if name == current_key {
            None
        } else {
            std::env::var(name).ok().filter(|value| !value.is_empty())
        };

        match (resolved, default) {
            (Some(value), _) => out.push_str(&value),
            (None, Some(default)) => out.push_str(default),
            (None, None) => {}
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // Var names are unique per test: the process environment is shared
    // across the test harness threads.

    #[test]
    fn expands_set_variables() {
        std::env::set_var("GANTRY_TEST_EXPAND_A", "hello");
        assert_eq!(
            expand_value("OTHER", "${GANTRY_TEST_EXPAND_A} world"),
            "hello world"
        );
    }

    #[test]
    fn falls_back_to_default_for_unset_variables() {
        assert_eq!(
            expand_value("OTHER", "${GANTRY_TEST_EXPAND_UNSET:-fallback}"),
            "fallback"
        );
        assert_eq!(expand_value("OTHER", "${GANTRY_TEST_EXPAND_UNSET}"), "");
    }

    #[test]
    fn does_not_expand_self_references() {
        std::env::set_var("GANTRY_TEST_EXPAND_SELF", "x");
        assert_eq!(
            expand_value("GANTRY_TEST_EXPAND_SELF", "${GANTRY_TEST_EXPAND_SELF:-y}"),
            "y"
        );
    }

    #[test]
    fn keeps_unterminated_references_literal() {
        assert_eq!(expand_value("OTHER", "plain ${BROKEN"), "plain ${BROKEN");
    }

    #[test]
    fn loads_base_and_environment_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "GANTRY_TEST_LOAD_PORT=3000\n").unwrap();
        fs::write(
            dir.path().join(".env.production"),
            "GANTRY_TEST_LOAD_PORT=443\n",
        )
        .unwrap();

        let loaded = load_env(dir.path(), Some(Environment::Production));
        assert_eq!(loaded, vec![".env".to_string(), ".env.production".to_string()]);
        assert_eq!(std::env::var("GANTRY_TEST_LOAD_PORT").unwrap(), "443");
    }

    #[test]
    fn missing_files_load_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env(dir.path(), Some(Environment::Test)).is_empty());
    }
}
