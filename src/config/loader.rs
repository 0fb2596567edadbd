//! Configuration loader with TOML parsing and environment variable substitution

use super::schema::StrataConfig;
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`StrataConfig`]
/// 4. Validates the configuration
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read, a referenced
/// environment variable is unset, parsing fails, or validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<StrataConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(StrataError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        StrataError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let config: StrataConfig = toml::from_str(&contents)
        .map_err(|e| StrataError::Configuration(format!("Failed to parse TOML: {e}")))?;

    config.validate()?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched. A referenced but unset variable is a
/// configuration error listing every missing name.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(StrataError::Configuration(format!(
            "Missing environment variables referenced in configuration: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const VALID: &str = r#"
        data_dir = "/data"

        [db]
        endpoint = "https://account.documents.example.com:443/"
        key = "c2VjcmV0"
        database_id = "db"

        [source]
        container_id = "users"

        [output]
        table = "users"
    "#;

    #[test]
    fn test_load_valid_config() {
        let file = write_config(VALID);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.source.container_id, "users");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/strata.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("STRATA_TEST_DB_ID", "substituted");
        let file = write_config(&VALID.replace("\"db\"", "\"${STRATA_TEST_DB_ID}\""));
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.db.database_id, "substituted");
    }

    #[test]
    fn test_missing_env_var_reported() {
        let file = write_config(&VALID.replace("\"db\"", "\"${STRATA_TEST_UNSET_VAR}\""));
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("STRATA_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_env_vars_in_comments_ignored() {
        let contents = format!("# uses ${{STRATA_TEST_COMMENT_VAR}}\n{VALID}");
        let file = write_config(&contents);
        load_config(file.path()).unwrap();
    }
}
