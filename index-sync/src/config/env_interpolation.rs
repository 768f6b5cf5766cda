use super::ConfigError;
use regex::Regex;

/// `${VAR}` or `${VAR:-default}`
const ENV_VAR_PATTERN: &str = r"\$\{([^}:]+)(?::-(.*?))?\}";

/// Interpolate environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax
pub fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut result = input.to_string();
    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(input) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else { continue };
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match (std::env::var(var_name.as_str()), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                missing_vars.push(var_name.as_str().to_string());
                continue;
            }
        };

        result = result.replace(full_match.as_str(), &value);
    }

    if !missing_vars.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing_vars));
    }

    Ok(result)
}
