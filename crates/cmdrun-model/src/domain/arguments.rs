use crate::ModelError;

/// Split a raw argument string on whitespace.
///
/// There is no quoting: `--title "Two Words"` yields three arguments.
/// Multi-word values must be passed as repeated words to operations that accept them.
pub fn split_arguments(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

/// Check a requested command name and return it trimmed.
pub fn validate_command_name(name: &str) -> Result<&str, ModelError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ModelError::EmptyCommandName);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ModelError::InvalidCommandName(name.to_string()));
    }
    Ok(name)
}
