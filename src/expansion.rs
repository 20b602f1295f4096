//! Placeholder expansion.
//!
//! Substitutes `{NAME}`, `$NAME`, and `${NAME}` in a single pass against
//! the effective environment, falling back to the process-environment
//! snapshot captured at composition entry. A miss substitutes the empty
//! string and emits `missing_env_var` with the source location.

use crate::warnings::{Warning, WarningCollector};
use std::collections::BTreeMap;

/// Most placeholders allowed in one string.
pub const MAX_PLACEHOLDERS: usize = 128;
/// Largest expanded output in bytes.
pub const MAX_EXPANDED_SIZE: usize = 64 * 1024;

/// Result of expanding one string. On failure `value` is empty and the
/// caller decides whether the loss is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    pub ok: bool,
    pub value: String,
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

struct Expander<'a> {
    environment: &'a BTreeMap<String, String>,
    process_env: &'a BTreeMap<String, String>,
    source_path: &'a str,
    output: String,
    placeholder_count: usize,
}

impl<'a> Expander<'a> {
    /// Substitute one variable. Returns the limit-violation reason when the
    /// placeholder budget is exhausted.
    fn substitute(&mut self, name: &str, warnings: &mut WarningCollector) -> Result<(), &'static str> {
        self.placeholder_count += 1;
        if self.placeholder_count > MAX_PLACEHOLDERS {
            return Err("placeholder_limit");
        }

        if let Some(value) = self.environment.get(name) {
            self.output.push_str(value);
            return Ok(());
        }
        match self.process_env.get(name) {
            Some(value) if !value.is_empty() => self.output.push_str(value),
            _ => {
                warnings.emit_fields(
                    Warning::MissingEnvVar,
                    &[("name", name), ("source_path", self.source_path)],
                );
            }
        }
        Ok(())
    }
}

/// Expand one string. Limit violations emit `invalid_configuration` with a
/// reason and return `ok = false` with an empty value.
pub fn expand_placeholders(
    input: &str,
    environment: &BTreeMap<String, String>,
    process_env: &BTreeMap<String, String>,
    source_path: &str,
    warnings: &mut WarningCollector,
) -> Expanded {
    let mut exp = Expander {
        environment,
        process_env,
        source_path,
        output: String::with_capacity(input.len()),
        placeholder_count: 0,
    };

    let bytes = input.as_bytes();
    let mut i = 0;
    let mut failure: Option<&'static str> = None;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'$' {
            if bytes.get(i + 1) == Some(&b'{') {
                // ${NAME}
                if let Some(close) = input[i + 2..].find('}') {
                    let name = &input[i + 2..i + 2 + close];
                    if !name.is_empty() && !name.contains('{') {
                        if let Err(reason) = exp.substitute(name, warnings) {
                            failure = Some(reason);
                            break;
                        }
                        i += close + 3;
                        continue;
                    }
                }
                exp.output.push('$');
                i += 1;
            } else if bytes.get(i + 1).map(|b| is_name_start(*b)).unwrap_or(false) {
                // $NAME
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_name_char(bytes[end]) {
                    end += 1;
                }
                if let Err(reason) = exp.substitute(&input[start..end], warnings) {
                    failure = Some(reason);
                    break;
                }
                i = end;
            } else {
                exp.output.push('$');
                i += 1;
            }
        } else if b == b'{' {
            // {NAME}
            match input[i + 1..].find('}') {
                Some(close) => {
                    let name = &input[i + 1..i + 1 + close];
                    if name.is_empty() || name.contains('{') {
                        exp.output.push('{');
                        i += 1;
                        continue;
                    }
                    if let Err(reason) = exp.substitute(name, warnings) {
                        failure = Some(reason);
                        break;
                    }
                    i += close + 2;
                }
                None => {
                    exp.output.push('{');
                    i += 1;
                }
            }
        } else {
            // Copy the full UTF-8 sequence starting here.
            let ch = input[i..].chars().next().unwrap_or('\u{fffd}');
            exp.output.push(ch);
            i += ch.len_utf8();
        }

        if exp.output.len() > MAX_EXPANDED_SIZE {
            failure = Some("expansion_overflow");
            break;
        }
    }

    if let Some(reason) = failure {
        warnings.emit_fields(
            Warning::InvalidConfiguration,
            &[("reason", reason), ("source_path", source_path)],
        );
        return Expanded {
            ok: false,
            value: String::new(),
        };
    }

    Expanded {
        ok: true,
        value: exp.output,
    }
}

/// Expand a list, one source path per index. Failed entries become empty
/// strings, preserving positions.
pub fn expand_list(
    input: &[String],
    environment: &BTreeMap<String, String>,
    process_env: &BTreeMap<String, String>,
    source_path_prefix: &str,
    warnings: &mut WarningCollector,
) -> Vec<String> {
    input
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let source_path = format!("{}[{}]", source_path_prefix, i);
            expand_placeholders(item, environment, process_env, &source_path, warnings).value
        })
        .collect()
}

/// Expand the environment map in place against a snapshot of itself, so
/// the result does not depend on key iteration order. Keys are visited
/// lexicographically.
pub fn expand_environment(
    environment: &mut BTreeMap<String, String>,
    process_env: &BTreeMap<String, String>,
    warnings: &mut WarningCollector,
) {
    let snapshot = environment.clone();
    let keys: Vec<String> = environment.keys().cloned().collect();
    for key in keys {
        let source_path = format!("environment.{}", key);
        let expanded = expand_placeholders(
            &environment[&key],
            &snapshot,
            process_env,
            &source_path,
            warnings,
        );
        environment.insert(key, expanded.value);
    }
}
