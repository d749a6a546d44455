//! Log rotation policy rewriting.
//!
//! The daemon logs through syslog; retention for the mail log is driven by
//! the host's existing logrotate configuration. This module rewrites such a
//! configuration in place of hand-editing it: rotation frequency and
//! retention directives are replaced, everything else passes through
//! untouched.

/// The directives subject to rewriting. Matched as indented prefixes, the
/// way logrotate configurations are conventionally laid out.
const DIRECTIVES: [&str; 5] = ["daily", "weekly", "monthly", "rotate", "dateext"];

/// Rewrites a logrotate configuration.
///
/// When `frequency` is given, every frequency directive (`daily`, `weekly`,
/// `monthly`) is replaced with it. When `retention` is non-zero, every
/// `rotate` directive is replaced with `rotate <retention>`, preceded by
/// `dateext` when requested; pre-existing `dateext` lines are dropped so
/// they are not duplicated. Indentation is preserved.
pub fn update_logrotate(
    content: &str,
    frequency: Option<&str>,
    retention: u32,
    dateext: bool,
) -> String {
    let mut out = Vec::new();

    for line in content.split('\n') {
        let Some((indent, directive)) = split_directive(line) else {
            out.push(line.to_owned());
            continue;
        };

        match (directive, frequency) {
            ("daily" | "weekly" | "monthly", Some(frequency)) => {
                out.push(format!("{indent}{frequency}"));
            }
            ("dateext", _) if retention > 0 => {
                // Dropped here, reinserted next to the rotate directive.
            }
            ("rotate", _) if retention > 0 => {
                if dateext {
                    out.push(format!("{indent}dateext"));
                }
                out.push(format!("{indent}rotate {retention}"));
            }
            _ => out.push(line.to_owned()),
        }
    }

    out.join("\n")
}

/// Splits an indented directive line into its indentation and the directive
/// it starts with. Lines without leading whitespace are never directives.
fn split_directive(line: &str) -> Option<(&str, &'static str)> {
    let rest = line.trim_start();
    let indent_len = line.len() - rest.len();
    if indent_len == 0 {
        return None;
    }

    let directive = DIRECTIVES.iter().find(|d| rest.starts_with(**d))?;
    Some((&line[..indent_len], directive))
}
