//! Small helpers shared by the compiler, patcher and lifecycle.

use std::collections::BTreeMap;

/// Variables available to `{{name}}` templates.
pub type Vars = BTreeMap<String, String>;

/// Expand `{{name}}` references. Unknown names are left untouched so a
/// missing variable is visible in the output rather than silently empty.
pub fn expand_vars(vars: &Vars, s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key.trim()) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Shell-quote a value for display in a copy-pasteable command line.
pub fn shell_quote(s: impl std::fmt::Display) -> String {
    let s = s.to_string();
    if !s.is_empty()
        && s.chars().all(|c| {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | ',' | '+')
        })
    {
        s
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

/// Render a program and its arguments as one shell line.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(shell_quote(program))
        .chain(args.iter().map(shell_quote))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut v = Vars::new();
        v.insert("opt_prefix".to_string(), "/usr/local/opt/httpd24".to_string());
        v.insert("etc".to_string(), "/usr/local/etc".to_string());
        v
    }

    #[test]
    fn test_expand_vars() {
        assert_eq!(
            expand_vars(&vars(), "#@@ServerRoot@@#{{opt_prefix}}#"),
            "#@@ServerRoot@@#/usr/local/opt/httpd24#"
        );
        assert_eq!(
            expand_vars(&vars(), "{{etc}}/apache2/{{ etc }}"),
            "/usr/local/etc/apache2//usr/local/etc"
        );
    }

    #[test]
    fn test_expand_leaves_unknown_and_unterminated() {
        assert_eq!(expand_vars(&vars(), "{{missing}}/x"), "{{missing}}/x");
        assert_eq!(expand_vars(&vars(), "tail {{etc"), "tail {{etc");
        assert_eq!(expand_vars(&vars(), "$(prefix) @exp_sbindir@"), "$(prefix) @exp_sbindir@");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("simple"), "simple");
        assert_eq!(shell_quote("--with-port=8080"), "--with-port=8080");
        assert_eq!(shell_quote("has space"), "'has space'");
        assert_eq!(shell_quote("has'quote"), "'has'\"'\"'quote'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_command_line() {
        let args = vec!["-D".to_string(), "FOREGROUND".to_string()];
        assert_eq!(command_line("/opt/bin/httpd", &args), "/opt/bin/httpd -D FOREGROUND");
    }
}
