//! `mod_rewrite` directives implementing the login protection policy.

use crate::markers;
use serde::Serialize;
use utoipa::ToSchema;

/// The real login handler the secret path is routed to.
pub const LOGIN_HANDLER: &str = "wp-login.php";

/// Query condition that identifies the anti-enumeration block.
pub const ANTI_ENUMERATION_QUERY: &str = "RewriteCond %{QUERY_STRING} ^/?author=([0-9]*)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PolicyInput {
    pub secret_path: String,
    pub permalinks_enabled: bool,
    pub blocked_paths: Vec<String>,
}

/// Rule routing `secret_path` to the login handler.
#[must_use]
pub fn route_rule(secret_path: &str) -> String {
    format!(
        "RewriteRule ^{}$ {LOGIN_HANDLER} [NC,L]",
        regex::escape(secret_path)
    )
}

fn forbid_rule(path: &str) -> String {
    format!("RewriteRule ^{}$ - [F]", regex::escape(path))
}

#[must_use]
pub fn generate(policy: &PolicyInput) -> Vec<String> {
    let handler = regex::escape(LOGIN_HANDLER);

    let mut lines = vec![
        "<IfModule mod_rewrite.c>".to_string(),
        "RewriteEngine On".to_string(),
        route_rule(&policy.secret_path),
        format!("RewriteCond %{{THE_REQUEST}} {handler} [NC]"),
        format!("RewriteRule ^{handler}$ - [F]"),
    ];

    if policy.permalinks_enabled {
        lines.push("RewriteCond %{REQUEST_URI}  ^/$".to_string());
        lines.push(ANTI_ENUMERATION_QUERY.to_string());
        lines.push("RewriteRule ^(.*)$ - [F]".to_string());
    }

    lines.extend(policy.blocked_paths.iter().map(|path| forbid_rule(path)));

    lines.push("</IfModule>".to_string());

    lines
}

/// The full padded marker block, for display when the file can't be written.
#[must_use]
pub fn generate_section(policy: &PolicyInput, marker: &str) -> Vec<String> {
    markers::block(marker, &generate(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(permalinks_enabled: bool, blocked: &[&str]) -> PolicyInput {
        PolicyInput {
            secret_path: "safe-entrance.php".to_string(),
            permalinks_enabled,
            blocked_paths: blocked.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn generate_with_permalinks() {
        let lines = generate(&policy(true, &[]));
        assert_eq!(
            lines,
            vec![
                "<IfModule mod_rewrite.c>",
                "RewriteEngine On",
                "RewriteRule ^safe\\-entrance\\.php$ wp-login.php [NC,L]",
                "RewriteCond %{THE_REQUEST} wp\\-login\\.php [NC]",
                "RewriteRule ^wp\\-login\\.php$ - [F]",
                "RewriteCond %{REQUEST_URI}  ^/$",
                "RewriteCond %{QUERY_STRING} ^/?author=([0-9]*)",
                "RewriteRule ^(.*)$ - [F]",
                "</IfModule>",
            ]
        );
    }

    #[test]
    fn generate_without_permalinks() {
        let lines = generate(&policy(false, &[]));
        assert_eq!(lines.len(), 6);
        assert!(!lines.iter().any(|line| line == ANTI_ENUMERATION_QUERY));
        assert_eq!(lines.last().map(String::as_str), Some("</IfModule>"));
    }

    #[test]
    fn blocked_paths_follow_anti_enumeration() {
        let lines = generate(&policy(true, &["01234", "99999"]));
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[7], "RewriteRule ^(.*)$ - [F]");
        assert_eq!(lines[8], "RewriteRule ^01234$ - [F]");
        assert_eq!(lines[9], "RewriteRule ^99999$ - [F]");
    }

    #[test]
    fn blocked_paths_follow_handler_rules_without_permalinks() {
        let lines = generate(&policy(false, &["01234"]));
        assert_eq!(lines[5], "RewriteRule ^01234$ - [F]");
        assert_eq!(lines[6], "</IfModule>");
    }

    #[test]
    fn paths_are_escaped() {
        assert_eq!(route_rule("a+b(c).php"), "RewriteRule ^a\\+b\\(c\\)\\.php$ wp-login.php [NC,L]");
    }

    #[test]
    fn generate_is_deterministic() {
        let input = policy(true, &["00001"]);
        assert_eq!(generate(&input), generate(&input));
    }

    #[test]
    fn section_is_padded() {
        let section = generate_section(&policy(true, &[]), "FF");
        assert_eq!(section.len(), 13);
        assert_eq!(section[0], "");
        assert_eq!(section[1], "# BEGIN FF");
        assert_eq!(section[11], "# END FF");
        assert_eq!(section[12], "");
    }
}
