//! The shipped recipe catalog.

mod httpd;
mod mod_security;

pub use httpd::{httpd22, httpd24};
pub use mod_security::{mod_security, HOST_DEFAULT_THRESHOLD, TOOLCHAIN_THRESHOLD};

use crate::conflicts::VariantGroup;
use crate::error::ResolveError;
use crate::recipe::Recipe;

/// The two incompatible web server majors.
///
/// The server recipes list each other from this group, and add-on modules
/// derive their binding conflicts from it.
pub fn host_variants() -> VariantGroup {
    VariantGroup {
        product: "apache httpd".to_string(),
        variants: vec![
            ("httpd22".to_string(), "homebrew-httpd22".to_string()),
            ("httpd24".to_string(), "homebrew-httpd24".to_string()),
        ],
        explanation: "different versions of the same software".to_string(),
    }
}

pub fn all() -> Vec<Recipe> {
    vec![httpd22(), httpd24(), mod_security()]
}

pub fn find(name: &str) -> Result<Recipe, ResolveError> {
    all()
        .into_iter()
        .find(|r| r.name == name)
        .ok_or_else(|| ResolveError::UnknownRecipe(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find() {
        assert_eq!(find("httpd24").unwrap().version, "2.4.27");
        assert!(matches!(find("nginx"), Err(ResolveError::UnknownRecipe(_))));
    }

    #[test]
    fn test_registries_are_valid() {
        for recipe in all() {
            let registry = recipe.registry().unwrap();
            for option in registry.iter() {
                assert!(!option.name.starts_with("with"), "{}: {}", recipe.name, option.name);
            }
        }
    }

    #[test]
    fn test_templates_have_no_duplicate_keys() {
        for recipe in all() {
            assert!(
                recipe.configure.duplicate_keys().is_empty(),
                "{}: {:?}",
                recipe.name,
                recipe.configure.duplicate_keys()
            );
        }
    }

    #[test]
    fn test_variants_list_each_other() {
        assert_eq!(httpd22().conflicts_with, vec!["httpd24"]);
        assert_eq!(httpd24().conflicts_with, vec!["httpd22"]);
        let group = host_variants();
        for pkg in group.packages() {
            assert!(find(pkg).is_ok());
        }
    }
}
