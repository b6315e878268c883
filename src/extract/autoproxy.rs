//! `@AspectJ` autoproxy configuration.

use regex::Regex;

use crate::beans::{AUTO_PROXY_CREATOR_BEAN_NAME, BeansConfig, PropertyValue};
use crate::error::ExtractError;

/// Settings of the autoproxy creator governing annotation-style aspects.
#[derive(Debug, Clone)]
pub struct AutoproxyConfig {
    pub proxy_target_class: bool,
    /// `None` includes every bean; `Some(empty)` includes none.
    pub include_patterns: Option<Vec<Regex>>,
}

impl AutoproxyConfig {
    /// Whether the bean `name` may be an aspect.
    pub fn includes(&self, name: &str) -> bool {
        match &self.include_patterns {
            None => true,
            Some(patterns) => patterns.iter().any(|p| p.is_match(name)),
        }
    }
}

/// The autoproxy configuration in effect for `configs`, if any of them
/// registers the autoproxy creator.
pub fn autoproxy_config<'a>(
    configs: impl IntoIterator<Item = &'a BeansConfig>,
) -> Result<Option<AutoproxyConfig>, ExtractError> {
    for config in configs {
        let Some(creator) = config.bean(AUTO_PROXY_CREATOR_BEAN_NAME) else {
            continue;
        };
        let proxy_target_class = creator
            .property("proxyTargetClass")
            .and_then(PropertyValue::as_str)
            .is_some_and(|v| v.trim() == "true");
        let include_patterns = match creator.property("includePatterns").and_then(PropertyValue::as_list) {
            None => None,
            Some(patterns) => Some(
                patterns
                    .iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| full_match(p))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        return Ok(Some(AutoproxyConfig {
            proxy_target_class,
            include_patterns,
        }));
    }
    Ok(None)
}

fn full_match(pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(&format!("^(?:{})$", pattern.trim())).map_err(|source| ExtractError::IncludePattern {
        pattern: pattern.to_string(),
        source,
    })
}
