//! Name and type patterns.
//!
//! Type patterns follow the AspectJ rules used by proxy-based AOP: `*` matches
//! any run of characters within one package segment, `..` matches any package
//! path, a trailing `+` includes subtypes and `[]` suffixes select array types.
//! Patterns without any `.` are also tried against names relative to the
//! implicit imports (`java.lang` and the package of the declaring aspect).

use regex::Regex;
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

use crate::error::MatchError;
use crate::java::{OBJECT, ProjectClassLoader, ResolvedType, hierarchy, is_primitive};

/// A compiled wildcard pattern over dotted names.
#[derive(Clone)]
pub struct NamePattern {
    source: SmolStr,
    regex: Regex,
}

impl NamePattern {
    /// Pattern over type and member names, where `*` stops at `.`.
    pub fn new(pattern: &str) -> Result<Self, String> {
        Self::build(pattern, "[^.]*")
    }

    /// Pattern over bean names, where `*` matches anything.
    pub fn bean(pattern: &str) -> Result<Self, String> {
        Self::build(pattern, ".*")
    }

    fn build(pattern: &str, star: &str) -> Result<Self, String> {
        if pattern.is_empty() {
            return Err("empty name pattern".to_string());
        }
        let mut regex = String::from("^");
        let mut rest = pattern;
        while let Some(c) = rest.chars().next() {
            if let Some(tail) = rest.strip_prefix("..") {
                regex.push_str(r"\.(?:[^.]*\.)*");
                rest = tail;
            } else if c == '*' {
                regex.push_str(star);
                rest = &rest[1..];
            } else {
                regex.push_str(&regex::escape(&rest[..c.len_utf8()]));
                rest = &rest[c.len_utf8()..];
            }
        }
        regex.push('$');
        let regex = Regex::new(&regex).map_err(|e| e.to_string())?;
        Ok(Self {
            source: SmolStr::new(pattern),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_any(&self) -> bool {
        self.source == "*"
    }

    /// Whether the pattern contains wildcards.
    pub fn is_wild(&self) -> bool {
        self.source.contains('*') || self.source.contains("..")
    }

    /// Whether the pattern is a plain identifier (no package, no wildcards).
    pub fn is_simple_identifier(&self) -> bool {
        !self.is_wild() && !self.source.contains('.')
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for NamePattern {}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamePattern({})", self.source)
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A type pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePattern {
    /// `*`: any type, including primitives and arrays.
    Any,
    Named {
        name: NamePattern,
        subtypes: bool,
        dims: usize,
    },
    Not(Box<TypePattern>),
    And(Box<TypePattern>, Box<TypePattern>),
    Or(Box<TypePattern>, Box<TypePattern>),
}

impl TypePattern {
    /// Parse one pattern word such as `com.acme..*Service+` or `String[]`.
    pub fn parse_word(word: &str) -> Result<Self, String> {
        let mut rest = word;
        let mut dims = 0;
        while let Some(stripped) = rest.strip_suffix("[]") {
            dims += 1;
            rest = stripped;
        }
        let subtypes = match rest.strip_suffix('+') {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };
        if rest.contains(['[', ']', '+']) {
            return Err(format!("invalid type pattern '{word}'"));
        }
        if rest == "*" && !subtypes && dims == 0 {
            return Ok(TypePattern::Any);
        }
        Ok(TypePattern::Named {
            name: NamePattern::new(rest)?,
            subtypes,
            dims,
        })
    }

    /// Exact pattern for a known type name.
    pub fn exact(type_name: &str) -> Result<Self, String> {
        Self::parse_word(type_name)
    }

    /// The plain identifier this pattern consists of, if it is one.
    pub fn simple_identifier(&self) -> Option<&str> {
        match self {
            TypePattern::Named {
                name,
                subtypes: false,
                dims: 0,
            } if name.is_simple_identifier() => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePattern::Any => f.write_str("*"),
            TypePattern::Named {
                name,
                subtypes,
                dims,
            } => {
                write!(f, "{name}")?;
                if *subtypes {
                    f.write_str("+")?;
                }
                for _ in 0..*dims {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            TypePattern::Not(inner) => write!(f, "!{inner}"),
            TypePattern::And(a, b) => write!(f, "({a} && {b})"),
            TypePattern::Or(a, b) => write!(f, "({a} || {b})"),
        }
    }
}

/// Matches type patterns against type names in the context of one loader.
pub struct TypeMatcher<'a> {
    loader: &'a dyn ProjectClassLoader,
    /// Packages whose types may be named by their simple name.
    imports: &'a [SmolStr],
}

impl<'a> TypeMatcher<'a> {
    pub fn new(loader: &'a dyn ProjectClassLoader, imports: &'a [SmolStr]) -> Self {
        Self { loader, imports }
    }

    pub fn loader(&self) -> &'a dyn ProjectClassLoader {
        self.loader
    }

    /// Whether `type_name` (binary name, possibly an array or primitive)
    /// matches `pattern`.
    pub fn matches(&self, pattern: &TypePattern, type_name: &str) -> Result<bool, MatchError> {
        match pattern {
            TypePattern::Any => Ok(true),
            TypePattern::Not(inner) => Ok(!self.matches(inner, type_name)?),
            TypePattern::And(a, b) => Ok(self.matches(a, type_name)? && self.matches(b, type_name)?),
            TypePattern::Or(a, b) => Ok(self.matches(a, type_name)? || self.matches(b, type_name)?),
            TypePattern::Named {
                name,
                subtypes,
                dims,
            } => {
                let (element, type_dims) = split_array(type_name);
                if type_dims != *dims {
                    return Ok(false);
                }
                if self.matches_name(name, element) {
                    return Ok(true);
                }
                if !*subtypes || is_primitive(element) {
                    return Ok(false);
                }
                if self.matches_name(name, OBJECT) {
                    return Ok(true);
                }
                let Some(resolved) = self.resolve(element)? else {
                    return Ok(false);
                };
                Ok(resolved
                    .all_types()
                    .skip(1)
                    .any(|t| self.matches_name(name, &t.name)))
            }
        }
    }

    /// Name-only match, honouring implicit imports for dotless patterns.
    pub fn matches_name(&self, pattern: &NamePattern, type_name: &str) -> bool {
        let source_name = type_name.replace('$', ".");
        if pattern.matches(&source_name) {
            return true;
        }
        if pattern.as_str().contains('.') {
            return false;
        }
        self.imports.iter().any(|import| {
            source_name
                .strip_prefix(import.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|simple| !simple.contains('.') && pattern.matches(simple))
        })
    }

    /// Whether `type_name` can be assigned to `target` (same type or subtype).
    pub fn is_assignable(&self, type_name: &str, target: &str) -> Result<bool, MatchError> {
        if type_name == target || (target == OBJECT && !is_primitive(type_name)) {
            return Ok(true);
        }
        if is_primitive(type_name) || type_name.ends_with("[]") {
            return Ok(false);
        }
        Ok(self
            .resolve(type_name)?
            .is_some_and(|resolved| resolved.is_assignable_to(target)))
    }

    /// Resolve a hierarchy. Platform types the project class path does not
    /// carry resolve to `None` rather than failing the match.
    fn resolve(&self, type_name: &str) -> Result<Option<Arc<ResolvedType>>, MatchError> {
        match hierarchy::resolve(self.loader, type_name) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(MatchError::ClassNotFound { name })
                if name == type_name && is_platform_type(type_name) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Types of the Java platform itself.
pub fn is_platform_type(type_name: &str) -> bool {
    type_name.starts_with("java.") || type_name.starts_with("javax.")
}

/// Split `a.B[][]` into `("a.B", 2)`.
pub fn split_array(type_name: &str) -> (&str, usize) {
    let mut rest = type_name;
    let mut dims = 0;
    while let Some(stripped) = rest.strip_suffix("[]") {
        rest = stripped;
        dims += 1;
    }
    (rest, dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java::{JavaClass, StaticClassPath};
    use rstest::rstest;

    #[rstest]
    #[case("com.acme.Service", "com.acme.Service", true)]
    #[case("com.acme.*", "com.acme.Service", true)]
    #[case("com.acme.*", "com.acme.sub.Service", false)]
    #[case("com.acme..*", "com.acme.sub.Service", true)]
    #[case("com..*Service", "com.acme.sub.OrderService", true)]
    #[case("*..*Service", "com.acme.OrderService", true)]
    #[case("get*", "getName", true)]
    #[case("get*", "setName", false)]
    #[case("*", "anything", true)]
    fn test_name_patterns(#[case] pattern: &str, #[case] name: &str, #[case] expected: bool) {
        assert_eq!(NamePattern::new(pattern).unwrap().matches(name), expected);
    }

    #[test]
    fn test_bean_patterns_cross_dots() {
        let pattern = NamePattern::bean("*Service").unwrap();
        assert!(pattern.matches("com.acme.OrderService"));
        assert!(!NamePattern::new("*Service").unwrap().matches("com.acme.OrderService"));
    }

    #[rstest]
    #[case("*", TypePattern::Any)]
    #[case("String[]", TypePattern::Named { name: NamePattern::new("String").unwrap(), subtypes: false, dims: 1 })]
    #[case("com.acme.Service+", TypePattern::Named { name: NamePattern::new("com.acme.Service").unwrap(), subtypes: true, dims: 0 })]
    fn test_parse_word(#[case] word: &str, #[case] expected: TypePattern) {
        assert_eq!(TypePattern::parse_word(word).unwrap(), expected);
    }

    #[test]
    fn test_simple_names_use_imports() {
        let cp = StaticClassPath::new();
        let imports = [SmolStr::new("java.lang"), SmolStr::new("com.acme")];
        let types = TypeMatcher::new(&cp, &imports);
        let string = TypePattern::parse_word("String").unwrap();
        assert!(types.matches(&string, "java.lang.String").unwrap());
        assert!(!types.matches(&string, "java.lang.String[]").unwrap());
        let service = TypePattern::parse_word("*Service").unwrap();
        assert!(types.matches(&service, "com.acme.OrderService").unwrap());
        assert!(!types.matches(&service, "org.other.OrderService").unwrap());
    }

    #[test]
    fn test_subtype_patterns_resolve_hierarchy() {
        let cp = StaticClassPath::new()
            .with_class(JavaClass::interface("com.acme.Api"))
            .with_class(JavaClass::new("com.acme.Impl").implementing("com.acme.Api"));
        let types = TypeMatcher::new(&cp, &[]);
        let api = TypePattern::parse_word("com.acme.Api+").unwrap();
        assert!(types.matches(&api, "com.acme.Impl").unwrap());
        assert!(types.matches(&api, "com.acme.Api").unwrap());
        let exact = TypePattern::parse_word("com.acme.Api").unwrap();
        assert!(!types.matches(&exact, "com.acme.Impl").unwrap());
        crate::java::reset_world(crate::java::ProjectClassLoader::id(&cp));
    }

    #[test]
    fn test_missing_platform_types_are_not_assignable() {
        let cp = StaticClassPath::new().with_class(JavaClass::new("com.acme.Account"));
        let types = TypeMatcher::new(&cp, &[]);
        assert!(!types.is_assignable("java.lang.String", "com.acme.Account").unwrap());
        assert!(types.is_assignable("com.acme.Account", OBJECT).unwrap());
        assert!(types.is_assignable("com.acme.Gone", "com.acme.Account").is_err());
        crate::java::reset_world(crate::java::ProjectClassLoader::id(&cp));
    }
}
