use smol_str::SmolStr;
use std::fmt;

/// Identity of a configuration artifact, usually the workspace-relative path
/// of a beans configuration file (e.g. `/shop/src/main/resources/app.xml`).
///
/// Artifacts are compared by path only; the same path always names the same
/// resource across builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArtifactId(SmolStr);

impl ArtifactId {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(SmolStr::new(path.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether this artifact lives underneath `other` (or is `other`).
    pub fn starts_with(&self, other: &ArtifactId) -> bool {
        self.0.starts_with(other.as_str())
    }

    /// Resolve an import location against this artifact's directory.
    ///
    /// `classpath:` prefixes are ignored; absolute locations stand alone.
    pub fn resolve(&self, location: &str) -> ArtifactId {
        let location = location.trim();
        let location = location
            .strip_prefix("classpath*:")
            .or_else(|| location.strip_prefix("classpath:"))
            .unwrap_or(location);
        let location = location.trim_start_matches("./");
        if location.starts_with('/') {
            return ArtifactId::new(location);
        }
        match self.0.rfind('/') {
            Some(idx) => ArtifactId::new(format!("{}/{}", &self.0[..idx], location)),
            None => ArtifactId::new(location),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ArtifactId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// Identity of a project. One class path and one reference model exist per project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectId(SmolStr);

impl ProjectId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_import_locations() {
        let base = ArtifactId::new("/shop/conf/app.xml");
        assert_eq!(base.resolve("dao.xml").as_str(), "/shop/conf/dao.xml");
        assert_eq!(base.resolve("./sub/tx.xml").as_str(), "/shop/conf/sub/tx.xml");
        assert_eq!(base.resolve("/other/a.xml").as_str(), "/other/a.xml");
        assert_eq!(base.resolve("classpath:b.xml").as_str(), "/shop/conf/b.xml");
    }
}
