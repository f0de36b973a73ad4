//! Origin policy for window messages received by the parent

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::ParentConfig;
use crate::constants::{ANY_ORIGIN, OPAQUE_ORIGIN};

/// Which origins the parent trusts
///
/// A message is accepted when its origin is listed in `allowed`, when
/// `allowed` contains `"*"`, or when it is the opaque origin `"null"` and
/// `allow_opaque` is set (sandboxed frame). The source window is checked
/// separately by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    pub allowed: Vec<String>,
    pub allow_opaque: bool,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>, allow_opaque: bool) -> Self {
        Self { allowed, allow_opaque }
    }

    pub fn from_config(config: &ParentConfig) -> Self {
        Self::new(config.allowed_origins.clone(), config.sandboxed)
    }

    /// Trust an additional origin (e.g. the page's own origin)
    pub fn allow(&mut self, origin: &str) {
        if !self.allowed.iter().any(|o| o == origin) {
            self.allowed.push(String::from(origin));
        }
    }

    pub fn accepts(&self, origin: &str) -> bool {
        if origin == OPAQUE_ORIGIN {
            return self.allow_opaque;
        }
        self.allowed
            .iter()
            .any(|allowed| allowed == ANY_ORIGIN || allowed == origin)
    }
}

/// Links the frame may ask the parent to open
pub fn is_http_url(url: &str) -> bool {
    let lower = |prefix: &str| {
        url.get(..prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
    };
    lower("https://") || lower("http://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_opaque_origin_only_when_sandboxed() {
        let sandboxed = OriginPolicy::new(Vec::new(), true);
        assert!(sandboxed.accepts("null"));
        assert!(!sandboxed.accepts("https://evil.example"));

        let open = OriginPolicy::new(vec!["https://courses.example".into()], false);
        assert!(!open.accepts("null"));
        assert!(open.accepts("https://courses.example"));
    }

    #[test]
    fn test_exact_match() {
        let policy = OriginPolicy::new(vec!["https://courses.example".into()], false);
        assert!(!policy.accepts("https://courses.example.evil.com"));
        assert!(!policy.accepts("http://courses.example"));
    }

    #[test]
    fn test_wildcard_does_not_admit_opaque() {
        let policy = OriginPolicy::new(vec!["*".into()], false);
        assert!(policy.accepts("https://anything.example"));
        assert!(!policy.accepts("null"));
    }

    #[test]
    fn test_allow_is_idempotent() {
        let mut policy = OriginPolicy::default();
        policy.allow("https://a.example");
        policy.allow("https://a.example");
        assert_eq!(policy.allowed.len(), 1);
        assert!(policy.accepts("https://a.example"));
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://a"));
        assert!(is_http_url("https://a"));
        assert!(!is_http_url("ftp://a"));
        assert!(!is_http_url("http"));
    }
}
