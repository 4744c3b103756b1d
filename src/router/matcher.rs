//! Path template compilation.
//!
//! A template such as `/users/{id}/posts/{post_id}.json` is split into literal
//! text and `{name}` placeholders. Literal text is regex-escaped and every
//! placeholder becomes `([^/]+)`, so a capture always holds at least one
//! character and never crosses a `/`. The compiled pattern is anchored at both
//! ends.

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

use super::RouterError;

/// Maximum number of captured parameters kept inline before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured `(name, value)` pairs in declaration order.
///
/// Names are shared with the compiled matcher, values are per-request data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Named path parameters captured by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(ParamVec);

impl PathParams {
    /// Look up a parameter by name.
    ///
    /// If a template declares the same name twice the last capture wins.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, value)` pairs in template declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_ref()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ParamVec> for PathParams {
    fn from(params: ParamVec) -> Self {
        Self(params)
    }
}

/// A compiled route template.
#[derive(Clone)]
pub struct PathMatcher {
    template: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher")
            .field("template", &self.template)
            .field("pattern", &self.regex.as_str())
            .field("param_names", &self.param_names)
            .finish()
    }
}

impl PathMatcher {
    /// Compile a route template into an anchored matcher.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`] if the generated expression is
    /// rejected by the regex engine (for example when it exceeds the size limit).
    pub fn compile(template: &str) -> Result<Self, RouterError> {
        let mut pattern = String::with_capacity(template.len() + 16);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(template.matches('{').count());

        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            pattern.push_str(&regex::escape(&template[last..whole.start()]));
            pattern.push_str("([^/]+)");
            param_names.push(Arc::from(name.as_str()));
            last = whole.end();
        }
        pattern.push_str(&regex::escape(&template[last..]));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| RouterError::InvalidPattern {
            path: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            param_names,
        })
    }

    /// The template this matcher was compiled from.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in declaration order.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    /// Cheap boolean check without building the parameter list.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a concrete request path, returning the captured parameters.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                params.push((Arc::clone(name), value.as_str().to_string()));
            }
        }
        Some(PathParams(params))
    }
}
