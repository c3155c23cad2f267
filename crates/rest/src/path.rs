// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Composable URL templates
//!
//! A [`Path`] is a value: every builder method consumes it and returns a new path
//! with one more element, so partially built paths can be cloned and shared
//! between operations.

use std::collections::HashSet;

use crate::{error::RegistrationError, param::Param};

#[derive(Debug, Clone)]
enum Element {
    Segment(String),
    Param(Param),
}

/// URL template made of literal segments and parameter placeholders
#[derive(Debug, Clone, Default)]
pub struct Path {
    elements: Vec<Element>,
}

impl Path {
    /// Start a path from a literal base such as `/api/v1`
    pub fn base(base: &str) -> Self {
        Self::default().segment(base)
    }

    /// Append a literal segment
    ///
    /// Surrounding slashes are trimmed and inner slashes split the value into
    /// several segments, so `segment("/a/b/")` equals `segment("a").segment("b")`.
    #[must_use]
    pub fn segment(mut self, segment: &str) -> Self {
        self.elements.extend(
            segment
                .split('/')
                .filter(|part| !part.is_empty())
                .map(|part| Element::Segment(part.to_string())),
        );
        self
    }

    /// Append a required path parameter placeholder
    #[must_use]
    pub fn param(self, name: &str) -> Self {
        self.param_with(name, |param| param)
    }

    /// Append a path parameter placeholder and configure its validators
    #[must_use]
    pub fn param_with(mut self, name: &str, configure: impl FnOnce(Param) -> Param) -> Self {
        let param = configure(Param::path(name).required());
        self.elements.push(Element::Param(param));
        self
    }

    /// Render the template, replacing placeholders with `{name}`
    pub fn render(&self) -> String {
        if self.elements.is_empty() {
            return "/".to_string();
        }

        self.elements.iter().fold(String::new(), |mut rendered, element| {
            rendered.push('/');
            match element {
                Element::Segment(segment) => rendered.push_str(segment),
                Element::Param(param) => {
                    rendered.push('{');
                    rendered.push_str(param.name());
                    rendered.push('}');
                }
            }
            rendered
        })
    }

    /// Parameters declared by the placeholders, in order
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.elements.iter().filter_map(|element| match element {
            Element::Param(param) => Some(param),
            Element::Segment(_) => None,
        })
    }

    /// Whether the path has a placeholder named `name`
    pub fn has_param(&self, name: &str) -> bool {
        self.params().any(|param| param.name() == name)
    }

    /// Reject paths that use the same placeholder name twice
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let mut seen = HashSet::new();
        for param in self.params() {
            if !seen.insert(param.name()) {
                return Err(RegistrationError::DuplicatePathParameter {
                    path: self.render(),
                    name: param.name().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_segments_and_params() {
        let path = Path::base("/api/v1").segment("pets").param("id");
        assert_eq!(path.render(), "/api/v1/pets/{id}");
    }

    #[test]
    fn keeps_exactly_one_slash() {
        let path = Path::base("api/").segment("//pets//").segment("/toys");
        assert_eq!(path.render(), "/api/pets/toys");
    }

    #[test]
    fn root_path() {
        assert_eq!(Path::base("/").render(), "/");
        assert_eq!(Path::default().render(), "/");
    }

    #[test]
    fn builders_return_new_values() {
        let base = Path::base("/pets");
        let by_id = base.clone().param("id");
        assert_eq!(base.render(), "/pets");
        assert_eq!(by_id.render(), "/pets/{id}");
    }

    #[test]
    fn duplicate_params_are_rejected() {
        let path = Path::base("/a").param("id").segment("b").param("id");
        let err = path.validate().err();
        assert!(matches!(
            err,
            Some(RegistrationError::DuplicatePathParameter { ref name, .. }) if name == "id"
        ));
    }

    #[test]
    fn param_with_configures_validators() {
        let path = Path::base("/pets").param_with("id", |param| param.regex(r"^\d+$"));
        let param = path.params().next();
        assert!(param.is_some_and(|p| p.pattern() == Some(r"^\d+$") && p.is_required()));
        assert!(path.has_param("id"));
        assert!(!path.has_param("name"));
    }
}
