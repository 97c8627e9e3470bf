// Route template parsing and matching

use super::{ConstraintSet, SegmentConstraint};
use crate::{Error, Result};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Specificity of one template segment. Higher is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentRank {
    Wildcard = 0,
    Untyped = 1,
    Typed = 2,
    Literal = 3,
}

/// Per-segment ranks of a template, left to right.
pub type Ranks = SmallVec<[SegmentRank; 8]>;

/// One parsed template segment.
#[derive(Clone)]
pub enum Segment {
    /// Fixed text, e.g. `users`
    Literal(String),
    /// `{name}`
    Param { name: String },
    /// `{name:type}`
    Typed {
        name: String,
        type_name: String,
        constraint: Arc<dyn SegmentConstraint>,
    },
    /// `{*name}`, one or more trailing segments
    Wildcard { name: String },
}

impl Segment {
    pub fn rank(&self) -> SegmentRank {
        match self {
            Segment::Literal(_) => SegmentRank::Literal,
            Segment::Typed { .. } => SegmentRank::Typed,
            Segment::Param { .. } => SegmentRank::Untyped,
            Segment::Wildcard { .. } => SegmentRank::Wildcard,
        }
    }

    /// Placeholder name, `None` for literals.
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param { name } | Segment::Typed { name, .. } | Segment::Wildcard { name } => {
                Some(name)
            }
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => write!(f, "{}", text),
            Segment::Param { name } => write!(f, "{{{}}}", name),
            Segment::Typed {
                name, type_name, ..
            } => write!(f, "{{{}:{}}}", name, type_name),
            Segment::Wildcard { name } => write!(f, "{{*{}}}", name),
        }
    }
}

/// A compiled route template such as `/users/{id:int}/files/{*path}`.
#[derive(Clone)]
pub struct RouteTemplate {
    source: String,
    segments: Vec<Segment>,
    ranks: Ranks,
}

impl RouteTemplate {
    /// Compile `template`, resolving typed placeholders against `constraints`.
    pub fn parse(template: &str, constraints: &ConstraintSet) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRouteTemplate {
            template: template.to_string(),
            reason,
        };

        let trimmed = template.trim();
        let body = trimmed.trim_start_matches('/');
        // A single trailing slash is tolerated.
        let body = body.strip_suffix('/').unwrap_or(body);

        let mut segments = Vec::new();
        let mut names = HashSet::new();

        if !body.is_empty() {
            let raw: Vec<&str> = body.split('/').collect();
            for (index, part) in raw.iter().enumerate() {
                if part.is_empty() {
                    return Err(invalid("empty path segment".to_string()));
                }
                let segment = parse_segment(part, constraints).map_err(&invalid)?;

                if matches!(segment, Segment::Wildcard { .. }) && index + 1 != raw.len() {
                    return Err(invalid(format!(
                        "wildcard '{}' must be the last segment",
                        part
                    )));
                }
                if let Some(name) = segment.name() {
                    if !names.insert(name.to_string()) {
                        return Err(invalid(format!("duplicate placeholder '{}'", name)));
                    }
                }
                segments.push(segment);
            }
        }

        let ranks = segments.iter().map(Segment::rank).collect();
        Ok(Self {
            source: normalize(&segments),
            segments,
            ranks,
        })
    }

    /// The template in normalized form (leading slash, no trailing slash).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn ranks(&self) -> &Ranks {
        &self.ranks
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::name)
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard { .. }))
    }

    /// Match already-split path segments and extract placeholder values.
    ///
    /// Literal comparison ignores ASCII case unless `case_sensitive` is set.
    pub fn matches(&self, path: &[&str], case_sensitive: bool) -> Option<Vec<(String, String)>> {
        if self.has_wildcard() {
            // The wildcard needs at least one segment of its own.
            if path.len() < self.segments.len() {
                return None;
            }
        } else if path.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::with_capacity(self.segments.len());
        for (index, segment) in self.segments.iter().enumerate() {
            let value = path[index];
            match segment {
                Segment::Literal(text) => {
                    let equal = if case_sensitive {
                        text == value
                    } else {
                        text.eq_ignore_ascii_case(value)
                    };
                    if !equal {
                        return None;
                    }
                }
                Segment::Param { name } => params.push((name.clone(), value.to_string())),
                Segment::Typed {
                    name, constraint, ..
                } => {
                    constraint.validate(value).ok()?;
                    params.push((name.clone(), value.to_string()));
                }
                Segment::Wildcard { name } => {
                    params.push((name.clone(), path[index..].join("/")));
                }
            }
        }
        Some(params)
    }
}

impl fmt::Debug for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTemplate")
            .field("template", &self.source)
            .field("segments", &self.segments)
            .finish()
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_segment(part: &str, constraints: &ConstraintSet) -> std::result::Result<Segment, String> {
    let Some(inner) = part.strip_prefix('{') else {
        if part.contains(['{', '}']) {
            return Err(format!(
                "'{}': placeholders must occupy a whole segment",
                part
            ));
        }
        return Ok(Segment::Literal(part.to_string()));
    };

    let inner = inner
        .strip_suffix('}')
        .ok_or_else(|| format!("'{}': unterminated placeholder", part))?;
    if inner.contains(['{', '}']) {
        return Err(format!("'{}': nested braces", part));
    }

    if let Some(name) = inner.strip_prefix('*') {
        check_name(name)?;
        return Ok(Segment::Wildcard {
            name: name.to_string(),
        });
    }

    match inner.split_once(':') {
        Some((name, type_name)) => {
            check_name(name)?;
            let constraint = constraints
                .get(type_name)
                .cloned()
                .ok_or_else(|| format!("unknown placeholder type '{}'", type_name))?;
            Ok(Segment::Typed {
                name: name.to_string(),
                type_name: type_name.to_string(),
                constraint,
            })
        }
        None => {
            check_name(inner)?;
            Ok(Segment::Param {
                name: inner.to_string(),
            })
        }
    }
}

fn check_name(name: &str) -> std::result::Result<(), String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("invalid placeholder name '{}'", name))
    }
}

fn normalize(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments
        .iter()
        .map(|segment| format!("/{:?}", segment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(template: &str) -> Result<RouteTemplate> {
        RouteTemplate::parse(template, &ConstraintSet::with_builtins())
    }

    #[test]
    fn test_parse_and_normalize() {
        let template = parse("users/{id:int}/").unwrap();
        assert_eq!(template.as_str(), "/users/{id:int}");
        assert_eq!(
            template.ranks().as_slice(),
            &[SegmentRank::Literal, SegmentRank::Typed]
        );
        assert_eq!(template.param_names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_root_template() {
        for source in ["", "/"] {
            let template = parse(source).unwrap();
            assert_eq!(template.as_str(), "/");
            assert!(template.matches(&[], true).is_some());
            assert!(template.matches(&["x"], true).is_none());
        }
    }

    #[test]
    fn test_rejects_malformed_templates() {
        for bad in [
            "/users/{id",
            "/users/id}",
            "/users/pre{id}",
            "/users/{}",
            "/users/{1id}",
            "/a//b",
            "/files/{*rest}/tail",
            "/users/{id:color}",
            "/users/{id}/{id}",
        ] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidRouteTemplate { .. }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_match_extracts_params() {
        let template = parse("/users/{user_id}/posts/{post_id:uint}").unwrap();
        let params = template
            .matches(&["users", "7", "posts", "42"], true)
            .unwrap();
        assert_eq!(
            params,
            vec![
                ("user_id".to_string(), "7".to_string()),
                ("post_id".to_string(), "42".to_string()),
            ]
        );
        assert!(template.matches(&["users", "7", "posts", "x"], true).is_none());
        assert!(template.matches(&["users", "7"], true).is_none());
    }

    #[test]
    fn test_wildcard_consumes_rest() {
        let template = parse("/files/{*path}").unwrap();
        let params = template.matches(&["files", "a", "b.txt"], true).unwrap();
        assert_eq!(params, vec![("path".to_string(), "a/b.txt".to_string())]);
        assert!(template.matches(&["files"], true).is_none());
    }

    #[test]
    fn test_literal_case_folding() {
        let template = parse("/Users").unwrap();
        assert!(template.matches(&["users"], true).is_none());
        assert!(template.matches(&["users"], false).is_some());
    }
}
