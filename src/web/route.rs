use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Compiled route path: literal segments and `:name` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles `pattern`, returning a reason when it is malformed.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err("pattern must start with '/'".to_string());
        };

        let mut segments = Vec::new();
        for part in split_segments(rest) {
            match part.strip_prefix(':') {
                Some("") => return Err("placeholder without a name".to_string()),
                Some(name) => {
                    let duplicate = segments
                        .iter()
                        .any(|seg| matches!(seg, Segment::Param(existing) if existing == name));
                    if duplicate {
                        return Err(format!("placeholder ':{name}' appears twice"));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None if part.is_empty() => return Err("empty path segment".to_string()),
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Captures placeholder values when `path` matches.
    ///
    /// Each segment is percent-decoded before comparison, so `%2F` inside a
    /// capture stays part of that capture. Segments that do not decode to
    /// UTF-8 never match.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = split_segments(rest).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            let part = percent_decode_str(part).decode_utf8().ok()?;
            match segment {
                Segment::Literal(literal) if *literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    captures.insert(name.clone(), part.into_owned());
                }
            }
        }
        Some(captures)
    }

    /// Two patterns with the same shape accept exactly the same paths.
    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Segments of a path without its leading slash; one trailing slash is ignored.
fn split_segments(rest: &str) -> impl Iterator<Item = &str> {
    let trimmed = rest.strip_suffix('/').unwrap_or(rest);
    let empty_root = trimmed.is_empty();
    trimmed.split('/').filter(move |_| !empty_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_placeholder_matching() {
        let pattern = PathPattern::parse("/music/id/:_id").unwrap();
        let captures = pattern.matches("/music/id/abc").unwrap();
        assert_eq!(captures.get("_id").map(String::as_str), Some("abc"));

        assert!(pattern.matches("/music/id/abc/").is_some());
        assert!(pattern.matches("/music/id/").is_none());
        assert!(pattern.matches("/music/name/abc").is_none());
        assert!(pattern.matches("/music/id/abc/extra").is_none());
        assert!(pattern.matches("music/id/abc").is_none());
    }

    #[test]
    fn captures_are_percent_decoded() {
        let pattern = PathPattern::parse("/users/:username").unwrap();
        let captures = pattern.matches("/users/bob%20smith").unwrap();
        assert_eq!(captures["username"], "bob smith");

        let captures = pattern.matches("/users/J%C3%BCrgen").unwrap();
        assert_eq!(captures["username"], "Jürgen");

        let captures = pattern.matches("/users/a%2Fb").unwrap();
        assert_eq!(captures["username"], "a/b");

        assert!(pattern.matches("/users/%FF").is_none());
        assert!(PathPattern::parse("/music/artist").unwrap().matches("/music/%61rtist").is_some());
    }

    #[test]
    fn root_pattern() {
        let root = PathPattern::parse("/").unwrap();
        assert!(root.matches("/").is_some());
        assert!(root.matches("/x").is_none());
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(PathPattern::parse("users").is_err());
        assert!(PathPattern::parse("/users/:").is_err());
        assert!(PathPattern::parse("/a/:id/b/:id").is_err());
        assert!(PathPattern::parse("/a//b").is_err());
    }

    #[test]
    fn shape_ignores_placeholder_names() {
        let a = PathPattern::parse("/posts/:id").unwrap();
        let b = PathPattern::parse("/posts/:_id/").unwrap();
        let c = PathPattern::parse("/posts/author").unwrap();
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
        assert_eq!(a.to_string(), "/posts/:id");
    }
}
