//! Route pattern compilation.
//!
//! Turns a declarative pattern such as `/users/{id::int}/posts/{slug}` into an
//! anchored regular expression with one named capture group per placeholder,
//! plus the ordered table of declared parameter types.
//!
//! Placeholder syntax:
//!
//! | Placeholder       | Captures          | Declared type |
//! |-------------------|-------------------|---------------|
//! | `{name}`          | one path segment  | `string`      |
//! | `{name::int}`     | one path segment  | `int`         |
//! | `{name::float}`   | one path segment  | `float`       |
//! | `{name::string}`  | one path segment  | `string`      |
//! | `{name::int?}`    | optional segment  | `int`         |
//!
//! Capture groups are type-agnostic (`[^/]+`): structural matching never looks
//! at declared types, coercion happens afterwards in [`crate::params`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::error::PatternError;

/// Body of a placeholder: name, optional `::type`, optional trailing `?`.
#[allow(clippy::expect_used)]
static PLACEHOLDER_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:::(\w*))?(\?)?$").expect("valid placeholder regex")
});

/// Name reserved for the parsed query string in [`crate::params::Params`].
pub const RESERVED_QUERY_PARAM: &str = "query";

/// Declared semantic type of a path placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    Int,
    Float,
    #[default]
    String,
}

impl FromStr for ParamType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(ParamType::Int),
            "float" => Ok(ParamType::Float),
            "string" => Ok(ParamType::String),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::String => "string",
        };
        write!(f, "{s}")
    }
}

/// One placeholder declared by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    /// Declared with a trailing `?`; an absent segment yields `null`
    pub optional: bool,
}

/// Compiled, immutable route pattern.
///
/// Created once when the route table is built and shared read-only by every
/// request afterwards. Matching never writes back into the pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Regex,
    params: Vec<ParamSpec>,
}

impl RoutePattern {
    /// Compile a pattern string.
    ///
    /// Literal characters are escaped, each placeholder becomes a named group
    /// and the expression is anchored at both ends. A pattern without
    /// placeholders compiles to a literal matcher with an empty parameter
    /// table.
    ///
    /// # Errors
    ///
    /// Unknown type tokens, malformed or duplicate placeholders and the
    /// reserved name `query` are rejected here rather than at request time.
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        let mut regex_src = String::with_capacity(raw.len() + 16);
        regex_src.push('^');
        let mut params: Vec<ParamSpec> = Vec::with_capacity(raw.matches('{').count());
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| PatternError::MalformedPlaceholder {
                    placeholder: rest[open..].to_string(),
                })?;
            let body = &after[..close];
            let spec = parse_placeholder(body)?;

            if spec.name == RESERVED_QUERY_PARAM {
                return Err(PatternError::ReservedName { name: spec.name });
            }
            if params.iter().any(|p| p.name == spec.name) {
                return Err(PatternError::DuplicateName { name: spec.name });
            }

            // An optional placeholder swallows the slash that introduces it,
            // so `/items/{page?}` matches both `/items` and `/items/2`.
            let lead_slash = spec.optional && literal.ends_with('/');
            if lead_slash {
                literal.pop();
            }
            regex_src.push_str(&regex::escape(&literal));
            literal.clear();

            match (spec.optional, lead_slash) {
                (true, true) => {
                    regex_src.push_str(&format!("(?:/(?P<{}>[^/]+))?", spec.name));
                }
                (true, false) => {
                    regex_src.push_str(&format!("(?P<{}>[^/]+)?", spec.name));
                }
                (false, _) => {
                    regex_src.push_str(&format!("(?P<{}>[^/]+)", spec.name));
                }
            }

            params.push(spec);
            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        regex_src.push_str(&regex::escape(&literal));
        regex_src.push('$');

        let regex = Regex::new(&regex_src).map_err(|e| PatternError::Regex(e.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            regex,
            params,
        })
    }

    /// The pattern exactly as registered.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Source of the compiled regular expression.
    #[must_use]
    pub fn regex_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Declared placeholders in pattern order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Declared type of a placeholder, if the pattern has one with this name.
    #[must_use]
    pub fn param_type(&self, name: &str) -> Option<ParamType> {
        self.params.iter().find(|p| p.name == name).map(|p| p.ty)
    }

    /// Structural match: does `path` have this pattern's shape?
    #[inline]
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return the raw captured values, aligned with
    /// [`params`](Self::params).
    ///
    /// A placeholder whose group did not participate in the match yields
    /// `None` rather than an empty string.
    #[must_use]
    pub fn capture<'a>(&self, path: &'a str) -> Option<Vec<Option<&'a str>>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.params
                .iter()
                .map(|p| caps.name(&p.name).map(|m| m.as_str()))
                .collect(),
        )
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn parse_placeholder(body: &str) -> Result<ParamSpec, PatternError> {
    let caps = PLACEHOLDER_BODY
        .captures(body)
        .ok_or_else(|| PatternError::MalformedPlaceholder {
            placeholder: format!("{{{body}}}"),
        })?;

    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let ty = match caps.get(2) {
        None => ParamType::String,
        Some(ty) => ty
            .as_str()
            .parse::<ParamType>()
            .map_err(|()| PatternError::UnknownType {
                name: name.to_string(),
                ty: ty.as_str().to_string(),
            })?,
    };

    Ok(ParamSpec {
        name: name.to_string(),
        ty,
        optional: caps.get(3).is_some(),
    })
}
