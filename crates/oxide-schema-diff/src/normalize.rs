//! Type-string normalization applied before columns are compared.
//!
//! The diff engine compares `data_type` strings exactly by default. A
//! [`TypeNormalizer`] lets callers treat dialect aliases (`int4` vs
//! `integer`) as equal. Normalized forms are only used for the equality
//! check; generated SQL always uses the type string as reported.

use std::borrow::Cow;

/// Maps a reported type string to a canonical form for comparison.
pub trait TypeNormalizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the canonical form of `data_type`.
    fn normalize<'a>(&self, data_type: &'a str) -> Cow<'a, str>;

    /// Returns `true` if the two type strings denote the same type.
    fn equivalent(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

/// Exact, case-sensitive comparison. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTypes;

impl TypeNormalizer for ExactTypes {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn normalize<'a>(&self, data_type: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(data_type)
    }
}

/// PostgreSQL type aliases, compared case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresTypeAliases;

const POSTGRES_ALIASES: &[(&str, &str)] = &[
    ("int", "integer"),
    ("int4", "integer"),
    ("int8", "bigint"),
    ("int2", "smallint"),
    ("bool", "boolean"),
    ("float4", "real"),
    ("float8", "double precision"),
    ("varchar", "character varying"),
    ("char", "character"),
    ("bpchar", "character"),
    ("decimal", "numeric"),
    ("timestamptz", "timestamp with time zone"),
    ("timestamp", "timestamp without time zone"),
    ("timetz", "time with time zone"),
    ("time", "time without time zone"),
];

impl TypeNormalizer for PostgresTypeAliases {
    fn name(&self) -> &'static str {
        "postgres-aliases"
    }

    fn normalize<'a>(&self, data_type: &'a str) -> Cow<'a, str> {
        let lowered = data_type
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        // Pull out "(n)" / "(p, s)" and a trailing "[]" so the base name
        // can be looked up on its own.
        let (mut base, mut modifier) = (lowered.clone(), String::new());
        if let (Some(open), Some(close)) = (lowered.find('('), lowered.find(')')) {
            if open < close {
                modifier = lowered[open..=close].replace(' ', "");
                base = format!("{} {}", lowered[..open].trim(), lowered[close + 1..].trim());
            }
        }
        let mut array = "";
        let mut base = base.trim().to_string();
        if let Some(stripped) = base.strip_suffix("[]") {
            base = stripped.trim_end().to_string();
            array = "[]";
        }

        let canonical = POSTGRES_ALIASES
            .iter()
            .find(|(alias, _)| *alias == base)
            .map_or(base.as_str(), |(_, canonical)| *canonical);

        Cow::Owned(format!("{canonical}{modifier}{array}"))
    }
}
