//! String to value conversion for route, query, header and form fields.
//!
//! The [`ParserRegistry`] maps a type identity to a [`ValueParser`]. Resolution for a field
//! type tries, in order:
//!
//! 1. an exact registry entry
//! 2. the enum member parser carried by the field's [`TypeInfo`]
//! 3. the type's own [`TryParse`](crate::descriptor::TryParse) implementation
//!
//! and otherwise fails with [`BindingError::UnsupportedType`] while the plan is built.
//!
//! All conversions are locale-independent. A value that does not parse is not an error:
//! the field keeps its default.

use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::any::TypeId;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::error::BindingError;
use crate::descriptor::{ParsedValue, RawParser, TypeInfo};

/// Type-erased parser held by the registry and by field setters.
pub type ValueParser = Arc<dyn Fn(&str) -> Option<ParsedValue> + Send + Sync>;

/// Registry of scalar parsers keyed by type identity.
///
/// Registering a parser for a type that already has one replaces it; the defaults are
/// installed first, so host registrations override them.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<TypeId, (&'static str, ValueParser)>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.parsers.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("ParserRegistry").field("types", &names).finish()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

macro_rules! from_str_parsers {
    ($registry:ident; $($ty:ty),* $(,)?) => {
        $(
            $registry.register::<$ty, _>(|s| s.trim().parse::<$ty>().ok());
        )*
    };
}

impl ParserRegistry {
    /// Registry with no parsers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry with parsers for strings, numbers, booleans, date/time kinds,
    /// identifiers, durations and base64 byte arrays.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register::<String, _>(|s| Some(s.to_string()));
        registry.register::<char, _>(|s| {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        });
        registry.register::<bool, _>(parse_bool);
        from_str_parsers!(registry; i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
        registry.register::<Decimal, _>(|s| {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        });
        registry.register::<Uuid, _>(|s| Uuid::parse_str(s.trim()).ok());
        registry.register::<NaiveDate, _>(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
        registry.register::<NaiveTime, _>(|s| NaiveTime::from_str(s.trim()).ok());
        registry.register::<NaiveDateTime, _>(parse_naive_datetime);
        registry.register::<DateTime<FixedOffset>, _>(|s| DateTime::parse_from_rfc3339(s.trim()).ok());
        registry.register::<DateTime<Utc>, _>(|s| {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_naive_datetime(s).map(|naive| naive.and_utc()))
        });
        registry.register::<Duration, _>(parse_duration);
        registry.register::<Vec<u8>, _>(|s| base64::engine::general_purpose::STANDARD.decode(s.trim()).ok());
        registry
    }

    /// Register (or replace) the parser for `T`.
    pub fn register<T, F>(&mut self, parse: F)
    where
        T: Send + 'static,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        self.register_raw(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            Arc::new(move |input: &str| parse(input).map(|v| Box::new(v) as ParsedValue)),
        );
    }

    /// Register (or replace) an already type-erased parser.
    pub fn register_raw(&mut self, type_id: TypeId, type_name: &'static str, parser: ValueParser) {
        if self.parsers.insert(type_id, (type_name, parser)).is_some() {
            debug!(type_name = type_name, "Parser replaced");
        }
    }

    #[must_use]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.parsers.contains_key(&type_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Resolve the parser for a field type.
    ///
    /// # Errors
    ///
    /// [`BindingError::UnsupportedType`] when no step of the resolution order applies.
    pub fn resolve(&self, field: &'static str, info: &TypeInfo) -> Result<ValueParser, BindingError> {
        if let Some((_, parser)) = self.parsers.get(&info.type_id) {
            return Ok(Arc::clone(parser));
        }
        if let Some(parser) = info.enum_parser.or(info.try_parse) {
            return Ok(from_fn(parser));
        }
        Err(BindingError::UnsupportedType {
            field,
            type_name: info.type_name,
        })
    }
}

fn from_fn(parser: RawParser) -> ValueParser {
    Arc::new(parser)
}

fn parse_bool(input: &str) -> Option<bool> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("true") {
        Some(true)
    } else if input.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_naive_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `[d.]hh:mm[:ss[.fff]]`, or a whole number of seconds.
pub(crate) fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let (days, clock) = match input.split_once('.') {
        Some((days, rest)) if !days.contains(':') => (days.parse::<u64>().ok()?, rest),
        _ => (0, input),
    };

    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let (seconds, nanos) = match parts.next() {
        Some(sec) => match sec.split_once('.') {
            Some((whole, frac)) => {
                let digits: String = frac.chars().take(9).collect();
                let scale = 10u32.pow(9 - u32::try_from(digits.len()).ok()?);
                (whole.parse::<u64>().ok()?, digits.parse::<u32>().ok()? * scale)
            }
            None => (sec.parse::<u64>().ok()?, 0),
        },
        None => (0, 0),
    };
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    let total = days
        .checked_mul(86_400)?
        .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
    Some(Duration::new(total, nanos))
}
