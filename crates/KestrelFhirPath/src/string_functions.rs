//! # FHIRPath String Functions
//!
//! String manipulation over a singleton String input. An empty input (or an
//! empty argument) gives an empty result; a non-String input is a `TypeError`.
//! Positions and lengths count characters, not bytes.
//!
//! `matches()` and `replaceMatches()` go through the context's regex cache and
//! run under the regex deadline, so hostile patterns are rejected before
//! compilation and slow matches end in `Timeout`.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use kestrel_fhirpath_support::{Collection, EvaluationError, Value};

use crate::context::EvaluationContext;
use crate::registry::{FunctionRegistry, integer_arg, string_arg};

/// The input as a string, `None` when empty.
fn string_input<'a>(input: &'a Collection, function: &str) -> Result<Option<&'a str>, EvaluationError> {
    match input.singleton(&format!("{}()", function))? {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(EvaluationError::TypeError(format!(
            "{}() requires a String input, found {}",
            function,
            other.type_name()
        ))),
    }
}

/// Runs `f` over a string input and a required string argument.
fn with_string_arg(
    input: &Collection,
    args: &[Collection],
    function: &str,
    f: impl FnOnce(&str, &str) -> Result<Collection, EvaluationError>,
) -> Result<Collection, EvaluationError> {
    let Some(text) = string_input(input, function)? else {
        return Ok(Collection::empty());
    };
    let Some(arg) = string_arg(args, 0, function)? else {
        return Ok(Collection::empty());
    };
    f(text, arg)
}

/// Character position of the first occurrence of `substring`, or -1.
///
/// # Examples
///
/// ```text
/// 'abcdefg'.indexOf('bc') = 1
/// 'abcdefg'.indexOf('x') = -1
/// 'abcdefg'.indexOf('') = 0
/// ```
pub fn index_of(text: &str, substring: &str) -> i64 {
    match text.find(substring) {
        Some(byte_index) => text[..byte_index].chars().count() as i64,
        None => -1,
    }
}

/// Implements the FHIRPath substring() function
///
/// Syntax: substring(start : Integer [, length : Integer]) : String
///
/// # Returns
///
/// * The characters from `start` up to `length` characters (or to the end)
/// * Empty when `start` lies outside the string
///
/// # Examples
///
/// ```text
/// 'abcdefg'.substring(3) = 'defg'
/// 'abcdefg'.substring(1, 2) = 'bc'
/// 'abcdefg'.substring(6, 2) = 'g'
/// 'abcdefg'.substring(7, 1) = {}
/// 'abcdefg'.substring(-1, 1) = {}
/// ```
pub fn substring(text: &str, start: i64, length: Option<i64>) -> Option<String> {
    let char_count = text.chars().count() as i64;
    if start < 0 || start >= char_count {
        return None;
    }
    let take = match length {
        Some(length) if length <= 0 => return Some(String::new()),
        Some(length) => length as usize,
        None => usize::MAX,
    };
    Some(text.chars().skip(start as usize).take(take).collect())
}

/// Splits on a literal separator. An empty separator splits into characters.
pub fn split(text: &str, separator: &str) -> Collection {
    if separator.is_empty() {
        return to_chars(text);
    }
    text.split(separator).map(Value::string).collect()
}

pub fn to_chars(text: &str) -> Collection {
    text.chars().map(|c| Value::String(c.to_string())).collect()
}

/// Implements the FHIRPath join() function
///
/// Joins every String in the input with `separator` (default empty). Non-String
/// elements are a `TypeError`.
///
/// # Examples
///
/// ```text
/// ('a' | 'b' | 'c').join(',') = 'a,b,c'
/// {}.join(',') = ''
/// ```
pub fn join(input: &Collection, separator: &str) -> Result<String, EvaluationError> {
    let parts = input
        .iter()
        .map(|item| {
            item.as_str().ok_or_else(|| {
                EvaluationError::TypeError(format!(
                    "join() requires String elements, found {}",
                    item.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(separator))
}

/// Encodes text as `base64`, `urlbase64` or `hex`.
pub fn encode(text: &str, format: &str) -> Result<String, EvaluationError> {
    match format {
        "base64" => Ok(STANDARD.encode(text.as_bytes())),
        "urlbase64" => Ok(URL_SAFE.encode(text.as_bytes())),
        "hex" => Ok(hex::encode(text.as_bytes())),
        other => Err(unknown_encoding("encode", other)),
    }
}

/// Decodes `base64`, `urlbase64` or `hex` text. Input that does not decode to
/// UTF-8 text gives `None`.
pub fn decode(text: &str, format: &str) -> Result<Option<String>, EvaluationError> {
    let bytes = match format {
        "base64" => STANDARD.decode(text).ok(),
        "urlbase64" => URL_SAFE.decode(text).ok(),
        "hex" => hex::decode(text).ok(),
        other => return Err(unknown_encoding("decode", other)),
    };
    Ok(bytes.and_then(|bytes| String::from_utf8(bytes).ok()))
}

fn unknown_encoding(function: &str, format: &str) -> EvaluationError {
    EvaluationError::invalid_expression(format!(
        "{}() does not support the '{}' encoding; expected base64, urlbase64 or hex",
        function, format
    ))
}

/// `matches()`: whether the pattern matches anywhere in the input.
fn matches(text: &str, pattern: &str, ctx: &EvaluationContext) -> Result<Collection, EvaluationError> {
    let matched = ctx.regex_cache().match_with_timeout(
        pattern,
        text,
        ctx.regex_deadline(),
        ctx.cancellation(),
    )?;
    Ok(Collection::boolean(matched))
}

fn replace_matches(
    text: &str,
    pattern: &str,
    replacement: &str,
    ctx: &EvaluationContext,
) -> Result<Collection, EvaluationError> {
    let replaced = ctx.regex_cache().replace_with_timeout(
        pattern,
        text,
        replacement,
        ctx.regex_deadline(),
        ctx.cancellation(),
    )?;
    Ok(Collection::single(replaced))
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("indexOf", 1, Some(1), |input, args, _| {
        with_string_arg(input, args, "indexOf", |text, sub| {
            Ok(Collection::single(Value::Integer(index_of(text, sub))))
        })
    });
    registry.define("substring", 1, Some(2), |input, args, _| {
        let Some(text) = string_input(input, "substring")? else {
            return Ok(Collection::empty());
        };
        let Some(start) = integer_arg(args, 0, "substring")? else {
            return Ok(Collection::empty());
        };
        let length = integer_arg(args, 1, "substring")?;
        Ok(substring(text, start, length).map(Value::String).into())
    });
    registry.define("startsWith", 1, Some(1), |input, args, _| {
        with_string_arg(input, args, "startsWith", |text, prefix| {
            Ok(Collection::boolean(text.starts_with(prefix)))
        })
    });
    registry.define("endsWith", 1, Some(1), |input, args, _| {
        with_string_arg(input, args, "endsWith", |text, suffix| {
            Ok(Collection::boolean(text.ends_with(suffix)))
        })
    });
    registry.define("contains", 1, Some(1), |input, args, _| {
        with_string_arg(input, args, "contains", |text, sub| {
            Ok(Collection::boolean(text.contains(sub)))
        })
    });
    registry.define("upper", 0, Some(0), |input, _, _| {
        Ok(string_input(input, "upper")?.map(|s| Value::String(s.to_uppercase())).into())
    });
    registry.define("lower", 0, Some(0), |input, _, _| {
        Ok(string_input(input, "lower")?.map(|s| Value::String(s.to_lowercase())).into())
    });
    registry.define("trim", 0, Some(0), |input, _, _| {
        Ok(string_input(input, "trim")?.map(|s| Value::string(s.trim())).into())
    });
    registry.define("length", 0, Some(0), |input, _, _| {
        Ok(string_input(input, "length")?
            .map(|s| Value::Integer(s.chars().count() as i64))
            .into())
    });
    registry.define("toChars", 0, Some(0), |input, _, _| {
        Ok(string_input(input, "toChars")?.map(to_chars).unwrap_or_default())
    });
    registry.define("replace", 2, Some(2), |input, args, _| {
        let Some(text) = string_input(input, "replace")? else {
            return Ok(Collection::empty());
        };
        let (Some(pattern), Some(substitution)) =
            (string_arg(args, 0, "replace")?, string_arg(args, 1, "replace")?)
        else {
            return Ok(Collection::empty());
        };
        Ok(Collection::single(text.replace(pattern, substitution)))
    });
    registry.define("matches", 1, Some(1), |input, args, ctx| {
        with_string_arg(input, args, "matches", |text, pattern| matches(text, pattern, ctx))
    });
    registry.define("replaceMatches", 2, Some(2), |input, args, ctx| {
        let Some(text) = string_input(input, "replaceMatches")? else {
            return Ok(Collection::empty());
        };
        let (Some(pattern), Some(replacement)) = (
            string_arg(args, 0, "replaceMatches")?,
            string_arg(args, 1, "replaceMatches")?,
        ) else {
            return Ok(Collection::empty());
        };
        replace_matches(text, pattern, replacement, ctx)
    });
    registry.define("split", 1, Some(1), |input, args, ctx| {
        with_string_arg(input, args, "split", |text, separator| {
            let mut parts = split(text, separator);
            ctx.enforce_collection_size(&mut parts)?;
            Ok(parts)
        })
    });
    registry.define("join", 0, Some(1), |input, args, _| {
        let separator = string_arg(args, 0, "join")?.unwrap_or("");
        Ok(Collection::single(join(input, separator)?))
    });
    registry.define("encode", 1, Some(1), |input, args, _| {
        with_string_arg(input, args, "encode", |text, format| {
            Ok(Collection::single(encode(text, format)?))
        })
    });
    registry.define("decode", 1, Some(1), |input, args, _| {
        with_string_arg(input, args, "decode", |text, format| {
            Ok(decode(text, format)?.map(Value::String).into())
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegexCacheConfig;
    use crate::regex_cache::RegexCache;
    use kestrel_fhirpath_support::ErrorKind;
    use std::sync::Arc;

    fn call(name: &str, input: &str, args: &[&str]) -> Result<Collection, EvaluationError> {
        let registry = FunctionRegistry::with_builtins();
        let ctx = EvaluationContext::new(Collection::empty());
        let args: Vec<Collection> = args.iter().map(|a| Collection::single(*a)).collect();
        registry.get(name).unwrap().call(&Collection::single(input), &args, &ctx)
    }

    fn text(collection: Collection) -> String {
        collection.first().and_then(Value::as_str).unwrap().to_string()
    }

    #[test]
    fn index_of_counts_characters() {
        assert_eq!(index_of("abcdefg", "bc"), 1);
        assert_eq!(index_of("abcdefg", "x"), -1);
        assert_eq!(index_of("abcdefg", ""), 0);
        assert_eq!(index_of("héllo", "llo"), 2);
    }

    #[test]
    fn substring_bounds() {
        assert_eq!(substring("abcdefg", 3, None).as_deref(), Some("defg"));
        assert_eq!(substring("abcdefg", 1, Some(2)).as_deref(), Some("bc"));
        assert_eq!(substring("abcdefg", 6, Some(2)).as_deref(), Some("g"));
        assert_eq!(substring("abcdefg", 7, Some(1)), None);
        assert_eq!(substring("abcdefg", -1, Some(1)), None);
    }

    #[test]
    fn case_and_trim() {
        assert_eq!(text(call("upper", "abc", &[]).unwrap()), "ABC");
        assert_eq!(text(call("lower", "ABC", &[]).unwrap()), "abc");
        assert_eq!(text(call("trim", "  x  ", &[]).unwrap()), "x");
        assert_eq!(call("length", "héllo", &[]).unwrap(), Collection::single(5));
    }

    #[test]
    fn replace_is_literal() {
        assert_eq!(text(call("replace", "a.b.c", &[".", "-"]).unwrap()), "a-b-c");
        assert_eq!(text(call("replace", "abc", &["", "x"]).unwrap()), "xaxbxcx");
    }

    #[test]
    fn regex_functions() {
        assert_eq!(call("matches", "abc123", &["\\d+"]).unwrap(), Collection::boolean(true));
        assert_eq!(call("matches", "abc", &["^\\d+$"]).unwrap(), Collection::boolean(false));
        assert_eq!(
            text(call("replaceMatches", "2024-06-15", &["(\\d+)-(\\d+)-(\\d+)", "$3/$2/$1"]).unwrap()),
            "15/06/2024"
        );
    }

    #[test]
    fn unsafe_patterns_are_rejected() {
        let err = call("matches", "aaaa", &["(((((((a)))))))"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExpression);
        let err = call("matches", "aaaa", &["a***"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExpression);
    }

    #[test]
    fn regex_uses_context_cache() {
        let cache = Arc::new(RegexCache::new(RegexCacheConfig::default()));
        let ctx = EvaluationContext::builder(Collection::empty())
            .regex_cache(cache.clone())
            .build();
        matches("abc", "b", &ctx).unwrap();
        assert!(cache.contains("b"));
    }

    #[test]
    fn split_and_join() {
        let parts = call("split", "a,b,,c", &[","]).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(join(&parts, "|").unwrap(), "a|b||c");
        assert_eq!(join(&Collection::empty(), ",").unwrap(), "");
        assert_eq!(
            join(&Collection::single(1), ",").unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn encodings_round_trip() {
        for format in ["base64", "urlbase64", "hex"] {
            let encoded = encode("subject?", format).unwrap();
            assert_eq!(decode(&encoded, format).unwrap().as_deref(), Some("subject?"));
        }
        assert_eq!(encode("hi", "hex").unwrap(), "6869");
        assert_eq!(decode("zz", "hex").unwrap(), None);
        assert!(encode("hi", "rot13").is_err());
    }

    #[test]
    fn non_string_input_is_a_type_error() {
        let registry = FunctionRegistry::with_builtins();
        let ctx = EvaluationContext::new(Collection::empty());
        let err = registry
            .get("upper")
            .unwrap()
            .call(&Collection::single(5), &[], &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }
}
