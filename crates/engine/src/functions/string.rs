use metapath_types::{AtomicItem, Decimal};
use regex::Regex;

use super::{FunctionLibrary, argument_or_context, optional_string, rounded_number};
use crate::context::{DynamicContext, FUNCTIONS_NS};
use crate::error::MetapathError;
use crate::types::{Item, Sequence};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(FUNCTIONS_NS, "string", 0, Some(1), fn_string);
    library.add(FUNCTIONS_NS, "concat", 2, None, fn_concat);
    library.add(FUNCTIONS_NS, "string-join", 1, Some(2), fn_string_join);
    library.add(FUNCTIONS_NS, "string-length", 0, Some(1), fn_string_length);
    library.add(FUNCTIONS_NS, "normalize-space", 0, Some(1), fn_normalize_space);
    library.add(FUNCTIONS_NS, "upper-case", 1, Some(1), fn_upper_case);
    library.add(FUNCTIONS_NS, "lower-case", 1, Some(1), fn_lower_case);
    library.add(FUNCTIONS_NS, "contains", 2, Some(2), fn_contains);
    library.add(FUNCTIONS_NS, "starts-with", 2, Some(2), fn_starts_with);
    library.add(FUNCTIONS_NS, "ends-with", 2, Some(2), fn_ends_with);
    library.add(FUNCTIONS_NS, "substring", 2, Some(3), fn_substring);
    library.add(FUNCTIONS_NS, "substring-before", 2, Some(2), fn_substring_before);
    library.add(FUNCTIONS_NS, "substring-after", 2, Some(2), fn_substring_after);
    library.add(FUNCTIONS_NS, "matches", 2, Some(3), fn_matches);
    library.add(FUNCTIONS_NS, "replace", 3, Some(4), fn_replace);
    library.add(FUNCTIONS_NS, "tokenize", 1, Some(3), fn_tokenize);
}

/// The string value of the argument (or context item); empty for `()`.
fn string_or_context<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
    function: &str,
) -> Result<String, MetapathError> {
    let value = argument_or_context(ctx, args)?;
    match value.zero_or_one(function)? {
        Some(item) => item.string_value(),
        None => Ok(String::new()),
    }
}

fn fn_string<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    string_or_context(ctx, args, "string").map(Sequence::string)
}

fn fn_concat<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let mut result = String::new();
    for arg in &args {
        result.push_str(&optional_string(arg, "concat")?);
    }
    Ok(Sequence::string(result))
}

fn fn_string_join<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let separator = match args.get(1) {
        Some(separator) => optional_string(separator, "string-join")?,
        None => String::new(),
    };
    let parts: Vec<String> = args[0].atomize()?.iter().map(AtomicItem::as_string).collect();
    Ok(Sequence::string(parts.join(&separator)))
}

fn fn_string_length<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = string_or_context(ctx, args, "string-length")?;
    Ok(Sequence::integer(text.chars().count() as i64))
}

fn fn_normalize_space<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = string_or_context(ctx, args, "normalize-space")?;
    Ok(Sequence::string(text.split_whitespace().collect::<Vec<_>>().join(" ")))
}

fn fn_upper_case<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::string(optional_string(&args[0], "upper-case")?.to_uppercase()))
}

fn fn_lower_case<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::string(optional_string(&args[0], "lower-case")?.to_lowercase()))
}

/// Applies `test` to the two string arguments of `function`.
fn string_predicate<'t>(
    args: &[Sequence<'t>],
    function: &str,
    test: fn(&str, &str) -> bool,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], function)?;
    let pattern = optional_string(&args[1], function)?;
    Ok(Sequence::boolean(test(&text, &pattern)))
}

fn fn_contains<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    string_predicate(&args, "contains", |text, pattern| text.contains(pattern))
}

fn fn_starts_with<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    string_predicate(&args, "starts-with", |text, pattern| text.starts_with(pattern))
}

fn fn_ends_with<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    string_predicate(&args, "ends-with", |text, pattern| text.ends_with(pattern))
}

/// Characters at 1-based positions `p` with `start <= p < start + length`,
/// after rounding both bounds.
fn fn_substring<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], "substring")?;
    let start = rounded_number(&args[1], "substring")?;
    let end = match args.get(2) {
        Some(length) => Some(start.saturating_add(rounded_number(length, "substring")?)),
        None => None,
    };
    let result: String = text
        .chars()
        .enumerate()
        .filter(|(index, _)| {
            let position = Decimal::from(index + 1);
            position >= start && end.is_none_or(|end| position < end)
        })
        .map(|(_, c)| c)
        .collect();
    Ok(Sequence::string(result))
}

fn fn_substring_before<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], "substring-before")?;
    let pattern = optional_string(&args[1], "substring-before")?;
    let result = text.find(&pattern).map(|i| &text[..i]).unwrap_or("");
    Ok(Sequence::string(result))
}

fn fn_substring_after<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], "substring-after")?;
    let pattern = optional_string(&args[1], "substring-after")?;
    let result = text.find(&pattern).map(|i| &text[i + pattern.len()..]).unwrap_or("");
    Ok(Sequence::string(result))
}

/// Compiles an XPath regular expression with its flag string (`i`, `m`,
/// `s`, `x`, `q`).
fn build_regex(function: &str, pattern: &str, flags: &str) -> Result<Regex, MetapathError> {
    let mut source = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => {
                source.push_str("(?");
                source.push(flag);
                source.push(')');
            }
            'q' => {}
            other => {
                return Err(MetapathError::function(
                    function,
                    format!("invalid regular expression flag '{}'", other),
                ));
            }
        }
    }
    if flags.contains('q') {
        source.push_str(&regex::escape(pattern));
    } else {
        source.push_str(pattern);
    }
    Regex::new(&source).map_err(|err| {
        MetapathError::function(function, format!("invalid regular expression: {}", err))
    })
}

fn regex_args(args: &[Sequence<'_>], function: &str, flags_at: usize) -> Result<Regex, MetapathError> {
    let pattern = optional_string(&args[1], function)?;
    let flags = match args.get(flags_at) {
        Some(flags) => optional_string(flags, function)?,
        None => String::new(),
    };
    build_regex(function, &pattern, &flags)
}

fn fn_matches<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], "matches")?;
    let regex = regex_args(&args, "matches", 2)?;
    Ok(Sequence::boolean(regex.is_match(&text)))
}

fn fn_replace<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], "replace")?;
    let regex = regex_args(&args, "replace", 3)?;
    if regex.is_match("") {
        return Err(MetapathError::function(
            "replace",
            "pattern matches a zero-length string",
        ));
    }
    let replacement = optional_string(&args[2], "replace")?;
    Ok(Sequence::string(regex.replace_all(&text, replacement.as_str()).into_owned()))
}

fn fn_tokenize<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let text = optional_string(&args[0], "tokenize")?;
    if args.len() == 1 {
        return Ok(text
            .split_whitespace()
            .map(|token| Item::Atomic(AtomicItem::string(token)))
            .collect());
    }
    if text.is_empty() {
        return Ok(Sequence::empty());
    }
    let regex = regex_args(&args, "tokenize", 2)?;
    if regex.is_match("") {
        return Err(MetapathError::function(
            "tokenize",
            "pattern matches a zero-length string",
        ));
    }
    Ok(regex
        .split(&text)
        .map(|token| Item::Atomic(AtomicItem::string(token)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval_str, value};
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("string(12)", "12")]
    #[case("string(())", "")]
    #[case("concat('a', 1, (), 'b')", "a1b")]
    #[case("string-join(('a', 'b', 'c'), '-')", "a-b-c")]
    #[case("string-join((1, 2))", "12")]
    #[case("normalize-space('  a \t b  ')", "a b")]
    #[case("upper-case('abc')", "ABC")]
    #[case("lower-case('ÀB')", "àb")]
    #[case("substring('motor car', 6)", " car")]
    #[case("substring('metadata', 4, 3)", "ada")]
    #[case("substring('12345', 1.5, 2.6)", "234")]
    #[case("substring('12345', 0, 3)", "12")]
    #[case("substring('12345', -3, 5)", "1")]
    #[case("substring-before('tattoo', 'attoo')", "t")]
    #[case("substring-before('tattoo', 'x')", "")]
    #[case("substring-after('tattoo', 'tat')", "too")]
    #[case("replace('abracadabra', 'bra', '*')", "a*cada*")]
    #[case("replace('abracadabra', 'a(.)', 'a$1$1')", "abbraccaddabbra")]
    #[case("replace('AAA', 'a', 'b', 'i')", "bbb")]
    fn test_string_results(#[case] expr: &str, #[case] expected: &str) {
        assert_eq!(value(expr), Sequence::string(expected), "{}", expr);
    }

    #[rstest]
    #[case("contains('tattoo', 'tat')", true)]
    #[case("contains('tattoo', '')", true)]
    #[case("starts-with('tattoo', 'tat')", true)]
    #[case("ends-with('tattoo', 'tat')", false)]
    #[case("matches('abracadabra', '^a.*a$')", true)]
    #[case("matches('abracadabra', '^bra')", false)]
    #[case("matches('Hello', 'hello', 'i')", true)]
    #[case("matches('a.b', '.', 'q')", true)]
    fn test_string_predicates(#[case] expr: &str, #[case] expected: bool) {
        assert_eq!(value(expr), Sequence::boolean(expected), "{}", expr);
    }

    #[test]
    fn test_string_length_counts_characters() {
        assert_eq!(value("string-length('héllo')"), Sequence::integer(5));
        assert_eq!(value("string-length(())"), Sequence::integer(0));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(value("tokenize(' a  b ')"), value("('a', 'b')"));
        assert_eq!(value("tokenize('a,b,,c', ',')"), value("('a', 'b', '', 'c')"));
        assert!(value("tokenize('', ',')").is_empty());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(eval_str("matches('a', '(')"), Err(MetapathError::Function { .. })));
        assert!(matches!(eval_str("replace('a', '.*', 'x')"), Err(MetapathError::Function { .. })));
        assert!(matches!(eval_str("matches('a', 'a', 'z')"), Err(MetapathError::Function { .. })));
    }

    #[test]
    fn test_string_of_map_is_type_error() {
        assert!(matches!(eval_str("string(map {})"), Err(MetapathError::TypeError(_))));
    }
}
