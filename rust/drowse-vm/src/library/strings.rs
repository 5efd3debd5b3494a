use super::{arg, array_arg, Library};
use drowse_core::{EngineError, Scalar};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;

static PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Compile `pattern`, reusing an earlier compilation.
pub(super) fn pattern(pattern: &str) -> Result<Regex, EngineError> {
    let mut cache = PATTERNS.lock();
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)
        .map_err(|err| EngineError::runtime(format!("invalid pattern '{}': {}", pattern, err)))?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Resolve a possibly negative character index against `len`.
fn char_index(index: i64, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs() as usize)
    } else {
        (index as usize).min(len)
    }
}

fn substr(text: &str, start: i64, end: Option<i64>) -> Result<String, EngineError> {
    let len = text.chars().count();
    let from = char_index(start, len);
    let to = end.map(|e| char_index(e, len)).unwrap_or(len);
    if from > to {
        return Err(EngineError::BadIndex(format!(
            "substr: start {} is past end {} of \"{}\"",
            start,
            to,
            text
        )));
    }
    Ok(text.chars().skip(from).take(to - from).collect())
}

pub(super) fn install(lib: &mut Library<'_>) {
    lib.define("&join", |_, args| {
        let separator = arg(&args, 0).as_string();
        let items = array_arg(&args, 1, "&join")?.snapshot()?;
        Ok(Scalar::string(
            items
                .iter()
                .map(Scalar::as_string)
                .collect::<Vec<_>>()
                .join(&separator),
        ))
    });

    // &split(pattern, text)
    lib.define("&split", |_, args| {
        let regex = pattern(&arg(&args, 0).as_string())?;
        let text = arg(&args, 1).as_string();
        Ok(Scalar::array_of(regex.split(&text).map(Scalar::string).collect()))
    });

    lib.define("&uc", |_, args| Ok(Scalar::string(arg(&args, 0).as_string().to_uppercase())));
    lib.define("&lc", |_, args| Ok(Scalar::string(arg(&args, 0).as_string().to_lowercase())));
    lib.define("&strlen", |_, args| {
        Ok(Scalar::int(arg(&args, 0).as_string().chars().count() as i64))
    });

    lib.define("&substr", |_, args| {
        let text = arg(&args, 0).as_string();
        let end = args.get(2).map(Scalar::as_int);
        substr(&text, arg(&args, 1).as_int(), end).map(Scalar::string)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substr_negative_indices() {
        assert_eq!(substr("drowsy", 1, Some(3)).unwrap(), "ro");
        assert_eq!(substr("drowsy", -3, None).unwrap(), "wsy");
        assert_eq!(substr("drowsy", 0, Some(-1)).unwrap(), "drows");
        assert!(substr("drowsy", 4, Some(2)).is_err());
    }

    #[test]
    fn test_pattern_cache_and_errors() {
        let first = pattern("a+").unwrap();
        let second = pattern("a+").unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert!(pattern("(").is_err());
    }
}
