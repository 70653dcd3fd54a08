//! Row splitting and field value coding.
//!
//! Decoders are lenient: a value they cannot make sense of degrades to "absent" and
//! the offending text is handed back so the parser can report it.

use std::collections::BTreeMap;

use crate::domain::ExerciseKind;

use super::{FIELD_SEPARATOR, NULL_TOKEN, PAIR_SEPARATOR, QUOTE};

/// A decoded value plus the raw tokens that were dropped on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
  pub value: T,
  pub dropped: Vec<String>,
}

impl<T> Decoded<T> {
  fn clean(value: T) -> Self {
    Self { value, dropped: Vec::new() }
  }
}

/// Split a data row on commas outside double quotes and trim each segment.
///
/// Quote characters stay in the segments (see [`unquote`]). Always returns
/// `unquoted commas + 1` segments; checking that against the header is the caller's job.
pub fn split_row(row: &str) -> Vec<String> {
  let mut out = Vec::new();
  let mut current = String::new();
  let mut in_quotes = false;

  for ch in row.chars() {
    if ch == QUOTE {
      in_quotes = !in_quotes;
      current.push(ch);
    } else if ch == FIELD_SEPARATOR && !in_quotes {
      out.push(current.trim().to_string());
      current.clear();
    } else {
      current.push(ch);
    }
  }
  out.push(current.trim().to_string());
  out
}

/// Strip one pair of wrapping double quotes. Values not fully wrapped are only trimmed.
pub fn unquote(value: &str) -> &str {
  let v = value.trim();
  if v.len() >= 2 && v.starts_with(QUOTE) && v.ends_with(QUOTE) {
    &v[1..v.len() - 1]
  } else {
    v
  }
}

pub fn is_null(value: &str) -> bool {
  unquote(value) == NULL_TOKEN
}

/// Plain string field: unquoted, empty strings kept as they are.
pub fn decode_text(raw: &str) -> String {
  unquote(raw).to_string()
}

/// Nullable string field: `null` is absence, an empty string is still a value.
pub fn decode_nullable(raw: &str) -> Option<String> {
  if is_null(raw) { None } else { Some(decode_text(raw)) }
}

/// `[a,b,c]` -> `["a","b","c"]`. `null`, blank and bracket-free values are absent,
/// and so is a list with no non-empty items.
pub fn decode_options(raw: &str) -> Decoded<Option<Vec<String>>> {
  let v = unquote(raw);
  if v.is_empty() || v == NULL_TOKEN {
    return Decoded::clean(None);
  }
  let Some(inner) = v.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
    return Decoded { value: None, dropped: vec![v.to_string()] };
  };

  let items: Vec<String> = inner
    .split(FIELD_SEPARATOR)
    .map(|item| unquote(item).to_string())
    .filter(|item| !item.is_empty())
    .collect();

  Decoded::clean(if items.is_empty() { None } else { Some(items) })
}

/// `left|right,left|right` -> mapping. Tokens without exactly one `|`, or with an
/// empty left term, are dropped. An empty result is absent. Later duplicates win.
pub fn decode_pairs(raw: &str) -> Decoded<Option<BTreeMap<String, String>>> {
  let v = unquote(raw);
  if v.is_empty() || v == NULL_TOKEN {
    return Decoded::clean(None);
  }

  let mut pairs = BTreeMap::new();
  let mut dropped = Vec::new();
  for token in v.split(FIELD_SEPARATOR) {
    let token = token.trim();
    if token.is_empty() {
      continue;
    }
    let mut parts = token.split(PAIR_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
      (Some(left), Some(right), None) if !left.trim().is_empty() => {
        pairs.insert(left.trim().to_string(), right.trim().to_string());
      }
      _ => dropped.push(token.to_string()),
    }
  }

  Decoded { value: if pairs.is_empty() { None } else { Some(pairs) }, dropped }
}

/// Case-insensitive kind token lookup. `None` for anything unknown.
pub fn decode_kind(raw: &str) -> Option<ExerciseKind> {
  match unquote(raw).trim().to_lowercase().as_str() {
    "translation" => Some(ExerciseKind::Translation),
    "fill_blanks" | "fill_in_blanks" => Some(ExerciseKind::FillBlanks),
    "matching" => Some(ExerciseKind::Matching),
    "multiple_choice" => Some(ExerciseKind::MultipleChoice),
    "true_false" => Some(ExerciseKind::TrueFalse),
    _ => None,
  }
}

pub fn quote(s: &str) -> String {
  format!("{QUOTE}{s}{QUOTE}")
}

pub fn encode_nullable(value: Option<&str>) -> String {
  value.map(quote).unwrap_or_else(|| NULL_TOKEN.to_string())
}

/// Options are written quoted, `"[a,b]"`, so the row splitter keeps them in one field.
pub fn encode_options(options: Option<&[String]>) -> String {
  match options {
    Some(items) => quote(&format!("[{}]", items.join(","))),
    None => NULL_TOKEN.to_string(),
  }
}
