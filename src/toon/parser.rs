//! Document parser: metadata block, array header, data rows.
//!
//! The model is not bound by its instructions, so only two things fail a whole
//! document: never reaching the array header, or a header without a field list.
//! Everything else (bad rows, bad tokens, unknown kinds) is skipped or defaulted and
//! reported as a [`ParseWarning`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::domain::{ExerciseKind, ExerciseRecord, GenerationResponse};
use crate::ids::IdGenerator;

use super::codec::{decode_kind, decode_nullable, decode_options, decode_pairs, decode_text, split_row, unquote};
use super::{ToonError, ToonGrammar, CODE_FENCE};

const DEFAULT_DIFFICULTY: &str = "intermediate";
const DEFAULT_LANGUAGE: &str = "english";

/// Something the parser skipped or guessed. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
  /// Row dropped: its segment count differs from the header's field count.
  FieldCountMismatch { line: usize, expected: usize, found: usize },
  /// Kind token not recognized; the row was kept as a translation.
  UnknownKind { line: usize, token: String },
  /// Options value without `[...]`; the row was kept without options.
  DroppedOptions { line: usize, value: String },
  /// Pair tokens without exactly one `|`; the rest of the pairs were kept.
  DroppedPairs { line: usize, tokens: Vec<String> },
  /// The header's `[count]` is missing, unreadable, or differs from the rows parsed.
  DeclaredCount { declared: Option<usize>, parsed: usize },
}

/// Parsed response plus everything that did not go cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseReport {
  pub response: GenerationResponse,
  pub warnings: Vec<ParseWarning>,
}

impl ParseReport {
  pub fn skipped_rows(&self) -> usize {
    self
      .warnings
      .iter()
      .filter(|w| matches!(w, ParseWarning::FieldCountMismatch { .. }))
      .count()
  }
}

#[derive(Debug)]
struct ArrayHeader {
  declared: Option<usize>,
  fields: Vec<String>,
}

enum Section {
  Metadata,
  Array(ArrayHeader),
}

/// Parse a document into a response. Zero valid rows is still a success.
pub fn parse(text: &str, grammar: &ToonGrammar, ids: &dyn IdGenerator) -> Result<GenerationResponse, ToonError> {
  parse_document(text, grammar, ids).map(|report| report.response)
}

pub fn parse_document(text: &str, grammar: &ToonGrammar, ids: &dyn IdGenerator) -> Result<ParseReport, ToonError> {
  let prefix = grammar.header_prefix();
  let mut metadata: HashMap<String, String> = HashMap::new();
  let mut section = Section::Metadata;
  let mut games = Vec::new();
  let mut warnings = Vec::new();
  let mut seen_ids = HashSet::new();

  for (idx, raw_line) in text.lines().enumerate() {
    let line_no = idx + 1;
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with(CODE_FENCE) {
      continue;
    }

    if let Section::Array(header) = &section {
      if let Some(mut record) = parse_row(line, line_no, &header.fields, &mut warnings) {
        record.id = unique_id(ids, &mut seen_ids, games.len());
        games.push(record);
      }
      continue;
    }

    if line.starts_with(prefix.as_str()) {
      let header = parse_header(line, &prefix)?;
      debug!(target: "toon", line = line_no, fields = ?header.fields, declared = ?header.declared, "Array header");
      section = Section::Array(header);
    } else if let Some((key, value)) = line.split_once(':') {
      let key = key.trim().to_lowercase();
      if !key.is_empty() {
        metadata.insert(key, value.trim().to_string());
      }
    } else {
      debug!(target: "toon", line = line_no, "Ignoring text outside the document");
    }
  }

  let Section::Array(header) = section else {
    return Err(ToonError::MissingArrayHeader { section: grammar.section.clone() });
  };

  if header.declared != Some(games.len()) {
    warn!(target: "toon", declared = ?header.declared, parsed = games.len(), "Declared row count differs");
    warnings.push(ParseWarning::DeclaredCount { declared: header.declared, parsed: games.len() });
  }

  let mut take = |key: &str, default: &str| metadata.remove(key).unwrap_or_else(|| default.to_string());
  let response = GenerationResponse {
    topic: take("topic", ""),
    explanation: take("explanation", ""),
    difficulty: take("difficulty", DEFAULT_DIFFICULTY),
    language: take("language", DEFAULT_LANGUAGE),
    games,
  };

  debug!(target: "toon", rows = response.games.len(), warnings = warnings.len(), "Document parsed");
  Ok(ParseReport { response, warnings })
}

/// `games[3]{type,question,...}:` -> declared count and field names (lowercased).
fn parse_header(line: &str, prefix: &str) -> Result<ArrayHeader, ToonError> {
  let rest = &line[prefix.len()..];
  let declared = rest
    .split_once(']')
    .and_then(|(count, _)| count.trim().parse::<usize>().ok());

  let fields: Vec<String> = rest
    .split_once('{')
    .and_then(|(_, tail)| tail.split_once('}'))
    .map(|(list, _)| {
      list
        .split(',')
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
    })
    .unwrap_or_default();

  if fields.is_empty() {
    return Err(ToonError::MalformedHeader { line: line.to_string() });
  }
  Ok(ArrayHeader { declared, fields })
}

fn parse_row(line: &str, line_no: usize, fields: &[String], warnings: &mut Vec<ParseWarning>) -> Option<ExerciseRecord> {
  let values = split_row(line);
  if values.len() != fields.len() {
    warn!(target: "toon", line = line_no, expected = fields.len(), found = values.len(), "Field count mismatch; row skipped");
    warnings.push(ParseWarning::FieldCountMismatch { line: line_no, expected: fields.len(), found: values.len() });
    return None;
  }

  let row: HashMap<&str, &str> = fields
    .iter()
    .map(String::as_str)
    .zip(values.iter().map(String::as_str))
    .collect();
  let field = |name: &str| row.get(name).copied();

  let kind_token = field("type").unwrap_or("");
  let kind = decode_kind(kind_token).unwrap_or_else(|| {
    warn!(target: "toon", line = line_no, token = %kind_token, "Unknown exercise kind; using translation");
    warnings.push(ParseWarning::UnknownKind { line: line_no, token: unquote(kind_token).to_string() });
    ExerciseKind::Translation
  });

  let options = field("options").map(decode_options);
  if let Some(dropped) = options.as_ref().and_then(|o| o.dropped.first()) {
    warn!(target: "toon", line = line_no, value = %dropped, "Options without brackets dropped");
    warnings.push(ParseWarning::DroppedOptions { line: line_no, value: dropped.clone() });
  }

  let pairs = field("pairs").map(decode_pairs);
  if let Some(p) = pairs.as_ref().filter(|p| !p.dropped.is_empty()) {
    warn!(target: "toon", line = line_no, dropped = p.dropped.len(), "Malformed pair tokens dropped");
    warnings.push(ParseWarning::DroppedPairs { line: line_no, tokens: p.dropped.clone() });
  }

  let mut record = ExerciseRecord {
    id: String::new(),
    kind,
    question: field("question").map(decode_text).unwrap_or_default(),
    answer: field("answer").and_then(decode_nullable),
    options: options.and_then(|o| o.value),
    pairs: pairs.and_then(|p| p.value),
    explanation: field("explanation").map(decode_text).unwrap_or_default(),
  };

  // Matching uses pairs only; every other kind uses answer/options only.
  if kind == ExerciseKind::Matching {
    record.answer = None;
    record.options = None;
  } else {
    record.pairs = None;
  }
  Some(record)
}

fn unique_id(ids: &dyn IdGenerator, seen: &mut HashSet<String>, index: usize) -> String {
  let id = ids.next_id();
  if seen.insert(id.clone()) {
    return id;
  }
  let mut suffix = index;
  loop {
    let candidate = format!("{id}_{suffix}");
    if seen.insert(candidate.clone()) {
      return candidate;
    }
    suffix += 1;
  }
}
