//! TOON (Token-Oriented Object Notation): the compact text format the model uses to
//! send exercises back, at a fraction of the tokens JSON would cost.
//!
//! A document is line oriented. Blank lines are ignored anywhere.
//!
//! ```text
//! topic: Past Tense                                   <- metadata, "key: value"
//! explanation: Practice past tense verbs.
//! difficulty: beginner
//! language: english
//!
//! games[2]{type,question,answer,options,explanation}: <- array header
//!  translation,"I walked","Eu caminhei",null,"Walked is past tense of walk"
//!  fill_blanks,"She ___ yesterday",went,"[went,goes,go]","Use went for past tense of go"
//! ```
//!
//! - The metadata key is everything before the first `:`; key and value are trimmed.
//! - The header is `<section>[<count>]{<field>,...}:`. Everything after it is a data
//!   row; there is no terminator, so metadata cannot follow the array.
//! - Rows are split on commas outside double quotes. There is no escape for `"`.
//! - `null` marks an absent value; options are `[a,b,c]`; pairs are `left|right,...`.

pub mod codec;
pub mod parser;
pub mod serializer;

use thiserror::Error;

pub use parser::{parse, parse_document, ParseReport, ParseWarning};
pub use serializer::serialize;

pub const DEFAULT_SECTION: &str = "games";
pub const NULL_TOKEN: &str = "null";
pub const QUOTE: char = '"';
pub const FIELD_SEPARATOR: char = ',';
pub const PAIR_SEPARATOR: char = '|';
pub const CODE_FENCE: &str = "```";

/// Field list the serializer writes. It has no `pairs` column.
pub const SERIALIZED_FIELDS: [&str; 5] = ["type", "question", "answer", "options", "explanation"];

/// Field list the prompt asks the model for.
pub const PROMPT_FIELDS: [&str; 6] = ["type", "question", "answer", "options", "pairs", "explanation"];

/// Grammar knobs that are not fixed by the format itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToonGrammar {
  pub section: String,
}

impl Default for ToonGrammar {
  fn default() -> Self {
    Self { section: DEFAULT_SECTION.to_string() }
  }
}

impl ToonGrammar {
  pub fn new(section: impl Into<String>) -> Self {
    Self { section: section.into() }
  }

  /// Prefix that opens the array header, e.g. `games[`.
  pub fn header_prefix(&self) -> String {
    format!("{}[", self.section)
  }

  pub fn header_line(&self, count: usize, fields: &[&str]) -> String {
    format!("{}[{}]{{{}}}:", self.section, count, fields.join(","))
  }

  /// The fully worked document shown to the model (and served offline by the seed provider).
  pub fn example_document(&self) -> String {
    format!(
      "topic: Past Tense Verbs\n\
       explanation: The past tense is used to describe actions that have already happened.\n\
       difficulty: intermediate\n\
       language: english\n\
       \n\
       {header}\n \
       translation,\"I walked to school\",\"Eu caminhei para a escola\",null,null,\"'Walked' is the past tense of 'walk'\"\n \
       fill_blanks,\"She ___ to the party yesterday\",went,\"[went,goes,go,gone]\",null,\"Use 'went' for the past tense of 'go'\"\n \
       matching,\"Match each verb with its past form\",null,null,\"run|ran,eat|ate,go|went\",\"Irregular verbs change form in the past\"\n",
      header = self.header_line(3, &PROMPT_FIELDS),
    )
  }
}

/// Document-level failures. Row and token problems are warnings, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToonError {
  #[error("no `{section}[` array header found")]
  MissingArrayHeader { section: String },
  #[error("array header has no {{field,...}} list: {line}")]
  MalformedHeader { line: String },
}
