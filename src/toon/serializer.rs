//! Response -> TOON text, for caching and tests.
//!
//! The row layout is the five-field one (`type,question,answer,options,explanation`),
//! so matching pairs do not survive a serialize/parse round trip.

use std::fmt::Write as _;

use crate::domain::GenerationResponse;

use super::codec::{encode_nullable, encode_options, quote};
use super::{ToonGrammar, SERIALIZED_FIELDS};

pub fn serialize(response: &GenerationResponse, grammar: &ToonGrammar) -> String {
  let mut out = String::new();

  // writeln! into a String cannot fail
  let _ = writeln!(out, "topic: {}", response.topic);
  let _ = writeln!(out, "explanation: {}", response.explanation);
  let _ = writeln!(out, "difficulty: {}", response.difficulty);
  let _ = writeln!(out, "language: {}", response.language);
  out.push('\n');

  let _ = writeln!(out, "{}", grammar.header_line(response.games.len(), &SERIALIZED_FIELDS));
  for game in &response.games {
    let _ = writeln!(
      out,
      " {},{},{},{},{}",
      game.kind.token(),
      quote(&game.question),
      encode_nullable(game.answer.as_deref()),
      encode_options(game.options.as_deref()),
      quote(&game.explanation),
    );
  }
  out
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::domain::{ExerciseKind, ExerciseRecord};
  use crate::ids::SequentialIds;
  use crate::toon::parse;

  fn record(kind: ExerciseKind, question: &str, answer: Option<&str>, options: Option<&[&str]>) -> ExerciseRecord {
    ExerciseRecord {
      id: format!("orig_{question}"),
      kind,
      question: question.into(),
      answer: answer.map(String::from),
      options: options.map(|o| o.iter().map(|s| s.to_string()).collect()),
      pairs: None,
      explanation: format!("about {question}"),
    }
  }

  fn response(games: Vec<ExerciseRecord>) -> GenerationResponse {
    GenerationResponse {
      topic: "Past Tense".into(),
      explanation: "Practice past tense verbs.".into(),
      difficulty: "beginner".into(),
      language: "english".into(),
      games,
    }
  }

  #[test]
  fn writes_metadata_header_and_rows() {
    let r = response(vec![
      record(ExerciseKind::Translation, "I walked", Some("Eu caminhei"), None),
      record(ExerciseKind::FillBlanks, "She ___ yesterday", Some("went"), Some(&["went", "goes", "go"])),
    ]);
    let text = serialize(&r, &ToonGrammar::default());
    let expected = "topic: Past Tense
explanation: Practice past tense verbs.
difficulty: beginner
language: english

games[2]{type,question,answer,options,explanation}:
 translation,\"I walked\",\"Eu caminhei\",null,\"about I walked\"
 fill_blanks,\"She ___ yesterday\",\"went\",\"[went,goes,go]\",\"about She ___ yesterday\"
";
    assert_eq!(text, expected);
  }

  #[test]
  fn round_trip_keeps_non_matching_fields() {
    let original = response(vec![
      record(ExerciseKind::Translation, "Good night, friend", Some("Boa noite, amigo"), None),
      record(ExerciseKind::FillBlanks, "They ___ home", Some("went"), Some(&["went", "go"])),
      record(ExerciseKind::Translation, "Empty answer", Some(""), None),
      record(ExerciseKind::TrueFalse, "The sky is green", None, Some(&["true", "false"])),
    ]);
    let grammar = ToonGrammar::default();
    let parsed = parse(&serialize(&original, &grammar), &grammar, &SequentialIds::default()).expect("parse");

    assert_eq!(parsed.topic, original.topic);
    assert_eq!(parsed.explanation, original.explanation);
    assert_eq!(parsed.difficulty, original.difficulty);
    assert_eq!(parsed.language, original.language);
    assert_eq!(parsed.games.len(), original.games.len());
    for (got, want) in parsed.games.iter().zip(&original.games) {
      assert_eq!(got.kind, want.kind);
      assert_eq!(got.question, want.question);
      assert_eq!(got.answer, want.answer);
      assert_eq!(got.options, want.options);
      assert_eq!(got.explanation, want.explanation);
    }
  }

  #[test]
  fn round_trip_loses_matching_pairs() {
    let mut pairs = BTreeMap::new();
    pairs.insert("run".to_string(), "ran".to_string());
    pairs.insert("eat".to_string(), "ate".to_string());
    let mut matching = record(ExerciseKind::Matching, "Match the verbs", None, None);
    matching.pairs = Some(pairs);

    let grammar = ToonGrammar::default();
    let text = serialize(&response(vec![matching]), &grammar);
    assert!(!text.contains("run|ran"));

    let parsed = parse(&text, &grammar, &SequentialIds::default()).expect("parse");
    assert_eq!(parsed.games[0].kind, ExerciseKind::Matching);
    assert_eq!(parsed.games[0].question, "Match the verbs");
    assert_eq!(parsed.games[0].pairs, None);
  }
}
