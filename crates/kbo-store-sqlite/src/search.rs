//! The free-text planner and the structured (`LIKE`) search.
//!
//! Free text arrives noisy — bank-statement fragments, card numbers, dates.
//! Phase A extracts candidate tokens (letter runs, plus 4-digit runs as
//! postal-code candidates), phase B synthesizes one OR-group MATCH
//! expression with prefix matching on words, phase C ranks with BM25 under
//! fixed column weights and hydrates the winners in rank order.
//!
//! The query-side normalization must stay in sync with the index tokenizer:
//! the application lowercases, the FTS5 `unicode61` tokenizer removes
//! diacritics on both sides of the match.

use kbo_core::company::Company;
use rusqlite::{Connection, params};

use crate::{Result, lookup};

/// Hard cap on tokens taken from one query.
pub const MAX_TOKENS: usize = 12;
/// Page-size clamp for both search paths.
pub const MAX_TAKE: i64 = 25;

/// BM25 column weights, in the frozen `company_fts` column order.
const BM25_WEIGHTS: &str = "5.0, 3.0, 1.0, 1.0, 4.0, 4.0, 2.5, 0.5, 0.5, 0.5, 0.5";

// ─── Phase A: tokenization ───────────────────────────────────────────────────

/// A token extracted from raw user text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub text:    String,
  /// A 4-digit postal-code candidate; matched exactly, not by prefix.
  pub numeric: bool,
}

/// Extract at most [`MAX_TOKENS`] tokens: lowercased letter runs of length
/// ≥ 2, and digit runs of exactly four (postal-code candidates). Everything
/// else — short words, dates, card-number fragments — is dropped. Order is
/// preserved; duplicates are removed.
pub fn tokenize(text: &str) -> Vec<Token> {
  let mut tokens: Vec<Token> = Vec::new();
  let mut chars = text.chars().peekable();

  while let Some(&c) = chars.peek() {
    if c.is_alphabetic() {
      let mut run = String::new();
      while let Some(&c) = chars.peek() {
        if !c.is_alphabetic() {
          break;
        }
        run.extend(c.to_lowercase());
        chars.next();
      }
      if run.chars().count() >= 2 {
        push_unique(&mut tokens, Token { text: run, numeric: false });
      }
    } else if c.is_ascii_digit() {
      let mut run = String::new();
      while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
          break;
        }
        run.push(c);
        chars.next();
      }
      if run.len() == 4 {
        push_unique(&mut tokens, Token { text: run, numeric: true });
      }
    } else {
      chars.next();
    }

    if tokens.len() == MAX_TOKENS {
      break;
    }
  }

  tokens
}

fn push_unique(tokens: &mut Vec<Token>, token: Token) {
  if !tokens.iter().any(|t| t.text == token.text) {
    tokens.push(token);
  }
}

// ─── Phase B: MATCH synthesis ────────────────────────────────────────────────

/// One OR-group over all tokens: `("t1"* OR "t2"* OR "1234")`. Words match
/// by prefix, postal candidates exactly. `None` when nothing survived
/// tokenization — the search then returns no results.
pub fn match_expression(tokens: &[Token]) -> Option<String> {
  if tokens.is_empty() {
    return None;
  }
  let parts: Vec<String> = tokens
    .iter()
    .map(|t| {
      if t.numeric {
        format!("\"{}\"", t.text)
      } else {
        format!("\"{}\"*", t.text)
      }
    })
    .collect();
  Some(format!("({})", parts.join(" OR ")))
}

// ─── Phase C: ranking ────────────────────────────────────────────────────────

/// Ranked free-text search; results hydrate through the lookup planner in
/// rank order.
pub fn search_fulltext(
  conn: &Connection,
  text: &str,
  language: Option<&str>,
  skip: i64,
  take: i64,
) -> Result<Vec<Company>> {
  let take = take.clamp(0, MAX_TAKE);
  let skip = skip.max(0);

  let tokens = tokenize(text);
  let Some(expression) = match_expression(&tokens) else {
    return Ok(Vec::new());
  };

  let mut stmt = conn.prepare(
    &format!(
      "SELECT m.enterprise_number
       FROM company_fts
       JOIN company_fts_map m ON m.rowid = company_fts.rowid
       WHERE company_fts MATCH ?1
       ORDER BY bm25(company_fts, {BM25_WEIGHTS}), m.enterprise_number
       LIMIT ?2 OFFSET ?3"
    ),
  )?;
  let numbers: Vec<i64> = stmt
    .query_map(params![expression, take, skip], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut companies = Vec::with_capacity(numbers.len());
  for number in numbers {
    if let Some(company) = lookup::get_company_by_value(conn, number, language)? {
      companies.push(company);
    }
  }
  Ok(companies)
}

// ─── Structured search ───────────────────────────────────────────────────────

/// Optional criteria, combined conjunctively.
#[derive(Debug, Clone, Default)]
pub struct StructuredCriteria {
  pub name:         Option<String>,
  pub street:       Option<String>,
  pub house_number: Option<String>,
  pub postal_code:  Option<String>,
  pub city:         Option<String>,
}

impl StructuredCriteria {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.street.is_none()
      && self.house_number.is_none()
      && self.postal_code.is_none()
      && self.city.is_none()
  }
}

/// `LIKE` search over denominations and the location projection — the simple
/// path. Criteria compose as conjunctive `EXISTS` fragments over upper-cased
/// values.
pub fn search_structured(
  conn: &Connection,
  criteria: &StructuredCriteria,
  language: Option<&str>,
  skip: i64,
  take: i64,
) -> Result<Vec<Company>> {
  let take = take.clamp(0, MAX_TAKE);
  let skip = skip.max(0);
  if criteria.is_empty() {
    return Ok(Vec::new());
  }

  let mut conditions: Vec<String> = Vec::new();
  let mut values: Vec<String> = Vec::new();
  let mut bind = |value: &str| -> String {
    values.push(format!("%{}%", value.to_uppercase()));
    format!("?{}", values.len())
  };

  if let Some(name) = criteria.name.as_deref() {
    let p = bind(name);
    conditions.push(format!(
      "EXISTS (SELECT 1 FROM denomination d
               JOIN entity_owner o ON o.entity_number = d.entity_number
               WHERE o.enterprise_number = e.enterprise_number
                 AND UPPER(d.value) LIKE {p})"
    ));
  }

  let mut location_predicates: Vec<String> = Vec::new();
  if let Some(street) = criteria.street.as_deref() {
    let p = bind(street);
    location_predicates.push(format!(
      "(UPPER(l.street_nl) LIKE {p} OR UPPER(l.street_fr) LIKE {p})"
    ));
  }
  if let Some(house_number) = criteria.house_number.as_deref() {
    let p = bind(house_number);
    location_predicates.push(format!("UPPER(l.house_number) LIKE {p}"));
  }
  if let Some(postal_code) = criteria.postal_code.as_deref() {
    let p = bind(postal_code);
    location_predicates.push(format!("UPPER(l.zipcode) LIKE {p}"));
  }
  if let Some(city) = criteria.city.as_deref() {
    let p = bind(city);
    location_predicates.push(format!(
      "(UPPER(l.municipality_nl) LIKE {p} OR UPPER(l.municipality_fr) LIKE {p})"
    ));
  }
  if !location_predicates.is_empty() {
    conditions.push(format!(
      "EXISTS (SELECT 1 FROM company_location l
               WHERE l.enterprise_number = e.enterprise_number
                 AND {})",
      location_predicates.join(" AND ")
    ));
  }

  let sql = format!(
    "SELECT e.enterprise_number FROM enterprise e
     WHERE {}
     ORDER BY e.enterprise_number
     LIMIT {take} OFFSET {skip}",
    conditions.join(" AND ")
  );

  let mut stmt = conn.prepare(&sql)?;
  let numbers: Vec<i64> = stmt
    .query_map(rusqlite::params_from_iter(values.iter()), |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut companies = Vec::with_capacity(numbers.len());
  for number in numbers {
    if let Some(company) = lookup::get_company_by_value(conn, number, language)? {
      companies.push(company);
    }
  }
  Ok(companies)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_words_and_postal_codes() {
    let tokens = tokenize("albert heijn 3500 hasselt");
    let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["albert", "heijn", "3500", "hasselt"]);
    assert!(tokens[2].numeric);
  }

  #[test]
  fn drops_short_words_and_non_postal_digits() {
    let tokens = tokenize("Betaling 29/03/25 ALBERT a 12 123456");
    let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["betaling", "albert"]);
  }

  #[test]
  fn deduplicates_preserving_order() {
    let tokens = tokenize("Hasselt hasselt HASSELT 3500 3500");
    let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["hasselt", "3500"]);
  }

  #[test]
  fn caps_at_twelve_tokens() {
    let long = (b'a'..=b'z')
      .map(|c| format!("word{}", c as char))
      .collect::<Vec<_>>()
      .join(" ");
    let tokens = tokenize(&long);
    assert_eq!(tokens.len(), MAX_TOKENS);
  }

  #[test]
  fn lowercases_and_keeps_diacritics() {
    // Diacritics are the index tokenizer's job; the planner must not strip
    // them itself.
    let tokens = tokenize("Liège");
    assert_eq!(tokens[0].text, "liège");
  }

  #[test]
  fn match_expression_shapes() {
    assert_eq!(match_expression(&[]), None);
    let tokens = tokenize("albert 3500");
    assert_eq!(
      match_expression(&tokens).unwrap(),
      "(\"albert\"* OR \"3500\")"
    );
  }
}
