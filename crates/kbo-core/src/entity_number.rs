//! Classification of the polymorphic `entity_number` key.
//!
//! Fact rows (addresses, denominations, contacts, activities) reference their
//! owner through an opaque `entity_number` that can denote an enterprise, an
//! establishment, or a branch. The registry's convention: an enterprise
//! number is rendered with exactly two dots (`0403.199.702`); establishment
//! numbers carry three (`2.123.456.789`) and branch identifiers none.

/// What an `entity_number` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
  /// The entity is the enterprise itself.
  Enterprise,
  /// The entity is an establishment or a branch; resolve through the
  /// corresponding table to find the owning enterprise.
  Child,
}

/// Classify an `entity_number` by the two-dots rule.
pub fn classify(entity_number: &str) -> EntityClass {
  if entity_number.chars().filter(|c| *c == '.').count() == 2 {
    EntityClass::Enterprise
  } else {
    EntityClass::Child
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn two_dots_is_enterprise() {
    assert_eq!(classify("0403.199.702"), EntityClass::Enterprise);
  }

  #[test]
  fn establishment_shape_is_child() {
    assert_eq!(classify("2.123.456.789"), EntityClass::Child);
  }

  #[test]
  fn dotless_branch_id_is_child() {
    assert_eq!(classify("9000123456"), EntityClass::Child);
  }
}
