//! Canonical-form regression over the expression corpus
//!
//! Every expression in `tests/data/expressions.txt` must parse, and its
//! serialized form must be a fixed point: parsing the canonical form and
//! serializing again yields the identical string. This is the primary
//! safety net for the serializer's parenthesization rules; grow the
//! corpus whenever a rule expression shows up that the library mishandled.

use twinscript::expr::parse;

fn corpus() -> impl Iterator<Item = String> {
    include_str!("data/expressions.txt")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

#[test]
fn corpus_is_not_empty() {
    assert!(corpus().count() > 50);
}

#[test]
fn every_corpus_expression_parses() {
    for source in corpus() {
        if let Err(error) = parse(&source) {
            panic!("parser failed for {:?}: {}", source, error);
        }
    }
}

#[test]
fn canonical_form_is_idempotent() {
    for source in corpus() {
        let once = parse(&source)
            .unwrap_or_else(|e| panic!("parser failed for {:?}: {}", source, e))
            .serialize();
        let twice = parse(&once)
            .unwrap_or_else(|e| panic!("reparse failed for {:?} (from {:?}): {}", once, source, e))
            .serialize();
        assert_eq!(
            once, twice,
            "canonical form of {:?} is not a fixed point",
            source
        );
    }
}

#[test]
fn canonical_form_preserves_meaning_markers() {
    // Spot checks that canonicalization keeps the structure-relevant text
    let cases = [
        ("1 + 2 - 3 * 4 / 5 ^ 6", "(1 + 2) - (3 * 4) / 5^6"),
        ("(A & B) OR !C", "(A & B) | !C"),
        ("5°C", "5[degC]"),
        ("[foo bar]", "[foo bar]"),
        ("this.supplyFan.motorPower", "(this.supplyFan).motorPower"),
    ];
    for (source, expected) in cases {
        assert_eq!(parse(source).unwrap().serialize(), expected);
    }
}
