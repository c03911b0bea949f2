#![forbid(unsafe_code)]

//! Style assertions over rendered payloads.
//!
//! Matching is *subset* matching by default: every property named in the
//! expected style must match, extra properties in the current style are
//! ignored. Nested mappings are matched the same way; sequences must match
//! element for element.

use weft_core::{PlainMap, PlainValue, Scalar};

/// Whether `current` satisfies `expected`.
#[must_use]
pub fn check_equal(current: Option<&PlainValue>, expected: &PlainValue) -> bool {
    if let PlainValue::Sequence(expected) = expected {
        return match current {
            Some(PlainValue::Sequence(current)) => {
                current.len() == expected.len()
                    && current
                        .iter()
                        .zip(expected)
                        .all(|(c, e)| check_equal(Some(c), e))
            }
            _ => false,
        };
    }
    match current {
        Some(PlainValue::Mapping(current)) => match expected {
            PlainValue::Mapping(expected) => expected
                .iter()
                .all(|(key, e)| check_equal(current.get(key), e)),
            _ => false,
        },
        Some(PlainValue::Sequence(_)) => false,
        Some(PlainValue::Scalar(current)) => {
            matches!(expected, PlainValue::Scalar(e) if e == current)
        }
        None => matches!(expected, PlainValue::Scalar(Scalar::Undefined)),
    }
}

/// One mismatching property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropDiff {
    pub property: String,
    pub current: Option<PlainValue>,
    pub expected: Option<PlainValue>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleDiff {
    pub is_equal: bool,
    pub diffs: Vec<PropDiff>,
}

/// Compare two styles.
///
/// With `match_all_props`, a size mismatch also fails and every current
/// property missing from `expected` is reported.
#[must_use]
pub fn find_style_diff(current: &PlainMap, expected: &PlainMap, match_all_props: bool) -> StyleDiff {
    let mut diffs = Vec::new();
    for (property, value) in expected {
        if !check_equal(current.get(property), value) {
            diffs.push(PropDiff {
                property: property.clone(),
                current: current.get(property).cloned(),
                expected: Some(value.clone()),
            });
        }
    }
    let mut is_equal = diffs.is_empty();
    if match_all_props && current.len() != expected.len() {
        is_equal = false;
        for (property, value) in current {
            if !expected.contains_key(property) {
                diffs.push(PropDiff {
                    property: property.clone(),
                    current: Some(value.clone()),
                    expected: None,
                });
            }
        }
    }
    StyleDiff { is_equal, diffs }
}

/// Merge style fragments, later ones winning.
#[must_use]
pub fn current_style<'a>(fragments: impl IntoIterator<Item = &'a PlainMap>) -> PlainMap {
    let mut merged = PlainMap::default();
    for fragment in fragments {
        for (key, value) in fragment {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn to_json<T: serde::Serialize + std::fmt::Debug + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

fn json_or_undefined(value: Option<&PlainValue>) -> String {
    value.map_or_else(|| String::from("undefined"), to_json::<PlainValue>)
}

/// `Ok` if `current` matches `expected`, otherwise a readable report.
pub fn compare_style(
    current: &PlainMap,
    expected: &PlainMap,
    match_all_props: bool,
) -> Result<(), String> {
    let diff = find_style_diff(current, expected, match_all_props);
    if diff.is_equal {
        return Ok(());
    }
    let differences = diff
        .diffs
        .iter()
        .map(|d| {
            format!(
                "- '{}' should be {}, but is {}",
                d.property,
                json_or_undefined(d.expected.as_ref()),
                json_or_undefined(d.current.as_ref()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Err(format!(
        "Expected: {}\nReceived: {}\n\nDifferences:\n{differences}",
        to_json(expected),
        to_json(current),
    ))
}

/// Panic with a style report unless `current` matches `expected`.
#[track_caller]
pub fn assert_style(current: &PlainMap, expected: &PlainMap, match_all_props: bool) {
    if let Err(report) = compare_style(current, expected, match_all_props) {
        panic!("style mismatch\n{report}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::plain_map;

    #[test]
    fn subset_match_ignores_extra_props() {
        let current = plain_map! { "width" => 10.0, "height" => 20.0 };
        let expected = plain_map! { "width" => 10.0 };
        assert!(find_style_diff(&current, &expected, false).is_equal);
        let strict = find_style_diff(&current, &expected, true);
        assert!(!strict.is_equal);
        assert_eq!(strict.diffs.len(), 1);
        assert_eq!(strict.diffs[0].property, "height");
        assert_eq!(strict.diffs[0].expected, None);
    }

    #[test]
    fn nested_transform_matching() {
        let current = plain_map! {
            "transform" => vec![
                PlainValue::from(plain_map! { "translateX" => 5.0 }),
                PlainValue::from(plain_map! { "scale" => 2.0, "extra" => true }),
            ],
        };
        let ok = plain_map! {
            "transform" => vec![
                PlainValue::from(plain_map! { "translateX" => 5.0 }),
                PlainValue::from(plain_map! { "scale" => 2.0 }),
            ],
        };
        let short = plain_map! {
            "transform" => vec![PlainValue::from(plain_map! { "translateX" => 5.0 })],
        };
        assert!(compare_style(&current, &ok, false).is_ok());
        assert!(compare_style(&current, &short, false).is_err());
    }

    #[test]
    fn missing_property_reports_undefined() {
        let report = compare_style(&PlainMap::default(), &plain_map! { "opacity" => 1.0 }, false)
            .unwrap_err();
        assert!(report.contains("- 'opacity' should be 1.0, but is undefined"), "{report}");
    }

    #[test]
    fn null_and_undefined_differ() {
        let current = plain_map! { "a" => Scalar::Null };
        assert!(!check_equal(current.get("a"), &PlainValue::Scalar(Scalar::Undefined)));
        assert!(check_equal(None, &PlainValue::Scalar(Scalar::Undefined)));
    }

    #[test]
    fn later_fragments_win() {
        let a = plain_map! { "x" => 1.0, "y" => 1.0 };
        let b = plain_map! { "x" => 2.0 };
        assert_eq!(current_style([&a, &b]), plain_map! { "x" => 2.0, "y" => 1.0 });
    }

    #[test]
    #[should_panic(expected = "style mismatch")]
    fn assert_style_panics_on_mismatch() {
        assert_style(&plain_map! { "x" => 1.0 }, &plain_map! { "x" => 2.0 }, false);
    }
}
