#![forbid(unsafe_code)]

//! Property values: the closed set of shapes a component property can take.
//!
//! A property bag is a [`PropMap`] of [`PropValue`]s. A value is a scalar, a
//! sequence, a mapping, or an observable cell ([`SharedValue`]). Cells may
//! hold further composites that contain more cells, to any depth.
//!
//! [`PlainValue`] is the cell-free counterpart pushed to the render tree:
//! [`PropValue::materialize`] reads every cell it meets and produces one.
//!
//! `Scalar::Undefined` is an explicit value. A key mapped to `Undefined` is
//! present; a key missing from the map is absent. Sinks can tell them apart.
//! JSON has no `undefined`, so with the `serde` feature an explicit one is
//! written as the marker object `{"$undefined": true}` and read back as
//! `Undefined`; `null` stays `Null`.

use std::fmt;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::cell::ObservableCell;

/// An observable cell that can appear inside a property bag.
pub type SharedValue = ObservableCell<PropValue>;

/// Insertion-ordered property map.
pub type PropMap = IndexMap<String, PropValue, RandomState>;

/// Insertion-ordered, cell-free payload map.
pub type PlainMap = IndexMap<String, PlainValue, RandomState>;

/// Key of the JSON marker object standing for [`Scalar::Undefined`].
#[cfg(feature = "serde")]
pub const UNDEFINED_MARKER: &str = "$undefined";

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    Null,
    #[default]
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    /// `Null` or `Undefined`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Undefined => f.write_str("undefined"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

#[cfg(feature = "serde")]
mod scalar_serde {
    use std::fmt;

    use serde::de::{self, IgnoredAny, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Scalar, UNDEFINED_MARKER};

    impl Serialize for Scalar {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Self::Null => serializer.serialize_unit(),
                Self::Undefined => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry(UNDEFINED_MARKER, &true)?;
                    map.end()
                }
                Self::Bool(b) => serializer.serialize_bool(*b),
                Self::Number(n) => serializer.serialize_f64(*n),
                Self::String(s) => serializer.serialize_str(s),
            }
        }
    }

    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = Scalar;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a scalar or {{\"{UNDEFINED_MARKER}\": true}}")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Scalar, E> {
            Ok(Scalar::Null)
        }

        fn visit_none<E: de::Error>(self) -> Result<Scalar, E> {
            Ok(Scalar::Null)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
            Ok(Scalar::Bool(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
            Ok(Scalar::Number(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
            Ok(Scalar::Number(v as f64))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
            Ok(Scalar::Number(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
            Ok(Scalar::String(v.to_owned()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
            Ok(Scalar::String(v))
        }

        // Only the exact marker object is a scalar; any other map is a mapping.
        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Scalar, A::Error> {
            let marker = match map.next_key::<String>()? {
                Some(key) if key == UNDEFINED_MARKER => map.next_value::<bool>()?,
                _ => false,
            };
            if marker && map.next_key::<IgnoredAny>()?.is_none() {
                Ok(Scalar::Undefined)
            } else {
                Err(de::Error::invalid_type(de::Unexpected::Map, &self))
            }
        }
    }

    impl<'de> Deserialize<'de> for Scalar {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ScalarVisitor)
        }
    }
}

/// A property value as handed over by the component layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Scalar(Scalar),
    Sequence(Vec<PropValue>),
    Mapping(PropMap),
    /// Reactive: compared by cell identity, read on materialization.
    Cell(SharedValue),
}

impl Default for PropValue {
    fn default() -> Self {
        Self::Scalar(Scalar::Undefined)
    }
}

impl PropValue {
    #[must_use]
    pub fn undefined() -> Self {
        Self::Scalar(Scalar::Undefined)
    }

    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    /// Wrap `value` in a fresh cell.
    #[must_use]
    pub fn cell(value: impl Into<PropValue>) -> SharedValue {
        SharedValue::new(value.into())
    }

    /// Whether this value is an observable cell.
    #[must_use]
    pub fn is_cell(&self) -> bool {
        matches!(self, Self::Cell(_))
    }

    #[must_use]
    pub fn as_cell(&self) -> Option<&SharedValue> {
        match self {
            Self::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&PropMap> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[PropValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// `Null` or `Undefined` scalar.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Scalar(s) if s.is_nullish())
    }

    /// Whether a cell appears anywhere inside this value, itself included.
    ///
    /// Does not look inside cells.
    #[must_use]
    pub fn contains_cell(&self) -> bool {
        match self {
            Self::Cell(_) => true,
            Self::Scalar(_) => false,
            Self::Sequence(items) => items.iter().any(Self::contains_cell),
            Self::Mapping(map) => map.values().any(Self::contains_cell),
        }
    }

    /// Produce the cell-free value, reading every cell's current value.
    ///
    /// Cells are read recursively: a cell whose value is a composite holding
    /// more cells is fully resolved.
    #[must_use]
    pub fn materialize(&self) -> PlainValue {
        match self {
            Self::Scalar(s) => PlainValue::Scalar(s.clone()),
            Self::Sequence(items) => {
                PlainValue::Sequence(items.iter().map(Self::materialize).collect())
            }
            Self::Mapping(map) => PlainValue::Mapping(materialize_map(map)),
            Self::Cell(cell) => cell.with(Self::materialize),
        }
    }
}

/// Materialize every entry of `map`, keeping key order.
#[must_use]
pub fn materialize_map(map: &PropMap) -> PlainMap {
    map.iter()
        .map(|(key, value)| (key.clone(), value.materialize()))
        .collect()
}

impl From<Scalar> for PropValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Scalar(Scalar::Number(f64::from(value)))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_owned()))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<SharedValue> for PropValue {
    fn from(value: SharedValue) -> Self {
        Self::Cell(value)
    }
}

impl From<&SharedValue> for PropValue {
    fn from(value: &SharedValue) -> Self {
        Self::Cell(value.clone())
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(value: Vec<PropValue>) -> Self {
        Self::Sequence(value)
    }
}

impl From<PropMap> for PropValue {
    fn from(value: PropMap) -> Self {
        Self::Mapping(value)
    }
}

/// A cell-free value: what the render tree receives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PlainValue {
    Scalar(Scalar),
    Sequence(Vec<PlainValue>),
    Mapping(PlainMap),
}

impl Default for PlainValue {
    fn default() -> Self {
        Self::Scalar(Scalar::Undefined)
    }
}

impl PlainValue {
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Scalar(Scalar::Number(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&PlainMap> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[PlainValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up `key` when this value is a mapping.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PlainValue> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Lift back into a property value (no cells).
    #[must_use]
    pub fn into_prop(self) -> PropValue {
        match self {
            Self::Scalar(s) => PropValue::Scalar(s),
            Self::Sequence(items) => {
                PropValue::Sequence(items.into_iter().map(Self::into_prop).collect())
            }
            Self::Mapping(map) => PropValue::Mapping(
                map.into_iter().map(|(k, v)| (k, v.into_prop())).collect(),
            ),
        }
    }
}

impl From<f64> for PlainValue {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }
}

impl From<i32> for PlainValue {
    fn from(value: i32) -> Self {
        Self::Scalar(Scalar::Number(f64::from(value)))
    }
}

impl From<bool> for PlainValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<&str> for PlainValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_owned()))
    }
}

impl From<Scalar> for PlainValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<PlainValue>> for PlainValue {
    fn from(value: Vec<PlainValue>) -> Self {
        Self::Sequence(value)
    }
}

impl From<PlainMap> for PlainValue {
    fn from(value: PlainMap) -> Self {
        Self::Mapping(value)
    }
}

/// Build a [`PropMap`] from `key => value` pairs.
///
/// ```
/// use weft_core::{prop_map, PropValue};
///
/// let width = PropValue::cell(10.0);
/// let style = prop_map! { "width" => &width, "height" => 20.0 };
/// assert!(style["width"].is_cell());
/// ```
#[macro_export]
macro_rules! prop_map {
    () => { $crate::value::PropMap::default() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::PropMap::default();
        $( map.insert(::std::string::String::from($key), $crate::value::PropValue::from($value)); )+
        map
    }};
}

/// Build a [`PlainMap`] from `key => value` pairs.
#[macro_export]
macro_rules! plain_map {
    () => { $crate::value::PlainMap::default() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::PlainMap::default();
        $( map.insert(::std::string::String::from($key), $crate::value::PlainValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn materialize_reads_cells() {
        let opacity = PropValue::cell(0.5);
        let style = prop_map! { "opacity" => &opacity, "width" => 10 };
        let plain = materialize_map(&style);
        assert_eq!(plain["opacity"], PlainValue::from(0.5));
        opacity.set(PropValue::from(1.0));
        assert_eq!(materialize_map(&style)["opacity"], PlainValue::from(1.0));
    }

    #[test]
    fn materialize_nested_cells_inside_cells() {
        let inner = PropValue::cell(3.0);
        let outer = PropValue::cell(PropValue::Mapping(prop_map! { "x" => &inner }));
        let plain = PropValue::Cell(outer).materialize();
        assert_eq!(plain.get("x"), Some(&PlainValue::from(3.0)));
        inner.set(PropValue::from(4.0));
    }

    #[test]
    fn undefined_cell_is_explicit() {
        let missing = PropValue::cell(PropValue::undefined());
        let plain = materialize_map(&prop_map! { "left" => &missing });
        assert_eq!(plain.len(), 1);
        assert_eq!(plain["left"], PlainValue::Scalar(Scalar::Undefined));
    }

    #[test]
    fn contains_cell_is_recursive_but_not_through_cells() {
        let c = PropValue::cell(1.0);
        let nested = PropValue::Sequence(vec![PropValue::Mapping(prop_map! {
            "deep" => PropValue::Sequence(vec![PropValue::from(&c)]),
        })]);
        assert!(nested.contains_cell());
        assert!(!PropValue::from(1.0).contains_cell());
        assert!(!PropValue::Mapping(prop_map! { "a" => 1, "b" => "x" }).contains_cell());
    }

    #[test]
    fn cell_equality_is_identity() {
        let a = PropValue::cell(1.0);
        let b = PropValue::cell(1.0);
        assert_ne!(PropValue::from(&a), PropValue::from(&b));
        assert_eq!(PropValue::from(&a), PropValue::from(a.clone()));
    }

    #[test]
    fn key_order_is_preserved() {
        let plain = materialize_map(&prop_map! { "z" => 1, "a" => 2, "m" => 3 });
        let keys: Vec<_> = plain.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    fn plain_leaf() -> impl Strategy<Value = PlainValue> {
        prop_oneof![
            Just(PlainValue::Scalar(Scalar::Null)),
            Just(PlainValue::Scalar(Scalar::Undefined)),
            any::<bool>().prop_map(PlainValue::from),
            (-1.0e6f64..1.0e6).prop_map(PlainValue::from),
            "[a-z]{0,8}".prop_map(|s| PlainValue::Scalar(Scalar::String(s))),
        ]
    }

    fn plain_tree() -> impl Strategy<Value = PlainValue> {
        plain_leaf().prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(PlainValue::Sequence),
                proptest::collection::vec(("[a-z]{1,4}", inner), 0..4)
                    .prop_map(|entries| PlainValue::Mapping(entries.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// A tree with no cells materializes to itself.
        #[test]
        fn cell_free_trees_materialize_unchanged(tree in plain_tree()) {
            let prop = tree.clone().into_prop();
            prop_assert!(!prop.contains_cell());
            prop_assert_eq!(prop.materialize(), tree);
        }
    }
}
