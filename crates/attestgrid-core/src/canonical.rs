//! # Canonical Serialization
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! that are hashed or signed anywhere in AttestGrid.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()` or
//! `CanonicalBytes::from_value()`, both of which apply the rules below. Any
//! function that needs canonical bytes accepts `&CanonicalBytes`, so the
//! "hashed the wrong serialization" defect cannot be written.
//!
//! ## Canonical Form
//!
//! 1. **Objects** — keys sorted by Unicode code point (identical to UTF-8
//!    byte order) at every nesting level.
//! 2. **Arrays** — input order preserved.
//! 3. **Separators** — `,` and `:` with no whitespace anywhere.
//! 4. **Strings** — UTF-8 passthrough; `"` and `\` escaped; U+0000..U+001F
//!    escaped as `\b \f \n \r \t` where a short form exists, otherwise
//!    `\u00xx` with lowercase hex.
//! 5. **Numbers** — values that fit `i64`/`u64` are plain decimal integers.
//!    Every other finite number uses the RFC 8785 (ECMAScript
//!    `Number.prototype.toString`) shortest round-trip form, produced by
//!    `serde_jcs`. Thus `1.0` becomes `1` and `1e21` becomes `1e+21`.
//! 6. **Non-finite numbers** — rejected with
//!    [`CanonicalizationError::NonFiniteNumber`]. `serde_json` would
//!    otherwise silently turn them into `null`, so typed values are scanned
//!    before conversion.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by the canonicalization rules in this module.
///
/// # Invariants
///
/// - The only constructors are `CanonicalBytes::new()` and
///   `CanonicalBytes::from_value()`.
/// - The content is valid UTF-8 and valid JSON.
/// - Re-parsing and re-canonicalizing yields identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(String);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::NonFiniteNumber` if any float in the
    /// value is NaN or infinite, and `SerializationFailed` if the value's
    /// `Serialize` impl fails.
    pub fn new(obj: &(impl Serialize + ?Sized)) -> Result<Self, CanonicalizationError> {
        finite::reject_non_finite(obj)?;
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes from an already-parsed JSON value.
    ///
    /// `serde_json::Value` cannot hold non-finite numbers, so this path
    /// only fails if number formatting fails.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let mut out = String::with_capacity(128);
        write_value(&value, &mut out)?;
        Ok(Self(out))
    }

    /// Access the canonical bytes for digest computation and signing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The canonical form as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the canonical form back into a JSON value.
    ///
    /// Re-canonicalizing the returned value yields these same bytes.
    pub fn to_value(&self) -> Result<Value, CanonicalizationError> {
        Ok(serde_json::from_str(&self.0)?)
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for CanonicalBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort explicitly: serde_json::Map may be insertion-ordered when
            // another crate in the build enables `preserve_order`.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(val, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(n: &Number, out: &mut String) -> Result<(), CanonicalizationError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else if let Some(f) = n.as_f64() {
        if !f.is_finite() {
            return Err(CanonicalizationError::NonFiniteNumber(f));
        }
        out.push_str(&serde_jcs::to_string(&f)?);
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A serde `Serializer` that walks a value only to find non-finite floats.
mod finite {
    use serde::ser::{self, Serialize};

    use crate::error::CanonicalizationError;

    #[derive(Debug)]
    pub(super) enum ProbeError {
        NonFinite(f64),
        Custom(String),
    }

    impl std::fmt::Display for ProbeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::NonFinite(v) => write!(f, "non-finite number {v}"),
                Self::Custom(msg) => f.write_str(msg),
            }
        }
    }

    impl std::error::Error for ProbeError {}

    impl ser::Error for ProbeError {
        fn custom<T: std::fmt::Display>(msg: T) -> Self {
            Self::Custom(msg.to_string())
        }
    }

    /// Custom serialization failures are left for `serde_json` to report.
    pub(super) fn reject_non_finite(obj: &(impl Serialize + ?Sized)) -> Result<(), CanonicalizationError> {
        match obj.serialize(FiniteProbe) {
            Err(ProbeError::NonFinite(f)) => Err(CanonicalizationError::NonFiniteNumber(f)),
            _ => Ok(()),
        }
    }

    pub(super) struct FiniteProbe;

    type Probed = Result<(), ProbeError>;

    macro_rules! accept_scalars {
        ($($method:ident: $ty:ty),* $(,)?) => {
            $(fn $method(self, _v: $ty) -> Probed { Ok(()) })*
        };
    }

    impl ser::Serializer for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;
        type SerializeSeq = Self;
        type SerializeTuple = Self;
        type SerializeTupleStruct = Self;
        type SerializeTupleVariant = Self;
        type SerializeMap = Self;
        type SerializeStruct = Self;
        type SerializeStructVariant = Self;

        accept_scalars! {
            serialize_bool: bool,
            serialize_i8: i8,
            serialize_i16: i16,
            serialize_i32: i32,
            serialize_i64: i64,
            serialize_i128: i128,
            serialize_u8: u8,
            serialize_u16: u16,
            serialize_u32: u32,
            serialize_u64: u64,
            serialize_u128: u128,
            serialize_char: char,
            serialize_str: &str,
            serialize_bytes: &[u8],
        }

        fn serialize_f32(self, v: f32) -> Probed {
            self.serialize_f64(f64::from(v))
        }

        fn serialize_f64(self, v: f64) -> Probed {
            if v.is_finite() {
                Ok(())
            } else {
                Err(ProbeError::NonFinite(v))
            }
        }

        fn serialize_none(self) -> Probed {
            Ok(())
        }

        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Probed {
            value.serialize(self)
        }

        fn serialize_unit(self) -> Probed {
            Ok(())
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Probed {
            Ok(())
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Probed {
            Ok(())
        }

        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            value: &T,
        ) -> Probed {
            value.serialize(self)
        }

        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            value: &T,
        ) -> Probed {
            value.serialize(self)
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Self, ProbeError> {
            Ok(self)
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self, ProbeError> {
            Ok(self)
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self, ProbeError> {
            Ok(self)
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self, ProbeError> {
            Ok(self)
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self, ProbeError> {
            Ok(self)
        }

        fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, ProbeError> {
            Ok(self)
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self, ProbeError> {
            Ok(self)
        }
    }

    impl ser::SerializeSeq for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }

    impl ser::SerializeTuple for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }

    impl ser::SerializeTupleStruct for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }

    impl ser::SerializeTupleVariant for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }

    impl ser::SerializeMap for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Probed {
            key.serialize(FiniteProbe)
        }

        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }

    impl ser::SerializeStruct for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_field<T: ?Sized + Serialize>(
            &mut self,
            _key: &'static str,
            value: &T,
        ) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }

    impl ser::SerializeStructVariant for FiniteProbe {
        type Ok = ();
        type Error = ProbeError;

        fn serialize_field<T: ?Sized + Serialize>(
            &mut self,
            _key: &'static str,
            value: &T,
        ) -> Probed {
            value.serialize(FiniteProbe)
        }

        fn end(self) -> Probed {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn canon(value: Value) -> String {
        CanonicalBytes::from_value(value)
            .expect("should canonicalize")
            .as_str()
            .to_string()
    }

    #[test]
    fn to_value_round_trips_canonical_form() {
        let value = serde_json::json!({"z": [1.5, 1e21, -7], "a": "\u{1}é"});
        let cb = CanonicalBytes::from_value(value).unwrap();
        let back = CanonicalBytes::from_value(cb.to_value().unwrap()).unwrap();
        assert_eq!(back, cb);
    }

    #[test]
    fn test_canonical_bytes_simple_dict() {
        let data = serde_json::json!({"b": 2, "a": 1, "c": "hello"});
        assert_eq!(canon(data), r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn test_canonical_bytes_nested() {
        let data = serde_json::json!({
            "outer": {"b": 2, "a": 1},
            "list": [3, 2, 1]
        });
        assert_eq!(canon(data), r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_key_order_independent_of_insertion_order() {
        let mut first = HashMap::new();
        first.insert("zeta", 1);
        first.insert("alpha", 2);
        first.insert("mid", 3);
        let mut second = HashMap::new();
        second.insert("mid", 3);
        second.insert("alpha", 2);
        second.insert("zeta", 1);
        assert_eq!(
            CanonicalBytes::new(&first).unwrap(),
            CanonicalBytes::new(&second).unwrap()
        );
    }

    #[test]
    fn test_keys_sorted_by_code_point() {
        // "Z" (U+005A) < "a" (U+0061) < "é" (U+00E9) < "😀" (U+1F600)
        let data = serde_json::json!({"😀": 4, "é": 3, "a": 2, "Z": 1});
        assert_eq!(canon(data), r#"{"Z":1,"a":2,"é":3,"😀":4}"#);
    }

    #[test]
    fn test_integral_float_has_integer_form() {
        let data = serde_json::json!({"x": 1.0});
        assert_eq!(canon(data), r#"{"x":1}"#);
    }

    #[test]
    fn test_fractional_float_shortest_form() {
        let data = serde_json::json!({"x": 1.5, "y": 0.1});
        assert_eq!(canon(data), r#"{"x":1.5,"y":0.1}"#);
    }

    #[test]
    fn test_large_float_exponent_form() {
        let data = serde_json::json!([1e21]);
        assert_eq!(canon(data), "[1e+21]");
    }

    #[test]
    fn test_nan_rejected_for_typed_values() {
        #[derive(Serialize)]
        struct Reading {
            value: f64,
        }
        let result = CanonicalBytes::new(&Reading { value: f64::NAN });
        assert!(matches!(
            result,
            Err(CanonicalizationError::NonFiniteNumber(f)) if f.is_nan()
        ));
    }

    #[test]
    fn test_infinity_rejected_deep_in_collections() {
        let data: Vec<HashMap<String, Vec<f32>>> = vec![HashMap::from([(
            "readings".to_string(),
            vec![1.0, f32::NEG_INFINITY],
        )])];
        assert!(matches!(
            CanonicalBytes::new(&data),
            Err(CanonicalizationError::NonFiniteNumber(f)) if f == f64::NEG_INFINITY
        ));
    }

    #[test]
    fn test_negative_and_large_integers() {
        let data = serde_json::json!({"neg": -42, "big": 18446744073709551615u64});
        assert_eq!(canon(data), r#"{"big":18446744073709551615,"neg":-42}"#);
    }

    #[test]
    fn test_control_characters_escaped() {
        let data = serde_json::json!("a\"b\\c\nd\te\u{01}f/");
        assert_eq!(canon(data), r#""a\"b\\c\nd\te\u0001f/""#);
    }

    #[test]
    fn test_unicode_passthrough() {
        let data = serde_json::json!({"name": "\u{00e9}\u{00e8}"});
        assert_eq!(canon(data), "{\"name\":\"\u{00e9}\u{00e8}\"}");
    }

    #[test]
    fn test_scalars_and_empties() {
        assert_eq!(canon(serde_json::json!(null)), "null");
        assert_eq!(canon(serde_json::json!(true)), "true");
        assert_eq!(canon(serde_json::json!({})), "{}");
        assert_eq!(canon(serde_json::json!([])), "[]");
        assert_eq!(canon(serde_json::json!({"key": null})), r#"{"key":null}"#);
    }

    #[test]
    fn test_arrays_keep_order() {
        let data = serde_json::json!([{"b": 1, "a": 2}, 3, "x"]);
        assert_eq!(canon(data), r#"[{"a":2,"b":1},3,"x"]"#);
    }

    #[test]
    fn test_len_and_display() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(cb.len(), 7);
        assert!(!cb.is_empty());
        assert_eq!(cb.to_string(), r#"{"a":1}"#);
    }
}
