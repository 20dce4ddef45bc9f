use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_util::bytes::{self, BufMut};

use crate::types::RowValues;

type BindResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// Collect bound values as the trait objects tokio-postgres expects.
#[must_use]
pub fn as_refs<'a>(values: &[&'a RowValues]) -> Vec<&'a (dyn ToSql + Sync)> {
    let mut references = Vec::with_capacity(values.len());
    for v in values {
        references.push(*v as &(dyn ToSql + Sync));
    }
    references
}

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN)
        || ty.name() == "citext"
}

fn variant_name(value: &RowValues) -> &'static str {
    match value {
        RowValues::Int(_) => "integer",
        RowValues::Float(_) => "float",
        RowValues::Text(_) => "text",
        RowValues::Bool(_) => "boolean",
        RowValues::Timestamp(_) => "timestamp",
        RowValues::Null => "null",
        RowValues::JSON(_) => "json",
        RowValues::Blob(_) => "blob",
    }
}

fn mismatch(value: &RowValues, ty: &Type) -> BindResult {
    Err(format!("cannot bind a {} value to a Postgres {ty} parameter", variant_name(value)).into())
}

fn narrow<T: TryFrom<i64>>(value: i64, ty: &Type) -> Result<T, Box<dyn Error + Sync + Send>> {
    T::try_from(value).map_err(|_| format!("{value} does not fit in {ty}").into())
}

fn parse<T: std::str::FromStr>(text: &str, ty: &Type) -> Result<T, Box<dyn Error + Sync + Send>>
where
    T::Err: std::fmt::Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| format!("'{text}' is not a valid {ty}: {e}").into())
}

fn parse_bool(text: &str) -> Result<bool, Box<dyn Error + Sync + Send>> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("'{text}' is not a valid bool").into()),
    }
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, Box<dyn Error + Sync + Send>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| format!("'{text}' is not a valid timestamp").into())
}

/// Write a decimal literal such as `-12.50` in the binary NUMERIC format:
/// digit count, weight, sign and display scale, then base-10000 digits.
fn encode_numeric(text: &str, out: &mut bytes::BytesMut) -> BindResult {
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        out.put_i16(0);
        out.put_i16(0);
        out.put_u16(NUMERIC_NAN);
        out.put_u16(0);
        return Ok(IsNull::No);
    }

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(format!("'{text}' is not a valid numeric").into());
    }
    let dscale = u16::try_from(frac_part.len()).map_err(|_| format!("'{text}' has too many decimals"))?;

    let int_part = int_part.trim_start_matches('0');
    let mut digits_text = String::with_capacity(int_part.len() + frac_part.len() + 6);
    let int_pad = (4 - int_part.len() % 4) % 4;
    digits_text.extend(std::iter::repeat_n('0', int_pad));
    digits_text.push_str(int_part);
    let int_groups = digits_text.len() / 4;
    digits_text.push_str(frac_part);
    digits_text.extend(std::iter::repeat_n('0', (4 - frac_part.len() % 4) % 4));

    let mut groups: Vec<i16> = digits_text
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0')))
        .collect();
    let mut weight = i64::try_from(int_groups).map_err(|_| "numeric too large")? - 1;
    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= i64::try_from(leading).map_err(|_| "numeric too large")?;
    while groups.last() == Some(&0) {
        groups.pop();
    }

    let ndigits = i16::try_from(groups.len()).map_err(|_| format!("'{text}' has too many digits"))?;
    let (weight, sign) = if groups.is_empty() {
        (0, NUMERIC_POS)
    } else {
        let weight = i16::try_from(weight).map_err(|_| format!("'{text}' is out of range"))?;
        (weight, if negative { NUMERIC_NEG } else { NUMERIC_POS })
    };
    out.put_i16(ndigits);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(dscale);
    for group in groups {
        out.put_i16(group);
    }
    Ok(IsNull::No)
}

fn int_to_sql(value: &RowValues, i: i64, ty: &Type, out: &mut bytes::BytesMut) -> BindResult {
    match *ty {
        Type::INT2 => narrow::<i16>(i, ty)?.to_sql(ty, out),
        Type::INT4 => narrow::<i32>(i, ty)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => narrow::<u32>(i, ty)?.to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => encode_numeric(&i.to_string(), out),
        _ if is_text(ty) => i.to_string().to_sql(ty, out),
        _ => mismatch(value, ty),
    }
}

fn float_to_sql(value: &RowValues, f: f64, ty: &Type, out: &mut bytes::BytesMut) -> BindResult {
    match *ty {
        #[allow(clippy::cast_possible_truncation)]
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::NUMERIC if f.is_infinite() => Err(format!("{f} cannot be stored as numeric").into()),
        Type::NUMERIC => encode_numeric(&f.to_string(), out),
        _ if is_text(ty) => f.to_string().to_sql(ty, out),
        _ => mismatch(value, ty),
    }
}

fn text_to_sql(value: &RowValues, s: &str, ty: &Type, out: &mut bytes::BytesMut) -> BindResult {
    match *ty {
        Type::INT2 => parse::<i16>(s, ty)?.to_sql(ty, out),
        Type::INT4 => parse::<i32>(s, ty)?.to_sql(ty, out),
        Type::INT8 => parse::<i64>(s, ty)?.to_sql(ty, out),
        Type::OID => parse::<u32>(s, ty)?.to_sql(ty, out),
        Type::FLOAT4 => parse::<f32>(s, ty)?.to_sql(ty, out),
        Type::FLOAT8 => parse::<f64>(s, ty)?.to_sql(ty, out),
        Type::NUMERIC => encode_numeric(s, out),
        Type::BOOL => parse_bool(s)?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamp(s)?.and_utc().to_sql(ty, out),
        Type::DATE => parse_timestamp(s)?.date().to_sql(ty, out),
        Type::JSON | Type::JSONB => {
            let json: serde_json::Value =
                serde_json::from_str(s).map_err(|e| format!("'{s}' is not valid json: {e}"))?;
            json.to_sql(ty, out)
        }
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ if is_text(ty) => s.to_sql(ty, out),
        _ => mismatch(value, ty),
    }
}

impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> BindResult {
        match self {
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::Int(i) => int_to_sql(self, *i, ty, out),
            RowValues::Float(f) => float_to_sql(self, *f, ty, out),
            RowValues::Text(s) => text_to_sql(self, s, ty, out),
            RowValues::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => mismatch(self, ty),
            },
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ if is_text(ty) => dt.to_string().to_sql(ty, out),
                _ => mismatch(self, ty),
            },
            RowValues::JSON(json) => match *ty {
                Type::JSON | Type::JSONB => json.to_sql(ty, out),
                _ if is_text(ty) => json.to_string().to_sql(ty, out),
                _ => mismatch(self, ty),
            },
            RowValues::Blob(blob) => match *ty {
                Type::BYTEA => blob.to_sql(ty, out),
                _ => mismatch(self, ty),
            },
        }
    }

    // Each variant checks its own target type in `to_sql`; NULL binds to any type.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn to_sql_checked(&self, ty: &Type, out: &mut bytes::BytesMut) -> BindResult {
        self.to_sql(ty, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error + Sync + Send>>;

    fn encode(value: &RowValues, ty: &Type) -> Result<Vec<u8>, Box<dyn std::error::Error + Sync + Send>> {
        let mut buf = bytes::BytesMut::new();
        value.to_sql_checked(ty, &mut buf)?;
        Ok(buf.to_vec())
    }

    #[test]
    fn ints_narrow_to_the_column_width() -> TestResult {
        assert_eq!(encode(&RowValues::Int(7), &Type::INT4)?, 7i32.to_be_bytes());
        assert!(encode(&RowValues::Int(70_000), &Type::INT2).is_err());
        Ok(())
    }

    #[test]
    fn text_is_converted_to_numeric_columns() -> TestResult {
        assert_eq!(encode(&RowValues::Text("1234".into()), &Type::INT4)?, 1234i32.to_be_bytes());
        assert_eq!(encode(&RowValues::Text(" 2.5 ".into()), &Type::FLOAT8)?, 2.5f64.to_be_bytes());
        assert_eq!(encode(&RowValues::Text("yes".into()), &Type::BOOL)?, [1u8]);
        assert!(encode(&RowValues::Text("abc".into()), &Type::INT4).is_err());
        Ok(())
    }

    #[test]
    fn scalars_bound_to_text_use_their_display_form() -> TestResult {
        assert_eq!(encode(&RowValues::Int(5), &Type::TEXT)?, b"5");
        assert_eq!(encode(&RowValues::Bool(false), &Type::VARCHAR)?, b"false");
        Ok(())
    }

    #[test]
    fn null_binds_to_any_type() -> TestResult {
        let mut buf = bytes::BytesMut::new();
        for ty in [Type::UUID, Type::NUMERIC, Type::INTERVAL, Type::TIME, Type::TEXT] {
            assert!(matches!(RowValues::Null.to_sql_checked(&ty, &mut buf)?, IsNull::Yes));
        }
        assert!(buf.is_empty());
        Ok(())
    }

    #[test]
    fn unconvertible_pairs_are_rejected() {
        assert!(encode(&RowValues::Blob(vec![1, 2]), &Type::INT4).is_err());
        assert!(encode(&RowValues::Bool(true), &Type::INT8).is_err());
        assert!(encode(&RowValues::Float(1.5), &Type::INT4).is_err());
        assert!(encode(&RowValues::Text("x".into()), &Type::UUID).is_err());
    }

    #[test]
    fn numeric_uses_base_10000_digits() -> TestResult {
        // 12.50: two digit groups (12, 5000), weight 0, scale 2
        assert_eq!(
            encode(&RowValues::Text("12.50".into()), &Type::NUMERIC)?,
            [0u8, 2, 0, 0, 0, 0, 0, 2, 0, 12, 0x13, 0x88]
        );
        // -0.0012: one group (12) at weight -1
        assert_eq!(
            encode(&RowValues::Float(-0.0012), &Type::NUMERIC)?,
            [0u8, 1, 0xFF, 0xFF, 0x40, 0, 0, 4, 0, 12]
        );
        // 100000000: the group 1 at weight 2
        assert_eq!(
            encode(&RowValues::Int(100_000_000), &Type::NUMERIC)?,
            [0u8, 1, 0, 2, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(encode(&RowValues::Int(0), &Type::NUMERIC)?, [0u8; 8]);
        assert!(encode(&RowValues::Text("1.2.3".into()), &Type::NUMERIC).is_err());
        Ok(())
    }
}
