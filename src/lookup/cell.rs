use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{FromSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// A single column value decoded without knowing the column type up front.
///
/// Stored procedures own their result types, so rows are read positionally and
/// each value is narrowed to the few shapes the pipeline cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            Cell::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// NaN and infinities read as missing.
    pub fn as_float(&self) -> Option<f64> {
        let value = match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) => Some(v.to_string()),
            Cell::Null => None,
        }
    }
}

impl<'a> FromSql<'a> for Cell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let cell = match *ty {
            Type::INT2 => Cell::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Cell::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Cell::Int(i64::from_sql(ty, raw)?),
            Type::FLOAT4 => Cell::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Cell::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Cell::Float(numeric_to_f64(raw)?),
            Type::DATE => Cell::Text(NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => Cell::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMP => Cell::Text(NaiveDateTime::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMPTZ => Cell::Text(DateTime::<Utc>::from_sql(ty, raw)?.to_string()),
            _ => Cell::Text(String::from_sql(ty, raw)?),
        };
        Ok(cell)
    }

    fn from_sql_null(_: &Type) -> Result<Self, BoxError> {
        Ok(Cell::Null)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::DATE
                | Type::TIME
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
        ) || <String as FromSql>::accepts(ty)
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decodes Postgres' binary NUMERIC: a header of digit count, weight, sign and
/// scale, followed by base-10000 digits. NaN and the infinities have no
/// finite value and are rejected.
fn numeric_to_f64(raw: &[u8]) -> Result<f64, BoxError> {
    let word = |i: usize| -> Result<u16, BoxError> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16;
    let sign = word(2)?;

    match sign {
        NUMERIC_POS | NUMERIC_NEG => {}
        NUMERIC_NAN => return Err("numeric NaN has no finite value".into()),
        NUMERIC_PINF | NUMERIC_NINF => return Err("numeric infinity has no finite value".into()),
        other => return Err(format!("unknown numeric sign word {other:#06x}").into()),
    }

    let mut value = 0.0;
    for i in 0..ndigits {
        let digit = f64::from(word(4 + i)?);
        let exp = i32::from(weight) - i as i32;
        value += if exp >= 0 {
            digit * 10_000f64.powi(exp)
        } else {
            digit / 10_000f64.powi(-exp)
        };
    }

    Ok(if sign == NUMERIC_NEG { -value } else { value })
}
