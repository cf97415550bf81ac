//! Typed extraction of request body fields.
//!
//! Every failure is a [`LexisError::Validation`] naming the field, so
//! handlers can use `?` and let the dispatcher turn it into a response.

use std::str::FromStr;

use lexis_core::{LexisError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A field that must be present.
pub fn require<'a>(body: &'a Value, key: &str) -> Result<&'a Value> {
    match body.get(key) {
        None | Some(Value::Null) => Err(LexisError::validation(format!(
            "Missing required field: {key}"
        ))),
        Some(v) => Ok(v),
    }
}

/// A required string field. Blank strings count as missing.
pub fn require_str<'a>(body: &'a Value, key: &str) -> Result<&'a str> {
    let s = require(body, key)?
        .as_str()
        .ok_or_else(|| LexisError::validation(format!("Field '{key}' must be a string")))?;
    if s.trim().is_empty() {
        return Err(LexisError::validation(format!("Field '{key}' must not be empty")));
    }
    Ok(s)
}

pub fn optional_str<'a>(body: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(LexisError::validation(format!("Field '{key}' must be a string"))),
    }
}

pub fn optional_u64(body: &Value, key: &str) -> Result<Option<u64>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            LexisError::validation(format!("Field '{key}' must be a non-negative integer"))
        }),
    }
}

pub fn require_u64(body: &Value, key: &str) -> Result<u64> {
    optional_u64(body, key)?
        .ok_or_else(|| LexisError::validation(format!("Missing required field: {key}")))
}

pub fn optional_u32(body: &Value, key: &str) -> Result<Option<u32>> {
    optional_u64(body, key)?
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| LexisError::validation(format!("Field '{key}' is out of range")))
        })
        .transpose()
}

pub fn require_u32(body: &Value, key: &str) -> Result<u32> {
    optional_u32(body, key)?
        .ok_or_else(|| LexisError::validation(format!("Missing required field: {key}")))
}

pub fn optional_bool(body: &Value, key: &str) -> Result<Option<bool>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(LexisError::validation(format!("Field '{key}' must be a boolean"))),
    }
}

/// A string field parsed through `FromStr`: enums and branded ids.
pub fn optional_parsed<T: FromStr>(body: &Value, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    optional_str(body, key)?
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| LexisError::validation(format!("Field '{key}': {e}")))
        })
        .transpose()
}

pub fn require_parsed<T: FromStr>(body: &Value, key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let s = require_str(body, key)?;
    s.parse::<T>()
        .map_err(|e| LexisError::validation(format!("Field '{key}': {e}")))
}

/// Deserialize a structured field (arrays of pairs, answer lists, scores).
pub fn require_as<T: DeserializeOwned>(body: &Value, key: &str) -> Result<T> {
    let v = require(body, key)?;
    serde_json::from_value(v.clone())
        .map_err(|e| LexisError::validation(format!("Field '{key}' is malformed: {e}")))
}

pub fn optional_as<T: DeserializeOwned>(body: &Value, key: &str) -> Result<Option<T>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| LexisError::validation(format!("Field '{key}' is malformed: {e}"))),
    }
}
