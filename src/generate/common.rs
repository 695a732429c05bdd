use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArticleError, Result};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Scalar value of a generation option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl OptionValue {
    /// Type a raw command-line value: bool, then integer, then float, else string.
    pub fn infer(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Self::Int(value);
        }
        if let Ok(value) = raw.parse::<f64>() {
            return Self::Float(value);
        }
        Self::Str(raw.to_string())
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// Generation options shared by every backend.
///
/// Well-known options get typed fields; anything else a provider accepts goes
/// into `extra` and is forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, OptionValue>,
}

impl GenerationOptions {
    /// Build options from loosely typed key/value pairs, routing known keys to
    /// their typed fields.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, OptionValue)>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            options.set(key, value)?;
        }
        Ok(options)
    }

    pub fn set<K: Into<String>>(&mut self, key: K, value: OptionValue) -> Result<()> {
        let key = key.into();
        match key.as_str() {
            "temperature" => self.temperature = Some(expect_float(&key, &value)?),
            "top_p" => self.top_p = Some(expect_float(&key, &value)?),
            "max_tokens" => self.max_tokens = Some(expect_int(&key, &value)?),
            "seed" => self.seed = Some(expect_int(&key, &value)?),
            _ => {
                self.extra.insert(key, value);
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<OptionValue> {
        match key {
            "temperature" => self.temperature.map(OptionValue::Float),
            "top_p" => self.top_p.map(OptionValue::Float),
            "max_tokens" => self.max_tokens.map(OptionValue::Int),
            "seed" => self.seed.map(OptionValue::Int),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Layer `overrides` on top of `self`; an override wins key by key.
    pub fn merged_with(&self, overrides: &GenerationOptions) -> GenerationOptions {
        let mut extra = self.extra.clone();
        extra.extend(overrides.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        GenerationOptions {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            seed: overrides.seed.or(self.seed),
            extra,
        }
    }

    /// All set options as one flat map, typed fields included
    pub fn to_map(&self) -> BTreeMap<String, OptionValue> {
        let mut map = self.extra.clone();
        for key in ["temperature", "max_tokens", "top_p", "seed"] {
            if let Some(value) = self.get(key) {
                map.insert(key.to_string(), value);
            }
        }
        map
    }
}

fn expect_float(key: &str, value: &OptionValue) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        ArticleError::Config(format!("Option '{}' expects a number, got '{}'", key, value))
    })
}

fn expect_int(key: &str, value: &OptionValue) -> Result<i64> {
    value.as_i64().ok_or_else(|| {
        ArticleError::Config(format!("Option '{}' expects an integer, got '{}'", key, value))
    })
}
