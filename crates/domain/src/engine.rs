//! Engine targets and `<target>.<model>` identifiers.
//!
//! The target prefix selects an adapter through the engine registry; the
//! remainder is passed to the adapter untouched (an OpenAI model name, or
//! `cx`/`es` for Dialogflow).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EngineTarget
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Closed set of supported engine targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineTarget {
    Openai,
    Deepseek,
    Groq,
    Mistral,
    Dialogflow,
}

impl EngineTarget {
    pub const ALL: [EngineTarget; 5] = [
        EngineTarget::Openai,
        EngineTarget::Deepseek,
        EngineTarget::Groq,
        EngineTarget::Mistral,
        EngineTarget::Dialogflow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineTarget::Openai => "openai",
            EngineTarget::Deepseek => "deepseek",
            EngineTarget::Groq => "groq",
            EngineTarget::Mistral => "mistral",
            EngineTarget::Dialogflow => "dialogflow",
        }
    }

    /// Whether the target speaks the OpenAI chat-completions protocol.
    pub fn is_openai_compatible(self) -> bool {
        !matches!(self, EngineTarget::Dialogflow)
    }
}

impl fmt::Display for EngineTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EngineTarget::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unsupported engine target: {s}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EngineModel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A parsed `<target>.<model>` identifier, e.g. `openai.gpt-4o`.
///
/// Serialized as the original dotted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineModel {
    target: EngineTarget,
    model: String,
}

impl EngineModel {
    pub fn new(target: EngineTarget, model: impl Into<String>) -> Self {
        Self {
            target,
            model: model.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (target, model) = s
            .split_once('.')
            .ok_or_else(|| Error::Validation(format!("invalid engine model: {s:?}")))?;
        if model.is_empty() {
            return Err(Error::Validation(format!(
                "invalid engine model: {s:?} (empty model name)"
            )));
        }
        let target = target.parse::<EngineTarget>()?;
        Ok(Self {
            target,
            model: model.to_string(),
        })
    }

    pub fn target(&self) -> EngineTarget {
        self.target
    }

    /// Model name without the target prefix.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for EngineModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.model)
    }
}

impl FromStr for EngineModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EngineModel::parse(s)
    }
}

impl Serialize for EngineModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EngineModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EngineModel::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// `true` when `s` has the `<target>.<model>` shape and names a registered
/// target.
pub fn is_valid_engine_model(s: &str) -> bool {
    EngineModel::parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_engine_models() {
        assert!(is_valid_engine_model("openai.gpt-4o"));
        assert!(is_valid_engine_model("dialogflow.cx"));
        assert!(is_valid_engine_model("openai.gpt-4o-mini.2024"));
    }

    #[test]
    fn invalid_engine_models() {
        assert!(!is_valid_engine_model("invalid"));
        assert!(!is_valid_engine_model("unknown.model"));
        assert!(!is_valid_engine_model("openai."));
        assert!(!is_valid_engine_model(""));
    }

    #[test]
    fn model_keeps_everything_after_first_dot() {
        let m = EngineModel::parse("openai.gpt-4.1-mini").unwrap();
        assert_eq!(m.target(), EngineTarget::Openai);
        assert_eq!(m.model(), "gpt-4.1-mini");
        assert_eq!(m.to_string(), "openai.gpt-4.1-mini");
    }

    #[test]
    fn serde_uses_dotted_string() {
        let m = EngineModel::new(EngineTarget::Dialogflow, "es");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"dialogflow.es\"");
        let back: EngineModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert!(serde_json::from_str::<EngineModel>("\"nope\"").is_err());
    }

    #[test]
    fn dialogflow_is_not_openai_compatible() {
        assert!(!EngineTarget::Dialogflow.is_openai_compatible());
        assert!(EngineTarget::Groq.is_openai_compatible());
    }
}
