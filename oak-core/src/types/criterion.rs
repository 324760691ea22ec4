use crate::types::RuntimeExpression;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownCriterionType {
    Simple,
    Regex,
    Jsonpath,
    Xpath,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionExpressionLanguage {
    Jsonpath,
    Xpath,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum CriterionType {
    Known(KnownCriterionType),
    Custom {
        r#type: CriterionExpressionLanguage,
        version: String,
    },
}

impl CriterionType {
    pub fn kind(&self) -> KnownCriterionType {
        match self {
            CriterionType::Known(k) => k.clone(),
            CriterionType::Custom { r#type: CriterionExpressionLanguage::Jsonpath, .. } => {
                KnownCriterionType::Jsonpath
            }
            CriterionType::Custom { r#type: CriterionExpressionLanguage::Xpath, .. } => {
                KnownCriterionType::Xpath
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Criterion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RuntimeExpression>,

    pub condition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<CriterionType>,
}

impl Criterion {
    pub fn simple(condition: impl Into<String>) -> Self {
        Self {
            context: None,
            condition: condition.into(),
            r#type: None,
        }
    }
}
