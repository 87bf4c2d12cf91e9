use super::Locale;
use crate::schema::SchemaNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A question or answer choice of a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyChoice {
    pub label: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyAnswer {
    pub value: Value,
    pub label: String,
    pub checked: bool,
}

/// One row of the response grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub question_value: Value,
    pub question_label: String,
    pub values: Vec<SurveyAnswer>,
}

/// Survey-specific configuration: questions × values.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveySpec {
    pub questions: Vec<SurveyChoice>,
    pub values: Vec<SurveyChoice>,
    pub default_value: Value,
}

impl SurveySpec {
    pub fn from_node(node: &SchemaNode) -> Self {
        Self {
            questions: node.questions.iter().filter_map(parse_choice).collect(),
            values: node.values.iter().filter_map(parse_choice).collect(),
            default_value: node.default_value.clone().unwrap_or_else(|| Value::from("")),
        }
    }

    /// Answer labels, translated.
    pub fn values_labels(&self, locale: &Locale) -> Vec<String> {
        self.values.iter().map(|v| locale.translate(&v.label)).collect()
    }

    /// Builds the response grid. `answers` maps question values to the chosen
    /// answer value; a candidate is checked when it equals that answer.
    pub fn grid(&self, answers: &Value, locale: &Locale) -> Vec<SurveyQuestion> {
        self.questions
            .iter()
            .map(|question| {
                let answer = answers.get(choice_key(&question.value));
                let values = self
                    .values
                    .iter()
                    .map(|candidate| SurveyAnswer {
                        value: candidate.value.clone(),
                        label: locale.translate(&candidate.label),
                        checked: answer.is_some_and(|a| a == &candidate.value),
                    })
                    .collect();
                SurveyQuestion {
                    question_value: question.value.clone(),
                    question_label: locale.translate(&question.label),
                    values,
                }
            })
            .collect()
    }
}

fn parse_choice(item: &Value) -> Option<SurveyChoice> {
    Some(SurveyChoice {
        label: item
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        value: item.get("value")?.clone(),
    })
}

fn choice_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
