//! JSON wire format for [`super::Rule`]:
//! `{ "lhs", "p", "rhs", "p_lhs", "p_rhs" }`, reusing [`GraphJson`] for the
//! three graph components.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::json::{GraphJson, GraphJsonError};
use crate::graph::Graph;

use super::{Rule, RuleError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleJson {
    #[serde(default)]
    pub lhs: GraphJson,
    #[serde(default)]
    pub p: GraphJson,
    #[serde(default)]
    pub rhs: GraphJson,
    #[serde(default)]
    pub p_lhs: HashMap<String, String>,
    #[serde(default)]
    pub p_rhs: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleJsonError {
    #[error(transparent)]
    Graph(#[from] GraphJsonError),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl TryFrom<RuleJson> for Rule {
    type Error = RuleJsonError;

    fn try_from(raw: RuleJson) -> Result<Self, Self::Error> {
        let lhs = Graph::try_from(raw.lhs)?;
        let p = Graph::try_from(raw.p)?;
        let rhs = Graph::try_from(raw.rhs)?;
        Ok(Rule::new(lhs, p, rhs, raw.p_lhs, raw.p_rhs)?)
    }
}

impl From<&Rule> for RuleJson {
    fn from(rule: &Rule) -> Self {
        RuleJson {
            lhs: GraphJson::from(&rule.lhs),
            p: GraphJson::from(&rule.p),
            rhs: GraphJson::from(&rule.rhs),
            p_lhs: rule.p_lhs.clone(),
            p_rhs: rule.p_rhs.clone(),
        }
    }
}
