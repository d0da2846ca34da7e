use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAction {
    #[default]
    Setup,
    Teardown,
}

/// Body the contract verifier posts before replaying an interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStateRequest {
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(default)]
    pub action: StateAction,
}
