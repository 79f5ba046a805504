use serde::{Deserialize, Serialize};

/// Authentication options for outbound HTTP calls (api and webhook nodes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authentication {
  Bearer {
    token: String,
  },
  Basic {
    username: String,
    password: String,
  },
  ApiKey {
    #[serde(default = "default_api_key_header")]
    header_name: String,
    api_key: String,
  },
}

fn default_api_key_header() -> String {
  "X-API-Key".to_string()
}
