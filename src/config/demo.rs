use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Data and limits for the demo endpoints.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct DemoConfig {
    /// Upper cap for `/api/slow?delay=`.
    #[serde(default = "default_max_slow_delay_secs")]
    pub max_slow_delay_secs: f64,
    #[serde(default = "default_users")]
    pub users: Vec<User>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            max_slow_delay_secs: default_max_slow_delay_secs(),
            users: default_users(),
        }
    }
}

fn default_max_slow_delay_secs() -> f64 {
    5.0
}

fn default_users() -> Vec<User> {
    vec![
        User::new(1, "Alice", "alice@example.com"),
        User::new(2, "Bob", "bob@example.com"),
    ]
}
