use lazyvpn_core::greeting::greeting_for;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::logging::log_info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

pub fn handle_greeting_event(event: &Value) -> ApiGatewayResponse {
    let request_id = event
        .pointer("/requestContext/requestId")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let name = event
        .pointer("/queryStringParameters/name")
        .and_then(Value::as_str);

    log_info(
        "greeting_handler",
        "greeting_served",
        json!({
            "request_id": request_id,
            "name_supplied": name.is_some_and(|value| !value.is_empty()),
        }),
    );

    ApiGatewayResponse {
        status_code: 200,
        headers: json!({"Content-Type": "text/plain"}),
        body: greeting_for(name),
    }
}
