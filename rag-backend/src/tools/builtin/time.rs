//! Clock tools: current time and date in a requested timezone.

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct TimezoneParams {
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn timezone_schema() -> ToolInputSchema {
    let mut properties = HashMap::new();
    properties.insert(
        "timezone".to_string(),
        PropertySchema {
            schema_type: "string".to_string(),
            description: "The timezone to get time/date for, e.g. 'Europe/Paris'".to_string(),
        },
    );
    ToolInputSchema {
        schema_type: "object".to_string(),
        properties,
        // timezone defaults to UTC when omitted
        required: vec![],
    }
}

fn parse_timezone(params: Value) -> Result<Tz, String> {
    let params: TimezoneParams =
        serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
    params
        .timezone
        .parse::<Tz>()
        .map_err(|_| format!("Unknown timezone '{}'", params.timezone))
}

/// Current wall-clock time in a timezone
pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_time".to_string(),
            description: "Get the current time in a specific timezone".to_string(),
            input_schema: timezone_schema(),
        }
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        match parse_timezone(params) {
            Ok(tz) => {
                let now = Utc::now().with_timezone(&tz);
                ToolResult::success(now.format("%I:%M %p %Z").to_string())
            }
            Err(e) => ToolResult::error(e),
        }
    }
}

/// Current calendar date in a timezone
pub struct GetDateTool;

#[async_trait]
impl Tool for GetDateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_date".to_string(),
            description: "Get the current date in a specific timezone".to_string(),
            input_schema: timezone_schema(),
        }
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        match parse_timezone(params) {
            Ok(tz) => {
                let now = Utc::now().with_timezone(&tz);
                ToolResult::success(now.format("%B %d, %Y").to_string())
            }
            Err(e) => ToolResult::error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_time_defaults_to_utc() {
        let result = GetTimeTool
            .execute(json!({}), &ToolContext::default())
            .await;
        assert!(result.success);
        assert!(result.output.contains("UTC"));
    }

    #[tokio::test]
    async fn test_get_date_known_timezone() {
        let result = GetDateTool
            .execute(json!({"timezone": "America/New_York"}), &ToolContext::default())
            .await;
        assert!(result.success);
        // "%B %d, %Y" always produces a comma-separated year
        assert!(result.output.contains(", 2"));
    }

    #[tokio::test]
    async fn test_unknown_timezone_is_an_error_result() {
        let result = GetTimeTool
            .execute(json!({"timezone": "Mars/Olympus"}), &ToolContext::default())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Mars/Olympus"));
    }
}
