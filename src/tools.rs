//! In-band tool calls issued by the model

use crate::link::protocol::{FunctionCall, FunctionDeclaration, FunctionResponse, ToolResult};
use crate::Result;
use serde_json::json;
use tracing::{debug, warn};

pub const VISUAL_FEED_TOOL: &str = "update_visual_feed";

pub const VISUAL_FEED_ACK: &str = "Visual feed updated successfully.";

/// Declaration of the visual feed tool, advertised at session setup
pub fn visual_feed_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: VISUAL_FEED_TOOL.to_string(),
        description: "Generates and displays an image of a dinosaur or prehistoric scene on the main dashboard.".to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "description": {
                    "type": "STRING",
                    "description": "Detailed visual description of the dinosaur, environment, and action. E.g. 'A T-Rex roaring in the rain next to a jeep'."
                }
            },
            "required": ["description"]
        }),
    }
}

/// Routes tool calls to their handlers and builds the acknowledgments
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolDispatcher;

impl ToolDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        vec![visual_feed_declaration()]
    }

    /// Handle a batch of calls.
    ///
    /// Every recognized call is acknowledged whether or not its handler
    /// succeeded. Unknown tools get no response.
    pub fn dispatch<F>(&self, calls: &[FunctionCall], mut on_visual: F) -> Vec<FunctionResponse>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let mut responses = Vec::with_capacity(calls.len());

        for call in calls {
            if call.name != VISUAL_FEED_TOOL {
                warn!("Ignoring unknown tool call: {} ({})", call.name, call.id);
                continue;
            }

            match call.args.get("description").and_then(|d| d.as_str()) {
                Some(description) if !description.is_empty() => {
                    debug!("Visual feed requested: {}", description);
                    if let Err(e) = on_visual(description) {
                        warn!("Visual feed handler failed: {}", e);
                    }
                }
                _ => warn!("Visual feed call {} has no description", call.id),
            }

            responses.push(FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: ToolResult {
                    result: VISUAL_FEED_ACK.to_string(),
                },
            });
        }

        responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParklinkError;
    use serde_json::Value;

    fn call(id: &str, name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    #[test]
    fn test_visual_call_forwarded_and_acked() {
        let mut seen = Vec::new();
        let responses = ToolDispatcher::new().dispatch(
            &[call("a1", VISUAL_FEED_TOOL, json!({"description": "A T-Rex"}))],
            |d| {
                seen.push(d.to_string());
                Ok(())
            },
        );

        assert_eq!(seen, vec!["A T-Rex"]);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, "a1");
        assert_eq!(responses[0].response.result, VISUAL_FEED_ACK);
    }

    #[test]
    fn test_handler_failure_still_acked() {
        let responses = ToolDispatcher::new().dispatch(
            &[call("a1", VISUAL_FEED_TOOL, json!({"description": "Raptors"}))],
            |_| Err(ParklinkError::ChannelError("receiver gone".into())),
        );
        assert_eq!(responses.len(), 1);
    }

    #[test]
    fn test_missing_description_acked_without_forwarding() {
        let mut forwarded = 0;
        let responses = ToolDispatcher::new().dispatch(
            &[
                call("a1", VISUAL_FEED_TOOL, json!({})),
                call("a2", VISUAL_FEED_TOOL, json!({"description": ""})),
                call("a3", VISUAL_FEED_TOOL, json!({"description": 42})),
            ],
            |_| {
                forwarded += 1;
                Ok(())
            },
        );
        assert_eq!(forwarded, 0);
        assert_eq!(responses.len(), 3);
    }

    #[test]
    fn test_whitespace_description_is_forwarded() {
        let mut seen = Vec::new();
        let responses = ToolDispatcher::new().dispatch(
            &[call("a1", VISUAL_FEED_TOOL, json!({"description": "   "}))],
            |d| {
                seen.push(d.to_string());
                Ok(())
            },
        );
        assert_eq!(seen, vec!["   "]);
        assert_eq!(responses.len(), 1);
    }

    #[test]
    fn test_unknown_tools_ignored() {
        let responses = ToolDispatcher::new().dispatch(
            &[
                call("x", "open_gate", json!({"gate": 7})),
                call("a1", VISUAL_FEED_TOOL, json!({"description": "Gallimimus herd"})),
            ],
            |_| Ok(()),
        );
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, "a1");
    }
}
