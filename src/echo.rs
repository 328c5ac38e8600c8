use serde_json::json;

use crate::controller::Controller;
use crate::error::ActionResult;

/// Fallback action for manifest-declared actions with no library body:
/// echoes the routing result back as JSON.
pub fn echo_action(c: &mut Controller) -> ActionResult {
    let body = json!({
        "controller": c.name(),
        "action": c.action(),
        "method": c.request.method.to_string(),
        "path": c.request.path,
        "format": c.format(),
        "params": c.params.to_json(),
    });
    c.response.set_header("Content-Type", "application/json");
    c.response.set_body([body.to_string()]);
    Ok(())
}
