use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Plain-text rendering of a stored cell; strings lose their JSON quotes.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::cell_text;

    #[test]
    fn renders_cells_without_quotes() {
        assert_eq!(cell_text(Some(&json!("BV1"))), "BV1");
        assert_eq!(cell_text(Some(&json!(15.0))), "15.0");
        assert_eq!(cell_text(Some(&json!(7))), "7");
        assert_eq!(cell_text(Some(&json!(null))), "");
        assert_eq!(cell_text(None), "");
    }
}
