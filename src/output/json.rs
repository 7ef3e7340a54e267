//! JSON output formatting

use serde_json::{json, Value};

use crate::output::formatter::Report;

pub fn format_json(report: &Report) -> String {
    let data: Value = match report {
        Report::List(containers) => json!({ "containers": containers }),
        Report::Container(report) => serde_json::to_value(report).unwrap_or(json!(null)),
        Report::Message(message) => json!({ "message": message }),
    };

    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::ContainerSummary;

    #[test]
    fn test_list_json() {
        let report = Report::List(vec![ContainerSummary {
            id: "a".to_string(),
            name: "A".to_string(),
            backend: "lxc".to_string(),
            distro: "bionic".to_string(),
            install_status: "new".to_string(),
            is_default: true,
        }]);
        let value: Value = serde_json::from_str(&format_json(&report)).unwrap();
        assert_eq!(value["containers"][0]["type"], "lxc");
        assert_eq!(value["containers"][0]["is_default"], true);
    }

    #[test]
    fn test_message_json() {
        let value: Value =
            serde_json::from_str(&format_json(&Report::Message("done".to_string()))).unwrap();
        assert_eq!(value, json!({"message": "done"}));
    }
}
