//! Message texts sent through the gateway. Both the gateway client and the
//! delivery log use these, so the logged body always matches what was sent.

/// Position message for a waiting party.
pub fn waiting_message(client_name: &str, equipment_type: &str, ahead_count: i64) -> String {
    match ahead_count {
        0 => format!(
            "Hi {}, your {} is next in line — we will start on it shortly.",
            client_name, equipment_type
        ),
        1 => format!(
            "Hi {}, your {} is in the queue with 1 request ahead of it.",
            client_name, equipment_type
        ),
        n => format!(
            "Hi {}, your {} is in the queue with {} requests ahead of it.",
            client_name, equipment_type, n
        ),
    }
}

/// Intake-started message for the opened item's party.
pub fn opened_message(client_name: &str, equipment_description: &str) -> String {
    format!(
        "Hi {}, we have started work on your equipment: {}.",
        client_name, equipment_description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_message_zero_ahead_says_next_in_line() {
        let msg = waiting_message("Ada", "laptop", 0);
        assert!(msg.contains("next in line"));
        assert!(msg.contains("Ada"));
    }

    #[test]
    fn waiting_message_singular_and_plural() {
        assert!(waiting_message("Ada", "laptop", 1).contains("1 request ahead"));
        assert!(waiting_message("Ada", "laptop", 3).contains("3 requests ahead"));
    }

    #[test]
    fn opened_message_includes_description() {
        let msg = opened_message("Grace", "laptop (broken hinge)");
        assert!(msg.contains("Grace"));
        assert!(msg.contains("laptop (broken hinge)"));
    }
}
