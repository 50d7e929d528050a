//! Rule evaluation: picks the rule that handles an inbound message.

pub mod matcher;

pub use matcher::{SenderInfo, addressed_to_me, match_all, match_rule, rule_matches};
