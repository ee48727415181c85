//! Database exception translation.
//!
//! Turns driver-level constraint violations into field-attributable
//! [`ValidationErrors`]. Anything a translator does not recognise is left
//! for the caller to propagate untouched.

mod mysql;
mod postgres;

use std::error::Error;

use crate::validation::ValidationErrors;

pub use self::mysql::MysqlTranslator;
pub use self::postgres::PostgresTranslator;

pub trait ExceptionTranslator: Send + Sync {
    /// Field errors for a recognised violation anywhere in the cause chain.
    fn translate(&self, error: &(dyn Error + 'static)) -> Option<ValidationErrors>;
}

/// The error and its causes, outermost first.
///
/// Stops at the first cause already seen, so self-referential chains end.
pub fn cause_chain<'a>(error: &'a (dyn Error + 'static)) -> Vec<&'a (dyn Error + 'static)> {
    let mut chain = vec![error];
    let mut current = error;
    while let Some(next) = current.source() {
        if chain.iter().any(|seen| std::ptr::addr_eq(*seen, next)) {
            break;
        }
        chain.push(next);
        current = next;
    }
    chain
}

/// Text between `prefix` and the next `'`.
fn quoted_after<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    let start = message.find(prefix)? + prefix.len();
    let rest = &message[start..];
    rest.find('\'').map(|end| &rest[..end])
}


#[cfg(test)]
mod tests {
    use super::testing::{Looping, Wrapped};
    use super::*;

    #[test]
    fn test_cause_chain_order() {
        let err = Wrapped::around("outer", Wrapped::around("middle", Wrapped::leaf("inner")));
        let messages: Vec<String> = cause_chain(&err).iter().map(|e| e.to_string()).collect();
        assert_eq!(messages, vec!["outer", "middle", "inner"]);
    }

    #[test]
    fn test_cause_chain_stops_on_self_reference() {
        assert_eq!(cause_chain(&Looping).len(), 1);
    }

    #[test]
    fn test_quoted_after() {
        assert_eq!(quoted_after("for key 'PRIMARY' x", "for key '"), Some("PRIMARY"));
        assert_eq!(quoted_after("for key 'PRIMARY", "for key '"), None);
        assert_eq!(quoted_after("nothing", "for key '"), None);
    }
}
