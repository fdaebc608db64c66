//! Parsing of the reasoning service's capability selection

use crate::capabilities::CapabilityRegistry;
use crate::error::CoordinatorError;
use crate::models::CapabilityKind;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SELECTION_TOKEN: Regex = Regex::new(r"[A-Za-z0-9_]+").unwrap();
}

/// Resolve a selection response to capability ids in response order.
///
/// Tokens are literal ids (any case) or 0-based registry positions; other
/// words are ignored. An out-of-range position, or a response naming no
/// invocable capability, is a parse error.
pub fn parse_selection(response: &str, registry: &CapabilityRegistry) -> Result<Vec<String>> {
    let cleaned = response.replace("```", " ");
    let mut selected: Vec<String> = Vec::new();

    for token in SELECTION_TOKEN.find_iter(&cleaned).map(|m| m.as_str()) {
        let capability = if let Ok(position) = token.parse::<usize>() {
            match registry.get_by_position(position) {
                Some(c) => c,
                None => {
                    return Err(CoordinatorError::RoutingParseError(format!(
                        "index {} out of range (0..{})",
                        position,
                        registry.len()
                    )))
                }
            }
        } else {
            match registry.get_ignore_case(token) {
                Some(c) => c,
                None => continue,
            }
        };

        if capability.kind() == CapabilityKind::Transform {
            continue;
        }

        let id = capability.id().to_string();
        if !selected.contains(&id) {
            selected.push(id);
        }
    }

    if selected.is_empty() {
        return Err(CoordinatorError::RoutingParseError(format!(
            "no capability recognized in {:?}",
            response.trim()
        )));
    }

    Ok(selected)
}
