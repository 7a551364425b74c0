use std::collections::HashMap;

use tracing::warn;

use crate::types::token::TokenRecord;

/// Merge two token lists of the same chain, deduplicating by lowercased
/// address.
///
/// `primary` wins every factual field (name, symbol, decimals, logo). A
/// duplicate from `secondary` only contributes its provenance tags. The
/// output is `primary` in order followed by the unmatched `secondary`
/// records in order.
pub fn merge_tokens(primary: Vec<TokenRecord>, secondary: Vec<TokenRecord>) -> Vec<TokenRecord> {
    if secondary.is_empty() {
        return primary;
    }

    let mut tokens = Vec::with_capacity(primary.len() + secondary.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for token in primary {
        seen.entry(token.key()).or_insert(tokens.len());
        tokens.push(token);
    }

    for token in secondary {
        if token.address.trim().is_empty() {
            warn!(
                symbol = %token.symbol,
                name = %token.name,
                sources = ?token.sources(),
                "dropping token without address"
            );
            continue;
        }

        match seen.get(&token.key()) {
            Some(&idx) => {
                let existing = &mut tokens[idx];
                existing
                    .extensions
                    .add_sources(token.extensions.source.iter().map(String::as_str));
            }
            None => {
                seen.insert(token.key(), tokens.len());
                tokens.push(token);
            }
        }
    }

    tokens
}
