//! Argument substitution.

use tracing::debug;

use crate::expand::{Expander, Step};
use crate::macros::MacroDef;
use crate::syntax::token::Token;

impl<'a> Expander<'a> {
    /// Replaces every parameter left by the prescan with its fully expanded
    /// argument. Each argument is rescanned on its own, at most once per call.
    pub fn substitute(
        &mut self,
        def: &MacroDef,
        prescanned: Vec<Token>,
        args: &[Vec<Token>],
    ) -> Step<Vec<Token>> {
        let mut expanded: Vec<Option<Vec<Token>>> = vec![None; args.len()];
        let mut out = Vec::with_capacity(prescanned.len());

        for token in prescanned {
            let Token::Param(n) = token else {
                out.push(token);
                continue;
            };
            let Some(slot) = expanded.get_mut(n) else {
                continue;
            };
            if slot.is_none() {
                let raw = args.get(n).cloned().unwrap_or_default();
                *slot = Some(self.rescan(None, raw)?);
            }
            if let Some(tokens) = slot {
                out.extend(tokens.iter().cloned());
            }
        }
        debug!(name = %def.name, tokens = out.len(), "substitute");
        Ok(out)
    }
}
