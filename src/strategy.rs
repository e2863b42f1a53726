//! The `Strategy` interface (§3, §4.6) and the default split-marker policy.
//!
//! The concrete "which calls are split points" policy is, per §1, an
//! external collaborator's decision — the core only consumes a pluggable
//! interface for it. [`NameResolver`] stands in for the reference
//! implementation's `inspect`-based scope lookup (§9 "Dynamic name
//! resolution"): a predicate over a callee's canonical identifier, built
//! once per compilation from whatever symbol table the embedder maintains.

use blake2::Blake2bVar;
use blake2::digest::{Update, VariableOutput};

use crate::ast::{self, Constant, Expr, ExprKind, Ident, Stmt};
use crate::splitter::SplitState;

/// Substitute for the reference implementation's `locals`/`globals`
/// introspection: answers whether a callee name is a split marker.
pub trait NameResolver {
    fn is_continuator(&self, name: &str) -> bool;
}

/// A resolver built from a fixed set of marker names, the common case for
/// an embedder that registers its continuator functions up front.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    markers: std::collections::HashSet<String>,
}

impl StaticResolver {
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        StaticResolver { markers: markers.into_iter().map(Into::into).collect() }
    }
}

impl NameResolver for StaticResolver {
    fn is_continuator(&self, name: &str) -> bool {
        self.markers.contains(name)
    }
}

/// Polymorphic over the four operations §3 lists (`wrap` is handled by
/// [`crate::splitter::compile`] directly, since in Rust the outer calling
/// convention is a concrete type — [`crate::value::CompiledFunction`] —
/// rather than something a trait method constructs).
pub trait Strategy {
    /// `is_split(node)` (§4.6): a `Call` whose callee resolves to a
    /// continuator, or any `Yield`.
    fn is_split(&self, focus: &Expr, resolver: &dyn NameResolver) -> bool {
        match &focus.kind {
            ExprKind::Yield(_) => true,
            ExprKind::Call(c) => match &c.func.kind {
                ExprKind::Name(name) => resolver.is_continuator(name),
                _ => false,
            },
            _ => false,
        }
    }

    /// Rebuilds a genuine split point's focus expression into the Expr
    /// that should be returned from the cut continuation — `__Suspend(...)`
    /// for a call, `__SuspendYield(...)` for a yield (§4.6). `cont` is
    /// already the lazy "make continuation" expression built by
    /// [`crate::splitter`]; this method never invokes it eagerly.
    fn transform(&self, focus: &Expr, cont: Expr) -> Expr;

    /// The tail used when the splitter itself synthesises a fallthrough
    /// (an `If`/`While` continuing past a point with no user split): call
    /// the continuation immediately with a dummy `None` (§4.5 "splits
    /// synthesised by the algorithm itself").
    fn default_tail(&self, cont: Expr) -> Expr {
        call_continuation_now(cont, Expr::constant(Constant::None))
    }

    /// Wraps a bare `Return(v)` so it honours the ambient return
    /// continuation (§4.5(2c)): `None` means "no external continuation was
    /// supplied, hand the value straight back"; `Some(k)` calls `k(v)`
    /// immediately, mirroring "eventually fed to k" (§6).
    fn return_continuation(&self, value: Expr, return_tail: &Expr) -> Expr {
        call_continuation_now(return_tail.clone(), value)
    }

    /// Stable continuation name (§4.5 "Name ="). `seed` is the pending
    /// assignment target or a fresh gensym; `body` is the fragment content,
    /// hashed alongside it for stability given identical input. Parameter
    /// order canonicalised per §9 to `(seed, body, ctx)`.
    fn identify(&self, seed: &str, body: &[Stmt], ctx: &SplitState) -> Ident;
}

/// Builds the Expr `__CallContinuation(cont, value)`: evaluated eagerly by
/// [`crate::eval`], never reified as a `Suspension`. Used both for
/// algorithmic fallthrough tails and for the ambient return continuation.
pub fn call_continuation_now(cont: Expr, value: Expr) -> Expr {
    ast::call(Expr::name("__CallContinuation"), vec![cont, value], vec![])
}

/// Builds the Expr `__MakeContinuation("name", live0, live1, ...)`: the lazy
/// closure-construction expression (§9 "Closures over live variables become
/// explicit structs"). Evaluating it does not run any continuation body; it
/// just captures the current values of `live_in` under `name`.
pub fn make_continuation_expr(name: &str, live_in: &[Ident]) -> Expr {
    let mut args = vec![Expr::constant(Constant::Str(name.to_owned()))];
    args.extend(live_in.iter().map(Expr::name));
    ast::call(Expr::name("__MakeContinuation"), args, vec![])
}

/// The default strategy described in §4.6.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStrategy;

impl Strategy for DefaultStrategy {
    fn transform(&self, focus: &Expr, cont: Expr) -> Expr {
        match &focus.kind {
            ExprKind::Yield(value) => {
                let value_expr = value.as_ref().map(|b| (**b).clone()).unwrap_or_else(|| Expr::constant(Constant::None));
                ast::call(Expr::name("__SuspendYield"), vec![value_expr, cont], vec![])
            }
            ExprKind::Call(c) => {
                let mut args = vec![(*c.func).clone()];
                args.extend(c.args.iter().cloned());
                let mut keywords = vec![("continuation".to_owned(), cont)];
                keywords.extend(c.keywords.iter().cloned());
                ast::call(Expr::name("__Suspend"), args, keywords)
            }
            _ => unreachable!("transform called on a non-split focus"),
        }
    }

    fn identify(&self, seed: &str, body: &[Stmt], ctx: &SplitState) -> Ident {
        let mut hasher = Blake2bVar::new(8).expect("8 is a valid blake2b output length");
        hasher.update(ctx.function_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(seed.as_bytes());
        hasher.update(b"\0");
        hasher.update(format!("{body:?}").as_bytes());
        let mut out = [0u8; 8];
        hasher.finalize_variable(&mut out).expect("8-byte buffer matches requested output length");
        format!("{}__{}", ctx.function_name, hex_encode(&out))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_resolver_matches_registered_markers() {
        let resolver = StaticResolver::new(["checkpoint"]);
        assert!(resolver.is_continuator("checkpoint"));
        assert!(!resolver.is_continuator("other"));
    }

    #[test]
    fn yield_is_always_a_split() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::default();
        let focus = Expr::new(ExprKind::Yield(None));
        assert!(strategy.is_split(&focus, &resolver));
    }

    #[test]
    fn call_to_non_marker_is_not_a_split() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let focus = ast::call(Expr::name("plain"), vec![], vec![]);
        assert!(!strategy.is_split(&focus, &resolver));
    }
}
