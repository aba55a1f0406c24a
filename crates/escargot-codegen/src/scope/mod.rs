//! Identifier resolution and scope tracking.

pub mod identifier;

pub use identifier::{IdentifierResolution, TdzState};

use rustc_hash::FxHashMap;

use crate::ast::SourceIndex;
use crate::error::{CompileError, CompileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Param,
    FunctionName,
    CatchParam,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub resolution: IdentifierResolution,
    pub tdz: TdzState,
    pub declared_at: SourceIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Block,
    CatchParam,
    With,
}

/// One lexical scope: a function body, a block, a catch clause's parameter
/// scope, or a `with` object scope. Scopes nest; `ScopeStack` below owns
/// the nesting.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    bindings: FxHashMap<String, Binding>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self { kind, bindings: FxHashMap::default() }
    }

    pub fn declare(&mut self, name: &str, binding: Binding) -> CompileResult<()> {
        if let Some(existing) = self.bindings.get(name) {
            if existing.kind == BindingKind::Param && binding.kind == BindingKind::Param {
                return Err(CompileError::DuplicateParameterName {
                    name: name.to_string(),
                    at: binding.declared_at,
                });
            }
            let redeclarable = existing.kind == BindingKind::Var && binding.kind == BindingKind::Var;
            if !redeclarable {
                return Err(CompileError::DuplicateLexicalDeclaration {
                    name: name.to_string(),
                    at: binding.declared_at,
                });
            }
        }
        self.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }
}

/// A stack of nested [`Scope`]s for one function body, resolving a name by
/// walking outward until it's found or falling back to dynamic/global
/// lookup (stack-slot / heap-index / global-slot / dynamic
/// sum type).
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
    /// True once any enclosing scope is a `with` object scope — once set,
    /// every name lookup must fall back to dynamic-by-name resolution,
    /// since a `with` object can shadow any binding at runtime
    /// (see DESIGN.md: tail-call + `with` interaction).
    has_dynamic_scope: bool,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ScopeKind) {
        if kind == ScopeKind::With {
            self.has_dynamic_scope = true;
        }
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop(&mut self) -> Scope {
        self.scopes.pop().expect("scope stack underflow: more pops than pushes")
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("no active scope")
    }

    pub fn declare(&mut self, name: &str, kind: BindingKind, resolution: IdentifierResolution, at: SourceIndex) -> CompileResult<()> {
        let tdz = match kind {
            BindingKind::Let | BindingKind::Const | BindingKind::CatchParam => TdzState::InTdz,
            _ => TdzState::Initialized,
        };
        self.current_mut().declare(name, Binding { kind, resolution, tdz, declared_at: at })
    }

    /// Marks a `let`/`const` binding as having executed its initializer,
    /// leaving the temporal dead zone.
    pub fn initialize(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.get_mut(name) {
                binding.tdz = TdzState::Initialized;
                return;
            }
        }
    }

    /// Resolves `name` against the active scope chain, innermost first.
    /// Returns `Dynamic` if a `with` scope is active above the nearest
    /// static binding (since a `with` object can shadow it at runtime) or
    /// if no scope has a static binding at all.
    pub fn resolve(&self, name: &str) -> IdentifierResolution {
        for scope in self.scopes.iter().rev() {
            if scope.kind == ScopeKind::With {
                return IdentifierResolution::Dynamic;
            }
            if let Some(binding) = scope.get(name) {
                return binding.resolution;
            }
        }
        if self.has_dynamic_scope {
            IdentifierResolution::Dynamic
        } else {
            IdentifierResolution::Global
        }
    }

    pub fn tdz_state(&self, name: &str) -> Option<TdzState> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(name) {
                return Some(binding.tdz);
            }
        }
        None
    }

    pub fn binding_kind(&self, name: &str) -> Option<BindingKind> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(name) {
                return Some(binding.kind);
            }
        }
        None
    }

    /// Number of scopes currently pushed. Used to tell a program's
    /// outermost `Function` scope (depth 1) apart from a nested block,
    /// which must never resolve a fresh declaration as `Global`.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

/// Tracks, per function, which parameter names have finished initializing
/// so a later default-argument expression referencing an as-yet
/// uninitialized parameter is rejected at compile time.
#[derive(Debug, Default)]
pub struct ParamInitState {
    initialized: Vec<String>,
}

impl ParamInitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_initialized(&mut self, name: &str) {
        self.initialized.push(name.to_string());
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.initialized.iter().any(|n| n == name)
    }

    pub fn check_reference(&self, name: &str, at: SourceIndex) -> CompileResult<()> {
        if self.is_initialized(name) {
            Ok(())
        } else {
            Err(CompileError::DefaultArgumentForwardReference { name: name.to_string(), at })
        }
    }
}

/// Register file slot reserved for the per-function register-cache mapping
/// between a numeral value and the register it's preloaded into.
pub type NumeralCacheKey = u64;

pub fn numeral_cache_key(value: f64) -> NumeralCacheKey {
    value.to_bits()
}
