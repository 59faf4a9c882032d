//! Render-time variable scopes and control flags.
//!
//! [`Context`] is a stack of [`Frame`]s. The bottom frame is the global
//! frame seeded with the render data; a file-scope frame is pushed for the
//! top-level template and for each `include`, and control-block frames are
//! pushed for `for` bodies and `capture` blocks. [`Scope`] ties a frame's
//! lifetime to a Rust scope so it is popped on every exit path.

use std::ops::{BitOr, Deref, DerefMut};

use liquid_rs_core::error::LiquidError;

use crate::value::{Object, Value};

/// The kind of a scope frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The bottom frame, holding the render data.
    Global,
    /// One per template being rendered (top-level or included).
    FileScope,
    /// A `for` body or `capture` block.
    ControlBlock,
}

/// One level of the variable-binding stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: ScopeKind,
    pub bindings: Object,
}

/// The break/continue/eject/discard signal register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub const NONE: Self = Self(0);
    pub const BREAK: Self = Self(1);
    pub const CONTINUE: Self = Self(2);
    pub const EJECT: Self = Self(4);
    /// Eject plus "clear the output".
    pub const DISCARD: Self = Self(4 | 8);

    /// Returns `true` if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any bit of `other` is set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The scope stack plus the flag register of one render call.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::context::{Context, ScopeKind};
/// use liquid_rs_template::value::Value;
///
/// let mut ctx = Context::new();
/// ctx.push(ScopeKind::Global);
/// ctx.set("name", Value::from("outer")).unwrap();
///
/// ctx.push(ScopeKind::ControlBlock);
/// ctx.set("name", Value::from("inner")).unwrap();
/// assert_eq!(ctx.lookup("name"), Some(&Value::from("inner")));
///
/// ctx.pop();
/// assert_eq!(ctx.lookup("name"), Some(&Value::from("outer")));
/// ```
#[derive(Debug, Default)]
pub struct Context {
    frames: Vec<Frame>,
    flags: Flags,
}

impl Context {
    /// Creates an empty context with no frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an empty frame.
    pub fn push(&mut self, kind: ScopeKind) {
        self.push_with(kind, Object::new());
    }

    /// Pushes a frame holding `bindings`.
    pub fn push_with(&mut self, kind: ScopeKind, bindings: Object) {
        self.frames.push(Frame { kind, bindings });
    }

    /// Pops the top frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drops every frame above the first `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    /// Looks a name up from the innermost frame outward.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.bindings.get(name))
    }

    /// Binds `name` in the top frame.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<(), LiquidError> {
        let frame = self.frames.last_mut().ok_or(LiquidError::NoActiveScope)?;
        frame.bindings.insert(name.into(), value);
        Ok(())
    }

    fn file_scope_index(&self, skip: usize) -> Option<usize> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, f)| f.kind == ScopeKind::FileScope)
            .nth(skip)
            .map(|(i, _)| i)
    }

    /// The innermost file scope.
    pub fn current_file_scope_mut(&mut self) -> Result<&mut Object, LiquidError> {
        let index = self.file_scope_index(0).ok_or(LiquidError::NoActiveScope)?;
        Ok(&mut self.frames[index].bindings)
    }

    /// Returns `true` when an including template's file scope exists.
    pub fn has_parent_file_scope(&self) -> bool {
        self.file_scope_index(1).is_some()
    }

    /// The file scope of the template that included the current one.
    pub fn parent_file_scope_mut(&mut self) -> Result<&mut Object, LiquidError> {
        let index = self.file_scope_index(1).ok_or(LiquidError::NoActiveScope)?;
        Ok(&mut self.frames[index].bindings)
    }

    /// The global frame.
    pub fn global_mut(&mut self) -> Result<&mut Object, LiquidError> {
        match self.frames.first_mut() {
            Some(frame) if frame.kind == ScopeKind::Global => Ok(&mut frame.bindings),
            _ => Err(LiquidError::NoActiveScope),
        }
    }

    /// Read access to the global frame.
    pub fn globals(&self) -> Option<&Object> {
        self.frames
            .first()
            .filter(|f| f.kind == ScopeKind::Global)
            .map(|f| &f.bindings)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// ORs `flag` into the register.
    pub fn raise(&mut self, flag: Flags) {
        self.flags = self.flags | flag;
    }

    pub fn clear_flags(&mut self) {
        self.flags = Flags::NONE;
    }

    /// Drops every frame and clears the flags.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.flags = Flags::NONE;
    }
}

impl AsMut<Self> for Context {
    fn as_mut(&mut self) -> &mut Self {
        self
    }
}

/// A pushed frame that is popped again when the guard is dropped.
///
/// The guard dereferences to whatever owns the context, so rendering can
/// continue through it while the frame is live.
pub struct Scope<'a, T: AsMut<Context>> {
    owner: &'a mut T,
}

impl<'a, T: AsMut<Context>> Scope<'a, T> {
    /// Pushes an empty frame of `kind` onto `owner`'s context.
    pub fn enter(owner: &'a mut T, kind: ScopeKind) -> Self {
        owner.as_mut().push(kind);
        Self { owner }
    }
}

impl<T: AsMut<Context>> Drop for Scope<'_, T> {
    fn drop(&mut self) {
        self.owner.as_mut().pop();
    }
}

impl<T: AsMut<Context>> Deref for Scope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.owner
    }
}

impl<T: AsMut<Context>> DerefMut for Scope<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.owner
    }
}
