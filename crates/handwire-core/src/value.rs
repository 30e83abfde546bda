//! Typed values stored in the per-request [`Registry`](crate::Registry).
//!
//! Every value flowing through a chain is paired with a [`TypeDescriptor`]
//! that identifies what it was published as. Descriptors come from
//! [`TypeId`] so they are computed at compile time; no runtime reflection
//! is involved.
//!
//! Plain domain types opt in by implementing [`Injectable`]:
//!
//! ```rust,ignore
//! #[derive(Clone)]
//! struct User { id: u64 }
//!
//! impl Injectable for User {}
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A type-erased, shareable value as stored in the registry.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// How a descriptor participates in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A concrete type, looked up by exact identity and constructible.
    Concrete,
    /// A capability set (trait object) satisfied by granted concrete types.
    Capability,
    /// The "any" sentinel: resolves to the response slot.
    Any,
    /// The distinguished error type, [`Failure`](crate::Failure).
    Error,
}

/// Identifies the declared type of a handler parameter or output.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
    optional: bool,
}

impl TypeDescriptor {
    /// Descriptor for a concrete type.
    pub fn concrete<T: ?Sized + 'static>() -> Self {
        Self::with_kind::<T>(TypeKind::Concrete)
    }

    /// Descriptor for a capability set such as `dyn Greeter`.
    pub fn capability<C: ?Sized + 'static>() -> Self {
        Self::with_kind::<C>(TypeKind::Capability)
    }

    pub(crate) fn with_kind<T: ?Sized + 'static>(kind: TypeKind) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind,
            optional: false,
        }
    }

    /// Marks the descriptor as optional: it is looked up but never constructed.
    pub fn into_optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The [`TypeId`] this descriptor stands for.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human readable type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_any(&self) -> bool {
        self.kind == TypeKind::Any
    }

    pub fn is_error(&self) -> bool {
        self.kind == TypeKind::Error
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "Option<{}> ({:?})", self.name, self.kind)
        } else {
            write!(f, "{} ({:?})", self.name, self.kind)
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An immutable `(descriptor, value)` pair.
#[derive(Clone)]
pub struct TypedValue {
    descriptor: TypeDescriptor,
    value: AnyValue,
}

impl TypedValue {
    /// Wraps an already erased value. The caller guarantees that `value`
    /// matches `descriptor`.
    pub fn new(descriptor: TypeDescriptor, value: AnyValue) -> Self {
        Self { descriptor, value }
    }

    /// Erases `value`, or returns `None` when it is nil or empty.
    pub fn of<T: Injectable>(value: T) -> Option<Self> {
        if value.is_nil() {
            return None;
        }
        Some(Self::new(T::descriptor(), Arc::new(value)))
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn value(&self) -> &AnyValue {
        &self.value
    }

    /// The concrete runtime type of the stored value.
    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    pub fn into_value(self) -> AnyValue {
        self.value
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedValue")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// A value that can live in the registry under its own concrete type.
///
/// Implement it for any `Clone + Send + Sync` domain type; the defaults
/// describe a plain concrete value that is never considered empty.
pub trait Injectable: Clone + Send + Sync + 'static {
    /// The descriptor this type is published and looked up under.
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::concrete::<Self>()
    }

    /// Nil and empty values are dropped instead of published.
    fn is_nil(&self) -> bool {
        false
    }
}

macro_rules! impl_injectable {
    ($($ty:ty),* $(,)?) => {
        $( impl Injectable for $ty {} )*
    };
}

impl_injectable!(
    String,
    &'static str,
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    std::time::Duration,
    std::time::SystemTime,
    std::path::PathBuf,
);

impl<T: Injectable> Injectable for Vec<T> {
    fn is_nil(&self) -> bool {
        self.is_empty()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Injectable for Arc<T> {}

impl<K, V> Injectable for HashMap<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn is_nil(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Injectable for BTreeMap<K, V>
where
    K: Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn is_nil(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Injectable for HashSet<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn is_nil(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Injectable for BTreeSet<T>
where
    T: Clone + Ord + Send + Sync + 'static,
{
    fn is_nil(&self) -> bool {
        self.is_empty()
    }
}
