//! The consumed type-metadata interface.
//!
//! Everything the codecs need from the host database's type system goes
//! through [`TypeCatalog`]: category and layout lookup, array element
//! resolution, domain inspection, tuple descriptors for composites, and the
//! textual input/output conversion functions. The builtin in-memory
//! implementation lives in [`builtin`].

mod builtin;

pub use builtin::BuiltinCatalog;

use std::sync::Arc;

use crate::datum::Datum;
use crate::encoding::ServerEncoding;
use crate::error::BridgeResult;
use crate::oid::Oid;

/// pg_type typcategory, reduced to the classes the bridge distinguishes.
/// Only `Array` and `Composite` drive dispatch; the rest are carried for
/// diagnostics and preferred-type information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Array,
    Boolean,
    Composite,
    DateTime,
    Numeric,
    String,
    UserDefined,
    Pseudo,
    Unknown,
}

/// Physical length of a type's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeLen {
    Fixed(u16),
    Variable,
}

/// Storage alignment requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAlign {
    Char,
    Short,
    Int,
    Double,
}

/// Physical layout of a type: length, pass-by-value flag, alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeLayout {
    pub len: TypeLen,
    pub by_val: bool,
    pub align: TypeAlign,
}

impl TypeLayout {
    pub const fn fixed(len: u16, align: TypeAlign) -> TypeLayout {
        TypeLayout { len: TypeLen::Fixed(len), by_val: true, align }
    }

    pub const fn variable() -> TypeLayout {
        TypeLayout { len: TypeLen::Variable, by_val: false, align: TypeAlign::Int }
    }
}

/// One attribute of a composite type.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub type_oid: Oid,
    /// Dropped attributes keep their slot in the tuple but are skipped by
    /// the row codec.
    pub dropped: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_oid: Oid) -> Attribute {
        Attribute { name: name.into(), type_oid, dropped: false }
    }

    pub fn dropped(type_oid: Oid) -> Attribute {
        Attribute { name: String::new(), type_oid, dropped: true }
    }
}

/// Ordered attribute list of a composite type.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDescriptor {
    pub type_oid: Oid,
    pub typmod: i32,
    pub attrs: Vec<Attribute>,
}

/// A textual input conversion function: text in, datum out. Failures carry
/// the database's original message.
pub type InputFn = Arc<dyn Fn(&str) -> Result<Datum, String> + Send + Sync>;

/// A textual output conversion function: datum in, UTF-8 text out.
pub type OutputFn = Arc<dyn Fn(&Datum) -> Result<String, String> + Send + Sync>;

/// Type metadata provider. Implementations are expected to answer promptly
/// (metadata cache hits in steady state); the conversion layer memoizes
/// function handles and tuple descriptors per [`crate::ConversionContext`].
pub trait TypeCatalog {
    /// Category of the type plus its preferred-type flag.
    fn type_category(&self, oid: Oid) -> BridgeResult<(TypeCategory, bool)>;

    /// Physical layout of the type.
    fn type_layout(&self, oid: Oid) -> BridgeResult<TypeLayout>;

    /// The type's name as declared.
    fn type_name(&self, oid: Oid) -> BridgeResult<String>;

    /// Whether the type is a domain.
    fn is_domain(&self, oid: Oid) -> bool;

    /// Element type of an array type, if any.
    fn element_type(&self, oid: Oid) -> Option<Oid>;

    /// Ordered attribute list for a composite type.
    fn tuple_descriptor(&self, type_oid: Oid, typmod: i32) -> BridgeResult<Arc<TupleDescriptor>>;

    /// Textual input conversion function for the type.
    fn input_function(&self, oid: Oid) -> BridgeResult<InputFn>;

    /// Textual output conversion function for the type.
    fn output_function(&self, oid: Oid) -> BridgeResult<OutputFn>;

    /// The server's configured text encoding.
    fn server_encoding(&self) -> ServerEncoding {
        ServerEncoding::Utf8
    }

    /// Whether timestamps are integer microseconds since the database epoch
    /// (the modern default) or float seconds.
    fn integer_datetimes(&self) -> bool {
        true
    }
}
