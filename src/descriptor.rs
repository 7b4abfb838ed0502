//! Type descriptor resolution.
//!
//! A descriptor captures everything the codecs need to know about a type:
//! category, element type for arrays, physical layout, and the external
//! typed-buffer tag for the reserved domains. Resolution is a pure function
//! of the OID and the catalog; function handles are memoized separately on
//! the conversion context.

use tracing::trace;

use crate::catalog::{TypeCatalog, TypeCategory, TypeLayout};
use crate::error::{BridgeError, BridgeResult};
use crate::oid::{self, Oid};
use crate::value::BufferKind;

/// Resolved description of a database type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDescriptor {
    pub type_oid: Oid,
    pub category: TypeCategory,
    /// Resolved element type for array-category types.
    pub element: Option<Oid>,
    /// For arrays this is the element's layout, matching how the array
    /// primitives consume it.
    pub layout: TypeLayout,
    /// True for composite types, and for arrays whose element is composite.
    pub is_composite: bool,
    /// Set when the type is one of the reserved typed-array domains.
    pub ext_buffer: Option<BufferKind>,
}

impl TypeDescriptor {
    /// Resolve a descriptor from the catalog.
    ///
    /// Reserved typed-array domains return early with `ext_buffer` set and
    /// their own (variable-length) layout; other domains fall through to the
    /// normal path under their base category. Arrays fail loudly when no
    /// element type can be determined.
    pub fn resolve(catalog: &dyn TypeCatalog, type_oid: Oid) -> BridgeResult<TypeDescriptor> {
        let (category, _preferred) = catalog.type_category(type_oid)?;
        let mut desc = TypeDescriptor {
            type_oid,
            category,
            element: None,
            layout: catalog.type_layout(type_oid)?,
            is_composite: category == TypeCategory::Composite,
            ext_buffer: None,
        };

        if catalog.is_domain(type_oid) {
            let name = catalog.type_name(type_oid)?;
            if let Some(kind) = buffer_kind_for_domain_name(&name) {
                desc.ext_buffer = Some(kind);
                trace!(type_oid, name, ?kind, "resolved external typed-array domain");
                return Ok(desc);
            }
        }

        if category == TypeCategory::Array {
            let element = catalog.element_type(type_oid).ok_or_else(|| {
                BridgeError::TypeResolution(format!(
                    "cannot determine element type of array: {type_oid}"
                ))
            })?;
            let (elem_category, _) = catalog.type_category(element)?;
            desc.element = Some(element);
            desc.is_composite = elem_category == TypeCategory::Composite;
            desc.layout = catalog.type_layout(element)?;
        }

        Ok(desc)
    }

    /// Element OID to use when converting array elements. The record-array
    /// pseudo-type maps to record.
    pub(crate) fn element_oid(&self) -> Oid {
        match self.element {
            Some(element) if element == oid::RECORD_ARRAY => oid::RECORD,
            Some(element) => element,
            None if self.type_oid == oid::RECORD_ARRAY => oid::RECORD,
            None => self.type_oid,
        }
    }
}

/// The reserved domain names that request TypedBuffer exchange, one per
/// element kind.
const RESERVED_DOMAINS: &[(&str, BufferKind)] = &[
    ("typed_int2array", BufferKind::Int16),
    ("typed_int4array", BufferKind::Int32),
    ("typed_float4array", BufferKind::Float32),
    ("typed_float8array", BufferKind::Float64),
    ("typed_int8array", BufferKind::Int64),
];

/// Buffer kind for a reserved domain name, if the name is reserved.
pub fn buffer_kind_for_domain_name(name: &str) -> Option<BufferKind> {
    RESERVED_DOMAINS
        .iter()
        .find(|(reserved, _)| *reserved == name)
        .map(|&(_, kind)| kind)
}

/// Reserved domain name for a buffer kind, for the kinds that have one.
pub fn reserved_domain_name(kind: BufferKind) -> Option<&'static str> {
    RESERVED_DOMAINS
        .iter()
        .find(|&&(_, k)| k == kind)
        .map(|&(name, _)| name)
}

/// Scalar element type corresponding to a buffer kind, for the kinds the
/// reserved domains cover.
pub(crate) fn element_oid_for_kind(kind: BufferKind) -> Option<Oid> {
    match kind {
        BufferKind::Int16 => Some(oid::INT2),
        BufferKind::Int32 => Some(oid::INT4),
        BufferKind::Float32 => Some(oid::FLOAT4),
        BufferKind::Float64 => Some(oid::FLOAT8),
        BufferKind::Int64 => Some(oid::INT8),
        _ => None,
    }
}

/// Buffer kind whose packed layout matches a scalar element type.
pub(crate) fn kind_for_element_oid(element: Oid) -> Option<BufferKind> {
    match element {
        oid::INT2 => Some(BufferKind::Int16),
        oid::INT4 => Some(BufferKind::Int32),
        oid::INT8 => Some(BufferKind::Int64),
        oid::FLOAT4 => Some(BufferKind::Float32),
        oid::FLOAT8 => Some(BufferKind::Float64),
        _ => None,
    }
}
