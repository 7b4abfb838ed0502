//! Datum Bridge
//!
//! Bidirectional conversion between a PostgreSQL-style typed datum model and
//! a dynamic scripting-engine value model.
//!
//! # Architecture
//!
//! Three layers:
//!
//! ## Metadata
//! - [`catalog::TypeCatalog`] - the consumed type-system interface
//! - [`TypeDescriptor`] - resolved per-type conversion plan
//! - [`ConversionContext`] - per-call cache of descriptors and function handles
//!
//! ## Codecs
//! - `convert::scalar` - binary scalar payloads, epoch-shifted dates
//! - `convert::array` - deconstructed arrays and typed-buffer fast paths
//! - `convert::composite` - rows keyed by attribute name
//! - `convert::json` - jsonb tree walking and the textual JSON round trip
//!
//! ## Entry points
//! - [`to_dynamic`] / [`to_datum`] - category-dispatched conversion
//! - [`inferred_oid`] - parameter typing when no target type is declared
//!
//! # Example
//!
//! ```
//! use datum_bridge::{BuiltinCatalog, ConversionContext, Datum, DynamicValue, oid, to_dynamic};
//!
//! let catalog = BuiltinCatalog::new();
//! let mut ctx = ConversionContext::new(&catalog);
//! let value = to_dynamic(&mut ctx, Some(&Datum::int4(42)), oid::INT4).unwrap();
//! assert_eq!(value, DynamicValue::Int32(42));
//! ```

pub mod catalog;
pub mod context;
pub mod convert;
pub mod datum;
pub mod descriptor;
pub mod encoding;
pub mod error;
pub mod oid;
pub mod value;

pub use catalog::{Attribute, BuiltinCatalog, TupleDescriptor, TypeCatalog, TypeCategory};
pub use context::{Config, ConversionContext};
pub use convert::{inferred_oid, to_datum, to_dynamic};
pub use datum::{ArrayDatum, Datum, JsonbValue, RowDatum};
pub use descriptor::TypeDescriptor;
pub use encoding::ServerEncoding;
pub use error::{BridgeError, BridgeResult};
pub use value::{BufferKind, DynamicValue, PlainObject, TypedBuffer};
