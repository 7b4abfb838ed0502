//! Conversion configuration and the per-call context.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{InputFn, OutputFn, TupleDescriptor, TypeCatalog};
use crate::datum::Datum;
use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::oid::Oid;

/// Conversion options, mirroring the host extension's build switches as
/// runtime configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Return a Number for INT8 values that fit 32 bits and a String
    /// otherwise, instead of a 64-bit integer value.
    pub bigint_graceful: bool,
    /// Convert JSONB through the native tree instead of a textual
    /// parse/stringify round trip.
    pub jsonb_direct: bool,
    /// Range-check INT2/INT4 encodes strictly instead of truncating.
    pub check_integer_overflow: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config { bigint_graceful: false, jsonb_direct: true, check_integer_overflow: false }
    }
}

/// Per-call conversion state: the catalog handle, options, and memoized
/// metadata. Descriptors, tuple descriptors and conversion function handles
/// are looked up once and reused for the lifetime of the context; entries
/// are immutable after insertion, so the caches stay valid across errors.
pub struct ConversionContext<'a> {
    catalog: &'a dyn TypeCatalog,
    config: Config,
    descriptors: HashMap<Oid, TypeDescriptor>,
    tupdescs: HashMap<(Oid, i32), Arc<TupleDescriptor>>,
    inputs: HashMap<Oid, InputFn>,
    outputs: HashMap<Oid, OutputFn>,
}

impl<'a> ConversionContext<'a> {
    pub fn new(catalog: &'a dyn TypeCatalog) -> ConversionContext<'a> {
        ConversionContext::with_config(catalog, Config::default())
    }

    pub fn with_config(catalog: &'a dyn TypeCatalog, config: Config) -> ConversionContext<'a> {
        ConversionContext {
            catalog,
            config,
            descriptors: HashMap::new(),
            tupdescs: HashMap::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &dyn TypeCatalog {
        self.catalog
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Resolve (or fetch the cached) descriptor for a type.
    pub fn resolve(&mut self, type_oid: Oid) -> BridgeResult<TypeDescriptor> {
        if let Some(desc) = self.descriptors.get(&type_oid) {
            return Ok(*desc);
        }
        let desc = TypeDescriptor::resolve(self.catalog, type_oid)?;
        self.descriptors.insert(type_oid, desc);
        Ok(desc)
    }

    /// Ordered attribute list for a composite type, cached per context.
    pub fn tuple_descriptor(
        &mut self,
        type_oid: Oid,
        typmod: i32,
    ) -> BridgeResult<Arc<TupleDescriptor>> {
        if let Some(td) = self.tupdescs.get(&(type_oid, typmod)) {
            return Ok(td.clone());
        }
        let td = self.catalog.tuple_descriptor(type_oid, typmod)?;
        self.tupdescs.insert((type_oid, typmod), td.clone());
        Ok(td)
    }

    /// Call the type's textual input function, memoizing the handle.
    /// Failures surface as `DatumConversion` with the original message.
    pub fn call_input(&mut self, type_oid: Oid, text: &str) -> BridgeResult<Datum> {
        let func = match self.inputs.get(&type_oid) {
            Some(f) => f.clone(),
            None => {
                let f = self.catalog.input_function(type_oid)?;
                self.inputs.insert(type_oid, f.clone());
                f
            }
        };
        func(text).map_err(BridgeError::DatumConversion)
    }

    /// Call the type's textual output function, memoizing the handle.
    pub fn call_output(&mut self, type_oid: Oid, datum: &Datum) -> BridgeResult<String> {
        let func = match self.outputs.get(&type_oid) {
            Some(f) => f.clone(),
            None => {
                let f = self.catalog.output_function(type_oid)?;
                self.outputs.insert(type_oid, f.clone());
                f
            }
        };
        func(datum).map_err(BridgeError::DatumConversion)
    }
}
