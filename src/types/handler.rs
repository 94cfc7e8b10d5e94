//! Custom type handlers
//!
//! A handler supplies the serialize/deserialize pair for a type Storm cannot
//! map on its own. Registering one makes the type a scalar column for
//! classification purposes. The registry is shared, thread-safe and
//! write-once per type: the first handler registered for a type wins.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

use super::descriptor::{Encoder, TypeDescriptor};
use super::value::Value;
use crate::error::{Result, StormError};

/// Typed handler for values of `T`.
pub trait TypeHandler<T: 'static>: Send + Sync + 'static {
    /// Convert a value into the value bound to a command
    fn serialize(&self, value: &T) -> Result<Value>;

    /// Parse a database value back into `T`
    fn deserialize(&self, value: &Value) -> Result<T>;
}

/// Type-erased handler stored in the registry.
pub trait ErasedTypeHandler: Send + Sync {
    fn type_name(&self) -> &str;

    /// Database UDT name for user-defined types (geometry, geography...)
    fn udt_name(&self) -> Option<&str> {
        None
    }

    fn serialize_any(&self, value: &dyn Any, handlers: &TypeHandlerRegistry) -> Result<Value>;

    fn deserialize_any(&self, value: &Value) -> Result<Box<dyn Any + Send>>;
}

struct Typed<T, H> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T, H> ErasedTypeHandler for Typed<T, H>
where
    T: Send + 'static,
    H: TypeHandler<T>,
{
    fn type_name(&self) -> &str {
        type_name::<T>()
    }

    fn serialize_any(&self, value: &dyn Any, _handlers: &TypeHandlerRegistry) -> Result<Value> {
        let value = value.downcast_ref::<T>().ok_or_else(|| {
            StormError::handler(type_name::<T>(), "value does not match the handled type")
        })?;
        self.handler.serialize(value)
    }

    fn deserialize_any(&self, value: &Value) -> Result<Box<dyn Any + Send>> {
        Ok(Box::new(self.handler.deserialize(value)?))
    }
}

/// Handler for database user-defined types. The value is encoded by the
/// type's own encoder and tagged with the UDT name.
pub struct UdtTypeHandler {
    udt_name: &'static str,
    type_name: &'static str,
    encode: Encoder,
}

impl UdtTypeHandler {
    pub fn new(udt_name: &'static str, descriptor: &TypeDescriptor) -> Self {
        Self {
            udt_name,
            type_name: descriptor.name(),
            encode: descriptor.encoder(),
        }
    }
}

impl ErasedTypeHandler for UdtTypeHandler {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn udt_name(&self) -> Option<&str> {
        Some(self.udt_name)
    }

    fn serialize_any(&self, value: &dyn Any, handlers: &TypeHandlerRegistry) -> Result<Value> {
        Ok(Value::Udt {
            udt_name: self.udt_name.to_string(),
            value: Box::new((self.encode)(value, handlers)?),
        })
    }

    fn deserialize_any(&self, _value: &Value) -> Result<Box<dyn Any + Send>> {
        Err(StormError::handler(
            self.type_name,
            format!("{} values cannot be materialized without a typed handler", self.udt_name),
        ))
    }
}

/// Spatial and hierarchical provider types that get a UDT handler on first use.
pub(crate) fn well_known_udt(type_name: &str) -> Option<&'static str> {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    match short {
        "SqlGeography" => return Some("geography"),
        "SqlGeometry" => return Some("geometry"),
        "SqlHierarchyId" => return Some("hierarchyid"),
        _ => {}
    }

    if type_name.starts_with("geo_types::") || type_name.starts_with("geo::") {
        return Some("geometry");
    }

    None
}

/// Registry of custom type handlers, keyed by type identity.
#[derive(Default)]
pub struct TypeHandlerRegistry {
    handlers: RwLock<HashMap<TypeId, Arc<dyn ErasedTypeHandler>>>,
}

impl TypeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `T`. Returns false if `T` already had one, in
    /// which case the existing handler is kept.
    pub fn register<T, H>(&self, handler: H) -> bool
    where
        T: Send + 'static,
        H: TypeHandler<T>,
    {
        let erased: Arc<dyn ErasedTypeHandler> = Arc::new(Typed {
            handler,
            _marker: PhantomData,
        });
        self.insert_if_absent(TypeId::of::<T>(), erased)
    }

    fn insert_if_absent(&self, id: TypeId, handler: Arc<dyn ErasedTypeHandler>) -> bool {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&id) {
            return false;
        }
        tracing::debug!(type_name = handler.type_name(), "Registered type handler");
        handlers.insert(id, handler);
        true
    }

    /// Register a UDT handler for a well-known provider type, returning the
    /// handler in effect afterwards.
    pub(crate) fn register_udt(
        &self,
        descriptor: &TypeDescriptor,
        udt_name: &'static str,
    ) -> Arc<dyn ErasedTypeHandler> {
        let handler: Arc<dyn ErasedTypeHandler> = Arc::new(UdtTypeHandler::new(udt_name, descriptor));
        let mut handlers = self.handlers.write();
        handlers
            .entry(descriptor.id())
            .or_insert_with(|| {
                tracing::debug!(
                    type_name = descriptor.name(),
                    udt_name,
                    "Auto-registered user-defined type handler"
                );
                handler
            })
            .clone()
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.handlers.read().contains_key(&id)
    }

    pub fn get(&self, id: TypeId) -> Option<Arc<dyn ErasedTypeHandler>> {
        self.handlers.read().get(&id).cloned()
    }

    /// Encode a value of the described type, preferring a registered handler
    /// over the type's own encoder.
    pub fn encode(&self, descriptor: &TypeDescriptor, value: &dyn Any) -> Result<Value> {
        // Lock is released before the handler runs; handlers may re-enter.
        match self.get(descriptor.id()) {
            Some(handler) => handler.serialize_any(value, self),
            None => (descriptor.encoder())(value, self),
        }
    }

    /// Parse a database value into `T` through its registered handler.
    pub fn deserialize<T: 'static>(&self, value: &Value) -> Result<T> {
        let handler = self.get(TypeId::of::<T>()).ok_or_else(|| {
            StormError::handler(type_name::<T>(), "no type handler registered")
        })?;
        let parsed = handler.deserialize_any(value)?;
        let parsed: Box<dyn Any> = parsed;
        parsed
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| StormError::handler(type_name::<T>(), "handler produced another type"))
    }
}

impl std::fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let mut names: Vec<&str> = handlers.values().map(|h| h.type_name()).collect();
        names.sort_unstable();
        f.debug_struct("TypeHandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
