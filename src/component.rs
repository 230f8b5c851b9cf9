// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component types, schemas, and instance data.
//!
//! A component type is declared through [`ComponentDesc`] and registered
//! with the world, which validates the schema and assigns a dense
//! [`ComponentTypeId`]. Instances are [`ComponentData`]: schema-ordered
//! field values recycled through the type's pool.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{EcsError, Result};
use crate::pool::{ObjectPool, Recyclable};
use crate::types::{PropertyType, Value};

/// Dense component type identifier, assigned monotonically at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// Component type flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Plain data component.
    Normal,
    /// Presence-only component with no fields.
    Tag,
    /// Keeps its owner alive as a ghost until explicitly removed.
    SystemState,
}

/// One field of a component schema: property type plus resolved default.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: String,
    pub prop: PropertyType,
    pub default: Value,
}

/// Validated, schema-ordered field layout of a component type.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    component: String,
    fields: Vec<SchemaField>,
    index: FxHashMap<String, usize>,
}

impl Schema {
    pub fn component_name(&self) -> &str {
        &self.component
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for a component type declaration.
#[derive(Debug, Clone)]
pub struct ComponentDesc {
    name: String,
    kind: ComponentKind,
    fields: Vec<(String, PropertyType, Option<Value>)>,
}

impl ComponentDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Normal,
            fields: Vec::new(),
        }
    }

    /// Presence-only component; declaring fields on it fails validation.
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Tag,
            fields: Vec::new(),
        }
    }

    /// Component that keeps its owner alive as a ghost after disposal.
    pub fn system_state(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::SystemState,
            fields: Vec::new(),
        }
    }

    /// Declare a field defaulting to the property type's default.
    pub fn field(mut self, name: impl Into<String>, prop: PropertyType) -> Self {
        self.fields.push((name.into(), prop, None));
        self
    }

    /// Declare a field with an explicit default overriding the type's.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        prop: PropertyType,
        default: Value,
    ) -> Self {
        self.fields.push((name.into(), prop, Some(default)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Validate the declaration into a schema.
    pub(crate) fn build(self) -> Result<(String, ComponentKind, Schema)> {
        if self.kind == ComponentKind::Tag && !self.fields.is_empty() {
            return Err(EcsError::SchemaInvalid(format!(
                "tag component {} declares {} fields",
                self.name,
                self.fields.len()
            )));
        }

        let mut schema = Schema {
            component: self.name.clone(),
            ..Schema::default()
        };
        for (name, prop, default) in self.fields {
            if schema.index.contains_key(&name) {
                return Err(EcsError::SchemaInvalid(format!(
                    "duplicate field {name} on component {}",
                    self.name
                )));
            }
            let default = match default {
                Some(value) => {
                    if value.kind() != prop.default.kind() {
                        return Err(EcsError::SchemaInvalid(format!(
                            "field {name} on component {} declares a {} default for a {} type",
                            self.name,
                            value.kind(),
                            prop.default.kind()
                        )));
                    }
                    value
                }
                None => (prop.clone)(&prop.default),
            };
            schema.index.insert(name.clone(), schema.fields.len());
            schema.fields.push(SchemaField {
                name,
                prop,
                default,
            });
        }
        Ok((self.name, self.kind, schema))
    }
}

/// Registered component type metadata.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub name: String,
    pub kind: ComponentKind,
    pub schema: Arc<Schema>,
}

/// A component instance: schema-ordered field values.
#[derive(Debug)]
pub struct ComponentData {
    type_id: ComponentTypeId,
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl ComponentData {
    /// Fresh instance with every field at its schema default.
    pub(crate) fn from_schema(type_id: ComponentTypeId, schema: Arc<Schema>) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|f| (f.prop.clone)(&f.default))
            .collect();
        Self {
            type_id,
            schema,
            values,
        }
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read a field by name.
    pub fn get(&self, field: &str) -> Result<&Value> {
        let idx = self
            .schema
            .field_index(field)
            .ok_or_else(|| self.unknown_field(field))?;
        Ok(&self.values[idx])
    }

    /// Write a field by name; the value kind must match the schema.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        let idx = self
            .schema
            .field_index(field)
            .ok_or_else(|| self.unknown_field(field))?;
        let expected = self.schema.fields()[idx].default.kind();
        if value.kind() != expected {
            return Err(EcsError::ValueKindMismatch {
                field: field.to_string(),
                expected,
                found: value.kind(),
            });
        }
        self.values[idx] = value;
        Ok(())
    }

    /// Apply a list of named field values, as in construction props.
    pub fn apply<'a, I>(&mut self, props: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        for (field, value) in props {
            self.set(field, value)?;
        }
        Ok(())
    }

    /// Overwrite every field from a sibling of the same type using the
    /// schema's copy routines.
    pub fn copy_from(&mut self, other: &ComponentData) {
        debug_assert_eq!(self.type_id, other.type_id);
        for (idx, field) in self.schema.fields().iter().enumerate() {
            (field.prop.copy)(&other.values[idx], &mut self.values[idx]);
        }
    }

    /// Field-wise equality against a sibling.
    pub fn values_eq(&self, other: &ComponentData) -> bool {
        self.type_id == other.type_id && self.values == other.values
    }

    fn unknown_field(&self, field: &str) -> EcsError {
        EcsError::UnknownField {
            component: self.schema.component_name().to_string(),
            field: field.to_string(),
        }
    }
}

impl Clone for ComponentData {
    /// Detached clone through the schema's clone routines.
    fn clone(&self) -> Self {
        let values = self
            .schema
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.prop.clone)(v))
            .collect();
        Self {
            type_id: self.type_id,
            schema: self.schema.clone(),
            values,
        }
    }
}

impl Recyclable for ComponentData {
    fn instantiate(prototype: &Self) -> Self {
        prototype.clone()
    }

    fn reset(&mut self, prototype: &Self) {
        self.copy_from(prototype);
    }
}

/// Pooling policy for a component store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolPolicy {
    #[default]
    Pooled,
    Unpooled,
}

/// Per-type storage: schema, optional instance pool, live count.
pub(crate) struct ComponentStore {
    pub info: ComponentInfo,
    pub pool: Option<ObjectPool<ComponentData>>,
    pub count: usize,
}

impl ComponentStore {
    pub fn new(info: ComponentInfo, policy: PoolPolicy) -> Self {
        let pool = match policy {
            PoolPolicy::Pooled => Some(ObjectPool::new(ComponentData::from_schema(
                info.id,
                info.schema.clone(),
            ))),
            PoolPolicy::Unpooled => None,
        };
        Self {
            info,
            pool,
            count: 0,
        }
    }

    /// Build an instance, recycling through the pool when one exists.
    pub fn create_instance(&mut self) -> ComponentData {
        match &mut self.pool {
            Some(pool) => pool.acquire(),
            None => ComponentData::from_schema(self.info.id, self.info.schema.clone()),
        }
    }

    /// Return an instance to the pool, or drop it for unpooled stores.
    pub fn release_instance(&mut self, data: ComponentData) {
        if let Some(pool) = &mut self.pool {
            pool.release(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;

    fn position_schema() -> (ComponentTypeId, Arc<Schema>) {
        let desc = ComponentDesc::new("Position")
            .field("x", types::number())
            .field("y", types::number());
        let (_, _, schema) = desc.build().unwrap();
        (ComponentTypeId::from_index(0), Arc::new(schema))
    }

    #[test]
    fn test_defaults_from_schema() {
        let (id, schema) = position_schema();
        let data = ComponentData::from_schema(id, schema);
        assert_eq!(data.get("x").unwrap(), &Value::Number(0.0));
        assert_eq!(data.get("y").unwrap(), &Value::Number(0.0));
    }

    #[test]
    fn test_field_default_override() {
        let desc = ComponentDesc::new("Health").field_with_default(
            "hp",
            types::number(),
            Value::Number(100.0),
        );
        let (_, _, schema) = desc.build().unwrap();
        let data = ComponentData::from_schema(ComponentTypeId::from_index(0), Arc::new(schema));
        assert_eq!(data.get("hp").unwrap(), &Value::Number(100.0));
    }

    #[test]
    fn test_set_checks_value_kind() {
        let (id, schema) = position_schema();
        let mut data = ComponentData::from_schema(id, schema);
        assert!(data.set("x", Value::Number(3.0)).is_ok());
        assert!(matches!(
            data.set("x", Value::Bool(true)),
            Err(EcsError::ValueKindMismatch { .. })
        ));
        assert!(matches!(
            data.set("z", Value::Number(1.0)),
            Err(EcsError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_copy_from_sibling() {
        let (id, schema) = position_schema();
        let mut a = ComponentData::from_schema(id, schema.clone());
        let mut b = ComponentData::from_schema(id, schema);
        a.set("x", Value::Number(5.0)).unwrap();
        b.copy_from(&a);
        assert!(a.values_eq(&b));
        b.set("x", Value::Number(9.0)).unwrap();
        assert!(!a.values_eq(&b));
    }

    #[test]
    fn test_tag_with_fields_is_invalid() {
        assert!(ComponentDesc::tag("Frozen").build().is_ok());

        let desc = ComponentDesc::tag("Frozen").field("oops", types::number());
        assert!(matches!(desc.build(), Err(EcsError::SchemaInvalid(_))));
    }

    #[test]
    fn test_duplicate_field_is_invalid() {
        let desc = ComponentDesc::new("Broken")
            .field("x", types::number())
            .field("x", types::number());
        assert!(matches!(desc.build(), Err(EcsError::SchemaInvalid(_))));
    }

    #[test]
    fn test_mismatched_default_is_invalid() {
        let desc =
            ComponentDesc::new("Broken").field_with_default("x", types::number(), Value::Bool(true));
        assert!(matches!(desc.build(), Err(EcsError::SchemaInvalid(_))));
    }

    #[test]
    fn test_store_recycles_through_pool() {
        let desc = ComponentDesc::new("Position")
            .field("x", types::number())
            .field("y", types::number());
        let (name, kind, schema) = desc.build().unwrap();
        let info = ComponentInfo {
            id: ComponentTypeId::from_index(0),
            name,
            kind,
            schema: Arc::new(schema),
        };
        let mut store = ComponentStore::new(info, PoolPolicy::Pooled);

        let mut data = store.create_instance();
        data.set("x", Value::Number(8.0)).unwrap();
        store.release_instance(data);

        let again = store.create_instance();
        assert_eq!(again.get("x").unwrap(), &Value::Number(0.0));
    }
}
