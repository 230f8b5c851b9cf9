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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone)]
pub enum EcsError {
    /// Component schema failed validation at registration
    SchemaInvalid(String),

    /// Query spec contains no include terms
    EmptyQuery,

    /// Entity handle does not resolve to a live record
    EntityNotFound,

    /// Component type id is not registered in this world
    UnknownComponentType(u32),

    /// Component field name not present in the schema
    UnknownField { component: String, field: String },

    /// Value written to a field does not match the field's property type
    ValueKindMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Failure raised from inside a system's execute
    SystemError(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::SchemaInvalid(msg) => write!(f, "Invalid component schema: {msg}"),
            EcsError::EmptyQuery => write!(f, "Query spec has no include terms"),
            EcsError::EntityNotFound => write!(f, "Entity not found"),
            EcsError::UnknownComponentType(id) => {
                write!(f, "Component type {id} is not registered")
            }
            EcsError::UnknownField { component, field } => {
                write!(f, "Component {component} has no field named {field}")
            }
            EcsError::ValueKindMismatch {
                field,
                expected,
                found,
            } => {
                write!(f, "Field {field} expects {expected}, got {found}")
            }
            EcsError::SystemError(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
