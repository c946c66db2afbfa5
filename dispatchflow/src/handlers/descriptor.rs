//! Handler descriptors and parameter schemas.

use super::invoke::{AsyncHandler, BlockingHandler, HandlerResult, Invoke, StatefulHandler, StatefulInvoke};
use crate::cancellation::CancellationToken;
use crate::context::Parameters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The JSON type a parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// A JSON string.
    String,
    /// A JSON number without a fractional part.
    Integer,
    /// Any JSON number. Integers are compatible.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
    /// JSON null.
    Null,
    /// Any value.
    Any,
}

impl ParamType {
    /// Returns true if `value` is compatible with this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Null => value.is_null(),
            Self::Any => true,
        }
    }

    /// Returns the JSON type name of a value, as used in violation reasons.
    #[must_use]
    pub fn name_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// Declaration of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// The expected type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether the parameter must be present.
    #[serde(default)]
    pub required: bool,
}

/// Mapping of parameter name to its declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    fields: BTreeMap<String, ParamSpec>,
}

impl ParameterSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required parameter.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.fields.insert(
            name.into(),
            ParamSpec {
                param_type,
                required: true,
            },
        );
        self
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.fields.insert(
            name.into(),
            ParamSpec {
                param_type,
                required: false,
            },
        );
        self
    }

    /// Returns the declaration for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.fields.get(name)
    }

    /// Returns true if `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates declarations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamSpec)> {
        self.fields.iter()
    }

    /// Returns the number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// How a handler is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallingConvention {
    /// A plain function that returns synchronously.
    Blocking,
    /// An async function that may yield while awaiting I/O.
    Suspendable,
    /// A long-lived object exposing an invocation method.
    StatefulObject,
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Suspendable => write!(f, "suspendable"),
            Self::StatefulObject => write!(f, "stateful_object"),
        }
    }
}

/// A resolvable handler: its name, schema and invocation capability.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    description: Option<String>,
    schema: ParameterSchema,
    invoker: Arc<dyn Invoke>,
}

impl HandlerDescriptor {
    /// Creates a descriptor from any invocation capability.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: ParameterSchema, invoker: Arc<dyn Invoke>) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema,
            invoker,
        }
    }

    /// Creates a descriptor for a plain synchronous function.
    ///
    /// The function runs on the blocking thread pool.
    #[must_use]
    pub fn blocking<F>(name: impl Into<String>, schema: ParameterSchema, handler: F) -> Self
    where
        F: Fn(Parameters, CancellationToken) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(name, schema, Arc::new(BlockingHandler::new(handler)))
    }

    /// Creates a descriptor for an async function.
    #[must_use]
    pub fn suspendable<F, Fut>(name: impl Into<String>, schema: ParameterSchema, handler: F) -> Self
    where
        F: Fn(Parameters, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new(name, schema, Arc::new(AsyncHandler::new(handler)))
    }

    /// Creates a descriptor for a stateful object.
    #[must_use]
    pub fn stateful<T>(name: impl Into<String>, schema: ParameterSchema, target: Arc<T>) -> Self
    where
        T: StatefulInvoke,
    {
        Self::new(name, schema, Arc::new(StatefulHandler::new(target)))
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn parameter_schema(&self) -> &ParameterSchema {
        &self.schema
    }

    /// Returns the calling convention of the underlying handler.
    #[must_use]
    pub fn calling_convention(&self) -> CallingConvention {
        self.invoker.calling_convention()
    }

    /// Returns the invocation capability.
    #[must_use]
    pub fn invoker(&self) -> Arc<dyn Invoke> {
        Arc::clone(&self.invoker)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("calling_convention", &self.calling_convention())
            .finish()
    }
}
