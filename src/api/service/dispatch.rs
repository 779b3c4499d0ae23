//! Named-operation dispatch and function imports
//!
//! Collections, `AddTo<Collection>` entry points and function imports are
//! looked up in a capability table built when the metadata is loaded.

use super::Service;
use crate::api::models::{Entity, Value};
use crate::api::query::{escape_key_literal, escape_path};
use crate::api::response::ResponseParser;
use crate::error::{Error, Result};
use log::debug;

/// What a name in the capability table resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Query entry point for a collection
    Collection(String),
    /// `AddTo<Collection>`: queue an add
    AddTo(String),
    /// A function import
    Function(String),
}

/// Key of a single entity
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// `Categories(1)`, `Categories('a')`
    Positional(Value),
    /// `Order_Details(OrderID=1,ProductID=2)`
    Named(Vec<(String, Value)>),
}

impl Key {
    pub fn named<N: Into<String>, V: Into<Value>>(pairs: impl IntoIterator<Item = (N, V)>) -> Self {
        Key::Named(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    /// Parenthesized key expression with percent-encoded values
    pub fn to_path_segment(&self) -> String {
        match self {
            Key::Positional(value) => format!("({})", escape_key_literal(&value.to_literal())),
            Key::Named(pairs) => format!(
                "({})",
                pairs
                    .iter()
                    .map(|(name, value)| {
                        format!("{}={}", escape_path(name), escape_key_literal(&value.to_literal()))
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

/// One argument of [`Service::invoke`]
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Value),
    Named(String, Value),
}

impl Argument {
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Argument::Named(name.into(), value.into())
    }
}

/// `From` impls for the value types a key or positional argument can hold
macro_rules! positional_from {
    ($target:ident: $($source:ty),+) => {
        $(
            impl From<$source> for $target {
                fn from(value: $source) -> Self {
                    $target::Positional(value.into())
                }
            }
        )+
    };
}

positional_from!(Key: Value, i64, i32, bool, &str, String, rust_decimal::Decimal);
positional_from!(Argument: Value, i64, i32, f64, bool, &str, String, Entity, rust_decimal::Decimal);

/// Outcome of [`Service::invoke`]
#[derive(Debug, Clone)]
pub enum Invocation {
    /// A collection query is now pending; see [`Service::pending_query`]
    Query,
    /// An add was queued
    Queued,
    Function(FunctionResult),
}

/// Result of calling a function import
#[derive(Debug, Clone)]
pub enum FunctionResult {
    /// 204 No Content
    NoContent,
    Entity(Entity),
    Entities(Vec<Entity>),
    /// Primitive value or `Collection(Edm.*)` as a list
    Value(Value),
    /// No declared return type: whether the service answered 200
    Status(bool),
}

impl Service {
    /// Dispatch a name through the capability table; unknown names fail with
    /// [`Error::UnknownOperation`]
    pub fn invoke(&mut self, name: &str, args: Vec<Argument>) -> Result<Invocation> {
        let capability = self
            .capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))?;
        debug!("Invoking {} as {:?}", name, capability);

        match capability {
            Capability::Collection(collection) => {
                match collection_key(args)? {
                    Some(key) => self.collection_with_key(&collection, key),
                    None => self.collection(&collection),
                };
                Ok(Invocation::Query)
            }
            Capability::AddTo(collection) => {
                let given = args.len();
                let entity = match args.into_iter().next() {
                    Some(Argument::Positional(Value::Entity(entity))) if given == 1 => entity,
                    Some(_) if given == 1 => {
                        return Err(Error::InvalidArgument(format!(
                            "AddTo{} expects an entity",
                            collection
                        )))
                    }
                    _ => return Err(Error::ArgumentCount { given, expected: 1 }),
                };
                self.add_to(&collection, &entity)?;
                Ok(Invocation::Queued)
            }
            Capability::Function(function) => {
                let values = args
                    .into_iter()
                    .map(|arg| match arg {
                        Argument::Positional(value) => Ok(value),
                        Argument::Named(name, _) => Err(Error::InvalidArgument(format!(
                            "function imports take positional arguments, got '{}'",
                            name
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.call_function(&function, &values).map(Invocation::Function)
            }
        }
    }

    /// Call a function import with positional arguments.
    ///
    /// Too many arguments fail before any request is made; missing trailing
    /// arguments are simply not sent.
    pub fn call_function(&self, name: &str, args: &[Value]) -> Result<FunctionResult> {
        let function = self
            .model
            .function_imports
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))?;

        if args.len() > function.parameters.len() {
            return Err(Error::ArgumentCount {
                given: args.len(),
                expected: function.parameters.len(),
            });
        }

        let params = function
            .parameters
            .iter()
            .zip(args)
            .map(|(param, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(&param.name),
                    urlencoding::encode(&value.to_literal())
                )
            })
            .collect::<Vec<_>>();

        let mut url = format!("{}/{}", self.uri, function.name);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }

        let response = self.checked(self.context.request(function.http_method, &url))?;
        if response.status == 204 {
            return Ok(FunctionResult::NoContent);
        }

        let return_type = match &function.return_type {
            Some(return_type) => return_type,
            None => return Ok(FunctionResult::Status(response.status == 200)),
        };

        let parser = ResponseParser::new(&self.registry);
        if return_type.is_primitive() {
            let edm_type = if return_type.is_collection() {
                format!("Collection({})", return_type.type_name())
            } else {
                return_type.type_name().to_string()
            };
            return parser.parse_primitive(&response.body, &edm_type).map(FunctionResult::Value);
        }

        let parsed = parser.parse(&response.body, Some(return_type.local_type_name()))?;
        Ok(if return_type.is_collection() {
            FunctionResult::Entities(parsed.payload.into_entities())
        } else {
            match parsed.payload.into_entities().into_iter().next() {
                Some(entity) => FunctionResult::Entity(entity),
                None => FunctionResult::Value(Value::Null),
            }
        })
    }
}

/// No arguments, one positional key, or named key parts
fn collection_key(args: Vec<Argument>) -> Result<Option<Key>> {
    let given = args.len();
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for arg in args {
        match arg {
            Argument::Positional(value) => positional.push(value),
            Argument::Named(name, value) => named.push((name, value)),
        }
    }

    match (positional.len(), named.len()) {
        (0, 0) => Ok(None),
        (1, 0) => Ok(positional.pop().map(Key::Positional)),
        (0, _) => Ok(Some(Key::Named(named))),
        _ => Err(Error::ArgumentCount { given, expected: 1 }),
    }
}
