//! Handler signatures and their classification
//!
//! A handler is any async function whose parameters are extractors. Each
//! extractor declares its [`ParameterRole`]; classification checks the
//! parameter list once, when the executor is built, and builds the payload
//! schema if a [`Data`] parameter is present.
//!
//! ```ignore
//! async fn shutdown(session: Arc<dyn Session>, meta: Meta, Data(args): Data<ShutdownArgs>) -> Result<()> {
//!     Ok(())
//! }
//! let executor = Executor::new("shutdown", "Stop the bot", shutdown)?;
//! ```
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Extractor-based handlers replace the single handler trait
//! - 1.0.0: Initial implementation for modular command handling

use async_trait::async_trait;
use std::any::{type_name, TypeId};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::context::{Meta, Request};
use crate::core::error::{DispatchError, ParsingError, SchemaError};
use crate::core::model::{Choice, Interaction, InteractionOption};
use crate::core::session::Session;
use crate::schema::payload::{build_schema, ErasedSchema, Payload};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler parameter is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterRole {
    Session,
    Interaction,
    /// The per-request cancellation context
    Context,
    /// Request metadata (invocation path)
    Meta,
    /// A type that builds itself from session, interaction and raw options
    Unmarshal {
        type_name: &'static str,
        by_reference: bool,
    },
    /// The payload whose fields are the command options
    Payload {
        type_name: &'static str,
        type_id: TypeId,
    },
}

type SchemaBuilder = fn() -> Result<Arc<dyn ErasedSchema>, SchemaError>;

/// Declaration of one handler parameter
#[derive(Clone)]
pub struct Parameter {
    pub role: ParameterRole,
    schema: Option<SchemaBuilder>,
}

impl Parameter {
    pub fn new(role: ParameterRole) -> Self {
        Self { role, schema: None }
    }

    fn payload<P: Payload>() -> Self {
        Self {
            role: ParameterRole::Payload {
                type_name: type_name::<P>(),
                type_id: TypeId::of::<P>(),
            },
            schema: Some(build_schema::<P>),
        }
    }
}

/// A handler parameter that can be pulled out of a [`Request`]
#[async_trait]
pub trait Extract: Sized + Send + 'static {
    fn parameter() -> Parameter;

    async fn extract(request: &Request) -> Result<Self, DispatchError>;
}

/// Capability of populating a value from the session, the interaction and its raw options
#[async_trait]
pub trait Unmarshal: Sized + Send + Sync + 'static {
    async fn unmarshal(
        session: &Arc<dyn Session>,
        interaction: &Interaction,
        options: &[InteractionOption],
    ) -> anyhow::Result<Self>;
}

/// An [`Unmarshal`] type taken by value
#[derive(Debug, Clone)]
pub struct Unmarshaled<T>(pub T);

/// An [`Unmarshal`] type taken by shared reference
#[derive(Debug, Clone)]
pub struct Shared<T>(pub Arc<T>);

/// The command payload, rebuilt from the interaction options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data<P>(pub P);

#[async_trait]
impl Extract for Arc<dyn Session> {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Session)
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        Ok(Arc::clone(request.session()))
    }
}

#[async_trait]
impl Extract for Interaction {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Interaction)
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        Ok(request.interaction().clone())
    }
}

#[async_trait]
impl Extract for Arc<Interaction> {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Interaction)
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        Ok(request.shared_interaction())
    }
}

#[async_trait]
impl Extract for CancellationToken {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Context)
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        Ok(request.token().clone())
    }
}

#[async_trait]
impl Extract for Meta {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Meta)
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        Ok(request.meta().clone())
    }
}

async fn unmarshal<T: Unmarshal>(request: &Request) -> Result<T, DispatchError> {
    T::unmarshal(request.session(), request.interaction(), request.options())
        .await
        .map_err(|source| {
            DispatchError::from(ParsingError::Unmarshal {
                type_name: type_name::<T>(),
                source,
            })
        })
}

#[async_trait]
impl<T: Unmarshal> Extract for Unmarshaled<T> {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Unmarshal {
            type_name: type_name::<T>(),
            by_reference: false,
        })
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        unmarshal::<T>(request).await.map(Unmarshaled)
    }
}

#[async_trait]
impl<T: Unmarshal> Extract for Shared<T> {
    fn parameter() -> Parameter {
        Parameter::new(ParameterRole::Unmarshal {
            type_name: type_name::<T>(),
            by_reference: true,
        })
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        unmarshal::<T>(request).await.map(|value| Shared(Arc::new(value)))
    }
}

#[async_trait]
impl<P: Payload> Extract for Data<P> {
    fn parameter() -> Parameter {
        Parameter::payload::<P>()
    }

    async fn extract(request: &Request) -> Result<Self, DispatchError> {
        Ok(Data(request.payload::<P>().await?))
    }
}

/// An async function usable as a command handler
pub trait Handler<T>: Clone + Send + Sync + 'static {
    fn parameters() -> Vec<Parameter>;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<(), DispatchError>>;
}

/// An async function producing choices for a focused option
pub trait AutocompleteHandler<T>: Clone + Send + Sync + 'static {
    fn parameters() -> Vec<Parameter>;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<Vec<Choice>, DispatchError>>;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
            $($ty: Extract,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$(<$ty as Extract>::parameter()),*]
            }

            fn call(&self, request: Request) -> BoxFuture<'static, Result<(), DispatchError>> {
                let handler = self.clone();
                Box::pin(async move {
                    $(let $ty = <$ty as Extract>::extract(&request).await?;)*
                    handler($($ty),*).await.map_err(DispatchError::Execution)
                })
            }
        }

        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, $($ty,)*> AutocompleteHandler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Vec<Choice>> + Send + 'static,
            $($ty: Extract,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$(<$ty as Extract>::parameter()),*]
            }

            fn call(&self, request: Request) -> BoxFuture<'static, Result<Vec<Choice>, DispatchError>> {
                let handler = self.clone();
                Box::pin(async move {
                    $(let $ty = <$ty as Extract>::extract(&request).await?;)*
                    Ok(handler($($ty),*).await)
                })
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

/// Single normalized entry point stored by executors
pub trait ErasedHandler: Send + Sync {
    fn call(&self, request: Request) -> BoxFuture<'static, Result<(), DispatchError>>;
}

pub trait ErasedAutocomplete: Send + Sync {
    fn call(&self, request: Request) -> BoxFuture<'static, Result<Vec<Choice>, DispatchError>>;
}

pub type BoxedHandler = Arc<dyn ErasedHandler>;
pub type BoxedAutocomplete = Arc<dyn ErasedAutocomplete>;

struct HandlerFn<H, T> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> ErasedHandler for HandlerFn<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, Result<(), DispatchError>> {
        self.handler.call(request)
    }
}

impl<H, T> ErasedAutocomplete for HandlerFn<H, T>
where
    H: AutocompleteHandler<T>,
    T: 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, Result<Vec<Choice>, DispatchError>> {
        self.handler.call(request)
    }
}

pub(crate) fn erase_handler<H: Handler<T>, T: 'static>(handler: H) -> BoxedHandler {
    Arc::new(HandlerFn {
        handler,
        _marker: PhantomData::<fn() -> T>,
    })
}

pub(crate) fn erase_autocomplete<H: AutocompleteHandler<T>, T: 'static>(handler: H) -> BoxedAutocomplete {
    Arc::new(HandlerFn {
        handler,
        _marker: PhantomData::<fn() -> T>,
    })
}

/// Result of classifying a handler's parameter list
pub struct Signature {
    pub roles: Vec<ParameterRole>,
    pub schema: Option<Arc<dyn ErasedSchema>>,
}

/// Validate the payload position and return its type, if any
fn payload_parameter(parameters: &[Parameter]) -> Result<Option<&Parameter>, SchemaError> {
    let payloads: Vec<(usize, &Parameter)> = parameters
        .iter()
        .enumerate()
        .filter(|(_, p)| matches!(p.role, ParameterRole::Payload { .. }))
        .collect();

    match payloads.as_slice() {
        [] => Ok(None),
        [(position, parameter)] => {
            if *position + 1 != parameters.len() {
                if let ParameterRole::Payload { type_name, .. } = parameter.role {
                    return Err(SchemaError::PayloadNotLast {
                        type_name,
                        position: *position,
                    });
                }
            }
            Ok(Some(*parameter))
        }
        _ => Err(SchemaError::MultiplePayloads),
    }
}

/// Classify a command handler and build its payload schema
pub fn classify(parameters: &[Parameter]) -> Result<Signature, SchemaError> {
    let schema = match payload_parameter(parameters)? {
        Some(Parameter {
            schema: Some(build), ..
        }) => Some(build()?),
        _ => None,
    };

    Ok(Signature {
        roles: parameters.iter().map(|p| p.role.clone()).collect(),
        schema,
    })
}

/// Classify an autocomplete handler bound to an executor whose payload is `expected`
///
/// A payload parameter must be exactly the executor's payload type so both
/// handlers share one schema.
pub fn classify_autocomplete(
    parameters: &[Parameter],
    expected: Option<&dyn ErasedSchema>,
) -> Result<Vec<ParameterRole>, SchemaError> {
    if let Some(parameter) = payload_parameter(parameters)? {
        if let ParameterRole::Payload { type_name, type_id } = parameter.role {
            match expected {
                Some(schema) if schema.payload_type() == type_id => {}
                Some(schema) => {
                    return Err(SchemaError::PayloadMismatch {
                        expected: schema.payload_name(),
                        actual: type_name,
                    })
                }
                None => {
                    return Err(SchemaError::PayloadMismatch {
                        expected: "()",
                        actual: type_name,
                    })
                }
            }
        }
    }

    Ok(parameters.iter().map(|p| p.role.clone()).collect())
}
