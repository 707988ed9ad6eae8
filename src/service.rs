//! Service descriptors and the registry that resolves them.
//!
//! A service is one endpoint of the protocol: either an api (request with
//! exactly one reply) or a notification (one-way message). Frames address
//! services by numeric id; callers address them by name.

use std::{collections::HashMap, fmt, sync::Arc};

/// Identifier of a payload schema understood by the [`Codec`](crate::codec::Codec).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(Arc<str>);

impl SchemaId {
    /// Borrow the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for SchemaId {
    fn from(value: &str) -> Self { Self(Arc::from(value)) }
}

impl From<String> for SchemaId {
    fn from(value: String) -> Self { Self(Arc::from(value)) }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// What kind of endpoint a service is, with its payload schemas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceKind {
    /// Request/response endpoint.
    Api {
        /// Schema of the request body.
        request: SchemaId,
        /// Schema of the response body.
        response: SchemaId,
    },
    /// One-way notification endpoint.
    Msg {
        /// Schema of the notification body.
        body: SchemaId,
    },
}

/// Metadata describing one endpoint.
///
/// # Examples
///
/// ```
/// use callwire::service::ServiceDescriptor;
///
/// let login = ServiceDescriptor::api(7, "Login", "ReqLogin", "ResLogin");
/// assert!(login.is_api());
/// assert_eq!(login.request_schema().map(|s| s.as_str()), Some("ReqLogin"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    id: u32,
    name: String,
    kind: ServiceKind,
}

impl ServiceDescriptor {
    /// Describe an api service.
    #[must_use]
    pub fn api(
        id: u32,
        name: impl Into<String>,
        request: impl Into<SchemaId>,
        response: impl Into<SchemaId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ServiceKind::Api {
                request: request.into(),
                response: response.into(),
            },
        }
    }

    /// Describe a notification service.
    #[must_use]
    pub fn msg(id: u32, name: impl Into<String>, body: impl Into<SchemaId>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ServiceKind::Msg { body: body.into() },
        }
    }

    /// Numeric identifier carried in frame headers.
    #[must_use]
    pub const fn id(&self) -> u32 { self.id }

    /// Symbolic name used for handler lookup.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Endpoint kind and schemas.
    #[must_use]
    pub const fn kind(&self) -> &ServiceKind { &self.kind }

    /// Returns `true` for api services.
    #[must_use]
    pub const fn is_api(&self) -> bool { matches!(self.kind, ServiceKind::Api { .. }) }

    /// Request schema of an api service.
    #[must_use]
    pub const fn request_schema(&self) -> Option<&SchemaId> {
        match &self.kind {
            ServiceKind::Api { request, .. } => Some(request),
            ServiceKind::Msg { .. } => None,
        }
    }

    /// Response schema of an api service.
    #[must_use]
    pub const fn response_schema(&self) -> Option<&SchemaId> {
        match &self.kind {
            ServiceKind::Api { response, .. } => Some(response),
            ServiceKind::Msg { .. } => None,
        }
    }

    /// Body schema of a notification service.
    #[must_use]
    pub const fn msg_schema(&self) -> Option<&SchemaId> {
        match &self.kind {
            ServiceKind::Msg { body } => Some(body),
            ServiceKind::Api { .. } => None,
        }
    }

    /// Schema of the body a peer sends *to* this service: the request for an
    /// api, the body for a notification.
    #[must_use]
    pub const fn inbound_schema(&self) -> &SchemaId {
        match &self.kind {
            ServiceKind::Api { request, .. } => request,
            ServiceKind::Msg { body } => body,
        }
    }
}

/// Read-only lookup of services by id or name.
///
/// Implementations are shared between connections and must not change
/// after construction.
pub trait ServiceRegistry: Send + Sync + 'static {
    /// Resolve a service by numeric id.
    fn by_id(&self, id: u32) -> Option<&ServiceDescriptor>;

    /// Resolve a service by name.
    fn by_name(&self, name: &str) -> Option<&ServiceDescriptor>;

    /// Iterate over every known service.
    fn services(&self) -> Box<dyn Iterator<Item = &ServiceDescriptor> + '_>;
}

/// Errors raised while building a [`ServiceMap`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ServiceMapError {
    /// Two services share an id.
    #[error("service id {0} was already registered")]
    DuplicateId(u32),
    /// Two services share a name.
    #[error("service name {0} was already registered")]
    DuplicateName(String),
}

/// In-memory [`ServiceRegistry`].
///
/// # Examples
///
/// ```
/// use callwire::service::{ServiceDescriptor, ServiceMap, ServiceRegistry};
///
/// let map = ServiceMap::new([
///     ServiceDescriptor::api(7, "Login", "ReqLogin", "ResLogin"),
///     ServiceDescriptor::msg(8, "Chat", "MsgChat"),
/// ])
/// .expect("unique services");
/// assert_eq!(map.by_id(8).map(|s| s.name()), Some("Chat"));
/// assert_eq!(map.by_name("Login").map(|s| s.id()), Some(7));
/// ```
#[derive(Debug, Default)]
pub struct ServiceMap {
    services: Vec<ServiceDescriptor>,
    ids: HashMap<u32, usize>,
    names: HashMap<String, usize>,
}

impl ServiceMap {
    /// Build a map from descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceMapError`] if two descriptors share an id or a name.
    pub fn new(
        services: impl IntoIterator<Item = ServiceDescriptor>,
    ) -> Result<Self, ServiceMapError> {
        let mut map = Self::default();
        for service in services {
            if map.ids.contains_key(&service.id) {
                return Err(ServiceMapError::DuplicateId(service.id));
            }
            if map.names.contains_key(&service.name) {
                return Err(ServiceMapError::DuplicateName(service.name));
            }
            let index = map.services.len();
            map.ids.insert(service.id, index);
            map.names.insert(service.name.clone(), index);
            map.services.push(service);
        }
        Ok(map)
    }

    /// Number of services.
    #[must_use]
    pub fn len(&self) -> usize { self.services.len() }

    /// Returns `true` if the map holds no services.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.services.is_empty() }
}

impl ServiceRegistry for ServiceMap {
    fn by_id(&self, id: u32) -> Option<&ServiceDescriptor> {
        self.ids.get(&id).map(|&index| &self.services[index])
    }

    fn by_name(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.names.get(name).map(|&index| &self.services[index])
    }

    fn services(&self) -> Box<dyn Iterator<Item = &ServiceDescriptor> + '_> {
        Box::new(self.services.iter())
    }
}
