//! Procedure routing on the host.
//!
//! The gateway hands the host an endpoint path and a JSON argument object.
//! [`HostEndpoint`] is the closed set of procedures the host knows; anything
//! else is rejected with [`RouterError::UnknownEndpoint`] and reported back
//! as the call's error.

use crate::error::RouterError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Executes one delivered call.
#[async_trait]
pub trait ProcedureRouter: Send + Sync {
    async fn dispatch(&self, endpoint: &str, data: Value) -> Result<Value, RouterError>;
}

macro_rules! host_endpoints {
    ($($variant:ident => $path:literal,)+) => {
        /// Every procedure the host application exposes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HostEndpoint {
            $($variant,)+
        }

        impl HostEndpoint {
            pub const ALL: &'static [HostEndpoint] = &[$(HostEndpoint::$variant,)+];

            pub fn path(self) -> &'static str {
                match self {
                    $(HostEndpoint::$variant => $path,)+
                }
            }
        }

        impl FromStr for HostEndpoint {
            type Err = RouterError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($path => Ok(HostEndpoint::$variant),)+
                    other => Err(RouterError::UnknownEndpoint(other.to_string())),
                }
            }
        }
    };
}

host_endpoints! {
    // Queries
    FileTree => "/api/file-tree",
    SearchFiles => "/api/search-files",
    PlaceInfo => "/api/place-info",
    Services => "/api/services",
    SearchObjects => "/api/search-objects",
    InstanceProperties => "/api/instance-properties",
    InstanceChildren => "/api/instance-children",
    SearchByProperty => "/api/search-by-property",
    ClassInfo => "/api/class-info",
    ProjectStructure => "/api/project-structure",

    // Properties
    SetProperty => "/api/set-property",
    MassSetProperty => "/api/mass-set-property",
    MassGetProperty => "/api/mass-get-property",
    SetCalculatedProperty => "/api/set-calculated-property",
    SetRelativeProperty => "/api/set-relative-property",

    // Instances
    CreateObject => "/api/create-object",
    MassCreateObjects => "/api/mass-create-objects",
    MassCreateObjectsWithProperties => "/api/mass-create-objects-with-properties",
    DeleteObject => "/api/delete-object",
    SmartDuplicate => "/api/smart-duplicate",
    MassDuplicate => "/api/mass-duplicate",

    // Scripts
    GetScriptSource => "/api/get-script-source",
    SetScriptSource => "/api/set-script-source",
    EditScriptLines => "/api/edit-script-lines",
    InsertScriptLines => "/api/insert-script-lines",
    DeleteScriptLines => "/api/delete-script-lines",

    // Attributes, tags, selection
    GetAttribute => "/api/get-attribute",
    SetAttribute => "/api/set-attribute",
    GetAttributes => "/api/get-attributes",
    DeleteAttribute => "/api/delete-attribute",
    GetTags => "/api/get-tags",
    AddTag => "/api/add-tag",
    RemoveTag => "/api/remove-tag",
    GetTagged => "/api/get-tagged",
    GetSelection => "/api/get-selection",
    ExecuteLuau => "/api/execute-luau",

    // Playtest
    StartPlaytest => "/api/start-playtest",
    StopPlaytest => "/api/stop-playtest",
    GetPlaytestOutput => "/api/get-playtest-output",
}

impl fmt::Display for HostEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

type Procedure = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, RouterError>> + Send + Sync>;

/// `HostEndpoint` to handler map.
///
/// A known endpoint with no registered handler is rejected the same way as
/// an unknown path.
#[derive(Default, Clone)]
pub struct RouteTable {
    routes: HashMap<HostEndpoint, Procedure>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, Fut>(mut self, endpoint: HostEndpoint, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RouterError>> + Send + 'static,
    {
        self.routes
            .insert(endpoint, Arc::new(move |data| handler(data).boxed()));
        self
    }

    pub fn handles(&self, endpoint: HostEndpoint) -> bool {
        self.routes.contains_key(&endpoint)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[async_trait]
impl ProcedureRouter for RouteTable {
    async fn dispatch(&self, endpoint: &str, data: Value) -> Result<Value, RouterError> {
        let parsed: HostEndpoint = endpoint.parse()?;
        let handler = self
            .routes
            .get(&parsed)
            .cloned()
            .ok_or_else(|| RouterError::UnknownEndpoint(endpoint.to_string()))?;
        handler(data).await
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.routes.keys()).finish()
    }
}
