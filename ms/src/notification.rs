//! Mapping refresh notification message
//!
//! A worker raises one of these when its local copy of a resource's mapping
//! may be stale. The wire layout is three length-prefixed strings in a fixed
//! order: resource name, originating node id, resource instance id. The order
//! must not change between versions.

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{MessageError, get_string, put_string};

/// Endpoint the coordinator registers the refresh dispatcher under
pub const MAPPING_REFRESH_ENDPOINT: &str = "internal:cluster/node/mapping/refresh";

/// Instance id used when the resource incarnation concept does not apply
pub const INSTANCE_ID_NA: &str = "_na_";

/// Notification that a worker's view of a resource mapping may be out of date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    resource_name: String,
    resource_instance_id: String,
    originating_node_id: String,
}

impl Notification {
    /// Build a notification with the "not applicable" instance id
    pub fn new(resource_name: impl Into<String>, originating_node_id: impl Into<String>) -> Result<Self, MessageError> {
        let resource_name = resource_name.into();
        let originating_node_id = originating_node_id.into();
        debug!(%resource_name, %originating_node_id, "Notification::new: called");
        if resource_name.is_empty() {
            return Err(MessageError::EmptyResourceName);
        }
        Ok(Self {
            resource_name,
            resource_instance_id: INSTANCE_ID_NA.to_string(),
            originating_node_id,
        })
    }

    /// Tag the notification with a specific resource instance
    pub fn with_instance_id(mut self, resource_instance_id: impl Into<String>) -> Self {
        self.resource_instance_id = resource_instance_id.into();
        self
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn resource_instance_id(&self) -> &str {
        &self.resource_instance_id
    }

    pub fn originating_node_id(&self) -> &str {
        &self.originating_node_id
    }

    /// Resources this notification targets (always exactly one)
    pub fn resources(&self) -> [&str; 1] {
        [self.resource_name.as_str()]
    }

    /// True when the instance id is the "not applicable" sentinel
    pub fn instance_id_is_na(&self) -> bool {
        self.resource_instance_id == INSTANCE_ID_NA
    }

    /// Serialize to the wire layout
    pub fn encode(&self) -> Result<Bytes, MessageError> {
        let capacity = self.resource_name.len() + self.originating_node_id.len() + self.resource_instance_id.len() + 15;
        let mut buf = BytesMut::with_capacity(capacity);
        put_string(&mut buf, &self.resource_name)?;
        put_string(&mut buf, &self.originating_node_id)?;
        put_string(&mut buf, &self.resource_instance_id)?;
        Ok(buf.freeze())
    }

    /// Parse from the wire layout; the payload must be consumed exactly
    pub fn decode(mut payload: Bytes) -> Result<Self, MessageError> {
        debug!(len = payload.len(), "Notification::decode: called");
        let resource_name = get_string(&mut payload, "resource name")?;
        let originating_node_id = get_string(&mut payload, "originating node id")?;
        let resource_instance_id = get_string(&mut payload, "resource instance id")?;

        if payload.has_remaining() {
            return Err(MessageError::TrailingBytes(payload.remaining()));
        }
        if resource_name.is_empty() {
            return Err(MessageError::EmptyResourceName);
        }

        Ok(Self {
            resource_name,
            resource_instance_id,
            originating_node_id,
        })
    }
}
