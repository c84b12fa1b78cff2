use switchboard_core::ids::ConnectionId;
use switchboard_core::publish::PublishRequest;

use crate::init::NamespaceRegistry;
use crate::transport::Transport;

/// Why a publish request resolved to no delivery. Never an error: an
/// absent target is an expected outcome on a process that does not hold
/// the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    EmptyNamespace,
    UnknownNamespace,
    AbsentConnection,
}

/// The delivery action a publish request resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    Skip(SkipReason),
    /// Every connection in the namespace.
    Namespace,
    /// Every member of the room within the namespace.
    Room(String),
    /// The one targeted connection.
    Direct(ConnectionId),
    /// The room, scoped to the targeted connection's view (excludes it).
    ConnectionRoom(ConnectionId, String),
    /// Every connection in the target's namespace except the target.
    BroadcastFrom(ConnectionId),
}

/// Decide how a publish request should be delivered against this process's
/// registry snapshot. Pure: no emission, no state change, so resolving the
/// same request twice yields the same decision.
///
/// Priority when a resident connection is targeted: room, then broadcast,
/// then direct.
pub fn resolve(
    req: &PublishRequest,
    registry: &NamespaceRegistry,
    transport: &dyn Transport,
) -> Delivery {
    if req.namespace.is_empty() {
        return Delivery::Skip(SkipReason::EmptyNamespace);
    }
    if !registry.contains(&req.namespace) {
        return Delivery::Skip(SkipReason::UnknownNamespace);
    }

    let Some(connection_id) = req.connection_id.as_ref() else {
        return untargeted(req);
    };

    if transport.connection(connection_id).is_none() {
        // Not resident here. A targeted, non-broadcast publish is dropped;
        // with the broadcast flag it falls back to untargeted delivery.
        if !req.broadcast {
            return Delivery::Skip(SkipReason::AbsentConnection);
        }
        return untargeted(req);
    }

    if let Some(room) = &req.room {
        Delivery::ConnectionRoom(connection_id.clone(), room.clone())
    } else if req.broadcast {
        Delivery::BroadcastFrom(connection_id.clone())
    } else {
        Delivery::Direct(connection_id.clone())
    }
}

fn untargeted(req: &PublishRequest) -> Delivery {
    match &req.room {
        Some(room) => Delivery::Room(room.clone()),
        None => Delivery::Namespace,
    }
}

/// Resolve a publish request and execute the resulting emission. Returns
/// the action taken; a skip is a silent no-op, logged at debug level only.
pub fn deliver(
    req: &PublishRequest,
    registry: &NamespaceRegistry,
    transport: &dyn Transport,
) -> Delivery {
    let delivery = resolve(req, registry, transport);

    match &delivery {
        Delivery::Skip(reason) => {
            tracing::debug!(
                event = %req.event,
                namespace = %req.namespace,
                reason = ?reason,
                "publish resolved to no delivery"
            );
        }
        Delivery::Namespace => {
            if let Some(ns) = registry.get(&req.namespace) {
                ns.emit(&req.event, &req.payload);
            }
        }
        Delivery::Room(room) => {
            if let Some(ns) = registry.get(&req.namespace) {
                ns.emit_to_room(room, &req.event, &req.payload);
            }
        }
        Delivery::Direct(id) => {
            if let Some(conn) = transport.connection(id) {
                conn.emit(&req.event, &req.payload);
            }
        }
        Delivery::ConnectionRoom(id, room) => {
            if let Some(conn) = transport.connection(id) {
                conn.emit_to_room(room, &req.event, &req.payload);
            }
        }
        Delivery::BroadcastFrom(id) => {
            if let Some(conn) = transport.connection(id) {
                conn.emit_broadcast(&req.event, &req.payload);
            }
        }
    }

    delivery
}
