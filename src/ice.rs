//! ICE server discovery and the per-routing-class server store.

use crate::request::{IqClient, IqError};
use jcore::ice::{IcePolicy, IceServer, IceServiceDescriptor};
use jcore::iq::extdisco::ExtDiscoSpec;
use jcore::jid::Jid;
use jcore::types::session::RoutingClass;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// ICE servers currently configured for each routing class. Sessions copy
/// their list at creation, so later updates never reach them.
#[derive(Debug, Default, Clone)]
pub struct IceConfigStore {
    servers: Arc<RwLock<HashMap<RoutingClass, Vec<IceServer>>>>,
}

impl IceConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, routing: RoutingClass, servers: Vec<IceServer>) {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(routing, servers);
    }

    pub fn servers_for(&self, routing: RoutingClass) -> Vec<IceServer> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&routing)
            .cloned()
            .unwrap_or_default()
    }
}

/// Asks the signaling server for STUN/TURN services and feeds the
/// filtered result into an [`IceConfigStore`].
pub struct IceCredentialNegotiator {
    client: Arc<IqClient>,
    domain: Jid,
    policy: IcePolicy,
    store: IceConfigStore,
}

impl IceCredentialNegotiator {
    pub fn new(client: Arc<IqClient>, domain: Jid, policy: IcePolicy, store: IceConfigStore) -> Self {
        Self {
            client,
            domain,
            policy,
            store,
        }
    }

    pub async fn fetch_credentials(&self) -> Result<Vec<IceServiceDescriptor>, IqError> {
        self.client.execute(&ExtDiscoSpec::new(self.domain.clone())).await
    }

    /// Fetches services and updates the store for every routing class the
    /// policy enables. A failed fetch leaves the store as it was.
    pub async fn refresh(&self) -> bool {
        let services = match self.fetch_credentials().await {
            Ok(services) => services,
            Err(e) => {
                warn!(target: "Jingle/Ice", "Failed to get ICE servers from {}: {e}", self.domain);
                warn!(
                    target: "Jingle/Ice",
                    "The server should expose a TURN credentials module (external service discovery)"
                );
                return false;
            }
        };

        for routing in [RoutingClass::Relayed, RoutingClass::PeerToPeer] {
            if let Some(servers) = self.policy.filter(routing, &services) {
                info!(
                    target: "Jingle/Ice",
                    "Configured {} ICE servers for {routing:?} sessions",
                    servers.len()
                );
                self.store.set(routing, servers);
            }
        }
        true
    }
}
