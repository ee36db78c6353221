//! Address-prefix routing from a connection's first message to a service.

use std::time::Duration;

use meshpath_apps::{ChatService, GameService, LOGIN_PREFIX, LoginService, WIKI_PREFIX, WikiService, game_from_name};
use meshpath_service::{ServiceHandle, ServiceRegistry};

/// Which service family an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// One shared [`LoginService`] for the namespace.
    Login,
    /// One [`ChatService`] per exact address.
    Chat,
    /// One shared [`WikiService`] for the namespace.
    Wiki,
    /// One [`GameService`] table per exact address, replaced once a game
    /// has finished.
    Game,
}

/// Maps an address prefix to a service family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRule {
    pub prefix: &'static str,
    pub kind: ServiceKind,
}

/// The routing table, in priority order.
pub const ROUTES: [RouteRule; 4] = [
    RouteRule { prefix: LOGIN_PREFIX, kind: ServiceKind::Login },
    RouteRule { prefix: "/chat/", kind: ServiceKind::Chat },
    RouteRule { prefix: WIKI_PREFIX, kind: ServiceKind::Wiki },
    RouteRule { prefix: "/game/", kind: ServiceKind::Game },
];

/// Returns the first rule whose prefix starts `address`.
pub fn rule_for(address: &str) -> Option<&'static RouteRule> {
    ROUTES.iter().find(|rule| address.starts_with(rule.prefix))
}

/// Resolves addresses to live service instances.
///
/// Lookups and creations go through the [`ServiceRegistry`], which
/// guarantees one instance per key even when connections race.
pub struct Router {
    registry: ServiceRegistry,
    move_timeout: Option<Duration>,
}

impl Router {
    /// `move_timeout` is handed to every new game table.
    pub fn new(registry: ServiceRegistry, move_timeout: Option<Duration>) -> Self {
        Self { registry, move_timeout }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Finds or creates the service for `address`.
    ///
    /// `None` means nothing serves this address: no rule matches, the
    /// chat room name is empty, or the game type is unknown. The caller
    /// closes the connection.
    pub async fn resolve(&self, address: &str) -> Option<ServiceHandle> {
        let rule = rule_for(address)?;
        let rest = &address[rule.prefix.len()..];

        let handle = match rule.kind {
            ServiceKind::Login => self.registry.get_shared(rule.prefix, LoginService::new).await,
            ServiceKind::Wiki => self.registry.get_shared(rule.prefix, WikiService::new).await,
            ServiceKind::Chat => {
                if rest.is_empty() {
                    return None;
                }
                self.registry
                    .get_or_create(address, || ChatService::new(address))
                    .await
            }
            ServiceKind::Game => {
                let game = game_from_name(rest)?;
                let move_timeout = self.move_timeout;
                self.registry
                    .get_or_create(address, move || GameService::new(game, move_timeout))
                    .await
            }
        };
        Some(handle)
    }
}
