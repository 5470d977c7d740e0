use std::sync::Arc;

use async_trait::async_trait;
use tb_core::{
    BusEvent, CHANNEL_TEAMS, Direction, Flow, Middleware, MiddlewareChain, MiddlewareError,
    MiddlewareRegistration,
};
use tracing::trace;

use crate::registry::ClientRegistry;

pub const MIDDLEWARE_NAME: &str = "teams.sendMessages";
pub const MIDDLEWARE_DESCRIPTION: &str = "Sends out messages that targets platform = teams";
/// Lowest order the outgoing handler registers at.
pub const BASE_ORDER: i32 = 100;

/// Outgoing handler that routes events for the Teams channel to the owning bot's client.
pub struct TeamsOutgoingMiddleware {
    clients: ClientRegistry,
}

impl TeamsOutgoingMiddleware {
    pub fn new(clients: ClientRegistry) -> Self {
        Self { clients }
    }
}

#[async_trait]
impl Middleware for TeamsOutgoingMiddleware {
    async fn handle(&self, event: &mut BusEvent) -> Flow {
        if event.channel != CHANNEL_TEAMS {
            return Flow::next();
        }
        let Some(client) = self.clients.get(&event.bot_id) else {
            trace!(bot_id = %event.bot_id, "no teams client mounted for bot");
            return Flow::next();
        };

        match client.send_outgoing_event(event).await {
            Ok(_) => Flow::handled(),
            Err(err) => Flow::fail(err),
        }
    }
}

/// Registers the Teams outgoing handler after every outgoing handler already present, and
/// never below [`BASE_ORDER`]. Returns the order used.
pub fn register_outgoing(
    chain: &MiddlewareChain,
    clients: ClientRegistry,
) -> Result<i32, MiddlewareError> {
    let order = chain
        .highest_order(Direction::Outgoing)
        .map(|highest| highest.saturating_add(1))
        .unwrap_or(BASE_ORDER)
        .max(BASE_ORDER);

    chain.register(MiddlewareRegistration {
        name: MIDDLEWARE_NAME.to_string(),
        description: MIDDLEWARE_DESCRIPTION.to_string(),
        direction: Direction::Outgoing,
        order,
        handler: Arc::new(TeamsOutgoingMiddleware::new(clients)),
    })?;
    Ok(order)
}
