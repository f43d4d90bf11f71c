//! Application entry point for scoped-events.
//!
//! Wires a dispatcher to the configured application and shows app- and
//! request-scoped delivery.

use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use log::debug;
use log::info;
use scoped_events::config::Config;
use scoped_events::context::ContextStack;
use scoped_events::event::Event;
use scoped_events::event::dispatcher::EventDispatcher;
use scoped_events::impl_event;
use scoped_events::logging::setup_logging;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct OrderCreated {
    id: Uuid,
}

#[derive(Clone, Debug)]
struct OrderShipped {
    id: Uuid,
    carrier: String,
}

impl_event!(OrderCreated, OrderShipped);

fn main() -> Result<()> {
    dotenv().ok();

    let config = load_config()?;
    let _log_flush = setup_logging(&config)?;
    info!("Starting scoped-events for {}...", config.app_name);

    let requests = Arc::new(ContextStack::new());
    let dispatcher = setup_dispatcher(&config, requests.clone())?;

    let order = OrderCreated { id: Uuid::new_v4() };
    dispatcher.dispatch(&order, None)?;

    {
        let request = format!("request-{}", Uuid::new_v4());
        let _scope = requests.enter(request.clone());
        dispatcher.subscribe(
            move |event: &OrderShipped| {
                info!("[{}] {} shipped via {}", request, event.id, event.carrier);
                Ok(())
            },
            None,
        )?;
        dispatcher.dispatch(
            &OrderShipped {
                id: order.id,
                carrier: "post".to_string(),
            },
            None,
        )?;
    }

    // Outside the request scope nothing listens for shipments.
    dispatcher.dispatch(
        &OrderShipped {
            id: order.id,
            carrier: "courier".to_string(),
        },
        None,
    )?;

    info!("Done.");
    Ok(())
}

fn load_config() -> Result<Config> {
    debug!("Loading configuration...");
    let config = Config::new();
    config.validate()?;
    Ok(config)
}

fn setup_dispatcher(
    config: &Config,
    requests: Arc<ContextStack<String>>,
) -> Result<EventDispatcher<String>> {
    debug!("Setting up dispatcher...");
    let dispatcher =
        EventDispatcher::new(Some(config.app_name.clone())).with_context_provider(requests);

    dispatcher.subscribe(
        |event: &OrderCreated| {
            info!("{} {}", event.event_name(), event.id);
            Ok(())
        },
        None,
    )?;

    Ok(dispatcher)
}
