//! Walk a simulated card from PIN-locked to ready
//!
//! Drives the controller and facade against a loopback radio channel:
//! deliver a PIN-locked card status, supply the PIN, deliver the Ready
//! status, and watch the externally visible transitions.

use std::sync::Arc;

use simtrack_core::{BroadcastSink, MemorySettings};
use simtrack_radio::{
    AppStatusReport, AppType, CardPresence, CardStatusReport, CommandChannel, Indication,
    MockChannel, Payload, PinState, RawAppState, Request,
};
use simtrack_uicc::{CardController, CardFacade};

/// Sink that prints every broadcast
struct PrintSink;

impl BroadcastSink for PrintSink {
    fn broadcast(&self, state: &str, reason: Option<&str>) {
        match reason {
            Some(reason) => println!("broadcast: {state} ({reason})"),
            None => println!("broadcast: {state}"),
        }
    }
}

fn status(state: RawAppState, pin1: PinState) -> CardStatusReport {
    CardStatusReport {
        card_state: CardPresence::Present,
        universal_pin_state: PinState::Unknown,
        gsm_umts_index: 0,
        cdma_index: -1,
        ims_index: -1,
        applications: vec![AppStatusReport {
            aid: Some("A0000000871002".into()),
            pin1,
            ..AppStatusReport::new(AppType::Usim, state)
        }],
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let channel = Arc::new(MockChannel::new());
    let controller = CardController::new(
        vec![Arc::clone(&channel) as Arc<dyn CommandChannel>],
        Arc::new(MemorySettings::new()),
    )?;
    let facade = CardFacade::new(controller, 0, Arc::new(PrintSink));

    // The radio announces a card; the controller re-queries and we answer
    // with a PIN-locked USIM
    channel.indicate(Indication::CardStatusChanged);
    channel.complete_first(
        |r| matches!(r, Request::CardStatus),
        Ok(Payload::CardStatus(status(
            RawAppState::Pin,
            PinState::EnabledNotVerified,
        ))),
    );
    facade.pump();
    println!("external state: {:?}", facade.external_state());

    // Supply the PIN; the radio accepts it and pushes a fresh status
    facade.supply_pin(
        "1234",
        Box::new(|outcome| println!("supply_pin -> {:?}", outcome.result)),
    );
    channel.complete_first(
        |r| matches!(r, Request::SupplyPin { .. }),
        Ok(Payload::Empty),
    );

    channel.indicate(Indication::CardStatusChanged);
    channel.complete_first(
        |r| matches!(r, Request::CardStatus),
        Ok(Payload::CardStatus(status(
            RawAppState::Ready,
            PinState::EnabledVerified,
        ))),
    );
    facade.pump();
    println!("external state: {:?}", facade.external_state());

    Ok(())
}
