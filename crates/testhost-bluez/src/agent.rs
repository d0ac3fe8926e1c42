//! Bridge from bluer agent callbacks to a [`PairingRequestHandler`].
//!
//! bluer derives the advertised I/O capability from which callbacks are
//! installed, so each capability installs exactly the set that makes bluer
//! advertise it; see [`CallbackSet::advertised`]. Every callback is turned into a
//! [`PairingRequest`] and the handler's answer is mapped back to a bluer
//! result.

use std::sync::Arc;

use bluer::agent::{
    Agent, AuthorizeService, DisplayPasskey, DisplayPinCode, ReqError, ReqResult,
    RequestAuthorization, RequestConfirmation, RequestPasskey, RequestPinCode,
};
use testhost_core::{
    AgentResponse, Capability, PairingRequest, PairingRequestHandler, RequestKind,
};
use tracing::debug;

use crate::device::from_bluer_address;

/// Callbacks a device with `capability` can service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackSet {
    pub pin: bool,
    pub passkey: bool,
    pub display: bool,
    pub confirmation: bool,
    pub authorization: bool,
    pub authorize_service: bool,
}

impl CallbackSet {
    pub fn for_capability(capability: Capability) -> Self {
        match capability {
            Capability::KeyboardDisplay => Self {
                pin: true,
                passkey: true,
                display: true,
                confirmation: true,
                authorization: true,
                authorize_service: true,
            },
            Capability::KeyboardOnly => Self {
                pin: true,
                passkey: true,
                display: false,
                confirmation: false,
                authorization: false,
                authorize_service: false,
            },
            Capability::DisplayYesNo => Self {
                pin: false,
                passkey: false,
                display: true,
                confirmation: true,
                authorization: true,
                authorize_service: true,
            },
            Capability::DisplayOnly => Self {
                pin: false,
                passkey: false,
                display: true,
                confirmation: false,
                authorization: false,
                authorize_service: false,
            },
            // The daemon answers every request itself.
            Capability::NoInputNoOutput => Self {
                pin: false,
                passkey: false,
                display: false,
                confirmation: false,
                authorization: false,
                authorize_service: false,
            },
        }
    }

    /// Capability bluer registers for these callbacks.
    pub fn advertised(&self) -> Capability {
        let keyboard = self.pin || self.passkey;
        let yes_no = self.confirmation || self.authorization || self.authorize_service;

        match (keyboard, self.display, yes_no) {
            (true, false, false) => Capability::KeyboardOnly,
            (false, true, false) => Capability::DisplayOnly,
            (false, _, true) => Capability::DisplayYesNo,
            (true, true, _) | (true, _, true) => Capability::KeyboardDisplay,
            (false, false, false) => Capability::NoInputNoOutput,
        }
    }
}

/// Object path of `device` on `adapter`, as the handler expects it.
fn device_ref(adapter: &str, device: bluer::Address) -> String {
    from_bluer_address(device).to_device_path(adapter)
}

fn rejected<T>(response: &AgentResponse) -> ReqResult<T> {
    debug!("Agent request answered with {:?}", response);
    Err(ReqError::Rejected)
}

fn expect_pin(response: AgentResponse) -> ReqResult<String> {
    match response {
        AgentResponse::Pin(pin) => Ok(pin),
        other => rejected(&other),
    }
}

fn expect_passkey(response: AgentResponse) -> ReqResult<u32> {
    match response {
        AgentResponse::Passkey(passkey) => Ok(passkey),
        other => rejected(&other),
    }
}

fn expect_accepted(response: AgentResponse) -> ReqResult<()> {
    match response {
        AgentResponse::Accepted => Ok(()),
        other => rejected(&other),
    }
}

/// Display callbacks only need to be acknowledged.
fn acknowledge(_response: AgentResponse) -> ReqResult<()> {
    Ok(())
}

/// Build a bluer agent forwarding to `handler`.
pub fn build_agent(capability: Capability, handler: Arc<dyn PairingRequestHandler>) -> Agent {
    let callbacks = CallbackSet::for_capability(capability);
    let mut agent = Agent {
        request_default: true,
        ..Default::default()
    };

    if callbacks.pin {
        let handler = handler.clone();
        agent.request_pin_code = Some(Box::new(move |req: RequestPinCode| {
            let handler = handler.clone();
            Box::pin(async move {
                let request =
                    PairingRequest::new(RequestKind::Pin, device_ref(&req.adapter, req.device));
                expect_pin(handler.handle_pairing_request(request).await)
            })
        }));
    }

    if callbacks.passkey {
        let handler = handler.clone();
        agent.request_passkey = Some(Box::new(move |req: RequestPasskey| {
            let handler = handler.clone();
            Box::pin(async move {
                let request =
                    PairingRequest::new(RequestKind::Passkey, device_ref(&req.adapter, req.device));
                expect_passkey(handler.handle_pairing_request(request).await)
            })
        }));
    }

    if callbacks.display {
        let pin_handler = handler.clone();
        agent.display_pin_code = Some(Box::new(move |req: DisplayPinCode| {
            let handler = pin_handler.clone();
            Box::pin(async move {
                let request =
                    PairingRequest::new(RequestKind::DisplayPin, device_ref(&req.adapter, req.device))
                        .with_uuid(req.pincode);
                acknowledge(handler.handle_pairing_request(request).await)
            })
        }));

        let passkey_handler = handler.clone();
        agent.display_passkey = Some(Box::new(move |req: DisplayPasskey| {
            let handler = passkey_handler.clone();
            Box::pin(async move {
                let request = PairingRequest::new(
                    RequestKind::DisplayPasskey,
                    device_ref(&req.adapter, req.device),
                )
                .with_passkey(req.passkey);
                acknowledge(handler.handle_pairing_request(request).await)
            })
        }));
    }

    if callbacks.confirmation {
        let handler = handler.clone();
        agent.request_confirmation = Some(Box::new(move |req: RequestConfirmation| {
            let handler = handler.clone();
            Box::pin(async move {
                let request =
                    PairingRequest::new(RequestKind::Confirm, device_ref(&req.adapter, req.device))
                        .with_passkey(req.passkey);
                expect_accepted(handler.handle_pairing_request(request).await)
            })
        }));
    }

    if callbacks.authorization {
        let handler = handler.clone();
        agent.request_authorization = Some(Box::new(move |req: RequestAuthorization| {
            let handler = handler.clone();
            Box::pin(async move {
                let request =
                    PairingRequest::new(RequestKind::Authorize, device_ref(&req.adapter, req.device));
                expect_accepted(handler.handle_pairing_request(request).await)
            })
        }));
    }

    if callbacks.authorize_service {
        agent.authorize_service = Some(Box::new(move |req: AuthorizeService| {
            let handler = handler.clone();
            Box::pin(async move {
                let request =
                    PairingRequest::new(RequestKind::Authorize, device_ref(&req.adapter, req.device))
                        .with_uuid(req.service.to_string());
                expect_accepted(handler.handle_pairing_request(request).await)
            })
        }));
    }

    agent
}
