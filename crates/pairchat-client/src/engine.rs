//! Peer protocol engine.
//!
//! The engine is a state machine. Each state's step performs the I/O for
//! that phase (prompting, sending, waiting on the relay) and yields a
//! [`PeerEvent`]; [`transition`] then picks the next state. Keeping the
//! table pure means every legal path can be checked without a socket.
//!
//! ```text
//! Connecting -> Naming -> Menu -> Browsing -> Requesting -> Chatting
//!                          |  \-> Waiting  -> Offered    -> Chatting
//!                          \-> Closed
//! ```

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use pairchat_core::PeerId;
use pairchat_protocol::{EXIT, MessageKind, NOBODY_ONLINE, Nickname, Reply, Request, encode_datagram};

use crate::config::PeerConfig;
use crate::console::Console;
use crate::error::{ClientError, ClientResult};
use crate::session::{ChatRole, ChatSession};
use crate::socket::{Received, Transport};

/// Typed by the user to leave the connect or waiting room.
const BACK: &str = "_back";

/// Prompt label used when the user chose no name.
const DEFAULT_LABEL: &str = "You";

/// Phase of the peer's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Naming,
    Menu,
    Browsing,
    Waiting,
    Requesting { target: PeerId },
    Offered { from: PeerId, nickname: String },
    Chatting { partner: String, role: ChatRole },
    Closed,
}

/// Outcome of one state's step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Granted,
    Refused,
    Named,
    ChoseBrowse,
    ChoseWait,
    ChoseExit,
    Back,
    Picked(PeerId),
    OfferReceived { from: PeerId, nickname: String },
    Accepted { partner: String },
    Rejected,
    OfferAccepted,
    ChatEnded,
    ChatLost,
    InputClosed,
}

/// Returns the state that follows `state` on `event`, or `None` if the
/// pair is not part of the protocol.
pub fn transition(state: &PeerState, event: &PeerEvent) -> Option<PeerState> {
    use PeerEvent as E;
    use PeerState as S;

    let next = match (state, event) {
        (S::Closed, _) => return None,
        (_, E::InputClosed) => S::Closed,
        (S::Connecting, E::Granted) => S::Naming,
        (S::Connecting, E::Refused) => S::Connecting,
        (S::Naming, E::Named) => S::Menu,
        (S::Menu, E::ChoseBrowse) => S::Browsing,
        (S::Menu, E::ChoseWait) => S::Waiting,
        (S::Menu, E::ChoseExit) => S::Closed,
        (S::Browsing | S::Waiting, E::Back) => S::Menu,
        (S::Browsing, E::Picked(target)) => S::Requesting { target: *target },
        (S::Browsing | S::Waiting | S::Requesting { .. }, E::OfferReceived { from, nickname }) => {
            S::Offered {
                from: *from,
                nickname: nickname.clone(),
            }
        }
        (S::Requesting { .. }, E::Accepted { partner }) => S::Chatting {
            partner: partner.clone(),
            role: ChatRole::Initiator,
        },
        (S::Requesting { .. }, E::Rejected) => S::Browsing,
        (S::Offered { nickname, .. }, E::OfferAccepted) => S::Chatting {
            partner: nickname.clone(),
            role: ChatRole::Responder,
        },
        (S::Offered { .. }, E::Rejected) => S::Menu,
        (S::Chatting { .. }, E::ChatEnded | E::ChatLost) => S::Menu,
        _ => return None,
    };
    Some(next)
}

fn parse_decision(line: &str) -> Option<bool> {
    match line.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Drives one peer from connection to exit.
pub struct PeerEngine<T, C> {
    transport: T,
    console: C,
    config: PeerConfig,
    state: PeerState,
    label: String,
}

impl<T: Transport, C: Console> PeerEngine<T, C> {
    pub fn new(transport: T, console: C, config: PeerConfig) -> Self {
        Self {
            transport,
            console,
            config,
            state: PeerState::Connecting,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    /// Returns the transport and console, consuming the engine.
    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.console)
    }

    /// Runs until the user exits or input closes.
    ///
    /// Closing input mid-session still tells the relay the peer is leaving.
    pub async fn run(&mut self) -> ClientResult<()> {
        info!(relay = %self.config.relay, "Peer starting");
        while self.state != PeerState::Closed {
            let event = match self.step().await {
                Ok(event) => event,
                Err(ClientError::Closed) => {
                    self.leave().await;
                    PeerEvent::InputClosed
                }
                Err(e) => return Err(e),
            };
            self.apply(event);
        }
        info!("Peer stopped");
        Ok(())
    }

    /// Applies an event through the transition table.
    pub fn apply(&mut self, event: PeerEvent) {
        match transition(&self.state, &event) {
            Some(next) => {
                debug!(from = ?self.state, to = ?next, ?event, "State transition");
                self.state = next;
            }
            None => warn!(state = ?self.state, ?event, "Event has no transition, ignored"),
        }
    }

    async fn step(&mut self) -> ClientResult<PeerEvent> {
        match self.state.clone() {
            PeerState::Connecting => self.connect().await,
            PeerState::Naming => self.choose_name().await,
            PeerState::Menu => self.menu().await,
            PeerState::Browsing => self.browse().await,
            PeerState::Waiting => self.wait_for_offer().await,
            PeerState::Requesting { target } => self.request(target).await,
            PeerState::Offered { from, nickname } => self.answer_offer(from, &nickname).await,
            PeerState::Chatting { partner, role } => self.chat(ChatSession::new(partner, role)).await,
            PeerState::Closed => Ok(PeerEvent::InputClosed),
        }
    }

    async fn connect(&mut self) -> ClientResult<PeerEvent> {
        self.show("Connecting to the relay...");
        self.send(Request::ConnectionRequest).await?;

        match self.receive(self.config.receive_timeout).await? {
            Some(Reply::ConnectionGranted) => {
                self.show("\nConnection successful!");
                Ok(PeerEvent::Granted)
            }
            other => {
                debug!(reply = ?other, "Connection not granted");
                self.show(&format!(
                    "\nServer is busy, attempting to reconnect in {} seconds...",
                    self.config.retry_delay.as_secs()
                ));
                tokio::time::sleep(self.config.retry_delay).await;
                Ok(PeerEvent::Refused)
            }
        }
    }

    async fn choose_name(&mut self) -> ClientResult<PeerEvent> {
        let nickname = match self.config.name.clone() {
            Some(name) => {
                Some(Nickname::parse(&name).map_err(|e| ClientError::Config(e.to_string()))?)
            }
            None => self.prompt_name().await?,
        };
        self.label = nickname
            .as_ref()
            .map_or_else(|| DEFAULT_LABEL.to_string(), |n| n.to_string());

        let request = Request::nickname(nickname.as_ref());
        for attempt in 1..=self.config.max_send_attempts {
            self.send(request.clone()).await?;
            match self.receive(self.config.receive_timeout).await? {
                Some(Reply::Success) => return Ok(PeerEvent::Named),
                other => debug!(attempt, reply = ?other, "Nickname not confirmed"),
            }
        }
        Err(ClientError::Timeout("relay did not confirm the nickname".into()))
    }

    async fn prompt_name(&mut self) -> ClientResult<Option<Nickname>> {
        self.console.clear();
        self.show("Welcome to pairchat");
        self.show("What display name do you want?");
        loop {
            let line = self.input().await?;
            let Some(token) = line.split_whitespace().next() else {
                return Ok(None);
            };
            match Nickname::parse(token) {
                Ok(nickname) => return Ok(Some(nickname)),
                Err(e) => self.show(&format!("Invalid name: {}", e)),
            }
        }
    }

    async fn menu(&mut self) -> ClientResult<PeerEvent> {
        self.show("Type '_exit' to exit the program");
        self.show("\nDo you want to be placed in a waiting room or connect room?");
        self.show("Enter 1 for 'connect room', 0 for 'wait room'");
        loop {
            let line = self.input().await?;
            match line.trim() {
                "1" => return Ok(PeerEvent::ChoseBrowse),
                "0" => return Ok(PeerEvent::ChoseWait),
                EXIT => {
                    self.send(Request::Exit).await?;
                    return Ok(PeerEvent::ChoseExit);
                }
                _ => self.show("Invalid Input: Enter 1 for 'connect room', 0 for 'wait room'"),
            }
        }
    }

    async fn browse(&mut self) -> ClientResult<PeerEvent> {
        loop {
            self.console.clear();
            self.show("Welcome to the Connect Room!");
            self.show("Enter '_back' to exit to the menu");
            self.show("Clients Online:");
            self.send(Request::OnlineRequest).await?;

            match self.receive(self.config.receive_timeout).await? {
                Some(Reply::Roster(roster)) if !roster.is_empty() => {
                    for (i, entry) in roster.iter().enumerate() {
                        self.show(&format!("[{}] {} ==> {}", i + 1, entry.peer, entry.nickname));
                    }
                    self.show("\nWho would you like to connect to?");
                    let line = self.input().await?;
                    let line = line.trim();
                    if line == BACK {
                        return Ok(PeerEvent::Back);
                    }
                    let picked = line
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| i.checked_sub(1))
                        .and_then(|i| roster.get(i));
                    match picked {
                        Some(entry) => return Ok(PeerEvent::Picked(entry.peer)),
                        None => self.show("Invalid Input: please enter a valid integer"),
                    }
                }
                Some(Reply::ClientAck { nickname, from }) => {
                    return Ok(PeerEvent::OfferReceived { from, nickname });
                }
                reply => {
                    match reply {
                        Some(Reply::Roster(_)) => self.show(NOBODY_ONLINE),
                        other => {
                            debug!(reply = ?other, "No roster received");
                            self.show("No answer from the relay.");
                        }
                    }
                    self.show("\nPress enter to refresh the list");
                    if self.input().await?.trim() == BACK {
                        return Ok(PeerEvent::Back);
                    }
                }
            }
        }
    }

    async fn wait_for_offer(&mut self) -> ClientResult<PeerEvent> {
        self.console.clear();
        self.show("Welcome to the Waiting Room!");
        self.show("Enter '_back' to exit to the menu");
        loop {
            self.show("\nWaiting to be connected with...");
            match self.receive(self.config.receive_timeout).await? {
                Some(Reply::ClientAck { nickname, from }) => {
                    return Ok(PeerEvent::OfferReceived { from, nickname });
                }
                Some(other) => debug!(reply = ?other, "Unexpected reply while waiting"),
                None => {
                    self.show("\nType '_back' to return to menu or press enter to continue waiting");
                    let label = self.prompt_label();
                    let line = self
                        .console
                        .prompt_within(&label, self.config.receive_timeout)
                        .await?;
                    if line.as_deref().map(str::trim) == Some(BACK) {
                        return Ok(PeerEvent::Back);
                    }
                }
            }
        }
    }

    async fn request(&mut self, target: PeerId) -> ClientResult<PeerEvent> {
        self.send(Request::ClientRequest { target }).await?;
        self.show("\nWaiting for their response...");

        let deadline = Instant::now() + self.config.negotiation_timeout;
        let mut forwarded = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.receive(remaining).await? {
                Some(Reply::Waiting) => {
                    debug!(target = %target, "Request forwarded");
                    forwarded = true;
                }
                Some(Reply::PartnerNickname(partner)) => {
                    self.show("\nConnection successful!");
                    return Ok(PeerEvent::Accepted { partner });
                }
                Some(Reply::ClientAck { nickname, from }) => {
                    // Crossed requests: the relay refuses ours, and that
                    // refusal must not be read as the answer to the offer.
                    if !forwarded {
                        self.skip_request_answer().await?;
                    }
                    return Ok(PeerEvent::OfferReceived { from, nickname });
                }
                Some(Reply::ConnectionFailure) | None => break,
                Some(other) => debug!(reply = ?other, "Unexpected reply while negotiating"),
            }
        }

        self.show("\nRequest Denied");
        Ok(PeerEvent::Rejected)
    }

    async fn answer_offer(&mut self, from: PeerId, nickname: &str) -> ClientResult<PeerEvent> {
        self.show(&format!("\n\n{} ({}) is requesting to connect with you", nickname, from));
        self.show("Do you accept the request?\n1 for 'accept', 0 for 'reject'");

        let accept = match self.decide_within(self.config.decision_window).await? {
            Some(accept) => accept,
            None => {
                self.show("\nRequest timed out");
                false
            }
        };
        self.send(Request::ClientAckResponse { accept }).await?;

        let reply = self.negotiation_outcome().await?;
        if !accept {
            debug!(reply = ?reply, "Offer declined");
            self.show("\nConnection Denied");
            return Ok(PeerEvent::Rejected);
        }
        match reply {
            Some(Reply::ConnectionSuccess) => {
                self.show("\nConnection successful!");
                Ok(PeerEvent::OfferAccepted)
            }
            other => {
                debug!(reply = ?other, "Pairing not confirmed");
                self.show("\nConnection failed");
                Ok(PeerEvent::Rejected)
            }
        }
    }

    /// Consumes the relay's answer to our own `client_request`.
    async fn skip_request_answer(&mut self) -> ClientResult<()> {
        loop {
            match self.receive(self.config.receive_timeout).await? {
                Some(Reply::Waiting | Reply::ConnectionFailure) | None => return Ok(()),
                Some(other) => debug!(reply = ?other, "Unexpected reply while negotiating"),
            }
        }
    }

    /// Waits for `connection_success` or `connection_failure`, skipping
    /// replies to earlier requests such as a late roster.
    async fn negotiation_outcome(&mut self) -> ClientResult<Option<Reply>> {
        let deadline = Instant::now() + self.config.receive_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.receive(remaining).await? {
                Some(reply @ (Reply::ConnectionSuccess | Reply::ConnectionFailure)) => {
                    return Ok(Some(reply));
                }
                Some(other) => debug!(reply = ?other, "Stale reply skipped"),
                None => return Ok(None),
            }
        }
    }

    /// Prompts for `1`/`0` until `window` runs out.
    async fn decide_within(&mut self, window: Duration) -> ClientResult<Option<bool>> {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let label = self.prompt_label();
            match self.console.prompt_within(&label, remaining).await? {
                None => return Ok(None),
                Some(line) => match parse_decision(&line) {
                    Some(accept) => return Ok(Some(accept)),
                    None => self.show("Invalid Input: please 1 for accept, or 0 for reject"),
                },
            }
        }
    }

    async fn chat(&mut self, mut session: ChatSession) -> ClientResult<PeerEvent> {
        self.console.clear();
        self.show(&format!("___Chatroom with {}___", session.partner()));
        self.show("Type '_exit' to terminate connection");
        info!(partner = session.partner(), role = ?session.role(), "Chat started");

        if session.role() == ChatRole::Initiator {
            if let Some(end) = self.send_turn(&mut session).await? {
                return Ok(end);
            }
        }
        loop {
            if let Some(end) = self.receive_turn(&mut session).await? {
                return Ok(end);
            }
            if let Some(end) = self.send_turn(&mut session).await? {
                return Ok(end);
            }
        }
    }

    /// Sends one message and waits for the partner's decision. Returns an
    /// event when the session is over.
    async fn send_turn(&mut self, session: &mut ChatSession) -> ClientResult<Option<PeerEvent>> {
        let (text, request) = loop {
            let text = self.input().await?;
            let request = session.outgoing(&text);
            match encode_datagram(&request) {
                Ok(_) => break (text, request),
                Err(e) => self.show(&format!("Message not sent: {}", e)),
            }
        };

        for attempt in 1..=self.config.max_send_attempts {
            self.send(request.clone()).await?;
            loop {
                match self.receive(self.config.receive_timeout).await? {
                    Some(Reply::AckSent) => debug!(attempt, seq = session.seq(), "Message buffered"),
                    Some(Reply::AckReceived) => {
                        self.show("Server> Message Received");
                        return Ok((text == EXIT).then_some(PeerEvent::ChatEnded));
                    }
                    Some(Reply::AckDenied) => {
                        self.show("Server> Message Denied");
                        return Ok(None);
                    }
                    Some(Reply::ConnectionFailure) => return Ok(Some(self.partner_left())),
                    Some(other) => debug!(reply = ?other, "Unexpected reply while sending"),
                    None => {
                        warn!(attempt, "No acknowledgement, resending");
                        break;
                    }
                }
            }
        }

        self.abandon_chat().await.map(Some)
    }

    /// Waits for the partner's next message and lets the user decide on
    /// it. Returns an event when the session is over.
    async fn receive_turn(&mut self, session: &mut ChatSession) -> ClientResult<Option<PeerEvent>> {
        // Silence is not an error here: the partner may be typing.
        let kind = loop {
            let Some(reply) = self.receive(self.config.receive_timeout).await? else {
                continue;
            };
            if !session.observe(&reply) {
                debug!(reply = reply.label(), "Duplicate discarded");
                continue;
            }
            match reply {
                Reply::MessageRequest(kind) => break kind,
                Reply::ConnectionFailure => return Ok(Some(self.partner_left())),
                other => debug!(reply = ?other, "Unexpected reply while waiting for a message"),
            }
        };

        self.show("\nYou have just received a message request!");
        if kind == MessageKind::Exit {
            self.show("NOTE: Client is requesting connection termination");
        }
        let accept = loop {
            self.show("\nEnter 1 to 'accept', 0 for 'reject'");
            let line = self.console.prompt("Response> ").await?;
            match parse_decision(&line) {
                Some(accept) => break accept,
                None => self.show("Invalid Input: Enter 1 to 'accept', 0 for 'reject'"),
            }
        };

        for attempt in 1..=self.config.max_send_attempts {
            self.send(Request::Decision { accept }).await?;
            loop {
                let Some(reply) = self.receive(self.config.receive_timeout).await? else {
                    warn!(attempt, "No answer to decision, resending");
                    break;
                };
                if !session.observe(&reply) {
                    debug!(reply = reply.label(), "Duplicate discarded");
                    continue;
                }
                match reply {
                    Reply::Reset if !accept => return Ok(None),
                    Reply::ConnectionFailure => return Ok(Some(self.partner_left())),
                    Reply::Delivery { seq, text } if accept => {
                        session.accept_delivery(seq);
                        if text == EXIT {
                            self.show("Server> Connection termination");
                            return Ok(Some(PeerEvent::ChatEnded));
                        }
                        self.show(&format!("\n{}> {}", session.partner(), text));
                        return Ok(None);
                    }
                    other => debug!(reply = ?other, "Unexpected reply while deciding"),
                }
            }
        }

        self.abandon_chat().await.map(Some)
    }

    /// The relay dissolved the pairing; nothing is left to release.
    fn partner_left(&mut self) -> PeerEvent {
        self.show("Server> Your partner has left the chat");
        PeerEvent::ChatLost
    }

    /// Gives up on an unresponsive partner and releases the pairing.
    async fn abandon_chat(&mut self) -> ClientResult<PeerEvent> {
        self.send(Request::Exit).await?;
        self.show("Server> Your partner is not responding, leaving the chat");
        Ok(PeerEvent::ChatLost)
    }

    /// Tells the relay the peer is gone: one `_exit` ends a chat, the next
    /// releases the slot.
    async fn leave(&mut self) {
        let exits = match self.state {
            PeerState::Connecting | PeerState::Closed => 0,
            PeerState::Chatting { .. } => 2,
            _ => 1,
        };
        for _ in 0..exits {
            if let Err(e) = self.send(Request::Exit).await {
                warn!(error = %e, "Failed to notify relay on exit");
                break;
            }
        }
    }

    async fn send(&mut self, request: Request) -> ClientResult<()> {
        self.transport.send(&request).await
    }

    async fn receive(&mut self, timeout: Duration) -> ClientResult<Option<Reply>> {
        match self.transport.receive(timeout).await? {
            Received::Reply(reply) => Ok(Some(reply)),
            Received::TimedOut => Ok(None),
        }
    }

    async fn input(&mut self) -> ClientResult<String> {
        let label = self.prompt_label();
        self.console.prompt(&label).await
    }

    fn prompt_label(&self) -> String {
        format!("\n{}> ", self.label)
    }

    fn show(&mut self, text: &str) {
        self.console.show(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Input, ScriptedConsole, ScriptedTransport};
    use pairchat_protocol::{NicknameChoice, RosterEntry};

    fn id(slot: u16) -> PeerId {
        PeerId::new(slot).unwrap()
    }

    fn config() -> PeerConfig {
        PeerConfig::default().with_retry_delay(Duration::ZERO)
    }

    async fn run(
        replies: Vec<Received>,
        inputs: Vec<Input>,
        config: PeerConfig,
    ) -> (ClientResult<()>, PeerState, ScriptedTransport, ScriptedConsole) {
        let mut engine = PeerEngine::new(
            ScriptedTransport::new(replies),
            ScriptedConsole::new(inputs),
            config,
        );
        let result = engine.run().await;
        let state = engine.state().clone();
        let (transport, console) = engine.into_parts();
        (result, state, transport, console)
    }

    fn reply(reply: Reply) -> Received {
        Received::Reply(reply)
    }

    #[test]
    fn transition_table_happy_paths() {
        let s = PeerState::Connecting;
        let s = transition(&s, &PeerEvent::Granted).unwrap();
        assert_eq!(s, PeerState::Naming);
        let s = transition(&s, &PeerEvent::Named).unwrap();
        assert_eq!(s, PeerState::Menu);
        let s = transition(&s, &PeerEvent::ChoseBrowse).unwrap();
        let s = transition(&s, &PeerEvent::Picked(id(2))).unwrap();
        assert_eq!(s, PeerState::Requesting { target: id(2) });
        let s = transition(&s, &PeerEvent::Accepted { partner: "bob".into() }).unwrap();
        assert_eq!(
            s,
            PeerState::Chatting {
                partner: "bob".into(),
                role: ChatRole::Initiator
            }
        );
        assert_eq!(transition(&s, &PeerEvent::ChatEnded), Some(PeerState::Menu));
    }

    #[test]
    fn transition_table_offer_paths() {
        let offer = PeerEvent::OfferReceived {
            from: id(1),
            nickname: "alice".into(),
        };
        let offered = transition(&PeerState::Waiting, &offer).unwrap();
        assert_eq!(
            transition(&offered, &PeerEvent::OfferAccepted),
            Some(PeerState::Chatting {
                partner: "alice".into(),
                role: ChatRole::Responder
            })
        );
        assert_eq!(transition(&offered, &PeerEvent::Rejected), Some(PeerState::Menu));
        assert!(transition(&PeerState::Browsing, &offer).is_some());
        assert!(transition(&PeerState::Menu, &offer).is_none());
    }

    #[test]
    fn transition_table_rejects_undefined_pairs() {
        assert!(transition(&PeerState::Connecting, &PeerEvent::Named).is_none());
        assert!(transition(&PeerState::Menu, &PeerEvent::ChatEnded).is_none());
        assert!(transition(&PeerState::Closed, &PeerEvent::InputClosed).is_none());
        assert_eq!(
            transition(&PeerState::Waiting, &PeerEvent::InputClosed),
            Some(PeerState::Closed)
        );
    }

    #[test]
    fn undefined_event_leaves_state_unchanged() {
        let mut engine = PeerEngine::new(
            ScriptedTransport::new(Vec::new()),
            ScriptedConsole::new(Vec::new()),
            config(),
        );
        engine.apply(PeerEvent::ChatEnded);
        assert_eq!(engine.state(), &PeerState::Connecting);
    }

    #[tokio::test]
    async fn busy_relay_is_retried() {
        let (result, state, transport, console) = run(
            vec![
                Received::TimedOut,
                reply(Reply::ConnectionDenied),
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
            ],
            vec![Input::line("_exit")],
            config().with_name("dave"),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state, PeerState::Closed);
        assert_eq!(
            transport.sent,
            vec![
                Request::ConnectionRequest,
                Request::ConnectionRequest,
                Request::ConnectionRequest,
                Request::Nickname(NicknameChoice::Named("dave".into())),
                Request::Exit,
            ]
        );
        assert!(console.printed("Server is busy"));
    }

    #[tokio::test]
    async fn requester_chats_until_partner_exits() {
        let (result, state, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::Roster(vec![RosterEntry::new(id(2), "bob")])),
                reply(Reply::Waiting),
                reply(Reply::PartnerNickname("bob".into())),
                reply(Reply::AckSent),
                reply(Reply::AckReceived),
                reply(Reply::MessageRequest(MessageKind::Exit)),
                reply(Reply::delivery(1, "_exit")),
            ],
            vec![
                Input::line("alice"),
                Input::line("1"),
                Input::line("1"),
                Input::line("hello"),
                Input::line("1"),
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state, PeerState::Closed);
        assert_eq!(
            transport.sent,
            vec![
                Request::ConnectionRequest,
                Request::Nickname(NicknameChoice::Named("alice".into())),
                Request::OnlineRequest,
                Request::ClientRequest { target: id(2) },
                Request::message_ack(0, "hello"),
                Request::Decision { accept: true },
                Request::Exit,
            ]
        );
        assert!(console.printed("[1] Client_2 ==> bob"));
        assert!(console.printed("Message Received"));
        assert!(console.printed("requesting connection termination"));
    }

    #[tokio::test]
    async fn responder_discards_duplicates_and_ends_with_exit() {
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::ClientAck {
                    nickname: "alice".into(),
                    from: id(1),
                }),
                reply(Reply::ConnectionSuccess),
                reply(Reply::MessageRequest(MessageKind::Basic)),
                reply(Reply::MessageRequest(MessageKind::Basic)),
                reply(Reply::delivery(0, "hi")),
                reply(Reply::AckSent),
                reply(Reply::AckReceived),
            ],
            vec![
                Input::line(""),
                Input::line("0"),
                Input::line("1"),
                Input::line("1"),
                Input::line("_exit"),
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(
            transport.sent,
            vec![
                Request::ConnectionRequest,
                Request::Nickname(NicknameChoice::UsePeerId),
                Request::ClientAckResponse { accept: true },
                Request::Decision { accept: true },
                // The delivery carried seq 0, so the reply goes out as 1.
                Request::message_ack(1, "_exit"),
                Request::Exit,
            ]
        );
        assert!(console.printed("alice (Client_1) is requesting to connect with you"));
        assert!(console.printed("alice> hi"));
    }

    #[tokio::test]
    async fn expired_offer_is_still_answered() {
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::ClientAck {
                    nickname: "alice".into(),
                    from: id(1),
                }),
                reply(Reply::ConnectionFailure),
            ],
            vec![
                Input::line("carol"),
                Input::line("0"),
                Input::Silence,
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(
            transport.sent,
            vec![
                Request::ConnectionRequest,
                Request::Nickname(NicknameChoice::Named("carol".into())),
                Request::ClientAckResponse { accept: false },
                Request::Exit,
            ]
        );
        assert!(console.printed("Request timed out"));
    }

    #[tokio::test]
    async fn closed_input_leaves_the_relay() {
        let (result, state, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::Roster(Vec::new())),
            ],
            vec![Input::line("eve"), Input::line("1")],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state, PeerState::Closed);
        assert_eq!(transport.sent.last(), Some(&Request::Exit));
        assert_eq!(transport.sent.len(), 4);
        assert!(console.printed("Nobody Is Online"));
    }

    #[tokio::test]
    async fn invalid_pick_refetches_then_back() {
        let roster = Reply::Roster(vec![RosterEntry::new(id(2), "bob")]);
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(roster.clone()),
                reply(roster),
            ],
            vec![
                Input::line("alice"),
                Input::line("1"),
                Input::line("7"),
                Input::line("_back"),
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        let online = transport
            .sent
            .iter()
            .filter(|r| **r == Request::OnlineRequest)
            .count();
        assert_eq!(online, 2);
        assert!(console.printed("Invalid Input: please enter a valid integer"));
    }

    #[tokio::test]
    async fn rejected_request_returns_to_browsing() {
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::Roster(vec![RosterEntry::new(id(2), "bob")])),
                reply(Reply::Waiting),
                reply(Reply::ConnectionFailure),
                reply(Reply::Roster(vec![RosterEntry::new(id(2), "bob")])),
            ],
            vec![
                Input::line("alice"),
                Input::line("1"),
                Input::line("1"),
                Input::line("_back"),
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert!(console.printed("Request Denied"));
        assert_eq!(transport.sent.last(), Some(&Request::Exit));
    }

    #[tokio::test]
    async fn unresponsive_partner_ends_session() {
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::Roster(vec![RosterEntry::new(id(2), "bob")])),
                reply(Reply::PartnerNickname("bob".into())),
                Received::TimedOut,
                reply(Reply::AckSent),
                Received::TimedOut,
            ],
            vec![
                Input::line("alice"),
                Input::line("1"),
                Input::line("1"),
                Input::line("anyone there?"),
                Input::line("_exit"),
            ],
            config().with_max_send_attempts(2),
        )
        .await;

        assert!(result.is_ok());
        let acks = transport
            .sent
            .iter()
            .filter(|r| matches!(r, Request::MessageAck { .. }))
            .count();
        assert_eq!(acks, 2);
        // One exit dissolves the pairing, the menu's exit leaves the relay.
        assert_eq!(
            transport.sent.iter().filter(|r| **r == Request::Exit).count(),
            2
        );
        assert!(console.printed("not responding"));
    }

    #[tokio::test]
    async fn crossed_requests_still_pair() {
        // alice's offer overtakes the relay's refusal of our own request.
        let (result, state, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::Roster(vec![RosterEntry::new(id(1), "alice")])),
                reply(Reply::ClientAck {
                    nickname: "alice".into(),
                    from: id(1),
                }),
                reply(Reply::ConnectionFailure),
                reply(Reply::ConnectionSuccess),
                reply(Reply::ConnectionFailure),
            ],
            vec![
                Input::line("bob"),
                Input::line("1"),
                Input::line("1"),
                Input::line("1"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(state, PeerState::Closed);
        assert!(!console.printed("Connection failed"));
        assert!(console.printed("___Chatroom with alice___"));
        assert!(console.printed("partner has left"));
        assert_eq!(
            transport.sent,
            vec![
                Request::ConnectionRequest,
                Request::Nickname(NicknameChoice::Named("bob".into())),
                Request::OnlineRequest,
                Request::ClientRequest { target: id(1) },
                Request::ClientAckResponse { accept: true },
                // Leaving from the menu once input closes.
                Request::Exit,
            ]
        );
    }

    #[tokio::test]
    async fn partner_leaving_while_we_wait_ends_chat() {
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::ClientAck {
                    nickname: "alice".into(),
                    from: id(1),
                }),
                reply(Reply::ConnectionSuccess),
                Received::TimedOut,
                Received::TimedOut,
                reply(Reply::ConnectionFailure),
            ],
            vec![
                Input::line("bob"),
                Input::line("0"),
                Input::line("1"),
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert!(console.printed("partner has left"));
        // Only the menu's exit: the relay already dissolved the pairing.
        assert_eq!(
            transport.sent.iter().filter(|r| **r == Request::Exit).count(),
            1
        );
    }

    #[tokio::test]
    async fn partner_leaving_during_send_ends_chat() {
        let (result, _, transport, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::Roster(vec![RosterEntry::new(id(2), "bob")])),
                reply(Reply::PartnerNickname("bob".into())),
                reply(Reply::AckSent),
                reply(Reply::ConnectionFailure),
            ],
            vec![
                Input::line("alice"),
                Input::line("1"),
                Input::line("1"),
                Input::line("hello"),
                Input::line("_exit"),
            ],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert!(console.printed("partner has left"));
        assert_eq!(
            transport.sent.iter().filter(|r| **r == Request::Exit).count(),
            1
        );
    }

    #[tokio::test]
    async fn late_roster_is_not_taken_as_offer_answer() {
        let (result, _, _, console) = run(
            vec![
                reply(Reply::ConnectionGranted),
                reply(Reply::Success),
                reply(Reply::ClientAck {
                    nickname: "alice".into(),
                    from: id(1),
                }),
                reply(Reply::Roster(vec![RosterEntry::new(id(1), "alice")])),
                reply(Reply::ConnectionSuccess),
                reply(Reply::ConnectionFailure),
            ],
            vec![Input::line("bob"), Input::line("1"), Input::line("1")],
            config(),
        )
        .await;

        assert!(result.is_ok());
        assert!(!console.printed("Connection failed"));
        assert!(console.printed("___Chatroom with alice___"));
    }

    #[tokio::test]
    async fn configured_invalid_name_is_config_error() {
        let (result, _, _, _) = run(
            vec![reply(Reply::ConnectionGranted)],
            Vec::new(),
            config().with_name("_exit"),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
