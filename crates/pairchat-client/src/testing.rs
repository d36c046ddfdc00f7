//! Scripted transport and console for driving the peer engine in tests.

use std::collections::VecDeque;
use std::time::Duration;

use pairchat_protocol::Request;

use crate::console::Console;
use crate::error::{ClientError, ClientResult};
use crate::socket::{BoxFuture, Received, Transport};

/// Replays canned relay datagrams and records what the engine sent.
pub struct ScriptedTransport {
    replies: VecDeque<Received>,
    pub sent: Vec<Request>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Received>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            sent: Vec::new(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(&'a mut self, request: &'a Request) -> BoxFuture<'a, ClientResult<()>> {
        self.sent.push(request.clone());
        Box::pin(async { Ok(()) })
    }

    fn receive(&mut self, _timeout: Duration) -> BoxFuture<'_, ClientResult<Received>> {
        let next = self
            .replies
            .pop_front()
            .ok_or_else(|| ClientError::Connection("script exhausted".into()));
        Box::pin(async move { next })
    }
}

/// One scripted user action.
#[derive(Debug, Clone)]
pub enum Input {
    Line(String),
    /// The user types nothing before the prompt's window closes.
    Silence,
}

impl Input {
    pub fn line(text: &str) -> Self {
        Input::Line(text.to_string())
    }
}

/// Replays user input and records everything shown. Input runs dry as
/// [`ClientError::Closed`], like stdin reaching EOF.
pub struct ScriptedConsole {
    inputs: VecDeque<Input>,
    pub output: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(inputs: impl IntoIterator<Item = Input>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            output: Vec::new(),
        }
    }

    /// Returns true if any shown line contains `needle`.
    pub fn printed(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

impl Console for ScriptedConsole {
    fn show(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn clear(&mut self) {}

    fn prompt<'a>(&'a mut self, _label: &'a str) -> BoxFuture<'a, ClientResult<String>> {
        let next = match self.inputs.pop_front() {
            Some(Input::Line(line)) => Ok(line),
            Some(Input::Silence) => Ok(String::new()),
            None => Err(ClientError::Closed),
        };
        Box::pin(async move { next })
    }

    fn prompt_within<'a>(
        &'a mut self,
        _label: &'a str,
        _window: Duration,
    ) -> BoxFuture<'a, ClientResult<Option<String>>> {
        let next = match self.inputs.pop_front() {
            Some(Input::Line(line)) => Ok(Some(line)),
            Some(Input::Silence) => Ok(None),
            None => Err(ClientError::Closed),
        };
        Box::pin(async move { next })
    }
}
