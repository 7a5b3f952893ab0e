use crate::chat_api::{ChatClient, ChatConfig, Reply, TransportError};
use crate::render::render_reply;
use crate::transcript::{Message, Transcript};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

pub const WELCOME_MESSAGE: &str = "Welcome! \u{1F44B}\n\
I can help you with:\n\
1. Time Series Prediction for employee leave data\n\
2. Project Completion Estimation\n\n\
Please enter your query below.";

pub const EMPTY_REPLY_TEXT: &str = "<empty response>";

pub type RequestId = u64;

struct WorkerEvent {
    request_id: RequestId,
    outcome: Result<Reply, TransportError>,
}

/// Owns the transcript; workers only report back through the channel.
pub struct ChatSession {
    config: ChatConfig,
    transcript: Transcript,
    next_request_id: RequestId,
    in_flight: usize,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
}

impl ChatSession {
    pub fn new(config: ChatConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let mut transcript = Transcript::new();
        transcript.append(Message::assistant_text(WELCOME_MESSAGE));

        Self {
            config,
            transcript,
            next_request_id: 0,
            in_flight: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn pending_requests(&self) -> usize {
        self.in_flight
    }

    pub fn submit(&mut self, input: &str) -> Option<RequestId> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return None;
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight += 1;
        self.transcript.append(Message::user(prompt));

        tracing::info!(request_id, in_flight = self.in_flight, "dispatching prompt");
        spawn_worker(
            request_id,
            self.config.clone(),
            prompt.to_string(),
            self.events_tx.clone(),
        );

        Some(request_id)
    }

    pub fn poll_completions(&mut self) -> usize {
        let mut completed = 0;

        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    tracing::debug!(request_id = event.request_id, "request completed");
                    self.apply_outcome(event.outcome);
                    completed += 1;
                }
                // The session holds a sender itself, so the channel never disconnects.
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        completed
    }

    fn apply_outcome(&mut self, outcome: Result<Reply, TransportError>) {
        match outcome {
            Ok(reply) => {
                let items = render_reply(&reply);
                if items.is_empty() {
                    self.transcript.append(Message::assistant_text(EMPTY_REPLY_TEXT));
                    return;
                }
                for item in items {
                    self.transcript.append(Message::assistant(item));
                }
            }
            Err(err) => {
                let text = format_transport_error(&err, &self.config.endpoint);
                self.transcript.append(Message::assistant_text(text));
            }
        }
    }
}

fn spawn_worker(
    request_id: RequestId,
    config: ChatConfig,
    prompt: String,
    tx: Sender<WorkerEvent>,
) {
    thread::spawn(move || {
        let outcome = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(async {
                let client = ChatClient::new(config)?;
                client.send(&prompt).await
            }),
            Err(err) => Err(TransportError::Runtime(err)),
        };

        if let Err(err) = &outcome {
            tracing::warn!(request_id, error = %err, "request failed");
        }
        let _ = tx.send(WorkerEvent {
            request_id,
            outcome,
        });
    });
}

pub fn format_transport_error(err: &TransportError, endpoint: &str) -> String {
    if err.is_connection_refused() {
        return format!(
            "Error: Could not connect to {endpoint}.\nThe server is not responding (connection refused)."
        );
    }

    format!("Error: {err}")
}
