use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use crate::state::{LogEntry, emit_global_log};

/// Mirrors the crate's own `tracing` events to the `/logs` WebSocket.
pub struct GatewayLogBridge;

impl<S> Layer<S> for GatewayLogBridge
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        let level = metadata.level().to_string();
        let target = metadata.target().to_string();
        // Library noise (serenity heartbeats, hyper) stays out of the stream.
        if !target.starts_with("tradbridge") {
            return;
        }

        let mut message = visitor.message;
        if let Some(thread_id) = visitor.thread_id {
            message = format!("[thread {thread_id}] {message}");
        }

        emit_global_log(LogEntry::Trace {
            level,
            target,
            message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    thread_id: Option<u64>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value).trim_matches('"').to_string();
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if field.name() == "thread_id" {
            self.thread_id = Some(value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}
