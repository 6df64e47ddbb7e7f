use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Log lines kept for late `/api/logs` subscribers.
pub const RING_CAPACITY: usize = 500;

/// Mirrors tracing events as JSON lines onto a broadcast channel and a
/// bounded ring, feeding the browser's progress view.
pub struct BroadcastLayer {
    pub tx: broadcast::Sender<String>,
    pub ring: Arc<Mutex<VecDeque<String>>>,
}

struct EventVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut Map<String, Value>,
}

impl tracing::field::Visit for EventVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.fields.insert(field.name().into(), Value::from(value));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().into(), Value::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().into(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().into(), Value::from(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let mut text = format!("{value:?}");
        // Strip surrounding quotes added by Debug on &str
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            text = text[1..text.len() - 1].to_string();
        }
        if field.name() == "message" {
            *self.message = text;
        } else {
            self.fields.insert(field.name().into(), Value::from(text));
        }
    }
}

fn category(target: &str) -> &'static str {
    if target.contains("script") {
        "script"
    } else if target.contains("conversation") || target.contains("pawlegal_agent") {
        "agent"
    } else if target.contains("pawlegal_domains") {
        "sources"
    } else {
        "system"
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BroadcastLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "err",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG | tracing::Level::TRACE => return,
        };

        let target = event.metadata().target();
        if target.starts_with("tower_http") || target.starts_with("hyper") {
            return;
        }
        // Agent lines carry tool arguments built from the user's case, and
        // every browser shares this feed. They stay on the fmt layer only.
        let category = category(target);
        if category == "agent" {
            return;
        }

        let mut message = String::new();
        let mut fields = Map::new();
        event.record(&mut EventVisitor {
            message: &mut message,
            fields: &mut fields,
        });

        let json = serde_json::json!({
            "ts": chrono::Utc::now().timestamp(),
            "level": level,
            "message": message,
            "category": category,
            "fields": fields,
        })
        .to_string();

        let _ = self.tx.send(json.clone());
        if let Ok(mut ring) = self.ring.lock() {
            ring.push_back(json);
            if ring.len() > RING_CAPACITY {
                ring.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(f: impl FnOnce()) -> Vec<Value> {
        let (tx, _rx) = broadcast::channel(16);
        let ring = Arc::new(Mutex::new(VecDeque::new()));
        let subscriber = tracing_subscriber::registry().with(BroadcastLayer {
            tx,
            ring: Arc::clone(&ring),
        });
        tracing::subscriber::with_default(subscriber, f);
        let lines = ring.lock().unwrap().iter().cloned().collect::<Vec<_>>();
        lines
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn events_carry_message_and_fields() {
        let lines = capture(|| {
            tracing::info!(step = "search", sources = 2u64, "searching legal database");
            tracing::debug!("dropped");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["message"], "searching legal database");
        assert_eq!(lines[0]["fields"]["step"], "search");
        assert_eq!(lines[0]["fields"]["sources"], 2);
    }

    #[test]
    fn ring_is_bounded() {
        let lines = capture(|| {
            for i in 0..(RING_CAPACITY + 10) {
                tracing::warn!(i, "line");
            }
        });
        assert_eq!(lines.len(), RING_CAPACITY);
        assert_eq!(lines[0]["fields"]["i"], 10);
    }

    #[test]
    fn agent_lines_are_not_broadcast() {
        let lines = capture(|| {
            tracing::info!(
                target: "pawlegal_core::conversation",
                tool = "search_legal_database",
                args = "{\"query_string\":\"my neighbour's dog\"}",
                "calling tool"
            );
            tracing::info!(
                target: "pawlegal_core::script",
                step = "search",
                "searching legal database"
            );
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["category"], "script");
        assert!(!lines[0].to_string().contains("neighbour"));
    }

    #[test]
    fn categories_follow_module_paths() {
        assert_eq!(category("pawlegal_core::script"), "script");
        assert_eq!(category("pawlegal_core::conversation"), "agent");
        assert_eq!(category("pawlegal_agent::azure"), "agent");
        assert_eq!(category("pawlegal_domains::legal::animallaw"), "sources");
        assert_eq!(category("pawlegal_server"), "system");
    }
}
