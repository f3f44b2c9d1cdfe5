//! Prometheus counters exposed at `/metrics`.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum PostKind {
    Thread,
    Reply,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PostLabels {
    pub kind: PostKind,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub kind: String,
}

pub struct Metrics {
    registry: Registry,
    posts_created: Family<PostLabels, Counter>,
    api_errors: Family<ErrorLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("message_board");
        let posts_created = Family::<PostLabels, Counter>::default();
        let api_errors = Family::<ErrorLabels, Counter>::default();

        registry.register("posts_created", "Threads and replies created", posts_created.clone());
        registry.register("api_errors", "Error responses by error kind", api_errors.clone());

        Self {
            registry,
            posts_created,
            api_errors,
        }
    }

    pub fn post_created(&self, kind: PostKind) {
        self.posts_created.get_or_create(&PostLabels { kind }).inc();
    }

    pub fn api_error(&self, kind: &str) {
        self.api_errors
            .get_or_create(&ErrorLabels {
                kind: kind.to_owned(),
            })
            .inc();
    }

    /// Renders the registry in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        prometheus_client::encoding::text::encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
