//! Topic selection and artifact body rendering.
//!
//! Bodies are rendered from an embedded template and capped at a byte ceiling.
//! Oversize bodies are cut and marked, never rejected.

use anyhow::{Context, Result, bail};
use chrono::Local;
use minijinja::{Environment, context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::core::error::IterationError;
use crate::core::types::{Selection, Topic};

const ARTIFACT_TEMPLATE: &str = include_str!("templates/artifact.j2");

/// Appended to a body that was cut at the size ceiling.
pub const TRUNCATION_MARKER: &str = "\n# ... (truncated)";

/// Template engine wrapper around minijinja.
struct ArtifactTemplate {
    env: Environment<'static>,
}

impl ArtifactTemplate {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("artifact", ARTIFACT_TEMPLATE)
            .context("load artifact template")?;
        Ok(Self { env })
    }

    fn render(&self, topic: &Topic, generated_at: &str) -> Result<String, minijinja::Error> {
        let template = self.env.get_template("artifact")?;
        template.render(context! {
            label => topic.label.as_str(),
            description => topic.description.as_str(),
            example => topic.example.as_str(),
            generated_at => generated_at,
        })
    }
}

/// Cap `body` at `max_bytes`, appending [`TRUNCATION_MARKER`] when it is cut.
///
/// The result is never longer than `max_bytes` and always ends on a UTF-8
/// character boundary.
pub fn cap_body(body: String, max_bytes: usize) -> (String, bool) {
    if body.len() <= max_bytes {
        return (body, false);
    }
    if max_bytes < TRUNCATION_MARKER.len() {
        let cut = floor_char_boundary(&body, max_bytes);
        return (body[..cut].to_string(), true);
    }
    let cut = floor_char_boundary(&body, max_bytes - TRUNCATION_MARKER.len());
    let mut out = String::with_capacity(max_bytes);
    out.push_str(&body[..cut]);
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Picks catalog topics uniformly at random and renders bounded bodies.
pub struct ContentSelector<R = StdRng> {
    catalog: Vec<Topic>,
    template: ArtifactTemplate,
    max_body_bytes: usize,
    rng: R,
}

impl ContentSelector<StdRng> {
    pub fn from_entropy(catalog: Vec<Topic>, max_body_bytes: usize) -> Result<Self> {
        Self::with_rng(catalog, max_body_bytes, StdRng::from_entropy())
    }
}

impl<R: Rng> ContentSelector<R> {
    pub fn with_rng(catalog: Vec<Topic>, max_body_bytes: usize, rng: R) -> Result<Self> {
        if catalog.is_empty() {
            bail!("content catalog is empty");
        }
        if max_body_bytes <= TRUNCATION_MARKER.len() {
            bail!(
                "max_body_bytes must be > {} (room for the truncation marker)",
                TRUNCATION_MARKER.len()
            );
        }
        Ok(Self {
            catalog,
            template: ArtifactTemplate::new()?,
            max_body_bytes,
            rng,
        })
    }

    pub fn catalog(&self) -> &[Topic] {
        &self.catalog
    }

    /// Choose a topic and render its body, stamped with the current local time.
    pub fn select(&mut self) -> Result<Selection, IterationError> {
        let idx = self.rng.gen_range(0..self.catalog.len());
        let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.render(idx, &generated_at)
    }

    /// Render catalog entry `idx` with a fixed timestamp.
    pub fn render(&self, idx: usize, generated_at: &str) -> Result<Selection, IterationError> {
        let topic = self
            .catalog
            .get(idx)
            .ok_or_else(|| IterationError::Render(format!("no catalog entry {idx}")))?;
        let rendered = self
            .template
            .render(topic, generated_at)
            .map_err(|err| IterationError::Render(err.to_string()))?;
        let (body, truncated) = cap_body(rendered, self.max_body_bytes);
        if truncated {
            warn!(label = %topic.label, max_body_bytes = self.max_body_bytes, "body truncated");
        }
        debug!(label = %topic.label, bytes = body.len(), "body rendered");
        Ok(Selection {
            label: topic.label.clone(),
            body,
            truncated,
        })
    }
}
