//! # Codec
//!
//! The entry point pairing an [`Encoder`] and a [`Decoder`] with one
//! configuration and one diagnostic sink.
//!
//! A `Codec` holds no other state. It is `Send + Sync`, so a single value can
//! serve concurrent calls; each call builds its own tables.

use crate::config::CodecConfig;
use crate::decoder::Decoder;
use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink, Severity, TracingSink};
use crate::document::Document;
use crate::encoder::Encoder;
use crate::{CodecError, KStructure};
use std::fmt;
use std::sync::Arc;

/// Knowledge-structure codec.
#[derive(Clone)]
pub struct Codec {
    config: CodecConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl Codec {
    /// Create a codec that reports through `tracing`.
    #[must_use]
    pub fn new(config: CodecConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a codec that reports to the given sink.
    #[must_use]
    pub fn with_sink(config: CodecConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { config, sink }
    }

    /// Create a codec from TOML configuration text.
    ///
    /// The outcome is reported to `sink`: an `Info` diagnostic on success, an
    /// `Error` on failure.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Config` on invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str, sink: Arc<dyn DiagnosticSink>) -> Result<Self, CodecError> {
        match CodecConfig::from_toml_str(text) {
            Ok(config) => {
                sink.emit(Diagnostic::new(
                    Severity::Info,
                    DiagnosticCategory::Config,
                    format!(
                        "codec configured: decode_order={:?}, unique_membership={}, verify_next_states={}",
                        config.decode_order, config.unique_membership, config.verify_next_states
                    ),
                ));
                Ok(Self::with_sink(config, sink))
            }
            Err(err) => {
                sink.emit(Diagnostic::from(&err));
                Err(err)
            }
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode a structure into a document.
    ///
    /// Sorts `structure` by ascending rank index in place.
    pub fn encode(&self, structure: &mut KStructure) -> Result<Document, CodecError> {
        self.report(self.encode_document(structure))
    }

    /// Encode a structure and render it as XML text.
    pub fn encode_to_string(&self, structure: &mut KStructure) -> Result<String, CodecError> {
        self.report(
            self.encode_document(structure)
                .and_then(|document| document.render(self.config.indent)),
        )
    }

    /// Decode an already parsed document.
    pub fn decode(&self, document: &Document) -> Result<KStructure, CodecError> {
        self.report(self.decode_document(document))
    }

    /// Decode XML text.
    pub fn decode_str(&self, text: &str) -> Result<KStructure, CodecError> {
        self.report(self.parse(text).and_then(|document| self.decode_document(&document)))
    }

    fn encode_document(&self, structure: &mut KStructure) -> Result<Document, CodecError> {
        Encoder::new(&self.config, self.sink.as_ref()).encode(structure)
    }

    fn decode_document(&self, document: &Document) -> Result<KStructure, CodecError> {
        Decoder::new(&self.config, self.sink.as_ref()).decode(document)
    }

    fn parse(&self, text: &str) -> Result<Document, CodecError> {
        if text.len() > self.config.max_document_bytes {
            return Err(CodecError::DocumentTooLarge {
                size: text.len(),
                limit: self.config.max_document_bytes,
            });
        }
        if text.trim().is_empty() {
            return Err(CodecError::InvalidInput("empty document".to_string()));
        }
        Document::parse(text)
    }

    /// Emit the error, if any, exactly once.
    fn report<T>(&self, result: Result<T, CodecError>) -> Result<T, CodecError> {
        if let Err(err) = &result {
            self.sink.emit(Diagnostic::from(err));
        }
        result
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Encode with the default codec and render to text.
pub fn encode_kstructure(structure: &mut KStructure) -> Result<String, CodecError> {
    Codec::default().encode_to_string(structure)
}

/// Decode text with the default codec.
pub fn decode_kstructure(text: &str) -> Result<KStructure, CodecError> {
    Codec::default().decode_str(text)
}
