use crate::binary_protocol::BinaryProtocolDecoder;
use crate::config::DecoderConfig;
use crate::error::{ConfigError, Result};
use crate::format::MultiFormatDecoder;
use crate::input::Input;
use crate::record::StructuredRecord;
use crate::stats::DecoderStats;

/// Common decoder contract.
///
/// Implementations keep undecoded bytes between calls, so one instance must
/// see a single stream, in order.
pub trait Decode {
    /// Short identifier used in logs and status output.
    fn name(&self) -> &'static str;

    /// Consume one input, returning every record it completed.
    fn decode(&mut self, input: Input) -> Result<Vec<StructuredRecord>>;

    fn stats(&self) -> &DecoderStats;

    /// Drop buffered input and session state. Statistics are kept.
    fn reset(&mut self);

    fn clear_errors(&mut self);
}

impl Decode for BinaryProtocolDecoder {
    fn name(&self) -> &'static str {
        "binary_protocol"
    }

    fn decode(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        BinaryProtocolDecoder::decode(self, input)
    }

    fn stats(&self) -> &DecoderStats {
        BinaryProtocolDecoder::stats(self)
    }

    fn reset(&mut self) {
        BinaryProtocolDecoder::reset(self)
    }

    fn clear_errors(&mut self) {
        BinaryProtocolDecoder::clear_errors(self)
    }
}

impl Decode for MultiFormatDecoder {
    fn name(&self) -> &'static str {
        "multi_format"
    }

    fn decode(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        MultiFormatDecoder::decode(self, input)
    }

    fn stats(&self) -> &DecoderStats {
        MultiFormatDecoder::stats(self)
    }

    fn reset(&mut self) {
        MultiFormatDecoder::reset(self)
    }

    fn clear_errors(&mut self) {
        MultiFormatDecoder::clear_errors(self)
    }
}

/// The closed set of decoder variants, selected by [`DecoderConfig`].
#[derive(Debug)]
pub enum Decoder {
    BinaryProtocol(BinaryProtocolDecoder),
    MultiFormat(MultiFormatDecoder),
}

impl Decoder {
    pub fn from_config(config: DecoderConfig) -> std::result::Result<Self, ConfigError> {
        Ok(match config {
            DecoderConfig::BinaryProtocol(config) => {
                Decoder::BinaryProtocol(BinaryProtocolDecoder::new(config)?)
            }
            DecoderConfig::MultiFormat(config) => {
                Decoder::MultiFormat(MultiFormatDecoder::new(config)?)
            }
        })
    }

    /// Current configuration.
    pub fn config(&self) -> DecoderConfig {
        match self {
            Decoder::BinaryProtocol(dec) => DecoderConfig::BinaryProtocol(dec.config().clone()),
            Decoder::MultiFormat(dec) => DecoderConfig::MultiFormat(dec.config().clone()),
        }
    }

    /// Replace the configuration. The variant follows the new config and
    /// the session starts fresh. On error the decoder is left unchanged.
    pub fn reconfigure(&mut self, config: DecoderConfig) -> std::result::Result<(), ConfigError> {
        *self = Decoder::from_config(config)?;
        Ok(())
    }

    fn inner(&self) -> &dyn Decode {
        match self {
            Decoder::BinaryProtocol(dec) => dec,
            Decoder::MultiFormat(dec) => dec,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Decode {
        match self {
            Decoder::BinaryProtocol(dec) => dec,
            Decoder::MultiFormat(dec) => dec,
        }
    }
}

impl Decode for Decoder {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn decode(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        self.inner_mut().decode(input)
    }

    fn stats(&self) -> &DecoderStats {
        self.inner().stats()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn clear_errors(&mut self) {
        self.inner_mut().clear_errors()
    }
}
