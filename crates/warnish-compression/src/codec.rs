//! Streaming codecs and the registered method table

use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use warnish_core::{Error, Result};

/// zlib strategy names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Normal data
    #[default]
    Default,
    /// Data produced by a filter or predictor
    Filtered,
    /// Huffman coding only, no string matching
    HuffmanOnly,
    /// Run-length encoding only
    Rle,
    /// Fixed Huffman codes
    Fixed,
}

/// Options handed to every codec constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    /// Compression level, 0 (none) to 9 (best)
    #[serde(default = "default_level")]
    pub level: u32,

    /// Memory level, 1 to 9
    #[serde(default = "default_mem_level")]
    pub mem_level: u32,

    /// Base two logarithm of the window size, 8 to 15
    #[serde(default = "default_window_bits")]
    pub window_bits: u8,

    /// Compression strategy
    #[serde(default)]
    pub strategy: Strategy,

    /// Largest chunk a codec emits at once
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            level: default_level(),
            mem_level: default_mem_level(),
            window_bits: default_window_bits(),
            strategy: Strategy::Default,
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_level() -> u32 {
    9
}

fn default_mem_level() -> u32 {
    9
}

fn default_window_bits() -> u8 {
    15
}

fn default_chunk_size() -> usize {
    16 * 1024
}

impl CodecOptions {
    /// Reject values the codecs cannot honour
    ///
    /// `mem_level`, `window_bits` and `strategy` are accepted only at their
    /// defaults, which are what the flate2 encoders use.
    pub fn validate(&self) -> Result<()> {
        if self.level > 9 {
            return Err(Error::Config(format!(
                "compression level must be 0-9, got {}",
                self.level
            )));
        }
        if self.mem_level != default_mem_level() {
            return Err(Error::Config(format!(
                "memory level {} is not supported by the flate2 backend, only {} is",
                self.mem_level,
                default_mem_level()
            )));
        }
        if self.window_bits != default_window_bits() {
            return Err(Error::Config(format!(
                "window bits {} are not supported by the flate2 backend, only {} are",
                self.window_bits,
                default_window_bits()
            )));
        }
        if self.strategy != Strategy::Default {
            return Err(Error::Config(format!(
                "strategy {:?} is not supported by the flate2 backend",
                self.strategy
            )));
        }
        if self.chunk_size < 64 {
            return Err(Error::Config(format!(
                "chunk size must be at least 64 bytes, got {}",
                self.chunk_size
            )));
        }
        Ok(())
    }

    fn compression(&self) -> Compression {
        Compression::new(self.level.min(9))
    }
}

/// A streaming compressor bound to one response body
pub trait Codec: Send {
    /// Feed input; returns whatever compressed output is ready (possibly empty)
    fn write(&mut self, input: &[u8]) -> io::Result<Bytes>;

    /// Flush the remaining output and the stream trailer
    fn finish(self: Box<Self>) -> io::Result<Bytes>;
}

enum Encoder {
    Gzip(GzEncoder<Vec<u8>>),
    Zlib(ZlibEncoder<Vec<u8>>),
}

/// flate2-backed codec for both `gzip` and `deflate`
struct FlateCodec {
    encoder: Encoder,
}

impl Codec for FlateCodec {
    fn write(&mut self, input: &[u8]) -> io::Result<Bytes> {
        let out = match &mut self.encoder {
            Encoder::Gzip(encoder) => {
                encoder.write_all(input)?;
                std::mem::take(encoder.get_mut())
            }
            Encoder::Zlib(encoder) => {
                encoder.write_all(input)?;
                std::mem::take(encoder.get_mut())
            }
        };
        Ok(Bytes::from(out))
    }

    fn finish(self: Box<Self>) -> io::Result<Bytes> {
        let out = match self.encoder {
            Encoder::Gzip(encoder) => encoder.finish()?,
            Encoder::Zlib(encoder) => encoder.finish()?,
        };
        Ok(Bytes::from(out))
    }
}

/// Gzip codec constructor
pub fn gzip(options: &CodecOptions) -> Box<dyn Codec> {
    Box::new(FlateCodec {
        encoder: Encoder::Gzip(GzEncoder::new(Vec::new(), options.compression())),
    })
}

/// Deflate codec constructor (zlib framing)
pub fn deflate(options: &CodecOptions) -> Box<dyn Codec> {
    Box::new(FlateCodec {
        encoder: Encoder::Zlib(ZlibEncoder::new(Vec::new(), options.compression())),
    })
}

/// Codec constructor signature
pub type CodecConstructor = fn(&CodecOptions) -> Box<dyn Codec>;

/// A named encoding bound to its codec constructor
#[derive(Clone)]
pub struct CompressionMethod {
    name: String,
    constructor: CodecConstructor,
}

impl CompressionMethod {
    /// Create a method
    pub fn new(name: impl Into<String>, constructor: CodecConstructor) -> Self {
        Self {
            name: name.into(),
            constructor,
        }
    }

    /// The Content-Encoding header value
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct a fresh codec for one body
    pub fn codec(&self, options: &CodecOptions) -> Box<dyn Codec> {
        (self.constructor)(options)
    }
}

impl fmt::Debug for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompressionMethod").field(&self.name).finish()
    }
}

/// Ordered table of supported methods
///
/// Order is significant: negotiation picks the first registered name the
/// client mentions.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: Vec<CompressionMethod>,
}

impl MethodRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// `gzip` then `deflate`
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("gzip", gzip);
        registry.register("deflate", deflate);
        registry
    }

    /// Build from method names, in the given order
    pub fn from_names(names: &[String]) -> Result<Self> {
        let standard = Self::standard();
        let mut registry = Self::new();

        for name in names {
            let method = standard.get(name).ok_or_else(|| {
                Error::Config(format!("unsupported compression method '{name}'"))
            })?;
            registry.register(method.name.clone(), method.constructor);
        }

        Ok(registry)
    }

    /// Register a method; re-registering a name replaces it in place
    pub fn register(&mut self, name: impl Into<String>, constructor: CodecConstructor) -> &mut Self {
        let method = CompressionMethod::new(name, constructor);
        match self.methods.iter_mut().find(|m| m.name == method.name) {
            Some(existing) => *existing = method,
            None => self.methods.push(method),
        }
        self
    }

    /// Look up a method by name
    pub fn get(&self, name: &str) -> Option<&CompressionMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Methods in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CompressionMethod> {
        self.methods.iter()
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// Check if no method is registered
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
