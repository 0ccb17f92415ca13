//! Load configuration and resource limits.

use climarc_core::error::{ClimarcError, Result};
use climarc_lzma::{HeaderLayout, StreamProperties};

/// Default cap on the dictionary (and window) size: 256 MiB.
pub const DEFAULT_MAX_DICTIONARY_SIZE: u32 = 256 << 20;

/// Default cap on decompressed output: 1 GiB.
pub const DEFAULT_MAX_OUTPUT_SIZE: u64 = 1 << 30;

/// How an archive is decompressed and which limits apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadConfig {
    /// Header in front of the range-coded data.
    pub header_layout: HeaderLayout,
    /// Uncompressed size for headers that do not carry one.
    pub expected_size: Option<u64>,
    /// Largest dictionary size accepted.
    pub max_dictionary_size: u32,
    /// Largest decompressed size accepted.
    pub max_output_size: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            header_layout: HeaderLayout::Alone,
            expected_size: None,
            max_dictionary_size: DEFAULT_MAX_DICTIONARY_SIZE,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
        }
    }
}

impl LoadConfig {
    /// Configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header layout.
    pub fn with_header_layout(mut self, layout: HeaderLayout) -> Self {
        self.header_layout = layout;
        self
    }

    /// Set the uncompressed size used when the header carries none.
    pub fn with_expected_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    /// Set the dictionary size limit.
    pub fn with_max_dictionary_size(mut self, size: u32) -> Self {
        self.max_dictionary_size = size;
        self
    }

    /// Set the output size limit.
    pub fn with_max_output_size(mut self, size: u64) -> Self {
        self.max_output_size = size;
        self
    }

    /// Check stream properties against the limits, before anything is allocated.
    ///
    /// Returns the properties with the expected size filled in when the
    /// header did not declare one.
    pub fn check_properties(&self, props: StreamProperties) -> Result<StreamProperties> {
        let props = match props.uncompressed_size {
            Some(_) => props,
            None => props.with_uncompressed_size(self.expected_size),
        };

        if props.dictionary_size > self.max_dictionary_size {
            return Err(ClimarcError::limit_exceeded(
                "dictionary size",
                props.dictionary_size as u64,
                self.max_dictionary_size as u64,
            ));
        }
        if let Some(size) = props.uncompressed_size {
            if size > self.max_output_size {
                return Err(ClimarcError::limit_exceeded(
                    "uncompressed size",
                    size,
                    self.max_output_size,
                ));
            }
        }
        Ok(props)
    }
}
