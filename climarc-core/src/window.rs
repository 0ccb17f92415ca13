//! Output window (sliding dictionary) for LZ77-family decompression.
//!
//! The window is a circular buffer holding the most recent output bytes so
//! that matches can refer back to them by distance. It is also the output
//! sink: whenever the write position wraps, and once more when decoding
//! finishes, the filled region is flushed into a growable output vector.
//!
//! Distances are zero-based: distance 0 is the byte written last.

/// Smallest window ever allocated, whatever the declared dictionary size.
pub const MIN_WINDOW_SIZE: usize = 4096;

/// Circular dictionary buffer that doubles as the decompression sink.
#[derive(Debug)]
pub struct OutputWindow {
    /// History buffer.
    buffer: Vec<u8>,
    /// Next write position inside `buffer`.
    pos: usize,
    /// Start of the region not yet flushed to `sink`.
    stream_pos: usize,
    /// Total bytes written since creation.
    total: u64,
    /// Flushed output.
    sink: Vec<u8>,
}

impl OutputWindow {
    /// Create a window of `max(window_size, MIN_WINDOW_SIZE)` bytes.
    pub fn new(window_size: usize) -> Self {
        Self::with_capacity(window_size, 0)
    }

    /// Create a window with an output capacity hint.
    pub fn with_capacity(window_size: usize, output_capacity: usize) -> Self {
        let window_size = window_size.max(MIN_WINDOW_SIZE);
        Self {
            buffer: vec![0; window_size],
            pos: 0,
            stream_pos: 0,
            total: 0,
            sink: Vec::with_capacity(output_capacity),
        }
    }

    /// Size of the circular buffer.
    pub fn window_size(&self) -> usize {
        self.buffer.len()
    }

    /// Total number of bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.total
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Append one byte.
    #[inline]
    pub fn put_byte(&mut self, byte: u8) {
        self.buffer[self.pos] = byte;
        self.pos += 1;
        self.total += 1;
        if self.pos >= self.buffer.len() {
            self.flush();
        }
    }

    /// Peek at the byte `distance` positions before the last one written.
    ///
    /// The caller guarantees `distance < window_size()`; bytes older than the
    /// output read back as zero.
    #[inline]
    pub fn get_byte(&self, distance: usize) -> u8 {
        let index = if distance < self.pos {
            self.pos - distance - 1
        } else {
            self.buffer.len() + self.pos - distance - 1
        };
        self.buffer[index]
    }

    /// Copy `length` bytes starting `distance + 1` bytes back.
    ///
    /// The copy runs one byte at a time so that a source overlapping the
    /// destination (`distance < length`) repeats the bytes it has just
    /// produced. The caller validates `distance` against the output size.
    pub fn copy_block(&mut self, distance: usize, length: usize) {
        let size = self.buffer.len();
        let mut src = if distance < self.pos {
            self.pos - distance - 1
        } else {
            size + self.pos - distance - 1
        };

        for _ in 0..length {
            if src >= size {
                src = 0;
            }
            self.buffer[self.pos] = self.buffer[src];
            self.pos += 1;
            src += 1;
            if self.pos >= size {
                self.flush();
            }
        }
        self.total += length as u64;
    }

    /// Move the filled region into the sink, rewinding on wrap.
    pub fn flush(&mut self) {
        if self.pos > self.stream_pos {
            self.sink
                .extend_from_slice(&self.buffer[self.stream_pos..self.pos]);
        }
        if self.pos >= self.buffer.len() {
            self.pos = 0;
        }
        self.stream_pos = self.pos;
    }

    /// Flush and return everything produced.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.sink
    }
}
