//! LZMA decompression.
//!
//! The decoder runs a finite-state machine over three kinds of operations:
//! literals, matches with an explicit distance, and repeats of one of the
//! four most recent distances. Decoding stops once the declared size has
//! been produced, or at the end marker when the size is unknown.

use crate::model::{
    DIST_ALIGN_BITS, END_MARKER_DISTANCE, END_POS_MODEL_INDEX, HeaderLayout, LEN_TO_POS_STATES,
    LzmaModel, MATCH_LEN_MIN, Op, START_POS_MODEL_INDEX, State, StreamProperties,
    reverse_decode_at,
};
use crate::range_coder::{ByteSource, RangeDecoder};
use climarc_core::error::{ClimarcError, Result};
use climarc_core::window::OutputWindow;
use tracing::{debug, trace};

/// Largest output buffer reserved up front from a declared size.
pub const PREALLOC_LIMIT: u64 = 1 << 26;

/// LZMA decoder over an in-memory stream.
#[derive(Debug)]
pub struct LzmaDecoder<'a> {
    /// Range decoder.
    rc: RangeDecoder<'a>,
    /// Probability tables.
    model: LzmaModel,
    /// Dictionary and output sink.
    window: OutputWindow,
    /// Stream parameters.
    props: StreamProperties,
    /// Current state.
    state: State,
    /// Rep distances, most recent first.
    reps: [u32; 4],
    /// Mask selecting the position state.
    pos_state_mask: usize,
    /// Upper bound on any copy distance.
    dictionary_size_check: u64,
    /// Maximum number of bytes this decoder may produce.
    output_limit: Option<u64>,
}

impl<'a> LzmaDecoder<'a> {
    /// Create a decoder for range-coded `data` (no header).
    pub fn new(data: &'a [u8], props: StreamProperties) -> Result<Self> {
        Self::with_source(ByteSource::new(data), props)
    }

    /// Create a decoder from a stream that starts with a header.
    pub fn from_header(data: &'a [u8], layout: HeaderLayout) -> Result<Self> {
        let props = StreamProperties::parse(data, layout)?;
        Self::with_source(ByteSource::at(data, layout.header_len()), props)
    }

    /// Create a decoder for a stream whose range-coded data starts at
    /// `offset`, using properties the caller has already parsed.
    pub fn with_properties(data: &'a [u8], offset: usize, props: StreamProperties) -> Result<Self> {
        Self::with_source(ByteSource::at(data, offset), props)
    }

    fn with_source(source: ByteSource<'a>, props: StreamProperties) -> Result<Self> {
        let dictionary_size_check = props.dictionary_size_check() as u64;

        // Distances never reach past the output, so a known size bounds the window too.
        let window_size = match props.uncompressed_size {
            Some(size) => dictionary_size_check.min(size),
            None => dictionary_size_check,
        };
        let output_capacity = props.uncompressed_size.unwrap_or(0).min(PREALLOC_LIMIT);

        Ok(Self {
            rc: RangeDecoder::new(source)?,
            model: LzmaModel::new(&props),
            window: OutputWindow::with_capacity(window_size as usize, output_capacity as usize),
            props,
            state: State::default(),
            reps: [0; 4],
            pos_state_mask: props.pos_state_mask(),
            dictionary_size_check,
            output_limit: None,
        })
    }

    /// Override the uncompressed size (for headers that do not carry one).
    pub fn set_uncompressed_size(&mut self, size: Option<u64>) {
        self.props.uncompressed_size = size;
    }

    /// Refuse to produce more than `limit` bytes.
    pub fn set_output_limit(&mut self, limit: Option<u64>) {
        self.output_limit = limit;
    }

    /// Stream properties in effect.
    pub fn properties(&self) -> &StreamProperties {
        &self.props
    }

    /// Decode the whole stream.
    pub fn decompress(mut self) -> Result<Vec<u8>> {
        let expected = self.props.uncompressed_size;
        if let (Some(size), Some(limit)) = (expected, self.output_limit) {
            if size > limit {
                return Err(ClimarcError::limit_exceeded("uncompressed size", size, limit));
            }
        }

        debug!(
            lc = self.props.lc,
            lp = self.props.lp,
            pb = self.props.pb,
            dictionary_size = self.props.dictionary_size,
            uncompressed_size = ?expected,
            window_size = self.window.window_size(),
            "decoding LZMA stream"
        );

        loop {
            let total = self.window.total_out();
            if let Some(size) = expected {
                if total >= size {
                    break;
                }
            }
            if let Some(limit) = self.output_limit {
                if total > limit {
                    return Err(ClimarcError::limit_exceeded("decoded output", total, limit));
                }
            }

            let pos_state = total as usize & self.pos_state_mask;
            let s = self.state.index();

            if self.rc.decode_bit(&mut self.model.is_match[s][pos_state])? == 0 {
                self.decode_literal()?;
                continue;
            }

            let len = if self.rc.decode_bit(&mut self.model.is_rep[s])? == 0 {
                match self.decode_match(pos_state)? {
                    Some(len) => len,
                    None => {
                        if let Some(size) = expected {
                            return Err(ClimarcError::size_mismatch(size, total));
                        }
                        trace!(total, "end marker");
                        break;
                    }
                }
            } else {
                match self.decode_rep(pos_state)? {
                    Some(len) => len,
                    None => continue,
                }
            };

            self.copy_match(len, expected)?;
        }

        let trailing = self.rc.remaining();
        if trailing > 0 {
            debug!(trailing, "bytes left after the last decoded symbol");
        }

        let output = self.window.finish();
        debug!(
            decoded = output.len(),
            consumed = self.rc.position(),
            "LZMA stream decoded"
        );
        Ok(output)
    }

    /// Decode a literal and append it.
    fn decode_literal(&mut self) -> Result<()> {
        let total = self.window.total_out();
        let prev = if total > 0 { self.window.get_byte(0) } else { 0 };
        let match_byte = if self.state.is_literal() {
            None
        } else {
            Some(self.window.get_byte(self.reps[0] as usize))
        };

        let coder = self.model.literal.coder(total, prev);
        let byte = match match_byte {
            None => coder.decode_normal(&mut self.rc)?,
            Some(match_byte) => coder.decode_with_match_byte(&mut self.rc, match_byte)?,
        };

        self.window.put_byte(byte);
        self.state = self.state.next(Op::Literal);
        Ok(())
    }

    /// Decode a match with an explicit distance.
    ///
    /// Returns `None` on the end marker.
    fn decode_match(&mut self, pos_state: usize) -> Result<Option<usize>> {
        let len = self.model.match_len.decode(&mut self.rc, pos_state)?;
        let distance = self.decode_distance(len)?;
        if distance == END_MARKER_DISTANCE {
            return Ok(None);
        }

        self.reps = [distance, self.reps[0], self.reps[1], self.reps[2]];
        self.state = self.state.next(Op::Match);
        Ok(Some(len))
    }

    /// Decode a repeat match.
    ///
    /// Returns `None` for a short repeat, which is applied immediately.
    fn decode_rep(&mut self, pos_state: usize) -> Result<Option<usize>> {
        let s = self.state.index();

        if self.rc.decode_bit(&mut self.model.is_rep_g0[s])? == 0 {
            if self.rc.decode_bit(&mut self.model.is_rep0_long[s][pos_state])? == 0 {
                self.check_distance(self.reps[0])?;
                let byte = self.window.get_byte(self.reps[0] as usize);
                self.window.put_byte(byte);
                self.state = self.state.next(Op::ShortRep);
                return Ok(None);
            }
        } else {
            let [rep0, rep1, rep2, rep3] = self.reps;
            self.reps = if self.rc.decode_bit(&mut self.model.is_rep_g1[s])? == 0 {
                [rep1, rep0, rep2, rep3]
            } else if self.rc.decode_bit(&mut self.model.is_rep_g2[s])? == 0 {
                [rep2, rep0, rep1, rep3]
            } else {
                [rep3, rep0, rep1, rep2]
            };
        }

        let len = self.model.rep_len.decode(&mut self.rc, pos_state)?;
        self.state = self.state.next(Op::LongRep);
        Ok(Some(len))
    }

    /// Decode the distance of a new match of length `len`.
    fn decode_distance(&mut self, len: usize) -> Result<u32> {
        let len_state = (len - MATCH_LEN_MIN).min(LEN_TO_POS_STATES - 1);
        let slot = self.model.dist_slot[len_state].decode(&mut self.rc)?;

        if slot < START_POS_MODEL_INDEX {
            return Ok(slot);
        }

        let num_direct_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << num_direct_bits;

        if slot < END_POS_MODEL_INDEX {
            let offset = (base - slot) as usize;
            let low = reverse_decode_at(
                &mut self.model.pos_decoders,
                offset,
                num_direct_bits,
                &mut self.rc,
            )?;
            Ok(base + low)
        } else {
            let direct = self
                .rc
                .decode_direct_bits(num_direct_bits - DIST_ALIGN_BITS)?;
            let align = self.model.align.reverse_decode(&mut self.rc)?;
            Ok(base + (direct << DIST_ALIGN_BITS) + align)
        }
    }

    /// Reject distances reaching before the output or past the dictionary.
    fn check_distance(&self, distance: u32) -> Result<()> {
        let total = self.window.total_out();
        let distance = distance as u64;
        if distance >= total || distance >= self.dictionary_size_check {
            return Err(ClimarcError::corrupt(
                total,
                format!(
                    "match distance {} exceeds output {} or dictionary {}",
                    distance + 1,
                    total,
                    self.dictionary_size_check
                ),
            ));
        }
        Ok(())
    }

    /// Copy `len` bytes from the most recent distance.
    fn copy_match(&mut self, len: usize, expected: Option<u64>) -> Result<()> {
        self.check_distance(self.reps[0])?;

        let end = self.window.total_out() + len as u64;
        if let Some(size) = expected {
            if end > size {
                return Err(ClimarcError::size_mismatch(size, end));
            }
        }

        self.window.copy_block(self.reps[0] as usize, len);
        Ok(())
    }
}

/// Decompress an LZMA stream that starts with a 13-byte `.lzma` header.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    LzmaDecoder::from_header(data, HeaderLayout::Alone)?.decompress()
}

/// Decompress a stream with the given header layout.
///
/// `expected_size` supplies the uncompressed size when the header does not
/// carry one; it is ignored when the header does.
pub fn decompress_with_layout(
    data: &[u8],
    layout: HeaderLayout,
    expected_size: Option<u64>,
) -> Result<Vec<u8>> {
    let mut decoder = LzmaDecoder::from_header(data, layout)?;
    if decoder.props.uncompressed_size.is_none() {
        decoder.set_uncompressed_size(expected_size);
    }
    decoder.decompress()
}

/// Decompress raw range-coded data (no header).
pub fn decompress_raw(data: &[u8], props: StreamProperties) -> Result<Vec<u8>> {
    LzmaDecoder::new(data, props)?.decompress()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DIST_SLOTS;
    use crate::range_coder::RangeEncoder;
    use climarc_core::ErrorKind;

    /// Encoder-side mirror of the decoder, for crafting streams bit by bit.
    struct StreamBuilder {
        encoder: RangeEncoder,
        model: LzmaModel,
        state: State,
        pos: u64,
        prev: u8,
    }

    impl StreamBuilder {
        fn new(props: &StreamProperties) -> Self {
            Self {
                encoder: RangeEncoder::new(),
                model: LzmaModel::new(props),
                state: State::default(),
                pos: 0,
                prev: 0,
            }
        }

        fn pos_state(&self) -> usize {
            self.pos as usize & 3
        }

        fn literal(&mut self, byte: u8, match_byte: Option<u8>) {
            let s = self.state.index();
            let ps = self.pos_state();
            self.encoder.encode_bit(&mut self.model.is_match[s][ps], 0);
            let coder = self.model.literal.coder(self.pos, self.prev);
            match match_byte {
                None => coder.encode_normal(&mut self.encoder, byte),
                Some(m) => coder.encode_matched(&mut self.encoder, byte, m),
            }
            self.state = self.state.next(Op::Literal);
            self.pos += 1;
            self.prev = byte;
        }

        /// A new match with distance slot `slot` (< 4) or the end marker (slot 63).
        fn matched(&mut self, len: usize, slot: u32) {
            let s = self.state.index();
            let ps = self.pos_state();
            self.encoder.encode_bit(&mut self.model.is_match[s][ps], 1);
            self.encoder.encode_bit(&mut self.model.is_rep[s], 0);
            self.model.match_len.encode(&mut self.encoder, ps, len);
            let len_state = (len - MATCH_LEN_MIN).min(3);
            self.encoder
                .encode_tree(self.model.dist_slot[len_state].probs_mut(), 6, slot);
            if slot == DIST_SLOTS as u32 - 1 {
                self.encoder.encode_direct_bits(0x3FF_FFFF, 26);
                self.encoder
                    .encode_tree_reverse(self.model.align.probs_mut(), 4, 0xF);
            }
            self.state = self.state.next(Op::Match);
            self.pos += len as u64;
        }

        fn short_rep(&mut self) {
            let s = self.state.index();
            let ps = self.pos_state();
            self.encoder.encode_bit(&mut self.model.is_match[s][ps], 1);
            self.encoder.encode_bit(&mut self.model.is_rep[s], 1);
            self.encoder.encode_bit(&mut self.model.is_rep_g0[s], 0);
            self.encoder.encode_bit(&mut self.model.is_rep0_long[s][ps], 0);
            self.state = self.state.next(Op::ShortRep);
            self.pos += 1;
        }

        fn long_rep0(&mut self, len: usize) {
            let s = self.state.index();
            let ps = self.pos_state();
            self.encoder.encode_bit(&mut self.model.is_match[s][ps], 1);
            self.encoder.encode_bit(&mut self.model.is_rep[s], 1);
            self.encoder.encode_bit(&mut self.model.is_rep_g0[s], 0);
            self.encoder.encode_bit(&mut self.model.is_rep0_long[s][ps], 1);
            self.model.rep_len.encode(&mut self.encoder, ps, len);
            self.state = self.state.next(Op::LongRep);
            self.pos += len as u64;
        }

        fn finish(self) -> Vec<u8> {
            self.encoder.finish()
        }
    }

    fn props(dictionary_size: u32) -> StreamProperties {
        StreamProperties::new(3, 0, 2, dictionary_size).unwrap()
    }

    #[test]
    fn test_decoder_creation() {
        let data = [0u8; 5];
        let decoder = LzmaDecoder::new(&data, props(4096)).unwrap();
        assert_eq!(decoder.properties().dictionary_size, 4096);

        let err = LzmaDecoder::new(&data[..3], props(4096)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEndOfInput);
    }

    #[test]
    fn test_zero_size_stream() {
        let data = [0u8; 5];
        let out = decompress_raw(&data, props(4096).with_uncompressed_size(Some(0))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_match_before_any_output_is_corrupt() {
        let p = props(4096);
        let mut builder = StreamBuilder::new(&p);
        builder.matched(2, 0);
        let data = builder.finish();

        let err = decompress_raw(&data, p).unwrap_err();
        assert!(matches!(
            err,
            ClimarcError::CorruptCompressedStream { position: 0, .. }
        ));
    }

    fn two_literals_then_match(p: &StreamProperties) -> Vec<u8> {
        let mut builder = StreamBuilder::new(p);
        builder.literal(b'A', None);
        builder.literal(b'B', None);
        builder.matched(2, 1);
        builder.finish()
    }

    #[test]
    fn test_distance_beyond_dictionary_is_corrupt() {
        let p = props(1).with_uncompressed_size(Some(4));
        let data = two_literals_then_match(&p);

        let err = decompress_raw(&data, p).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptCompressedStream);
    }

    #[test]
    fn test_overlapping_match() {
        let p = props(2).with_uncompressed_size(Some(4));
        let data = two_literals_then_match(&p);
        assert_eq!(decompress_raw(&data, p).unwrap(), b"ABAB");
    }

    #[test]
    fn test_match_past_declared_size() {
        let p = props(2).with_uncompressed_size(Some(3));
        let data = two_literals_then_match(&p);

        let err = decompress_raw(&data, p).unwrap_err();
        assert!(matches!(
            err,
            ClimarcError::SizeMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    fn literal_then_end_marker(p: &StreamProperties) -> Vec<u8> {
        let mut builder = StreamBuilder::new(p);
        builder.literal(b'A', None);
        builder.matched(2, 63);
        builder.finish()
    }

    #[test]
    fn test_end_marker_with_unknown_size() {
        let p = props(4096);
        let data = literal_then_end_marker(&p);
        assert_eq!(decompress_raw(&data, p).unwrap(), b"A");
    }

    #[test]
    fn test_end_marker_before_declared_size() {
        let p = props(4096).with_uncompressed_size(Some(5));
        let data = literal_then_end_marker(&p);

        let err = decompress_raw(&data, p).unwrap_err();
        assert!(matches!(
            err,
            ClimarcError::SizeMismatch {
                expected: 5,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_declared_size_stops_before_end_marker() {
        let p = props(4096).with_uncompressed_size(Some(1));
        let data = literal_then_end_marker(&p);
        assert_eq!(decompress_raw(&data, p).unwrap(), b"A");
    }

    #[test]
    fn test_truncated_stream() {
        let p = props(4096);
        let data = literal_then_end_marker(&p);

        let err = decompress_raw(&data[..data.len() - 3], p).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEndOfInput);
    }

    #[test]
    fn test_rep_paths_and_matched_literal() {
        let p = props(4096).with_uncompressed_size(Some(6));
        let mut builder = StreamBuilder::new(&p);
        builder.literal(b'A', None);
        builder.short_rep();
        builder.long_rep0(3);
        builder.literal(b'Z', Some(b'A'));
        let data = builder.finish();

        assert_eq!(decompress_raw(&data, p).unwrap(), b"AAAAAZ");
    }

    #[test]
    fn test_output_limit() {
        let p = props(4096);
        let data = literal_then_end_marker(&p);

        let mut decoder = LzmaDecoder::new(&data, p).unwrap();
        decoder.set_output_limit(Some(0));
        let err = decoder.decompress().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);

        let mut decoder = LzmaDecoder::new(&data, p.with_uncompressed_size(Some(10))).unwrap();
        decoder.set_output_limit(Some(9));
        let err = decoder.decompress().unwrap_err();
        assert!(matches!(
            err,
            ClimarcError::LimitExceeded { value: 10, limit: 9, .. }
        ));
    }

    #[test]
    fn test_header_layouts() {
        let p = props(4096);
        let body = literal_then_end_marker(&p);

        let mut alone = p.to_header(HeaderLayout::Alone);
        alone.extend_from_slice(&body);
        assert_eq!(decompress(&alone).unwrap(), b"A");

        let mut short = p.to_header(HeaderLayout::PropertiesOnly);
        short.extend_from_slice(&body);
        let out = decompress_with_layout(&short, HeaderLayout::PropertiesOnly, None).unwrap();
        assert_eq!(out, b"A");
        let out = decompress_with_layout(&short, HeaderLayout::PropertiesOnly, Some(1)).unwrap();
        assert_eq!(out, b"A");
    }
}
