//! LZMA stream properties, state machine and probability models.
//!
//! LZMA uses context-dependent probability models for:
//! - Literal decoding (context = previous byte + position)
//! - Match length decoding
//! - Distance decoding (slot, reverse-coded low bits, alignment bits)
//! - State machine transitions
//!
//! Every model is owned by a single decode call and dropped with it.

#[cfg(test)]
use crate::range_coder::RangeEncoder;
use crate::range_coder::{PROB_INIT, RangeDecoder};
use climarc_core::error::{ClimarcError, Result};

/// Maximum number of literal context bits.
pub const LC_MAX: u32 = 8;
/// Maximum number of literal position bits.
pub const LP_MAX: u32 = 4;
/// Maximum number of position bits.
pub const PB_MAX: u32 = 4;

/// Number of distinct properties bytes (`9 * 5 * 5`).
pub const PROPS_BYTE_LIMIT: u32 = (LC_MAX + 1) * (LP_MAX + 1) * (PB_MAX + 1);

/// Size of the properties header (props byte + dictionary size).
pub const PROPS_HEADER_SIZE: usize = 5;
/// Size of the `.lzma` ("alone") header (props + dictionary + uncompressed size).
pub const ALONE_HEADER_SIZE: usize = 13;
/// Uncompressed size value meaning "unknown, end marker required".
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Maximum number of position states.
pub const POS_STATES_MAX: usize = 1 << PB_MAX;

/// Number of states in the LZMA state machine.
pub const NUM_STATES: usize = 12;

/// Number of bits for low length coding.
pub const LEN_LOW_BITS: u32 = 3;
/// Number of bits for mid length coding.
pub const LEN_MID_BITS: u32 = 3;
/// Number of bits for high length coding.
pub const LEN_HIGH_BITS: u32 = 8;

/// Number of low length symbols.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Number of mid length symbols.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Number of high length symbols.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;

/// Minimum match length.
pub const MATCH_LEN_MIN: usize = 2;
/// Maximum match length.
pub const MATCH_LEN_MAX: usize = MATCH_LEN_MIN + LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS - 1;

/// Number of length contexts used to pick a distance slot tree.
pub const LEN_TO_POS_STATES: usize = 4;

/// Number of distance slots.
pub const DIST_SLOTS: usize = 64;

/// First slot whose distance carries extra bits.
pub const START_POS_MODEL_INDEX: u32 = 4;
/// First slot whose extra bits are direct bits plus alignment.
pub const END_POS_MODEL_INDEX: u32 = 14;

/// Number of alignment bits for distance decoding.
pub const DIST_ALIGN_BITS: u32 = 4;
/// Size of alignment table.
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;

/// Number of full distance symbols.
pub const FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX / 2);

/// Size of the shared reverse-coded position model array.
pub const POS_DECODERS_SIZE: usize = FULL_DISTANCES - END_POS_MODEL_INDEX as usize;

/// Decoded distance that marks the end of the stream.
pub const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

/// Probabilities per literal coder (plain tree plus two matched trees).
pub const LITERAL_CODER_SIZE: usize = 0x300;

/// Kind of operation just decoded, used to drive state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// A single literal byte.
    Literal = 0,
    /// A match with an explicitly coded distance.
    Match = 1,
    /// A repeat match of length >= 2 against one of the recent distances.
    LongRep = 2,
    /// A one-byte repeat of the most recent distance.
    ShortRep = 3,
}

/// LZMA state machine state.
///
/// Each state remembers the last one or two operations; the first seven
/// states end with a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum State {
    /// Literal after literal.
    #[default]
    LitLit = 0,
    /// Literal, literal after a match.
    MatchLitLit = 1,
    /// Literal, literal after a long repeat.
    RepLitLit = 2,
    /// Literal, literal after a short repeat.
    ShortRepLitLit = 3,
    /// Literal after a match.
    MatchLit = 4,
    /// Literal after a long repeat.
    RepLit = 5,
    /// Literal after a short repeat.
    ShortRepLit = 6,
    /// Match after a literal.
    LitMatch = 7,
    /// Long repeat after a literal.
    LitLongRep = 8,
    /// Short repeat after a literal.
    LitShortRep = 9,
    /// Match after a non-literal.
    NonLitMatch = 10,
    /// Repeat after a non-literal.
    NonLitRep = 11,
}

/// Transition table indexed by `[state][op]`.
const TRANSITIONS: [[State; 4]; NUM_STATES] = {
    use State::*;
    [
        [LitLit, LitMatch, LitLongRep, LitShortRep],
        [LitLit, LitMatch, LitLongRep, LitShortRep],
        [LitLit, LitMatch, LitLongRep, LitShortRep],
        [LitLit, LitMatch, LitLongRep, LitShortRep],
        [MatchLitLit, LitMatch, LitLongRep, LitShortRep],
        [RepLitLit, LitMatch, LitLongRep, LitShortRep],
        [ShortRepLitLit, LitMatch, LitLongRep, LitShortRep],
        [MatchLit, NonLitMatch, NonLitRep, NonLitRep],
        [RepLit, NonLitMatch, NonLitRep, NonLitRep],
        [ShortRepLit, NonLitMatch, NonLitRep, NonLitRep],
        [MatchLit, NonLitMatch, NonLitRep, NonLitRep],
        [RepLit, NonLitMatch, NonLitRep, NonLitRep],
    ]
};

impl State {
    /// All states in index order.
    pub const ALL: [State; NUM_STATES] = [
        State::LitLit,
        State::MatchLitLit,
        State::RepLitLit,
        State::ShortRepLitLit,
        State::MatchLit,
        State::RepLit,
        State::ShortRepLit,
        State::LitMatch,
        State::LitLongRep,
        State::LitShortRep,
        State::NonLitMatch,
        State::NonLitRep,
    ];

    /// Index into per-state probability tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the last operation was a literal.
    #[inline]
    pub fn is_literal(self) -> bool {
        (self as u8) < 7
    }

    /// State after performing `op`.
    #[inline]
    pub fn next(self, op: Op) -> State {
        TRANSITIONS[self as usize][op as usize]
    }
}

/// Layout of the header in front of the range-coded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// Classic `.lzma` header: props byte, dictionary size, 8-byte uncompressed size.
    #[default]
    Alone,
    /// Props byte and dictionary size only; the size comes from elsewhere.
    PropertiesOnly,
}

impl HeaderLayout {
    /// Number of header bytes before the range coder data.
    pub fn header_len(self) -> usize {
        match self {
            Self::Alone => ALONE_HEADER_SIZE,
            Self::PropertiesOnly => PROPS_HEADER_SIZE,
        }
    }
}

/// Parameters of one LZMA stream, parsed from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProperties {
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
    /// Dictionary size declared by the encoder.
    pub dictionary_size: u32,
    /// Uncompressed size, or `None` when the stream ends with an end marker.
    pub uncompressed_size: Option<u64>,
}

impl StreamProperties {
    /// Create properties, validating the lc/lp/pb ranges.
    pub fn new(lc: u32, lp: u32, pb: u32, dictionary_size: u32) -> Result<Self> {
        if lc > LC_MAX || lp > LP_MAX || pb > PB_MAX {
            return Err(ClimarcError::invalid_properties(format!(
                "lc={lc}, lp={lp}, pb={pb} out of range"
            )));
        }
        Ok(Self {
            lc,
            lp,
            pb,
            dictionary_size,
            uncompressed_size: None,
        })
    }

    /// Split a properties byte `(pb * 5 + lp) * 9 + lc` into its parts.
    pub fn from_byte(byte: u8, dictionary_size: u32) -> Result<Self> {
        let mut value = byte as u32;
        if value >= PROPS_BYTE_LIMIT {
            return Err(ClimarcError::invalid_properties(format!(
                "properties byte 0x{byte:02X} out of range"
            )));
        }
        let lc = value % 9;
        value /= 9;
        let lp = value % 5;
        let pb = value / 5;
        Self::new(lc, lp, pb, dictionary_size)
    }

    /// Parse the header at the start of `data`.
    ///
    /// With [`HeaderLayout::PropertiesOnly`] the uncompressed size is left
    /// unknown; use [`with_uncompressed_size`](Self::with_uncompressed_size)
    /// when the caller knows it.
    pub fn parse(data: &[u8], layout: HeaderLayout) -> Result<Self> {
        let header_len = layout.header_len();
        if data.len() < header_len {
            return Err(ClimarcError::premature_end(data.len() as u64));
        }

        let dictionary_size = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
        let mut props = Self::from_byte(data[0], dictionary_size)?;

        if layout == HeaderLayout::Alone {
            let mut size = [0u8; 8];
            size.copy_from_slice(&data[PROPS_HEADER_SIZE..ALONE_HEADER_SIZE]);
            let size = u64::from_le_bytes(size);
            props.uncompressed_size = (size != UNKNOWN_SIZE).then_some(size);
        }

        Ok(props)
    }

    /// Replace the uncompressed size.
    pub fn with_uncompressed_size(mut self, size: Option<u64>) -> Self {
        self.uncompressed_size = size;
        self
    }

    /// Encode the properties byte.
    pub fn props_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    /// Serialize a header in the given layout.
    pub fn to_header(&self, layout: HeaderLayout) -> Vec<u8> {
        let mut header = Vec::with_capacity(layout.header_len());
        header.push(self.props_byte());
        header.extend_from_slice(&self.dictionary_size.to_le_bytes());
        if layout == HeaderLayout::Alone {
            let size = self.uncompressed_size.unwrap_or(UNKNOWN_SIZE);
            header.extend_from_slice(&size.to_le_bytes());
        }
        header
    }

    /// Dictionary size used for distance validation (never zero).
    pub fn dictionary_size_check(&self) -> u32 {
        self.dictionary_size.max(1)
    }

    /// Number of literal coders, `2^(lc + lp)`.
    pub fn num_literal_coders(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Number of position states, `2^pb`.
    pub fn num_pos_states(&self) -> usize {
        1 << self.pb
    }

    /// Mask selecting the position state from the output position.
    pub fn pos_state_mask(&self) -> usize {
        self.num_pos_states() - 1
    }
}

/// Binary tree of `N` probabilities decoding `log2(N)`-bit symbols.
#[derive(Debug, Clone)]
pub struct BitTreeDecoder<const N: usize> {
    probs: [u16; N],
}

impl<const N: usize> BitTreeDecoder<N> {
    /// Number of bits per symbol.
    pub const NUM_BITS: u32 = N.trailing_zeros();

    /// Create a tree with every probability at one half.
    pub fn new() -> Self {
        Self {
            probs: [PROB_INIT; N],
        }
    }

    /// Decode a symbol, most significant bit first.
    pub fn decode(&mut self, rc: &mut RangeDecoder<'_>) -> Result<u32> {
        let mut m = 1usize;
        for _ in 0..Self::NUM_BITS {
            m = (m << 1) | rc.decode_bit(&mut self.probs[m])? as usize;
        }
        Ok((m - N) as u32)
    }

    /// Decode a symbol, least significant bit first.
    pub fn reverse_decode(&mut self, rc: &mut RangeDecoder<'_>) -> Result<u32> {
        reverse_decode_at(&mut self.probs, 1, Self::NUM_BITS, rc)
    }

    /// Probabilities, for encoders crafting test streams.
    #[cfg(test)]
    pub(crate) fn probs_mut(&mut self) -> &mut [u16] {
        &mut self.probs
    }
}

impl<const N: usize> Default for BitTreeDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverse bit-tree decode over a tree embedded in a shared array.
///
/// The tree node `m` (starting at 1) lives at `probs[offset + m - 1]`.
pub fn reverse_decode_at(
    probs: &mut [u16],
    offset: usize,
    num_bits: u32,
    rc: &mut RangeDecoder<'_>,
) -> Result<u32> {
    let mut m = 1usize;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[offset + m - 1])?;
        m = (m << 1) | bit as usize;
        symbol |= bit << i;
    }
    Ok(symbol)
}

/// Probabilities for one literal context.
#[derive(Debug, Clone)]
pub struct LiteralCoder {
    probs: [u16; LITERAL_CODER_SIZE],
}

impl LiteralCoder {
    fn new() -> Self {
        Self {
            probs: [PROB_INIT; LITERAL_CODER_SIZE],
        }
    }

    /// Decode a literal with no match context.
    pub fn decode_normal(&mut self, rc: &mut RangeDecoder<'_>) -> Result<u8> {
        let mut symbol = 1usize;
        while symbol < 0x100 {
            symbol = (symbol << 1) | rc.decode_bit(&mut self.probs[symbol])? as usize;
        }
        Ok(symbol as u8)
    }

    /// Decode a literal using the byte at the last match distance as context.
    ///
    /// The matched trees are used while the decoded bits agree with
    /// `match_byte`; after the first disagreement the rest of the byte comes
    /// from the plain tree.
    pub fn decode_with_match_byte(&mut self, rc: &mut RangeDecoder<'_>, match_byte: u8) -> Result<u8> {
        let mut symbol = 1usize;
        let mut match_byte = match_byte as usize;

        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;
            let bit = rc.decode_bit(&mut self.probs[((1 + match_bit) << 8) + symbol])? as usize;
            symbol = (symbol << 1) | bit;

            if bit != match_bit {
                while symbol < 0x100 {
                    symbol = (symbol << 1) | rc.decode_bit(&mut self.probs[symbol])? as usize;
                }
                break;
            }
        }

        Ok(symbol as u8)
    }

    /// Encode a literal with no match context.
    #[cfg(test)]
    pub(crate) fn encode_normal(&mut self, encoder: &mut RangeEncoder, byte: u8) {
        encoder.encode_tree(&mut self.probs, 8, byte as u32);
    }

    /// Encode a literal against `match_byte`, mirroring `decode_with_match_byte`.
    #[cfg(test)]
    pub(crate) fn encode_matched(&mut self, encoder: &mut RangeEncoder, byte: u8, match_byte: u8) {
        let mut symbol = 1usize;
        let mut matched = true;
        for i in (0..8).rev() {
            let bit = ((byte >> i) & 1) as u32;
            if matched {
                let match_bit = ((match_byte >> i) & 1) as usize;
                encoder.encode_bit(&mut self.probs[((1 + match_bit) << 8) + symbol], bit);
                matched = match_bit == bit as usize;
            } else {
                encoder.encode_bit(&mut self.probs[symbol], bit);
            }
            symbol = (symbol << 1) | bit as usize;
        }
    }
}

/// Literal decoder: `2^(lc + lp)` coders selected by position and previous byte.
#[derive(Debug, Clone)]
pub struct LiteralDecoder {
    coders: Vec<LiteralCoder>,
    lc: u32,
    lp_mask: u64,
}

impl LiteralDecoder {
    /// Create a decoder for the given properties.
    pub fn new(props: &StreamProperties) -> Self {
        Self {
            coders: vec![LiteralCoder::new(); props.num_literal_coders()],
            lc: props.lc,
            lp_mask: (1u64 << props.lp) - 1,
        }
    }

    /// Index of the coder for output position `pos` after byte `prev`.
    #[inline]
    pub fn coder_index(&self, pos: u64, prev: u8) -> usize {
        (((pos & self.lp_mask) as usize) << self.lc) + ((prev as usize) >> (8 - self.lc))
    }

    /// Coder for output position `pos` after byte `prev`.
    #[inline]
    pub fn coder(&mut self, pos: u64, prev: u8) -> &mut LiteralCoder {
        let index = self.coder_index(pos, prev);
        &mut self.coders[index]
    }

    /// Number of coders.
    pub fn len(&self) -> usize {
        self.coders.len()
    }

    /// Always false: there is at least one coder.
    pub fn is_empty(&self) -> bool {
        self.coders.is_empty()
    }
}

/// Match length decoder.
#[derive(Debug, Clone)]
pub struct LenDecoder {
    choice: u16,
    choice2: u16,
    low: Vec<BitTreeDecoder<LEN_LOW_SYMBOLS>>,
    mid: Vec<BitTreeDecoder<LEN_MID_SYMBOLS>>,
    high: BitTreeDecoder<LEN_HIGH_SYMBOLS>,
}

impl LenDecoder {
    /// Create a length decoder with `num_pos_states` low/mid trees.
    pub fn new(num_pos_states: usize) -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: vec![BitTreeDecoder::new(); num_pos_states],
            mid: vec![BitTreeDecoder::new(); num_pos_states],
            high: BitTreeDecoder::new(),
        }
    }

    /// Decode a match length in `MATCH_LEN_MIN..=MATCH_LEN_MAX`.
    pub fn decode(&mut self, rc: &mut RangeDecoder<'_>, pos_state: usize) -> Result<usize> {
        let len = if rc.decode_bit(&mut self.choice)? == 0 {
            self.low[pos_state].decode(rc)? as usize
        } else if rc.decode_bit(&mut self.choice2)? == 0 {
            LEN_LOW_SYMBOLS + self.mid[pos_state].decode(rc)? as usize
        } else {
            LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + self.high.decode(rc)? as usize
        };
        Ok(len + MATCH_LEN_MIN)
    }

    /// Encode a match length, mirroring [`decode`](Self::decode).
    #[cfg(test)]
    pub(crate) fn encode(&mut self, encoder: &mut RangeEncoder, pos_state: usize, len: usize) {
        let value = (len - MATCH_LEN_MIN) as u32;
        if value < LEN_LOW_SYMBOLS as u32 {
            encoder.encode_bit(&mut self.choice, 0);
            encoder.encode_tree(self.low[pos_state].probs_mut(), LEN_LOW_BITS, value);
        } else if value < (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32 {
            encoder.encode_bit(&mut self.choice, 1);
            encoder.encode_bit(&mut self.choice2, 0);
            encoder.encode_tree(
                self.mid[pos_state].probs_mut(),
                LEN_MID_BITS,
                value - LEN_LOW_SYMBOLS as u32,
            );
        } else {
            encoder.encode_bit(&mut self.choice, 1);
            encoder.encode_bit(&mut self.choice2, 1);
            encoder.encode_tree(
                self.high.probs_mut(),
                LEN_HIGH_BITS,
                value - (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32,
            );
        }
    }
}

/// Complete LZMA model containing all probability tables.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// Is-match probabilities.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Is-rep probabilities.
    pub is_rep: [u16; NUM_STATES],
    /// Is-rep0 probabilities.
    pub is_rep_g0: [u16; NUM_STATES],
    /// Is-rep1 probabilities.
    pub is_rep_g1: [u16; NUM_STATES],
    /// Is-rep2 probabilities.
    pub is_rep_g2: [u16; NUM_STATES],
    /// Is-rep0-long probabilities.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Distance slot trees, one per length context.
    pub dist_slot: [BitTreeDecoder<DIST_SLOTS>; LEN_TO_POS_STATES],
    /// Reverse-coded low distance bits for slots 4-13.
    pub pos_decoders: [u16; POS_DECODERS_SIZE],
    /// Alignment bits for slots 14 and up.
    pub align: BitTreeDecoder<DIST_ALIGN_SIZE>,

    /// Match length decoder.
    pub match_len: LenDecoder,
    /// Rep match length decoder.
    pub rep_len: LenDecoder,

    /// Literal decoder.
    pub literal: LiteralDecoder,
}

impl LzmaModel {
    /// Create a fresh model for the given properties.
    pub fn new(props: &StreamProperties) -> Self {
        let num_pos_states = props.num_pos_states();

        Self {
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            dist_slot: std::array::from_fn(|_| BitTreeDecoder::new()),
            pos_decoders: [PROB_INIT; POS_DECODERS_SIZE],
            align: BitTreeDecoder::new(),
            match_len: LenDecoder::new(num_pos_states),
            rep_len: LenDecoder::new(num_pos_states),
            literal: LiteralDecoder::new(props),
        }
    }
}
