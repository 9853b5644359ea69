//! Raw report demultiplexer.
//!
//! [`Parser::parse`] walks one self-framed buffer and hands every decoded
//! record to the sink as a tagged [`Frame`], in source order. The parser
//! keeps no state between calls; on error, records delivered before the
//! failing one stay delivered and the rest of the buffer is dropped.

use crate::report::{
    DftGroup, DftWindow, Heatmap, StylusData, DFT_AXIS_COLUMN, DFT_AXIS_ROW, DFT_BINS,
    DFT_MAX_GROUPS, FRAME_MAGIC, REPORT_DFT, REPORT_HEATMAP, REPORT_STYLUS,
};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while decoding a raw report buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The frame header magic did not match [`FRAME_MAGIC`].
    InvalidMagic {
        /// The tag that was found instead.
        found: u32,
    },
    /// A declared payload length exceeds the available input.
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// A DFT group advertised an axis that is neither row nor column.
    InvalidAxis {
        /// The axis tag that was found.
        axis: u8,
    },
    /// A DFT window declared more groups than [`DFT_MAX_GROUPS`].
    TooManyGroups {
        /// The declared group count.
        count: usize,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMagic { found } => {
                write!(f, "invalid frame magic: 0x{:08X}", found)
            }
            Self::UnexpectedEof { needed, available } => {
                write!(f, "unexpected end of input: need {}, have {}", needed, available)
            }
            Self::InvalidAxis { axis } => {
                write!(f, "unknown DFT axis tag: {}", axis)
            }
            Self::TooManyGroups { count } => {
                write!(f, "too many DFT groups: {}", count)
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ── Frame dispatch ─────────────────────────────────────────────────────────

/// One decoded record, dispatched as a tagged variant.
#[derive(Debug, Clone)]
pub enum Frame<'a> {
    /// A capacitive heatmap, borrowing its cells from the input buffer.
    Heatmap(Heatmap<'a>),
    /// A legacy stylus report.
    Stylus(StylusData),
    /// A DFT antenna window.
    Dft(DftWindow),
}

// ── Byte reader ────────────────────────────────────────────────────────────

/// Bounds-checked little-endian cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if len > self.remaining() {
            return Err(ParseError::UnexpectedEof {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.take(len).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_i16(&mut self) -> Result<i16, ParseError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

// ── Parser ─────────────────────────────────────────────────────────────────

/// Stateless demultiplexer for raw report buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Decode one buffer, handing each record to `sink` in source order.
    ///
    /// Unknown record types are skipped. Malformed input aborts the buffer
    /// with a [`ParseError`]; records already handed to the sink are not
    /// rolled back.
    pub fn parse(
        &self,
        data: &[u8],
        sink: &mut dyn FnMut(Frame<'_>),
    ) -> Result<(), ParseError> {
        let mut reader = Reader::new(data);

        let magic = reader.read_u32()?;
        if magic != FRAME_MAGIC {
            return Err(ParseError::InvalidMagic { found: magic });
        }

        let size = reader.read_u32()? as usize;
        let mut records = Reader::new(reader.take(size)?);

        while records.remaining() > 0 {
            let ty = records.read_u16()?;
            let len = records.read_u16()? as usize;
            let payload = records.take(len)?;

            match ty {
                REPORT_HEATMAP => sink(Frame::Heatmap(Self::parse_heatmap(payload)?)),
                REPORT_STYLUS => sink(Frame::Stylus(Self::parse_stylus(payload)?)),
                REPORT_DFT => sink(Frame::Dft(Self::parse_dft(payload)?)),
                _ => {}
            }
        }

        Ok(())
    }

    fn parse_heatmap(payload: &[u8]) -> Result<Heatmap<'_>, ParseError> {
        let mut reader = Reader::new(payload);

        let height = reader.read_u8()?;
        let width = reader.read_u8()?;
        let z_min = reader.read_u8()?;
        let z_max = reader.read_u8()?;

        let data = reader.take(usize::from(height) * usize::from(width))?;

        Ok(Heatmap {
            height,
            width,
            z_min,
            z_max,
            data,
        })
    }

    fn parse_stylus(payload: &[u8]) -> Result<StylusData, ParseError> {
        let mut reader = Reader::new(payload);

        let mode = reader.read_u16()?;
        let mut stylus = StylusData {
            x: reader.read_u16()?,
            y: reader.read_u16()?,
            pressure: reader.read_u16()?,
            tilt_x: reader.read_i16()?,
            tilt_y: reader.read_i16()?,
            serial: reader.read_u32()?,
            ..StylusData::default()
        };
        stylus.set_mode(mode);

        Ok(stylus)
    }

    fn parse_dft(payload: &[u8]) -> Result<DftWindow, ParseError> {
        let mut reader = Reader::new(payload);

        let num_groups = usize::from(reader.read_u8()?);
        if num_groups > DFT_MAX_GROUPS {
            return Err(ParseError::TooManyGroups { count: num_groups });
        }

        let mut window = DftWindow {
            width: reader.read_u8()?,
            height: reader.read_u8()?,
            ..DftWindow::default()
        };
        reader.skip(1)?; // reserved

        for _ in 0..num_groups {
            let axis = reader.read_u8()?;
            let first = reader.read_u8()?;
            let last = reader.read_u8()?;
            let mid = reader.read_u8()?;
            let frequency = reader.read_u32()?;
            let magnitude = reader.read_u32()?;

            let mut real = [0_i16; DFT_BINS];
            let mut imag = [0_i16; DFT_BINS];
            for i in 0..DFT_BINS {
                real[i] = reader.read_i16()?;
                imag[i] = reader.read_i16()?;
            }

            let group = DftGroup {
                first,
                last,
                mid,
                frequency,
                magnitude,
                real,
                imag,
            };

            match axis {
                DFT_AXIS_ROW => window.rows.push(group),
                DFT_AXIS_COLUMN => window.columns.push(group),
                _ => return Err(ParseError::InvalidAxis { axis }),
            }
        }

        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FrameBuilder;

    /// Collect the kinds of frames a buffer produces, for order assertions.
    fn frame_kinds(data: &[u8]) -> Result<Vec<&'static str>, ParseError> {
        let parser = Parser::new();
        let mut kinds = Vec::new();
        let result = parser.parse(data, &mut |frame| {
            kinds.push(match frame {
                Frame::Heatmap(_) => "heatmap",
                Frame::Stylus(_) => "stylus",
                Frame::Dft(_) => "dft",
            });
        });
        result.map(|()| kinds)
    }

    #[test]
    fn empty_frame_yields_no_records() {
        let data = FrameBuilder::new().build();
        assert_eq!(frame_kinds(&data).unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn records_are_delivered_in_source_order() {
        let data = FrameBuilder::new()
            .stylus(StylusData {
                proximity: true,
                x: 100,
                y: 200,
                serial: 1,
                ..StylusData::default()
            })
            .heatmap(4, 4, 0, 255, &[0xFF; 16])
            .stylus(StylusData {
                proximity: true,
                x: 110,
                y: 210,
                serial: 1,
                ..StylusData::default()
            })
            .build();

        assert_eq!(frame_kinds(&data).unwrap(), vec!["stylus", "heatmap", "stylus"]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let data = FrameBuilder::new()
            .heatmap(2, 3, 10, 200, &[50; 6])
            .stylus(StylusData::default())
            .build();

        assert_eq!(frame_kinds(&data).unwrap(), frame_kinds(&data).unwrap());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = FrameBuilder::new().build();
        data[0] ^= 0xFF;

        match frame_kinds(&data) {
            Err(ParseError::InvalidMagic { .. }) => {}
            other => panic!("expected InvalidMagic, got {:?}", other),
        }
    }

    #[test]
    fn unknown_record_types_are_skipped() {
        let data = FrameBuilder::new()
            .record(0x0999, &[1, 2, 3, 4])
            .stylus(StylusData::default())
            .build();

        assert_eq!(frame_kinds(&data).unwrap(), vec!["stylus"]);
    }

    #[test]
    fn stylus_fields_round_trip() {
        let stylus = StylusData {
            proximity: true,
            contact: true,
            button: false,
            rubber: false,
            x: 4800,
            y: 3600,
            pressure: 1024,
            tilt_x: -1500,
            tilt_y: 2500,
            serial: 0xDEAD_BEEF,
        };
        let data = FrameBuilder::new().stylus(stylus).build();

        let parser = Parser::new();
        let mut decoded = None;
        parser
            .parse(&data, &mut |frame| {
                if let Frame::Stylus(s) = frame {
                    decoded = Some(s);
                }
            })
            .unwrap();

        assert_eq!(decoded.unwrap(), stylus);
    }

    #[test]
    fn truncated_heatmap_fails_after_preceding_records() {
        // A valid stylus record followed by a heatmap whose declared cell
        // count exceeds the record payload.
        let data = FrameBuilder::new()
            .stylus(StylusData::default())
            .truncated_heatmap(8, 8, 16)
            .build();

        let parser = Parser::new();
        let mut kinds = Vec::new();
        let result = parser.parse(&data, &mut |frame| {
            kinds.push(match frame {
                Frame::Heatmap(_) => "heatmap",
                Frame::Stylus(_) => "stylus",
                Frame::Dft(_) => "dft",
            });
        });

        // The stylus record was delivered, the malformed heatmap was not.
        assert_eq!(kinds, vec!["stylus"]);
        match result {
            Err(ParseError::UnexpectedEof { .. }) => {}
            other => panic!("expected UnexpectedEof, got {:?}", other),
        }
    }

    #[test]
    fn dft_window_groups_split_by_axis() {
        let data = FrameBuilder::new()
            .dft(64, 44, &[(DFT_AXIS_ROW, 20), (DFT_AXIS_COLUMN, 30), (DFT_AXIS_COLUMN, 31)])
            .build();

        let parser = Parser::new();
        let mut window = None;
        parser
            .parse(&data, &mut |frame| {
                if let Frame::Dft(w) = frame {
                    window = Some(w);
                }
            })
            .unwrap();

        let window = window.unwrap();
        assert_eq!(window.width, 64);
        assert_eq!(window.height, 44);
        assert_eq!(window.rows.len(), 1);
        assert_eq!(window.columns.len(), 2);
        assert_eq!(window.rows[0].mid, 20);
        assert_eq!(window.columns[1].mid, 31);
    }

    #[test]
    fn dft_unknown_axis_is_an_error() {
        let data = FrameBuilder::new().dft(64, 44, &[(7, 10)]).build();

        match frame_kinds(&data) {
            Err(ParseError::InvalidAxis { axis: 7 }) => {}
            other => panic!("expected InvalidAxis, got {:?}", other),
        }
    }

    #[test]
    fn declared_frame_size_beyond_buffer_is_an_error() {
        let mut data = FrameBuilder::new().stylus(StylusData::default()).build();
        // Inflate the declared payload size past the end of the buffer.
        let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        data[4..8].copy_from_slice(&(size + 64).to_le_bytes());

        match frame_kinds(&data) {
            Err(ParseError::UnexpectedEof { .. }) => {}
            other => panic!("expected UnexpectedEof, got {:?}", other),
        }
    }
}
