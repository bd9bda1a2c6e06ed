//! Body text of Word 97-2003 (`.doc`) files.
//!
//! The text lives in the `WordDocument` stream of an OLE compound file. The
//! FIB at the start of that stream points at a piece table (inside the
//! `0Table` or `1Table` stream) which maps character positions to byte runs.
//! Each run is either UTF-16LE or 8-bit cp1252 ("compressed").

use std::io::{Cursor, Read, Seek};

use cfb::CompoundFile;
use encoding_rs::WINDOWS_1252;

use crate::core::errors::RagError;

const WORD_IDENT: u16 = 0xA5EC;
const FIB_FLAGS_OFFSET: usize = 0x0A;
const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_TABLE_1: u16 = 0x0200;
/// Size of `FibBase`; `csw` follows it.
const FIB_BASE_LEN: usize = 32;
/// Index of `ccpText` within `FibRgLw97`.
const CCP_TEXT_INDEX: usize = 3;
/// Index of the `fcClx`/`lcbClx` pair within `FibRgFcLcb97`.
const CLX_PAIR_INDEX: usize = 33;
const CLXT_PRC: u8 = 0x01;
const CLXT_PCDT: u8 = 0x02;
const PCD_LEN: usize = 8;
const FC_COMPRESSED: u32 = 0x4000_0000;
const FC_MASK: u32 = 0x3FFF_FFFF;

const FIELD_BEGIN: char = '\u{13}';
const FIELD_SEPARATOR: char = '\u{14}';
const FIELD_END: char = '\u{15}';

/// Where the main document text sits in the table stream.
#[derive(Debug)]
struct Fib {
    table_stream: &'static str,
    ccp_text: usize,
    fc_clx: usize,
    lcb_clx: usize,
}

#[derive(Debug, PartialEq, Eq)]
struct Piece {
    cp_start: usize,
    cp_end: usize,
    offset: usize,
    compressed: bool,
}

pub(crate) fn extract_text(bytes: &[u8]) -> Result<String, RagError> {
    let mut compound = CompoundFile::open(Cursor::new(bytes))
        .map_err(|e| RagError::ParseFailure(format!("invalid Word 97 container: {}", e)))?;

    let word = read_stream(&mut compound, "/WordDocument")?;
    let fib = parse_fib(&word)?;
    let table = read_stream(&mut compound, fib.table_stream)?;
    let pieces = parse_piece_table(&table, fib.fc_clx, fib.lcb_clx)?;

    let mut raw = String::new();
    for piece in &pieces {
        if piece.cp_start >= fib.ccp_text {
            break;
        }
        let chars = piece.cp_end.min(fib.ccp_text).saturating_sub(piece.cp_start);
        raw.push_str(&decode_piece(&word, piece, chars)?);
    }

    let text = clean_control_chars(&raw);
    if text.trim().is_empty() {
        return Err(RagError::ParseFailure(
            "no readable text found in Word document".to_string(),
        ));
    }
    Ok(text)
}

fn read_stream<F: Read + Seek>(
    compound: &mut CompoundFile<F>,
    path: &str,
) -> Result<Vec<u8>, RagError> {
    let mut stream = compound
        .open_stream(path)
        .map_err(|e| RagError::ParseFailure(format!("Word document has no {} stream: {}", path, e)))?;
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|e| RagError::ParseFailure(format!("failed to read {}: {}", path, e)))?;
    Ok(data)
}

fn parse_fib(word: &[u8]) -> Result<Fib, RagError> {
    if read_u16(word, 0)? != WORD_IDENT {
        return Err(RagError::ParseFailure(
            "WordDocument stream has no Word 97 header".to_string(),
        ));
    }
    let flags = read_u16(word, FIB_FLAGS_OFFSET)?;
    if flags & FLAG_ENCRYPTED != 0 {
        return Err(RagError::ParseFailure(
            "encrypted Word documents are not supported".to_string(),
        ));
    }

    let csw = read_u16(word, FIB_BASE_LEN)? as usize;
    let rg_lw = FIB_BASE_LEN + 2 + csw * 2 + 2;
    let cslw = read_u16(word, rg_lw - 2)? as usize;
    if cslw <= CCP_TEXT_INDEX {
        return Err(RagError::ParseFailure("Word header is truncated".to_string()));
    }
    let ccp_text = read_u32(word, rg_lw + CCP_TEXT_INDEX * 4)? as usize;

    let rg_fc_lcb = rg_lw + cslw * 4 + 2;
    let pairs = read_u16(word, rg_fc_lcb - 2)? as usize;
    if pairs <= CLX_PAIR_INDEX {
        return Err(RagError::ParseFailure("Word header is truncated".to_string()));
    }
    let clx = rg_fc_lcb + CLX_PAIR_INDEX * 8;

    Ok(Fib {
        table_stream: if flags & FLAG_TABLE_1 != 0 {
            "/1Table"
        } else {
            "/0Table"
        },
        ccp_text,
        fc_clx: read_u32(word, clx)? as usize,
        lcb_clx: read_u32(word, clx + 4)? as usize,
    })
}

fn parse_piece_table(table: &[u8], fc_clx: usize, lcb_clx: usize) -> Result<Vec<Piece>, RagError> {
    let clx = fc_clx
        .checked_add(lcb_clx)
        .and_then(|end| table.get(fc_clx..end))
        .ok_or_else(|| RagError::ParseFailure("piece table is out of bounds".to_string()))?;

    // Property runs (Prc) precede the piece descriptors (Pcdt).
    let mut pos = 0;
    loop {
        match clx.get(pos) {
            Some(&CLXT_PRC) => pos += 3 + read_u16(clx, pos + 1)? as usize,
            Some(&CLXT_PCDT) => break,
            _ => return Err(RagError::ParseFailure("piece table not found".to_string())),
        }
    }

    let lcb = read_u32(clx, pos + 1)? as usize;
    let plc = clx
        .get(pos + 5..pos + 5 + lcb)
        .ok_or_else(|| RagError::ParseFailure("piece table is truncated".to_string()))?;
    if lcb < 4 || (lcb - 4) % (4 + PCD_LEN) != 0 {
        return Err(RagError::ParseFailure("piece table is malformed".to_string()));
    }

    let count = (lcb - 4) / (4 + PCD_LEN);
    let descriptors = (count + 1) * 4;
    (0..count)
        .map(|i| {
            let fc = read_u32(plc, descriptors + i * PCD_LEN + 2)?;
            let compressed = fc & FC_COMPRESSED != 0;
            let fc = (fc & FC_MASK) as usize;
            Ok(Piece {
                cp_start: read_u32(plc, i * 4)? as usize,
                cp_end: read_u32(plc, (i + 1) * 4)? as usize,
                offset: if compressed { fc / 2 } else { fc },
                compressed,
            })
        })
        .collect()
}

fn decode_piece(word: &[u8], piece: &Piece, chars: usize) -> Result<String, RagError> {
    let len = if piece.compressed { chars } else { chars * 2 };
    let bytes = piece
        .offset
        .checked_add(len)
        .and_then(|end| word.get(piece.offset..end))
        .ok_or_else(|| RagError::ParseFailure("text piece is out of bounds".to_string()))?;

    if piece.compressed {
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
        Ok(text.into_owned())
    } else {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }
}

/// Maps Word's in-band marks to plain text and drops field instructions,
/// keeping field results.
fn clean_control_chars(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    // One entry per open field: true while still inside its instruction.
    let mut fields: Vec<bool> = Vec::new();

    for c in raw.chars() {
        match c {
            FIELD_BEGIN => fields.push(true),
            FIELD_SEPARATOR => {
                if let Some(instruction) = fields.last_mut() {
                    *instruction = false;
                }
            }
            FIELD_END => {
                fields.pop();
            }
            _ if fields.iter().any(|&instruction| instruction) => {}
            '\r' | '\u{0B}' | '\u{0C}' => text.push('\n'),
            '\u{07}' | '\t' => text.push('\t'),
            '\u{1E}' => text.push('-'),
            c if c.is_control() => {}
            c => text.push(c),
        }
    }
    text
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, RagError> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| RagError::ParseFailure("Word document is truncated".to_string()))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, RagError> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| RagError::ParseFailure("Word document is truncated".to_string()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal Word 97 files for parser tests.

    use std::io::{Cursor, Write};

    use cfb::CompoundFile;

    use super::*;

    const TEXT_START: usize = 1024;

    /// One text run; `compressed` runs are cp1252 bytes.
    pub(crate) struct Run<'a> {
        pub text: &'a str,
        pub compressed: bool,
    }

    /// Builds a `.doc` whose main text is the first `ccp_text` characters of
    /// `runs`.
    pub(crate) fn word97(runs: &[Run<'_>], ccp_text: usize) -> Vec<u8> {
        let mut word = vec![0u8; TEXT_START];
        word[0..2].copy_from_slice(&WORD_IDENT.to_le_bytes());
        word[2..4].copy_from_slice(&0x00C1u16.to_le_bytes());
        word[FIB_FLAGS_OFFSET..FIB_FLAGS_OFFSET + 2].copy_from_slice(&FLAG_TABLE_1.to_le_bytes());

        let csw = 14usize;
        let cslw = 22usize;
        let pairs = 0x5Dusize;
        word[FIB_BASE_LEN..FIB_BASE_LEN + 2].copy_from_slice(&(csw as u16).to_le_bytes());
        let rg_lw = FIB_BASE_LEN + 2 + csw * 2 + 2;
        word[rg_lw - 2..rg_lw].copy_from_slice(&(cslw as u16).to_le_bytes());
        let ccp = rg_lw + CCP_TEXT_INDEX * 4;
        word[ccp..ccp + 4].copy_from_slice(&(ccp_text as u32).to_le_bytes());
        let rg_fc_lcb = rg_lw + cslw * 4 + 2;
        word[rg_fc_lcb - 2..rg_fc_lcb].copy_from_slice(&(pairs as u16).to_le_bytes());

        let mut cps = vec![0u32];
        let mut pcds = Vec::new();
        for run in runs {
            let offset = word.len();
            let chars = if run.compressed {
                let (encoded, _, _) = WINDOWS_1252.encode(run.text);
                word.extend_from_slice(&encoded);
                encoded.len()
            } else {
                let units: Vec<u16> = run.text.encode_utf16().collect();
                for unit in &units {
                    word.extend_from_slice(&unit.to_le_bytes());
                }
                units.len()
            };
            let last = cps.last().copied().unwrap_or(0);
            cps.push(last + chars as u32);

            let fc = if run.compressed {
                (offset as u32 * 2) | FC_COMPRESSED
            } else {
                offset as u32
            };
            let mut pcd = [0u8; PCD_LEN];
            pcd[2..6].copy_from_slice(&fc.to_le_bytes());
            pcds.extend_from_slice(&pcd);
        }

        // A property run before the descriptors, as Word writes them.
        let mut table = vec![CLXT_PRC, 0x02, 0x00, 0xAA, 0xBB, CLXT_PCDT];
        let plc_len = cps.len() * 4 + pcds.len();
        table.extend_from_slice(&(plc_len as u32).to_le_bytes());
        for cp in &cps {
            table.extend_from_slice(&cp.to_le_bytes());
        }
        table.extend_from_slice(&pcds);

        let clx = rg_fc_lcb + CLX_PAIR_INDEX * 8;
        word[clx..clx + 4].copy_from_slice(&0u32.to_le_bytes());
        word[clx + 4..clx + 8].copy_from_slice(&(table.len() as u32).to_le_bytes());

        compound_file(&[("/WordDocument", &word[..]), ("/1Table", &table[..])])
    }

    pub(crate) fn compound_file(streams: &[(&str, &[u8])]) -> Vec<u8> {
        let mut compound = CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        for (path, data) in streams {
            let mut stream = compound.create_stream(path).unwrap();
            stream.write_all(data).unwrap();
            stream.flush().unwrap();
        }
        compound.flush().unwrap();
        compound.into_inner().into_inner()
    }
}
