//! Export a conversation transcript as a paginated PDF.
//!
//! User and assistant messages are written as colour-coded blocks (`You:`
//! in navy, the assistant's name in dark green, body text in black).
//! System notices are skipped.
//!
//! # Fonts
//!
//! The configured Unicode TrueType font is embedded when the file exists and
//! parses; every character the font covers renders as written. Otherwise
//! the standard Helvetica font is used with WinAnsi encoding, and each
//! character outside that encoding is replaced by `?`. The returned
//! [`ExportedTranscript`] says which font was used and how many characters
//! were replaced, so callers can tell the user.
//!
//! The font program is embedded whole, without subsetting, so each
//! transcript carries the full size of the configured font file.

use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{Message, Role};

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MM: f32 = 2.8346;
const MARGIN_SIDE: f32 = 10.0 * MM;
const MARGIN_TOP: f32 = 10.0 * MM;
const MARGIN_BOTTOM: f32 = 15.0 * MM;

const TITLE_SIZE: f32 = 16.0;
const TEXT_SIZE: f32 = 12.0;
const TITLE_HEIGHT: f32 = 10.0 * MM;
const LABEL_HEIGHT: f32 = 7.0 * MM;
const BODY_HEIGHT: f32 = 6.0 * MM;
const BLOCK_GAP: f32 = 5.0 * MM;

/// Helvetica advances for ' '..='~' in 1/1000 em, from the standard AFM metrics.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const NAVY: [f32; 3] = [0.0, 0.0, 128.0 / 255.0];
const DARK_GREEN: [f32; 3] = [0.0, 100.0 / 255.0, 0.0];
const BLACK: [f32; 3] = [0.0, 0.0, 0.0];

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub assistant_name: String,
    pub unicode_font: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptFont {
    Embedded(PathBuf),
    Helvetica,
}

#[derive(Debug, Clone)]
pub struct ExportedTranscript {
    pub bytes: Vec<u8>,
    pub font: TranscriptFont,
    /// Characters the chosen font could not represent, each written as `?`.
    pub substituted_chars: usize,
    pub pages: usize,
}

/// Renders `messages` to PDF bytes.
pub fn export_transcript(messages: &[Message], options: &ExportOptions) -> Result<ExportedTranscript> {
    let font_data = options
        .unicode_font
        .as_deref()
        .and_then(load_unicode_font);

    let (mut encoder, font) = match (&font_data, &options.unicode_font) {
        (Some((data, _)), Some(path)) => {
            let face = ttf_parser::Face::parse(data, 0)
                .with_context(|| format!("Failed to parse font: {}", path.display()))?;
            (FontEncoder::embedded(face), TranscriptFont::Embedded(path.clone()))
        }
        _ => (FontEncoder::Builtin { substituted: 0 }, TranscriptFont::Helvetica),
    };

    let mut writer = PageWriter::new();
    let title = format!("{} Chat History", options.assistant_name);
    writer.line(&mut encoder, &title, TITLE_SIZE, BLACK, true, TITLE_HEIGHT);
    writer.gap(BLOCK_GAP);

    let assistant_label = format!("{}:", options.assistant_name);
    for message in messages {
        let (label, color) = match message.role {
            Role::System => continue,
            Role::User => ("You:", NAVY),
            Role::Assistant => (assistant_label.as_str(), DARK_GREEN),
        };
        writer.line(&mut encoder, label, TEXT_SIZE, color, false, LABEL_HEIGHT);
        let max_width = PAGE_WIDTH - 2.0 * MARGIN_SIDE;
        for line in wrap(&encoder, &message.content, TEXT_SIZE, max_width) {
            writer.line(&mut encoder, &line, TEXT_SIZE, BLACK, false, BODY_HEIGHT);
        }
        writer.gap(BLOCK_GAP);
    }

    let substituted_chars = encoder.substituted();
    let font_name = font_data
        .as_ref()
        .map(|(_, name)| name.clone())
        .unwrap_or_else(|| "Helvetica".to_string());
    let pages = writer.pages.len();
    let bytes = build_document(writer.pages, &encoder, &font_name, &title)?;

    if font == TranscriptFont::Helvetica && substituted_chars > 0 {
        warn!(
            substituted_chars,
            "unicode font unavailable; characters outside Latin-1 were replaced with '?'"
        );
    }
    info!(pages, bytes = bytes.len(), "transcript exported");

    Ok(ExportedTranscript {
        bytes,
        font,
        substituted_chars,
        pages,
    })
}

/// Renders `messages` and writes the PDF to `path`.
pub fn write_transcript(
    messages: &[Message],
    options: &ExportOptions,
    path: &Path,
) -> Result<ExportedTranscript> {
    let exported = export_transcript(messages, options)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, &exported.bytes)
        .with_context(|| format!("Failed to write transcript: {}", path.display()))?;
    Ok(exported)
}

/// Reads a TrueType font if it exists and parses. Returns the data and a
/// PostScript-safe font name derived from the file stem.
fn load_unicode_font(path: &Path) -> Option<(Vec<u8>, String)> {
    if !path.exists() {
        warn!(font = %path.display(), "unicode font not found; using Helvetica");
        return None;
    }
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(font = %path.display(), error = %e, "unicode font unreadable; using Helvetica");
            return None;
        }
    };
    if let Err(e) = ttf_parser::Face::parse(&data, 0) {
        warn!(font = %path.display(), error = %e, "unicode font invalid; using Helvetica");
        return None;
    }
    let name: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let name = if name.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        name
    };
    Some((data, name))
}

enum FontEncoder<'a> {
    Builtin {
        substituted: usize,
    },
    Embedded {
        face: ttf_parser::Face<'a>,
        /// Glyph id → (first char drawn with it, advance in font units).
        used: BTreeMap<u16, (char, u16)>,
        substituted: usize,
    },
}

impl<'a> FontEncoder<'a> {
    fn embedded(face: ttf_parser::Face<'a>) -> Self {
        FontEncoder::Embedded {
            face,
            used: BTreeMap::new(),
            substituted: 0,
        }
    }

    fn substituted(&self) -> usize {
        match self {
            FontEncoder::Builtin { substituted } => *substituted,
            FontEncoder::Embedded { substituted, .. } => *substituted,
        }
    }

    fn width(&self, text: &str, size: f32) -> f32 {
        match self {
            FontEncoder::Builtin { .. } => {
                text.chars().map(helvetica_width).sum::<u32>() as f32 / 1000.0 * size
            }
            FontEncoder::Embedded { face, .. } => {
                let upem = face.units_per_em() as f32;
                text.chars()
                    .map(|c| {
                        let gid = face.glyph_index(c).unwrap_or(ttf_parser::GlyphId(0));
                        face.glyph_hor_advance(gid).unwrap_or(0) as f32
                    })
                    .sum::<f32>()
                    / upem
                    * size
            }
        }
    }

    fn encode(&mut self, text: &str) -> Object {
        match self {
            FontEncoder::Builtin { substituted } => {
                let bytes = text
                    .chars()
                    .map(|c| {
                        win_ansi_byte(c).unwrap_or_else(|| {
                            *substituted += 1;
                            b'?'
                        })
                    })
                    .collect();
                Object::String(bytes, StringFormat::Literal)
            }
            FontEncoder::Embedded {
                face,
                used,
                substituted,
            } => {
                let fallback = face.glyph_index('?').unwrap_or(ttf_parser::GlyphId(0));
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let gid = match face.glyph_index(c) {
                        Some(gid) => gid,
                        None => {
                            *substituted += 1;
                            fallback
                        }
                    };
                    let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                    used.entry(gid.0).or_insert((c, advance));
                    bytes.extend_from_slice(&gid.0.to_be_bytes());
                }
                Object::String(bytes, StringFormat::Hexadecimal)
            }
        }
    }
}

/// Helvetica advance in 1/1000 em. Accented and other non-ASCII WinAnsi
/// glyphs are bounded by the widest glyph of their class; characters outside
/// WinAnsi are drawn as `?`.
fn helvetica_width(c: char) -> u32 {
    match c {
        ' '..='~' => HELVETICA_ASCII_WIDTHS[c as usize - 0x20] as u32,
        '—' | '…' | '™' | '‰' | 'Æ' | 'Œ' => 1000,
        'æ' | 'œ' => 944,
        _ if win_ansi_byte(c).is_some() => 778,
        _ => 556,
    }
}

/// WinAnsi code for `c`, if the encoding has one.
fn win_ansi_byte(c: char) -> Option<u8> {
    match c {
        '\t' => Some(b' '),
        ' '..='~' => Some(c as u8),
        '\u{a0}'..='\u{ff}' => Some(c as u32 as u8),
        '€' => Some(0x80),
        '‚' => Some(0x82),
        '„' => Some(0x84),
        '…' => Some(0x85),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        '™' => Some(0x99),
        _ => None,
    }
}

/// Greedy word wrap. Words wider than the line are broken by character.
fn wrap(encoder: &FontEncoder<'_>, text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if encoder.width(&candidate, size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                current.push(c);
                if encoder.width(&current, size) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
        lines.push(current);
    }
    lines
}

struct PageWriter {
    pages: Vec<Vec<Operation>>,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN_TOP,
        }
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN_BOTTOM {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN_TOP;
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn line(
        &mut self,
        encoder: &mut FontEncoder<'_>,
        text: &str,
        size: f32,
        color: [f32; 3],
        centered: bool,
        height: f32,
    ) {
        self.ensure_room(height);
        let x = if centered {
            ((PAGE_WIDTH - encoder.width(text, size)) / 2.0).max(MARGIN_SIDE)
        } else {
            MARGIN_SIDE
        };
        // Baseline sits roughly two thirds down the cell.
        let baseline = self.y - height * 0.7;
        let encoded = encoder.encode(text);
        let Some(page) = self.pages.last_mut() else {
            return;
        };
        page.push(Operation::new("BT", vec![]));
        page.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
        page.push(Operation::new(
            "rg",
            vec![color[0].into(), color[1].into(), color[2].into()],
        ));
        page.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        page.push(Operation::new("Tj", vec![encoded]));
        page.push(Operation::new("ET", vec![]));
        self.y -= height;
    }
}

fn build_document(
    pages: Vec<Vec<Operation>>,
    encoder: &FontEncoder<'_>,
    font_name: &str,
    title: &str,
) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = match encoder {
        FontEncoder::Builtin { .. } => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }),
        FontEncoder::Embedded { face, used, .. } => {
            add_embedded_font(&mut doc, face, used, font_name)
        }
    };

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(concat!("equity-tool ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Adds a Type0/Identity-H font with the TrueType program embedded.
fn add_embedded_font(
    doc: &mut Document,
    face: &ttf_parser::Face<'_>,
    used: &BTreeMap<u16, (char, u16)>,
    font_name: &str,
) -> lopdf::ObjectId {
    let scale = 1000.0 / face.units_per_em() as f32;
    let scaled = |v: i16| ((v as f32) * scale).round() as i64;
    let bbox = face.global_bounding_box();

    let program = face.raw_face().data.to_vec();
    let program_len = program.len() as i64;
    let font_file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => program_len },
        program,
    ));

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => font_name,
        "Flags" => 32,
        "FontBBox" => vec![
            scaled(bbox.x_min).into(),
            scaled(bbox.y_min).into(),
            scaled(bbox.x_max).into(),
            scaled(bbox.y_max).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => scaled(face.ascender()),
        "Descent" => scaled(face.descender()),
        "CapHeight" => scaled(face.capital_height().unwrap_or(face.ascender())),
        "StemV" => 80,
        "FontFile2" => font_file_id,
    });

    let mut widths: Vec<Object> = Vec::with_capacity(used.len() * 2);
    for (gid, (_, advance)) in used {
        widths.push((*gid as i64).into());
        widths.push(Object::Array(vec![((*advance as f32 * scale).round() as i64).into()]));
    }

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => font_name,
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });

    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(used)));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => font_name,
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_font_id.into()],
        "ToUnicode" => to_unicode_id,
    })
}

/// CMap mapping each used glyph id back to its character, for text extraction.
fn to_unicode_cmap(used: &BTreeMap<u16, (char, u16)>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &(char, u16))> = used.iter().collect();
    for block in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for (gid, (c, _)) in block {
            let mut units = [0u16; 2];
            let hex: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(
        "endcmap\nCMapName currentdict /CIDInit /ProcSet findresource /defineresource pop\nend\nend\n",
    );
    cmap.into_bytes()
}
