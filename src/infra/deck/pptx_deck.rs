// =============================================================================
// PPTX DECK
// =============================================================================
//
// A .pptx file is a zip of OOXML parts. The template is loaded fully into
// memory, slide parts are edited as text, and the whole package is written
// back out in the original part order.
//
// **Part layout relied on:**
// - `ppt/presentation.xml`         - `<p:sldIdLst>` gives slide order by r:id
// - `ppt/_rels/presentation.xml.rels` - maps those r:ids to slide parts
// - `ppt/slides/slideN.xml`        - shapes (`<p:sp>`) inside `<p:spTree>`
// - `ppt/slides/_rels/slideN.xml.rels` - per-slide relationships (images)
// - `[Content_Types].xml`          - one `<Default>` per media extension

use crate::core::deck::{DeckError, DeckTemplate, PictureFrame, SlideDeck, TextStyle};
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const EMU_PER_INCH: f64 = 914_400.0;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const OFFICE_REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `<p:sldId id="256" r:id="rId2"/>` inside `<p:sldIdLst>`.
static SLIDE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<p:sldId\b[^>]*?\br:id="([^"]+)""#).expect("slide id regex")
});

static RELATIONSHIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Relationship\b[^>]*>").expect("relationship regex"));

static ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w:.-]+)="([^"]*)""#).expect("attribute regex"));

/// A whole shape. Shapes never nest, so the lazy match is exact.
static SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p:sp\b[^>]*>.*?</p:sp>").expect("shape regex"));

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p:ph\b[^>]*>").expect("placeholder regex"));

static TEXT_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p:txBody>(.*?)</p:txBody>").expect("text body regex"));

/// Start of the first paragraph; everything before it (bodyPr, lstStyle)
/// is kept when text is replaced.
static FIRST_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a:p[\s>/]").expect("paragraph regex"));

static SHAPE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<p:cNvPr\b[^>]*?\bid="(\d+)""#).expect("shape id regex")
});

static REL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bId="rId(\d+)""#).expect("relationship id regex"));

// =============================================================================
// TEMPLATE
// =============================================================================

/// A .pptx on disk. Every `open` reads it afresh, so runs never share state.
pub struct PptxTemplate {
    path: PathBuf,
}

impl PptxTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DeckTemplate for PptxTemplate {
    fn open(&self) -> Result<Box<dyn SlideDeck>, DeckError> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            DeckError::Template(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let deck = PptxDeck::from_bytes(&bytes)?;
        tracing::debug!(
            template = %self.path.display(),
            slides = deck.slides.len(),
            "Opened presentation template"
        );
        Ok(Box::new(deck))
    }
}

// =============================================================================
// DECK
// =============================================================================

struct Part {
    name: String,
    data: Vec<u8>,
}

pub struct PptxDeck {
    /// Package parts in their original order; new parts are appended.
    parts: Vec<Part>,
    /// Slide part names in presentation order.
    slides: Vec<String>,
}

impl PptxDeck {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push(Part { name, data });
        }

        let mut deck = Self {
            parts,
            slides: Vec::new(),
        };
        deck.slides = deck.resolve_slide_order()?;
        Ok(deck)
    }

    fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    fn text_part(&self, name: &str) -> Result<String, DeckError> {
        let part = self
            .part(name)
            .ok_or_else(|| DeckError::Template(format!("missing part {}", name)))?;
        String::from_utf8(part.data.clone())
            .map_err(|_| DeckError::Template(format!("part {} is not UTF-8", name)))
    }

    fn put_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    fn slide_part(&self, slide: usize) -> Result<String, DeckError> {
        self.slides
            .get(slide)
            .cloned()
            .ok_or(DeckError::NoSuchSlide(slide))
    }

    fn resolve_slide_order(&self) -> Result<Vec<String>, DeckError> {
        let presentation = self.text_part(PRESENTATION_PART)?;
        let targets = parse_relationships(&self.text_part(PRESENTATION_RELS_PART)?);

        SLIDE_ID_RE
            .captures_iter(&presentation)
            .map(|caps| {
                let rel_id = &caps[1];
                targets
                    .get(rel_id)
                    .map(|target| resolve_target("ppt", target))
                    .ok_or_else(|| {
                        DeckError::Template(format!("slide relationship {} not found", rel_id))
                    })
            })
            .collect()
    }

    /// Replaces the paragraphs of the shape chosen by `pick`.
    fn rewrite_shape_text(
        &mut self,
        slide: usize,
        pick: fn(&[Shape]) -> Option<usize>,
        paragraphs: &str,
    ) -> Result<bool, DeckError> {
        let part = self.slide_part(slide)?;
        let xml = self.text_part(&part)?;
        let shapes = scan_shapes(&xml);

        let Some(target) = pick(&shapes) else {
            return Ok(false);
        };
        let range = shapes[target].range.clone();
        let updated = format!(
            "{}{}{}",
            &xml[..range.start],
            replace_paragraphs(&xml[range.clone()], paragraphs),
            &xml[range.end..]
        );

        self.put_part(&part, updated.into_bytes());
        Ok(true)
    }

    fn unused_media_name(&self, package_dir: &str, ext: &str) -> String {
        (1..)
            .map(|n| join_part(package_dir, &format!("media/deck_image{}.{}", n, ext)))
            .find(|name| self.part(name).is_none())
            .unwrap_or_default()
    }

    fn ensure_content_type(&mut self, ext: &str, content_type: &str) -> Result<(), DeckError> {
        let xml = self.text_part(CONTENT_TYPES_PART)?;
        let needle = format!(r#"extension="{}""#, ext);
        if xml.to_ascii_lowercase().contains(&needle) {
            return Ok(());
        }

        let default = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            ext, content_type
        );
        let updated = insert_before_last(&xml, "</Types>", &default).ok_or_else(|| {
            DeckError::Template("content types part has no </Types>".to_string())
        })?;
        self.put_part(CONTENT_TYPES_PART, updated.into_bytes());
        Ok(())
    }

    /// Adds an image relationship to the slide and returns its r:id.
    fn add_image_relationship(&mut self, slide_part: &str, target: &str) -> Result<String, DeckError> {
        let (slide_dir, slide_file) = split_part_name(slide_part);
        let rels_part = join_part(slide_dir, &format!("_rels/{}.rels", slide_file));

        let rels = match self.part(&rels_part) {
            Some(_) => self.text_part(&rels_part)?,
            None => format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"{}\"></Relationships>",
                PACKAGE_REL_NS
            ),
        };

        let next = REL_ID_RE
            .captures_iter(&rels)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let rel_id = format!("rId{}", next);

        let relationship = format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            rel_id, IMAGE_REL_TYPE, target
        );
        let updated = insert_before_last(&rels, "</Relationships>", &relationship)
            .ok_or_else(|| DeckError::Template(format!("malformed {}", rels_part)))?;
        self.put_part(&rels_part, updated.into_bytes());

        Ok(rel_id)
    }
}

impl SlideDeck for PptxDeck {
    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn set_title(&mut self, slide: usize, text: &str, style: &TextStyle) -> Result<bool, DeckError> {
        let paragraph = paragraph_xml(text, style, false);
        self.rewrite_shape_text(slide, title_shape, &paragraph)
    }

    fn set_body(
        &mut self,
        slide: usize,
        paragraphs: &[String],
        style: &TextStyle,
    ) -> Result<bool, DeckError> {
        let body = if paragraphs.is_empty() {
            r#"<a:p><a:endParaRPr lang="en-US" dirty="0"/></a:p>"#.to_string()
        } else {
            paragraphs
                .iter()
                .map(|p| paragraph_xml(p, style, true))
                .collect()
        };
        self.rewrite_shape_text(slide, body_shape, &body)
    }

    fn add_picture(
        &mut self,
        slide: usize,
        image: &Path,
        frame: &PictureFrame,
    ) -> Result<(), DeckError> {
        let slide_part = self.slide_part(slide)?;

        let ext = image
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| DeckError::Image(format!("{} has no extension", image.display())))?;
        let content_type = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            other => return Err(DeckError::Image(format!("unsupported image type: {}", other))),
        };
        let data = std::fs::read(image)?;

        // Media lives next to the slides directory: ppt/slides -> ppt/media.
        let (slide_dir, _) = split_part_name(&slide_part);
        let (package_dir, _) = split_part_name(slide_dir);
        let media_part = self.unused_media_name(package_dir, &ext);
        let (_, media_file) = split_part_name(&media_part);
        let target = format!("../media/{}", media_file);

        self.put_part(&media_part, data);
        self.ensure_content_type(&ext, content_type)?;
        let rel_id = self.add_image_relationship(&slide_part, &target)?;

        let mut xml = self.text_part(&slide_part)?;
        if !xml.contains("xmlns:r=") {
            xml = xml.replacen("<p:sld ", &format!(r#"<p:sld xmlns:r="{}" "#, OFFICE_REL_NS), 1);
        }
        let shape_id = SHAPE_ID_RE
            .captures_iter(&xml)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .unwrap_or(1)
            + 1;

        let picture = picture_xml(shape_id, &rel_id, frame);
        let updated = insert_before_last(&xml, "</p:spTree>", &picture)
            .ok_or_else(|| DeckError::Template(format!("{} has no shape tree", slide_part)))?;
        self.put_part(&slide_part, updated.into_bytes());
        Ok(())
    }

    fn save(&self, output: &Path) -> Result<(), DeckError> {
        let file = std::fs::File::create(output)?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            writer
                .start_file(part.name.as_str(), options)
                .map_err(zip_error)?;
            writer.write_all(&part.data)?;
        }

        writer.finish().map_err(zip_error)?;
        Ok(())
    }
}

// =============================================================================
// SHAPES
// =============================================================================

struct Shape {
    range: Range<usize>,
    placeholder: Option<Placeholder>,
    has_text_body: bool,
}

struct Placeholder {
    kind: Option<String>,
    idx: Option<String>,
}

impl Shape {
    fn is_title(&self) -> bool {
        matches!(
            self.placeholder.as_ref().and_then(|p| p.kind.as_deref()),
            Some("title") | Some("ctrTitle")
        )
    }
}

fn scan_shapes(xml: &str) -> Vec<Shape> {
    SHAPE_RE
        .find_iter(xml)
        .map(|m| {
            let text = m.as_str();
            let placeholder = PLACEHOLDER_RE.find(text).map(|ph| {
                let attrs = attributes(ph.as_str());
                Placeholder {
                    kind: attrs.get("type").cloned(),
                    idx: attrs.get("idx").cloned(),
                }
            });
            Shape {
                range: m.range(),
                placeholder,
                has_text_body: text.contains("<p:txBody"),
            }
        })
        .collect()
}

fn title_shape(shapes: &[Shape]) -> Option<usize> {
    shapes.iter().position(Shape::is_title)
}

/// The content placeholder (idx 1, else the first non-title placeholder)
/// when the slide has more than one placeholder; otherwise the first
/// non-title shape that carries text.
fn body_shape(shapes: &[Shape]) -> Option<usize> {
    let placeholders: Vec<usize> = shapes
        .iter()
        .enumerate()
        .filter(|(_, s)| s.placeholder.is_some())
        .map(|(i, _)| i)
        .collect();

    if placeholders.len() > 1 {
        let by_idx = placeholders.iter().copied().find(|&i| {
            !shapes[i].is_title()
                && shapes[i].placeholder.as_ref().and_then(|p| p.idx.as_deref()) == Some("1")
        });
        let first_other = placeholders.iter().copied().find(|&i| !shapes[i].is_title());
        if let Some(found) = by_idx.or(first_other) {
            return Some(found);
        }
    }

    shapes
        .iter()
        .position(|s| s.has_text_body && !s.is_title())
}

fn replace_paragraphs(shape_xml: &str, paragraphs: &str) -> String {
    let inner = TEXT_BODY_RE.captures(shape_xml).and_then(|caps| caps.get(1));

    match inner {
        Some(inner) => {
            let body = inner.as_str();
            let keep = FIRST_PARAGRAPH_RE
                .find(body)
                .map(|m| m.start())
                .unwrap_or(body.len());
            let prefix = &body[..keep];
            let body_pr = if prefix.contains("<a:bodyPr") {
                ""
            } else {
                "<a:bodyPr/>"
            };
            format!(
                "{}{}{}{}{}",
                &shape_xml[..inner.start()],
                body_pr,
                prefix,
                paragraphs,
                &shape_xml[inner.end()..]
            )
        }
        None => {
            let text_body = format!(
                "<p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody>",
                paragraphs
            );
            insert_before_last(shape_xml, "</p:sp>", &text_body)
                .unwrap_or_else(|| shape_xml.to_string())
        }
    }
}

// =============================================================================
// XML FRAGMENTS
// =============================================================================

fn paragraph_xml(text: &str, style: &TextStyle, bullet_level: bool) -> String {
    let mut run_props = format!(r#"<a:rPr lang="en-US" sz="{}""#, style.size_pt * 100);
    if style.bold {
        run_props.push_str(r#" b="1""#);
    }
    run_props.push_str(r#" dirty="0""#);
    match style.typeface {
        Some(face) => run_props.push_str(&format!(
            r#"><a:latin typeface="{}"/></a:rPr>"#,
            escape_xml(face)
        )),
        None => run_props.push_str("/>"),
    }

    let paragraph_props = if bullet_level { r#"<a:pPr lvl="0"/>"# } else { "" };

    format!(
        "<a:p>{}<a:r>{}<a:t>{}</a:t></a:r></a:p>",
        paragraph_props,
        run_props,
        escape_xml(text)
    )
}

fn picture_xml(shape_id: u32, rel_id: &str, frame: &PictureFrame) -> String {
    format!(
        concat!(
            "<p:pic><p:nvPicPr><p:cNvPr id=\"{id}\" name=\"Picture {id}\"/>",
            "<p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>",
            "<p:blipFill><a:blip r:embed=\"{rel}\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>",
            "<p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>"
        ),
        id = shape_id,
        rel = rel_id,
        x = inches_to_emu(frame.left_in),
        y = inches_to_emu(frame.top_in),
        cx = inches_to_emu(frame.width_in),
        cy = inches_to_emu(frame.height_in),
    )
}

fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// PACKAGE HELPERS
// =============================================================================

fn zip_error(e: zip::result::ZipError) -> DeckError {
    DeckError::Template(e.to_string())
}

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE_RE
        .captures_iter(tag)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Relationship id -> target, from a `.rels` part.
fn parse_relationships(rels: &str) -> HashMap<String, String> {
    RELATIONSHIP_RE
        .find_iter(rels)
        .filter_map(|m| {
            let mut attrs = attributes(m.as_str());
            Some((attrs.remove("Id")?, attrs.remove("Target")?))
        })
        .collect()
}

/// Resolves a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => join_part(base_dir, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn join_part(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// `ppt/slides/slide1.xml` -> (`ppt/slides`, `slide1.xml`).
fn split_part_name(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("", name),
    }
}

fn insert_before_last(haystack: &str, marker: &str, insert: &str) -> Option<String> {
    let pos = haystack.rfind(marker)?;
    Some(format!("{}{}{}", &haystack[..pos], insert, &haystack[pos..]))
}
