use crate::error::CompileError;
use crate::locale::LocalizedList;
use crate::locale::LocalizedText;
use crate::locale::expand_locales;
use crate::model::Bundle;
use crate::model::IndexEntry;
use crate::model::Silo;
use crate::model::SiloHeader;
use crate::rules::CompileFlags;
use crate::rules::TransformRule;
use flate2::bufread::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use sha2::Digest;
use sha2::Sha256;
use std::fs;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const INLINE_MARKUP: &[&str] = &["em", "code"];

/// Compiles the cached metadata document at `document` into a [`Silo`].
///
/// The document may be gzip-compressed or plain XML.
pub fn compile(
    document: &Path,
    locales: &[String],
    rules: &[TransformRule],
    flags: CompileFlags,
    cancel: &CancellationToken,
) -> Result<Silo, CompileError> {
    let bytes = fs::read(document).map_err(|source| CompileError::Io {
        path: document.to_path_buf(),
        source,
    })?;
    let digest = document_digest(&bytes);
    compile_bytes(&bytes, digest, locales, rules, flags, cancel)
}

/// SHA-256 hex digest used to tie a silo to the document it came from.
pub fn document_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn compile_bytes(
    bytes: &[u8],
    digest: String,
    locales: &[String],
    rules: &[TransformRule],
    flags: CompileFlags,
    cancel: &CancellationToken,
) -> Result<Silo, CompileError> {
    if cancel.is_cancelled() {
        return Err(CompileError::Cancelled);
    }
    let header = SiloHeader::new(digest, locales, rules);
    let origin_tag = header.rules.iter().find_map(|rule| match rule {
        TransformRule::OriginTag { origin } => Some(origin.clone()),
        TransformRule::Tokenize => None,
    });
    let locale_order = expand_locales(locales);

    let source: Box<dyn BufRead + '_> = if bytes.starts_with(&GZIP_MAGIC) {
        Box::new(BufReader::new(GzDecoder::new(bytes)))
    } else {
        Box::new(bytes)
    };

    let parser = DocumentParser {
        locales: &locale_order,
        origin_tag: origin_tag.as_deref(),
        flags,
        cancel,
    };
    let entries = parser.parse(source)?;
    debug!("compiled {} metadata components", entries.len());
    Ok(Silo::assemble(header, entries))
}

struct DocumentParser<'a> {
    locales: &'a [String],
    origin_tag: Option<&'a str>,
    flags: CompileFlags,
    cancel: &'a CancellationToken,
}

#[derive(Debug, Default)]
struct Frame {
    name: String,
    lang: Option<String>,
    attrs: Vec<(String, String)>,
    text: String,
    paragraphs: Vec<(Option<String>, String)>,
}

impl Frame {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn push_text(&mut self, text: &str) {
        for word in text.split_whitespace() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(word);
        }
    }
}

#[derive(Debug, Default)]
struct ComponentBuilder {
    kind: String,
    origin: Option<String>,
    id: Option<String>,
    name: LocalizedText,
    summary: LocalizedText,
    description: LocalizedText,
    developer_name: LocalizedText,
    keywords: LocalizedList,
    launchables: Vec<String>,
    mimetypes: Vec<String>,
    provides: Vec<String>,
    pkgnames: Vec<String>,
    icon: Option<String>,
    icon_is_stock: bool,
    homepage: Option<String>,
    bundles: Vec<Bundle>,
    problems: Vec<String>,
}

impl ComponentBuilder {
    fn finish(self) -> Result<IndexEntry, String> {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err("component has no id".to_string()),
        };
        if let Some(problem) = self.problems.into_iter().next() {
            return Err(format!("{id}: {problem}"));
        }
        Ok(IndexEntry {
            id,
            kind: self.kind,
            name: self.name.resolve(),
            summary: self.summary.resolve(),
            description: self.description.resolve(),
            keywords: self.keywords.resolve(),
            origin: self.origin,
            launchables: self.launchables,
            mimetypes: self.mimetypes,
            provides: self.provides,
            pkgnames: self.pkgnames,
            icon: self.icon,
            developer_name: self.developer_name.resolve(),
            homepage: self.homepage,
            bundles: self.bundles,
        })
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}

fn parse_error(position: u64, err: impl std::fmt::Display) -> CompileError {
    CompileError::Parse {
        position,
        message: err.to_string(),
    }
}

impl DocumentParser<'_> {
    fn parse(&self, source: impl BufRead) -> Result<Vec<IndexEntry>, CompileError> {
        let mut xml = Reader::from_reader(source);
        xml.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut root_origin: Option<String> = None;
        let mut component: Option<ComponentBuilder> = None;
        let mut component_index = 0usize;
        let mut entries = Vec::new();
        let mut saw_root = false;

        loop {
            let event = match xml.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(err) => return Err(parse_error(xml.buffer_position() as u64, err)),
            };
            match event {
                Event::Start(start) => {
                    let frame = self
                        .open_frame(&start, stack.last(), component.is_some())
                        .map_err(|err| parse_error(xml.buffer_position() as u64, err))?;
                    saw_root = true;
                    self.on_open(&frame, &mut root_origin, &mut component);
                    stack.push(frame);
                }
                Event::Empty(start) => {
                    let frame = self
                        .open_frame(&start, stack.last(), component.is_some())
                        .map_err(|err| parse_error(xml.buffer_position() as u64, err))?;
                    saw_root = true;
                    self.on_open(&frame, &mut root_origin, &mut component);
                    stack.push(frame);
                    self.on_close(
                        &mut stack,
                        &mut component,
                        &mut component_index,
                        &mut entries,
                    )?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|err| parse_error(xml.buffer_position() as u64, err))?;
                    if let Some(frame) = stack.last_mut() {
                        frame.push_text(&text);
                    }
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    if let Some(frame) = stack.last_mut() {
                        frame.push_text(&String::from_utf8_lossy(&data));
                    }
                }
                Event::End(_) => {
                    self.on_close(
                        &mut stack,
                        &mut component,
                        &mut component_index,
                        &mut entries,
                    )?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(parse_error(0, "document has no root element"));
        }
        if !stack.is_empty() {
            return Err(parse_error(
                xml.buffer_position() as u64,
                "document ended inside an open element",
            ));
        }
        Ok(entries)
    }

    fn open_frame(
        &self,
        start: &BytesStart<'_>,
        parent: Option<&Frame>,
        in_component: bool,
    ) -> Result<Frame, quick_xml::Error> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        let mut lang = None;
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            if key == "xml:lang" {
                lang = Some(value);
            } else {
                attrs.push((key, value));
            }
        }
        if lang.is_none() && in_component {
            lang = parent.and_then(|frame| frame.lang.clone());
        }
        Ok(Frame {
            name,
            lang,
            attrs,
            ..Frame::default()
        })
    }

    fn on_open(
        &self,
        frame: &Frame,
        root_origin: &mut Option<String>,
        component: &mut Option<ComponentBuilder>,
    ) {
        match frame.name.as_str() {
            "components" => {
                *root_origin = self
                    .origin_tag
                    .map(ToString::to_string)
                    .or_else(|| frame.attr("origin").map(ToString::to_string));
            }
            "component" if component.is_none() => {
                *component = Some(ComponentBuilder {
                    kind: frame.attr("type").unwrap_or_default().to_string(),
                    origin: root_origin.clone(),
                    ..ComponentBuilder::default()
                });
            }
            _ => {}
        }
    }

    fn on_close(
        &self,
        stack: &mut Vec<Frame>,
        component: &mut Option<ComponentBuilder>,
        component_index: &mut usize,
        entries: &mut Vec<IndexEntry>,
    ) -> Result<(), CompileError> {
        let Some(frame) = stack.pop() else {
            return Ok(());
        };
        let parent = stack.last().map(|parent| parent.name.clone());
        let parent = parent.as_deref();

        if frame.name == "component" && parent != Some("component") {
            if let Some(builder) = component.take() {
                let index = *component_index;
                *component_index += 1;
                self.finish_component(builder, index, entries)?;
            }
            if self.cancel.is_cancelled() {
                return Err(CompileError::Cancelled);
            }
            return Ok(());
        }

        let Some(builder) = component.as_mut() else {
            return Ok(());
        };
        let lang = frame.lang.as_deref();
        match (parent, frame.name.as_str()) {
            (Some("component"), "id") => builder.id = Some(frame.text),
            (Some("component"), "name") => builder.name.offer(lang, frame.text, self.locales),
            (Some("component"), "summary") => {
                builder.summary.offer(lang, frame.text, self.locales)
            }
            (Some("component"), "developer_name") | (Some("developer"), "name") => builder
                .developer_name
                .offer(lang, frame.text, self.locales),
            (Some("component"), "pkgname") => push_unique(&mut builder.pkgnames, frame.text),
            (Some("component"), "launchable") => {
                push_unique(&mut builder.launchables, frame.text)
            }
            (Some("component"), "icon") => {
                let is_stock = frame.attr("type") == Some("stock");
                if !frame.text.is_empty()
                    && (builder.icon.is_none() || (is_stock && !builder.icon_is_stock))
                {
                    builder.icon = Some(frame.text);
                    builder.icon_is_stock = is_stock;
                }
            }
            (Some("component"), "url") => {
                if frame.attr("type") == Some("homepage") && builder.homepage.is_none() {
                    builder.homepage = Some(frame.text);
                }
            }
            (Some("component"), "bundle") => {
                if frame.text.is_empty() {
                    builder
                        .problems
                        .push("bundle carries no package identifier".to_string());
                } else {
                    builder.bundles.push(Bundle {
                        kind: frame.attr("type").unwrap_or_default().to_string(),
                        container: frame.attr("container").map(ToString::to_string),
                        package: frame.text,
                    });
                }
            }
            (Some("component"), "description") => {
                let mut by_lang: Vec<(Option<String>, Vec<String>)> = Vec::new();
                for (para_lang, text) in frame.paragraphs {
                    match by_lang.iter_mut().find(|(existing, _)| *existing == para_lang) {
                        Some((_, paragraphs)) => paragraphs.push(text),
                        None => by_lang.push((para_lang, vec![text])),
                    }
                }
                for (para_lang, paragraphs) in by_lang {
                    builder.description.offer(
                        para_lang.as_deref(),
                        paragraphs.join("\n\n"),
                        self.locales,
                    );
                }
            }
            (Some("keywords"), "keyword") => {
                if !frame.text.is_empty() {
                    builder.keywords.offer(lang, frame.text, self.locales);
                }
            }
            (Some("mimetypes"), "mimetype") => push_unique(&mut builder.mimetypes, frame.text),
            (Some("provides"), "id") => push_unique(&mut builder.provides, frame.text),
            (_, "p") | (Some("ul"), "li") | (Some("ol"), "li") => {
                if !frame.text.is_empty()
                    && let Some(description) = stack
                        .iter_mut()
                        .rev()
                        .find(|candidate| candidate.name == "description")
                {
                    description.paragraphs.push((frame.lang, frame.text));
                }
            }
            (Some(_), inline) if INLINE_MARKUP.contains(&inline) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&frame.text);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_component(
        &self,
        builder: ComponentBuilder,
        index: usize,
        entries: &mut Vec<IndexEntry>,
    ) -> Result<(), CompileError> {
        match builder.finish() {
            Ok(entry) => {
                entries.push(entry);
                Ok(())
            }
            Err(reason) if self.flags.ignore_invalid => {
                warn!("ignoring invalid metadata component #{index}: {reason}");
                Ok(())
            }
            Err(reason) => Err(CompileError::InvalidEntry { index, reason }),
        }
    }
}
