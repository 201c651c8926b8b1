// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PARSER XHTML (quick-xml)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Constrói a árvore de `Element` a partir de eventos do quick-xml.
// Tolerante: tags de fechamento sem par são ignoradas, elementos abertos no
// fim do arquivo são fechados implicitamente e entidades desconhecidas
// ficam como estão no texto.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Element, MarkupError, Node, DOCUMENT_ROOT};

/// Opções do passo de parse.
///
/// Substitui a supressão global de warnings do parser: o chamador decide
/// explicitamente se problemas recuperáveis devem ser logados.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Loga (`warn`) entidades desconhecidas e tags de fechamento órfãs.
    pub warn_on_recoverable: bool,
}

impl ParseOptions {
    /// Opções com warnings habilitados.
    pub fn verbose() -> Self {
        Self {
            warn_on_recoverable: true,
        }
    }
}

pub(super) fn parse_tree(xml: &str, options: &ParseOptions) -> Result<Element, MarkupError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    reader.check_end_names(false);

    // Pilha de elementos abertos; a base é a raiz sintética.
    let mut stack: Vec<Element> = vec![Element::new(DOCUMENT_ROOT)];

    loop {
        let event = reader.read_event().map_err(|e| MarkupError::Syntax {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                stack.push(open_element(&start, options));
            }
            Event::Empty(start) => {
                let element = open_element(&start, options);
                push_child(&mut stack, Node::Element(element));
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                close_element(&mut stack, &name, options);
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                let value = unescape_with_options(&raw, options);
                if !value.is_empty() {
                    push_child(&mut stack, Node::Text(value.into_owned()));
                }
            }
            Event::CData(cdata) => {
                let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                if !value.is_empty() {
                    push_child(&mut stack, Node::Text(value));
                }
            }
            Event::Eof => break,
            // Comentários, declarações, DOCTYPE e PIs não são conteúdo
            _ => {}
        }
    }

    // Fecha implicitamente o que ficou aberto
    while stack.len() > 1 {
        if let Some(element) = stack.pop() {
            push_child(&mut stack, Node::Element(element));
        }
    }

    Ok(stack.pop().unwrap_or_else(|| Element::new(DOCUMENT_ROOT)))
}

fn open_element(start: &BytesStart<'_>, options: &ParseOptions) -> Element {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr in start.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        // Declarações de namespace não são atributos de conteúdo
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape_with_options(&raw, options).into_owned();
        element.attributes.push((key, value));
    }

    element
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn close_element(stack: &mut Vec<Element>, name: &str, options: &ParseOptions) {
    // Procura o elemento aberto mais próximo com esse nome (ignorando a raiz)
    let Some(depth) = stack.iter().skip(1).rposition(|el| el.name == name) else {
        if options.warn_on_recoverable {
            log::warn!("⚠️ Tag de fechamento sem par ignorada: </{}>", name);
        }
        return;
    };
    let target = depth + 1;

    while stack.len() > target {
        if let Some(element) = stack.pop() {
            push_child(stack, Node::Element(element));
        }
    }
}

fn unescape_with_options<'a>(raw: &'a str, options: &ParseOptions) -> Cow<'a, str> {
    match quick_xml::escape::unescape_with(raw, resolve_entity) {
        Ok(value) => value,
        Err(e) => {
            if options.warn_on_recoverable {
                log::warn!("⚠️ Entidade não reconhecida mantida como texto: {}", e);
            }
            Cow::Owned(unescape_lenient(raw))
        }
    }
}

/// Resolve entidades e referências numéricas; entidades desconhecidas
/// permanecem literalmente no texto.
pub fn unescape_text(raw: &str) -> String {
    match quick_xml::escape::unescape_with(raw, resolve_entity) {
        Ok(value) => value.into_owned(),
        Err(_) => unescape_lenient(raw),
    }
}

// Fallback entidade a entidade: resolve o que for possível, mantém o resto.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            Some(end) if end > 1 => {
                let candidate = &tail[..=end];
                match quick_xml::escape::unescape_with(candidate, resolve_entity) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(candidate),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    let value = match entity {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "minus" => "\u{2212}",
        "shy" => "\u{ad}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "euro" => "\u{20ac}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "deg" => "\u{b0}",
        "sect" => "\u{a7}",
        "auml" => "ä",
        "Auml" => "Ä",
        "ouml" => "ö",
        "Ouml" => "Ö",
        "aring" => "å",
        "Aring" => "Å",
        "eacute" => "é",
        "Eacute" => "É",
        "uuml" => "ü",
        "Uuml" => "Ü",
        _ => return None,
    };
    Some(value)
}
