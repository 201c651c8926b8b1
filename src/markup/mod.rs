// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MARKUP - Árvore de elementos XHTML
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Representação imutável (exceto pela poda) de um documento XHTML/XML já
// parseado. O extrator estrutural só lê esta árvore:
// - nome da tag (nome local, sem prefixo de namespace)
// - filhos em ordem
// - atributos (rowspan, colspan, class...)
// - coleta de textos descendentes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod parser;

use std::path::Path;

pub use parser::{unescape_text, ParseOptions};

/// Nome do elemento raiz sintético que envolve o documento.
pub const DOCUMENT_ROOT: &str = "#document";

/// Erros do passo de parse.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    /// Erro de sintaxe irrecuperável no XML.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax {
        /// Posição (em bytes) onde o reader parou
        position: usize,
        /// Mensagem do quick-xml
        message: String,
    },

    /// Falha ao ler o arquivo do disco.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Nó da árvore: elemento ou texto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Elemento com tag, atributos e filhos
    Element(Element),
    /// Texto (já com entidades resolvidas)
    Text(String),
}

/// Elemento da árvore.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Nome local da tag (`ix:nonFraction` vira `nonFraction`)
    pub name: String,
    /// Atributos em ordem de declaração (nome local, valor)
    pub attributes: Vec<(String, String)>,
    /// Filhos em ordem de documento
    pub children: Vec<Node>,
}

impl Element {
    /// Cria um elemento vazio.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: adiciona um atributo.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder: adiciona um filho elemento.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: adiciona um filho texto.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Valor de um atributo (primeira ocorrência).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Verifica se o nome da tag está na lista.
    pub fn is_any(&self, names: &[&str]) -> bool {
        names.contains(&self.name.as_str())
    }

    /// Filhos diretos que são elementos.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Todos os elementos descendentes em pré-ordem (sem incluir `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// Descendentes cujo nome está na lista, em ordem de documento.
    pub fn find_all<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |el| el.is_any(names))
    }

    /// Primeiro descendente com o nome dado.
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|el| el.name == name)
    }

    /// Textos descendentes em ordem de documento, sem normalização.
    pub fn texts(&self) -> Texts<'_> {
        Texts {
            stack: vec![self.children.iter()],
        }
    }

    /// Cada nó de texto descendente com whitespace colapsado e aparado;
    /// nós que ficam vazios são descartados.
    pub fn stripped_strings(&self) -> impl Iterator<Item = String> + '_ {
        self.texts().filter_map(|text| {
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                None
            } else {
                Some(collapsed)
            }
        })
    }

    /// Texto colapsado: `stripped_strings` unidos por um espaço.
    pub fn collapsed_text(&self) -> String {
        self.stripped_strings().collect::<Vec<_>>().join(" ")
    }

    /// Remove todo elemento cujo nome está em `names`, com sua subárvore.
    ///
    /// Retorna quantos elementos foram removidos (contando só as raízes
    /// das subárvores podadas).
    pub fn prune(&mut self, names: &[&str]) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(el) if el.is_any(names)));
        let mut removed = before - self.children.len();

        for child in self.children.iter_mut() {
            if let Node::Element(el) = child {
                removed += el.prune(names);
            }
        }
        removed
    }

    /// Visita todos os descendentes em pré-ordem, entregando junto a pilha
    /// de nomes dos ancestrais (do mais externo ao pai imediato).
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Element, &[&'a str]),
    {
        let mut path = Vec::new();
        visit_inner(self, &mut path, f);
    }
}

fn visit_inner<'a, F>(element: &'a Element, path: &mut Vec<&'a str>, f: &mut F)
where
    F: FnMut(&'a Element, &[&'a str]),
{
    path.push(element.name.as_str());
    for child in element.child_elements() {
        f(child, path);
        visit_inner(child, path, f);
    }
    path.pop();
}

/// Iterador de elementos descendentes em pré-ordem.
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(iter) = self.stack.last_mut() {
            match iter.next() {
                Some(Node::Element(el)) => {
                    self.stack.push(el.children.iter());
                    return Some(el);
                }
                Some(Node::Text(_)) => continue,
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// Iterador de textos descendentes em ordem de documento.
pub struct Texts<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Texts<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(iter) = self.stack.last_mut() {
            match iter.next() {
                Some(Node::Element(el)) => self.stack.push(el.children.iter()),
                Some(Node::Text(text)) => return Some(text.as_str()),
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// Documento parseado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    root: Element,
}

impl MarkupDocument {
    /// Envolve uma lista de elementos de topo num documento.
    pub fn from_elements(elements: Vec<Element>) -> Self {
        let mut root = Element::new(DOCUMENT_ROOT);
        root.children = elements.into_iter().map(Node::Element).collect();
        Self { root }
    }

    /// Faz o parse de um XHTML/XML em memória.
    pub fn parse(xml: &str, options: &ParseOptions) -> Result<Self, MarkupError> {
        let root = parser::parse_tree(xml, options)?;
        Ok(Self { root })
    }

    /// Lê um arquivo UTF-8 do disco e faz o parse.
    pub fn from_path(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self, MarkupError> {
        let bytes = std::fs::read(path.as_ref())?;
        let content = String::from_utf8_lossy(&bytes);
        Self::parse(content.trim_start_matches('\u{feff}'), options)
    }

    /// Raiz sintética (`#document`).
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Poda global de subárvores. Ver [`Element::prune`].
    pub fn prune(&mut self, names: &[&str]) -> usize {
        self.root.prune(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MarkupDocument {
        MarkupDocument::from_elements(vec![Element::new("body")
            .with_child(Element::new("p").with_text("  Hej \n  världen ").with_child(
                Element::new("span").with_text("42"),
            ))
            .with_child(Element::new("nav").with_child(Element::new("p").with_text("meny")))
            .with_child(Element::new("div").with_attr("class", "x"))])
    }

    #[test]
    fn test_collapsed_text_joins_stripped_nodes() {
        let doc = sample();
        let p = doc.root().find_first("p").unwrap();
        assert_eq!(p.collapsed_text(), "Hej världen 42");
    }

    #[test]
    fn test_descendants_preorder() {
        let doc = sample();
        let names: Vec<_> = doc.root().descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["body", "p", "span", "nav", "p", "div"]);
    }

    #[test]
    fn test_prune_removes_subtree() {
        let mut doc = sample();
        let removed = doc.prune(&["nav"]);
        assert_eq!(removed, 1);
        assert_eq!(doc.root().find_all(&["p"]).count(), 1);
        assert!(!doc.root().collapsed_text().contains("meny"));
    }

    #[test]
    fn test_visit_reports_ancestors() {
        let doc = sample();
        let mut seen = Vec::new();
        doc.root().visit(&mut |el, ancestors| {
            if el.name == "span" {
                seen.push(ancestors.iter().map(|name| name.to_string()).collect::<Vec<_>>());
            }
        });
        assert_eq!(seen, vec![vec![DOCUMENT_ROOT.to_string(), "body".into(), "p".into()]]);
    }

    #[test]
    fn test_attr_lookup() {
        let el = Element::new("td").with_attr("colspan", "2");
        assert_eq!(el.attr("colspan"), Some("2"));
        assert_eq!(el.attr("rowspan"), None);
    }
}
