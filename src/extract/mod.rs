// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EXTRATOR ESTRUTURAL DE TEXTO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Converte a árvore XHTML de uma årsredovisning em texto plano legível por
// LLM, preservando estrutura suficiente para a busca semântica associar
// valores às linhas e colunas corretas.
//
// Ordem de saída agrupada por categoria (não é ordem estrita do documento):
//   1. Parágrafos
//   2. Listas
//   3. Tabelas
//   4. Blocos financeiros (div/span com classe financeira)
//   5. Fragmentos soltos (span fora de p/li/td/th/div)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod table;

pub use table::{render_cell, table_to_records, TableRender, TableRow, TABLE_END, TABLE_START};

use crate::markup::{Element, MarkupDocument};

/// Tags removidas (com a subárvore) antes de qualquer renderização.
pub const EXCLUDED_TAGS: &[&str] = &["script", "style", "header", "footer", "nav"];

/// Palavras-chave de classe que marcam blocos de dados financeiros.
pub const FINANCIAL_KEYWORDS: &[&str] = &["financial", "ekonomi", "rapport", "result", "balans", "finans"];

/// Separador entre seções no texto final.
pub const SECTION_SEPARATOR: &str = "\n\n";

const PARAGRAPH_TAGS: &[&str] = &["p"];
const LIST_TAGS: &[&str] = &["ul", "ol"];
const TABLE_TAGS: &[&str] = &["table"];
const FINANCIAL_TAGS: &[&str] = &["div", "span"];
const FRAGMENT_CONTAINERS: &[&str] = &["p", "li", "td", "th", "div"];

/// Categoria de uma seção renderizada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Um `p`
    Paragraph,
    /// Um `ul`/`ol` inteiro
    List,
    /// Uma `table` inteira
    Table,
    /// Bloco com classe financeira, prefixado com `FINANCIAL DATA: `
    Financial,
    /// `span` solto
    Fragment,
}

/// Bloco de texto opaco na saída.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    /// Categoria de origem
    pub kind: SectionKind,
    /// Texto da seção
    pub text: String,
}

/// Converte documentos XHTML em texto estruturado.
///
/// # Exemplo
///
/// ```rust,ignore
/// let doc = MarkupDocument::from_path("5568925548_2022.xhtml", &ParseOptions::default())?;
/// let text = StructuralTextExtractor::new().render(doc);
/// ```
#[derive(Debug, Clone)]
pub struct StructuralTextExtractor {
    excluded_tags: Vec<String>,
    financial_keywords: Vec<String>,
}

impl Default for StructuralTextExtractor {
    fn default() -> Self {
        Self {
            excluded_tags: EXCLUDED_TAGS.iter().map(|s| s.to_string()).collect(),
            financial_keywords: FINANCIAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl StructuralTextExtractor {
    /// Extrator com as tags excluídas e palavras-chave padrão.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderiza o documento como uma única string.
    pub fn render(&self, document: MarkupDocument) -> String {
        self.render_sections(document)
            .into_iter()
            .map(|section| section.text)
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    /// Renderiza o documento em seções, na ordem agrupada por categoria.
    pub fn render_sections(&self, mut document: MarkupDocument) -> Vec<RenderedSection> {
        let excluded: Vec<&str> = self.excluded_tags.iter().map(String::as_str).collect();
        let pruned = document.prune(&excluded);
        let root = document.root();

        let mut sections = SectionList::default();
        sections.extend(SectionKind::Paragraph, render_paragraphs(root));
        sections.extend(SectionKind::List, render_lists(root));
        sections.extend(SectionKind::Table, render_tables(root));

        for text in self.financial_texts(root) {
            if !sections.contains(&text) {
                sections.push(SectionKind::Financial, format!("FINANCIAL DATA: {}", text));
            }
        }

        for text in standalone_fragments(root) {
            if !sections.contains(&text) {
                sections.push(SectionKind::Fragment, text);
            }
        }

        log::debug!(
            "🧾 Extração: {} seções ({} subárvores podadas)",
            sections.items.len(),
            pruned
        );
        sections.items
    }

    /// Verifica se a classe contém alguma palavra-chave financeira.
    pub fn is_financial_class(&self, class: &str) -> bool {
        let lowered = class.to_lowercase();
        self.financial_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
    }

    // div/span financeiros fora de tabelas, em ordem de documento
    fn financial_texts(&self, root: &Element) -> Vec<String> {
        let mut texts = Vec::new();
        root.visit(&mut |element, ancestors| {
            if !element.is_any(FINANCIAL_TAGS) {
                return;
            }
            if ancestors.iter().any(|name| TABLE_TAGS.contains(name)) {
                return;
            }
            let is_financial = element
                .attr("class")
                .map(|class| self.is_financial_class(class))
                .unwrap_or(false);
            if is_financial {
                let text = element.collapsed_text();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        });
        texts
    }
}

/// Seções acumuladas; a deduplicação compara com todas as seções já emitidas.
#[derive(Debug, Default)]
struct SectionList {
    items: Vec<RenderedSection>,
}

impl SectionList {
    fn push(&mut self, kind: SectionKind, text: String) {
        self.items.push(RenderedSection { kind, text });
    }

    fn extend(&mut self, kind: SectionKind, texts: Vec<String>) {
        for text in texts {
            self.push(kind, text);
        }
    }

    fn contains(&self, text: &str) -> bool {
        self.items.iter().any(|section| section.text == text)
    }
}

fn render_paragraphs(root: &Element) -> Vec<String> {
    root.find_all(PARAGRAPH_TAGS)
        .map(Element::collapsed_text)
        .filter(|text| !text.is_empty())
        .collect()
}

fn render_lists(root: &Element) -> Vec<String> {
    root.find_all(LIST_TAGS).filter_map(render_list).collect()
}

/// Um item por linha; `• ` para `ul`, `N. ` para `ol` (posição entre os `li`
/// da lista, contando itens vazios).
fn render_list(list: &Element) -> Option<String> {
    let ordered = list.name == "ol";
    let lines: Vec<String> = list
        .child_elements()
        .filter(|child| child.name == "li")
        .enumerate()
        .filter_map(|(i, item)| {
            let text = item.collapsed_text();
            if text.is_empty() {
                return None;
            }
            if ordered {
                Some(format!("{}. {}", i + 1, text))
            } else {
                Some(format!("• {}", text))
            }
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn render_tables(root: &Element) -> Vec<String> {
    root.find_all(TABLE_TAGS)
        .filter_map(|table| TableRender::from_element(table).to_section())
        .collect()
}

fn standalone_fragments(root: &Element) -> Vec<String> {
    let mut texts = Vec::new();
    root.visit(&mut |element, ancestors| {
        if element.name != "span" {
            return;
        }
        if ancestors.iter().any(|name| FRAGMENT_CONTAINERS.contains(name)) {
            return;
        }
        let text = element.collapsed_text();
        if !text.is_empty() {
            texts.push(text);
        }
    });
    texts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::ParseOptions;

    fn render(xml: &str) -> String {
        let doc = MarkupDocument::parse(xml, &ParseOptions::default()).unwrap();
        StructuralTextExtractor::new().render(doc)
    }

    #[test]
    fn test_paragraphs_only() {
        let out = render("<body><p>Ett</p><p>  </p><p>Två <b>tre</b></p></body>");
        assert_eq!(out, "Ett\n\nTvå tre");
    }

    #[test]
    fn test_unordered_list() {
        assert_eq!(render("<ul><li>x</li><li>y</li></ul>"), "• x\n• y");
    }

    #[test]
    fn test_ordered_list_keeps_positions() {
        assert_eq!(render("<ol><li>x</li><li>y</li></ol>"), "1. x\n2. y");
        assert_eq!(render("<ol><li>x</li><li/><li>z</li></ol>"), "1. x\n3. z");
    }

    #[test]
    fn test_empty_list_skipped() {
        assert_eq!(render("<body><ul><li> </li></ul><p>kvar</p></body>"), "kvar");
    }

    #[test]
    fn test_category_grouped_order() {
        let xml = "<body><ul><li>lista</li></ul><p>stycke</p></body>";
        assert_eq!(render(xml), "stycke\n\n• lista");
    }

    #[test]
    fn test_table_section() {
        let xml = "<table><tr><th>A</th><th>B</th></tr>\
                   <tr><td>1</td><td>2</td></tr><tr><td>3</td><td>4</td></tr></table>";
        assert_eq!(
            render(xml),
            "\nTABLE START\nA | B\n-----\n1 | 2\n3 | 4\nTABLE END\n"
        );
    }

    #[test]
    fn test_financial_dedup_against_paragraph() {
        let xml = r#"<body><p>Omsättning 100</p>
            <div class="financial-summary"><span>Omsättning 100</span></div></body>"#;
        assert_eq!(render(xml), "Omsättning 100");
    }

    #[test]
    fn test_financial_block_emitted_with_prefix() {
        let xml = r#"<body><div class="Balansrakning">Summa tillgångar 500</div></body>"#;
        assert_eq!(render(xml), "FINANCIAL DATA: Summa tillgångar 500");
    }

    #[test]
    fn test_financial_inside_table_skipped() {
        let xml = r#"<table><tr><td><div class="result">7</div></td></tr></table>"#;
        let doc = MarkupDocument::parse(xml, &ParseOptions::default()).unwrap();
        let sections = StructuralTextExtractor::new().render_sections(doc);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Table);
    }

    #[test]
    fn test_standalone_span() {
        let xml = "<body><span>Org.nr 556892-5548</span><div><span>inne</span></div></body>";
        assert_eq!(render(xml), "Org.nr 556892-5548");
    }

    #[test]
    fn test_span_inside_text_containers_is_not_fragment() {
        let xml = "<body><p>a <span>in p</span></p><ul><li><span>in li</span></li></ul>\
                   <table><tr><td><span>in td</span></td></tr></table><span>free</span></body>";
        assert_eq!(
            render(xml),
            "a in p\n\n• in li\n\n\nTABLE START\nin td\nTABLE END\n\n\nfree"
        );

        let xml = "<body><table><tr><th><span>rubrik</span></th></tr></table><span>fri</span></body>";
        assert_eq!(render(xml), "\nTABLE START\nrubrik\nTABLE END\n\n\nfri");
    }

    #[test]
    fn test_standalone_span_dedup_includes_financial() {
        // Texto do span difere da seção prefixada, então aparece de novo
        let xml = r#"<body><span class="resultat">Vinst 9</span><span>Vinst 9</span></body>"#;
        assert_eq!(render(xml), "FINANCIAL DATA: Vinst 9\n\nVinst 9");
    }

    #[test]
    fn test_pruned_content_never_appears() {
        let xml = r#"<html><head><style>.x{}</style><script>var ekonomi = 1;</script></head>
            <body><nav><div class="ekonomi">Meny</div><span>länk</span></nav>
            <header><p>Sidhuvud</p></header><p>Innehåll</p>
            <footer><span class="financial">Sidfot</span></footer></body></html>"#;
        let out = render(xml);
        assert_eq!(out, "Innehåll");
    }

    #[test]
    fn test_render_is_idempotent() {
        let xml = r#"<body><p>a</p><ol><li>b</li></ol><table><tr><td>c</td></tr></table>
            <div class="rapport">d</div><span>e</span></body>"#;
        let doc = MarkupDocument::parse(xml, &ParseOptions::default()).unwrap();
        let extractor = StructuralTextExtractor::new();
        assert_eq!(extractor.render(doc.clone()), extractor.render(doc));
    }

    #[test]
    fn test_is_financial_class_case_insensitive() {
        let extractor = StructuralTextExtractor::new();
        assert!(extractor.is_financial_class("pageBreak FinansiellaRapporter"));
        assert!(extractor.is_financial_class("RESULT"));
        assert!(!extractor.is_financial_class("noter"));
    }
}
