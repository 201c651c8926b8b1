// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TABELAS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Linearização de <table> em linhas "a | b | c" preservando a forma da
// tabela (caption, spans, separador após o cabeçalho) e conversão
// auxiliar de tabela em registros estruturados.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use indexmap::IndexMap;
use serde::Serialize;

use crate::markup::Element;

const ROW_TAGS: &[&str] = &["tr"];
const CELL_TAGS: &[&str] = &["td", "th"];
const HEADER_CELL_TAGS: &[&str] = &["th"];
const DATA_CELL_TAGS: &[&str] = &["td"];

/// Marcadores que envolvem cada tabela renderizada.
pub const TABLE_START: &str = "\nTABLE START\n";
/// Ver [`TABLE_START`].
pub const TABLE_END: &str = "\nTABLE END\n";

/// Renderização intermediária de uma tabela.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRender {
    /// Linha `TABLE: <caption>`, se houver caption não vazio
    pub caption: Option<String>,
    /// Rótulos de todas as células `th` da tabela (qualquer linha)
    pub header_labels: Vec<String>,
    /// Uma linha por `tr` com pelo menos uma célula
    pub rows: Vec<String>,
}

impl TableRender {
    /// Constrói a renderização a partir de um elemento `table`.
    pub fn from_element(table: &Element) -> Self {
        let caption = table
            .find_first("caption")
            .map(Element::collapsed_text)
            .filter(|text| !text.is_empty())
            .map(|text| format!("TABLE: {}", text));

        let header_labels = table
            .find_all(HEADER_CELL_TAGS)
            .map(Element::collapsed_text)
            .collect();

        let rows = table.find_all(ROW_TAGS).filter_map(render_row).collect();

        Self {
            caption,
            header_labels,
            rows,
        }
    }

    /// Linhas finais: caption, linhas e separador após a primeira linha
    /// que contém algum rótulo de cabeçalho.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.caption.iter().cloned().collect();
        let offset = lines.len();
        lines.extend(self.rows.iter().cloned());

        if let Some(row_pos) = self.header_row_position() {
            let pos = offset + row_pos;
            // Nunca insere após a última linha
            if pos + 1 < lines.len() {
                let separator = "-".repeat(lines[pos].chars().count());
                lines.insert(pos + 1, separator);
            }
        }
        lines
    }

    /// Índice (em `rows`) da primeira linha contendo um rótulo de cabeçalho.
    pub fn header_row_position(&self) -> Option<usize> {
        if self.header_labels.is_empty() {
            return None;
        }
        self.rows.iter().position(|row| {
            self.header_labels
                .iter()
                .any(|label| row.contains(label.as_str()))
        })
    }

    /// Seção completa envolvida em `TABLE START`/`TABLE END`, ou `None` se a
    /// tabela não produziu nenhuma linha.
    pub fn to_section(&self) -> Option<String> {
        let lines = self.lines();
        if lines.is_empty() {
            return None;
        }
        Some(format!("{}{}{}", TABLE_START, lines.join("\n"), TABLE_END))
    }
}

/// Renderiza uma linha `tr`; `None` quando não há células.
fn render_row(row: &Element) -> Option<String> {
    let cells: Vec<String> = row.find_all(CELL_TAGS).map(render_cell).collect();
    if cells.is_empty() {
        None
    } else {
        Some(cells.join(" | "))
    }
}

/// Texto colapsado da célula mais a anotação de span, quando > 1.
pub fn render_cell(cell: &Element) -> String {
    let text = cell.collapsed_text();

    let mut spans = Vec::with_capacity(2);
    if let Some(rowspan) = span_value(cell, "rowspan") {
        spans.push(format!("rowspan={}", rowspan));
    }
    if let Some(colspan) = span_value(cell, "colspan") {
        spans.push(format!("colspan={}", colspan));
    }

    if spans.is_empty() {
        text
    } else {
        format!("{} [{}]", text, spans.join(", "))
    }
}

// Valores não inteiros são ignorados
fn span_value(cell: &Element, attr: &str) -> Option<u32> {
    cell.attr(attr)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|span| *span > 1)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TABELA → DADOS ESTRUTURADOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Linha de tabela convertida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TableRow {
    /// Campo → valor, na ordem dos cabeçalhos
    Record(IndexMap<String, String>),
    /// Valores brutos quando não há cabeçalhos
    Values(Vec<String>),
}

/// Converte um elemento `table` em registros.
///
/// Os nomes de campo vêm dos `th` da primeira linha, ou dos seus `td` se não
/// houver `th`. Células além dos cabeçalhos recebem `Column<N>` (N 1-based).
/// Sem cabeçalhos, cada linha vira uma lista de valores.
pub fn table_to_records(table: &Element) -> Vec<TableRow> {
    let rows: Vec<&Element> = table.find_all(ROW_TAGS).collect();

    let headers: Vec<String> = match rows.first() {
        Some(first) => {
            let th: Vec<String> = first
                .find_all(HEADER_CELL_TAGS)
                .map(Element::collapsed_text)
                .collect();
            if th.is_empty() {
                first
                    .find_all(DATA_CELL_TAGS)
                    .map(Element::collapsed_text)
                    .collect()
            } else {
                th
            }
        }
        None => Vec::new(),
    };

    let data_rows = if headers.is_empty() {
        &rows[..]
    } else {
        &rows[1..]
    };

    data_rows
        .iter()
        .filter_map(|row| {
            let cells: Vec<String> = row.find_all(CELL_TAGS).map(Element::collapsed_text).collect();
            if cells.is_empty() {
                return None;
            }
            if headers.is_empty() {
                return Some(TableRow::Values(cells));
            }

            let mut record = IndexMap::with_capacity(cells.len());
            for (i, value) in cells.into_iter().enumerate() {
                let field = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("Column{}", i + 1));
                record.insert(field, value);
            }
            Some(TableRow::Record(record))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(tag: &str, text: &str) -> Element {
        Element::new(tag).with_text(text)
    }

    fn row(cells: Vec<Element>) -> Element {
        cells.into_iter().fold(Element::new("tr"), Element::with_child)
    }

    fn simple_table() -> Element {
        Element::new("table")
            .with_child(row(vec![cell("th", "A"), cell("th", "B")]))
            .with_child(row(vec![cell("td", "1"), cell("td", "2")]))
            .with_child(row(vec![cell("td", "3"), cell("td", "4")]))
    }

    #[test]
    fn test_table_with_header_row() {
        let section = TableRender::from_element(&simple_table()).to_section().unwrap();
        assert_eq!(
            section,
            "\nTABLE START\nA | B\n-----\n1 | 2\n3 | 4\nTABLE END\n"
        );
        let lines: Vec<_> = section.trim().lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[2].len(), "A | B".len());
    }

    #[test]
    fn test_span_annotations() {
        let colspan = Element::new("td").with_attr("colspan", "2").with_text("Total");
        assert_eq!(render_cell(&colspan), "Total [colspan=2]");

        let both = Element::new("td")
            .with_attr("colspan", "3")
            .with_attr("rowspan", "2")
            .with_text("X");
        assert_eq!(render_cell(&both), "X [rowspan=2, colspan=3]");

        let single = Element::new("td").with_attr("rowspan", "1").with_text("Y");
        assert_eq!(render_cell(&single), "Y");

        let garbage = Element::new("td").with_attr("colspan", "två").with_text("Z");
        assert_eq!(render_cell(&garbage), "Z");
    }

    #[test]
    fn test_caption_is_first_line() {
        let table = Element::new("table")
            .with_child(cell("caption", " Resultaträkning "))
            .with_child(row(vec![cell("td", "Intäkter"), cell("td", "100")]));
        let render = TableRender::from_element(&table);
        assert_eq!(render.lines(), vec!["TABLE: Resultaträkning", "Intäkter | 100"]);
    }

    #[test]
    fn test_separator_after_first_row_with_header_label() {
        let table = Element::new("table")
            .with_child(row(vec![cell("td", "x"), cell("td", "y")]))
            .with_child(row(vec![cell("th", "A"), cell("th", "B")]))
            .with_child(row(vec![cell("td", "1"), cell("td", "2")]));
        let render = TableRender::from_element(&table);
        assert_eq!(render.header_row_position(), Some(1));
        assert_eq!(render.lines().join("\n"), "x | y\nA | B\n-----\n1 | 2");
    }

    #[test]
    fn test_no_separator_when_header_is_last_line() {
        let table = Element::new("table").with_child(row(vec![cell("th", "Endast")]));
        assert_eq!(TableRender::from_element(&table).lines(), vec!["Endast"]);
    }

    #[test]
    fn test_no_separator_without_matching_row() {
        let render = TableRender {
            caption: None,
            header_labels: vec!["saknas".into()],
            rows: vec!["1 | 2".into(), "3 | 4".into()],
        };
        assert_eq!(render.lines(), vec!["1 | 2", "3 | 4"]);
    }

    #[test]
    fn test_separator_uses_char_length() {
        let table = Element::new("table")
            .with_child(row(vec![cell("th", "Årets"), cell("th", "Föregående")]))
            .with_child(row(vec![cell("td", "1"), cell("td", "2")]));
        let lines = TableRender::from_element(&table).lines();
        assert_eq!(lines[1], "-".repeat("Årets | Föregående".chars().count()));
    }

    #[test]
    fn test_rows_without_cells_are_skipped() {
        let table = Element::new("table")
            .with_child(Element::new("tr"))
            .with_child(row(vec![cell("td", "kvar")]));
        assert_eq!(TableRender::from_element(&table).rows, vec!["kvar"]);
    }

    #[test]
    fn test_empty_table_has_no_section() {
        assert!(TableRender::from_element(&Element::new("table")).to_section().is_none());
    }

    #[test]
    fn test_records_from_th_headers() {
        let table = Element::new("table")
            .with_child(row(vec![cell("th", "Post"), cell("th", "2023")]))
            .with_child(row(vec![cell("td", "Kassa"), cell("td", "10"), cell("td", "extra")]));
        let records = table_to_records(&table);
        assert_eq!(records.len(), 1);
        let TableRow::Record(record) = &records[0] else {
            panic!("expected record");
        };
        let pairs: Vec<_> = record.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("Post", "Kassa"), ("2023", "10"), ("Column3", "extra")]);
    }

    #[test]
    fn test_records_fall_back_to_td_headers() {
        let table = Element::new("table")
            .with_child(row(vec![cell("td", "Namn"), cell("td", "Belopp")]))
            .with_child(row(vec![cell("td", "Lager"), cell("td", "5")]));
        let records = table_to_records(&table);
        let TableRow::Record(record) = &records[0] else {
            panic!("expected record");
        };
        assert_eq!(record.get("Belopp").map(String::as_str), Some("5"));
    }

    #[test]
    fn test_records_without_headers_are_values() {
        let table = Element::new("table")
            .with_child(Element::new("tr"))
            .with_child(row(vec![cell("td", "a"), cell("td", "b")]));
        assert_eq!(
            table_to_records(&table),
            vec![TableRow::Values(vec!["a".into(), "b".into()])]
        );
    }
}
