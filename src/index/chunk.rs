// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CHUNKING DO TEXTO EXTRAÍDO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Divide o texto renderizado em chunks para embeddings:
// - blocos separados por linha em branco
// - blocos TABLE START..TABLE END nunca são quebrados no meio de uma linha
// - tabelas grandes são fatiadas repetindo caption/cabeçalho em cada parte
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const TABLE_START_LINE: &str = "TABLE START";
const TABLE_END_LINE: &str = "TABLE END";

/// Opções de chunking
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    /// Tamanho máximo do chunk em caracteres
    pub max_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self { max_chars: 2000 }
    }
}

impl ChunkOptions {
    /// Define o tamanho máximo
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Text(Vec<String>),
    Table(Vec<String>),
}

/// Agrupa as linhas em blocos de texto (separados por linha em branco) e
/// blocos de tabela (entre os marcadores).
fn split_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut table: Option<Vec<String>> = None;

    for line in text.lines() {
        if let Some(rows) = table.as_mut() {
            if line == TABLE_END_LINE {
                blocks.push(Block::Table(std::mem::take(rows)));
                table = None;
            } else {
                rows.push(line.to_string());
            }
            continue;
        }

        if line == TABLE_START_LINE {
            if !current.is_empty() {
                blocks.push(Block::Text(std::mem::take(&mut current)));
            }
            table = Some(Vec::new());
        } else if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(Block::Text(std::mem::take(&mut current)));
            }
        } else {
            current.push(line.to_string());
        }
    }

    // Tabela sem TABLE END ainda é tabela
    if let Some(rows) = table {
        blocks.push(Block::Table(rows));
    }
    if !current.is_empty() {
        blocks.push(Block::Text(current));
    }
    blocks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Quebra uma linha longa demais em pedaços de no máximo `max` caracteres.
fn split_long_line(line: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

/// Empacota linhas em pedaços até `max` caracteres (contando os `\n`).
fn pack_lines(lines: &[String], max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for line in lines {
        for part in split_long_line(line, max) {
            let needed = if current.is_empty() {
                char_len(&part)
            } else {
                char_len(&current) + 1 + char_len(&part)
            };
            if needed > max && !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&part);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Linhas de cabeçalho da tabela: até o separador `---` (inclusive), ou só
/// o caption quando não há separador.
fn table_header(rows: &[String]) -> usize {
    let separator = rows
        .iter()
        .position(|row| !row.is_empty() && row.chars().all(|c| c == '-'));
    match separator {
        Some(pos) => pos + 1,
        None => usize::from(rows.first().map_or(false, |r| r.starts_with("TABLE: "))),
    }
}

fn render_table_piece(lines: &[String]) -> String {
    format!("{}\n{}\n{}", TABLE_START_LINE, lines.join("\n"), TABLE_END_LINE)
}

/// Fatia uma tabela grande repetindo o cabeçalho em cada parte.
fn split_table(rows: &[String], max: usize) -> Vec<String> {
    let whole = render_table_piece(rows);
    if char_len(&whole) <= max {
        return vec![whole];
    }

    let wrapper = char_len(&render_table_piece(&[]));
    let header_len = table_header(rows);
    let header_overhead = char_len(&rows[..header_len].join("\n")) + 1;

    // O cabeçalho só é repetido se sobrar pelo menos metade do chunk
    let (header, body) = if header_len > 0 && wrapper + header_overhead < max / 2 {
        rows.split_at(header_len)
    } else {
        rows.split_at(0)
    };
    let used = if header.is_empty() { wrapper } else { wrapper + header_overhead };
    let budget = max.saturating_sub(used).max(1);

    pack_lines(body, budget)
        .into_iter()
        .map(|piece| {
            let mut lines = header.to_vec();
            lines.extend(piece.split('\n').map(String::from));
            render_table_piece(&lines)
        })
        .collect()
}

/// Divide o texto em chunks de no máximo `options.max_chars` caracteres
/// (exceto cabeçalhos de tabela repetidos, que sempre cabem no orçamento).
pub fn chunk_sections(text: &str, options: &ChunkOptions) -> Vec<String> {
    let max = options.max_chars.max(1);

    let mut pieces: Vec<String> = Vec::new();
    for block in split_blocks(text) {
        match block {
            Block::Text(lines) => pieces.extend(pack_lines(&lines, max)),
            Block::Table(rows) => pieces.extend(split_table(&rows, max)),
        }
    }

    // Junta pedaços pequenos vizinhos
    let mut chunks: Vec<String> = Vec::new();
    for piece in pieces {
        match chunks.last_mut() {
            Some(last) if char_len(last) + 2 + char_len(&piece) <= max => {
                last.push_str("\n\n");
                last.push_str(&piece);
            }
            _ => chunks.push(piece),
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_sections("Ett\n\nTvå", &ChunkOptions::default());
        assert_eq!(chunks, vec!["Ett\n\nTvå"]);
    }

    #[test]
    fn test_table_kept_whole() {
        let text = "Inledning\n\n\nTABLE START\nA | B\n-----\n\n1 | 2\nTABLE END\n\n\nSlut";
        let chunks = chunk_sections(text, &ChunkOptions::with_max_chars(45));
        assert_eq!(
            chunks,
            vec!["Inledning", "TABLE START\nA | B\n-----\n\n1 | 2\nTABLE END", "Slut"]
        );
    }

    #[test]
    fn test_large_table_repeats_header() {
        let mut text = String::from("\nTABLE START\nTABLE: Balans\nPost | Belopp\n-------------\n");
        for i in 0..40 {
            text.push_str(&format!("Rad {} | {}\n", i, i * 100));
        }
        text.push_str("TABLE END\n");

        let chunks = chunk_sections(&text, &ChunkOptions::with_max_chars(200));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with("TABLE START\nTABLE: Balans\nPost | Belopp\n-------------\n"));
            assert!(chunk.ends_with("TABLE END"));
            assert!(chunk.chars().count() <= 200);
        }
        let rows: usize = chunks.iter().map(|c| c.matches("Rad ").count()).sum();
        assert_eq!(rows, 40);
    }

    #[test]
    fn test_long_paragraph_split() {
        let text = "x".repeat(450);
        let chunks = chunk_sections(&text, &ChunkOptions::with_max_chars(200));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_sections("", &ChunkOptions::default()).is_empty());
        assert!(chunk_sections("\n\n  \n", &ChunkOptions::default()).is_empty());
    }
}
